use crate::types::CategoricalColor;

/// Canonical classification of a roll.
///
/// `0` is white, `1..=7` red, everything else black. Rolls above 14 never
/// come out of a normalized feed, but the function stays total and treats
/// them as black.
pub fn classify(roll: u32) -> CategoricalColor {
    match roll {
        0 => CategoricalColor::White,
        1..=7 => CategoricalColor::Red,
        _ => CategoricalColor::Black,
    }
}

/// Map the feed's own color code (0 white, 1 red, 2 black).
///
/// Unknown codes fall through to black.
pub fn from_color_code(code: u8) -> CategoricalColor {
    match code {
        0 => CategoricalColor::White,
        1 => CategoricalColor::Red,
        _ => CategoricalColor::Black,
    }
}

impl CategoricalColor {
    /// Red and black swap. White maps to red: there is no natural opposite,
    /// red is the chosen default.
    pub fn opposite(self) -> CategoricalColor {
        match self {
            CategoricalColor::Red => CategoricalColor::Black,
            CategoricalColor::Black => CategoricalColor::Red,
            CategoricalColor::White => CategoricalColor::Red,
        }
    }

    /// Feed color code for this color.
    pub fn code(self) -> u8 {
        match self {
            CategoricalColor::White => 0,
            CategoricalColor::Red => 1,
            CategoricalColor::Black => 2,
        }
    }
}
