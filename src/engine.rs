use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::classifier::{classify, from_color_code};
use crate::types::{CategoricalColor, OutcomeRecord, PatternStrategy, TimedSignal, TimingStrategy};

/// Minutes after the anchor for the single no-repeat entry.
const NO_REPEAT_OFFSET_MIN: i64 = 13;

/// Minutes after the anchor for the two precise entries.
const PRECISE_OFFSETS_MIN: [i64; 2] = [7, 12];

/// Bounds of the cosmetic confidence score.
pub const CONFIDENCE_MIN: u8 = 89;
pub const CONFIDENCE_MAX: u8 = 98;

/// Run the selected fixed-sequence strategy over a newest-first history.
///
/// Returns `None` when no pattern matches or the history is too short.
pub fn recommend_color(
    strategy: PatternStrategy,
    records: &[OutcomeRecord],
) -> Option<CategoricalColor> {
    match strategy {
        PatternStrategy::Standardized => {
            let sequence: Vec<CategoricalColor> = records
                .iter()
                .take(4)
                .map(|r| from_color_code(r.color_code))
                .collect();
            standardized(&sequence)
        }
        PatternStrategy::Continuous => continuous(records),
    }
}

/// Streak patterns over feed color codes, newest-first.
///
/// Four-color patterns are checked before two-color ones.
pub fn standardized(sequence: &[CategoricalColor]) -> Option<CategoricalColor> {
    use CategoricalColor::{Black, Red};

    if let [a, b, c, d, ..] = sequence {
        match [*a, *b, *c, *d] {
            [Red, Black, Black, Black] => return Some(Red),
            [Black, Red, Red, Red] => return Some(Black),
            _ => {}
        }
    }

    match sequence {
        [Black, Black, ..] => Some(Red),
        [Red, Red, ..] => Some(Black),
        _ => None,
    }
}

/// Opposite color of the reduced sum of the three most recent rolls.
pub fn continuous(records: &[OutcomeRecord]) -> Option<CategoricalColor> {
    if records.len() < 3 {
        return None;
    }
    let sum: u32 = records[..3].iter().map(|r| u32::from(r.roll)).sum();
    Some(classify(reduce_sum(sum)).opposite())
}

/// Subtract 14 once when the sum exceeds 14.
///
/// Sums above 28 are left above 14 and classify as black; this is not a
/// modulo.
pub fn reduce_sum(sum: u32) -> u32 {
    if sum > 14 { sum - 14 } else { sum }
}

/// Most recent record whose roll classifies as white.
pub fn find_anchor(records: &[OutcomeRecord]) -> Option<&OutcomeRecord> {
    records
        .iter()
        .find(|r| classify(u32::from(r.roll)) == CategoricalColor::White)
}

/// Entry instants for a timing strategy, relative to the anchor.
pub fn entry_times(strategy: TimingStrategy, anchor_at: DateTime<Utc>) -> Vec<DateTime<Utc>> {
    match strategy {
        TimingStrategy::NoRepeat => vec![anchor_at + Duration::minutes(NO_REPEAT_OFFSET_MIN)],
        TimingStrategy::Precise => PRECISE_OFFSETS_MIN
            .iter()
            .map(|m| anchor_at + Duration::minutes(*m))
            .collect(),
    }
}

/// Build a timed signal from the most recent white, if any.
pub fn timed_signal<R: Rng + ?Sized>(
    strategy: TimingStrategy,
    records: &[OutcomeRecord],
    rng: &mut R,
) -> Option<TimedSignal> {
    let anchor = find_anchor(records)?;
    Some(TimedSignal {
        strategy,
        anchor_id: anchor.id.clone(),
        anchor_at: anchor.occurred_at,
        entries: entry_times(strategy, anchor.occurred_at),
        confidence: cosmetic_confidence(rng),
    })
}

/// Decorative confidence percentage shown next to a timed signal.
///
/// Sampled uniformly from `89..=98`. It is not derived from any hit-rate
/// measurement and must not be read as one.
pub fn cosmetic_confidence<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    rng.random_range(CONFIDENCE_MIN..=CONFIDENCE_MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use CategoricalColor::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    fn record(id: &str, roll: u8, color_code: u8, occurred_at: DateTime<Utc>) -> OutcomeRecord {
        OutcomeRecord {
            id: id.to_string(),
            roll,
            color_code,
            occurred_at,
        }
    }

    /// Records carrying the given colors as feed codes, newest-first.
    fn coded(colors: &[CategoricalColor]) -> Vec<OutcomeRecord> {
        colors
            .iter()
            .enumerate()
            .map(|(i, c)| record(&format!("r{i}"), 5, c.code(), at(10, 0)))
            .collect()
    }

    fn rolls(values: &[u8]) -> Vec<OutcomeRecord> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| record(&format!("r{i}"), *v, 1, at(10, 0)))
            .collect()
    }

    // ── standardized ───────────────────────────────────────────────

    #[test]
    fn standardized_four_red_then_blacks() {
        assert_eq!(standardized(&[Red, Black, Black, Black, Red]), Some(Red));
    }

    #[test]
    fn standardized_four_black_then_reds() {
        assert_eq!(standardized(&[Black, Red, Red, Red, White]), Some(Black));
    }

    #[test]
    fn standardized_two_blacks() {
        assert_eq!(standardized(&[Black, Black, Red, White]), Some(Red));
        assert_eq!(standardized(&[Black, Black]), Some(Red));
    }

    #[test]
    fn standardized_two_reds() {
        assert_eq!(standardized(&[Red, Red, Black, White]), Some(Black));
        assert_eq!(standardized(&[Red, Red]), Some(Black));
    }

    #[test]
    fn standardized_no_match() {
        assert_eq!(standardized(&[Red, Black, White, Black]), None);
        assert_eq!(standardized(&[White, White, White, White]), None);
        assert_eq!(standardized(&[Black]), None);
        assert_eq!(standardized(&[]), None);
    }

    #[test]
    fn standardized_falls_back_to_two_length() {
        // Neither four-pattern matches; the leading pair decides.
        assert_eq!(standardized(&[Red, Red, Red, Red]), Some(Black));
        assert_eq!(standardized(&[Black, Black, Black, Black]), Some(Red));
        assert_eq!(standardized(&[Black, Black, Red, Red]), Some(Red));
    }

    #[test]
    fn standardized_reads_color_codes_not_rolls() {
        // Roll 0 (white) but the feed says red twice.
        let mut history = coded(&[Red, Red]);
        for r in &mut history {
            r.roll = 0;
        }
        assert_eq!(
            recommend_color(PatternStrategy::Standardized, &history),
            Some(Black)
        );
    }

    #[test]
    fn standardized_idempotent() {
        let history = coded(&[Red, Black, Black, Black, White, Red]);
        let first = recommend_color(PatternStrategy::Standardized, &history);
        let second = recommend_color(PatternStrategy::Standardized, &history);
        assert_eq!(first, Some(Red));
        assert_eq!(first, second);
    }

    // ── continuous ─────────────────────────────────────────────────

    #[test]
    fn continuous_reduced_sum_red_gives_black() {
        // 15 > 14 → 1 → red → black
        assert_eq!(continuous(&rolls(&[5, 5, 5])), Some(Black));
    }

    #[test]
    fn continuous_white_sum_defaults_to_red() {
        assert_eq!(continuous(&rolls(&[0, 0, 0])), Some(Red));
    }

    #[test]
    fn continuous_black_sum_gives_red() {
        // 4 + 4 + 2 = 10 → black → red
        assert_eq!(continuous(&rolls(&[4, 4, 2])), Some(Red));
    }

    #[test]
    fn continuous_large_sum_is_not_modulo() {
        // 14 + 14 + 14 = 42 → 28 → black → red
        assert_eq!(reduce_sum(42), 28);
        assert_eq!(continuous(&rolls(&[14, 14, 14])), Some(Red));
    }

    #[test]
    fn continuous_only_reads_three_newest() {
        assert_eq!(continuous(&rolls(&[5, 5, 5, 14, 14])), Some(Black));
    }

    #[test]
    fn continuous_needs_three_records() {
        assert_eq!(continuous(&rolls(&[5, 5])), None);
        assert_eq!(recommend_color(PatternStrategy::Continuous, &[]), None);
    }

    #[test]
    fn reduce_sum_boundaries() {
        assert_eq!(reduce_sum(14), 14);
        assert_eq!(reduce_sum(15), 1);
        assert_eq!(reduce_sum(28), 14);
        assert_eq!(reduce_sum(29), 15);
    }

    // ── timed anchor ───────────────────────────────────────────────

    #[test]
    fn no_repeat_adds_thirteen_minutes() {
        let history = vec![
            record("a", 3, 1, at(10, 58)),
            record("w", 0, 0, at(10, 50)),
            record("b", 0, 0, at(10, 20)),
        ];
        let mut rng = StdRng::seed_from_u64(7);
        let signal = timed_signal(TimingStrategy::NoRepeat, &history, &mut rng).unwrap();
        assert_eq!(signal.anchor_id, "w");
        assert_eq!(signal.clock_labels(&Utc), vec!["11:03"]);
    }

    #[test]
    fn precise_adds_seven_and_twelve_minutes() {
        let history = vec![record("w", 0, 0, at(10, 50))];
        let mut rng = StdRng::seed_from_u64(7);
        let signal = timed_signal(TimingStrategy::Precise, &history, &mut rng).unwrap();
        assert_eq!(signal.clock_labels(&Utc), vec!["10:57", "11:02"]);
    }

    #[test]
    fn anchor_uses_roll_not_color_code() {
        // color_code says white but roll is red; second record is a real white.
        let history = vec![record("x", 4, 0, at(9, 0)), record("w", 0, 1, at(8, 0))];
        assert_eq!(find_anchor(&history).map(|r| r.id.as_str()), Some("w"));
    }

    #[test]
    fn timed_without_white_is_none() {
        let history = rolls(&[1, 2, 9, 14]);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(timed_signal(TimingStrategy::Precise, &history, &mut rng).is_none());
    }

    #[test]
    fn entry_times_roll_over_midnight() {
        let anchor = Utc.with_ymd_and_hms(2024, 1, 1, 23, 55, 30).unwrap();
        let times = entry_times(TimingStrategy::NoRepeat, anchor);
        assert_eq!(
            times,
            vec![Utc.with_ymd_and_hms(2024, 1, 2, 0, 8, 30).unwrap()]
        );
    }

    #[test]
    fn confidence_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1000 {
            let c = cosmetic_confidence(&mut rng);
            assert!((CONFIDENCE_MIN..=CONFIDENCE_MAX).contains(&c), "{c} out of range");
        }
    }
}
