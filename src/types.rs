use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Largest roll the wheel can produce.
pub const MAX_ROLL: u8 = 14;

/// One round reported by the result feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub id: String,
    /// Raw roll, always in `0..=14` once normalized.
    pub roll: u8,
    /// Color as reported by the feed (0 = white, 1 = red, 2 = black).
    /// Not guaranteed to agree with `roll`.
    pub color_code: u8,
    pub occurred_at: DateTime<Utc>,
}

/// Categorical outcome of a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalColor {
    Red,
    Black,
    White,
}

/// Fixed-sequence strategies, evaluated on every feed refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PatternStrategy {
    /// Four- and two-color streak patterns over the feed's color codes.
    #[default]
    Standardized,
    /// Opposite of the color of the last three rolls' reduced sum.
    Continuous,
}

/// Timed-anchor strategies, evaluated only on explicit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum TimingStrategy {
    /// A single entry 13 minutes after the last white.
    #[default]
    NoRepeat,
    /// Two entries, 7 and 12 minutes after the last white.
    Precise,
}

/// A time-shifted recommendation anchored on the most recent white.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimedSignal {
    pub strategy: TimingStrategy,
    pub anchor_id: String,
    pub anchor_at: DateTime<Utc>,
    /// One entry for `NoRepeat`, two for `Precise`.
    pub entries: Vec<DateTime<Utc>>,
    /// Cosmetic percentage in `89..=98`; carries no statistical meaning.
    pub confidence: u8,
}

impl TimedSignal {
    /// Entry times rendered as `HH:MM` in the given time zone.
    pub fn clock_labels<Tz: TimeZone>(&self, tz: &Tz) -> Vec<String>
    where
        Tz::Offset: std::fmt::Display,
    {
        self.entries
            .iter()
            .map(|t| t.with_timezone(tz).format("%H:%M").to_string())
            .collect()
    }
}

/// Result of a feed request as seen by the poller.
#[derive(Debug, Clone)]
pub enum FeedBatch {
    /// Records decoded from the feed.
    Live(Vec<OutcomeRecord>),
    /// Placeholder history fabricated after a failed request.
    Synthetic(Vec<OutcomeRecord>),
}

impl FeedBatch {
    pub fn records(&self) -> &[OutcomeRecord] {
        match self {
            FeedBatch::Live(r) | FeedBatch::Synthetic(r) => r,
        }
    }

    pub fn into_records(self) -> Vec<OutcomeRecord> {
        match self {
            FeedBatch::Live(r) | FeedBatch::Synthetic(r) => r,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, FeedBatch::Synthetic(_))
    }
}

/// Signal event emitted by the reporter as a JSON line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SignalEvent {
    Recommendation {
        timestamp: String,
        strategy: PatternStrategy,
        /// `None` is the "waiting for pattern" state.
        color: Option<CategoricalColor>,
        history_len: usize,
        synthetic: bool,
    },
    Timed {
        timestamp: String,
        strategy: TimingStrategy,
        anchor_id: String,
        anchor_at: String,
        entries: Vec<String>,
        confidence: u8,
    },
    /// A timed signal was requested but no white is in the history.
    NoAnchor {
        timestamp: String,
        strategy: TimingStrategy,
        history_len: usize,
    },
    StrategySwitched {
        timestamp: String,
        strategy: PatternStrategy,
    },
}
