use rand::Rng;

use crate::api::truncate_history;
use crate::engine::{recommend_color, timed_signal};
use crate::types::{
    CategoricalColor, FeedBatch, OutcomeRecord, PatternStrategy, TimedSignal, TimingStrategy,
};

/// Monotonic id handed out when a feed request starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RequestTicket(pub u64);

/// What `apply_batch` did with a feed response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A newer request was started after this one; the response was dropped.
    Stale,
    /// The response held no records; the previous history was kept.
    Empty,
    /// History replaced and the recommendation recomputed.
    Applied { changed: bool },
}

/// In-memory view driven by feed refreshes and user actions.
///
/// Every refresh replaces the history wholesale and recomputes the
/// recommendation; nothing is updated partially.
pub struct SignalState {
    history: Vec<OutcomeRecord>,
    history_limit: usize,
    strategy: PatternStrategy,
    recommendation: Option<CategoricalColor>,
    timed: Option<TimedSignal>,
    /// Whether the last applied batch was synthetic.
    synthetic: bool,
    /// Set once the first response (of any kind) has been applied.
    loaded: bool,
    last_issued: u64,
}

impl SignalState {
    pub fn new(strategy: PatternStrategy, history_limit: usize) -> Self {
        Self {
            history: Vec::new(),
            history_limit,
            strategy,
            recommendation: None,
            timed: None,
            synthetic: false,
            loaded: false,
            last_issued: 0,
        }
    }

    pub fn history(&self) -> &[OutcomeRecord] {
        &self.history
    }

    pub fn strategy(&self) -> PatternStrategy {
        self.strategy
    }

    pub fn recommendation(&self) -> Option<CategoricalColor> {
        self.recommendation
    }

    pub fn timed(&self) -> Option<&TimedSignal> {
        self.timed.as_ref()
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Start a new request. Any response for an earlier ticket becomes stale.
    pub fn begin_request(&mut self) -> RequestTicket {
        self.last_issued += 1;
        RequestTicket(self.last_issued)
    }

    /// Apply a feed response if it belongs to the latest initiated request.
    pub fn apply_batch(&mut self, ticket: RequestTicket, batch: FeedBatch) -> ApplyOutcome {
        if ticket.0 != self.last_issued {
            return ApplyOutcome::Stale;
        }
        self.loaded = true;
        if batch.records().is_empty() {
            return ApplyOutcome::Empty;
        }
        self.synthetic = batch.is_synthetic();
        self.history = truncate_history(batch.into_records(), self.history_limit);
        ApplyOutcome::Applied {
            changed: self.recompute(),
        }
    }

    /// Switch the fixed-sequence strategy and recompute immediately.
    ///
    /// Returns whether the recommendation changed.
    pub fn set_strategy(&mut self, strategy: PatternStrategy) -> bool {
        self.strategy = strategy;
        self.recompute()
    }

    /// Run a timed-anchor strategy on the current history.
    ///
    /// Without a white in the history the previously stored signal is kept
    /// and `None` is returned.
    pub fn request_timed_signal<R: Rng + ?Sized>(
        &mut self,
        strategy: TimingStrategy,
        rng: &mut R,
    ) -> Option<&TimedSignal> {
        let signal = timed_signal(strategy, &self.history, rng)?;
        self.timed = Some(signal);
        self.timed.as_ref()
    }

    fn recompute(&mut self) -> bool {
        let next = recommend_color(self.strategy, &self.history);
        let changed = next != self.recommendation;
        self.recommendation = next;
        changed
    }
}
