use chrono::{Local, Utc};

use crate::state::SignalState;
use crate::types::{SignalEvent, TimedSignal, TimingStrategy};

/// Emit a signal event as a single JSON line to stdout.
pub fn report_event(event: &SignalEvent) {
    if let Ok(json) = serde_json::to_string(event) {
        println!("{json}");
    }
}

/// Current fixed-sequence recommendation as an event.
pub fn recommendation_event(state: &SignalState) -> SignalEvent {
    SignalEvent::Recommendation {
        timestamp: Utc::now().to_rfc3339(),
        strategy: state.strategy(),
        color: state.recommendation(),
        history_len: state.history().len(),
        synthetic: state.is_synthetic(),
    }
}

/// Timed signal as an event, with entry times on the local clock.
pub fn timed_event(signal: &TimedSignal) -> SignalEvent {
    SignalEvent::Timed {
        timestamp: Utc::now().to_rfc3339(),
        strategy: signal.strategy,
        anchor_id: signal.anchor_id.clone(),
        anchor_at: signal.anchor_at.to_rfc3339(),
        entries: signal.clock_labels(&Local),
        confidence: signal.confidence,
    }
}

pub fn no_anchor_event(strategy: TimingStrategy, state: &SignalState) -> SignalEvent {
    SignalEvent::NoAnchor {
        timestamp: Utc::now().to_rfc3339(),
        strategy,
        history_len: state.history().len(),
    }
}
