use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tracing::debug;

use crate::api::{FeedClient, fetch_recent_outcomes};
use crate::config::FeedConfig;
use crate::state::RequestTicket;
use crate::types::FeedBatch;

/// Largest exponent applied to the base interval.
const MAX_BACKOFF_SHIFT: u32 = 16;

/// Exponential backoff over the base poll interval.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            failures: 0,
        }
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// `base * 2^failures`, capped at `max`.
    pub fn delay(&self) -> Duration {
        let factor = 1u32 << self.failures.min(MAX_BACKOFF_SHIFT);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// `delay()` plus up to 10% random jitter while backing off.
    pub fn delay_with_jitter<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let delay = self.delay();
        if self.failures == 0 {
            return delay;
        }
        let spread = (delay.as_millis() / 10) as u64;
        delay + Duration::from_millis(rng.random_range(0..=spread))
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
    }
}

/// Poll scheduling: backoff plus a single in-flight request.
///
/// A tick that arrives while a request is outstanding is coalesced into it.
pub struct Poller {
    backoff: Backoff,
    in_flight: bool,
}

impl Poller {
    pub fn new(config: &FeedConfig) -> Self {
        Self {
            backoff: Backoff::new(
                Duration::from_millis(config.poll_interval_ms),
                Duration::from_millis(config.max_backoff_ms),
            ),
            in_flight: false,
        }
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Whether a new request may start now.
    pub fn should_start(&self) -> bool {
        !self.in_flight
    }

    pub fn mark_started(&mut self) {
        self.in_flight = true;
    }

    /// Record the end of the outstanding request. Synthetic batches count
    /// as failures for backoff purposes.
    pub fn finish(&mut self, batch: &FeedBatch) {
        self.in_flight = false;
        if batch.is_synthetic() {
            self.backoff.record_failure();
            debug!(
                "Feed failure #{}, next poll in {:?}",
                self.backoff.failures(),
                self.backoff.delay()
            );
        } else {
            self.backoff.record_success();
        }
    }

    pub fn next_delay(&self) -> Duration {
        self.backoff.delay_with_jitter(&mut rand::rng())
    }
}

/// Run one feed request on its own task and deliver the result with its ticket.
pub fn spawn_fetch(
    client: FeedClient,
    ticket: RequestTicket,
    tx: mpsc::Sender<(RequestTicket, FeedBatch)>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let batch = fetch_recent_outcomes(&client).await;
        if tx.send((ticket, batch)).await.is_err() {
            debug!("Poll loop gone, dropping response {:?}", ticket);
        }
    })
}
