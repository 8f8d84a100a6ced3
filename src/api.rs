use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use rand::Rng;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::HISTORY_LIMIT;
use crate::config::FeedConfig;
use crate::types::{FeedBatch, MAX_ROLL, OutcomeRecord};

/// Failure while fetching or decoding the result feed.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("feed request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("feed returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("feed body is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

/// HTTP client for the result feed.
#[derive(Debug, Clone)]
pub struct FeedClient {
    http: reqwest::Client,
    url: String,
    limit: usize,
}

impl FeedClient {
    pub fn new(config: &FeedConfig) -> Result<Self, FeedError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;
        Ok(Self {
            http,
            url: config.url.clone(),
            limit: config.history_limit.min(HISTORY_LIMIT),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// One GET against the feed, normalized and truncated.
    pub async fn try_fetch(&self) -> Result<Vec<OutcomeRecord>, FeedError> {
        let resp = self.http.get(&self.url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(FeedError::Status(status));
        }
        let bytes = resp.bytes().await?;
        let body: Value = serde_json::from_slice(&bytes)?;
        let records = truncate_history(normalize_outcomes(&body), self.limit);
        debug!("Fetched {} outcomes", records.len());
        Ok(records)
    }
}

/// Fetch the latest outcomes, substituting a synthetic history on failure.
///
/// Never fails and never retries: a failed request yields 20 placeholder
/// records so the engine always has input.
pub async fn fetch_recent_outcomes(client: &FeedClient) -> FeedBatch {
    match client.try_fetch().await {
        Ok(records) => FeedBatch::Live(records),
        Err(e) => {
            warn!("Feed unavailable ({e}), using synthetic history");
            FeedBatch::Synthetic(synthetic_history(Utc::now(), &mut rand::rng()))
        }
    }
}

/// Keep the first `limit` records. The feed is already newest-first.
pub fn truncate_history(mut records: Vec<OutcomeRecord>, limit: usize) -> Vec<OutcomeRecord> {
    records.truncate(limit);
    records
}

/// Extract outcome records from any of the accepted response shapes.
///
/// Accepts a bare array, `{"results": [...]}` or `{"data": [...]}`, in that
/// order. Any other shape yields an empty list. Elements that fail to decode
/// or violate the roll/color ranges are dropped.
pub fn normalize_outcomes(body: &Value) -> Vec<OutcomeRecord> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(map) => match (map.get("results"), map.get("data")) {
            (Some(Value::Array(items)), _) => items,
            (_, Some(Value::Array(items))) => items,
            _ => {
                debug!("Feed object has no results/data array");
                return Vec::new();
            }
        },
        _ => {
            debug!("Feed body is neither an array nor an object");
            return Vec::new();
        }
    };

    items
        .iter()
        .filter_map(|item| match decode_outcome(item) {
            Some(record) => Some(record),
            None => {
                debug!("Dropping invalid feed element: {item}");
                None
            }
        })
        .collect()
}

#[derive(Deserialize)]
struct RawOutcome {
    id: Value,
    roll: i64,
    color: i64,
    created_at: String,
}

fn decode_outcome(item: &Value) -> Option<OutcomeRecord> {
    let raw = RawOutcome::deserialize(item).ok()?;
    let id = match raw.id {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let roll = u8::try_from(raw.roll).ok().filter(|r| *r <= MAX_ROLL)?;
    let color_code = u8::try_from(raw.color).ok().filter(|c| *c <= 2)?;
    let occurred_at = parse_timestamp(&raw.created_at)?;
    Some(OutcomeRecord {
        id,
        roll,
        color_code,
        occurred_at,
    })
}

/// Parse the feed's `created_at`.
///
/// RFC 3339 with an offset is preferred; naive date-times are taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Placeholder history shown while the feed is unreachable.
///
/// Always `HISTORY_LIMIT` records spaced one minute apart, newest at `now`.
pub fn synthetic_history<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> Vec<OutcomeRecord> {
    (0..HISTORY_LIMIT)
        .map(|i| OutcomeRecord {
            id: format!("synthetic-{i}"),
            roll: rng.random_range(0..=MAX_ROLL),
            color_code: rng.random_range(0..=2),
            occurred_at: now - chrono::Duration::minutes(i as i64),
        })
        .collect()
}
