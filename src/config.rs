use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail, ensure};
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::auth::CredentialRecord;
use crate::{DEFAULT_FEED_URL, DEFAULT_RELAY_BIND, HISTORY_LIMIT, UPSTREAM_FEED_URL};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Result feed polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Endpoint returning the latest outcomes (usually the relay).
    #[serde(default = "default_feed_url")]
    pub url: String,
    /// Number of most-recent records kept for analysis (at most 20).
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// Base interval between polls in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Ceiling for the backoff delay after repeated failures.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Pass-through relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_relay_bind")]
    pub bind: String,
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Login gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Remote JSON list of `{user, pass}` records. Optional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users_url: Option<String>,
    /// Where the fetched user list is cached.
    #[serde(default = "default_cache_path")]
    pub cache_path: PathBuf,
    /// Where the logged-in username is persisted.
    #[serde(default = "default_session_path")]
    pub session_path: PathBuf,
    /// Used when the remote list cannot be fetched.
    #[serde(default)]
    pub fallback_users: Vec<CredentialRecord>,
}

fn default_feed_url() -> String {
    DEFAULT_FEED_URL.to_string()
}

fn default_history_limit() -> usize {
    HISTORY_LIMIT
}

fn default_poll_interval_ms() -> u64 {
    1_000
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_relay_bind() -> String {
    DEFAULT_RELAY_BIND.to_string()
}

fn default_upstream_url() -> String {
    UPSTREAM_FEED_URL.to_string()
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(".roll-signal/users.json")
}

fn default_session_path() -> PathBuf {
    PathBuf::from(".roll-signal/session.json")
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: default_feed_url(),
            history_limit: default_history_limit(),
            poll_interval_ms: default_poll_interval_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: default_relay_bind(),
            upstream_url: default_upstream_url(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            users_url: None,
            cache_path: default_cache_path(),
            session_path: default_session_path(),
            fallback_users: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            info!("{} not found, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Write config to the given TOML file path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.feed.url).with_context(|| format!("invalid feed.url {}", self.feed.url))?;
        Url::parse(&self.relay.upstream_url)
            .with_context(|| format!("invalid relay.upstream_url {}", self.relay.upstream_url))?;
        if let Some(users_url) = &self.auth.users_url {
            Url::parse(users_url).with_context(|| format!("invalid auth.users_url {users_url}"))?;
        }
        ensure!(self.feed.poll_interval_ms > 0, "feed.poll_interval_ms must be positive");
        ensure!(
            self.feed.max_backoff_ms >= self.feed.poll_interval_ms,
            "feed.max_backoff_ms must be at least feed.poll_interval_ms"
        );
        if !(1..=HISTORY_LIMIT).contains(&self.feed.history_limit) {
            bail!("feed.history_limit must be between 1 and {HISTORY_LIMIT}");
        }
        Ok(())
    }
}
