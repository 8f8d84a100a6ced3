pub mod api;
pub mod auth;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod poller;
pub mod relay;
pub mod reporter;
pub mod state;
pub mod types;

/// Number of most-recent outcomes kept for display and analysis.
pub const HISTORY_LIMIT: usize = 20;

/// Upstream result feed the relay forwards to (public, no auth required).
pub const UPSTREAM_FEED_URL: &str = "https://wallanchefe00.shop/api.php";

/// Path the relay serves the forwarded results on.
pub const RELAY_RESULTS_PATH: &str = "/api/results";

/// Default relay listen address.
pub const DEFAULT_RELAY_BIND: &str = "0.0.0.0:8787";

/// Default feed endpoint for the signal CLI: the local relay.
pub const DEFAULT_FEED_URL: &str = "http://127.0.0.1:8787/api/results";
