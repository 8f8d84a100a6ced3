use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AuthConfig;

/// One `{user, pass}` entry of the credential list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub user: String,
    pub pass: String,
}

/// Boundary for checking a username/password pair.
pub trait Authenticator {
    fn verify(&self, user: &str, pass: &str) -> impl Future<Output = Result<bool>> + Send;
}

/// Persisted "who is logged in" marker. Presence alone gates access.
pub trait SessionStore {
    fn current_user(&self) -> Result<Option<String>>;
    fn set_current_user(&mut self, user: &str) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

/// Verify credentials and record the session on success.
pub async fn login<A, S>(auth: &A, sessions: &mut S, user: &str, pass: &str) -> Result<bool>
where
    A: Authenticator,
    S: SessionStore,
{
    if !auth.verify(user, pass).await? {
        warn!("Rejected login for {user}");
        return Ok(false);
    }
    sessions.set_current_user(user)?;
    info!("Logged in as {user}");
    Ok(true)
}

/// Credential list fetched from a remote JSON document.
///
/// The first successful fetch is cached on disk and reused indefinitely.
/// When the list cannot be fetched, the config's `fallback_users` apply.
pub struct CredentialList {
    http: reqwest::Client,
    users_url: Option<String>,
    cache_path: PathBuf,
    fallback: Vec<CredentialRecord>,
}

impl CredentialList {
    pub fn new(config: &AuthConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            users_url: config.users_url.clone(),
            cache_path: config.cache_path.clone(),
            fallback: config.fallback_users.clone(),
        })
    }

    /// Cached list, else remote list (then cached), else the fallback.
    pub async fn load(&self) -> Vec<CredentialRecord> {
        if let Some(cached) = self.read_cache() {
            return cached;
        }
        match self.fetch_remote().await {
            Ok(records) => {
                if let Err(e) = write_json(&self.cache_path, &records) {
                    warn!("Failed to cache credential list: {e:#}");
                }
                records
            }
            Err(e) => {
                warn!("Credential list unavailable ({e:#}), using fallback users");
                self.fallback.clone()
            }
        }
    }

    fn read_cache(&self) -> Option<Vec<CredentialRecord>> {
        let contents = std::fs::read_to_string(&self.cache_path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(records) => Some(records),
            Err(e) => {
                warn!("Ignoring corrupt credential cache {}: {e}", self.cache_path.display());
                None
            }
        }
    }

    async fn fetch_remote(&self) -> Result<Vec<CredentialRecord>> {
        let url = self
            .users_url
            .as_deref()
            .context("no auth.users_url configured")?;
        let resp = self.http.get(url).send().await?.error_for_status()?;
        let text = resp.text().await?;
        let records: Vec<CredentialRecord> =
            serde_json::from_str(&text).context("credential list is not a JSON list")?;
        debug!("Fetched {} credential records", records.len());
        Ok(records)
    }
}

impl Authenticator for CredentialList {
    async fn verify(&self, user: &str, pass: &str) -> Result<bool> {
        let records = self.load().await;
        Ok(records.iter().any(|r| r.user == user && r.pass == pass))
    }
}

/// Session marker kept in memory only.
#[derive(Debug, Default)]
pub struct MemorySession {
    user: Option<String>,
}

impl SessionStore for MemorySession {
    fn current_user(&self) -> Result<Option<String>> {
        Ok(self.user.clone())
    }

    fn set_current_user(&mut self, user: &str) -> Result<()> {
        self.user = Some(user.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.user = None;
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct SessionFile {
    user: String,
}

/// Session marker persisted as a small JSON file.
#[derive(Debug, Clone)]
pub struct FileSession {
    path: PathBuf,
}

impl FileSession {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStore for FileSession {
    fn current_user(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        match serde_json::from_str::<SessionFile>(&contents) {
            Ok(session) => Ok(Some(session.user)),
            Err(e) => {
                warn!("Ignoring unreadable session {}: {e}", self.path.display());
                Ok(None)
            }
        }
    }

    fn set_current_user(&mut self, user: &str) -> Result<()> {
        write_json(
            &self.path,
            &SessionFile {
                user: user.to_string(),
            },
        )
    }

    fn clear(&mut self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let contents = serde_json::to_string(value)?;
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::tests::serve;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use serde_json::json;

    fn config(dir: &Path, users_url: Option<String>) -> AuthConfig {
        AuthConfig {
            users_url,
            cache_path: dir.join("cache/users.json"),
            session_path: dir.join("session.json"),
            fallback_users: vec![CredentialRecord {
                user: "fallback".to_string(),
                pass: "pw".to_string(),
            }],
        }
    }

    // ── credential list ────────────────────────────────────────────

    #[tokio::test]
    async fn remote_list_is_used_and_cached() {
        let base = serve(Router::new().route(
            "/users",
            get(|| async { axum::Json(json!([{ "user": "alice", "pass": "s3cret" }])) }),
        ))
        .await;
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), Some(format!("{base}/users")));
        let list = CredentialList::new(&cfg).unwrap();

        assert!(list.verify("alice", "s3cret").await.unwrap());
        assert!(!list.verify("alice", "wrong").await.unwrap());
        assert!(!list.verify("fallback", "pw").await.unwrap());
        assert!(cfg.cache_path.exists());
    }

    #[tokio::test]
    async fn cache_wins_over_remote() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), Some("http://127.0.0.1:1/users".to_string()));
        write_json(
            &cfg.cache_path,
            &vec![CredentialRecord {
                user: "cached".to_string(),
                pass: "c".to_string(),
            }],
        )
        .unwrap();
        let list = CredentialList::new(&cfg).unwrap();
        assert!(list.verify("cached", "c").await.unwrap());
        assert!(!list.verify("fallback", "pw").await.unwrap());
    }

    #[tokio::test]
    async fn fetch_failure_uses_fallback() {
        let base = serve(Router::new().route(
            "/users",
            get(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
        ))
        .await;
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), Some(format!("{base}/users")));
        let list = CredentialList::new(&cfg).unwrap();
        assert!(list.verify("fallback", "pw").await.unwrap());
        assert!(!cfg.cache_path.exists());
    }

    #[tokio::test]
    async fn no_url_uses_fallback_and_corrupt_cache_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), None);
        std::fs::create_dir_all(cfg.cache_path.parent().unwrap()).unwrap();
        std::fs::write(&cfg.cache_path, "{not json").unwrap();
        let list = CredentialList::new(&cfg).unwrap();
        assert!(list.verify("fallback", "pw").await.unwrap());
    }

    // ── sessions ───────────────────────────────────────────────────

    #[test]
    fn file_session_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = FileSession::new(dir.path().join("nested/session.json"));
        assert_eq!(session.current_user().unwrap(), None);
        session.set_current_user("bob").unwrap();
        assert_eq!(session.current_user().unwrap().as_deref(), Some("bob"));
        session.clear().unwrap();
        assert_eq!(session.current_user().unwrap(), None);
        session.clear().unwrap();
    }

    #[test]
    fn memory_session_lifecycle() {
        let mut session = MemorySession::default();
        assert_eq!(session.current_user().unwrap(), None);
        session.set_current_user("carol").unwrap();
        assert_eq!(session.current_user().unwrap().as_deref(), Some("carol"));
        session.clear().unwrap();
        assert_eq!(session.current_user().unwrap(), None);
    }

    struct Fixed(bool);

    impl Authenticator for Fixed {
        async fn verify(&self, _user: &str, _pass: &str) -> Result<bool> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn login_sets_session_only_on_success() {
        let mut session = MemorySession::default();
        assert!(!login(&Fixed(false), &mut session, "dave", "x").await.unwrap());
        assert_eq!(session.current_user().unwrap(), None);
        assert!(login(&Fixed(true), &mut session, "dave", "x").await.unwrap());
        assert_eq!(session.current_user().unwrap().as_deref(), Some("dave"));
    }
}
