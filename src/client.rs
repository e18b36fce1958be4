//! Retrying executor for catalog calls.
//!
//! Every call runs through the same state machine: attempt, then on a rate
//! limit wait out the server's `Retry-After`, on a server error back off
//! exponentially, and on anything else fail at once. Both retryable classes
//! share one attempt budget.
use crate::api::CatalogApi;
use crate::config::Config;
use crate::error::RemoteError;
use crate::models::{AuthContext, PlaylistSummary};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles for each later one.
    pub base_delay: Duration,
    /// Wait used when a rate-limited response carries no `Retry-After`.
    pub default_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            default_retry_after: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            max_attempts: cfg.max_attempts.max(1),
            base_delay: Duration::from_millis(cfg.backoff_base_ms),
            default_retry_after: Duration::from_secs(cfg.default_retry_after_secs),
        }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32, err: &RemoteError) -> Duration {
        match err {
            RemoteError::RateLimited { retry_after } => retry_after.unwrap_or(self.default_retry_after),
            _ => self.base_delay.saturating_mul(1u32 << attempt.saturating_sub(1).min(16)),
        }
    }

    /// Run `op` until it succeeds, fails permanently, or runs out of attempts.
    pub async fn execute<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, RemoteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(v) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", what, attempt);
                    }
                    return Ok(v);
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let wait = self.delay_for(attempt, &e);
                    warn!("{} failed (attempt {}/{}): {}. Retrying in {:?}", what, attempt, self.max_attempts, e, wait);
                    tokio::time::sleep(wait).await;
                }
                Err(e) if e.is_retryable() => {
                    warn!("{} giving up after {} attempts: {}", what, attempt, e);
                    return Err(RemoteError::Exhausted { attempts: attempt, last: Box::new(e) });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Catalog client that applies a `RetryPolicy` to every call. Holds no state
/// besides the transport, so one instance serves any number of concurrent
/// callers.
#[derive(Clone)]
pub struct RateLimitedClient {
    catalog: Arc<dyn CatalogApi>,
    policy: RetryPolicy,
}

impl RateLimitedClient {
    pub fn new(catalog: Arc<dyn CatalogApi>, policy: RetryPolicy) -> Self {
        Self { catalog, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn catalog_name(&self) -> &str {
        self.catalog.name()
    }

    /// Resolve one title to a track URI. `Ok(None)` means the catalog had no
    /// match; `Err` means the title could not be resolved this time.
    pub async fn search(&self, auth: &AuthContext, title: &str) -> Result<Option<String>, RemoteError> {
        self.policy
            .execute(&format!("search {:?}", title), || self.catalog.search_track(auth, title))
            .await
    }

    pub async fn create_playlist(&self, auth: &AuthContext, name: &str) -> Result<String, RemoteError> {
        self.policy
            .execute("create playlist", || self.catalog.create_playlist(auth, name))
            .await
    }

    pub async fn replace_tracks(&self, auth: &AuthContext, playlist_id: &str, uris: &[String]) -> Result<(), RemoteError> {
        self.policy
            .execute("replace tracks", || self.catalog.replace_tracks(auth, playlist_id, uris))
            .await
    }

    pub async fn update_details(&self, auth: &AuthContext, playlist_id: &str, name: &str, description: &str) -> Result<(), RemoteError> {
        self.policy
            .execute("update playlist details", || self.catalog.update_details(auth, playlist_id, name, description))
            .await
    }

    pub async fn playlist_description(&self, auth: &AuthContext, playlist_id: &str) -> Result<Option<String>, RemoteError> {
        self.policy
            .execute("read playlist description", || self.catalog.playlist_description(auth, playlist_id))
            .await
    }

    pub async fn list_playlists(&self, auth: &AuthContext) -> Result<Vec<PlaylistSummary>, RemoteError> {
        self.policy.execute("list playlists", || self.catalog.list_playlists(auth)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_base() {
        let policy = RetryPolicy { base_delay: Duration::from_millis(100), ..RetryPolicy::default() };
        let err = RemoteError::Server { status: 502, body: String::new() };
        let delays: Vec<u128> = (1..=4).map(|a| policy.delay_for(a, &err).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800]);
    }

    #[test]
    fn attempt_zero_uses_base_delay() {
        let policy = RetryPolicy { base_delay: Duration::from_millis(100), ..RetryPolicy::default() };
        let err = RemoteError::Server { status: 500, body: String::new() };
        assert_eq!(policy.delay_for(0, &err), Duration::from_millis(100));
    }

    #[test]
    fn rate_limit_uses_hint_or_default() {
        let policy = RetryPolicy::default();
        let hinted = RemoteError::RateLimited { retry_after: Some(Duration::from_secs(2)) };
        let bare = RemoteError::RateLimited { retry_after: None };
        assert_eq!(policy.delay_for(3, &hinted), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1, &bare), Duration::from_secs(5));
    }
}
