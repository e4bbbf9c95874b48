use super::{CredentialProvider, Credentials};
use crate::error::{ErrorKind, SdkError, SdkResult};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Default)]
struct CacheState {
    credentials: Option<Credentials>,
    last_error: Option<SdkError>,
    /// Bumped after every refresh, successful or not.
    generation: u64,
}

/// Keeps the upstream provider's credentials until they are about to
/// expire.
///
/// Reads of valid credentials only take a shared lock. Refreshes are
/// serialized: callers that queued behind a refresh reuse its outcome
/// instead of asking upstream again.
#[derive(Debug)]
pub struct CacheProvider {
    upstream: Arc<dyn CredentialProvider>,
    margin: chrono::Duration,
    state: RwLock<CacheState>,
    refresh: Mutex<()>,
}

impl CacheProvider {
    pub fn new(upstream: Arc<dyn CredentialProvider>, margin: chrono::Duration) -> Self {
        Self {
            upstream,
            margin,
            state: RwLock::new(CacheState::default()),
            refresh: Mutex::new(()),
        }
    }

    /// Drop the cached credentials so the next call refreshes.
    pub async fn invalidate(&self) {
        let mut state = self.state.write().await;
        state.credentials = None;
        state.last_error = None;
        state.generation += 1;
    }

    fn usable<'a>(&self, credentials: &'a Option<Credentials>) -> Option<&'a Credentials> {
        credentials
            .as_ref()
            .filter(|c| !c.expires_within(self.margin))
    }
}

#[async_trait]
impl CredentialProvider for CacheProvider {
    fn name(&self) -> &'static str {
        "cache"
    }

    async fn resolve(&self) -> SdkResult<Credentials> {
        let seen = {
            let state = self.state.read().await;
            if let Some(credentials) = self.usable(&state.credentials) {
                return Ok(credentials.clone());
            }
            state.generation
        };

        let _refreshing = self.refresh.lock().await;
        {
            let state = self.state.read().await;
            if state.generation != seen {
                log::debug!("Reusing credentials refreshed by a concurrent caller");
                return match (&state.credentials, &state.last_error) {
                    (_, Some(err)) => Err(err.clone()),
                    (Some(credentials), None) => Ok(credentials.clone()),
                    (None, None) => Err(SdkError::credentials_not_found("credentials were invalidated")),
                };
            }
        }

        log::debug!("Refreshing credentials from {}", self.upstream.name());
        let outcome = self.upstream.resolve().await;

        let mut state = self.state.write().await;
        state.generation += 1;
        match outcome {
            Ok(credentials) => {
                state.credentials = Some(credentials.clone());
                state.last_error = None;
                Ok(credentials)
            }
            Err(err) => {
                let stale = state.credentials.clone().filter(|c| !c.is_expired());
                if let Some(credentials) = stale {
                    log::warn!("Credential refresh failed, using credentials that expire soon: {}", err);
                    state.last_error = None;
                    return Ok(credentials);
                }
                let err = if state.credentials.is_some() {
                    SdkError::new(ErrorKind::CredentialRefreshFailed(err.to_string()))
                } else {
                    err
                };
                state.credentials = None;
                state.last_error = Some(err.clone());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct Upstream {
        calls: AtomicU32,
        ttl: Option<chrono::Duration>,
        fail_after: Option<u32>,
    }

    impl Upstream {
        fn new(ttl: Option<chrono::Duration>) -> Arc<Self> {
            Arc::new(Self { calls: AtomicU32::new(0), ttl, fail_after: None })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialProvider for Upstream {
        fn name(&self) -> &'static str {
            "upstream"
        }

        async fn resolve(&self) -> SdkResult<Credentials> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail_after.map_or(false, |limit| n > limit) {
                return Err(SdkError::new(ErrorKind::Transport("metadata endpoint down".into())));
            }
            let expiration = self.ttl.map(|ttl| Utc::now() + ttl);
            Ok(Credentials::new_temporary(&format!("ASIA{}", n), "secret", "token", expiration))
        }
    }

    #[tokio::test]
    async fn long_lived_credentials_are_fetched_once() {
        let upstream = Upstream::new(Some(chrono::Duration::hours(1)));
        let cache = CacheProvider::new(upstream.clone(), chrono::Duration::minutes(5));
        for _ in 0..5 {
            assert_eq!(cache.resolve().await.unwrap().access_key_id, "ASIA1");
        }
        assert_eq!(upstream.calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_refreshes_coalesce() {
        let upstream = Upstream::new(Some(chrono::Duration::minutes(1)));
        let cache = Arc::new(CacheProvider::new(upstream.clone(), chrono::Duration::minutes(5)));

        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move { cache.resolve().await })
            })
            .collect();
        for task in futures::future::join_all(tasks).await {
            assert_eq!(task.unwrap().unwrap().access_key_id, "ASIA1");
        }
        assert_eq!(upstream.calls(), 1);

        // Still inside the margin: the next logical refresh asks upstream again.
        assert_eq!(cache.resolve().await.unwrap().access_key_id, "ASIA2");
        assert_eq!(upstream.calls(), 2);
    }

    #[tokio::test]
    async fn failure_after_success_is_refresh_failed() {
        let upstream = Arc::new(Upstream {
            calls: AtomicU32::new(0),
            ttl: Some(chrono::Duration::seconds(-1)),
            fail_after: Some(1),
        });
        let cache = CacheProvider::new(upstream.clone(), chrono::Duration::minutes(5));
        cache.resolve().await.unwrap();
        let err = cache.resolve().await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::CredentialRefreshFailed(_)));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_unexpired_credentials() {
        let upstream = Arc::new(Upstream {
            calls: AtomicU32::new(0),
            ttl: Some(chrono::Duration::minutes(2)),
            fail_after: Some(1),
        });
        let cache = CacheProvider::new(upstream.clone(), chrono::Duration::minutes(5));
        assert_eq!(cache.resolve().await.unwrap().access_key_id, "ASIA1");
        assert_eq!(cache.resolve().await.unwrap().access_key_id, "ASIA1");
        assert_eq!(upstream.calls(), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_refresh() {
        let upstream = Upstream::new(None);
        let cache = CacheProvider::new(upstream.clone(), chrono::Duration::minutes(5));
        cache.resolve().await.unwrap();
        cache.invalidate().await;
        assert_eq!(cache.resolve().await.unwrap().access_key_id, "ASIA2");
    }
}
