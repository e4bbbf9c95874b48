use super::{CredentialProvider, Credentials};
use crate::error::{ErrorKind, SdkError, SdkResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const NONE: usize = usize::MAX;

/// Tries each provider in order and returns the first credentials found.
///
/// The provider that last succeeded is asked first on later calls; if it
/// fails, the remaining providers are scanned in order again.
#[derive(Debug)]
pub struct ChainProvider {
    providers: Vec<Arc<dyn CredentialProvider>>,
    last_success: AtomicUsize,
}

impl ChainProvider {
    pub fn new(providers: Vec<Arc<dyn CredentialProvider>>) -> Self {
        Self {
            providers,
            last_success: AtomicUsize::new(NONE),
        }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

fn reason(err: &SdkError) -> String {
    match err.kind() {
        ErrorKind::CredentialsNotFound(reason) => reason.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl CredentialProvider for ChainProvider {
    fn name(&self) -> &'static str {
        "chain"
    }

    async fn resolve(&self) -> SdkResult<Credentials> {
        let mut last_reason = String::from("no credential providers configured");
        let remembered = self.last_success.load(Ordering::Acquire);
        if let Some(provider) = self.providers.get(remembered) {
            match provider.resolve().await {
                Ok(credentials) => return Ok(credentials),
                Err(e) => {
                    last_reason = reason(&e);
                    log::debug!(
                        "Credential provider {} no longer resolves: {}",
                        provider.name(),
                        last_reason
                    );
                }
            }
        }

        for (index, provider) in self.providers.iter().enumerate() {
            if index == remembered {
                continue;
            }
            match provider.resolve().await {
                Ok(credentials) => {
                    log::debug!(
                        "Resolved credentials from {} ({}...)",
                        provider.name(),
                        credentials.access_key_id.chars().take(4).collect::<String>()
                    );
                    self.last_success.store(index, Ordering::Release);
                    return Ok(credentials);
                }
                Err(e) => {
                    match e.kind() {
                        ErrorKind::CredentialsNotFound(_) => {
                            log::debug!("Skipping credential provider {}: {}", provider.name(), reason(&e))
                        }
                        _ => log::warn!("Credential provider {} failed: {}", provider.name(), e),
                    }
                    last_reason = reason(&e);
                }
            }
        }

        self.last_success.store(NONE, Ordering::Release);
        Err(SdkError::credentials_not_found(last_reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::not_found;
    use std::sync::atomic::AtomicU32;

    #[derive(Debug)]
    struct Scripted {
        calls: AtomicU32,
        key: Option<&'static str>,
        fatal: bool,
        /// Only the first call succeeds.
        once: bool,
    }

    impl Scripted {
        fn ok(key: &'static str) -> Arc<Self> {
            Arc::new(Self { calls: AtomicU32::new(0), key: Some(key), fatal: false, once: false })
        }

        fn flaky(key: &'static str) -> Arc<Self> {
            Arc::new(Self { calls: AtomicU32::new(0), key: Some(key), fatal: false, once: true })
        }

        fn missing() -> Arc<Self> {
            Arc::new(Self { calls: AtomicU32::new(0), key: None, fatal: false, once: false })
        }

        fn broken() -> Arc<Self> {
            Arc::new(Self { calls: AtomicU32::new(0), key: None, fatal: true, once: false })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    fn chain(providers: &[&Arc<Scripted>]) -> ChainProvider {
        ChainProvider::new(
            providers
                .iter()
                .map(|p| Arc::clone(p) as Arc<dyn CredentialProvider>)
                .collect(),
        )
    }

    #[async_trait]
    impl CredentialProvider for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn resolve(&self) -> SdkResult<Credentials> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            match (self.key, self.fatal) {
                (Some(_), _) if self.once && n > 0 => {
                    Err(not_found("scripted", "token file removed"))
                }
                (Some(key), _) => Ok(Credentials::new(key, "secret")),
                (None, true) => Err(SdkError::new(ErrorKind::Transport(format!("boom #{}", n)))),
                (None, false) => Err(not_found("scripted", format!("nothing here #{}", n))),
            }
        }
    }

    #[tokio::test]
    async fn third_provider_wins_and_is_remembered() {
        let (a, b, c) = (Scripted::missing(), Scripted::broken(), Scripted::ok("AKIA3"));
        let chain = chain(&[&a, &b, &c]);

        let creds = chain.resolve().await.unwrap();
        assert_eq!(creds.access_key_id, "AKIA3");
        assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 1));

        let creds = chain.resolve().await.unwrap();
        assert_eq!(creds.access_key_id, "AKIA3");
        assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 2));
    }

    #[tokio::test]
    async fn stops_at_first_success() {
        let (a, b) = (Scripted::ok("AKIA1"), Scripted::ok("AKIA2"));
        let chain = chain(&[&a, &b]);
        assert_eq!(chain.resolve().await.unwrap().access_key_id, "AKIA1");
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn all_failing_reports_last_reason() {
        let chain = chain(&[&Scripted::broken(), &Scripted::missing()]);
        let err = chain.resolve().await.unwrap_err();
        match err.kind() {
            ErrorKind::CredentialsNotFound(reason) => assert_eq!(reason, "scripted: nothing here #0"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn remembered_provider_failure_is_reported() {
        let only = Scripted::flaky("AKIA1");
        let single = chain(&[&only]);
        assert_eq!(single.resolve().await.unwrap().access_key_id, "AKIA1");
        match single.resolve().await.unwrap_err().kind() {
            ErrorKind::CredentialsNotFound(reason) => assert_eq!(reason, "scripted: token file removed"),
            other => panic!("unexpected {:?}", other),
        }

        let (first, last) = (Scripted::missing(), Scripted::flaky("AKIA2"));
        let pair = chain(&[&first, &last]);
        pair.resolve().await.unwrap();
        match pair.resolve().await.unwrap_err().kind() {
            ErrorKind::CredentialsNotFound(reason) => assert_eq!(reason, "scripted: nothing here #1"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!((first.calls(), last.calls()), (2, 2));
    }

    #[tokio::test]
    async fn empty_chain() {
        let err = ChainProvider::new(vec![]).resolve().await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::CredentialsNotFound(_)));
    }
}
