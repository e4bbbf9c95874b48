use super::{not_found, CredentialProvider, Credentials};
use crate::config::Configuration;
use crate::error::SdkResult;
use async_trait::async_trait;

/// Fixed credentials, typically the keys set on the [`Configuration`].
#[derive(Debug, Clone)]
pub struct StaticProvider {
    credentials: Option<Credentials>,
}

impl StaticProvider {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials: Some(credentials.with_provider_name("static")),
        }
    }

    /// `None` unless both the access key id and the secret are configured.
    pub fn from_configuration(config: &Configuration) -> Option<Self> {
        let access_key_id = config.access_key_id.as_deref()?;
        let secret_access_key = config.secret_access_key.as_deref()?;
        let mut credentials = Credentials::new(access_key_id, secret_access_key);
        credentials.session_token = config.session_token.clone();
        Some(Self::new(credentials))
    }

    /// A provider that never has credentials.
    pub fn empty() -> Self {
        Self { credentials: None }
    }
}

#[async_trait]
impl CredentialProvider for StaticProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn resolve(&self) -> SdkResult<Credentials> {
        self.credentials
            .clone()
            .ok_or_else(|| not_found(self.name(), "no static credentials configured"))
    }
}
