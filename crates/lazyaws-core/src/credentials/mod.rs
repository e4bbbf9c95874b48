//! Credentials and the providers that resolve them.
//!
//! Every source implements [`CredentialProvider`]. Sources are combined
//! with [`ChainProvider`] (first success wins) and wrapped in
//! [`CacheProvider`] so refreshes happen once per expiry window.
//! [`default_chain`] assembles the usual lookup order.

mod cache;
mod chain;
mod container;
mod environment;
mod instance;
mod profile;
mod static_provider;
mod web_identity;

pub use cache::CacheProvider;
pub use chain::ChainProvider;
pub use container::ContainerProvider;
pub use environment::EnvironmentProvider;
pub use instance::InstanceProvider;
pub use profile::{IniFileProvider, Profile, ProfileSet};
pub use static_provider::StaticProvider;
pub use web_identity::WebIdentityProvider;

use crate::config::Configuration;
use crate::error::{SdkError, SdkResult};
use crate::http::Transport;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// An access key pair, optionally temporary.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    /// Access key ID (starts with AKIA for long-term, ASIA for temporary).
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Present for temporary credentials.
    pub session_token: Option<String>,
    /// When these credentials expire (None for long-term IAM credentials).
    pub expiration: Option<DateTime<Utc>>,
    /// Provider name for debugging.
    pub provider_name: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .field("expiration", &self.expiration)
            .field("provider_name", &self.provider_name)
            .finish()
    }
}

impl Credentials {
    /// Create new long-term credentials.
    pub fn new(access_key_id: &str, secret_access_key: &str) -> Self {
        Self {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            session_token: None,
            expiration: None,
            provider_name: None,
        }
    }

    /// Create temporary credentials with a session token.
    pub fn new_temporary(
        access_key_id: &str,
        secret_access_key: &str,
        session_token: &str,
        expiration: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            session_token: Some(session_token.to_string()),
            expiration,
            provider_name: None,
        }
    }

    pub fn with_provider_name(mut self, name: &str) -> Self {
        self.provider_name = Some(name.to_string());
        self
    }

    /// Check if these credentials have expired.
    pub fn is_expired(&self) -> bool {
        self.expires_within(chrono::Duration::zero())
    }

    /// Whether the credentials expire before `margin` has elapsed.
    /// Credentials without an expiration never expire.
    pub fn expires_within(&self, margin: chrono::Duration) -> bool {
        match self.expiration {
            Some(exp) => Utc::now() + margin >= exp,
            None => false,
        }
    }

    /// Check if credentials are temporary (have a session token).
    pub fn is_temporary(&self) -> bool {
        self.session_token.is_some()
    }
}

/// A source of credentials.
///
/// `resolve` returns `CredentialsNotFound` when the source simply is not
/// configured, so a chain can move on to the next source.
#[async_trait]
pub trait CredentialProvider: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    async fn resolve(&self) -> SdkResult<Credentials>;
}

#[async_trait]
impl<P: CredentialProvider + ?Sized> CredentialProvider for Arc<P> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn resolve(&self) -> SdkResult<Credentials> {
        (**self).resolve().await
    }
}

/// Static configuration, environment, web identity, shared files,
/// container metadata and instance metadata, in that order, behind a
/// cache.
pub fn default_chain(
    config: Arc<Configuration>,
    transport: Arc<dyn Transport>,
    metadata_transport: Arc<dyn Transport>,
) -> CacheProvider {
    let mut providers: Vec<Arc<dyn CredentialProvider>> = Vec::new();
    if let Some(static_provider) = StaticProvider::from_configuration(&config) {
        providers.push(Arc::new(static_provider));
    }
    providers.push(Arc::new(EnvironmentProvider::new()));
    providers.push(Arc::new(WebIdentityProvider::new(
        config.clone(),
        transport.clone(),
    )));
    providers.push(Arc::new(IniFileProvider::new(config.clone(), transport)));
    providers.push(Arc::new(ContainerProvider::new(
        config.clone(),
        metadata_transport.clone(),
    )));
    providers.push(Arc::new(InstanceProvider::new(
        config.clone(),
        metadata_transport,
    )));

    CacheProvider::new(Arc::new(ChainProvider::new(providers)), config.refresh_margin())
}

pub(crate) fn not_found(provider: &str, reason: impl fmt::Display) -> SdkError {
    SdkError::credentials_not_found(format!("{}: {}", provider, reason))
}
