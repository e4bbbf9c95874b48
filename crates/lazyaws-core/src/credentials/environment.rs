use super::{not_found, CredentialProvider, Credentials};
use crate::config::env_var;
use crate::error::SdkResult;
use async_trait::async_trait;

/// Reads `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and the optional
/// `AWS_SESSION_TOKEN` on every call.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentProvider;

impl EnvironmentProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CredentialProvider for EnvironmentProvider {
    fn name(&self) -> &'static str {
        "environment"
    }

    async fn resolve(&self) -> SdkResult<Credentials> {
        let access_key_id = env_var("AWS_ACCESS_KEY_ID")
            .ok_or_else(|| not_found(self.name(), "AWS_ACCESS_KEY_ID is not set"))?;
        let secret_access_key = env_var("AWS_SECRET_ACCESS_KEY")
            .ok_or_else(|| not_found(self.name(), "AWS_SECRET_ACCESS_KEY is not set"))?;

        let mut credentials = Credentials::new(&access_key_id, &secret_access_key);
        credentials.session_token = env_var("AWS_SESSION_TOKEN");
        Ok(credentials.with_provider_name(self.name()))
    }
}
