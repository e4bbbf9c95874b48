use super::{not_found, CredentialProvider, Credentials};
use crate::config::{env_var, Configuration};
use crate::error::SdkResult;
use crate::http::Transport;
use crate::sts;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Exchanges an OIDC token file for role credentials through
/// `AssumeRoleWithWebIdentity` (EKS service accounts and similar).
///
/// Reads `AWS_WEB_IDENTITY_TOKEN_FILE`, `AWS_ROLE_ARN` and
/// `AWS_ROLE_SESSION_NAME`, falling back to the configuration. The token
/// file is re-read on every resolve since it is rotated in place.
#[derive(Debug, Clone)]
pub struct WebIdentityProvider {
    config: Arc<Configuration>,
    transport: Arc<dyn Transport>,
}

impl WebIdentityProvider {
    pub fn new(config: Arc<Configuration>, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    fn token_file(&self) -> Option<PathBuf> {
        env_var("AWS_WEB_IDENTITY_TOKEN_FILE")
            .map(PathBuf::from)
            .or_else(|| self.config.web_identity_token_file.clone())
    }

    fn role_arn(&self) -> Option<String> {
        env_var("AWS_ROLE_ARN").or_else(|| self.config.role_arn.clone())
    }

    fn session_name(&self) -> String {
        env_var("AWS_ROLE_SESSION_NAME")
            .or_else(|| self.config.role_session_name.clone())
            .unwrap_or_else(sts::default_session_name)
    }
}

#[async_trait]
impl CredentialProvider for WebIdentityProvider {
    fn name(&self) -> &'static str {
        "web_identity"
    }

    async fn resolve(&self) -> SdkResult<Credentials> {
        let token_file = self
            .token_file()
            .ok_or_else(|| not_found(self.name(), "AWS_WEB_IDENTITY_TOKEN_FILE is not set"))?;
        let role_arn = self
            .role_arn()
            .ok_or_else(|| not_found(self.name(), "AWS_ROLE_ARN is not set"))?;

        let token = tokio::fs::read_to_string(&token_file).await.map_err(|e| {
            not_found(
                self.name(),
                format!("cannot read token file {}: {}", token_file.display(), e),
            )
        })?;
        let token = token.trim();
        if token.is_empty() {
            return Err(not_found(
                self.name(),
                format!("token file {} is empty", token_file.display()),
            ));
        }

        log::debug!("assuming {} with web identity token", role_arn);
        let credentials = sts::assume_role_with_web_identity(
            &self.config,
            self.transport.clone(),
            &role_arn,
            &self.session_name(),
            token,
        )
        .await?;
        Ok(credentials.with_provider_name(self.name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::http::RawResponse;
    use crate::sts::tests::assume_role_body;
    use crate::transport::StubTransport;
    use serial_test::serial;
    use std::io::Write;

    fn clear_env() {
        std::env::remove_var("AWS_WEB_IDENTITY_TOKEN_FILE");
        std::env::remove_var("AWS_ROLE_ARN");
        std::env::remove_var("AWS_ROLE_SESSION_NAME");
    }

    #[tokio::test]
    #[serial]
    async fn unconfigured_is_not_found() {
        clear_env();
        let stub = StubTransport::new();
        let provider =
            WebIdentityProvider::new(Arc::new(Configuration::default()), Arc::new(stub.clone()));
        let err = provider.resolve().await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::CredentialsNotFound(_)));
        assert_eq!(stub.request_count(), 0);
    }

    #[tokio::test]
    #[serial]
    async fn exchanges_token_from_environment() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "eyJraWQiOiJ0ZXN0In0").unwrap();
        std::env::set_var("AWS_WEB_IDENTITY_TOKEN_FILE", file.path());
        std::env::set_var("AWS_ROLE_ARN", "arn:aws:iam::123456789012:role/eks-pod");
        std::env::set_var("AWS_ROLE_SESSION_NAME", "pod-session");

        let stub = StubTransport::new();
        stub.push(RawResponse::new(200).with_body(assume_role_body("AssumeRoleWithWebIdentity", "ASIAPOD")));
        let provider =
            WebIdentityProvider::new(Arc::new(Configuration::default()), Arc::new(stub.clone()));
        let creds = provider.resolve().await.unwrap();
        clear_env();

        assert_eq!(creds.access_key_id, "ASIAPOD");
        assert_eq!(creds.provider_name.as_deref(), Some("web_identity"));
        let body = String::from_utf8(stub.last_request().unwrap().body.to_vec()).unwrap();
        assert!(body.contains("WebIdentityToken=eyJraWQiOiJ0ZXN0In0"));
        assert!(body.contains("RoleSessionName=pod-session"));
    }

    #[tokio::test]
    #[serial]
    async fn configuration_supplies_role() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "token-from-config").unwrap();
        let config = Configuration::default()
            .with_role("arn:aws:iam::123456789012:role/cfg", None)
            .with_web_identity_token_file(file.path());

        let stub = StubTransport::new();
        stub.push(RawResponse::new(200).with_body(assume_role_body("AssumeRoleWithWebIdentity", "ASIACFG")));
        let creds = WebIdentityProvider::new(Arc::new(config), Arc::new(stub.clone()))
            .resolve()
            .await
            .unwrap();
        assert_eq!(creds.access_key_id, "ASIACFG");
        let body = String::from_utf8(stub.last_request().unwrap().body.to_vec()).unwrap();
        assert!(body.contains("RoleSessionName=lazyaws-"));
    }

    #[tokio::test]
    #[serial]
    async fn missing_token_file_is_not_found() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let config = Configuration::default()
            .with_role("arn:aws:iam::123456789012:role/cfg", None)
            .with_web_identity_token_file(dir.path().join("absent"));
        let err = WebIdentityProvider::new(Arc::new(config), Arc::new(StubTransport::new()))
            .resolve()
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::CredentialsNotFound(msg) if msg.contains("absent")));
    }
}
