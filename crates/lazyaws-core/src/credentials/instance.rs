use super::container::{parse_document, refresh_failed};
use super::{not_found, CredentialProvider, Credentials};
use crate::config::{env_var, Configuration};
use crate::error::{ErrorKind, SdkResult};
use crate::http::{RawResponse, Request, Transport};
use async_trait::async_trait;
use std::sync::Arc;

const TOKEN_PATH: &str = "/latest/api/token";
const CREDENTIALS_PATH: &str = "/latest/meta-data/iam/security-credentials/";
const TOKEN_TTL_SECONDS: &str = "21600";

/// EC2 instance profile credentials from the instance metadata service.
///
/// Uses an IMDSv2 session token and falls back to unauthenticated IMDSv1
/// requests when the token endpoint answers with anything but success.
/// `AWS_EC2_METADATA_DISABLED=true` turns the provider off.
#[derive(Debug, Clone)]
pub struct InstanceProvider {
    config: Arc<Configuration>,
    transport: Arc<dyn Transport>,
}

impl InstanceProvider {
    pub fn new(config: Arc<Configuration>, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    async fn send(&self, method: &str, path: &str, token: Option<&str>) -> Result<Arc<RawResponse>, ErrorKind> {
        let mut request = Request::new(method, path);
        request.endpoint = self.config.instance_metadata_endpoint.clone();
        match token {
            Some(token) => request.headers.insert("x-aws-ec2-metadata-token", token),
            None if method == "PUT" => request
                .headers
                .insert("x-aws-ec2-metadata-token-ttl-seconds", TOKEN_TTL_SECONDS),
            None => {}
        }
        self.transport.send(request).wait().await
    }

    /// A session token, or `None` to continue with IMDSv1.
    async fn session_token(&self) -> SdkResult<Option<String>> {
        let response = self
            .send("PUT", TOKEN_PATH, None)
            .await
            .map_err(|e| not_found(self.name(), format!("instance metadata unreachable: {}", e)))?;
        if response.is_success() {
            return Ok(Some(response.text().trim().to_string()));
        }
        if response.status == 403 {
            return Err(not_found(self.name(), "instance metadata access is disabled"));
        }
        log::debug!(
            "IMDSv2 token request returned {}; falling back to IMDSv1",
            response.status
        );
        Ok(None)
    }
}

#[async_trait]
impl CredentialProvider for InstanceProvider {
    fn name(&self) -> &'static str {
        "instance"
    }

    async fn resolve(&self) -> SdkResult<Credentials> {
        if env_var("AWS_EC2_METADATA_DISABLED").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
            return Err(not_found(self.name(), "AWS_EC2_METADATA_DISABLED is set"));
        }

        let token = self.session_token().await?;
        let token = token.as_deref();

        let listing = self
            .send("GET", CREDENTIALS_PATH, token)
            .await
            .map_err(|e| not_found(self.name(), format!("instance metadata unreachable: {}", e)))?;
        if listing.status == 404 {
            return Err(not_found(self.name(), "no instance profile attached"));
        }
        if !listing.is_success() {
            return Err(refresh_failed(self.name(), format!("HTTP {} listing roles", listing.status)));
        }
        let text = listing.text();
        let role = text
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or_else(|| not_found(self.name(), "no instance profile attached"))?;

        log::debug!("fetching instance profile credentials for role {}", role);
        let response = self
            .send("GET", &format!("{}{}", CREDENTIALS_PATH, role), token)
            .await
            .map_err(|e| refresh_failed(self.name(), e))?;
        if !response.is_success() {
            return Err(refresh_failed(self.name(), format!("HTTP {} for role {}", response.status, role)));
        }
        parse_document(self.name(), &response.body)
    }
}
