use super::{not_found, CredentialProvider, Credentials};
use crate::config::{env_var, Configuration};
use crate::error::{ErrorKind, SdkError, SdkResult};
use crate::http::{Request, Transport};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;

/// Hosts that may serve container credentials over plain HTTP.
const ALLOWED_HTTP_HOSTS: &[&str] = &["127.0.0.1", "localhost", "[::1]", "169.254.170.2", "169.254.170.23"];

/// The JSON document served by both the container and instance metadata
/// endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CredentialsDocument {
    access_key_id: Option<String>,
    secret_access_key: Option<String>,
    token: Option<String>,
    expiration: Option<String>,
    code: Option<String>,
    message: Option<String>,
}

/// Parse a metadata credentials document.
pub(super) fn parse_document(provider: &str, body: &[u8]) -> SdkResult<Credentials> {
    let doc: CredentialsDocument = serde_json::from_slice(body).map_err(|e| {
        refresh_failed(provider, format!("invalid credentials document: {}", e))
    })?;
    if let Some(code) = doc.code.as_deref().filter(|c| *c != "Success") {
        return Err(refresh_failed(
            provider,
            format!("{}: {}", code, doc.message.unwrap_or_default()),
        ));
    }

    let (Some(access_key_id), Some(secret_access_key)) = (doc.access_key_id, doc.secret_access_key) else {
        return Err(refresh_failed(provider, "credentials document is missing keys"));
    };
    let expiration = match doc.expiration {
        Some(text) => Some(
            DateTime::parse_from_rfc3339(&text)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| refresh_failed(provider, format!("invalid Expiration \"{}\": {}", text, e)))?,
        ),
        None => None,
    };

    let mut credentials = Credentials::new(&access_key_id, &secret_access_key);
    credentials.session_token = doc.token;
    credentials.expiration = expiration;
    Ok(credentials.with_provider_name(provider))
}

pub(super) fn refresh_failed(provider: &str, reason: impl std::fmt::Display) -> SdkError {
    ErrorKind::CredentialRefreshFailed(format!("{}: {}", provider, reason)).into()
}

/// Split an absolute URL into a request.
fn request_for(method: &str, url: &url::Url) -> Request {
    let mut endpoint = format!("{}://{}", url.scheme(), url.host_str().unwrap_or_default());
    if let Some(port) = url.port() {
        endpoint.push_str(&format!(":{}", port));
    }
    let mut request = Request::new(method, url.path());
    request.endpoint = endpoint;
    request.query = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    request
}

/// ECS task role and EKS pod identity credentials.
///
/// `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI` is resolved against the
/// configured container metadata endpoint. Otherwise
/// `AWS_CONTAINER_CREDENTIALS_FULL_URI` is used as given, with the token
/// from `AWS_CONTAINER_AUTHORIZATION_TOKEN` (or the file named by
/// `AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE`) sent as `Authorization`.
#[derive(Debug, Clone)]
pub struct ContainerProvider {
    config: Arc<Configuration>,
    transport: Arc<dyn Transport>,
}

impl ContainerProvider {
    pub fn new(config: Arc<Configuration>, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    fn target(&self) -> SdkResult<url::Url> {
        let raw = match env_var("AWS_CONTAINER_CREDENTIALS_RELATIVE_URI") {
            Some(relative) => format!(
                "{}/{}",
                self.config.container_metadata_endpoint.trim_end_matches('/'),
                relative.trim_start_matches('/')
            ),
            None => env_var("AWS_CONTAINER_CREDENTIALS_FULL_URI").ok_or_else(|| {
                not_found(
                    self.name(),
                    "neither AWS_CONTAINER_CREDENTIALS_RELATIVE_URI nor AWS_CONTAINER_CREDENTIALS_FULL_URI is set",
                )
            })?,
        };

        let url = url::Url::parse(&raw).map_err(|e| {
            SdkError::from(ErrorKind::Configuration(format!(
                "invalid container credentials URI \"{}\": {}",
                raw, e
            )))
        })?;
        let host = url.host_str().unwrap_or_default();
        if url.scheme() == "http" && !ALLOWED_HTTP_HOSTS.contains(&host) {
            return Err(ErrorKind::Configuration(format!(
                "container credentials URI must use https or a loopback host, got \"{}\"",
                host
            ))
            .into());
        }
        Ok(url)
    }

    async fn authorization(&self) -> SdkResult<Option<String>> {
        if let Some(token) = env_var("AWS_CONTAINER_AUTHORIZATION_TOKEN") {
            return Ok(Some(token));
        }
        match env_var("AWS_CONTAINER_AUTHORIZATION_TOKEN_FILE") {
            Some(path) => tokio::fs::read_to_string(&path)
                .await
                .map(|t| Some(t.trim().to_string()))
                .map_err(|e| refresh_failed(self.name(), format!("cannot read {}: {}", path, e))),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl CredentialProvider for ContainerProvider {
    fn name(&self) -> &'static str {
        "container"
    }

    async fn resolve(&self) -> SdkResult<Credentials> {
        let url = self.target()?;
        let mut request = request_for("GET", &url);
        request.headers.insert("accept", "application/json");
        if let Some(token) = self.authorization().await? {
            request.headers.insert("authorization", token);
        }

        log::debug!("fetching container credentials from {}", request.url());
        let response = self
            .transport
            .send(request)
            .wait()
            .await
            .map_err(|e| refresh_failed(self.name(), e))?;
        if !response.is_success() {
            return Err(refresh_failed(
                self.name(),
                format!("HTTP {}: {}", response.status, response.text()),
            ));
        }
        parse_document(self.name(), &response.body)
    }
}
