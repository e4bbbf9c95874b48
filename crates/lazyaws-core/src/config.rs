//! Client configuration, retry settings and region handling.
//!
//! A [`Configuration`] is immutable once handed to a client; every client
//! and credential provider shares it through an `Arc`. Settings come from
//! explicit `with_*` overrides on top of [`Configuration::from_env`].

use crate::error::{ErrorKind, SdkResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

// ── Regions ─────────────────────────────────────────────────────────────

/// Standard AWS regions known at build time. Regions outside this list are
/// still accepted when syntactically valid.
pub const AWS_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "af-south-1",
    "ap-east-1",
    "ap-south-1",
    "ap-south-2",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-southeast-3",
    "ap-southeast-4",
    "ap-northeast-1",
    "ap-northeast-2",
    "ap-northeast-3",
    "ca-central-1",
    "ca-west-1",
    "eu-central-1",
    "eu-central-2",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "eu-south-1",
    "eu-south-2",
    "eu-north-1",
    "il-central-1",
    "me-south-1",
    "me-central-1",
    "sa-east-1",
    "us-gov-east-1",
    "us-gov-west-1",
    "cn-north-1",
    "cn-northwest-1",
    "us-iso-east-1",
    "us-iso-west-1",
    "us-isob-east-1",
];

pub const DEFAULT_REGION: &str = "us-east-1";

/// Whether `region` is a syntactically valid region name:
/// lowercase ASCII letters, digits and inner dashes.
pub fn is_valid_region(region: &str) -> bool {
    !region.is_empty()
        && !region.starts_with('-')
        && !region.ends_with('-')
        && region
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// Return the partition for a region (aws, aws-cn, aws-us-gov, aws-iso, aws-iso-b).
pub fn partition(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "aws-cn"
    } else if region.starts_with("us-gov-") {
        "aws-us-gov"
    } else if region.starts_with("us-isob-") {
        "aws-iso-b"
    } else if region.starts_with("us-iso-") {
        "aws-iso"
    } else {
        "aws"
    }
}

// ── Retry ───────────────────────────────────────────────────────────────

/// Retry behaviour of the HTTP transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first (default: 3).
    pub max_attempts: u32,
    pub mode: RetryMode,
    /// Initial backoff duration in milliseconds (default: 500).
    pub initial_backoff_ms: u64,
    /// Maximum backoff duration in milliseconds (default: 20_000).
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            mode: RetryMode::Standard,
            initial_backoff_ms: 500,
            max_backoff_ms: 20_000,
        }
    }
}

impl RetryConfig {
    /// Backoff before retry number `attempt` (0-based), in milliseconds.
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let exponential = self
            .initial_backoff_ms
            .saturating_mul(2u64.saturating_pow(attempt));
        let capped = exponential.min(self.max_backoff_ms);

        match self.mode {
            RetryMode::Adaptive | RetryMode::Standard => {
                // Full jitter: random between 0 and capped
                use rand::Rng;
                let mut rng = rand::thread_rng();
                rng.gen_range(0..=capped)
            }
            RetryMode::Legacy => capped,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RetryMode {
    /// Exponential backoff with full jitter.
    Standard,
    /// Same backoff as `Standard`.
    Adaptive,
    /// Exponential backoff without jitter.
    Legacy,
}

impl std::str::FromStr for RetryMode {
    type Err = ErrorKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "standard" => Ok(RetryMode::Standard),
            "adaptive" => Ok(RetryMode::Adaptive),
            "legacy" => Ok(RetryMode::Legacy),
            other => Err(ErrorKind::Configuration(format!(
                "unknown retry mode \"{}\"",
                other
            ))),
        }
    }
}

// ── Configuration ───────────────────────────────────────────────────────

/// Immutable settings shared by clients and credential providers.
///
/// Static credentials set here are consumed only by the static credential
/// provider; every other credential source reads its own environment.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Configuration {
    pub region: String,
    pub profile: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    /// Overrides `~/.aws/credentials`.
    pub shared_credentials_file: Option<PathBuf>,
    /// Overrides `~/.aws/config`.
    pub shared_config_file: Option<PathBuf>,
    /// Replaces the resolved service endpoint (scheme and host).
    pub endpoint: Option<String>,
    pub role_arn: Option<String>,
    pub role_session_name: Option<String>,
    pub web_identity_token_file: Option<PathBuf>,
    /// Base URL of the EC2 instance metadata service.
    pub instance_metadata_endpoint: String,
    /// Base URL used with `AWS_CONTAINER_CREDENTIALS_RELATIVE_URI`.
    pub container_metadata_endpoint: String,
    /// Credentials expiring within this window are refreshed early.
    pub credential_refresh_margin_secs: u64,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
    pub retry: RetryConfig,
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("region", &self.region)
            .field("profile", &self.profile)
            .field("access_key_id", &self.access_key_id)
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "***"),
            )
            .field("session_token", &self.session_token.as_ref().map(|_| "***"))
            .field("endpoint", &self.endpoint)
            .field("role_arn", &self.role_arn)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            profile: "default".to_string(),
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            shared_credentials_file: None,
            shared_config_file: None,
            endpoint: None,
            role_arn: None,
            role_session_name: None,
            web_identity_token_file: None,
            instance_metadata_endpoint: "http://169.254.169.254".to_string(),
            container_metadata_endpoint: "http://169.254.170.2".to_string(),
            credential_refresh_margin_secs: 300,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: format!("lazyaws/{}", env!("CARGO_PKG_VERSION")),
            retry: RetryConfig::default(),
        }
    }
}

impl Configuration {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(env_var)
    }

    /// Defaults overlaid with values from `lookup`, which receives
    /// environment variable names.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(region) = lookup("AWS_REGION").or_else(|| lookup("AWS_DEFAULT_REGION")) {
            config.region = region;
        }
        if let Some(profile) = lookup("AWS_PROFILE").or_else(|| lookup("AWS_DEFAULT_PROFILE")) {
            config.profile = profile;
        }
        config.shared_credentials_file = lookup("AWS_SHARED_CREDENTIALS_FILE").map(PathBuf::from);
        config.shared_config_file = lookup("AWS_CONFIG_FILE").map(PathBuf::from);
        config.endpoint = lookup("AWS_ENDPOINT_URL");
        if let Some(endpoint) = lookup("AWS_EC2_METADATA_SERVICE_ENDPOINT") {
            config.instance_metadata_endpoint = endpoint.trim_end_matches('/').to_string();
        }
        if let Some(attempts) = lookup("AWS_MAX_ATTEMPTS").and_then(|v| v.parse().ok()) {
            config.retry.max_attempts = attempts;
        }
        if let Some(mode) = lookup("AWS_RETRY_MODE").and_then(|v| v.parse().ok()) {
            config.retry.mode = mode;
        }
        config
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = region.to_string();
        self
    }

    pub fn with_profile(mut self, profile: &str) -> Self {
        self.profile = profile.to_string();
        self
    }

    pub fn with_credentials(mut self, access_key_id: &str, secret_access_key: &str) -> Self {
        self.access_key_id = Some(access_key_id.to_string());
        self.secret_access_key = Some(secret_access_key.to_string());
        self
    }

    pub fn with_session_token(mut self, token: &str) -> Self {
        self.session_token = Some(token.to_string());
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.trim_end_matches('/').to_string());
        self
    }

    pub fn with_shared_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.shared_credentials_file = Some(path.into());
        self
    }

    pub fn with_shared_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.shared_config_file = Some(path.into());
        self
    }

    pub fn with_role(mut self, role_arn: &str, session_name: Option<&str>) -> Self {
        self.role_arn = Some(role_arn.to_string());
        self.role_session_name = session_name.map(|s| s.to_string());
        self
    }

    pub fn with_web_identity_token_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.web_identity_token_file = Some(path.into());
        self
    }

    pub fn with_instance_metadata_endpoint(mut self, endpoint: &str) -> Self {
        self.instance_metadata_endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    pub fn with_container_metadata_endpoint(mut self, endpoint: &str) -> Self {
        self.container_metadata_endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.credential_refresh_margin_secs = margin.as_secs();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn refresh_margin(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.credential_refresh_margin_secs as i64)
    }

    /// Path of the shared credentials file, `~/.aws/credentials` by default.
    pub fn credentials_file(&self) -> Option<PathBuf> {
        self.shared_credentials_file
            .clone()
            .or_else(|| dirs::home_dir().map(|h| h.join(".aws").join("credentials")))
    }

    /// Path of the shared config file, `~/.aws/config` by default.
    pub fn config_file(&self) -> Option<PathBuf> {
        self.shared_config_file
            .clone()
            .or_else(|| dirs::home_dir().map(|h| h.join(".aws").join("config")))
    }

    /// Reject settings no request could succeed with.
    pub fn validate(&self) -> SdkResult<()> {
        if !is_valid_region(&self.region) {
            return Err(ErrorKind::Configuration(format!(
                "invalid region \"{}\"",
                self.region
            ))
            .into());
        }
        if self.access_key_id.is_some() != self.secret_access_key.is_some() {
            return Err(ErrorKind::Configuration(
                "access key id and secret access key must be set together".to_string(),
            )
            .into());
        }
        if let Some(ref endpoint) = self.endpoint {
            let parsed = url::Url::parse(endpoint).map_err(|e| {
                ErrorKind::Configuration(format!("invalid endpoint \"{}\": {}", endpoint, e))
            })?;
            if parsed.host_str().is_none() {
                return Err(ErrorKind::Configuration(format!(
                    "endpoint \"{}\" has no host",
                    endpoint
                ))
                .into());
            }
        }
        if self.retry.max_attempts == 0 {
            return Err(
                ErrorKind::Configuration("retry max_attempts must be at least 1".to_string())
                    .into(),
            );
        }
        Ok(())
    }
}

/// Read an environment variable, treating empty values as unset.
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
