//! Error types for every layer of the runtime core.
//!
//! Failures are split in two parts: [`ErrorKind`] says *what* went wrong
//! (callers branch on it), [`SdkError`] adds the operation that was being
//! executed. Service-reported failures carry a [`ServiceError`] payload that
//! follows the AWS error model: code, message, HTTP status and request id.

use crate::http::Headers;
use crate::protocol::xml::XmlNode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error reported by a remote service in a non-2xx response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceError {
    /// The AWS error code (e.g., "InvalidParameterValue", "AccessDenied").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// The HTTP status code returned by the AWS API.
    pub status_code: u16,
    /// AWS request ID for tracing (returned in response headers or body).
    pub request_id: Option<String>,
    /// The service that returned the error (e.g., "sqs", "s3").
    pub service: String,
    /// Exception name declared by the service definition for `code`.
    pub exception: Option<String>,
    /// Whether a transport-level retry could succeed.
    pub retryable: bool,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AWS {} error [{}]: {} (HTTP {})",
            self.service,
            self.exception.as_deref().unwrap_or(&self.code),
            self.message,
            self.status_code
        )?;
        if let Some(ref req_id) = self.request_id {
            write!(f, " [RequestId: {}]", req_id)?;
        }
        Ok(())
    }
}

impl ServiceError {
    pub fn new(service: &str, code: &str, message: &str, status_code: u16) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            status_code,
            request_id: None,
            service: service.to_string(),
            exception: None,
            retryable: Self::is_retryable_code(code, status_code),
        }
    }

    pub fn with_request_id(mut self, id: String) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn with_exception(mut self, exception: &str) -> Self {
        self.exception = Some(exception.to_string());
        self
    }

    /// Determine if an error code/status is retryable per AWS SDK retry policy.
    pub fn is_retryable_code(code: &str, status_code: u16) -> bool {
        if matches!(status_code, 429 | 500 | 502 | 503 | 504) {
            return true;
        }
        matches!(
            code,
            "Throttling"
                | "ThrottlingException"
                | "ThrottledException"
                | "RequestThrottledException"
                | "TooManyRequestsException"
                | "ProvisionedThroughputExceededException"
                | "TransactionInProgressException"
                | "RequestLimitExceeded"
                | "BandwidthLimitExceeded"
                | "LimitExceededException"
                | "RequestThrottled"
                | "SlowDown"
                | "InternalError"
                | "InternalFailure"
                | "ServiceUnavailable"
                | "RequestTimeout"
                | "RequestTimeoutException"
                | "IDPCommunicationError"
        )
    }

    /// Build a service error from a failed response.
    ///
    /// The error code is taken, in order, from the `x-amzn-errortype`
    /// header, a JSON body (`__type` / `code`) or an XML body (`<Code>`).
    pub fn from_response(service: &str, status_code: u16, headers: &Headers, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        let trimmed = text.trim_start();

        let mut err = if trimmed.starts_with('<') {
            Self::parse_xml_error(service, status_code, trimmed)
        } else if trimmed.starts_with('{') {
            Self::parse_json_error(service, status_code, trimmed)
        } else {
            Self::new(
                service,
                "UnknownError",
                &format!("HTTP {} from {}", status_code, service),
                status_code,
            )
        };

        if let Some(header_code) = headers.get("x-amzn-errortype") {
            // "ResourceNotFoundException:http://internal.amazon.com/..."
            let code = header_code.split(':').next().unwrap_or(header_code).trim();
            if !code.is_empty() {
                err.code = code.to_string();
                err.retryable = Self::is_retryable_code(code, status_code);
            }
        }

        if err.request_id.is_none() {
            err.request_id = headers
                .get("x-amzn-requestid")
                .or_else(|| headers.get("x-amz-request-id"))
                .map(|s| s.to_string());
        }
        err
    }

    /// Parse an AWS XML error response.
    ///
    /// Both the query-protocol envelope and the bare S3 form are accepted:
    /// ```xml
    /// <ErrorResponse>
    ///   <Error><Code>InvalidParameterValue</Code><Message>...</Message></Error>
    ///   <RequestId>abc-123</RequestId>
    /// </ErrorResponse>
    /// ```
    pub fn parse_xml_error(service: &str, status_code: u16, body: &str) -> Self {
        let root = match XmlNode::parse(body.as_bytes()) {
            Ok(root) => root,
            Err(e) => {
                return Self::new(
                    service,
                    "ParseError",
                    &format!("Failed to parse error response: {}", e),
                    status_code,
                )
            }
        };

        let code = root
            .find("Code")
            .map(|n| n.text.trim().to_string())
            .unwrap_or_else(|| "UnknownError".to_string());
        let message = root
            .find("Message")
            .or_else(|| root.find("message"))
            .map(|n| n.text.trim().to_string())
            .unwrap_or_else(|| format!("HTTP {} from {}", status_code, service));
        let request_id = root
            .find("RequestId")
            .or_else(|| root.find("RequestID"))
            .map(|n| n.text.trim().to_string());

        let mut err = Self::new(service, &code, &message, status_code);
        err.request_id = request_id;
        err
    }

    /// Parse an AWS JSON error response.
    ///
    /// ```json
    /// { "__type": "com.amazonaws.dynamodb.v20120810#ResourceNotFoundException",
    ///   "message": "Requested resource not found" }
    /// ```
    pub fn parse_json_error(service: &str, status_code: u16, body: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(val) => {
                let code = val
                    .get("__type")
                    .or_else(|| val.get("code"))
                    .or_else(|| val.get("Code"))
                    .and_then(|v| v.as_str())
                    .map(|s| s.rsplit('#').next().unwrap_or(s).to_string())
                    .unwrap_or_else(|| "UnknownError".to_string());
                let message = val
                    .get("message")
                    .or_else(|| val.get("Message"))
                    .or_else(|| val.get("errorMessage"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("Unknown error")
                    .to_string();
                Self::new(service, &code, &message, status_code)
            }
            Err(_) => Self::new(
                service,
                "ParseError",
                &format!(
                    "Failed to parse error response: {}",
                    body.chars().take(200).collect::<String>()
                ),
                status_code,
            ),
        }
    }
}

/// Every failure the runtime core can produce.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ErrorKind {
    #[error("missing parameter \"{member}\" for \"{shape}\"; the value cannot be null")]
    MissingRequiredParameter { member: String, shape: String },

    #[error("invalid member \"{member}\" for \"{shape}\"")]
    UnknownMember { member: String, shape: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("credentials not found: {0}")]
    CredentialsNotFound(String),

    #[error("credential refresh failed: {0}")]
    CredentialRefreshFailed(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("redirection: {0}")]
    Redirection(ServiceError),

    #[error("{0}")]
    Client(ServiceError),

    #[error("{0}")]
    Service(ServiceError),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("waiter \"{waiter}\" timed out after {attempts} attempts")]
    WaiterTimeout { waiter: String, attempts: u32 },

    #[error("waiter \"{waiter}\" was cancelled after {attempts} attempts")]
    WaiterCancelled { waiter: String, attempts: u32 },

    #[error("waiter \"{waiter}\" reached a failure state after {attempts} attempts")]
    WaiterFailure { waiter: String, attempts: u32 },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("invalid service model: {0}")]
    Model(String),
}

impl ErrorKind {
    /// Classify a service error by HTTP status.
    pub fn from_service_error(err: ServiceError) -> Self {
        match err.status_code {
            300..=399 => ErrorKind::Redirection(err),
            400..=499 => ErrorKind::Client(err),
            _ => ErrorKind::Service(err),
        }
    }
}

impl From<reqwest::Error> for ErrorKind {
    fn from(err: reqwest::Error) -> Self {
        ErrorKind::Transport(err.to_string())
    }
}

/// An [`ErrorKind`] tagged with the operation that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct SdkError {
    operation: Option<String>,
    kind: ErrorKind,
}

impl SdkError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            operation: None,
            kind,
        }
    }

    /// Attach the originating operation. An operation already recorded is
    /// kept, so nested calls report the innermost operation.
    pub fn with_operation(mut self, operation: &str) -> Self {
        if self.operation.is_none() {
            self.operation = Some(operation.to_string());
        }
        self
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    /// The service-reported payload, for redirection/client/server errors.
    pub fn service_error(&self) -> Option<&ServiceError> {
        match &self.kind {
            ErrorKind::Redirection(e) | ErrorKind::Client(e) | ErrorKind::Service(e) => Some(e),
            _ => None,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        self.service_error().and_then(|e| e.request_id.as_deref())
    }

    /// Service error code, e.g. `"AWS.SimpleQueueService.NonExistentQueue"`.
    pub fn code(&self) -> Option<&str> {
        self.service_error().map(|e| e.code.as_str())
    }

    pub fn missing_required(member: &str, shape: &str) -> Self {
        Self::new(ErrorKind::MissingRequiredParameter {
            member: member.to_string(),
            shape: shape.to_string(),
        })
    }

    pub fn unknown_member(member: &str, shape: &str) -> Self {
        Self::new(ErrorKind::UnknownMember {
            member: member.to_string(),
            shape: shape.to_string(),
        })
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument(message.into()))
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedResponse(message.into()))
    }

    pub fn credentials_not_found(reason: impl Into<String>) -> Self {
        Self::new(ErrorKind::CredentialsNotFound(reason.into()))
    }

    pub fn signing(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Signing(message.into()))
    }

    pub fn model(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Model(message.into()))
    }
}

impl fmt::Display for SdkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operation {
            Some(ref op) => write!(f, "{}: {}", op, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl std::error::Error for SdkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl From<ErrorKind> for SdkError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// Convenience result type for SDK operations.
pub type SdkResult<T> = Result<T, SdkError>;
