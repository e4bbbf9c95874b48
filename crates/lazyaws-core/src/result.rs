//! Lazily populated operation results.
//!
//! A [`LazyResult`] is returned as soon as a request has been handed to the
//! transport. Nothing is awaited until the first accessor runs; that call
//! waits for the response, classifies its status and either decodes the
//! output or records the service error. The outcome is cached, so every
//! later accessor sees the same data (or the same error) without touching
//! the network again.

use crate::error::{ErrorKind, SdkError, SdkResult, ServiceError};
use crate::http::{Headers, PendingResponse, RawResponse};
use crate::protocol;
use crate::service::{OperationDefinition, ServiceDefinition};
use crate::value::Value;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Decoded output of an operation.
pub trait Output: Sized + Send + Sync + 'static {
    fn from_value(value: Value) -> SdkResult<Self>;
}

impl Output for Value {
    fn from_value(value: Value) -> SdkResult<Self> {
        Ok(value)
    }
}

/// Typed operation input.
pub trait Input {
    type Output: Output;

    /// Operation name as declared in the service definition.
    const OPERATION: &'static str;

    fn to_value(&self) -> Value;
}

/// Population phase of a [`LazyResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultState {
    Unresolved,
    Resolving,
    Populated,
    Failed,
}

const UNRESOLVED: u8 = 0;
const RESOLVING: u8 = 1;
const POPULATED: u8 = 2;
const FAILED: u8 = 3;

/// Status line and headers of a received response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseInfo {
    pub status: u16,
    pub headers: Headers,
}

impl ResponseInfo {
    pub fn request_id(&self) -> Option<&str> {
        self.headers
            .get("x-amz-request-id")
            .or_else(|| self.headers.get("x-amzn-requestid"))
    }
}

/// Handle over a pending response, decoded into `T` on first access.
pub struct LazyResult<T: Output = Value> {
    service: Arc<ServiceDefinition>,
    operation: OperationDefinition,
    response: PendingResponse,
    phase: AtomicU8,
    outcome: OnceCell<SdkResult<T>>,
}

impl<T: Output> LazyResult<T> {
    pub fn new(
        service: Arc<ServiceDefinition>,
        operation: &str,
        response: PendingResponse,
    ) -> SdkResult<Self> {
        let operation = service.operation(operation)?.clone();
        Ok(Self {
            service,
            operation,
            response,
            phase: AtomicU8::new(UNRESOLVED),
            outcome: OnceCell::new(),
        })
    }

    pub fn operation(&self) -> &str {
        &self.operation.name
    }

    pub fn state(&self) -> ResultState {
        match self.phase.load(Ordering::Acquire) {
            UNRESOLVED => ResultState::Unresolved,
            RESOLVING => ResultState::Resolving,
            POPULATED => ResultState::Populated,
            _ => ResultState::Failed,
        }
    }

    /// Wait for the response and populate the result without reading it.
    pub async fn resolve(&self) -> SdkResult<()> {
        self.populate().await.as_ref().map(|_| ()).map_err(Clone::clone)
    }

    /// The decoded output, or the error the call ended with.
    pub async fn output(&self) -> SdkResult<&T> {
        self.populate().await.as_ref().map_err(Clone::clone)
    }

    pub async fn into_output(self) -> SdkResult<T> {
        self.populate().await;
        match self.outcome.into_inner() {
            Some(outcome) => outcome,
            None => Err(SdkError::new(ErrorKind::Transport(
                "result was never populated".to_string(),
            ))),
        }
    }

    /// Status and headers, without decoding or classifying the body.
    pub async fn info(&self) -> SdkResult<ResponseInfo> {
        let response = self.wait_response().await?;
        Ok(ResponseInfo {
            status: response.status,
            headers: response.headers.clone(),
        })
    }

    pub async fn status_code(&self) -> SdkResult<u16> {
        self.info().await.map(|i| i.status)
    }

    pub async fn request_id(&self) -> SdkResult<Option<String>> {
        self.wait_response()
            .await
            .map(|r| r.request_id().map(|s| s.to_string()))
    }

    async fn wait_response(&self) -> SdkResult<Arc<RawResponse>> {
        self.response
            .wait()
            .await
            .map_err(|kind| SdkError::new(kind).with_operation(&self.operation.name))
    }

    async fn populate(&self) -> &SdkResult<T> {
        self.outcome
            .get_or_init(|| async {
                let _ = self.phase.compare_exchange(
                    UNRESOLVED,
                    RESOLVING,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                let outcome = self.decode().await;
                let phase = if outcome.is_ok() { POPULATED } else { FAILED };
                self.phase.store(phase, Ordering::Release);
                outcome
            })
            .await
    }

    async fn decode(&self) -> SdkResult<T> {
        let response = self.wait_response().await?;
        let name = &self.operation.name;
        if !response.is_success() {
            return Err(classify(&self.service, &response).with_operation(name));
        }
        let value = protocol::unmarshal(&self.service, &self.operation, &response)
            .map_err(|e| e.with_operation(name))?;
        T::from_value(value).map_err(|e| e.with_operation(name))
    }
}

impl<T: Output> fmt::Debug for LazyResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyResult")
            .field("service", &self.service.name)
            .field("operation", &self.operation.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Turn a non-2xx response into a typed error.
pub(crate) fn classify(service: &ServiceDefinition, response: &RawResponse) -> SdkError {
    let mut err = ServiceError::from_response(
        &service.name,
        response.status,
        &response.headers,
        &response.body,
    );
    if let Some(exception) = service.exception_for(&err.code) {
        err = err.with_exception(exception);
    }
    log::debug!(
        "{} responded {} with code {}",
        service.name,
        response.status,
        err.code
    );
    SdkError::new(ErrorKind::from_service_error(err))
}
