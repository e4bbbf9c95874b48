//! Transport implementations: a reqwest-backed one and an in-memory stub.

use crate::config::{Configuration, RetryConfig};
use crate::error::{ErrorKind, ServiceError};
use crate::http::{Headers, PendingResponse, RawResponse, Request, Transport};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── reqwest ─────────────────────────────────────────────────────────────

/// HTTP transport over a shared `reqwest::Client`.
///
/// Each request runs on its own task, started as soon as [`Transport::send`]
/// is called. Connection failures, timeouts, throttling and 5xx responses
/// are retried with exponential backoff.
#[derive(Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    retry: RetryConfig,
    user_agent: String,
}

impl ReqwestTransport {
    pub fn new(config: &Configuration) -> Result<Self, ErrorKind> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ErrorKind::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            retry: config.retry.clone(),
            user_agent: config.user_agent.clone(),
        })
    }

    /// Transport without retries and with a short timeout, for metadata
    /// endpoints that are usually unreachable off-platform.
    pub fn metadata(config: &Configuration) -> Result<Self, ErrorKind> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(1))
            .connect_timeout(Duration::from_secs(1))
            .build()
            .map_err(|e| ErrorKind::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            retry: RetryConfig {
                max_attempts: 1,
                ..config.retry.clone()
            },
            user_agent: config.user_agent.clone(),
        })
    }

    /// Execute an HTTP request with retry logic.
    async fn execute_with_retry(
        http: reqwest::Client,
        retry: RetryConfig,
        user_agent: String,
        request: Request,
    ) -> Result<RawResponse, ErrorKind> {
        let max_attempts = retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match Self::execute_once(&http, &user_agent, &request).await {
                Ok(response) => {
                    if response.is_success() || attempt + 1 >= max_attempts {
                        return Ok(response);
                    }
                    let error =
                        ServiceError::from_response("", response.status, &response.headers, &response.body);
                    if !error.retryable {
                        return Ok(response);
                    }
                    let delay = retry.backoff_ms(attempt);
                    log::warn!(
                        "{} {} retryable error (attempt {}/{}): {} - retrying in {}ms",
                        request.method,
                        request.url(),
                        attempt + 1,
                        max_attempts,
                        error.code,
                        delay
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
                Err(e) => {
                    let retryable = e.is_connect() || e.is_timeout();
                    if !retryable || attempt + 1 >= max_attempts {
                        return Err(ErrorKind::from(e));
                    }
                    let delay = retry.backoff_ms(attempt);
                    log::warn!(
                        "{} {} HTTP error (attempt {}/{}): {} - retrying in {}ms",
                        request.method,
                        request.url(),
                        attempt + 1,
                        max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
            attempt += 1;
        }
    }

    async fn execute_once(
        http: &reqwest::Client,
        user_agent: &str,
        request: &Request,
    ) -> Result<RawResponse, reqwest::Error> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .unwrap_or(reqwest::Method::GET);
        let mut req = http.request(method, request.url());
        for (name, values) in request.headers.iter() {
            for value in values {
                req = req.header(name, value.as_str());
            }
        }
        if !request.headers.contains("user-agent") {
            req = req.header("user-agent", user_agent);
        }
        if !request.body.is_empty() {
            req = req.body(request.body.clone());
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let mut headers = Headers::new();
        for (key, value) in resp.headers() {
            if let Ok(v) = value.to_str() {
                headers.append(key.as_str(), v);
            }
        }
        let body = resp.bytes().await?;
        log::debug!("{} {} -> {}", request.method, request.url(), status);

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("retry", &self.retry)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: Request) -> PendingResponse {
        if reqwest::Method::from_bytes(request.method.as_bytes()).is_err() {
            return PendingResponse::failed(ErrorKind::Transport(format!(
                "Invalid HTTP method: {}",
                request.method
            )));
        }
        PendingResponse::spawn(Self::execute_with_retry(
            self.http.clone(),
            self.retry.clone(),
            self.user_agent.clone(),
            request,
        ))
    }
}

// ── Stub ────────────────────────────────────────────────────────────────

type Handler = dyn Fn(&Request) -> Option<RawResponse> + Send + Sync;

/// In-memory transport that records requests and replays canned responses.
///
/// Queued responses are served first, in order; after that the handler (if
/// any) is consulted. A request with nothing to answer it fails with a
/// transport error.
#[derive(Clone, Default)]
pub struct StubTransport {
    responses: Arc<Mutex<VecDeque<RawResponse>>>,
    requests: Arc<Mutex<Vec<Request>>>,
    handler: Option<Arc<Handler>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stub answering every request through `handler`.
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&Request) -> Option<RawResponse> + Send + Sync + 'static,
    {
        Self {
            handler: Some(Arc::new(handler)),
            ..Self::default()
        }
    }

    /// Queue a response.
    pub fn push(&self, response: RawResponse) -> &Self {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
        self
    }

    /// Every request sent so far.
    pub fn requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn last_request(&self) -> Option<Request> {
        self.requests.lock().ok().and_then(|r| r.last().cloned())
    }
}

impl fmt::Debug for StubTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StubTransport")
            .field("requests", &self.request_count())
            .finish()
    }
}

impl Transport for StubTransport {
    fn send(&self, request: Request) -> PendingResponse {
        log::debug!("stub transport: {} {}", request.method, request.url());
        let queued = self.responses.lock().ok().and_then(|mut q| q.pop_front());
        let response = queued.or_else(|| self.handler.as_ref().and_then(|h| h(&request)));
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        match response {
            Some(response) => PendingResponse::ready(response),
            None => PendingResponse::failed(ErrorKind::Transport(format!(
                "no stubbed response for {} {}",
                request.method,
                request.url()
            ))),
        }
    }
}
