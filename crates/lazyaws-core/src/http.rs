//! HTTP request/response types and the transport boundary.
//!
//! A [`Transport`] accepts a fully signed [`Request`] and immediately hands
//! back a [`PendingResponse`]. The response may still be in flight; the
//! handle is awaited lazily and dropping it cancels the exchange.

use crate::error::ErrorKind;
use bytes::Bytes;
use futures::future::BoxFuture;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tokio::task::AbortHandle;

// ── Headers ─────────────────────────────────────────────────────────────

/// Case-insensitive, multi-valued header map. Names are stored lowercase
/// and iterate in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: BTreeMap<String, Vec<String>>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `name`, replacing any previous values.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        self.entries
            .insert(name.to_ascii_lowercase(), vec![value.into()]);
    }

    /// Add another value for `name`.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.entries
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .and_then(|v| v.first())
            .map(|s| s.as_str())
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.entries.remove(&name.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Headers whose name starts with `prefix` (case-insensitive), with the
    /// prefix stripped from the returned name.
    pub fn with_prefix<'a>(&'a self, prefix: &str) -> impl Iterator<Item = (&'a str, &'a str)> {
        let prefix = prefix.to_ascii_lowercase();
        self.entries.iter().filter_map(move |(k, v)| {
            k.strip_prefix(prefix.as_str())
                .filter(|rest| !rest.is_empty())
                .and_then(|rest| v.first().map(|first| (rest, first.as_str())))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (k, v) in iter {
            headers.append(k.as_ref(), v);
        }
        headers
    }
}

// ── Request / Response ──────────────────────────────────────────────────

/// An outgoing HTTP request. `path` is already URI-encoded; query pairs are
/// stored raw and encoded when the URL is rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    /// Scheme and authority, e.g. `https://sqs.us-east-1.amazonaws.com`.
    pub endpoint: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Headers,
    pub body: Bytes,
}

impl Request {
    pub fn new(method: &str, path: &str) -> Self {
        Self {
            method: method.to_string(),
            endpoint: String::new(),
            path: path.to_string(),
            query: Vec::new(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Host (and non-default port) of the endpoint.
    pub fn host(&self) -> Option<String> {
        let url = url::Url::parse(&self.endpoint).ok()?;
        let host = url.host_str()?.to_string();
        Some(match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host,
        })
    }

    /// Query string in request order. Keys without a value render bare
    /// (`?cors`).
    pub fn query_string(&self) -> String {
        self.query
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    crate::signing::uri_encode(k)
                } else {
                    format!(
                        "{}={}",
                        crate::signing::uri_encode(k),
                        crate::signing::uri_encode(v)
                    )
                }
            })
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn url(&self) -> String {
        let base = self.endpoint.trim_end_matches('/');
        let path = if self.path.is_empty() { "/" } else { &self.path };
        if self.query.is_empty() {
            format!("{}{}", base, path)
        } else {
            format!("{}{}?{}", base, path, self.query_string())
        }
    }

    /// First value of query parameter `name`.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A received HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Bytes,
}

impl RawResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn request_id(&self) -> Option<&str> {
        self.headers
            .get("x-amz-request-id")
            .or_else(|| self.headers.get("x-amzn-requestid"))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

// ── Pending response ────────────────────────────────────────────────────

type ResponseFuture = BoxFuture<'static, Result<RawResponse, ErrorKind>>;

/// Handle to a response that may still be in flight.
///
/// The underlying exchange runs at most once; every accessor awaits the
/// same outcome. Dropping the handle aborts a spawned exchange.
pub struct PendingResponse {
    future: Mutex<Option<ResponseFuture>>,
    outcome: OnceCell<Result<Arc<RawResponse>, ErrorKind>>,
    abort: Option<AbortHandle>,
}

impl PendingResponse {
    /// Wrap a future that is driven the first time the response is awaited.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<RawResponse, ErrorKind>> + Send + 'static,
    {
        Self {
            future: Mutex::new(Some(Box::pin(future))),
            outcome: OnceCell::new(),
            abort: None,
        }
    }

    /// Start `future` on the runtime right away. Must be called within a
    /// Tokio runtime.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Result<RawResponse, ErrorKind>> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        let abort = handle.abort_handle();
        let mut pending = Self::new(async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(ErrorKind::Transport(format!("request task failed: {}", e))),
            }
        });
        pending.abort = Some(abort);
        pending
    }

    pub fn ready(response: RawResponse) -> Self {
        Self {
            future: Mutex::new(None),
            outcome: OnceCell::new_with(Some(Ok(Arc::new(response)))),
            abort: None,
        }
    }

    pub fn failed(kind: ErrorKind) -> Self {
        Self {
            future: Mutex::new(None),
            outcome: OnceCell::new_with(Some(Err(kind))),
            abort: None,
        }
    }

    /// Await the response.
    pub async fn wait(&self) -> Result<Arc<RawResponse>, ErrorKind> {
        self.outcome
            .get_or_init(|| async {
                let future = self
                    .future
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .take();
                match future {
                    Some(future) => future.await.map(Arc::new),
                    None => Err(ErrorKind::Transport(
                        "response was already consumed".to_string(),
                    )),
                }
            })
            .await
            .clone()
    }

    pub async fn status(&self) -> Result<u16, ErrorKind> {
        self.wait().await.map(|r| r.status)
    }

    pub async fn headers(&self) -> Result<Headers, ErrorKind> {
        self.wait().await.map(|r| r.headers.clone())
    }

    pub async fn body(&self) -> Result<Bytes, ErrorKind> {
        self.wait().await.map(|r| r.body.clone())
    }

    /// Whether the outcome is already known.
    pub fn is_complete(&self) -> bool {
        self.outcome.initialized()
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        if let Some(ref abort) = self.abort {
            if !self.outcome.initialized() {
                log::debug!("Dropping in-flight request, aborting");
            }
            abort.abort();
        }
    }
}

impl fmt::Debug for PendingResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingResponse")
            .field("complete", &self.is_complete())
            .finish()
    }
}

/// Sends signed requests. Implementations must return without waiting
/// for the response.
pub trait Transport: Send + Sync + fmt::Debug {
    fn send(&self, request: Request) -> PendingResponse;
}
