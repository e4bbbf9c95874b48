//! Polling an operation until its result reaches a declared state.
//!
//! A [`WaiterSpec`] lists acceptors that are checked in order against each
//! attempt. The first acceptor that matches decides the attempt: success
//! and failure end the wait, retry schedules another attempt after the
//! configured delay. An attempt that no acceptor matches is retried as well.

use crate::client::Client;
use crate::error::{ErrorKind, SdkError, SdkResult};
use crate::result::LazyResult;
use crate::value::Value;
use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

// ── Waiter definition ────────────────────────────────────────────────────

/// Time between attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum Delay {
    Fixed(Duration),
    /// `base * 2^(attempt-1)`, capped at `max`, with a random delay between
    /// `base` and the capped value.
    Exponential { base: Duration, max: Duration },
}

impl Delay {
    /// Delay before the attempt following attempt number `attempt` (1-based).
    pub fn for_attempt(&self, attempt: u32) -> Duration {
        match *self {
            Delay::Fixed(d) => d,
            Delay::Exponential { base, max } => {
                let exp = 2u64.saturating_pow(attempt.saturating_sub(1).min(31));
                let base_ms = base.as_millis() as u64;
                let cap_ms = base_ms.saturating_mul(exp).min(max.as_millis() as u64);
                if cap_ms <= base_ms {
                    return Duration::from_millis(cap_ms);
                }
                Duration::from_millis(rand::thread_rng().gen_range(base_ms..=cap_ms))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptorState {
    Success,
    Failure,
    Retry,
}

/// What an acceptor inspects.
#[derive(Debug, Clone, PartialEq)]
pub enum Matcher {
    /// The value at `path` equals `expected`.
    Path { path: String, expected: Value },
    /// Every value of a projection equals `expected` (and there is one).
    PathAll { path: String, expected: Value },
    /// At least one value of a projection equals `expected`.
    PathAny { path: String, expected: Value },
    /// The HTTP status code.
    Status(u16),
    /// The service error code or its declared exception name.
    Error(String),
}

impl Matcher {
    pub fn path(path: &str, expected: impl Into<Value>) -> Self {
        Matcher::Path {
            path: path.to_string(),
            expected: expected.into(),
        }
    }

    pub fn path_all(path: &str, expected: impl Into<Value>) -> Self {
        Matcher::PathAll {
            path: path.to_string(),
            expected: expected.into(),
        }
    }

    pub fn path_any(path: &str, expected: impl Into<Value>) -> Self {
        Matcher::PathAny {
            path: path.to_string(),
            expected: expected.into(),
        }
    }

    pub fn error(code: &str) -> Self {
        Matcher::Error(code.to_string())
    }

    fn matches(&self, status: Option<u16>, outcome: Result<&Value, &SdkError>) -> bool {
        match (self, outcome) {
            (Matcher::Status(code), _) => status == Some(*code),
            (Matcher::Error(code), Err(err)) => err.service_error().map_or(false, |e| {
                e.code == *code || e.exception.as_deref() == Some(code.as_str())
            }),
            (Matcher::Path { path, expected }, Ok(value)) => {
                search(value, path).as_ref() == Some(expected)
            }
            (Matcher::PathAll { path, expected }, Ok(value)) => match search(value, path) {
                Some(Value::List(items)) => {
                    !items.is_empty() && items.iter().all(|v| v == expected)
                }
                _ => false,
            },
            (Matcher::PathAny { path, expected }, Ok(value)) => match search(value, path) {
                Some(Value::List(items)) => items.iter().any(|v| v == expected),
                _ => false,
            },
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Acceptor {
    pub matcher: Matcher,
    pub state: AcceptorState,
}

impl Acceptor {
    pub fn new(matcher: Matcher, state: AcceptorState) -> Self {
        Self { matcher, state }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaiterSpec {
    pub name: String,
    pub operation: String,
    pub delay: Delay,
    pub max_attempts: u32,
    pub acceptors: Vec<Acceptor>,
}

impl WaiterSpec {
    pub fn new(name: &str, operation: &str, delay: Delay, max_attempts: u32) -> Self {
        Self {
            name: name.to_string(),
            operation: operation.to_string(),
            delay,
            max_attempts: max_attempts.max(1),
            acceptors: Vec::new(),
        }
    }

    pub fn acceptor(mut self, acceptor: Acceptor) -> Self {
        self.acceptors.push(acceptor);
        self
    }

    pub fn success(self, matcher: Matcher) -> Self {
        self.acceptor(Acceptor::new(matcher, AcceptorState::Success))
    }

    pub fn failure(self, matcher: Matcher) -> Self {
        self.acceptor(Acceptor::new(matcher, AcceptorState::Failure))
    }

    pub fn retry(self, matcher: Matcher) -> Self {
        self.acceptor(Acceptor::new(matcher, AcceptorState::Retry))
    }
}

// ── Path expressions ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Step {
    Field(String),
    Index(i64),
    Project,
}

fn parse_path(path: &str) -> Vec<Step> {
    let mut steps = Vec::new();
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        let (name, mut rest) = match segment.find('[') {
            Some(i) => (&segment[..i], &segment[i..]),
            None => (segment, ""),
        };
        if !name.is_empty() {
            steps.push(Step::Field(name.to_string()));
        }
        while let Some(end) = rest.find(']') {
            let inner = rest[1..end].trim();
            if inner.is_empty() {
                steps.push(Step::Project);
            } else if let Ok(i) = inner.parse() {
                steps.push(Step::Index(i));
            }
            rest = &rest[end + 1..];
        }
    }
    steps
}

/// Evaluate a dotted path with `[]` projections and `[N]` indexes.
/// Projections yield a flat list.
pub fn search(value: &Value, path: &str) -> Option<Value> {
    eval(value, &parse_path(path))
}

fn eval(value: &Value, steps: &[Step]) -> Option<Value> {
    let (step, rest) = match steps.split_first() {
        Some(split) => split,
        None => return Some(value.clone()),
    };
    match step {
        Step::Field(name) => eval(value.get(name)?, rest),
        Step::Index(i) => {
            let items = value.as_list()?;
            let idx = if *i < 0 { items.len() as i64 + i } else { *i };
            eval(items.get(usize::try_from(idx).ok()?)?, rest)
        }
        Step::Project => {
            let nested = rest.contains(&Step::Project);
            let mut out = Vec::new();
            for item in value.as_list()? {
                match eval(item, rest) {
                    Some(Value::List(inner)) if nested => out.extend(inner),
                    Some(v) => out.push(v),
                    None => {}
                }
            }
            Some(Value::List(out))
        }
    }
}

// ── Waiter ──────────────────────────────────────────────────────────────

/// Outcome of evaluating one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaiterState {
    Pending,
    Success,
    Failure,
}

/// A running wait. The first attempt is sent when the waiter is created.
#[derive(Debug)]
pub struct Waiter {
    client: Client,
    spec: WaiterSpec,
    input: Value,
    pending: Option<LazyResult>,
    attempts: u32,
}

impl Waiter {
    pub(crate) async fn start(client: Client, spec: WaiterSpec, input: Value) -> SdkResult<Self> {
        let mut waiter = Self {
            client,
            spec,
            input,
            pending: None,
            attempts: 0,
        };
        waiter.pending = Some(waiter.send().await?);
        Ok(waiter)
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Number of times the operation has been sent.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Evaluate one attempt: the pending one if any, otherwise a new call.
    pub async fn state(&mut self) -> SdkResult<WaiterState> {
        let result = match self.pending.take() {
            Some(result) => result,
            None => self.send().await?,
        };
        self.evaluate(&result).await
    }

    pub async fn wait(self) -> SdkResult<()> {
        self.wait_until(None, None).await
    }

    /// Poll until a terminal state, `max_attempts`, the deadline or
    /// cancellation, whichever comes first.
    pub async fn wait_until(
        mut self,
        deadline: Option<Instant>,
        cancel: Option<CancellationToken>,
    ) -> SdkResult<()> {
        let cancel = cancel.unwrap_or_default();
        loop {
            if cancel.is_cancelled() || deadline.map_or(false, |d| Instant::now() >= d) {
                return Err(self.cancelled());
            }

            let state = {
                let attempt = self.state();
                tokio::select! {
                    _ = cancel.cancelled() => None,
                    _ = sleep_until(deadline) => None,
                    state = attempt => Some(state),
                }
            };

            match state.ok_or_else(|| self.cancelled())?? {
                WaiterState::Success => {
                    log::debug!("waiter {} succeeded after {} attempts", self.spec.name, self.attempts);
                    return Ok(());
                }
                WaiterState::Failure => {
                    return Err(self.error(ErrorKind::WaiterFailure {
                        waiter: self.spec.name.clone(),
                        attempts: self.attempts,
                    }));
                }
                WaiterState::Pending => {}
            }

            if self.attempts >= self.spec.max_attempts {
                return Err(self.error(ErrorKind::WaiterTimeout {
                    waiter: self.spec.name.clone(),
                    attempts: self.attempts,
                }));
            }

            let delay = self.spec.delay.for_attempt(self.attempts);
            log::debug!(
                "waiter {} attempt {}/{} pending, retrying in {:?}",
                self.spec.name,
                self.attempts,
                self.spec.max_attempts,
                delay
            );
            tokio::select! {
                _ = cancel.cancelled() => return Err(self.cancelled()),
                _ = sleep_until(deadline) => return Err(self.cancelled()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn send(&mut self) -> SdkResult<LazyResult> {
        self.attempts += 1;
        self.client
            .call(&self.spec.operation, self.input.clone())
            .await
    }

    async fn evaluate(&self, result: &LazyResult) -> SdkResult<WaiterState> {
        let outcome = result.output().await;
        let status = result.status_code().await.ok();
        let view = match &outcome {
            Ok(value) => Ok(*value),
            Err(err) => Err(err),
        };
        for acceptor in &self.spec.acceptors {
            if acceptor.matcher.matches(status, view) {
                return Ok(match acceptor.state {
                    AcceptorState::Success => WaiterState::Success,
                    AcceptorState::Failure => WaiterState::Failure,
                    AcceptorState::Retry => WaiterState::Pending,
                });
            }
        }
        match outcome {
            // Errors that never reached the service cannot be matched.
            Err(err) if err.service_error().is_none() => Err(err),
            _ => Ok(WaiterState::Pending),
        }
    }

    fn error(&self, kind: ErrorKind) -> SdkError {
        SdkError::new(kind).with_operation(&self.spec.operation)
    }

    fn cancelled(&self) -> SdkError {
        log::debug!("waiter {} cancelled after {} attempts", self.spec.name, self.attempts);
        self.error(ErrorKind::WaiterCancelled {
            waiter: self.spec.name.clone(),
            attempts: self.attempts,
        })
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(d).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(status: &str) -> Value {
        Value::structure([(
            "Table",
            Value::structure([
                ("TableStatus", Value::from(status)),
                (
                    "Indexes",
                    Value::list(vec![
                        Value::structure([("IndexStatus", Value::from("ACTIVE"))]),
                        Value::structure([("IndexStatus", Value::from(status))]),
                    ]),
                ),
            ]),
        )])
    }

    #[test]
    fn path_search() {
        let v = table("CREATING");
        assert_eq!(search(&v, "Table.TableStatus"), Some(Value::from("CREATING")));
        assert_eq!(
            search(&v, "Table.Indexes[].IndexStatus"),
            Some(Value::from(vec!["ACTIVE", "CREATING"]))
        );
        assert_eq!(search(&v, "Table.Indexes[-1].IndexStatus"), Some(Value::from("CREATING")));
        assert_eq!(search(&v, "Table.Missing"), None);
    }

    #[test]
    fn nested_projections_flatten() {
        let v = Value::structure([(
            "Reservations",
            Value::list(vec![
                Value::structure([(
                    "Instances",
                    Value::list(vec![Value::structure([("State", Value::from("running"))])]),
                )]),
                Value::structure([(
                    "Instances",
                    Value::list(vec![
                        Value::structure([("State", Value::from("running"))]),
                        Value::structure([("State", Value::from("pending"))]),
                    ]),
                )]),
            ]),
        )]);
        assert_eq!(
            search(&v, "Reservations[].Instances[].State"),
            Some(Value::from(vec!["running", "running", "pending"]))
        );
    }

    #[test]
    fn matchers() {
        let v = table("ACTIVE");
        assert!(Matcher::path("Table.TableStatus", "ACTIVE").matches(Some(200), Ok(&v)));
        assert!(Matcher::path_all("Table.Indexes[].IndexStatus", "ACTIVE").matches(None, Ok(&v)));

        let v = table("DELETING");
        assert!(!Matcher::path_all("Table.Indexes[].IndexStatus", "ACTIVE").matches(None, Ok(&v)));
        assert!(Matcher::path_any("Table.Indexes[].IndexStatus", "DELETING").matches(None, Ok(&v)));
        assert!(Matcher::Status(200).matches(Some(200), Ok(&v)));
        assert!(!Matcher::error("ResourceNotFoundException").matches(Some(200), Ok(&v)));
    }

    #[test]
    fn empty_projection_never_matches_all() {
        let v = Value::structure([("Items", Value::List(vec![]))]);
        assert!(!Matcher::path_all("Items[].State", "ok").matches(None, Ok(&v)));
    }

    #[test]
    fn error_matcher_accepts_code_or_exception() {
        let service_error = crate::error::ServiceError::new(
            "sqs",
            "AWS.SimpleQueueService.NonExistentQueue",
            "gone",
            400,
        )
        .with_exception("QueueDoesNotExist");
        let err = SdkError::new(ErrorKind::Client(service_error));
        assert!(Matcher::error("QueueDoesNotExist").matches(Some(400), Err(&err)));
        assert!(Matcher::error("AWS.SimpleQueueService.NonExistentQueue").matches(Some(400), Err(&err)));
        assert!(!Matcher::path("x", "y").matches(Some(400), Err(&err)));
    }

    #[test]
    fn delays() {
        assert_eq!(Delay::Fixed(Duration::from_secs(5)).for_attempt(7), Duration::from_secs(5));
        let exp = Delay::Exponential {
            base: Duration::from_millis(100),
            max: Duration::from_millis(1000),
        };
        assert_eq!(exp.for_attempt(1), Duration::from_millis(100));
        for attempt in 2..10 {
            let d = exp.for_attempt(attempt);
            assert!(d >= Duration::from_millis(100) && d <= Duration::from_millis(1000));
        }
    }

    #[test]
    fn spec_builder_keeps_order() {
        let spec = WaiterSpec::new("TableExists", "DescribeTable", Delay::Fixed(Duration::from_secs(20)), 0)
            .success(Matcher::path("Table.TableStatus", "ACTIVE"))
            .retry(Matcher::error("ResourceNotFoundException"));
        assert_eq!(spec.max_attempts, 1);
        assert_eq!(spec.acceptors.len(), 2);
        assert_eq!(spec.acceptors[1].state, AcceptorState::Retry);
    }
}
