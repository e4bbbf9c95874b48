//! Generic service client.
//!
//! A [`Client`] pairs a [`ServiceDefinition`] with configuration, a
//! credential provider and a transport. Every call marshals and signs the
//! input, hands the request to the transport and returns a [`LazyResult`]
//! right away; the response is only awaited when the result is read.

use crate::config::Configuration;
use crate::credentials::{default_chain, CredentialProvider};
use crate::endpoint::EndpointMetadata;
use crate::error::{SdkError, SdkResult};
use crate::http::{Request, Transport};
use crate::protocol;
use crate::result::{Input, LazyResult};
use crate::service::ServiceDefinition;
use crate::signing::SigV4Signer;
use crate::transport::ReqwestTransport;
use crate::value::Value;
use crate::waiter::Waiter;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Source of the signing time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Per-call scope and overrides.
///
/// `operation` and `service` are filled in by the client when left unset;
/// a `service` naming a different service than the client's is rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub operation: Option<String>,
    /// Target region; defaults to the configured one.
    pub region: Option<String>,
    /// Service code, e.g. `s3`.
    pub service: Option<String>,
    pub endpoint: Option<String>,
    /// Region placed in the credential scope instead of the resolved one.
    pub signing_region: Option<String>,
    /// Service name placed in the credential scope instead of the resolved one.
    pub signing_service: Option<String>,
    /// Lifetime of a presigned URL.
    pub presign_expires: Option<Duration>,
}

impl RequestContext {
    pub fn with_region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.trim_end_matches('/').to_string());
        self
    }

    pub fn with_signing_region(mut self, region: &str) -> Self {
        self.signing_region = Some(region.to_string());
        self
    }

    pub fn with_signing_service(mut self, service: &str) -> Self {
        self.signing_service = Some(service.to_string());
        self
    }

    pub fn with_presign_expires(mut self, expires: Duration) -> Self {
        self.presign_expires = Some(expires);
        self
    }
}

#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    service: Arc<ServiceDefinition>,
    config: Arc<Configuration>,
    /// `None` for anonymous clients.
    credentials: Option<Arc<dyn CredentialProvider>>,
    transport: Arc<dyn Transport>,
    clock: Clock,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("service", &self.inner.service.name)
            .field("region", &self.inner.config.region)
            .field("credentials", &self.inner.credentials)
            .field("transport", &self.inner.transport)
            .finish()
    }
}

impl Client {
    pub fn builder(service: Arc<ServiceDefinition>) -> ClientBuilder {
        ClientBuilder {
            service,
            config: None,
            credentials: None,
            anonymous: false,
            transport: None,
            clock: None,
        }
    }

    pub fn service(&self) -> &Arc<ServiceDefinition> {
        &self.inner.service
    }

    pub fn config(&self) -> &Configuration {
        &self.inner.config
    }

    /// Endpoint and signing scope for a call.
    pub fn endpoint(&self, context: &RequestContext) -> SdkResult<EndpointMetadata> {
        let config = &self.inner.config;
        let region = context.region.as_deref().unwrap_or(&config.region);
        let mut metadata = self.inner.service.endpoints.resolve(region)?;
        if let Some(endpoint) = context.endpoint.as_ref().or(config.endpoint.as_ref()) {
            metadata.endpoint = endpoint.clone();
        }
        if let Some(region) = &context.signing_region {
            metadata.signing_region = region.clone();
        }
        if let Some(service) = &context.signing_service {
            metadata.signing_service = service.clone();
        }
        Ok(metadata)
    }

    /// `context` with the operation name and service code filled in.
    fn scoped(&self, operation: &str, context: &RequestContext) -> SdkResult<RequestContext> {
        let service = &self.inner.service.name;
        if let Some(requested) = context.service.as_deref() {
            if requested != service {
                return Err(SdkError::invalid_argument(format!(
                    "request context for service \"{}\" used with a {} client",
                    requested, service
                )));
            }
        }
        let mut scoped = context.clone();
        scoped.operation = Some(operation.to_string());
        scoped.service = Some(service.clone());
        Ok(scoped)
    }

    pub async fn call(&self, operation: &str, input: Value) -> SdkResult<LazyResult> {
        self.call_with(operation, input, &RequestContext::default())
            .await
    }

    /// Marshal, sign and send. Input and credential errors are returned
    /// here; everything about the response surfaces from the result.
    pub async fn call_with<T: crate::result::Output>(
        &self,
        operation: &str,
        input: Value,
        context: &RequestContext,
    ) -> SdkResult<LazyResult<T>> {
        let request = self.prepare(operation, &input, context).await?;
        log::debug!(
            "{}.{} {} {}",
            self.inner.service.name,
            operation,
            request.method,
            request.url()
        );
        let pending = self.inner.transport.send(request);
        LazyResult::new(self.inner.service.clone(), operation, pending)
    }

    /// Typed call.
    pub async fn send<I: Input>(&self, input: &I) -> SdkResult<LazyResult<I::Output>> {
        self.call_with(I::OPERATION, input.to_value(), &RequestContext::default())
            .await
    }

    /// Build the signed request for `operation` without sending it.
    pub async fn prepare(
        &self,
        operation: &str,
        input: &Value,
        context: &RequestContext,
    ) -> SdkResult<Request> {
        self.build_request(operation, input, context, None)
            .await
            .map_err(|e| e.with_operation(operation))
    }

    /// URL carrying its own signature, valid for `expires`.
    pub async fn presign(
        &self,
        operation: &str,
        input: &Value,
        expires: Duration,
    ) -> SdkResult<String> {
        let context = RequestContext::default().with_presign_expires(expires);
        self.presign_with(operation, input, &context).await
    }

    /// Presign with per-call overrides; the lifetime comes from
    /// `context.presign_expires`.
    pub async fn presign_with(
        &self,
        operation: &str,
        input: &Value,
        context: &RequestContext,
    ) -> SdkResult<String> {
        let expires = context.presign_expires.ok_or_else(|| {
            SdkError::invalid_argument("presigning needs an expiry in the request context")
                .with_operation(operation)
        })?;
        self.build_request(operation, input, context, Some(expires))
            .await
            .map(|request| request.url())
            .map_err(|e| e.with_operation(operation))
    }

    async fn build_request(
        &self,
        operation: &str,
        input: &Value,
        context: &RequestContext,
        presign: Option<Duration>,
    ) -> SdkResult<Request> {
        let context = self.scoped(operation, context)?;
        let service = &self.inner.service;
        let definition = service.operation(operation)?;
        let mut request = protocol::marshal(service, definition, input)?;

        let metadata = self.endpoint(&context)?;
        request.endpoint = metadata.endpoint.clone();
        request
            .headers
            .insert("user-agent", self.inner.config.user_agent.clone());

        let provider = match (&self.inner.credentials, definition.unsigned) {
            (Some(provider), false) => provider,
            _ if presign.is_some() => {
                return Err(SdkError::signing(format!(
                    "operation \"{}\" cannot be presigned without credentials",
                    operation
                )))
            }
            _ => return Ok(request),
        };
        let credentials = provider.resolve().await?;
        let signer = SigV4Signer::new(
            service.signer,
            &metadata.signing_region,
            &metadata.signing_service,
        );
        let now = (self.inner.clock)();
        match presign {
            Some(expires) => signer.presign(&mut request, &credentials, now, expires)?,
            None => signer.sign(&mut request, &credentials, now)?,
        }
        Ok(request)
    }

    /// Start the named waiter. The first attempt is sent immediately.
    pub async fn waiter(&self, name: &str, input: Value) -> SdkResult<Waiter> {
        let spec = self.inner.service.waiter(name)?.clone();
        Waiter::start(self.clone(), spec, input).await
    }

    /// Every page of a paginated operation, fetched one after another.
    /// Iteration stops when the next token is missing, empty or repeated.
    pub fn pages(&self, operation: &str, input: Value) -> BoxStream<'static, SdkResult<Value>> {
        let pagination = match self.inner.service.operation(operation) {
            Ok(op) => match op.pagination.clone() {
                Some(p) => p,
                None => {
                    let err = SdkError::invalid_argument(format!(
                        "operation \"{}\" is not paginated",
                        operation
                    ))
                    .with_operation(operation);
                    return stream::once(async move { Err(err) }).boxed();
                }
            },
            Err(e) => return stream::once(async move { Err(e) }).boxed(),
        };

        let client = self.clone();
        let operation = operation.to_string();
        stream::try_unfold(Some(input), move |next| {
            let client = client.clone();
            let operation = operation.clone();
            let pagination = pagination.clone();
            async move {
                let input = match next {
                    Some(input) => input,
                    None => return Ok(None),
                };
                let page = client
                    .call(&operation, input.clone())
                    .await?
                    .into_output()
                    .await?;

                let sent = input.string(&pagination.input_token);
                let next = match page.string(&pagination.output_token) {
                    Some(token) if !token.is_empty() && Some(&token) != sent.as_ref() => {
                        let mut input = input;
                        input.set(&pagination.input_token, Value::String(token));
                        Some(input)
                    }
                    _ => None,
                };
                Ok(Some((page, next)))
            }
        })
        .boxed()
    }
}

pub struct ClientBuilder {
    service: Arc<ServiceDefinition>,
    config: Option<Arc<Configuration>>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    anonymous: bool,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<Clock>,
}

impl ClientBuilder {
    /// Defaults to [`Configuration::from_env`].
    pub fn config(mut self, config: impl Into<Arc<Configuration>>) -> Self {
        self.config = Some(config.into());
        self
    }

    /// Defaults to [`default_chain`].
    pub fn credentials(mut self, provider: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    /// Send every request unsigned.
    pub fn anonymous(mut self) -> Self {
        self.anonymous = true;
        self
    }

    /// Defaults to a [`ReqwestTransport`]. A custom transport is also used
    /// for metadata credential endpoints.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Some(Arc::new(clock));
        self
    }

    pub fn build(self) -> SdkResult<Client> {
        let config = self
            .config
            .unwrap_or_else(|| Arc::new(Configuration::from_env()));
        config.validate()?;

        let (transport, metadata_transport): (Arc<dyn Transport>, Arc<dyn Transport>) =
            match self.transport {
                Some(t) => (t.clone(), t),
                None => (
                    Arc::new(ReqwestTransport::new(&config)?) as Arc<dyn Transport>,
                    Arc::new(ReqwestTransport::metadata(&config)?) as Arc<dyn Transport>,
                ),
            };

        let credentials = if self.anonymous {
            None
        } else {
            Some(self.credentials.unwrap_or_else(|| {
                Arc::new(default_chain(
                    config.clone(),
                    transport.clone(),
                    metadata_transport,
                )) as Arc<dyn CredentialProvider>
            }))
        };

        Ok(Client {
            inner: Arc::new(ClientInner {
                service: self.service,
                config,
                credentials,
                transport,
                clock: self.clock.unwrap_or_else(|| Arc::new(Utc::now) as Clock),
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Credentials, StaticProvider};
    use crate::error::ErrorKind;
    use crate::http::RawResponse;
    use crate::service::{OperationDraft, Pagination};
    use crate::shape::{MemberDraft, ShapeDraft};
    use crate::transport::StubTransport;
    use crate::waiter::{Delay, Matcher, WaiterSpec};
    use chrono::TimeZone;
    use futures::TryStreamExt;

    fn service() -> Arc<ServiceDefinition> {
        Arc::new(
            ServiceDefinition::builder("tables", "2020-01-01", protocol::Protocol::RestJson)
                .shape(ShapeDraft::string("String"))
                .shape(ShapeDraft::integer("Integer"))
                .shape(ShapeDraft::list("Names", "String"))
                .shape(ShapeDraft::structure(
                    "DescribeInput",
                    vec![MemberDraft::new("Name", "String").uri("Name").required()],
                ))
                .shape(ShapeDraft::structure(
                    "DescribeOutput",
                    vec![MemberDraft::new("status", "String")],
                ))
                .shape(ShapeDraft::structure(
                    "ListInput",
                    vec![
                        MemberDraft::new("NextToken", "String").query("token"),
                        MemberDraft::new("Limit", "Integer").query("limit"),
                    ],
                ))
                .shape(ShapeDraft::structure(
                    "ListOutput",
                    vec![
                        MemberDraft::new("Names", "Names"),
                        MemberDraft::new("NextToken", "String"),
                    ],
                ))
                .operation(
                    OperationDraft::new("Describe", "GET", "/tables/{Name}")
                        .input("DescribeInput")
                        .output("DescribeOutput"),
                )
                .operation(
                    OperationDraft::new("List", "GET", "/tables")
                        .input("ListInput")
                        .output("ListOutput")
                        .paginated(Pagination::new("NextToken", "NextToken").result_key("Names")),
                )
                .waiter(
                    WaiterSpec::new("TableActive", "Describe", Delay::Fixed(Duration::from_millis(1)), 3)
                        .success(Matcher::path("status", "ACTIVE"))
                        .failure(Matcher::path("status", "FAILED")),
                )
                .build()
                .unwrap(),
        )
    }

    fn client(transport: &StubTransport) -> Client {
        Client::builder(service())
            .config(Configuration::default().with_region("eu-west-1"))
            .credentials(Arc::new(StaticProvider::new(Credentials::new("AKID", "secret"))))
            .transport(Arc::new(transport.clone()))
            .clock(|| Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap())
            .build()
            .unwrap()
    }

    fn status(s: &str) -> RawResponse {
        RawResponse::new(200).with_body(format!(r#"{{"status":"{}"}}"#, s))
    }

    #[tokio::test]
    async fn call_signs_and_resolves_endpoint() {
        let stub = StubTransport::new();
        stub.push(status("ACTIVE"));
        let result = client(&stub)
            .call("Describe", Value::structure([("Name", Value::from("t1"))]))
            .await
            .unwrap();

        let sent = stub.last_request().unwrap();
        assert_eq!(sent.url(), "https://tables.eu-west-1.amazonaws.com/tables/t1");
        assert_eq!(sent.headers.get("x-amz-date"), Some("20240102T030405Z"));
        let auth = sent.headers.get("authorization").unwrap();
        assert!(auth.starts_with("AWS4-HMAC-SHA256 Credential=AKID/20240102/eu-west-1/tables/aws4_request"));

        assert_eq!(result.output().await.unwrap().string("status").as_deref(), Some("ACTIVE"));
    }

    #[tokio::test]
    async fn invalid_input_never_reaches_the_transport() {
        let stub = StubTransport::new();
        let err = client(&stub).call("Describe", Value::empty()).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MissingRequiredParameter { .. }));
        assert_eq!(err.operation(), Some("Describe"));
        assert_eq!(stub.request_count(), 0);
    }

    #[tokio::test]
    async fn missing_credentials_abort_before_sending() {
        let stub = StubTransport::new();
        let client = Client::builder(service())
            .config(Configuration::default())
            .credentials(Arc::new(StaticProvider::empty()))
            .transport(Arc::new(stub.clone()))
            .build()
            .unwrap();
        let err = client
            .call("Describe", Value::structure([("Name", Value::from("t"))]))
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::CredentialsNotFound(_)));
        assert_eq!(stub.request_count(), 0);
    }

    #[tokio::test]
    async fn anonymous_and_endpoint_override() {
        let stub = StubTransport::new();
        stub.push(status("ACTIVE"));
        let client = Client::builder(service())
            .config(Configuration::default().with_endpoint("http://localhost:4566/"))
            .anonymous()
            .transport(Arc::new(stub.clone()))
            .build()
            .unwrap();
        client
            .call("Describe", Value::structure([("Name", Value::from("t"))]))
            .await
            .unwrap();
        let sent = stub.last_request().unwrap();
        assert_eq!(sent.url(), "http://localhost:4566/tables/t");
        assert!(!sent.headers.contains("authorization"));
    }

    #[tokio::test]
    async fn region_override_per_call() {
        let stub = StubTransport::new();
        stub.push(status("ACTIVE"));
        let ctx = RequestContext::default().with_region("cn-north-1");
        let _: LazyResult = client(&stub)
            .call_with("Describe", Value::structure([("Name", Value::from("t"))]), &ctx)
            .await
            .unwrap();
        let sent = stub.last_request().unwrap();
        assert_eq!(sent.endpoint, "https://tables.cn-north-1.amazonaws.com.cn");
    }

    #[tokio::test]
    async fn signing_overrides_change_credential_scope() {
        let stub = StubTransport::new();
        stub.push(status("ACTIVE"));
        let ctx = RequestContext::default()
            .with_signing_region("us-east-1")
            .with_signing_service("tables-beta");
        let _: LazyResult = client(&stub)
            .call_with("Describe", Value::structure([("Name", Value::from("t"))]), &ctx)
            .await
            .unwrap();
        let sent = stub.last_request().unwrap();
        assert_eq!(sent.endpoint, "https://tables.eu-west-1.amazonaws.com");
        let auth = sent.headers.get("authorization").unwrap();
        assert!(auth.contains("Credential=AKID/20240102/us-east-1/tables-beta/aws4_request"));
    }

    #[tokio::test]
    async fn context_for_another_service_is_rejected() {
        let stub = StubTransport::new();
        let ctx = RequestContext {
            service: Some("sqs".to_string()),
            ..Default::default()
        };
        let err = client(&stub)
            .prepare("Describe", &Value::structure([("Name", Value::from("t"))]), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument(_)));
        assert_eq!(err.operation(), Some("Describe"));

        let ctx = RequestContext {
            service: Some("tables".to_string()),
            ..Default::default()
        };
        assert!(client(&stub)
            .prepare("Describe", &Value::structure([("Name", Value::from("t"))]), &ctx)
            .await
            .is_ok());
        assert_eq!(stub.request_count(), 0);
    }

    #[tokio::test]
    async fn presign_takes_expiry_and_scope_from_context() {
        let stub = StubTransport::new();
        let input = Value::structure([("Name", Value::from("t"))]);
        let ctx = RequestContext::default()
            .with_presign_expires(Duration::from_secs(60))
            .with_signing_region("us-west-2");
        let url = client(&stub).presign_with("Describe", &input, &ctx).await.unwrap();
        assert!(url.contains("X-Amz-Expires=60"));
        assert!(url.contains("X-Amz-Credential=AKID%2F20240102%2Fus-west-2%2Ftables%2Faws4_request"));

        let err = client(&stub)
            .presign_with("Describe", &input, &RequestContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn presigned_url_carries_signature() {
        let stub = StubTransport::new();
        let url = client(&stub)
            .presign(
                "Describe",
                &Value::structure([("Name", Value::from("t"))]),
                Duration::from_secs(900),
            )
            .await
            .unwrap();
        assert!(url.starts_with("https://tables.eu-west-1.amazonaws.com/tables/t?X-Amz-Algorithm=AWS4-HMAC-SHA256"));
        assert!(url.contains("X-Amz-Expires=900"));
        assert!(url.contains("X-Amz-Signature="));
        assert_eq!(stub.request_count(), 0);
    }

    #[tokio::test]
    async fn waiter_succeeds_on_third_attempt() {
        let stub = StubTransport::new();
        stub.push(status("PENDING")).push(status("PENDING")).push(status("ACTIVE"));
        let waiter = client(&stub)
            .waiter("TableActive", Value::structure([("Name", Value::from("t"))]))
            .await
            .unwrap();
        assert_eq!(waiter.attempts(), 1);
        waiter.wait().await.unwrap();
        assert_eq!(stub.request_count(), 3);
    }

    #[tokio::test]
    async fn waiter_times_out_after_max_attempts() {
        let stub = StubTransport::with_handler(|_| Some(status("PENDING")));
        let waiter = client(&stub)
            .waiter("TableActive", Value::structure([("Name", Value::from("t"))]))
            .await
            .unwrap();
        let err = waiter.wait().await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::WaiterTimeout { attempts: 3, .. }));
        assert_eq!(stub.request_count(), 3);
    }

    #[tokio::test]
    async fn waiter_failure_state_is_terminal() {
        let stub = StubTransport::new();
        stub.push(status("PENDING")).push(status("FAILED"));
        let waiter = client(&stub)
            .waiter("TableActive", Value::structure([("Name", Value::from("t"))]))
            .await
            .unwrap();
        let err = waiter.wait().await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::WaiterFailure { attempts: 2, .. }));
        assert_eq!(stub.request_count(), 2);
    }

    #[tokio::test]
    async fn waiter_cancellation_is_distinct_from_timeout() {
        let stub = StubTransport::with_handler(|_| Some(status("PENDING")));
        let waiter = client(&stub)
            .waiter("TableActive", Value::structure([("Name", Value::from("t"))]))
            .await
            .unwrap();
        let token = tokio_util::sync::CancellationToken::new();
        token.cancel();
        let err = waiter.wait_until(None, Some(token)).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::WaiterCancelled { attempts: 1, .. }));

        let waiter = client(&stub)
            .waiter("TableActive", Value::structure([("Name", Value::from("t"))]))
            .await
            .unwrap();
        let deadline = tokio::time::Instant::now();
        let err = waiter.wait_until(Some(deadline), None).await.unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::WaiterCancelled { .. }));
    }

    #[tokio::test]
    async fn waiter_state_evaluates_one_attempt() {
        let stub = StubTransport::new();
        stub.push(status("PENDING")).push(status("ACTIVE"));
        let mut waiter = client(&stub)
            .waiter("TableActive", Value::structure([("Name", Value::from("t"))]))
            .await
            .unwrap();
        assert_eq!(waiter.state().await.unwrap(), crate::waiter::WaiterState::Pending);
        assert_eq!(waiter.state().await.unwrap(), crate::waiter::WaiterState::Success);
        assert_eq!(waiter.attempts(), 2);
    }

    #[tokio::test]
    async fn pages_follow_next_token() {
        let stub = StubTransport::new();
        stub.push(RawResponse::new(200).with_body(r#"{"Names":["a","b"],"NextToken":"t2"}"#))
            .push(RawResponse::new(200).with_body(r#"{"Names":["c"],"NextToken":""}"#));
        let pages: Vec<Value> = client(&stub)
            .pages("List", Value::structure([("Limit", Value::from(2))]))
            .try_collect()
            .await
            .unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[1].strings("Names"), vec!["c"]);

        let requests = stub.requests();
        assert_eq!(requests[0].query_param("token"), None);
        assert_eq!(requests[1].query_param("token"), Some("t2"));
        assert_eq!(requests[1].query_param("limit"), Some("2"));
    }

    #[tokio::test]
    async fn pages_rejects_unpaginated_operation() {
        let stub = StubTransport::new();
        let result: Vec<SdkResult<Value>> = client(&stub)
            .pages("Describe", Value::empty())
            .collect()
            .await;
        assert_eq!(result.len(), 1);
        assert!(matches!(result[0].as_ref().unwrap_err().kind(), ErrorKind::InvalidArgument(_)));
    }
}
