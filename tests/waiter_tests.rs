use lazyaws::credentials::{Credentials, StaticProvider};
use lazyaws::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

fn tables(max_attempts: u32, delay: Duration) -> Arc<ServiceDefinition> {
    Arc::new(
        ServiceDefinition::builder("tables", "2021-01-01", Protocol::Json)
            .target_prefix("Tables_20210101")
            .shape(ShapeDraft::string("String"))
            .shape(ShapeDraft::structure(
                "DescribeRequest",
                vec![MemberDraft::new("Name", "String").required()],
            ))
            .shape(ShapeDraft::structure(
                "DescribeResponse",
                vec![MemberDraft::new("Status", "String")],
            ))
            .operation(
                OperationDraft::post("Describe")
                    .input("DescribeRequest")
                    .output("DescribeResponse"),
            )
            .waiter(
                WaiterSpec::new("Ready", "Describe", Delay::Fixed(delay), max_attempts)
                    .success(Matcher::path("Status", "ACTIVE"))
                    .failure(Matcher::path("Status", "FAILED")),
            )
            .build()
            .unwrap(),
    )
}

fn client(definition: Arc<ServiceDefinition>, stub: &StubTransport) -> Client {
    Client::builder(definition)
        .config(Configuration::default().with_region("us-east-1"))
        .credentials(Arc::new(StaticProvider::new(Credentials::new("AKID", "secret"))))
        .transport(Arc::new(stub.clone()))
        .build()
        .unwrap()
}

fn status(value: &str) -> RawResponse {
    RawResponse::new(200).with_body(format!(r#"{{"Status":"{}"}}"#, value))
}

fn input() -> Value {
    Value::structure([("Name", Value::from("orders"))])
}

#[tokio::test]
async fn test_waiter_succeeds_on_third_call() {
    let stub = StubTransport::new();
    stub.push(status("PENDING")).push(status("PENDING")).push(status("ACTIVE"));
    let waiter = client(tables(3, Duration::from_millis(5)), &stub)
        .waiter("Ready", input())
        .await
        .unwrap();

    waiter.wait().await.unwrap();
    assert_eq!(stub.request_count(), 3);
}

#[tokio::test]
async fn test_waiter_times_out_after_max_attempts() {
    let stub = StubTransport::with_handler(|_| Some(status("PENDING")));
    let waiter = client(tables(3, Duration::from_millis(5)), &stub)
        .waiter("Ready", input())
        .await
        .unwrap();

    let err = waiter.wait().await.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::WaiterTimeout { waiter, attempts } if waiter == "Ready" && *attempts == 3));
    assert_eq!(err.operation(), Some("Describe"));
    assert_eq!(stub.request_count(), 3);
}

#[tokio::test]
async fn test_waiter_failure_state_is_terminal() {
    let stub = StubTransport::new();
    stub.push(status("PENDING")).push(status("FAILED")).push(status("ACTIVE"));
    let waiter = client(tables(5, Duration::from_millis(5)), &stub)
        .waiter("Ready", input())
        .await
        .unwrap();

    let err = waiter.wait().await.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::WaiterFailure { attempts, .. } if *attempts == 2));
    assert_eq!(stub.request_count(), 2);
}

#[tokio::test]
async fn test_waiter_honours_cancellation_and_deadline() {
    let stub = StubTransport::with_handler(|_| Some(status("PENDING")));
    let api = client(tables(100, Duration::from_secs(30)), &stub);

    let cancel = CancellationToken::new();
    let waiter = api.waiter("Ready", input()).await.unwrap();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });
    let err = waiter.wait_until(None, Some(cancel)).await.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::WaiterCancelled { attempts, .. } if *attempts == 1));

    let waiter = api.waiter("Ready", input()).await.unwrap();
    let deadline = Instant::now() + Duration::from_millis(20);
    let err = waiter.wait_until(Some(deadline), None).await.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::WaiterCancelled { .. }));
}

#[tokio::test]
async fn test_unmatched_transport_error_surfaces() {
    let stub = StubTransport::new();
    stub.push(status("PENDING"));
    let waiter = client(tables(5, Duration::from_millis(1)), &stub)
        .waiter("Ready", input())
        .await
        .unwrap();

    // The stub has nothing queued for the second attempt.
    let err = waiter.wait().await.unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Transport(_)));
}
