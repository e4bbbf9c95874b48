//! # lazyaws
//!
//! Lazy, shape-driven AWS client runtime. Requests go out as soon as an
//! operation is called; responses are decoded on first access.
//!
//! ```text
//! lazyaws ─┬─ lazyaws-core      client · credentials · signing · protocols
//!          └─ lazyaws-services  s3 · sqs · dynamodb
//! ```
//!
//! The `*_client` helpers build typed clients with the default credential
//! chain and a reqwest transport:
//!
//! ```no_run
//! # async fn demo() -> lazyaws::SdkResult<()> {
//! let config = lazyaws::Configuration::from_env().with_region("eu-west-1");
//! let s3 = lazyaws::s3_client(config)?;
//! let input = lazyaws::s3::HeadObjectInput {
//!     bucket: "reports".into(),
//!     key: "2024/q1.csv".into(),
//!     ..Default::default()
//! };
//! let pending = s3.head_object(&input).await?;
//! let meta = pending.output().await?;
//! println!("{:?}", meta.content_length);
//! # Ok(())
//! # }
//! ```

pub use lazyaws_core::*;
pub use lazyaws_services::{dynamodb, s3, sqs, DynamoDbClient, S3Client, SqsClient};

use std::sync::Arc;

fn build(definition: SdkResult<Arc<ServiceDefinition>>, config: Configuration) -> SdkResult<Client> {
    Client::builder(definition?).config(config).build()
}

pub fn s3_client(config: Configuration) -> SdkResult<S3Client> {
    build(s3::definition(), config).map(S3Client::new)
}

pub fn sqs_client(config: Configuration) -> SdkResult<SqsClient> {
    build(sqs::definition(), config).map(SqsClient::new)
}

pub fn dynamodb_client(config: Configuration) -> SdkResult<DynamoDbClient> {
    build(dynamodb::definition(), config).map(DynamoDbClient::new)
}

pub fn sts_client(config: Configuration) -> SdkResult<sts::StsClient> {
    build(sts::definition(), config).map(sts::StsClient::new)
}
