//! # lazyaws-services – service bindings
//!
//! Each module holds one service definition (shapes, operations, waiters,
//! error codes) plus a thin typed client over [`lazyaws_core::Client`].
//!
//! | Module       | Protocol  | API version |
//! |--------------|-----------|-------------|
//! | `s3`         | rest-xml  | 2006-03-01  |
//! | `sqs`        | query     | 2012-11-05  |
//! | `dynamodb`   | json 1.0  | 2012-08-10  |
//!
//! STS lives in `lazyaws_core::sts` because the credential providers use it.

pub mod dynamodb;
pub mod s3;
pub mod sqs;

pub use dynamodb::DynamoDbClient;
pub use s3::S3Client;
pub use sqs::SqsClient;
