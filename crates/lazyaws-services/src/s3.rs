//! Amazon S3 (Simple Storage Service) binding.
//!
//! S3 uses the rest-xml protocol (API version 2006-03-01) with its own
//! signer flavor. Buckets are addressed path-style (`/{Bucket}/{Key+}`).
//!
//! Reference: <https://docs.aws.amazon.com/AmazonS3/latest/API/>

use chrono::{DateTime, Utc};
use futures::stream::{BoxStream, StreamExt};
use lazyaws_core::result::{Input, LazyResult, Output};
use lazyaws_core::shape::{MemberDraft, ShapeDraft, TimestampFormat};
use lazyaws_core::waiter::{Delay, Matcher, WaiterSpec};
use lazyaws_core::{
    Client, EndpointRules, OperationDraft, Pagination, Protocol, SdkResult, ServiceDefinition,
    SignerFlavor, StructBuilder, Value,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub const API_VERSION: &str = "2006-03-01";
const XML_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

lazy_static::lazy_static! {
    static ref DEFINITION: SdkResult<Arc<ServiceDefinition>> = build_definition().map(Arc::new);
}

/// The S3 service definition, built once per process.
pub fn definition() -> SdkResult<Arc<ServiceDefinition>> {
    DEFINITION.clone()
}

fn build_definition() -> SdkResult<ServiceDefinition> {
    ServiceDefinition::builder("s3", API_VERSION, Protocol::RestXml)
        .signer(SignerFlavor::S3)
        .endpoints(
            EndpointRules::new("s3")
                .region("us-east-1", "https://s3.amazonaws.com", "us-east-1")
                .region("us-gov-west-1", "https://s3.us-gov-west-1.amazonaws.com", "us-gov-west-1"),
        )
        .shapes([
            ShapeDraft::string("String"),
            ShapeDraft::integer("Integer"),
            ShapeDraft::boolean("Boolean"),
            ShapeDraft::blob("Body"),
            ShapeDraft::timestamp("DateTime"),
            ShapeDraft::timestamp("HttpDate").timestamp_format(TimestampFormat::Rfc822),
            ShapeDraft::map("Metadata", "String", "String"),
            ShapeDraft::list("Strings", "String"),
            // CORS
            ShapeDraft::structure(
                "CORSRule",
                vec![
                    MemberDraft::new("ID", "String"),
                    MemberDraft::new("AllowedHeaders", "Strings")
                        .location_name("AllowedHeader")
                        .flattened(),
                    MemberDraft::new("AllowedMethods", "Strings")
                        .location_name("AllowedMethod")
                        .flattened()
                        .required(),
                    MemberDraft::new("AllowedOrigins", "Strings")
                        .location_name("AllowedOrigin")
                        .flattened()
                        .required(),
                    MemberDraft::new("ExposeHeaders", "Strings")
                        .location_name("ExposeHeader")
                        .flattened(),
                    MemberDraft::new("MaxAgeSeconds", "Integer"),
                ],
            ),
            ShapeDraft::list("CORSRules", "CORSRule"),
            ShapeDraft::structure(
                "CORSConfiguration",
                vec![MemberDraft::new("CORSRules", "CORSRules")
                    .location_name("CORSRule")
                    .flattened()
                    .required()],
            )
            .xml_namespace(XML_NAMESPACE),
            ShapeDraft::structure(
                "GetBucketCorsRequest",
                vec![
                    MemberDraft::new("Bucket", "String").uri("Bucket").required(),
                    MemberDraft::new("ExpectedBucketOwner", "String").header("x-amz-expected-bucket-owner"),
                ],
            ),
            ShapeDraft::structure(
                "GetBucketCorsOutput",
                vec![MemberDraft::new("CORSRules", "CORSRules")
                    .location_name("CORSRule")
                    .flattened()],
            ),
            ShapeDraft::structure(
                "PutBucketCorsRequest",
                vec![
                    MemberDraft::new("Bucket", "String").uri("Bucket").required(),
                    MemberDraft::new("CORSConfiguration", "CORSConfiguration")
                        .location_name("CORSConfiguration")
                        .payload()
                        .required(),
                    MemberDraft::new("ContentMD5", "String").header("Content-MD5"),
                    MemberDraft::new("ExpectedBucketOwner", "String").header("x-amz-expected-bucket-owner"),
                ],
            ),
            // Buckets
            ShapeDraft::structure(
                "HeadBucketRequest",
                vec![
                    MemberDraft::new("Bucket", "String").uri("Bucket").required(),
                    MemberDraft::new("ExpectedBucketOwner", "String").header("x-amz-expected-bucket-owner"),
                ],
            ),
            ShapeDraft::structure(
                "HeadBucketOutput",
                vec![MemberDraft::new("BucketRegion", "String").header("x-amz-bucket-region")],
            ),
            // Objects
            ShapeDraft::structure(
                "HeadObjectRequest",
                vec![
                    MemberDraft::new("Bucket", "String").uri("Bucket").required(),
                    MemberDraft::new("Key", "String").uri("Key").required(),
                    MemberDraft::new("IfMatch", "String").header("If-Match"),
                    MemberDraft::new("VersionId", "String").query("versionId"),
                    MemberDraft::new("ExpectedBucketOwner", "String").header("x-amz-expected-bucket-owner"),
                ],
            ),
            ShapeDraft::structure(
                "HeadObjectOutput",
                vec![
                    MemberDraft::new("ContentLength", "Integer").header("Content-Length"),
                    MemberDraft::new("ContentType", "String").header("Content-Type"),
                    MemberDraft::new("ETag", "String").header("ETag"),
                    MemberDraft::new("LastModified", "HttpDate").header("Last-Modified"),
                    MemberDraft::new("VersionId", "String").header("x-amz-version-id"),
                    MemberDraft::new("StorageClass", "String").header("x-amz-storage-class"),
                    MemberDraft::new("Metadata", "Metadata").headers("x-amz-meta-"),
                ],
            ),
            ShapeDraft::structure(
                "GetObjectRequest",
                vec![
                    MemberDraft::new("Bucket", "String").uri("Bucket").required(),
                    MemberDraft::new("Key", "String").uri("Key").required(),
                    MemberDraft::new("Range", "String").header("Range"),
                    MemberDraft::new("VersionId", "String").query("versionId"),
                    MemberDraft::new("ExpectedBucketOwner", "String").header("x-amz-expected-bucket-owner"),
                ],
            ),
            ShapeDraft::structure(
                "GetObjectOutput",
                vec![
                    MemberDraft::new("Body", "Body").payload(),
                    MemberDraft::new("ContentLength", "Integer").header("Content-Length"),
                    MemberDraft::new("ContentType", "String").header("Content-Type"),
                    MemberDraft::new("ETag", "String").header("ETag"),
                    MemberDraft::new("LastModified", "HttpDate").header("Last-Modified"),
                    MemberDraft::new("VersionId", "String").header("x-amz-version-id"),
                    MemberDraft::new("Metadata", "Metadata").headers("x-amz-meta-"),
                ],
            ),
            ShapeDraft::structure(
                "PutObjectRequest",
                vec![
                    MemberDraft::new("Bucket", "String").uri("Bucket").required(),
                    MemberDraft::new("Key", "String").uri("Key").required(),
                    MemberDraft::new("Body", "Body").payload(),
                    MemberDraft::new("ContentType", "String").header("Content-Type"),
                    MemberDraft::new("CacheControl", "String").header("Cache-Control"),
                    MemberDraft::new("StorageClass", "String").header("x-amz-storage-class"),
                    MemberDraft::new("Metadata", "Metadata").headers("x-amz-meta-"),
                    MemberDraft::new("ExpectedBucketOwner", "String").header("x-amz-expected-bucket-owner"),
                ],
            ),
            ShapeDraft::structure(
                "PutObjectOutput",
                vec![
                    MemberDraft::new("ETag", "String").header("ETag"),
                    MemberDraft::new("VersionId", "String").header("x-amz-version-id"),
                ],
            ),
            ShapeDraft::structure(
                "Owner",
                vec![
                    MemberDraft::new("ID", "String"),
                    MemberDraft::new("DisplayName", "String"),
                ],
            ),
            ShapeDraft::structure(
                "Object",
                vec![
                    MemberDraft::new("Key", "String"),
                    MemberDraft::new("LastModified", "DateTime"),
                    MemberDraft::new("ETag", "String"),
                    MemberDraft::new("Size", "Integer"),
                    MemberDraft::new("StorageClass", "String"),
                    MemberDraft::new("Owner", "Owner"),
                ],
            ),
            ShapeDraft::list("ObjectList", "Object"),
            ShapeDraft::structure("CommonPrefix", vec![MemberDraft::new("Prefix", "String")]),
            ShapeDraft::list("CommonPrefixList", "CommonPrefix"),
            ShapeDraft::structure(
                "ListObjectsV2Request",
                vec![
                    MemberDraft::new("Bucket", "String").uri("Bucket").required(),
                    MemberDraft::new("Prefix", "String").query("prefix"),
                    MemberDraft::new("Delimiter", "String").query("delimiter"),
                    MemberDraft::new("MaxKeys", "Integer").query("max-keys"),
                    MemberDraft::new("ContinuationToken", "String").query("continuation-token"),
                    MemberDraft::new("StartAfter", "String").query("start-after"),
                    MemberDraft::new("ExpectedBucketOwner", "String").header("x-amz-expected-bucket-owner"),
                ],
            ),
            ShapeDraft::structure(
                "ListObjectsV2Output",
                vec![
                    MemberDraft::new("IsTruncated", "Boolean"),
                    MemberDraft::new("Contents", "ObjectList").flattened(),
                    MemberDraft::new("Name", "String"),
                    MemberDraft::new("Prefix", "String"),
                    MemberDraft::new("Delimiter", "String"),
                    MemberDraft::new("MaxKeys", "Integer"),
                    MemberDraft::new("CommonPrefixes", "CommonPrefixList").flattened(),
                    MemberDraft::new("KeyCount", "Integer"),
                    MemberDraft::new("ContinuationToken", "String"),
                    MemberDraft::new("NextContinuationToken", "String"),
                ],
            ),
        ])
        .operation(
            OperationDraft::new("GetBucketCors", "GET", "/{Bucket}?cors")
                .input("GetBucketCorsRequest")
                .output("GetBucketCorsOutput"),
        )
        .operation(
            OperationDraft::new("PutBucketCors", "PUT", "/{Bucket}?cors").input("PutBucketCorsRequest"),
        )
        .operation(
            OperationDraft::new("HeadBucket", "HEAD", "/{Bucket}")
                .input("HeadBucketRequest")
                .output("HeadBucketOutput"),
        )
        .operation(
            OperationDraft::new("HeadObject", "HEAD", "/{Bucket}/{Key+}")
                .input("HeadObjectRequest")
                .output("HeadObjectOutput"),
        )
        .operation(
            OperationDraft::new("GetObject", "GET", "/{Bucket}/{Key+}")
                .input("GetObjectRequest")
                .output("GetObjectOutput"),
        )
        .operation(
            OperationDraft::new("PutObject", "PUT", "/{Bucket}/{Key+}")
                .input("PutObjectRequest")
                .output("PutObjectOutput"),
        )
        .operation(
            OperationDraft::new("ListObjectsV2", "GET", "/{Bucket}?list-type=2")
                .input("ListObjectsV2Request")
                .output("ListObjectsV2Output")
                .paginated(
                    Pagination::new("ContinuationToken", "NextContinuationToken")
                        .limit_key("MaxKeys")
                        .result_key("Contents"),
                ),
        )
        .waiter(
            WaiterSpec::new("BucketExists", "HeadBucket", Delay::Fixed(Duration::from_secs(5)), 20)
                .success(Matcher::Status(200))
                .success(Matcher::Status(301))
                .success(Matcher::Status(403))
                .retry(Matcher::Status(404)),
        )
        .waiter(
            WaiterSpec::new("BucketNotExists", "HeadBucket", Delay::Fixed(Duration::from_secs(5)), 20)
                .success(Matcher::Status(404)),
        )
        .waiter(
            WaiterSpec::new("ObjectExists", "HeadObject", Delay::Fixed(Duration::from_secs(5)), 20)
                .success(Matcher::Status(200))
                .retry(Matcher::Status(404)),
        )
        .waiter(
            WaiterSpec::new("ObjectNotExists", "HeadObject", Delay::Fixed(Duration::from_secs(5)), 20)
                .success(Matcher::Status(404)),
        )
        .error("NoSuchBucket", "NoSuchBucketException")
        .error("NoSuchKey", "NoSuchKeyException")
        .error("NoSuchCORSConfiguration", "NoSuchCORSConfigurationException")
        .error("BucketAlreadyExists", "BucketAlreadyExistsException")
        .error("BucketAlreadyOwnedByYou", "BucketAlreadyOwnedByYouException")
        .error("InvalidObjectState", "InvalidObjectStateException")
        .build()
}

// ── Types ───────────────────────────────────────────────────────────────

/// One CORS rule of a bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorsRule {
    pub id: Option<String>,
    pub allowed_headers: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_origins: Vec<String>,
    pub expose_headers: Vec<String>,
    pub max_age_seconds: Option<i64>,
}

impl CorsRule {
    fn from_value(v: &Value) -> Self {
        Self {
            id: v.string("ID"),
            allowed_headers: v.strings("AllowedHeaders"),
            allowed_methods: v.strings("AllowedMethods"),
            allowed_origins: v.strings("AllowedOrigins"),
            expose_headers: v.strings("ExposeHeaders"),
            max_age_seconds: v.get("MaxAgeSeconds").and_then(Value::as_i64),
        }
    }

    fn to_value(&self) -> Value {
        let list = |items: &[String]| (!items.is_empty()).then(|| Value::from(items.to_vec()));
        StructBuilder::new()
            .optional("ID", self.id.as_deref())
            .optional("AllowedHeaders", list(&self.allowed_headers))
            .field("AllowedMethods", self.allowed_methods.clone())
            .field("AllowedOrigins", self.allowed_origins.clone())
            .optional("ExposeHeaders", list(&self.expose_headers))
            .optional("MaxAgeSeconds", self.max_age_seconds)
            .build()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetBucketCorsInput {
    pub bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_bucket_owner: Option<String>,
}

impl Input for GetBucketCorsInput {
    type Output = GetBucketCorsOutput;
    const OPERATION: &'static str = "GetBucketCors";

    fn to_value(&self) -> Value {
        StructBuilder::new()
            .field("Bucket", &self.bucket)
            .optional("ExpectedBucketOwner", self.expected_bucket_owner.as_deref())
            .build()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetBucketCorsOutput {
    pub cors_rules: Vec<CorsRule>,
}

impl Output for GetBucketCorsOutput {
    fn from_value(value: Value) -> SdkResult<Self> {
        Ok(Self {
            cors_rules: value
                .get("CORSRules")
                .and_then(Value::as_list)
                .map(|rules| rules.iter().map(CorsRule::from_value).collect())
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PutBucketCorsInput {
    pub bucket: String,
    pub cors_rules: Vec<CorsRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_md5: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_bucket_owner: Option<String>,
}

impl Input for PutBucketCorsInput {
    type Output = Value;
    const OPERATION: &'static str = "PutBucketCors";

    fn to_value(&self) -> Value {
        let rules: Vec<Value> = self.cors_rules.iter().map(CorsRule::to_value).collect();
        StructBuilder::new()
            .field("Bucket", &self.bucket)
            .field("CORSConfiguration", Value::structure([("CORSRules", Value::list(rules))]))
            .optional("ContentMD5", self.content_md5.as_deref())
            .optional("ExpectedBucketOwner", self.expected_bucket_owner.as_deref())
            .build()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeadObjectInput {
    pub bucket: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub if_match: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_bucket_owner: Option<String>,
}

impl Input for HeadObjectInput {
    type Output = ObjectMetadata;
    const OPERATION: &'static str = "HeadObject";

    fn to_value(&self) -> Value {
        StructBuilder::new()
            .field("Bucket", &self.bucket)
            .field("Key", &self.key)
            .optional("VersionId", self.version_id.as_deref())
            .optional("IfMatch", self.if_match.as_deref())
            .optional("ExpectedBucketOwner", self.expected_bucket_owner.as_deref())
            .build()
    }
}

/// S3 object details (from HeadObject).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    pub content_length: Option<i64>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
    pub version_id: Option<String>,
    pub storage_class: Option<String>,
    /// User metadata, keyed without the `x-amz-meta-` prefix.
    pub metadata: BTreeMap<String, String>,
}

impl Output for ObjectMetadata {
    fn from_value(value: Value) -> SdkResult<Self> {
        Ok(Self {
            content_length: value.get("ContentLength").and_then(Value::as_i64),
            content_type: value.string("ContentType"),
            etag: value.string("ETag"),
            last_modified: value.get("LastModified").and_then(Value::as_timestamp),
            version_id: value.string("VersionId"),
            storage_class: value.string("StorageClass"),
            metadata: value.string_map("Metadata"),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetObjectInput {
    pub bucket: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}

impl Input for GetObjectInput {
    type Output = GetObjectOutput;
    const OPERATION: &'static str = "GetObject";

    fn to_value(&self) -> Value {
        StructBuilder::new()
            .field("Bucket", &self.bucket)
            .field("Key", &self.key)
            .optional("Range", self.range.as_deref())
            .optional("VersionId", self.version_id.as_deref())
            .build()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetObjectOutput {
    pub body: Vec<u8>,
    pub metadata: ObjectMetadata,
}

impl Output for GetObjectOutput {
    fn from_value(value: Value) -> SdkResult<Self> {
        let body = value
            .get("Body")
            .and_then(Value::as_blob)
            .map(<[u8]>::to_vec)
            .unwrap_or_default();
        Ok(Self {
            body,
            metadata: ObjectMetadata::from_value(value)?,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PutObjectInput {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub storage_class: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl Input for PutObjectInput {
    type Output = PutObjectOutput;
    const OPERATION: &'static str = "PutObject";

    fn to_value(&self) -> Value {
        let metadata = (!self.metadata.is_empty()).then(|| {
            Value::map(self.metadata.iter().map(|(k, v)| (k.clone(), Value::from(v))))
        });
        StructBuilder::new()
            .field("Bucket", &self.bucket)
            .field("Key", &self.key)
            .field("Body", Value::Blob(self.body.clone()))
            .optional("ContentType", self.content_type.as_deref())
            .optional("CacheControl", self.cache_control.as_deref())
            .optional("StorageClass", self.storage_class.as_deref())
            .optional("Metadata", metadata)
            .build()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PutObjectOutput {
    pub etag: Option<String>,
    pub version_id: Option<String>,
}

impl Output for PutObjectOutput {
    fn from_value(value: Value) -> SdkResult<Self> {
        Ok(Self {
            etag: value.string("ETag"),
            version_id: value.string("VersionId"),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListObjectsV2Input {
    pub bucket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_keys: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,
}

impl Input for ListObjectsV2Input {
    type Output = ListObjectsV2Output;
    const OPERATION: &'static str = "ListObjectsV2";

    fn to_value(&self) -> Value {
        StructBuilder::new()
            .field("Bucket", &self.bucket)
            .optional("Prefix", self.prefix.as_deref())
            .optional("Delimiter", self.delimiter.as_deref())
            .optional("MaxKeys", self.max_keys)
            .optional("ContinuationToken", self.continuation_token.as_deref())
            .build()
    }
}

/// S3 object summary from a listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub key: String,
    pub size: i64,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: Option<String>,
    pub storage_class: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListObjectsV2Output {
    pub name: Option<String>,
    pub contents: Vec<Object>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub key_count: Option<i64>,
    pub next_continuation_token: Option<String>,
}

impl Output for ListObjectsV2Output {
    fn from_value(value: Value) -> SdkResult<Self> {
        let contents = value
            .get("Contents")
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .map(|o| Object {
                        key: o.string("Key").unwrap_or_default(),
                        size: o.get("Size").and_then(Value::as_i64).unwrap_or(0),
                        last_modified: o.get("LastModified").and_then(Value::as_timestamp),
                        etag: o.string("ETag"),
                        storage_class: o.string("StorageClass"),
                    })
                    .collect()
            })
            .unwrap_or_default();
        let common_prefixes = value
            .get("CommonPrefixes")
            .and_then(Value::as_list)
            .map(|items| items.iter().filter_map(|p| p.string("Prefix")).collect())
            .unwrap_or_default();
        Ok(Self {
            name: value.string("Name"),
            contents,
            common_prefixes,
            is_truncated: value.get("IsTruncated").and_then(Value::as_bool).unwrap_or(false),
            key_count: value.get("KeyCount").and_then(Value::as_i64),
            next_continuation_token: value.string("NextContinuationToken"),
        })
    }
}

// ── S3 Client ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct S3Client {
    client: Client,
}

impl S3Client {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn get_bucket_cors(&self, input: &GetBucketCorsInput) -> SdkResult<LazyResult<GetBucketCorsOutput>> {
        self.client.send(input).await
    }

    pub async fn put_bucket_cors(&self, input: &PutBucketCorsInput) -> SdkResult<LazyResult> {
        self.client.send(input).await
    }

    pub async fn head_object(&self, input: &HeadObjectInput) -> SdkResult<LazyResult<ObjectMetadata>> {
        self.client.send(input).await
    }

    pub async fn get_object(&self, input: &GetObjectInput) -> SdkResult<LazyResult<GetObjectOutput>> {
        self.client.send(input).await
    }

    pub async fn put_object(&self, input: &PutObjectInput) -> SdkResult<LazyResult<PutObjectOutput>> {
        self.client.send(input).await
    }

    pub async fn list_objects_v2(&self, input: &ListObjectsV2Input) -> SdkResult<LazyResult<ListObjectsV2Output>> {
        self.client.send(input).await
    }

    /// Every page of a listing, following continuation tokens.
    pub fn list_objects_v2_pages(&self, input: &ListObjectsV2Input) -> BoxStream<'static, SdkResult<ListObjectsV2Output>> {
        self.client
            .pages(ListObjectsV2Input::OPERATION, input.to_value())
            .map(|page| page.and_then(ListObjectsV2Output::from_value))
            .boxed()
    }

    /// A presigned GET URL for an object.
    pub async fn presign_get_object(&self, bucket: &str, key: &str, expires: Duration) -> SdkResult<String> {
        let input = GetObjectInput {
            bucket: bucket.to_string(),
            key: key.to_string(),
            ..Default::default()
        };
        self.client
            .presign(GetObjectInput::OPERATION, &input.to_value(), expires)
            .await
    }

    pub async fn wait_until_bucket_exists(&self, bucket: &str) -> SdkResult<()> {
        let input = Value::structure([("Bucket", Value::from(bucket))]);
        self.client.waiter("BucketExists", input).await?.wait().await
    }

    pub async fn wait_until_object_exists(&self, bucket: &str, key: &str) -> SdkResult<()> {
        let input = Value::structure([("Bucket", Value::from(bucket)), ("Key", Value::from(key))]);
        self.client.waiter("ObjectExists", input).await?.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use lazyaws_core::credentials::{Credentials, StaticProvider};
    use lazyaws_core::{Configuration, ErrorKind, RawResponse, StubTransport};

    fn s3(stub: &StubTransport) -> S3Client {
        let client = Client::builder(definition().unwrap())
            .config(Configuration::default().with_region("eu-west-1"))
            .credentials(Arc::new(StaticProvider::new(Credentials::new(
                "AKIDEXAMPLE",
                "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            ))))
            .transport(Arc::new(stub.clone()))
            .build()
            .unwrap();
        S3Client::new(client)
    }

    #[tokio::test]
    async fn get_bucket_cors_binds_uri_and_header() {
        let stub = StubTransport::new();
        stub.push(RawResponse::new(200).with_body(
            r#"<CORSConfiguration xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
                 <CORSRule>
                   <ID>web</ID>
                   <AllowedMethod>GET</AllowedMethod>
                   <AllowedMethod>PUT</AllowedMethod>
                   <AllowedOrigin>https://example.com</AllowedOrigin>
                   <MaxAgeSeconds>3000</MaxAgeSeconds>
                 </CORSRule>
               </CORSConfiguration>"#,
        ));
        let input = GetBucketCorsInput {
            bucket: "b".to_string(),
            expected_bucket_owner: Some("o".to_string()),
        };
        let output = s3(&stub).get_bucket_cors(&input).await.unwrap().into_output().await.unwrap();
        assert_eq!(output.cors_rules.len(), 1);
        assert_eq!(output.cors_rules[0].allowed_methods, vec!["GET", "PUT"]);
        assert_eq!(output.cors_rules[0].max_age_seconds, Some(3000));
        assert!(output.cors_rules[0].allowed_headers.is_empty());

        let sent = stub.last_request().unwrap();
        assert_eq!(sent.method, "GET");
        assert_eq!(sent.url(), "https://s3.eu-west-1.amazonaws.com/b?cors");
        assert_eq!(sent.headers.get("x-amz-expected-bucket-owner"), Some("o"));
        assert!(sent.headers.contains("x-amz-content-sha256"));
        assert!(sent.body.is_empty());
    }

    #[tokio::test]
    async fn put_bucket_cors_writes_namespaced_payload() {
        let stub = StubTransport::new();
        stub.push(RawResponse::new(200));
        let input = PutBucketCorsInput {
            bucket: "b".to_string(),
            cors_rules: vec![CorsRule {
                allowed_methods: vec!["GET".to_string()],
                allowed_origins: vec!["*".to_string()],
                ..Default::default()
            }],
            ..Default::default()
        };
        s3(&stub).put_bucket_cors(&input).await.unwrap().resolve().await.unwrap();

        let sent = stub.last_request().unwrap();
        let body = String::from_utf8(sent.body.to_vec()).unwrap();
        assert!(body.contains(r#"<CORSConfiguration xmlns="http://s3.amazonaws.com/doc/2006-03-01/">"#));
        assert!(body.contains("<CORSRule><AllowedMethod>GET</AllowedMethod><AllowedOrigin>*</AllowedOrigin></CORSRule>"));
    }

    #[tokio::test]
    async fn head_object_reads_headers() {
        let stub = StubTransport::new();
        stub.push(
            RawResponse::new(200)
                .with_header("Content-Length", "11")
                .with_header("ETag", "\"abc\"")
                .with_header("Last-Modified", "Wed, 01 Mar 2023 12:00:00 GMT")
                .with_header("X-Amz-Meta-Owner", "team-a")
                .with_header("x-amz-meta-stage", "prod"),
        );
        let input = HeadObjectInput {
            bucket: "b".to_string(),
            key: "dir/file name.txt".to_string(),
            ..Default::default()
        };
        let meta = s3(&stub).head_object(&input).await.unwrap().into_output().await.unwrap();
        assert_eq!(meta.content_length, Some(11));
        assert_eq!(meta.etag.as_deref(), Some("\"abc\""));
        assert_eq!(meta.last_modified.unwrap().to_rfc3339(), "2023-03-01T12:00:00+00:00");
        assert_eq!(meta.metadata.get("owner").map(String::as_str), Some("team-a"));
        assert_eq!(meta.metadata.get("stage").map(String::as_str), Some("prod"));
        assert!(meta.content_type.is_none());

        assert_eq!(stub.last_request().unwrap().path, "/b/dir/file%20name.txt");
    }

    #[tokio::test]
    async fn put_object_sends_raw_body_and_metadata() {
        let stub = StubTransport::new();
        stub.push(RawResponse::new(200).with_header("ETag", "\"e1\""));
        let mut metadata = BTreeMap::new();
        metadata.insert("origin".to_string(), "upload".to_string());
        let input = PutObjectInput {
            bucket: "b".to_string(),
            key: "k".to_string(),
            body: b"hello world".to_vec(),
            content_type: Some("text/plain".to_string()),
            metadata,
            ..Default::default()
        };
        let out = s3(&stub).put_object(&input).await.unwrap().into_output().await.unwrap();
        assert_eq!(out.etag.as_deref(), Some("\"e1\""));

        let sent = stub.last_request().unwrap();
        assert_eq!(&sent.body[..], b"hello world");
        assert_eq!(sent.headers.get("x-amz-meta-origin"), Some("upload"));
        assert_eq!(sent.headers.get("content-type"), Some("text/plain"));
    }

    #[tokio::test]
    async fn get_object_body_is_raw() {
        let stub = StubTransport::new();
        stub.push(RawResponse::new(200).with_body(&b"\x00\x01binary"[..]).with_header("Content-Type", "application/octet-stream"));
        let input = GetObjectInput {
            bucket: "b".to_string(),
            key: "k".to_string(),
            ..Default::default()
        };
        let out = s3(&stub).get_object(&input).await.unwrap().into_output().await.unwrap();
        assert_eq!(out.body, b"\x00\x01binary".to_vec());
        assert_eq!(out.metadata.content_type.as_deref(), Some("application/octet-stream"));
    }

    #[tokio::test]
    async fn missing_key_maps_to_exception() {
        let stub = StubTransport::new();
        stub.push(RawResponse::new(404).with_body(
            "<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message><RequestId>4442587FB7D0A2F9</RequestId></Error>",
        ));
        let input = GetObjectInput {
            bucket: "b".to_string(),
            key: "missing".to_string(),
            ..Default::default()
        };
        let err = s3(&stub).get_object(&input).await.unwrap().into_output().await.unwrap_err();
        assert_eq!(err.operation(), Some("GetObject"));
        assert_eq!(err.request_id(), Some("4442587FB7D0A2F9"));
        match err.kind() {
            ErrorKind::Client(e) => assert_eq!(e.exception.as_deref(), Some("NoSuchKeyException")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn listing_pages_follow_continuation_tokens() {
        let stub = StubTransport::new();
        stub.push(RawResponse::new(200).with_body(
            "<ListBucketResult><Name>b</Name><IsTruncated>true</IsTruncated><Contents><Key>a</Key><Size>1</Size></Contents><NextContinuationToken>t1</NextContinuationToken></ListBucketResult>",
        ))
        .push(RawResponse::new(200).with_body(
            "<ListBucketResult><Name>b</Name><IsTruncated>false</IsTruncated><Contents><Key>b</Key><Size>2</Size></Contents><Contents><Key>c</Key><Size>3</Size></Contents></ListBucketResult>",
        ));

        let input = ListObjectsV2Input {
            bucket: "b".to_string(),
            max_keys: Some(2),
            ..Default::default()
        };
        let pages: Vec<ListObjectsV2Output> = s3(&stub).list_objects_v2_pages(&input).try_collect().await.unwrap();
        assert_eq!(pages.len(), 2);
        let keys: Vec<&str> = pages.iter().flat_map(|p| p.contents.iter().map(|o| o.key.as_str())).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);

        let requests = stub.requests();
        assert_eq!(requests[0].query_param("list-type"), Some("2"));
        assert_eq!(requests[0].query_param("max-keys"), Some("2"));
        assert_eq!(requests[0].query_param("continuation-token"), None);
        assert_eq!(requests[1].query_param("continuation-token"), Some("t1"));
    }

    #[tokio::test]
    async fn presigned_get_carries_signature() {
        let url = s3(&StubTransport::new())
            .presign_get_object("b", "k", Duration::from_secs(600))
            .await
            .unwrap();
        assert!(url.starts_with("https://s3.eu-west-1.amazonaws.com/b/k?"));
        assert!(url.contains("X-Amz-Expires=600"));
        assert!(url.contains("X-Amz-Signature="));
    }

    #[test]
    fn us_east_1_uses_legacy_endpoint() {
        let def = definition().unwrap();
        assert_eq!(def.endpoints.resolve("us-east-1").unwrap().endpoint, "https://s3.amazonaws.com");
        assert_eq!(def.endpoints.resolve("cn-north-1").unwrap().endpoint, "https://s3.cn-north-1.amazonaws.com.cn");
        assert_eq!(def.waiter("ObjectExists").unwrap().operation, "HeadObject");
    }
}
