//! Amazon SQS (Simple Queue Service) binding.
//!
//! Speaks the query protocol (API version 2012-11-05): form-encoded
//! `Action`/`Version` requests and `<{Action}Result>`-wrapped XML replies.
//!
//! Reference: <https://docs.aws.amazon.com/AWSSimpleQueueService/latest/APIReference/>

use futures::stream::{BoxStream, StreamExt};
use lazyaws_core::result::{Input, LazyResult, Output};
use lazyaws_core::shape::{MemberDraft, ShapeDraft};
use lazyaws_core::waiter::{Delay, Matcher, WaiterSpec};
use lazyaws_core::{
    Client, EndpointRules, OperationDraft, Pagination, Protocol, SdkResult, ServiceDefinition,
    StructBuilder, Value,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub const API_VERSION: &str = "2012-11-05";

/// Code SQS reports for a queue that does not exist.
pub const NON_EXISTENT_QUEUE: &str = "AWS.SimpleQueueService.NonExistentQueue";

lazy_static::lazy_static! {
    static ref DEFINITION: SdkResult<Arc<ServiceDefinition>> = build_definition().map(Arc::new);
}

pub fn definition() -> SdkResult<Arc<ServiceDefinition>> {
    DEFINITION.clone()
}

fn build_definition() -> SdkResult<ServiceDefinition> {
    ServiceDefinition::builder("sqs", API_VERSION, Protocol::Query)
        .endpoints(
            EndpointRules::new("sqs")
                .region("us-gov-west-1", "https://sqs.us-gov-west-1.amazonaws.com", "us-gov-west-1"),
        )
        .shapes([
            ShapeDraft::string("String"),
            ShapeDraft::integer("Integer"),
            ShapeDraft::list("QueueUrlList", "String"),
            ShapeDraft::list("AttributeNameList", "String"),
            ShapeDraft::map("QueueAttributeMap", "String", "String").entry_names("Name", "Value"),
            ShapeDraft::structure(
                "GetQueueUrlRequest",
                vec![
                    MemberDraft::new("QueueName", "String").required(),
                    MemberDraft::new("QueueOwnerAWSAccountId", "String"),
                ],
            ),
            ShapeDraft::structure("GetQueueUrlResult", vec![MemberDraft::new("QueueUrl", "String")]),
            ShapeDraft::structure(
                "ListQueuesRequest",
                vec![
                    MemberDraft::new("QueueNamePrefix", "String"),
                    MemberDraft::new("NextToken", "String"),
                    MemberDraft::new("MaxResults", "Integer"),
                ],
            ),
            ShapeDraft::structure(
                "ListQueuesResult",
                vec![
                    MemberDraft::new("QueueUrls", "QueueUrlList")
                        .location_name("QueueUrl")
                        .flattened(),
                    MemberDraft::new("NextToken", "String"),
                ],
            ),
            ShapeDraft::structure(
                "SendMessageRequest",
                vec![
                    MemberDraft::new("QueueUrl", "String").required(),
                    MemberDraft::new("MessageBody", "String").required(),
                    MemberDraft::new("DelaySeconds", "Integer"),
                    MemberDraft::new("MessageDeduplicationId", "String"),
                    MemberDraft::new("MessageGroupId", "String"),
                ],
            ),
            ShapeDraft::structure(
                "SendMessageResult",
                vec![
                    MemberDraft::new("MD5OfMessageBody", "String"),
                    MemberDraft::new("MessageId", "String"),
                    MemberDraft::new("SequenceNumber", "String"),
                ],
            ),
            ShapeDraft::structure(
                "GetQueueAttributesRequest",
                vec![
                    MemberDraft::new("QueueUrl", "String").required(),
                    MemberDraft::new("AttributeNames", "AttributeNameList")
                        .location_name("AttributeName")
                        .flattened(),
                ],
            ),
            ShapeDraft::structure(
                "GetQueueAttributesResult",
                vec![MemberDraft::new("Attributes", "QueueAttributeMap")
                    .location_name("Attribute")
                    .flattened()],
            ),
        ])
        .operation(
            OperationDraft::post("GetQueueUrl")
                .input("GetQueueUrlRequest")
                .output("GetQueueUrlResult"),
        )
        .operation(
            OperationDraft::post("ListQueues")
                .input("ListQueuesRequest")
                .output("ListQueuesResult")
                .paginated(
                    Pagination::new("NextToken", "NextToken")
                        .limit_key("MaxResults")
                        .result_key("QueueUrls"),
                ),
        )
        .operation(
            OperationDraft::post("SendMessage")
                .input("SendMessageRequest")
                .output("SendMessageResult"),
        )
        .operation(
            OperationDraft::post("GetQueueAttributes")
                .input("GetQueueAttributesRequest")
                .output("GetQueueAttributesResult"),
        )
        .waiter(
            WaiterSpec::new("QueueExists", "GetQueueUrl", Delay::Fixed(Duration::from_secs(5)), 40)
                .success(Matcher::Status(200))
                .retry(Matcher::error("QueueDoesNotExist")),
        )
        .error(NON_EXISTENT_QUEUE, "QueueDoesNotExist")
        .error("AWS.SimpleQueueService.QueueDeletedRecently", "QueueDeletedRecently")
        .error("InvalidAttributeName", "InvalidAttributeName")
        .error("AWS.SimpleQueueService.UnsupportedOperation", "UnsupportedOperation")
        .build()
}

// ── Types ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetQueueUrlInput {
    pub queue_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_owner_account_id: Option<String>,
}

impl Input for GetQueueUrlInput {
    type Output = GetQueueUrlOutput;
    const OPERATION: &'static str = "GetQueueUrl";

    fn to_value(&self) -> Value {
        StructBuilder::new()
            .field("QueueName", &self.queue_name)
            .optional("QueueOwnerAWSAccountId", self.queue_owner_account_id.as_deref())
            .build()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetQueueUrlOutput {
    pub queue_url: Option<String>,
}

impl Output for GetQueueUrlOutput {
    fn from_value(value: Value) -> SdkResult<Self> {
        Ok(Self {
            queue_url: value.string("QueueUrl"),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQueuesInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_name_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_results: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

impl Input for ListQueuesInput {
    type Output = ListQueuesOutput;
    const OPERATION: &'static str = "ListQueues";

    fn to_value(&self) -> Value {
        StructBuilder::new()
            .optional("QueueNamePrefix", self.queue_name_prefix.as_deref())
            .optional("NextToken", self.next_token.as_deref())
            .optional("MaxResults", self.max_results)
            .build()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListQueuesOutput {
    pub queue_urls: Vec<String>,
    pub next_token: Option<String>,
}

impl Output for ListQueuesOutput {
    fn from_value(value: Value) -> SdkResult<Self> {
        Ok(Self {
            queue_urls: value.strings("QueueUrls"),
            next_token: value.string("NextToken"),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendMessageInput {
    pub queue_url: String,
    pub message_body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_seconds: Option<u32>,
    /// FIFO queues only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_group_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_deduplication_id: Option<String>,
}

impl Input for SendMessageInput {
    type Output = SendMessageOutput;
    const OPERATION: &'static str = "SendMessage";

    fn to_value(&self) -> Value {
        StructBuilder::new()
            .field("QueueUrl", &self.queue_url)
            .field("MessageBody", &self.message_body)
            .optional("DelaySeconds", self.delay_seconds)
            .optional("MessageDeduplicationId", self.message_deduplication_id.as_deref())
            .optional("MessageGroupId", self.message_group_id.as_deref())
            .build()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SendMessageOutput {
    pub message_id: Option<String>,
    pub md5_of_message_body: Option<String>,
    pub sequence_number: Option<String>,
}

impl Output for SendMessageOutput {
    fn from_value(value: Value) -> SdkResult<Self> {
        Ok(Self {
            message_id: value.string("MessageId"),
            md5_of_message_body: value.string("MD5OfMessageBody"),
            sequence_number: value.string("SequenceNumber"),
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetQueueAttributesInput {
    pub queue_url: String,
    /// Attribute names to fetch; `All` returns every attribute.
    pub attribute_names: Vec<String>,
}

impl Input for GetQueueAttributesInput {
    type Output = QueueAttributes;
    const OPERATION: &'static str = "GetQueueAttributes";

    fn to_value(&self) -> Value {
        let names = (!self.attribute_names.is_empty()).then(|| Value::from(self.attribute_names.clone()));
        StructBuilder::new()
            .field("QueueUrl", &self.queue_url)
            .optional("AttributeNames", names)
            .build()
    }
}

/// SQS queue attributes by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueAttributes {
    pub attributes: BTreeMap<String, String>,
}

impl QueueAttributes {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn approximate_number_of_messages(&self) -> Option<u64> {
        self.get("ApproximateNumberOfMessages").and_then(|v| v.parse().ok())
    }

    pub fn is_fifo(&self) -> bool {
        self.get("FifoQueue") == Some("true")
    }
}

impl Output for QueueAttributes {
    fn from_value(value: Value) -> SdkResult<Self> {
        Ok(Self {
            attributes: value.string_map("Attributes"),
        })
    }
}

// ── SQS Client ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SqsClient {
    client: Client,
}

impl SqsClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn get_queue_url(&self, input: &GetQueueUrlInput) -> SdkResult<LazyResult<GetQueueUrlOutput>> {
        self.client.send(input).await
    }

    pub async fn list_queues(&self, input: &ListQueuesInput) -> SdkResult<LazyResult<ListQueuesOutput>> {
        self.client.send(input).await
    }

    /// Every queue URL across all pages.
    pub fn list_queues_pages(&self, input: &ListQueuesInput) -> BoxStream<'static, SdkResult<ListQueuesOutput>> {
        self.client
            .pages(ListQueuesInput::OPERATION, input.to_value())
            .map(|page| page.and_then(ListQueuesOutput::from_value))
            .boxed()
    }

    pub async fn send_message(&self, input: &SendMessageInput) -> SdkResult<LazyResult<SendMessageOutput>> {
        self.client.send(input).await
    }

    pub async fn get_queue_attributes(
        &self,
        input: &GetQueueAttributesInput,
    ) -> SdkResult<LazyResult<QueueAttributes>> {
        self.client.send(input).await
    }

    pub async fn wait_until_queue_exists(&self, queue_name: &str) -> SdkResult<()> {
        let input = GetQueueUrlInput {
            queue_name: queue_name.to_string(),
            ..Default::default()
        };
        self.client.waiter("QueueExists", input.to_value()).await?.wait().await
    }
}
