//! Amazon DynamoDB binding.
//!
//! JSON 1.0 protocol with `X-Amz-Target: DynamoDB_20120810.<Operation>`.
//! Item attributes use the recursive `AttributeValue` union.

use lazyaws_core::result::{Input, LazyResult, Output};
use lazyaws_core::shape::{MemberDraft, ShapeDraft};
use lazyaws_core::waiter::{Delay, Matcher, WaiterSpec};
use lazyaws_core::{
    Client, EndpointRules, OperationDraft, Protocol, SdkError, SdkResult, ServiceDefinition,
    StructBuilder, Value,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub const API_VERSION: &str = "2012-08-10";
const TARGET_PREFIX: &str = "DynamoDB_20120810";

lazy_static::lazy_static! {
    static ref DEFINITION: SdkResult<Arc<ServiceDefinition>> = build_definition().map(Arc::new);
}

pub fn definition() -> SdkResult<Arc<ServiceDefinition>> {
    DEFINITION.clone()
}

fn build_definition() -> SdkResult<ServiceDefinition> {
    ServiceDefinition::builder("dynamodb", API_VERSION, Protocol::Json)
        .target_prefix(TARGET_PREFIX)
        .json_version("1.0")
        .endpoints(EndpointRules::new("dynamodb").region(
            "local",
            "http://localhost:8000",
            "us-east-1",
        ))
        .shapes([
            ShapeDraft::string("String"),
            ShapeDraft::integer("Long"),
            ShapeDraft::boolean("Boolean"),
            ShapeDraft::blob("Binary"),
            ShapeDraft::timestamp("Date"),
            ShapeDraft::list("StringSet", "String"),
            ShapeDraft::list("BinarySet", "Binary"),
            ShapeDraft::list("AttributeNameList", "String"),
            ShapeDraft::map("AttributeMap", "String", "AttributeValue"),
            ShapeDraft::list("ListAttributeValue", "AttributeValue"),
            ShapeDraft::structure(
                "AttributeValue",
                vec![
                    MemberDraft::new("S", "String"),
                    MemberDraft::new("N", "String"),
                    MemberDraft::new("B", "Binary"),
                    MemberDraft::new("SS", "StringSet"),
                    MemberDraft::new("NS", "StringSet"),
                    MemberDraft::new("BS", "BinarySet"),
                    MemberDraft::new("M", "AttributeMap"),
                    MemberDraft::new("L", "ListAttributeValue"),
                    MemberDraft::new("NULL", "Boolean"),
                    MemberDraft::new("BOOL", "Boolean"),
                ],
            ),
            ShapeDraft::structure(
                "GetItemInput",
                vec![
                    MemberDraft::new("TableName", "String").required(),
                    MemberDraft::new("Key", "AttributeMap").required(),
                    MemberDraft::new("AttributesToGet", "AttributeNameList"),
                    MemberDraft::new("ConsistentRead", "Boolean"),
                    MemberDraft::new("ProjectionExpression", "String"),
                ],
            ),
            ShapeDraft::structure("GetItemOutput", vec![MemberDraft::new("Item", "AttributeMap")]),
            ShapeDraft::structure(
                "KeySchemaElement",
                vec![
                    MemberDraft::new("AttributeName", "String").required(),
                    MemberDraft::new("KeyType", "String").required(),
                ],
            ),
            ShapeDraft::list("KeySchema", "KeySchemaElement"),
            ShapeDraft::structure(
                "TableDescription",
                vec![
                    MemberDraft::new("TableName", "String"),
                    MemberDraft::new("TableStatus", "String"),
                    MemberDraft::new("TableArn", "String"),
                    MemberDraft::new("KeySchema", "KeySchema"),
                    MemberDraft::new("CreationDateTime", "Date"),
                    MemberDraft::new("ItemCount", "Long"),
                    MemberDraft::new("TableSizeBytes", "Long"),
                ],
            ),
            ShapeDraft::structure(
                "DescribeTableInput",
                vec![MemberDraft::new("TableName", "String").required()],
            ),
            ShapeDraft::structure(
                "DescribeTableOutput",
                vec![MemberDraft::new("Table", "TableDescription")],
            ),
        ])
        .operation(OperationDraft::post("GetItem").input("GetItemInput").output("GetItemOutput"))
        .operation(
            OperationDraft::post("DescribeTable")
                .input("DescribeTableInput")
                .output("DescribeTableOutput"),
        )
        .waiter(
            WaiterSpec::new("TableExists", "DescribeTable", Delay::Fixed(Duration::from_secs(20)), 25)
                .success(Matcher::path("Table.TableStatus", "ACTIVE"))
                .retry(Matcher::error("ResourceNotFoundException")),
        )
        .waiter(
            WaiterSpec::new("TableNotExists", "DescribeTable", Delay::Fixed(Duration::from_secs(20)), 25)
                .success(Matcher::error("ResourceNotFoundException")),
        )
        .error("ResourceNotFoundException", "ResourceNotFoundException")
        .error("ProvisionedThroughputExceededException", "ProvisionedThroughputExceededException")
        .error("RequestLimitExceeded", "RequestLimitExceeded")
        .error("InternalServerError", "InternalServerError")
        .build()
}

// ── Types ───────────────────────────────────────────────────────────────

/// A DynamoDB attribute value. Numbers travel as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    S(String),
    N(String),
    B(Vec<u8>),
    Ss(Vec<String>),
    Ns(Vec<String>),
    Bs(Vec<Vec<u8>>),
    M(BTreeMap<String, AttributeValue>),
    L(Vec<AttributeValue>),
    Null,
    Bool(bool),
}

impl AttributeValue {
    pub fn to_value(&self) -> Value {
        let (tag, inner) = match self {
            AttributeValue::S(s) => ("S", Value::from(s)),
            AttributeValue::N(n) => ("N", Value::from(n)),
            AttributeValue::B(b) => ("B", Value::Blob(b.clone())),
            AttributeValue::Ss(items) => ("SS", Value::from(items.clone())),
            AttributeValue::Ns(items) => ("NS", Value::from(items.clone())),
            AttributeValue::Bs(items) => ("BS", Value::list(items.iter().cloned().map(Value::Blob))),
            AttributeValue::M(map) => ("M", item_to_value(map)),
            AttributeValue::L(items) => ("L", Value::list(items.iter().map(AttributeValue::to_value))),
            AttributeValue::Null => ("NULL", Value::from(true)),
            AttributeValue::Bool(b) => ("BOOL", Value::from(*b)),
        };
        Value::structure([(tag, inner)])
    }

    pub fn from_value(value: &Value) -> SdkResult<Self> {
        let fields = value
            .fields()
            .ok_or_else(|| SdkError::malformed("attribute value is not a structure"))?;
        let (tag, inner) = fields
            .iter()
            .next()
            .ok_or_else(|| SdkError::malformed("attribute value has no member set"))?;
        let text = |v: &Value| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| SdkError::malformed(format!("attribute {} is not a string", tag)))
        };
        let items = |v: &Value| v.as_list().unwrap_or_default().to_vec();
        Ok(match tag.as_str() {
            "S" => AttributeValue::S(text(inner)?),
            "N" => AttributeValue::N(text(inner)?),
            "B" => AttributeValue::B(inner.as_blob().unwrap_or_default().to_vec()),
            "SS" => AttributeValue::Ss(items(inner).iter().map(text).collect::<SdkResult<_>>()?),
            "NS" => AttributeValue::Ns(items(inner).iter().map(text).collect::<SdkResult<_>>()?),
            "BS" => AttributeValue::Bs(
                items(inner)
                    .iter()
                    .map(|b| b.as_blob().unwrap_or_default().to_vec())
                    .collect(),
            ),
            "M" => AttributeValue::M(item_from_value(inner)?),
            "L" => AttributeValue::L(
                items(inner)
                    .iter()
                    .map(AttributeValue::from_value)
                    .collect::<SdkResult<_>>()?,
            ),
            "NULL" => AttributeValue::Null,
            "BOOL" => AttributeValue::Bool(inner.as_bool().unwrap_or(false)),
            other => return Err(SdkError::malformed(format!("unknown attribute type \"{}\"", other))),
        })
    }

    pub fn as_s(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_n(&self) -> Option<&str> {
        match self {
            AttributeValue::N(n) => Some(n),
            _ => None,
        }
    }
}

pub type Item = BTreeMap<String, AttributeValue>;

fn item_to_value(item: &Item) -> Value {
    Value::map(item.iter().map(|(k, v)| (k.clone(), v.to_value())))
}

fn item_from_value(value: &Value) -> SdkResult<Item> {
    let Some(fields) = value.fields() else {
        return Ok(Item::new());
    };
    fields
        .iter()
        .map(|(k, v)| Ok((k.clone(), AttributeValue::from_value(v)?)))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct GetItemInput {
    pub table_name: String,
    pub key: Item,
    pub consistent_read: Option<bool>,
    pub projection_expression: Option<String>,
}

impl Input for GetItemInput {
    type Output = GetItemOutput;
    const OPERATION: &'static str = "GetItem";

    fn to_value(&self) -> Value {
        StructBuilder::new()
            .field("TableName", &self.table_name)
            .field("Key", item_to_value(&self.key))
            .optional("ConsistentRead", self.consistent_read)
            .optional("ProjectionExpression", self.projection_expression.as_deref())
            .build()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetItemOutput {
    /// `None` when no item has the key.
    pub item: Option<Item>,
}

impl Output for GetItemOutput {
    fn from_value(value: Value) -> SdkResult<Self> {
        Ok(Self {
            item: value.get("Item").map(item_from_value).transpose()?,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DescribeTableInput {
    pub table_name: String,
}

impl Input for DescribeTableInput {
    type Output = TableDescription;
    const OPERATION: &'static str = "DescribeTable";

    fn to_value(&self) -> Value {
        Value::structure([("TableName", Value::from(&self.table_name))])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySchemaElement {
    pub attribute_name: String,
    pub key_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableDescription {
    pub table_name: Option<String>,
    pub table_status: Option<String>,
    pub table_arn: Option<String>,
    pub key_schema: Vec<KeySchemaElement>,
    pub creation_date_time: Option<DateTime<Utc>>,
    pub item_count: Option<i64>,
    pub table_size_bytes: Option<i64>,
}

impl Output for TableDescription {
    fn from_value(value: Value) -> SdkResult<Self> {
        let Some(table) = value.get("Table") else {
            return Ok(Self::default());
        };
        let key_schema = table
            .get("KeySchema")
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .map(|k| KeySchemaElement {
                        attribute_name: k.string("AttributeName").unwrap_or_default(),
                        key_type: k.string("KeyType").unwrap_or_default(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self {
            table_name: table.string("TableName"),
            table_status: table.string("TableStatus"),
            table_arn: table.string("TableArn"),
            key_schema,
            creation_date_time: table.get("CreationDateTime").and_then(Value::as_timestamp),
            item_count: table.get("ItemCount").and_then(Value::as_i64),
            table_size_bytes: table.get("TableSizeBytes").and_then(Value::as_i64),
        })
    }
}

// ── DynamoDB Client ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DynamoDbClient {
    client: Client,
}

impl DynamoDbClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn get_item(&self, input: &GetItemInput) -> SdkResult<LazyResult<GetItemOutput>> {
        self.client.send(input).await
    }

    pub async fn describe_table(&self, table_name: &str) -> SdkResult<LazyResult<TableDescription>> {
        let input = DescribeTableInput {
            table_name: table_name.to_string(),
        };
        self.client.send(&input).await
    }

    pub async fn wait_until_table_exists(&self, table_name: &str) -> SdkResult<()> {
        let input = DescribeTableInput {
            table_name: table_name.to_string(),
        };
        self.client.waiter("TableExists", input.to_value()).await?.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazyaws_core::credentials::{Credentials, StaticProvider};
    use lazyaws_core::{Configuration, ErrorKind, RawResponse, StubTransport, WaiterState};

    fn dynamodb(stub: &StubTransport) -> DynamoDbClient {
        let client = Client::builder(definition().unwrap())
            .config(Configuration::default().with_region("us-west-2"))
            .credentials(Arc::new(StaticProvider::new(Credentials::new("AKID", "secret"))))
            .transport(Arc::new(stub.clone()))
            .build()
            .unwrap();
        DynamoDbClient::new(client)
    }

    #[tokio::test]
    async fn get_item_nested_attributes() {
        let stub = StubTransport::new();
        stub.push(RawResponse::new(200).with_body(
            r#"{"Item":{
                "pk":{"S":"user#1"},
                "age":{"N":"42"},
                "tags":{"SS":["a","b"]},
                "profile":{"M":{"nick":{"S":"z"},"history":{"L":[{"N":"1"},{"NULL":true}]}}},
                "avatar":{"B":"aGVsbG8="},
                "active":{"BOOL":true}
            }}"#,
        ));
        let mut key = Item::new();
        key.insert("pk".to_string(), AttributeValue::S("user#1".to_string()));
        let input = GetItemInput {
            table_name: "users".to_string(),
            key,
            consistent_read: Some(true),
            ..Default::default()
        };
        let out = dynamodb(&stub).get_item(&input).await.unwrap().into_output().await.unwrap();
        let item = out.item.unwrap();
        assert_eq!(item["age"].as_n(), Some("42"));
        assert_eq!(item["tags"], AttributeValue::Ss(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(item["avatar"], AttributeValue::B(b"hello".to_vec()));
        assert_eq!(item["active"], AttributeValue::Bool(true));
        match &item["profile"] {
            AttributeValue::M(profile) => {
                assert_eq!(profile["nick"].as_s(), Some("z"));
                assert_eq!(
                    profile["history"],
                    AttributeValue::L(vec![AttributeValue::N("1".to_string()), AttributeValue::Null])
                );
            }
            other => panic!("unexpected {:?}", other),
        }

        let sent = stub.last_request().unwrap();
        assert_eq!(sent.headers.get("x-amz-target"), Some("DynamoDB_20120810.GetItem"));
        assert_eq!(sent.headers.get("content-type"), Some("application/x-amz-json-1.0"));
        let body: serde_json::Value = serde_json::from_slice(&sent.body).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"TableName": "users", "Key": {"pk": {"S": "user#1"}}, "ConsistentRead": true})
        );
    }

    #[tokio::test]
    async fn get_item_without_match() {
        let stub = StubTransport::new();
        stub.push(RawResponse::new(200).with_body("{}"));
        let input = GetItemInput {
            table_name: "users".to_string(),
            ..Default::default()
        };
        let out = dynamodb(&stub).get_item(&input).await.unwrap().into_output().await.unwrap();
        assert!(out.item.is_none());
    }

    #[tokio::test]
    async fn describe_table_decodes_epoch_dates() {
        let stub = StubTransport::new();
        stub.push(RawResponse::new(200).with_body(
            r#"{"Table":{"TableName":"users","TableStatus":"ACTIVE","CreationDateTime":1700000000.5,
                "KeySchema":[{"AttributeName":"pk","KeyType":"HASH"}],"ItemCount":3}}"#,
        ));
        let table = dynamodb(&stub).describe_table("users").await.unwrap().into_output().await.unwrap();
        assert_eq!(table.table_status.as_deref(), Some("ACTIVE"));
        assert_eq!(table.item_count, Some(3));
        assert_eq!(table.key_schema[0].key_type, "HASH");
        assert_eq!(table.creation_date_time.unwrap().timestamp(), 1_700_000_000);
    }

    #[tokio::test]
    async fn table_exists_waiter_states() {
        let stub = StubTransport::new();
        stub.push(
            RawResponse::new(400)
                .with_body(r#"{"__type":"com.amazonaws.dynamodb.v20120810#ResourceNotFoundException","message":"not found"}"#),
        )
        .push(RawResponse::new(200).with_body(r#"{"Table":{"TableStatus":"CREATING"}}"#))
        .push(RawResponse::new(200).with_body(r#"{"Table":{"TableStatus":"ACTIVE"}}"#));

        let client = dynamodb(&stub);
        let input = DescribeTableInput {
            table_name: "users".to_string(),
        };
        let mut waiter = client.client().waiter("TableExists", input.to_value()).await.unwrap();
        assert_eq!(waiter.state().await.unwrap(), WaiterState::Pending);
        assert_eq!(waiter.state().await.unwrap(), WaiterState::Pending);
        assert_eq!(waiter.state().await.unwrap(), WaiterState::Success);
        assert_eq!(waiter.attempts(), 3);
    }

    #[tokio::test]
    async fn throttling_is_retryable_service_error() {
        let stub = StubTransport::new();
        stub.push(RawResponse::new(400).with_body(
            r#"{"__type":"com.amazonaws.dynamodb.v20120810#ProvisionedThroughputExceededException","message":"slow down"}"#,
        ));
        let err = dynamodb(&stub).describe_table("users").await.unwrap().into_output().await.unwrap_err();
        match err.kind() {
            ErrorKind::Client(e) => {
                assert!(e.retryable);
                assert_eq!(e.code, "ProvisionedThroughputExceededException");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn attribute_value_rejects_unknown_tag() {
        let err = AttributeValue::from_value(&Value::structure([("X", Value::from("1"))])).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MalformedResponse(_)));
    }
}
