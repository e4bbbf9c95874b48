//! AWS STS (Security Token Service) binding.
//!
//! STS uses the query protocol (API version 2011-06-15). The credential
//! providers rely on it for role assumption, so it lives in the core rather
//! than with the other service bindings.

use crate::client::Client;
use crate::config::Configuration;
use crate::credentials::{Credentials, StaticProvider};
use crate::endpoint::EndpointRules;
use crate::error::{SdkError, SdkResult};
use crate::http::Transport;
use crate::protocol::Protocol;
use crate::result::{Input, LazyResult, Output};
use crate::service::{OperationDraft, ServiceDefinition};
use crate::shape::{MemberDraft, ShapeDraft};
use crate::value::{StructBuilder, Value};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const API_VERSION: &str = "2011-06-15";

lazy_static::lazy_static! {
    static ref DEFINITION: SdkResult<Arc<ServiceDefinition>> = build_definition().map(Arc::new);
}

/// The STS service definition, built once per process.
pub fn definition() -> SdkResult<Arc<ServiceDefinition>> {
    DEFINITION.clone()
}

fn build_definition() -> SdkResult<ServiceDefinition> {
    ServiceDefinition::builder("sts", API_VERSION, Protocol::Query)
        .endpoints(
            EndpointRules::new("sts")
                .global("https://sts.amazonaws.com", "us-east-1")
                .region("us-east-1-fips", "https://sts-fips.us-east-1.amazonaws.com", "us-east-1")
                .region("us-west-2-fips", "https://sts-fips.us-west-2.amazonaws.com", "us-west-2"),
        )
        .shapes([
            ShapeDraft::string("String"),
            ShapeDraft::integer("Integer"),
            ShapeDraft::timestamp("DateType"),
            ShapeDraft::structure(
                "Credentials",
                vec![
                    MemberDraft::new("AccessKeyId", "String").required(),
                    MemberDraft::new("SecretAccessKey", "String").required(),
                    MemberDraft::new("SessionToken", "String").required(),
                    MemberDraft::new("Expiration", "DateType").required(),
                ],
            ),
            ShapeDraft::structure(
                "AssumedRoleUser",
                vec![
                    MemberDraft::new("AssumedRoleId", "String").required(),
                    MemberDraft::new("Arn", "String").required(),
                ],
            ),
            ShapeDraft::structure(
                "AssumeRoleRequest",
                vec![
                    MemberDraft::new("RoleArn", "String").required(),
                    MemberDraft::new("RoleSessionName", "String").required(),
                    MemberDraft::new("Policy", "String"),
                    MemberDraft::new("DurationSeconds", "Integer"),
                    MemberDraft::new("ExternalId", "String"),
                    MemberDraft::new("SerialNumber", "String"),
                    MemberDraft::new("TokenCode", "String"),
                    MemberDraft::new("SourceIdentity", "String"),
                ],
            ),
            ShapeDraft::structure(
                "AssumeRoleResponse",
                vec![
                    MemberDraft::new("Credentials", "Credentials"),
                    MemberDraft::new("AssumedRoleUser", "AssumedRoleUser"),
                    MemberDraft::new("PackedPolicySize", "Integer"),
                    MemberDraft::new("SourceIdentity", "String"),
                ],
            ),
            ShapeDraft::structure(
                "AssumeRoleWithWebIdentityRequest",
                vec![
                    MemberDraft::new("RoleArn", "String").required(),
                    MemberDraft::new("RoleSessionName", "String").required(),
                    MemberDraft::new("WebIdentityToken", "String").required(),
                    MemberDraft::new("ProviderId", "String"),
                    MemberDraft::new("Policy", "String"),
                    MemberDraft::new("DurationSeconds", "Integer"),
                ],
            ),
            ShapeDraft::structure(
                "AssumeRoleWithWebIdentityResponse",
                vec![
                    MemberDraft::new("Credentials", "Credentials"),
                    MemberDraft::new("SubjectFromWebIdentityToken", "String"),
                    MemberDraft::new("AssumedRoleUser", "AssumedRoleUser"),
                    MemberDraft::new("PackedPolicySize", "Integer"),
                    MemberDraft::new("Provider", "String"),
                    MemberDraft::new("Audience", "String"),
                    MemberDraft::new("SourceIdentity", "String"),
                ],
            ),
            ShapeDraft::structure("GetCallerIdentityRequest", vec![]),
            ShapeDraft::structure(
                "GetCallerIdentityResponse",
                vec![
                    MemberDraft::new("UserId", "String"),
                    MemberDraft::new("Account", "String"),
                    MemberDraft::new("Arn", "String"),
                ],
            ),
        ])
        .operation(
            OperationDraft::post("AssumeRole")
                .input("AssumeRoleRequest")
                .output("AssumeRoleResponse"),
        )
        .operation(
            OperationDraft::post("AssumeRoleWithWebIdentity")
                .input("AssumeRoleWithWebIdentityRequest")
                .output("AssumeRoleWithWebIdentityResponse")
                .unsigned(),
        )
        .operation(
            OperationDraft::post("GetCallerIdentity")
                .input("GetCallerIdentityRequest")
                .output("GetCallerIdentityResponse"),
        )
        .error("ExpiredTokenException", "ExpiredTokenException")
        .error("MalformedPolicyDocument", "MalformedPolicyDocumentException")
        .error("PackedPolicyTooLarge", "PackedPolicyTooLargeException")
        .error("RegionDisabledException", "RegionDisabledException")
        .error("IDPRejectedClaim", "IDPRejectedClaimException")
        .error("IDPCommunicationError", "IDPCommunicationErrorException")
        .error("InvalidIdentityToken", "InvalidIdentityTokenException")
        .build()
}

// ── Types ───────────────────────────────────────────────────────────────

/// Parameters for `AssumeRole`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssumeRoleInput {
    pub role_arn: String,
    pub role_session_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_identity: Option<String>,
}

impl Input for AssumeRoleInput {
    type Output = AssumeRoleOutput;
    const OPERATION: &'static str = "AssumeRole";

    fn to_value(&self) -> Value {
        StructBuilder::new()
            .field("RoleArn", &self.role_arn)
            .field("RoleSessionName", &self.role_session_name)
            .optional("DurationSeconds", self.duration_seconds)
            .optional("ExternalId", self.external_id.as_deref())
            .optional("Policy", self.policy.as_deref())
            .optional("SerialNumber", self.serial_number.as_deref())
            .optional("TokenCode", self.token_code.as_deref())
            .optional("SourceIdentity", self.source_identity.as_deref())
            .build()
    }
}

/// Parameters for `AssumeRoleWithWebIdentity`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssumeRoleWithWebIdentityInput {
    pub role_arn: String,
    pub role_session_name: String,
    pub web_identity_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
}

impl Input for AssumeRoleWithWebIdentityInput {
    type Output = AssumeRoleOutput;
    const OPERATION: &'static str = "AssumeRoleWithWebIdentity";

    fn to_value(&self) -> Value {
        StructBuilder::new()
            .field("RoleArn", &self.role_arn)
            .field("RoleSessionName", &self.role_session_name)
            .field("WebIdentityToken", &self.web_identity_token)
            .optional("DurationSeconds", self.duration_seconds)
            .optional("ProviderId", self.provider_id.as_deref())
            .optional("Policy", self.policy.as_deref())
            .build()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssumedRoleUser {
    pub assumed_role_id: String,
    pub arn: String,
}

/// Response from `AssumeRole` and `AssumeRoleWithWebIdentity`.
#[derive(Debug, Clone, PartialEq)]
pub struct AssumeRoleOutput {
    pub credentials: Option<Credentials>,
    pub assumed_role_user: Option<AssumedRoleUser>,
    pub packed_policy_size: Option<i64>,
    pub source_identity: Option<String>,
    pub subject_from_web_identity_token: Option<String>,
}

impl Output for AssumeRoleOutput {
    fn from_value(value: Value) -> SdkResult<Self> {
        let credentials = match value.get("Credentials") {
            Some(c) => Some(credentials_from(c)?),
            None => None,
        };
        let assumed_role_user = value.get("AssumedRoleUser").map(|u| AssumedRoleUser {
            assumed_role_id: u.string("AssumedRoleId").unwrap_or_default(),
            arn: u.string("Arn").unwrap_or_default(),
        });
        Ok(Self {
            credentials,
            assumed_role_user,
            packed_policy_size: value.get("PackedPolicySize").and_then(|v| v.as_i64()),
            source_identity: value.string("SourceIdentity"),
            subject_from_web_identity_token: value.string("SubjectFromWebIdentityToken"),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct GetCallerIdentityInput;

impl Input for GetCallerIdentityInput {
    type Output = CallerIdentity;
    const OPERATION: &'static str = "GetCallerIdentity";

    fn to_value(&self) -> Value {
        Value::empty()
    }
}

/// Contains the response to a successful `GetCallerIdentity` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub account: Option<String>,
    pub arn: Option<String>,
    pub user_id: Option<String>,
}

impl Output for CallerIdentity {
    fn from_value(value: Value) -> SdkResult<Self> {
        Ok(Self {
            account: value.string("Account"),
            arn: value.string("Arn"),
            user_id: value.string("UserId"),
        })
    }
}

fn credentials_from(value: &Value) -> SdkResult<Credentials> {
    let field = |name: &str| {
        value
            .string(name)
            .ok_or_else(|| SdkError::malformed(format!("STS credentials are missing {}", name)))
    };
    Ok(Credentials::new_temporary(
        &field("AccessKeyId")?,
        &field("SecretAccessKey")?,
        &field("SessionToken")?,
        value.get("Expiration").and_then(|v| v.as_timestamp()),
    ))
}

// ── STS Client ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StsClient {
    client: Client,
}

impl StsClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Returns details about the IAM user or role whose credentials are used
    /// to call the operation.
    pub async fn get_caller_identity(&self) -> SdkResult<LazyResult<CallerIdentity>> {
        self.client.send(&GetCallerIdentityInput).await
    }

    pub async fn assume_role(&self, input: &AssumeRoleInput) -> SdkResult<LazyResult<AssumeRoleOutput>> {
        self.client.send(input).await
    }

    /// Sent unsigned; the token itself authenticates the caller.
    pub async fn assume_role_with_web_identity(
        &self,
        input: &AssumeRoleWithWebIdentityInput,
    ) -> SdkResult<LazyResult<AssumeRoleOutput>> {
        self.client.send(input).await
    }
}

fn sts_client(
    config: &Arc<Configuration>,
    transport: Arc<dyn Transport>,
    source: Option<Credentials>,
) -> SdkResult<StsClient> {
    let builder = Client::builder(definition()?)
        .config(config.clone())
        .transport(transport);
    let builder = match source {
        Some(credentials) => builder.credentials(Arc::new(StaticProvider::new(credentials))),
        None => builder.anonymous(),
    };
    builder.build().map(StsClient::new)
}

fn require_credentials(output: AssumeRoleOutput, operation: &str) -> SdkResult<Credentials> {
    output.credentials.ok_or_else(|| {
        SdkError::malformed("response carries no credentials").with_operation(operation)
    })
}

/// Exchange `source` credentials for the role's temporary credentials.
pub(crate) async fn assume_role(
    config: &Arc<Configuration>,
    transport: Arc<dyn Transport>,
    source: Credentials,
    input: &AssumeRoleInput,
) -> SdkResult<Credentials> {
    let output = sts_client(config, transport, Some(source))?
        .assume_role(input)
        .await?
        .into_output()
        .await?;
    require_credentials(output, AssumeRoleInput::OPERATION)
}

/// Exchange an OIDC token for the role's temporary credentials.
pub(crate) async fn assume_role_with_web_identity(
    config: &Arc<Configuration>,
    transport: Arc<dyn Transport>,
    role_arn: &str,
    session_name: &str,
    token: &str,
) -> SdkResult<Credentials> {
    let input = AssumeRoleWithWebIdentityInput {
        role_arn: role_arn.to_string(),
        role_session_name: session_name.to_string(),
        web_identity_token: token.to_string(),
        ..Default::default()
    };
    let output = sts_client(config, transport, None)?
        .assume_role_with_web_identity(&input)
        .await?
        .into_output()
        .await?;
    require_credentials(output, AssumeRoleWithWebIdentityInput::OPERATION)
}

/// Session name used when none is configured.
pub(crate) fn default_session_name() -> String {
    format!("lazyaws-{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::http::RawResponse;
    use crate::transport::StubTransport;

    pub(crate) fn assume_role_body(operation: &str, key: &str) -> String {
        format!(
            r#"<{op}Response xmlns="https://sts.amazonaws.com/doc/2011-06-15/">
  <{op}Result>
    <Credentials>
      <AccessKeyId>{key}</AccessKeyId>
      <SecretAccessKey>wJalrXUtnFEMI/K7MDENG/bPxRfiCYzEXAMPLEKEY</SecretAccessKey>
      <SessionToken>FwoGZXIvYXdzEBY</SessionToken>
      <Expiration>2030-01-01T01:00:00Z</Expiration>
    </Credentials>
    <AssumedRoleUser>
      <AssumedRoleId>AROA3XFRBF535PLBIFPI4:s3-access-example</AssumedRoleId>
      <Arn>arn:aws:sts::123456789012:assumed-role/demo/s3-access-example</Arn>
    </AssumedRoleUser>
    <PackedPolicySize>6</PackedPolicySize>
  </{op}Result>
  <ResponseMetadata><RequestId>c6104cbe-af31-11e0-8154-cbc7ccf896c7</RequestId></ResponseMetadata>
</{op}Response>"#,
            op = operation,
            key = key
        )
    }

    #[test]
    fn definition_builds() {
        let def = definition().unwrap();
        assert_eq!(def.name, "sts");
        assert!(def.operation("AssumeRoleWithWebIdentity").unwrap().unsigned);
        assert_eq!(
            def.operation("AssumeRole").unwrap().result_wrapper.as_deref(),
            Some("AssumeRoleResult")
        );
        let endpoint = def.endpoints.resolve("eu-west-1").unwrap();
        assert_eq!(endpoint.endpoint, "https://sts.amazonaws.com");
        assert_eq!(endpoint.signing_region, "us-east-1");
    }

    #[test]
    fn assume_role_input_serde() {
        let input = AssumeRoleInput {
            role_arn: "arn:aws:iam::123456789012:role/AdminRole".to_string(),
            role_session_name: "session1".to_string(),
            duration_seconds: Some(3600),
            external_id: Some("ext-12345".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&input).unwrap();
        let back: AssumeRoleInput = serde_json::from_str(&json).unwrap();
        assert_eq!(back.duration_seconds, Some(3600));
        assert!(!json.contains("policy"));

        let value = input.to_value();
        assert_eq!(value.get("DurationSeconds"), Some(&Value::Integer(3600)));
        assert!(value.get("Policy").is_none());
    }

    #[tokio::test]
    async fn assume_role_round_trip() {
        let stub = StubTransport::new();
        stub.push(RawResponse::new(200).with_body(assume_role_body("AssumeRole", "ASIAROLE")));
        let config = Arc::new(Configuration::default());
        let input = AssumeRoleInput {
            role_arn: "arn:aws:iam::123456789012:role/demo".to_string(),
            role_session_name: "s3-access-example".to_string(),
            ..Default::default()
        };
        let creds = assume_role(
            &config,
            Arc::new(stub.clone()),
            Credentials::new("AKIASOURCE", "source-secret"),
            &input,
        )
        .await
        .unwrap();
        assert_eq!(creds.access_key_id, "ASIAROLE");
        assert_eq!(creds.session_token.as_deref(), Some("FwoGZXIvYXdzEBY"));
        assert_eq!(creds.expiration.unwrap().to_rfc3339(), "2030-01-01T01:00:00+00:00");

        let sent = stub.last_request().unwrap();
        assert_eq!(sent.endpoint, "https://sts.amazonaws.com");
        let body = String::from_utf8(sent.body.to_vec()).unwrap();
        assert!(body.starts_with("Action=AssumeRole&Version=2011-06-15&RoleArn=arn%3Aaws%3Aiam"));
        assert!(sent
            .headers
            .get("authorization")
            .unwrap()
            .contains("Credential=AKIASOURCE/"));
    }

    #[tokio::test]
    async fn web_identity_is_unsigned() {
        let stub = StubTransport::new();
        stub.push(RawResponse::new(200).with_body(assume_role_body("AssumeRoleWithWebIdentity", "ASIAWEB")));
        let creds = assume_role_with_web_identity(
            &Arc::new(Configuration::default()),
            Arc::new(stub.clone()),
            "arn:aws:iam::123456789012:role/web",
            "session",
            "eyJhbGciOi",
        )
        .await
        .unwrap();
        assert_eq!(creds.access_key_id, "ASIAWEB");
        let sent = stub.last_request().unwrap();
        assert!(!sent.headers.contains("authorization"));
        assert!(String::from_utf8_lossy(&sent.body).contains("WebIdentityToken=eyJhbGciOi"));
    }

    #[tokio::test]
    async fn sts_errors_map_to_exceptions() {
        let stub = StubTransport::new();
        stub.push(RawResponse::new(400).with_body(
            "<ErrorResponse><Error><Type>Sender</Type><Code>InvalidIdentityToken</Code><Message>Token expired</Message></Error><RequestId>r1</RequestId></ErrorResponse>",
        ));
        let err = assume_role_with_web_identity(
            &Arc::new(Configuration::default()),
            Arc::new(stub),
            "arn:aws:iam::123456789012:role/web",
            "session",
            "token",
        )
        .await
        .unwrap_err();
        assert_eq!(err.operation(), Some("AssumeRoleWithWebIdentity"));
        match err.kind() {
            ErrorKind::Client(e) => assert_eq!(e.exception.as_deref(), Some("InvalidIdentityTokenException")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn session_names_are_unique() {
        assert_ne!(default_session_name(), default_session_name());
        assert!(default_session_name().starts_with("lazyaws-"));
    }
}
