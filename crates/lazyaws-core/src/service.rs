//! Service and operation descriptors.
//!
//! A [`ServiceDefinition`] bundles everything the runtime needs to talk to
//! one service: its protocol, endpoint table, signer flavor, shape model,
//! operations, waiters and the mapping from error codes to exception names.
//! Definitions are immutable once built and are normally shared behind an
//! `Arc`.

use crate::endpoint::EndpointRules;
use crate::error::{SdkError, SdkResult};
use crate::protocol::Protocol;
use crate::shape::{Model, ShapeDraft, ShapeId};
use crate::signing::SignerFlavor;
use crate::waiter::WaiterSpec;
use std::collections::BTreeMap;

// ── Operations ──────────────────────────────────────────────────────────

/// Token-based pagination metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    /// Input member that carries the continuation token.
    pub input_token: String,
    /// Output member holding the next token; absent or empty ends the pages.
    pub output_token: String,
    /// Input member limiting the page size.
    pub limit_key: Option<String>,
    /// Output member holding the page items.
    pub result_key: Option<String>,
}

impl Pagination {
    pub fn new(input_token: &str, output_token: &str) -> Self {
        Self {
            input_token: input_token.to_string(),
            output_token: output_token.to_string(),
            limit_key: None,
            result_key: None,
        }
    }

    pub fn limit_key(mut self, key: &str) -> Self {
        self.limit_key = Some(key.to_string());
        self
    }

    pub fn result_key(mut self, key: &str) -> Self {
        self.result_key = Some(key.to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub struct OperationDefinition {
    pub name: String,
    pub http_method: String,
    /// Request URI template, e.g. `/{Bucket}/{Key+}?uploads`.
    pub request_uri: String,
    pub input: Option<ShapeId>,
    pub output: Option<ShapeId>,
    /// Element wrapping query-protocol results.
    pub result_wrapper: Option<String>,
    pub pagination: Option<Pagination>,
    /// Sent without a signature (e.g. `AssumeRoleWithWebIdentity`).
    pub unsigned: bool,
}

/// Unresolved operation, referring to shapes by name.
#[derive(Debug, Clone)]
pub struct OperationDraft {
    name: String,
    http_method: String,
    request_uri: String,
    input: Option<String>,
    output: Option<String>,
    result_wrapper: Option<String>,
    pagination: Option<Pagination>,
    unsigned: bool,
}

impl OperationDraft {
    pub fn new(name: &str, http_method: &str, request_uri: &str) -> Self {
        Self {
            name: name.to_string(),
            http_method: http_method.to_string(),
            request_uri: request_uri.to_string(),
            input: None,
            output: None,
            result_wrapper: None,
            pagination: None,
            unsigned: false,
        }
    }

    /// `POST /`, the shape of every query and json protocol operation.
    pub fn post(name: &str) -> Self {
        Self::new(name, "POST", "/")
    }

    pub fn input(mut self, shape: &str) -> Self {
        self.input = Some(shape.to_string());
        self
    }

    pub fn output(mut self, shape: &str) -> Self {
        self.output = Some(shape.to_string());
        self
    }

    pub fn result_wrapper(mut self, wrapper: &str) -> Self {
        self.result_wrapper = Some(wrapper.to_string());
        self
    }

    pub fn paginated(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn unsigned(mut self) -> Self {
        self.unsigned = true;
        self
    }
}

// ── Service ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ServiceDefinition {
    /// Service identifier used in errors and logs, e.g. `sqs`.
    pub name: String,
    pub api_version: String,
    pub protocol: Protocol,
    /// `X-Amz-Target` prefix for the json protocol.
    pub target_prefix: Option<String>,
    /// `1.0` or `1.1`, used in the json content type.
    pub json_version: String,
    pub signer: SignerFlavor,
    pub endpoints: EndpointRules,
    pub model: Model,
    operations: BTreeMap<String, OperationDefinition>,
    waiters: BTreeMap<String, WaiterSpec>,
    exceptions: BTreeMap<String, String>,
}

impl ServiceDefinition {
    pub fn builder(name: &str, api_version: &str, protocol: Protocol) -> ServiceBuilder {
        ServiceBuilder::new(name, api_version, protocol)
    }

    pub fn operation(&self, name: &str) -> SdkResult<&OperationDefinition> {
        self.operations.get(name).ok_or_else(|| {
            SdkError::invalid_argument(format!(
                "operation \"{}\" is not defined for \"{}\"",
                name, self.name
            ))
        })
    }

    pub fn operations(&self) -> impl Iterator<Item = &OperationDefinition> {
        self.operations.values()
    }

    pub fn waiter(&self, name: &str) -> SdkResult<&WaiterSpec> {
        self.waiters.get(name).ok_or_else(|| {
            SdkError::invalid_argument(format!(
                "waiter \"{}\" is not defined for \"{}\"",
                name, self.name
            ))
        })
    }

    pub fn waiter_names(&self) -> impl Iterator<Item = &str> {
        self.waiters.keys().map(|k| k.as_str())
    }

    /// Exception name registered for a service error code.
    pub fn exception_for(&self, code: &str) -> Option<&str> {
        self.exceptions.get(code).map(|s| s.as_str())
    }
}

pub struct ServiceBuilder {
    name: String,
    api_version: String,
    protocol: Protocol,
    target_prefix: Option<String>,
    json_version: String,
    signer: SignerFlavor,
    endpoints: Option<EndpointRules>,
    shapes: Vec<ShapeDraft>,
    operations: Vec<OperationDraft>,
    waiters: Vec<WaiterSpec>,
    exceptions: BTreeMap<String, String>,
}

impl ServiceBuilder {
    fn new(name: &str, api_version: &str, protocol: Protocol) -> Self {
        Self {
            name: name.to_string(),
            api_version: api_version.to_string(),
            protocol,
            target_prefix: None,
            json_version: "1.0".to_string(),
            signer: SignerFlavor::Standard,
            endpoints: None,
            shapes: Vec::new(),
            operations: Vec::new(),
            waiters: Vec::new(),
            exceptions: BTreeMap::new(),
        }
    }

    pub fn target_prefix(mut self, prefix: &str) -> Self {
        self.target_prefix = Some(prefix.to_string());
        self
    }

    pub fn json_version(mut self, version: &str) -> Self {
        self.json_version = version.to_string();
        self
    }

    pub fn signer(mut self, flavor: SignerFlavor) -> Self {
        self.signer = flavor;
        self
    }

    /// Defaults to `EndpointRules::new(name)`.
    pub fn endpoints(mut self, rules: EndpointRules) -> Self {
        self.endpoints = Some(rules);
        self
    }

    pub fn shape(mut self, draft: ShapeDraft) -> Self {
        self.shapes.push(draft);
        self
    }

    pub fn shapes(mut self, drafts: impl IntoIterator<Item = ShapeDraft>) -> Self {
        self.shapes.extend(drafts);
        self
    }

    pub fn operation(mut self, draft: OperationDraft) -> Self {
        self.operations.push(draft);
        self
    }

    pub fn waiter(mut self, spec: WaiterSpec) -> Self {
        self.waiters.push(spec);
        self
    }

    /// Map a wire error code to its exception name.
    pub fn error(mut self, code: &str, exception: &str) -> Self {
        self.exceptions
            .insert(code.to_string(), exception.to_string());
        self
    }

    /// Resolve shape references and check operations and waiters.
    pub fn build(self) -> SdkResult<ServiceDefinition> {
        let model = Model::builder().shapes(self.shapes).build()?;

        let mut operations = BTreeMap::new();
        for draft in self.operations {
            let resolve = |name: &Option<String>| -> SdkResult<Option<ShapeId>> {
                match name {
                    Some(n) => {
                        let id = model.require(n)?;
                        if model.get(id).as_structure().is_none() {
                            return Err(SdkError::model(format!(
                                "operation \"{}\" refers to \"{}\", which is not a structure",
                                draft.name, n
                            )));
                        }
                        Ok(Some(id))
                    }
                    None => Ok(None),
                }
            };
            let input = resolve(&draft.input)?;
            let output = resolve(&draft.output)?;

            let result_wrapper = match (self.protocol, draft.result_wrapper, output) {
                (_, Some(w), _) => Some(w),
                (Protocol::Query, None, Some(_)) => Some(format!("{}Result", draft.name)),
                _ => None,
            };

            let op = OperationDefinition {
                name: draft.name.clone(),
                http_method: draft.http_method,
                request_uri: draft.request_uri,
                input,
                output,
                result_wrapper,
                pagination: draft.pagination,
                unsigned: draft.unsigned,
            };
            if operations.insert(draft.name.clone(), op).is_some() {
                return Err(SdkError::model(format!(
                    "operation \"{}\" is defined twice",
                    draft.name
                )));
            }
        }

        let mut waiters = BTreeMap::new();
        for spec in self.waiters {
            if !operations.contains_key(&spec.operation) {
                return Err(SdkError::model(format!(
                    "waiter \"{}\" polls unknown operation \"{}\"",
                    spec.name, spec.operation
                )));
            }
            if spec.acceptors.is_empty() {
                return Err(SdkError::model(format!(
                    "waiter \"{}\" has no acceptors",
                    spec.name
                )));
            }
            waiters.insert(spec.name.clone(), spec);
        }

        Ok(ServiceDefinition {
            endpoints: self
                .endpoints
                .unwrap_or_else(|| EndpointRules::new(&self.name)),
            name: self.name,
            api_version: self.api_version,
            protocol: self.protocol,
            target_prefix: self.target_prefix,
            json_version: self.json_version,
            signer: self.signer,
            model,
            operations,
            waiters,
            exceptions: self.exceptions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::shape::MemberDraft;
    use crate::waiter::{Acceptor, AcceptorState, Delay, Matcher};
    use std::time::Duration;

    fn base() -> ServiceBuilder {
        ServiceDefinition::builder("sqs", "2012-11-05", Protocol::Query)
            .shape(ShapeDraft::string("String"))
            .shape(ShapeDraft::structure(
                "GetQueueUrlRequest",
                vec![MemberDraft::new("QueueName", "String").required()],
            ))
            .shape(ShapeDraft::structure(
                "GetQueueUrlResult",
                vec![MemberDraft::new("QueueUrl", "String")],
            ))
    }

    #[test]
    fn query_operations_get_a_result_wrapper() {
        let svc = base()
            .operation(
                OperationDraft::post("GetQueueUrl")
                    .input("GetQueueUrlRequest")
                    .output("GetQueueUrlResult"),
            )
            .operation(OperationDraft::post("PurgeQueue").input("GetQueueUrlRequest"))
            .build()
            .unwrap();
        let op = svc.operation("GetQueueUrl").unwrap();
        assert_eq!(op.result_wrapper.as_deref(), Some("GetQueueUrlResult"));
        assert!(svc.operation("PurgeQueue").unwrap().result_wrapper.is_none());
        assert_eq!(svc.endpoints.prefix(), "sqs");
    }

    #[test]
    fn unknown_operation_is_invalid_argument() {
        let svc = base().build().unwrap();
        let err = svc.operation("Nope").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidArgument(_)));
    }

    #[test]
    fn dangling_shape_reference_fails() {
        let err = base()
            .operation(OperationDraft::post("X").input("Missing"))
            .build()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Model(_)));
    }

    #[test]
    fn scalar_input_is_rejected() {
        let err = base()
            .operation(OperationDraft::post("X").input("String"))
            .build()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Model(msg) if msg.contains("not a structure")));
    }

    #[test]
    fn waiter_must_reference_an_operation() {
        let spec = WaiterSpec::new("QueueExists", "GetQueueUrl", Delay::Fixed(Duration::from_secs(5)), 40)
            .acceptor(Acceptor::new(Matcher::Status(200), AcceptorState::Success));
        let err = base().waiter(spec).build().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Model(_)));
    }

    #[test]
    fn error_codes_map_to_exceptions() {
        let svc = base()
            .error("AWS.SimpleQueueService.NonExistentQueue", "QueueDoesNotExist")
            .build()
            .unwrap();
        assert_eq!(
            svc.exception_for("AWS.SimpleQueueService.NonExistentQueue"),
            Some("QueueDoesNotExist")
        );
        assert_eq!(svc.exception_for("Throttling"), None);
    }
}
