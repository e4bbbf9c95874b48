//! REST bindings shared by the rest-xml and rest-json protocols.
//!
//! Members located in the URI, headers or querystring are placed there;
//! the remaining body members are serialized by the protocol's document
//! encoder. On the way back, header, prefixed-header, status-code and
//! payload members are read from the response envelope.

use super::{format_timestamp, json, parse_timestamp, parse_xml, xml, Protocol};
use crate::error::{SdkError, SdkResult};
use crate::http::{RawResponse, Request};
use crate::service::{OperationDefinition, ServiceDefinition};
use crate::shape::{Location, Member, Model, ScalarKind, ShapeKind, StructureShape, TimestampFormat};
use crate::signing::uri_encode;
use crate::value::Value;
use bytes::Bytes;
use std::collections::BTreeMap;

pub fn marshal(
    service: &ServiceDefinition,
    operation: &OperationDefinition,
    input: &Value,
) -> SdkResult<Request> {
    let model = &service.model;
    let (path_template, static_query) = split_request_uri(&operation.request_uri);

    let mut request = Request::new(&operation.http_method, "/");
    request.query = static_query;

    let input_shape = operation.input.map(|id| model.get(id));
    let structure = match input_shape.and_then(|s| s.as_structure()) {
        Some(s) => s,
        None => {
            request.path = expand_uri(path_template, None, input, &operation.name)?;
            return Ok(request);
        }
    };
    let shape_name = input_shape.map(|s| s.name.as_str()).unwrap_or(&operation.name);

    let mut has_body = false;
    let mut payload: Option<(&Member, &Value)> = None;
    for member in &structure.members {
        let value = match input.get(&member.name) {
            Some(v) => v,
            None => continue,
        };
        match member.location {
            Location::Header => {
                request
                    .headers
                    .insert(member.wire_name(), header_text(model, member, value)?);
            }
            Location::Headers => {
                if let Some(entries) = value.fields() {
                    for (k, v) in entries {
                        let name = format!("{}{}", member.wire_name(), k);
                        request.headers.insert(&name, scalar_header_text(v, None)?);
                    }
                }
            }
            Location::QueryString => push_query(model, member, value, &mut request.query)?,
            Location::Payload => payload = Some((member, value)),
            Location::Body => has_body = true,
            Location::Uri | Location::StatusCode => {}
        }
    }

    request.path = expand_uri(path_template, Some(structure), input, shape_name)?;

    if let Some((member, value)) = payload {
        set_payload(service, member, value, &mut request)?;
    } else if has_body {
        match service.protocol {
            Protocol::RestJson => {
                let doc = json::encode_value(model, structure_id(operation)?, input, None)?;
                request.body = Bytes::from(doc.to_string());
                request.headers.insert("content-type", "application/json");
            }
            _ => {
                let id = structure_id(operation)?;
                let root = model.get(id).root_name().to_string();
                request.body = Bytes::from(xml::encode_document(model, id, &root, input)?);
                request.headers.insert("content-type", "application/xml");
            }
        }
    }

    Ok(request)
}

fn structure_id(operation: &OperationDefinition) -> SdkResult<crate::shape::ShapeId> {
    operation
        .input
        .ok_or_else(|| SdkError::model(format!("operation \"{}\" has no input", operation.name)))
}

fn set_payload(
    service: &ServiceDefinition,
    member: &Member,
    value: &Value,
    request: &mut Request,
) -> SdkResult<()> {
    let model = &service.model;
    let target = model.get(member.target);
    match (&target.kind, value) {
        (ShapeKind::Scalar(_), Value::Blob(b)) => request.body = Bytes::from(b.clone()),
        (ShapeKind::Scalar(_), Value::String(s)) => request.body = Bytes::from(s.clone()),
        (ShapeKind::Structure(_), _) => match service.protocol {
            Protocol::RestJson => {
                let doc = json::encode_value(model, member.target, value, None)?;
                request.body = Bytes::from(doc.to_string());
                request.headers.insert("content-type", "application/json");
            }
            _ => {
                let root = member
                    .location_name
                    .clone()
                    .unwrap_or_else(|| target.root_name().to_string());
                request.body = Bytes::from(xml::encode_document(model, member.target, &root, value)?);
                request.headers.insert("content-type", "application/xml");
            }
        },
        (_, v) => {
            return Err(SdkError::invalid_argument(format!(
                "payload member \"{}\" cannot hold {}",
                member.name,
                v.type_name()
            )))
        }
    }
    Ok(())
}

/// Split `/{Bucket}?cors` into the path template and static query pairs.
pub fn split_request_uri(uri: &str) -> (&str, Vec<(String, String)>) {
    match uri.split_once('?') {
        Some((path, query)) => {
            let pairs = query
                .split('&')
                .filter(|p| !p.is_empty())
                .map(|p| match p.split_once('=') {
                    Some((k, v)) => (k.to_string(), v.to_string()),
                    None => (p.to_string(), String::new()),
                })
                .collect();
            (path, pairs)
        }
        None => (uri, Vec::new()),
    }
}

/// Substitute `{Label}` and greedy `{Label+}` placeholders. Greedy labels
/// keep their `/` separators.
fn expand_uri(
    template: &str,
    structure: Option<&StructureShape>,
    input: &Value,
    shape_name: &str,
) -> SdkResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| {
            SdkError::model(format!("unterminated label in request URI \"{}\"", template))
        })?;
        let raw_label = &after[..close];
        let (label, greedy) = match raw_label.strip_suffix('+') {
            Some(l) => (l, true),
            None => (raw_label, false),
        };

        let member = structure.and_then(|s| {
            s.members
                .iter()
                .find(|m| m.location == Location::Uri && m.wire_name() == label)
        });
        let member_name = member.map(|m| m.name.as_str()).unwrap_or(label);
        let value = input
            .get(member_name)
            .ok_or_else(|| SdkError::missing_required(member_name, shape_name))?;
        let text = scalar_text(value, TimestampFormat::Iso8601)?;
        if text.is_empty() {
            return Err(SdkError::invalid_argument(format!(
                "URI label \"{}\" of \"{}\" must not be empty",
                member_name, shape_name
            )));
        }

        if greedy {
            let encoded: Vec<String> = text.split('/').map(uri_encode).collect();
            out.push_str(&encoded.join("/"));
        } else {
            out.push_str(&uri_encode(&text));
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);

    if out.is_empty() {
        out.push('/');
    }
    Ok(out)
}

fn push_query(
    model: &Model,
    member: &Member,
    value: &Value,
    query: &mut Vec<(String, String)>,
) -> SdkResult<()> {
    let format = member
        .timestamp_format
        .or(model.get(member.target).timestamp_format)
        .unwrap_or(TimestampFormat::Iso8601);
    match value {
        Value::List(items) => {
            for item in items {
                query.push((member.wire_name().to_string(), scalar_text(item, format)?));
            }
        }
        Value::Map(entries) | Value::Structure(entries) => {
            for (k, v) in entries {
                match v {
                    Value::List(items) => {
                        for item in items {
                            query.push((k.clone(), scalar_text(item, format)?));
                        }
                    }
                    _ => query.push((k.clone(), scalar_text(v, format)?)),
                }
            }
        }
        _ => query.push((member.wire_name().to_string(), scalar_text(value, format)?)),
    }
    Ok(())
}

fn header_text(model: &Model, member: &Member, value: &Value) -> SdkResult<String> {
    let format = member.timestamp_format.or(model.get(member.target).timestamp_format);
    match value {
        Value::List(items) => items
            .iter()
            .map(|v| scalar_header_text(v, format))
            .collect::<SdkResult<Vec<_>>>()
            .map(|parts| parts.join(",")),
        _ => scalar_header_text(value, format),
    }
}

/// Header form of a scalar: blobs travel raw, timestamps default to RFC 822.
fn scalar_header_text(value: &Value, format: Option<TimestampFormat>) -> SdkResult<String> {
    match value {
        Value::Blob(b) => String::from_utf8(b.clone()).map_err(|_| {
            SdkError::invalid_argument("blob header values must be valid UTF-8".to_string())
        }),
        _ => scalar_text(value, format.unwrap_or(TimestampFormat::Rfc822)),
    }
}

fn scalar_text(value: &Value, format: TimestampFormat) -> SdkResult<String> {
    match value {
        Value::Blob(b) => Ok(String::from_utf8_lossy(b).into_owned()),
        Value::Timestamp(t) => Ok(format_timestamp(t, format)),
        _ => xml::body_text(value, format),
    }
}

// ── Response envelope ───────────────────────────────────────────────────

/// Read header, prefixed-header, status-code and payload members.
pub fn decode_bindings(
    protocol: Protocol,
    model: &Model,
    structure: &StructureShape,
    response: &RawResponse,
) -> SdkResult<BTreeMap<String, Value>> {
    let mut out = BTreeMap::new();
    for member in &structure.members {
        match member.location {
            Location::Header => {
                if let Some(raw) = response.headers.get(member.wire_name()) {
                    let value = header_value(model, member, raw).map_err(|e| {
                        SdkError::malformed(format!("header \"{}\": {}", member.wire_name(), e))
                    })?;
                    out.insert(member.name.clone(), value);
                }
            }
            Location::Headers => {
                let entries: BTreeMap<String, Value> = response
                    .headers
                    .with_prefix(member.wire_name())
                    .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                    .collect();
                if !entries.is_empty() {
                    out.insert(member.name.clone(), Value::Map(entries));
                }
            }
            Location::StatusCode => {
                out.insert(member.name.clone(), Value::Integer(response.status as i64));
            }
            Location::Payload => {
                if let Some(value) = decode_payload(protocol, model, member, &response.body)? {
                    out.insert(member.name.clone(), value);
                }
            }
            Location::Body | Location::Uri | Location::QueryString => {}
        }
    }
    Ok(out)
}

fn decode_payload(
    protocol: Protocol,
    model: &Model,
    member: &Member,
    body: &Bytes,
) -> SdkResult<Option<Value>> {
    let target = model.get(member.target);
    match &target.kind {
        ShapeKind::Scalar(ScalarKind::Blob) => Ok(Some(Value::Blob(body.to_vec()))),
        ShapeKind::Scalar(ScalarKind::String) => {
            Ok(Some(Value::String(String::from_utf8_lossy(body).into_owned())))
        }
        ShapeKind::Structure(_) if body.iter().all(|b| b.is_ascii_whitespace()) => Ok(None),
        ShapeKind::Structure(_) => match protocol {
            Protocol::Json | Protocol::RestJson => json::decode_body(model, member.target, body)
                .map(|m| Some(Value::Structure(m))),
            Protocol::RestXml | Protocol::Query => {
                let root = parse_xml(body)?;
                xml::decode_node(model, member.target, &root).map(Some)
            }
        },
        _ => Err(SdkError::model(format!(
            "payload member \"{}\" must target a blob, string or structure",
            member.name
        ))),
    }
}

fn header_value(model: &Model, member: &Member, raw: &str) -> Result<Value, String> {
    let target = model.get(member.target);
    match &target.kind {
        ShapeKind::Scalar(kind) => header_scalar(*kind, raw),
        ShapeKind::List(l) => match model.get(l.member).scalar() {
            Some(kind) => raw
                .split(',')
                .map(|part| header_scalar(kind, part.trim()))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            None => Err("list headers must hold scalars".to_string()),
        },
        _ => Err(format!("\"{}\" cannot be read from a header", target.name)),
    }
}

fn header_scalar(kind: ScalarKind, raw: &str) -> Result<Value, String> {
    match kind {
        ScalarKind::Blob => Ok(Value::Blob(raw.as_bytes().to_vec())),
        ScalarKind::Timestamp => parse_timestamp(raw).map(Value::Timestamp),
        other => super::parse_scalar(other, raw),
    }
}
