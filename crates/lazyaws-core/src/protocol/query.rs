//! The query protocol: `Action`/`Version` plus flattened members as a
//! form-encoded body.
//!
//! Lists become `Name.member.N` (or `Name.N` when flattened) and maps
//! `Name.entry.N.key` / `Name.entry.N.value` (or `Name.N.key` when
//! flattened). Indices start at 1. Responses are XML wrapped in
//! `<{Operation}Response><{Operation}Result>`.

use super::{format_timestamp, xml::body_text};
use crate::error::SdkResult;
use crate::http::Request;
use crate::service::{OperationDefinition, ServiceDefinition};
use crate::shape::{Location, Model, ShapeId, ShapeKind, TimestampFormat};
use crate::signing::uri_encode;
use crate::value::Value;
use bytes::Bytes;

pub fn marshal(
    service: &ServiceDefinition,
    operation: &OperationDefinition,
    input: &Value,
) -> SdkResult<Request> {
    let mut params = vec![
        ("Action".to_string(), operation.name.clone()),
        ("Version".to_string(), service.api_version.clone()),
    ];
    if let Some(id) = operation.input {
        params.extend(encode_params(&service.model, id, input)?);
    }

    let mut request = Request::new("POST", "/");
    request.headers.insert(
        "content-type",
        "application/x-www-form-urlencoded; charset=utf-8",
    );
    request.body = Bytes::from(form_encode(&params));
    Ok(request)
}

/// Flatten a structure into ordered `(key, value)` pairs.
pub fn encode_params(model: &Model, id: ShapeId, value: &Value) -> SdkResult<Vec<(String, String)>> {
    let mut params = Vec::new();
    let shape = model.get(id);
    if let (ShapeKind::Structure(s), Value::Structure(fields)) = (&shape.kind, value) {
        for member in s.members.iter().filter(|m| m.location == Location::Body) {
            if let Some(v) = fields.get(&member.name) {
                serialize(
                    model,
                    member.target,
                    member.wire_name(),
                    v,
                    member.flattened,
                    member.timestamp_format,
                    &mut params,
                )?;
            }
        }
    }
    Ok(params)
}

fn serialize(
    model: &Model,
    id: ShapeId,
    prefix: &str,
    value: &Value,
    flattened: bool,
    timestamp_format: Option<TimestampFormat>,
    params: &mut Vec<(String, String)>,
) -> SdkResult<()> {
    let shape = model.get(id);
    match (&shape.kind, value) {
        (ShapeKind::Structure(s), Value::Structure(fields)) => {
            for member in &s.members {
                if let Some(v) = fields.get(&member.name) {
                    let key = format!("{}.{}", prefix, member.wire_name());
                    serialize(
                        model,
                        member.target,
                        &key,
                        v,
                        member.flattened,
                        member.timestamp_format,
                        params,
                    )?;
                }
            }
        }
        (ShapeKind::List(l), Value::List(items)) => {
            if items.is_empty() {
                params.push((prefix.to_string(), String::new()));
            }
            for (i, item) in items.iter().enumerate() {
                let key = if flattened || l.flattened {
                    format!("{}.{}", prefix, i + 1)
                } else {
                    format!(
                        "{}.{}.{}",
                        prefix,
                        l.member_name.as_deref().unwrap_or("member"),
                        i + 1
                    )
                };
                serialize(model, l.member, &key, item, false, None, params)?;
            }
        }
        (ShapeKind::Map(m), Value::Map(entries)) | (ShapeKind::Map(m), Value::Structure(entries)) => {
            for (i, (k, v)) in entries.iter().enumerate() {
                let base = if flattened || m.flattened {
                    format!("{}.{}", prefix, i + 1)
                } else {
                    format!("{}.entry.{}", prefix, i + 1)
                };
                params.push((format!("{}.{}", base, m.key_name()), k.clone()));
                let value_key = format!("{}.{}", base, m.value_name());
                serialize(model, m.value, &value_key, v, false, None, params)?;
            }
        }
        (ShapeKind::Scalar(_), Value::Timestamp(t)) => {
            let format = timestamp_format
                .or(shape.timestamp_format)
                .unwrap_or(TimestampFormat::Iso8601);
            params.push((prefix.to_string(), format_timestamp(t, format)));
        }
        (_, v) => params.push((prefix.to_string(), body_text(v, TimestampFormat::Iso8601)?)),
    }
    Ok(())
}

/// `k=v&k2=v2` with RFC 3986 encoding of keys and values.
pub fn form_encode(params: &[(String, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", uri_encode(k), uri_encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
