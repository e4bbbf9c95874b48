//! JSON documents, used by the json (RPC) and rest-json protocols.

use super::{format_timestamp, parse_timestamp, xml::body_text};
use crate::error::{SdkError, SdkResult};
use crate::http::Request;
use crate::service::{OperationDefinition, ServiceDefinition};
use crate::shape::{Location, Model, ScalarKind, ShapeId, ShapeKind, TimestampFormat};
use crate::value::Value;
use bytes::Bytes;
use serde_json::{Map, Number, Value as Json};
use std::collections::BTreeMap;

/// `POST /` with the operation named in `X-Amz-Target`.
pub fn marshal_rpc(
    service: &ServiceDefinition,
    operation: &OperationDefinition,
    input: &Value,
) -> SdkResult<Request> {
    let mut request = Request::new("POST", "/");
    let target = match service.target_prefix.as_deref() {
        Some(prefix) => format!("{}.{}", prefix, operation.name),
        None => operation.name.clone(),
    };
    request.headers.insert("x-amz-target", target);
    request.headers.insert(
        "content-type",
        format!("application/x-amz-json-{}", service.json_version),
    );

    let body = match operation.input {
        Some(id) => encode_value(&service.model, id, input, None)?,
        None => Json::Object(Map::new()),
    };
    request.body = Bytes::from(body.to_string());
    Ok(request)
}

/// Encode `value` as shape `id`. Structures keep only body members, keyed
/// by wire name.
pub fn encode_value(
    model: &Model,
    id: ShapeId,
    value: &Value,
    timestamp_format: Option<TimestampFormat>,
) -> SdkResult<Json> {
    let shape = model.get(id);
    match (&shape.kind, value) {
        (ShapeKind::Structure(s), Value::Structure(fields)) => {
            let mut obj = Map::new();
            for member in s.members.iter().filter(|m| m.location == Location::Body) {
                if let Some(v) = fields.get(&member.name) {
                    obj.insert(
                        member.wire_name().to_string(),
                        encode_value(model, member.target, v, member.timestamp_format)?,
                    );
                }
            }
            Ok(Json::Object(obj))
        }
        (ShapeKind::List(l), Value::List(items)) => items
            .iter()
            .map(|item| encode_value(model, l.member, item, None))
            .collect::<SdkResult<Vec<_>>>()
            .map(Json::Array),
        (ShapeKind::Map(m), Value::Map(entries)) | (ShapeKind::Map(m), Value::Structure(entries)) => {
            let mut obj = Map::new();
            for (k, v) in entries {
                obj.insert(k.clone(), encode_value(model, m.value, v, None)?);
            }
            Ok(Json::Object(obj))
        }
        (ShapeKind::Scalar(_), v) => {
            encode_scalar(v, timestamp_format.or(shape.timestamp_format))
        }
        (_, v) => Err(SdkError::invalid_argument(format!(
            "cannot encode {} as \"{}\"",
            v.type_name(),
            shape.name
        ))),
    }
}

fn encode_scalar(value: &Value, timestamp_format: Option<TimestampFormat>) -> SdkResult<Json> {
    Ok(match value {
        Value::String(s) => Json::String(s.clone()),
        Value::Integer(i) => Json::Number((*i).into()),
        Value::Float(f) => match Number::from_f64(*f) {
            Some(n) => Json::Number(n),
            None => Json::String(super::float_text(*f)),
        },
        Value::Boolean(b) => Json::Bool(*b),
        Value::Timestamp(t) => match timestamp_format.unwrap_or(TimestampFormat::UnixTimestamp) {
            TimestampFormat::UnixTimestamp => {
                if t.timestamp_subsec_millis() == 0 {
                    Json::Number(t.timestamp().into())
                } else {
                    let secs = t.timestamp() as f64 + t.timestamp_subsec_millis() as f64 / 1000.0;
                    Number::from_f64(secs).map(Json::Number).unwrap_or(Json::Null)
                }
            }
            format => Json::String(format_timestamp(t, format)),
        },
        other => Json::String(body_text(other, TimestampFormat::Iso8601)?),
    })
}

/// Decode a response body into the body members of structure `id`.
pub fn decode_body(model: &Model, id: ShapeId, body: &[u8]) -> SdkResult<BTreeMap<String, Value>> {
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(BTreeMap::new());
    }
    let doc: Json = serde_json::from_slice(body)
        .map_err(|e| SdkError::malformed(format!("invalid JSON: {}", e)))?;
    match decode_value(model, id, &doc)? {
        Value::Structure(fields) => Ok(fields),
        other => Err(SdkError::malformed(format!(
            "expected a JSON object, got {}",
            other.type_name()
        ))),
    }
}

/// Decode one JSON value according to shape `id`.
pub fn decode_value(model: &Model, id: ShapeId, doc: &Json) -> SdkResult<Value> {
    let shape = model.get(id);
    let mismatch = || {
        SdkError::malformed(format!(
            "\"{}\" cannot be read from JSON {}",
            shape.name,
            json_type(doc)
        ))
    };

    match &shape.kind {
        ShapeKind::Structure(s) => {
            let obj = doc.as_object().ok_or_else(mismatch)?;
            let mut out = BTreeMap::new();
            for member in s.members.iter().filter(|m| m.location == Location::Body) {
                match obj.get(member.wire_name()) {
                    None | Some(Json::Null) => {}
                    Some(v) => {
                        out.insert(member.name.clone(), decode_value(model, member.target, v)?);
                    }
                }
            }
            Ok(Value::Structure(out))
        }
        ShapeKind::List(l) => {
            let items = doc.as_array().ok_or_else(mismatch)?;
            items
                .iter()
                .filter(|v| !v.is_null())
                .map(|v| decode_value(model, l.member, v))
                .collect::<SdkResult<Vec<_>>>()
                .map(Value::List)
        }
        ShapeKind::Map(m) => {
            let obj = doc.as_object().ok_or_else(mismatch)?;
            let mut out = BTreeMap::new();
            for (k, v) in obj.iter().filter(|(_, v)| !v.is_null()) {
                out.insert(k.clone(), decode_value(model, m.value, v)?);
            }
            Ok(Value::Map(out))
        }
        ShapeKind::Scalar(kind) => decode_scalar(*kind, doc).ok_or_else(mismatch),
    }
}

fn decode_scalar(kind: ScalarKind, doc: &Json) -> Option<Value> {
    use base64::Engine;
    match (kind, doc) {
        (ScalarKind::String, Json::String(s)) => Some(Value::String(s.clone())),
        (ScalarKind::Integer, Json::Number(n)) => n.as_i64().map(Value::Integer),
        (ScalarKind::Float, Json::Number(n)) => n.as_f64().map(Value::Float),
        (ScalarKind::Float, Json::String(s)) => match s.as_str() {
            "NaN" => Some(Value::Float(f64::NAN)),
            "Infinity" => Some(Value::Float(f64::INFINITY)),
            "-Infinity" => Some(Value::Float(f64::NEG_INFINITY)),
            _ => None,
        },
        (ScalarKind::Boolean, Json::Bool(b)) => Some(Value::Boolean(*b)),
        (ScalarKind::Blob, Json::String(s)) => base64::engine::general_purpose::STANDARD
            .decode(s)
            .ok()
            .map(Value::Blob),
        (ScalarKind::Timestamp, Json::Number(n)) => n
            .as_f64()
            .and_then(|secs| parse_timestamp(&secs.to_string()).ok())
            .map(Value::Timestamp),
        (ScalarKind::Timestamp, Json::String(s)) => parse_timestamp(s).ok().map(Value::Timestamp),
        _ => None,
    }
}

fn json_type(doc: &Json) -> &'static str {
    match doc {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
