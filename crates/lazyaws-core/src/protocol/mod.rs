//! Wire protocols: turning an input [`Value`] into a [`Request`] and a
//! [`RawResponse`] back into an output [`Value`].
//!
//! Input is validated against its shape before anything is encoded, so a
//! rejected input never yields a partially built request.

pub mod json;
pub mod query;
pub mod rest;
pub mod validate;
pub mod xml;

use crate::error::{SdkError, SdkResult};
use crate::http::{RawResponse, Request};
use crate::service::{OperationDefinition, ServiceDefinition};
use crate::shape::{Location, ScalarKind, TimestampFormat};
use crate::value::Value;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    /// REST bindings with XML bodies (S3, Route 53, CloudFront).
    RestXml,
    /// REST bindings with JSON bodies (Lambda, API Gateway).
    RestJson,
    /// `X-Amz-Target` dispatch with JSON bodies (DynamoDB, SSM).
    Json,
    /// Form-encoded `Action` requests with XML responses (SQS, STS, IAM).
    Query,
}

/// Encode `input` for `operation`. The returned request has no endpoint
/// and is unsigned.
pub fn marshal(
    service: &ServiceDefinition,
    operation: &OperationDefinition,
    input: &Value,
) -> SdkResult<Request> {
    match operation.input {
        Some(id) => validate::validate(&service.model, id, input)?,
        None => {
            if let Some(name) = input.fields().and_then(|f| f.keys().next()) {
                return Err(SdkError::unknown_member(name, &operation.name));
            }
        }
    }

    match service.protocol {
        Protocol::Query => query::marshal(service, operation, input),
        Protocol::Json => json::marshal_rpc(service, operation, input),
        Protocol::RestXml | Protocol::RestJson => rest::marshal(service, operation, input),
    }
}

/// Decode a successful response for `operation`.
pub fn unmarshal(
    service: &ServiceDefinition,
    operation: &OperationDefinition,
    response: &RawResponse,
) -> SdkResult<Value> {
    let model = &service.model;
    let output_id = match operation.output {
        Some(id) => id,
        None => return Ok(Value::empty()),
    };
    let shape = model.get(output_id);
    let structure = shape.as_structure().ok_or_else(|| {
        SdkError::model(format!("output shape \"{}\" is not a structure", shape.name))
    })?;

    let mut out = rest::decode_bindings(service.protocol, model, structure, response)?;

    let has_body_members = structure
        .members
        .iter()
        .any(|m| m.location == Location::Body);
    if has_body_members && !response.body.iter().all(|b| b.is_ascii_whitespace()) {
        let body = match service.protocol {
            Protocol::RestXml => {
                let root = parse_xml(&response.body)?;
                xml::decode_members(model, output_id, &root)?
            }
            Protocol::Query => {
                let root = parse_xml(&response.body)?;
                let node = operation
                    .result_wrapper
                    .as_deref()
                    .and_then(|w| root.child(w))
                    .unwrap_or(&root);
                xml::decode_members(model, output_id, node)?
            }
            Protocol::Json | Protocol::RestJson => json::decode_body(model, output_id, &response.body)?,
        };
        out.extend(body);
    }

    Ok(Value::Structure(out))
}

pub(crate) fn parse_xml(body: &[u8]) -> SdkResult<xml::XmlNode> {
    xml::XmlNode::parse(body).map_err(SdkError::malformed)
}

// ── Scalars ─────────────────────────────────────────────────────────────

pub(crate) fn float_text(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        f.to_string()
    }
}

pub fn format_timestamp(t: &DateTime<Utc>, format: TimestampFormat) -> String {
    match format {
        TimestampFormat::Iso8601 => t.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        TimestampFormat::Rfc822 => t.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
        TimestampFormat::UnixTimestamp => {
            if t.timestamp_subsec_millis() == 0 {
                t.timestamp().to_string()
            } else {
                format!("{}.{:03}", t.timestamp(), t.timestamp_subsec_millis())
            }
        }
    }
}

/// Parse a timestamp in any of the supported wire formats.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, String> {
    let text = text.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Ok(t.with_timezone(&Utc));
    }
    if let Ok(t) = DateTime::parse_from_rfc2822(text) {
        return Ok(t.with_timezone(&Utc));
    }
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(secs) = text.parse::<f64>() {
        if secs.is_finite() {
            let whole = secs.trunc() as i64;
            let nanos = ((secs - secs.trunc()) * 1e9).round() as u32;
            if let Some(t) = Utc.timestamp_opt(whole, nanos).single() {
                return Ok(t);
            }
        }
    }
    Err(format!("invalid timestamp \"{}\"", text))
}

/// Parse wire text into a scalar of `kind`. Blobs are base64.
pub fn parse_scalar(kind: ScalarKind, text: &str) -> Result<Value, String> {
    use base64::Engine;
    match kind {
        ScalarKind::String => Ok(Value::String(text.to_string())),
        ScalarKind::Integer => text
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| format!("invalid integer \"{}\"", text)),
        ScalarKind::Float => parse_float(text.trim())
            .map(Value::Float)
            .ok_or_else(|| format!("invalid float \"{}\"", text)),
        ScalarKind::Boolean => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Boolean(true)),
            "false" => Ok(Value::Boolean(false)),
            _ => Err(format!("invalid boolean \"{}\"", text)),
        },
        ScalarKind::Blob => base64::engine::general_purpose::STANDARD
            .decode(text.trim())
            .map(Value::Blob)
            .map_err(|e| format!("invalid base64: {}", e)),
        ScalarKind::Timestamp => parse_timestamp(text).map(Value::Timestamp),
    }
}

fn parse_float(text: &str) -> Option<f64> {
    match text {
        "NaN" => Some(f64::NAN),
        "Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ => text.parse().ok(),
    }
}
