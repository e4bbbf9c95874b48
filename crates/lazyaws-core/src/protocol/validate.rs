//! Input validation against shapes.

use crate::error::{SdkError, SdkResult};
use crate::shape::{Model, ScalarKind, ShapeId, ShapeKind};
use crate::value::Value;

/// Check `value` against shape `id`: unknown members, missing required
/// members and type mismatches, at every depth.
pub fn validate(model: &Model, id: ShapeId, value: &Value) -> SdkResult<()> {
    check(model, id, value, &model.get(id).name)
}

fn check(model: &Model, id: ShapeId, value: &Value, path: &str) -> SdkResult<()> {
    let shape = model.get(id);
    match (&shape.kind, value) {
        (ShapeKind::Structure(s), Value::Structure(fields)) => {
            for name in fields.keys() {
                if s.member(name).is_none() {
                    return Err(SdkError::unknown_member(name, &shape.name));
                }
            }
            for member in &s.members {
                match fields.get(&member.name) {
                    Some(v) => check(
                        model,
                        member.target,
                        v,
                        &format!("{}.{}", path, member.name),
                    )?,
                    None if member.required => {
                        return Err(SdkError::missing_required(&member.name, &shape.name))
                    }
                    None => {}
                }
            }
            Ok(())
        }
        (ShapeKind::List(l), Value::List(items)) => {
            for (i, item) in items.iter().enumerate() {
                check(model, l.member, item, &format!("{}[{}]", path, i))?;
            }
            Ok(())
        }
        (ShapeKind::Map(m), Value::Map(entries)) | (ShapeKind::Map(m), Value::Structure(entries)) => {
            for (k, v) in entries {
                check(model, m.value, v, &format!("{}.{}", path, k))?;
            }
            Ok(())
        }
        (ShapeKind::Scalar(kind), v) if scalar_accepts(*kind, v) => Ok(()),
        (_, v) => Err(SdkError::invalid_argument(format!(
            "{} expects {}, got {}",
            path,
            expected_name(&shape.kind),
            v.type_name()
        ))),
    }
}

fn scalar_accepts(kind: ScalarKind, value: &Value) -> bool {
    matches!(
        (kind, value),
        (ScalarKind::String, Value::String(_))
            | (ScalarKind::Integer, Value::Integer(_))
            | (ScalarKind::Float, Value::Float(_))
            | (ScalarKind::Float, Value::Integer(_))
            | (ScalarKind::Boolean, Value::Boolean(_))
            | (ScalarKind::Blob, Value::Blob(_))
            | (ScalarKind::Blob, Value::String(_))
            | (ScalarKind::Timestamp, Value::Timestamp(_))
    )
}

fn expected_name(kind: &ShapeKind) -> &'static str {
    match kind {
        ShapeKind::Structure(_) => "a structure",
        ShapeKind::List(_) => "a list",
        ShapeKind::Map(_) => "a map",
        ShapeKind::Scalar(ScalarKind::String) => "a string",
        ShapeKind::Scalar(ScalarKind::Integer) => "an integer",
        ShapeKind::Scalar(ScalarKind::Float) => "a number",
        ShapeKind::Scalar(ScalarKind::Boolean) => "a boolean",
        ShapeKind::Scalar(ScalarKind::Blob) => "a blob",
        ShapeKind::Scalar(ScalarKind::Timestamp) => "a timestamp",
    }
}
