//! Dynamic values flowing through the marshaler.
//!
//! Inputs and outputs are modelled as a [`Value`] tree whose layout follows
//! the operation's shapes. Typed request/response structs convert to and
//! from this tree at the edges.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Blob(Vec<u8>),
    Timestamp(DateTime<Utc>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Structure(BTreeMap<String, Value>),
}

impl Value {
    /// An empty structure.
    pub fn empty() -> Self {
        Value::Structure(BTreeMap::new())
    }

    /// Build a structure from `(member, value)` pairs.
    pub fn structure<K, I>(members: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Structure(members.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn list<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Value::List(items.into_iter().collect())
    }

    /// Name of the variant, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Boolean(_) => "boolean",
            Value::Blob(_) => "blob",
            Value::Timestamp(_) => "timestamp",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Structure(_) => "structure",
        }
    }

    /// Member of a structure, or entry of a map.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Structure(m) | Value::Map(m) => m.get(name),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        match self {
            Value::Structure(m) | Value::Map(m) => m.get_mut(name),
            _ => None,
        }
    }

    /// Set a structure member or map entry. Has no effect on other variants.
    pub fn set(&mut self, name: &str, value: Value) {
        if let Value::Structure(m) | Value::Map(m) = self {
            m.insert(name.to_string(), value);
        }
    }

    pub fn fields(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Structure(m) | Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// String member `name`, cloned.
    pub fn string(&self, name: &str) -> Option<String> {
        self.get(name).and_then(|v| v.as_str()).map(|s| s.to_string())
    }

    /// List of string members under `name`.
    pub fn strings(&self, name: &str) -> Vec<String> {
        self.get(name)
            .and_then(|v| v.as_list())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Map of string entries under `name`.
    pub fn string_map(&self, name: &str) -> BTreeMap<String, String> {
        self.get(name)
            .and_then(|v| v.fields())
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Timestamp(t)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Incrementally builds a structure, skipping absent optional members.
#[derive(Debug, Default)]
pub struct StructBuilder {
    fields: BTreeMap<String, Value>,
}

impl StructBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    pub fn optional<V: Into<Value>>(mut self, name: &str, value: Option<V>) -> Self {
        if let Some(v) = value {
            self.fields.insert(name.to_string(), v.into());
        }
        self
    }

    pub fn build(self) -> Value {
        Value::Structure(self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structure_accessors() {
        let v = Value::structure([
            ("QueueUrl", Value::from("https://sqs/123/q")),
            ("Count", Value::from(3)),
            ("Names", Value::from(vec!["a", "b"])),
        ]);
        assert_eq!(v.string("QueueUrl").as_deref(), Some("https://sqs/123/q"));
        assert_eq!(v.get("Count").and_then(|c| c.as_i64()), Some(3));
        assert_eq!(v.strings("Names"), vec!["a", "b"]);
        assert!(v.get("Missing").is_none());
        assert_eq!(v.type_name(), "structure");
    }

    #[test]
    fn builder_skips_none() {
        let v = StructBuilder::new()
            .field("Bucket", "b")
            .optional::<String>("ExpectedBucketOwner", None)
            .optional("MaxKeys", Some(10))
            .build();
        let fields = v.fields().unwrap();
        assert_eq!(fields.len(), 2);
        assert!(fields.contains_key("MaxKeys"));
    }

    #[test]
    fn set_on_structure() {
        let mut v = Value::empty();
        v.set("NextToken", "abc".into());
        assert_eq!(v.string("NextToken").as_deref(), Some("abc"));
        let mut s = Value::from("x");
        s.set("ignored", Value::from(1));
        assert_eq!(s, Value::from("x"));
    }
}
