//! XML encoding and decoding driven by shapes.
//!
//! Responses are parsed into a small [`XmlNode`] tree first; shape-driven
//! decoding then walks the tree. Namespace prefixes are dropped, so
//! `<s3:Code>` and `<Code>` both match member `Code`.

use super::{format_timestamp, parse_scalar};
use crate::error::{SdkError, SdkResult};
use crate::shape::{Location, Member, Model, ShapeId, ShapeKind, TimestampFormat};
use crate::value::Value;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;

// ── Tree ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Parse a whole document and return its root element.
    pub fn parse(input: &[u8]) -> Result<XmlNode, String> {
        let text = std::str::from_utf8(input).map_err(|e| format!("invalid UTF-8: {}", e))?;
        let mut reader = Reader::from_str(text);

        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => stack.push(Self::from_start(&e)?),
                Ok(Event::Empty(e)) => {
                    let node = Self::from_start(&e)?;
                    Self::attach(&mut stack, &mut root, node)?;
                }
                Ok(Event::End(_)) => {
                    let mut node = stack
                        .pop()
                        .ok_or_else(|| "unexpected closing tag".to_string())?;
                    // Indentation between child elements; leaf text is kept verbatim.
                    if !node.children.is_empty() && node.text.trim().is_empty() {
                        node.text.clear();
                    }
                    Self::attach(&mut stack, &mut root, node)?;
                }
                Ok(Event::Text(t)) => {
                    if let Some(top) = stack.last_mut() {
                        let unescaped = t.unescape().map_err(|e| e.to_string())?;
                        top.text.push_str(&unescaped);
                    }
                }
                Ok(Event::CData(c)) => {
                    if let Some(top) = stack.last_mut() {
                        top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(format!(
                        "XML error at position {}: {}",
                        reader.buffer_position(),
                        e
                    ))
                }
            }
        }

        if !stack.is_empty() {
            return Err("unexpected end of document".to_string());
        }
        root.ok_or_else(|| "document has no root element".to_string())
    }

    fn from_start(e: &BytesStart<'_>) -> Result<XmlNode, String> {
        let mut node = XmlNode {
            name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
            ..Default::default()
        };
        for attr in e.attributes() {
            let attr = attr.map_err(|e| e.to_string())?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value().map_err(|e| e.to_string())?.into_owned();
            node.attributes.push((key, value));
        }
        Ok(node)
    }

    fn attach(
        stack: &mut [XmlNode],
        root: &mut Option<XmlNode>,
        node: XmlNode,
    ) -> Result<(), String> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None if root.is_none() => *root = Some(node),
            None => return Err("document has more than one root element".to_string()),
        }
        Ok(())
    }

    /// First direct child named `name`.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First descendant (depth-first, including self) named `name`.
    pub fn find(&self, name: &str) -> Option<&XmlNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

// ── Encoding ────────────────────────────────────────────────────────────

type XmlWriter = Writer<Vec<u8>>;

fn write(w: &mut XmlWriter, event: Event<'_>) -> SdkResult<()> {
    w.write_event(event)
        .map_err(|e| SdkError::invalid_argument(format!("failed to write XML: {}", e)))
}

fn write_text(w: &mut XmlWriter, name: &str, text: &str) -> SdkResult<()> {
    write(w, Event::Start(BytesStart::new(name)))?;
    write(w, Event::Text(BytesText::new(text)))?;
    write(w, Event::End(BytesEnd::new(name)))
}

/// Serialize `value` as a document whose root element is `root_name`.
/// Only body-located members of structures are written.
pub fn encode_document(
    model: &Model,
    id: ShapeId,
    root_name: &str,
    value: &Value,
) -> SdkResult<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    write(
        &mut writer,
        Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)),
    )?;
    write_value(&mut writer, model, id, root_name, value, None, true)?;
    Ok(writer.into_inner())
}

fn write_value(
    w: &mut XmlWriter,
    model: &Model,
    id: ShapeId,
    name: &str,
    value: &Value,
    timestamp_format: Option<TimestampFormat>,
    root: bool,
) -> SdkResult<()> {
    let shape = model.get(id);
    match (&shape.kind, value) {
        (ShapeKind::Structure(s), Value::Structure(fields)) => {
            let mut start = BytesStart::new(name);
            if let Some(ns) = s.xml_namespace.as_deref().filter(|_| root) {
                start.push_attribute(("xmlns", ns));
            }
            write(w, Event::Start(start))?;
            for member in s.members.iter().filter(|m| m.location == Location::Body) {
                if let Some(v) = fields.get(&member.name) {
                    write_member(w, model, member, v)?;
                }
            }
            write(w, Event::End(BytesEnd::new(name)))
        }
        (ShapeKind::List(l), Value::List(items)) => {
            let item_name = l.member_name.as_deref().unwrap_or("member");
            write(w, Event::Start(BytesStart::new(name)))?;
            for item in items {
                write_value(w, model, l.member, item_name, item, None, false)?;
            }
            write(w, Event::End(BytesEnd::new(name)))
        }
        (ShapeKind::Map(m), Value::Map(entries)) | (ShapeKind::Map(m), Value::Structure(entries)) => {
            write(w, Event::Start(BytesStart::new(name)))?;
            for (k, v) in entries {
                write(w, Event::Start(BytesStart::new("entry")))?;
                write_text(w, m.key_name(), k)?;
                write_value(w, model, m.value, m.value_name(), v, None, false)?;
                write(w, Event::End(BytesEnd::new("entry")))?;
            }
            write(w, Event::End(BytesEnd::new(name)))
        }
        (ShapeKind::Scalar(_), v) => {
            let format = timestamp_format
                .or(shape.timestamp_format)
                .unwrap_or(TimestampFormat::Iso8601);
            write_text(w, name, &body_text(v, format)?)
        }
        (_, v) => Err(SdkError::invalid_argument(format!(
            "cannot write {} as \"{}\"",
            v.type_name(),
            shape.name
        ))),
    }
}

fn write_member(w: &mut XmlWriter, model: &Model, member: &Member, value: &Value) -> SdkResult<()> {
    let name = member.wire_name();
    match (&model.get(member.target).kind, value) {
        (ShapeKind::List(l), Value::List(items)) if member.flattened || l.flattened => {
            for item in items {
                write_value(w, model, l.member, name, item, None, false)?;
            }
            Ok(())
        }
        (ShapeKind::Map(m), Value::Map(entries)) if member.flattened || m.flattened => {
            for (k, v) in entries {
                write(w, Event::Start(BytesStart::new(name)))?;
                write_text(w, m.key_name(), k)?;
                write_value(w, model, m.value, m.value_name(), v, None, false)?;
                write(w, Event::End(BytesEnd::new(name)))?;
            }
            Ok(())
        }
        _ => write_value(w, model, member.target, name, value, member.timestamp_format, false),
    }
}

/// Text form of a scalar inside a document: blobs base64, booleans
/// lowercase, timestamps per `format`.
pub(crate) fn body_text(value: &Value, format: TimestampFormat) -> SdkResult<String> {
    use base64::Engine;
    Ok(match value {
        Value::String(s) => s.clone(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => super::float_text(*f),
        Value::Boolean(b) => b.to_string(),
        Value::Blob(b) => base64::engine::general_purpose::STANDARD.encode(b),
        Value::Timestamp(t) => format_timestamp(t, format),
        other => {
            return Err(SdkError::invalid_argument(format!(
                "expected a scalar, got {}",
                other.type_name()
            )))
        }
    })
}

// ── Decoding ────────────────────────────────────────────────────────────

/// Decode the body members of structure `id` from the children of `node`.
pub fn decode_members(
    model: &Model,
    id: ShapeId,
    node: &XmlNode,
) -> SdkResult<BTreeMap<String, Value>> {
    let shape = model.get(id);
    let structure = shape.as_structure().ok_or_else(|| {
        SdkError::model(format!("shape \"{}\" is not a structure", shape.name))
    })?;

    let mut out = BTreeMap::new();
    for member in structure
        .members
        .iter()
        .filter(|m| m.location == Location::Body)
    {
        if let Some(v) = decode_member(model, member, node)? {
            out.insert(member.name.clone(), v);
        }
    }
    Ok(out)
}

fn decode_member(model: &Model, member: &Member, parent: &XmlNode) -> SdkResult<Option<Value>> {
    let name = member.wire_name();
    match &model.get(member.target).kind {
        ShapeKind::List(l) if member.flattened || l.flattened => {
            let items = parent
                .children_named(name)
                .map(|n| decode_node(model, l.member, n))
                .collect::<SdkResult<Vec<_>>>()?;
            Ok(if items.is_empty() {
                None
            } else {
                Some(Value::List(items))
            })
        }
        ShapeKind::Map(m) if member.flattened || m.flattened => {
            let mut entries = BTreeMap::new();
            for entry in parent.children_named(name) {
                let (k, v) = decode_entry(model, m.key_name(), m.value_name(), m.value, entry)?;
                entries.insert(k, v);
            }
            Ok(if entries.is_empty() {
                None
            } else {
                Some(Value::Map(entries))
            })
        }
        _ => parent
            .child(name)
            .map(|n| decode_node(model, member.target, n))
            .transpose(),
    }
}

fn decode_entry(
    model: &Model,
    key_name: &str,
    value_name: &str,
    value_shape: ShapeId,
    entry: &XmlNode,
) -> SdkResult<(String, Value)> {
    let key = entry
        .child(key_name)
        .map(|k| k.text.clone())
        .ok_or_else(|| SdkError::malformed(format!("map entry without <{}>", key_name)))?;
    let value = match entry.child(value_name) {
        Some(v) => decode_node(model, value_shape, v)?,
        None => Value::String(String::new()),
    };
    Ok((key, value))
}

/// Decode one element according to shape `id`.
pub fn decode_node(model: &Model, id: ShapeId, node: &XmlNode) -> SdkResult<Value> {
    let shape = model.get(id);
    match &shape.kind {
        ShapeKind::Structure(_) => decode_members(model, id, node).map(Value::Structure),
        ShapeKind::List(l) => {
            let item_name = l.member_name.as_deref().unwrap_or("member");
            node.children_named(item_name)
                .map(|n| decode_node(model, l.member, n))
                .collect::<SdkResult<Vec<_>>>()
                .map(Value::List)
        }
        ShapeKind::Map(m) => {
            let mut entries = BTreeMap::new();
            for entry in node.children_named("entry") {
                let (k, v) = decode_entry(model, m.key_name(), m.value_name(), m.value, entry)?;
                entries.insert(k, v);
            }
            Ok(Value::Map(entries))
        }
        ShapeKind::Scalar(kind) => parse_scalar(*kind, &node.text)
            .map_err(|e| SdkError::malformed(format!("<{}>: {}", node.name, e))),
    }
}
