//! Shape model: the static description of every input and output type of a
//! service.
//!
//! Shapes are declared by name with [`ShapeDraft`] / [`MemberDraft`] and
//! resolved once by [`ModelBuilder::build`] into a [`Model`] where every
//! reference is an index. A dangling reference fails the build, never a
//! request.

use crate::error::{SdkError, SdkResult};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShapeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    String,
    Integer,
    Float,
    Boolean,
    Blob,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFormat {
    /// `2015-08-30T12:36:00Z`
    Iso8601,
    /// `Sun, 30 Aug 2015 12:36:00 GMT`
    Rfc822,
    /// Seconds since the epoch.
    UnixTimestamp,
}

/// Where a member travels in the HTTP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Body,
    Header,
    /// Every header starting with the prefix, collected into a map.
    Headers,
    QueryString,
    Uri,
    StatusCode,
    /// The member is the entire body.
    Payload,
}

#[derive(Debug, Clone)]
pub struct Member {
    pub name: String,
    pub target: ShapeId,
    pub location: Location,
    /// Wire name: header name, header prefix, query key, URI label, or the
    /// element/key name in the body.
    pub location_name: Option<String>,
    pub required: bool,
    pub flattened: bool,
    pub timestamp_format: Option<TimestampFormat>,
}

impl Member {
    pub fn wire_name(&self) -> &str {
        self.location_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct StructureShape {
    pub members: Vec<Member>,
    index: HashMap<String, usize>,
    pub xml_namespace: Option<String>,
}

impl StructureShape {
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.index.get(name).map(|&i| &self.members[i])
    }

    pub fn payload(&self) -> Option<&Member> {
        self.members.iter().find(|m| m.location == Location::Payload)
    }
}

#[derive(Debug, Clone)]
pub struct ListShape {
    pub member: ShapeId,
    /// Element name of list items, `member` when unset.
    pub member_name: Option<String>,
    pub flattened: bool,
}

#[derive(Debug, Clone)]
pub struct MapShape {
    pub key: ShapeId,
    pub value: ShapeId,
    pub key_name: Option<String>,
    pub value_name: Option<String>,
    pub flattened: bool,
}

impl MapShape {
    pub fn key_name(&self) -> &str {
        self.key_name.as_deref().unwrap_or("key")
    }

    pub fn value_name(&self) -> &str {
        self.value_name.as_deref().unwrap_or("value")
    }
}

#[derive(Debug, Clone)]
pub enum ShapeKind {
    Structure(StructureShape),
    List(ListShape),
    Map(MapShape),
    Scalar(ScalarKind),
}

#[derive(Debug, Clone)]
pub struct Shape {
    pub name: String,
    pub kind: ShapeKind,
    pub timestamp_format: Option<TimestampFormat>,
    /// Element name when the shape is a document root.
    pub xml_name: Option<String>,
}

impl Shape {
    pub fn as_structure(&self) -> Option<&StructureShape> {
        match &self.kind {
            ShapeKind::Structure(s) => Some(s),
            _ => None,
        }
    }

    pub fn scalar(&self) -> Option<ScalarKind> {
        match self.kind {
            ShapeKind::Scalar(k) => Some(k),
            _ => None,
        }
    }

    pub fn root_name(&self) -> &str {
        self.xml_name.as_deref().unwrap_or(&self.name)
    }
}

/// A resolved, immutable set of shapes.
#[derive(Debug, Clone, Default)]
pub struct Model {
    shapes: Vec<Shape>,
    ids: HashMap<String, ShapeId>,
}

impl Model {
    pub fn builder() -> ModelBuilder {
        ModelBuilder::default()
    }

    pub fn get(&self, id: ShapeId) -> &Shape {
        &self.shapes[id.0]
    }

    pub fn id(&self, name: &str) -> Option<ShapeId> {
        self.ids.get(name).copied()
    }

    pub fn shape(&self, name: &str) -> Option<&Shape> {
        self.id(name).map(|id| self.get(id))
    }

    /// Look up a shape that must exist.
    pub fn require(&self, name: &str) -> SdkResult<ShapeId> {
        self.id(name)
            .ok_or_else(|| SdkError::model(format!("unknown shape \"{}\"", name)))
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

// ── Drafts ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum DraftKind {
    Structure {
        members: Vec<MemberDraft>,
        xml_namespace: Option<String>,
    },
    List {
        member: String,
        member_name: Option<String>,
        flattened: bool,
    },
    Map {
        key: String,
        value: String,
        key_name: Option<String>,
        value_name: Option<String>,
        flattened: bool,
    },
    Scalar(ScalarKind),
}

/// Unresolved shape declaration.
#[derive(Debug, Clone)]
pub struct ShapeDraft {
    name: String,
    kind: DraftKind,
    timestamp_format: Option<TimestampFormat>,
    xml_name: Option<String>,
}

impl ShapeDraft {
    fn new(name: &str, kind: DraftKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            timestamp_format: None,
            xml_name: None,
        }
    }

    pub fn string(name: &str) -> Self {
        Self::new(name, DraftKind::Scalar(ScalarKind::String))
    }

    pub fn integer(name: &str) -> Self {
        Self::new(name, DraftKind::Scalar(ScalarKind::Integer))
    }

    pub fn float(name: &str) -> Self {
        Self::new(name, DraftKind::Scalar(ScalarKind::Float))
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(name, DraftKind::Scalar(ScalarKind::Boolean))
    }

    pub fn blob(name: &str) -> Self {
        Self::new(name, DraftKind::Scalar(ScalarKind::Blob))
    }

    pub fn timestamp(name: &str) -> Self {
        Self::new(name, DraftKind::Scalar(ScalarKind::Timestamp))
    }

    pub fn list(name: &str, member: &str) -> Self {
        Self::new(
            name,
            DraftKind::List {
                member: member.to_string(),
                member_name: None,
                flattened: false,
            },
        )
    }

    pub fn map(name: &str, key: &str, value: &str) -> Self {
        Self::new(
            name,
            DraftKind::Map {
                key: key.to_string(),
                value: value.to_string(),
                key_name: None,
                value_name: None,
                flattened: false,
            },
        )
    }

    pub fn structure(name: &str, members: Vec<MemberDraft>) -> Self {
        Self::new(
            name,
            DraftKind::Structure {
                members,
                xml_namespace: None,
            },
        )
    }

    /// Lists and maps: repeat items directly instead of nesting them.
    pub fn flattened(mut self) -> Self {
        match &mut self.kind {
            DraftKind::List { flattened, .. } | DraftKind::Map { flattened, .. } => {
                *flattened = true
            }
            _ => {}
        }
        self
    }

    /// Lists: element name of each item.
    pub fn member_name(mut self, name: &str) -> Self {
        if let DraftKind::List { member_name, .. } = &mut self.kind {
            *member_name = Some(name.to_string());
        }
        self
    }

    /// Maps: element names of entry keys and values.
    pub fn entry_names(mut self, key: &str, value: &str) -> Self {
        if let DraftKind::Map {
            key_name,
            value_name,
            ..
        } = &mut self.kind
        {
            *key_name = Some(key.to_string());
            *value_name = Some(value.to_string());
        }
        self
    }

    pub fn xml_namespace(mut self, uri: &str) -> Self {
        if let DraftKind::Structure { xml_namespace, .. } = &mut self.kind {
            *xml_namespace = Some(uri.to_string());
        }
        self
    }

    pub fn xml_name(mut self, name: &str) -> Self {
        self.xml_name = Some(name.to_string());
        self
    }

    pub fn timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = Some(format);
        self
    }
}

/// Unresolved member declaration. Members default to body placement.
#[derive(Debug, Clone)]
pub struct MemberDraft {
    name: String,
    target: String,
    location: Location,
    location_name: Option<String>,
    required: bool,
    flattened: bool,
    timestamp_format: Option<TimestampFormat>,
}

impl MemberDraft {
    pub fn new(name: &str, target: &str) -> Self {
        Self {
            name: name.to_string(),
            target: target.to_string(),
            location: Location::Body,
            location_name: None,
            required: false,
            flattened: false,
            timestamp_format: None,
        }
    }

    fn placed(mut self, location: Location, wire_name: &str) -> Self {
        self.location = location;
        self.location_name = Some(wire_name.to_string());
        self
    }

    pub fn header(self, name: &str) -> Self {
        self.placed(Location::Header, name)
    }

    /// Collect every header starting with `prefix`.
    pub fn headers(self, prefix: &str) -> Self {
        self.placed(Location::Headers, prefix)
    }

    pub fn query(self, name: &str) -> Self {
        self.placed(Location::QueryString, name)
    }

    /// Bind to the `{label}` (or greedy `{label+}`) of the request URI.
    pub fn uri(self, label: &str) -> Self {
        self.placed(Location::Uri, label)
    }

    pub fn status_code(mut self) -> Self {
        self.location = Location::StatusCode;
        self
    }

    pub fn payload(mut self) -> Self {
        self.location = Location::Payload;
        self
    }

    pub fn location_name(mut self, name: &str) -> Self {
        self.location_name = Some(name.to_string());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn flattened(mut self) -> Self {
        self.flattened = true;
        self
    }

    pub fn timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = Some(format);
        self
    }
}

/// Collects drafts and resolves them into a [`Model`].
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    drafts: Vec<ShapeDraft>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shape(mut self, draft: ShapeDraft) -> Self {
        self.drafts.push(draft);
        self
    }

    pub fn shapes(mut self, drafts: impl IntoIterator<Item = ShapeDraft>) -> Self {
        self.drafts.extend(drafts);
        self
    }

    pub fn build(self) -> SdkResult<Model> {
        let mut ids = HashMap::with_capacity(self.drafts.len());
        for (i, draft) in self.drafts.iter().enumerate() {
            if ids.insert(draft.name.clone(), ShapeId(i)).is_some() {
                return Err(SdkError::model(format!(
                    "shape \"{}\" is declared twice",
                    draft.name
                )));
            }
        }

        let resolve = |owner: &str, target: &str| -> SdkResult<ShapeId> {
            ids.get(target).copied().ok_or_else(|| {
                SdkError::model(format!(
                    "shape \"{}\" references unknown shape \"{}\"",
                    owner, target
                ))
            })
        };

        let mut shapes = Vec::with_capacity(self.drafts.len());
        for draft in &self.drafts {
            let kind = match &draft.kind {
                DraftKind::Scalar(k) => ShapeKind::Scalar(*k),
                DraftKind::List {
                    member,
                    member_name,
                    flattened,
                } => ShapeKind::List(ListShape {
                    member: resolve(&draft.name, member)?,
                    member_name: member_name.clone(),
                    flattened: *flattened,
                }),
                DraftKind::Map {
                    key,
                    value,
                    key_name,
                    value_name,
                    flattened,
                } => ShapeKind::Map(MapShape {
                    key: resolve(&draft.name, key)?,
                    value: resolve(&draft.name, value)?,
                    key_name: key_name.clone(),
                    value_name: value_name.clone(),
                    flattened: *flattened,
                }),
                DraftKind::Structure {
                    members,
                    xml_namespace,
                } => {
                    let mut resolved = Vec::with_capacity(members.len());
                    let mut index = HashMap::with_capacity(members.len());
                    for m in members {
                        if index.insert(m.name.clone(), resolved.len()).is_some() {
                            return Err(SdkError::model(format!(
                                "member \"{}\" is declared twice in \"{}\"",
                                m.name, draft.name
                            )));
                        }
                        resolved.push(Member {
                            name: m.name.clone(),
                            target: resolve(&draft.name, &m.target)?,
                            location: m.location.clone(),
                            location_name: m.location_name.clone(),
                            required: m.required,
                            flattened: m.flattened,
                            timestamp_format: m.timestamp_format,
                        });
                    }
                    let payloads = resolved
                        .iter()
                        .filter(|m| m.location == Location::Payload)
                        .count();
                    if payloads > 1 {
                        return Err(SdkError::model(format!(
                            "structure \"{}\" declares more than one payload member",
                            draft.name
                        )));
                    }
                    ShapeKind::Structure(StructureShape {
                        members: resolved,
                        index,
                        xml_namespace: xml_namespace.clone(),
                    })
                }
            };
            shapes.push(Shape {
                name: draft.name.clone(),
                kind,
                timestamp_format: draft.timestamp_format,
                xml_name: draft.xml_name.clone(),
            });
        }

        Ok(Model { shapes, ids })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn cors_model() -> SdkResult<Model> {
        Model::builder()
            .shape(ShapeDraft::string("String"))
            .shape(ShapeDraft::list("Methods", "String").flattened())
            .shape(ShapeDraft::structure(
                "CORSRule",
                vec![MemberDraft::new("AllowedMethods", "Methods")
                    .location_name("AllowedMethod")
                    .flattened()
                    .required()],
            ))
            .shape(ShapeDraft::structure(
                "GetBucketCorsRequest",
                vec![
                    MemberDraft::new("Bucket", "String").uri("Bucket").required(),
                    MemberDraft::new("ExpectedBucketOwner", "String")
                        .header("x-amz-expected-bucket-owner"),
                ],
            ))
            .build()
    }

    #[test]
    fn builds_and_resolves_references() {
        let model = cors_model().unwrap();
        assert_eq!(model.len(), 4);
        let req = model.shape("GetBucketCorsRequest").unwrap();
        let s = req.as_structure().unwrap();
        assert_eq!(s.members.len(), 2);
        let bucket = s.member("Bucket").unwrap();
        assert_eq!(bucket.location, Location::Uri);
        assert!(bucket.required);
        assert_eq!(model.get(bucket.target).scalar(), Some(ScalarKind::String));
        let owner = s.member("ExpectedBucketOwner").unwrap();
        assert_eq!(owner.wire_name(), "x-amz-expected-bucket-owner");
    }

    #[test]
    fn member_order_is_declaration_order() {
        let model = cors_model().unwrap();
        let s = model.shape("GetBucketCorsRequest").unwrap().as_structure().unwrap();
        let names: Vec<_> = s.members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Bucket", "ExpectedBucketOwner"]);
    }

    #[test]
    fn dangling_reference_fails_build() {
        let err = Model::builder()
            .shape(ShapeDraft::list("Things", "Thing"))
            .build()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Model(msg) if msg.contains("Thing")));
    }

    #[test]
    fn duplicate_shape_fails_build() {
        let err = Model::builder()
            .shape(ShapeDraft::string("A"))
            .shape(ShapeDraft::integer("A"))
            .build()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Model(_)));
    }

    #[test]
    fn two_payloads_fail_build() {
        let err = Model::builder()
            .shape(ShapeDraft::blob("Body"))
            .shape(ShapeDraft::structure(
                "Out",
                vec![
                    MemberDraft::new("A", "Body").payload(),
                    MemberDraft::new("B", "Body").payload(),
                ],
            ))
            .build()
            .unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Model(_)));
    }

    #[test]
    fn map_entry_names_default() {
        let model = Model::builder()
            .shape(ShapeDraft::string("S"))
            .shape(ShapeDraft::map("Plain", "S", "S"))
            .shape(ShapeDraft::map("Attrs", "S", "S").flattened().entry_names("Name", "Value"))
            .build()
            .unwrap();
        match &model.shape("Plain").unwrap().kind {
            ShapeKind::Map(m) => {
                assert_eq!(m.key_name(), "key");
                assert!(!m.flattened);
            }
            other => panic!("unexpected {:?}", other),
        }
        match &model.shape("Attrs").unwrap().kind {
            ShapeKind::Map(m) => {
                assert_eq!(m.value_name(), "Value");
                assert!(m.flattened);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
