// Typed shape graph. Traits the generator understands are parsed into fields;
// everything else stays raw in `Traits::other`.

use crate::error::{CodegenError, Result};
use indexmap::IndexMap;
use std::fmt;

/// Absolute shape id, `namespace#Name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(String);

impl ShapeId {
    pub fn new(id: impl Into<String>) -> Self {
        ShapeId(id.into())
    }

    pub fn from_parts(namespace: &str, name: &str) -> Self {
        ShapeId(format!("{namespace}#{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn namespace(&self) -> &str {
        self.0.split_once('#').map_or("", |(namespace, _)| namespace)
    }

    pub fn name(&self) -> &str {
        self.0.split_once('#').map_or(self.0.as_str(), |(_, name)| name)
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberKind {
    Byte,
    Short,
    Integer,
    Long,
    Float,
    Double,
    BigInteger,
    BigDecimal,
}

impl NumberKind {
    pub fn is_integer(self) -> bool {
        matches!(self, NumberKind::Byte | NumberKind::Short | NumberKind::Integer | NumberKind::Long)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimestampFormat {
    DateTime,
    HttpDate,
    EpochSeconds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFault {
    Client,
    Server,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LengthBounds {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpTrait {
    pub method: String,
    pub uri: String,
    pub code: u16,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Traits {
    pub required: bool,
    pub default: Option<serde_json::Value>,
    pub length: Option<LengthBounds>,
    pub pattern: Option<String>,
    pub range: Option<RangeBounds>,
    pub json_name: Option<String>,
    pub timestamp_format: Option<TimestampFormat>,
    pub enum_value: Option<String>,
    pub sparse: bool,
    pub error: Option<ErrorFault>,
    pub http_error: Option<u16>,
    pub http: Option<HttpTrait>,
    pub http_header: Option<String>,
    pub http_query: Option<String>,
    pub http_label: bool,
    pub http_payload: bool,
    pub http_response_code: bool,
    pub streaming: bool,
    pub event_header: bool,
    pub event_payload: bool,
    pub documentation: Option<String>,
    /// Set by `transform::box_recursive_members`, never read from a model file.
    pub boxed: bool,
    pub other: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: String,
    pub target: ShapeId,
    pub traits: Traits,
}

impl Member {
    /// Optional iff neither required nor defaulted.
    pub fn is_optional(&self) -> bool {
        !self.traits.required && self.traits.default.is_none()
    }

    pub fn json_name(&self) -> &str {
        self.traits.json_name.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumVariant {
    pub name: String,
    pub value: String,
    pub documentation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub input: Option<ShapeId>,
    pub output: Option<ShapeId>,
    pub errors: Vec<ShapeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub version: Option<String>,
    pub operations: Vec<ShapeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShapeKind {
    Structure { members: Vec<Member> },
    Union { members: Vec<Member> },
    List { member: Member },
    Map { key: Member, value: Member },
    String,
    Enum { variants: Vec<EnumVariant> },
    Number(NumberKind),
    Boolean,
    Blob,
    Timestamp,
    Document,
    Operation(Operation),
    Service(Service),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub id: ShapeId,
    pub kind: ShapeKind,
    pub traits: Traits,
}

impl Shape {
    pub fn new(id: ShapeId, kind: ShapeKind) -> Self {
        Shape {
            id,
            kind,
            traits: Traits::default(),
        }
    }

    /// Member edges in model order. Lists yield their element, maps their
    /// key then value.
    pub fn members(&self) -> Vec<&Member> {
        match &self.kind {
            ShapeKind::Structure { members } | ShapeKind::Union { members } => members.iter().collect(),
            ShapeKind::List { member } => vec![member],
            ShapeKind::Map { key, value } => vec![key, value],
            _ => Vec::new(),
        }
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        self.members().into_iter().find(|member| member.name == name)
    }

    pub fn is_structure(&self) -> bool {
        matches!(self.kind, ShapeKind::Structure { .. })
    }

    pub fn is_union(&self) -> bool {
        matches!(self.kind, ShapeKind::Union { .. })
    }

    pub fn is_error(&self) -> bool {
        self.traits.error.is_some()
    }

    /// A union carrying the `@streaming` trait.
    pub fn is_event_stream(&self) -> bool {
        self.is_union() && self.traits.streaming
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ShapeKind::Structure { .. } => "structure",
            ShapeKind::Union { .. } => "union",
            ShapeKind::List { .. } => "list",
            ShapeKind::Map { .. } => "map",
            ShapeKind::String => "string",
            ShapeKind::Enum { .. } => "enum",
            ShapeKind::Number(NumberKind::Byte) => "byte",
            ShapeKind::Number(NumberKind::Short) => "short",
            ShapeKind::Number(NumberKind::Integer) => "integer",
            ShapeKind::Number(NumberKind::Long) => "long",
            ShapeKind::Number(NumberKind::Float) => "float",
            ShapeKind::Number(NumberKind::Double) => "double",
            ShapeKind::Number(NumberKind::BigInteger) => "bigInteger",
            ShapeKind::Number(NumberKind::BigDecimal) => "bigDecimal",
            ShapeKind::Boolean => "boolean",
            ShapeKind::Blob => "blob",
            ShapeKind::Timestamp => "timestamp",
            ShapeKind::Document => "document",
            ShapeKind::Operation(_) => "operation",
            ShapeKind::Service(_) => "service",
        }
    }
}

/// A closed shape graph, in model order.
#[derive(Debug, Clone, Default)]
pub struct Model {
    shapes: IndexMap<ShapeId, Shape>,
}

impl Model {
    pub fn new() -> Self {
        Model::default()
    }

    pub fn insert(&mut self, shape: Shape) {
        self.shapes.insert(shape.id.clone(), shape);
    }

    pub fn get(&self, id: &ShapeId) -> Option<&Shape> {
        self.shapes.get(id)
    }

    pub fn get_mut(&mut self, id: &ShapeId) -> Option<&mut Shape> {
        self.shapes.get_mut(id)
    }

    pub fn contains(&self, id: &ShapeId) -> bool {
        self.shapes.contains_key(id)
    }

    pub fn expect_shape(&self, id: &ShapeId) -> Result<&Shape> {
        self.shapes.get(id).ok_or_else(|| CodegenError::UnknownShape(id.clone()))
    }

    pub fn target(&self, member: &Member) -> Result<&Shape> {
        self.expect_shape(&member.target)
    }

    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.values()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Shapes outside the prelude, in model order.
    pub fn user_shapes(&self) -> impl Iterator<Item = &Shape> {
        self.shapes
            .values()
            .filter(|shape| shape.id.namespace() != super::PRELUDE_NAMESPACE)
    }

    pub fn operations(&self) -> impl Iterator<Item = (&Shape, &Operation)> {
        self.shapes.values().filter_map(|shape| match &shape.kind {
            ShapeKind::Operation(operation) => Some((shape, operation)),
            _ => None,
        })
    }

    pub fn services(&self) -> impl Iterator<Item = (&Shape, &Service)> {
        self.shapes.values().filter_map(|shape| match &shape.kind {
            ShapeKind::Service(service) => Some((shape, service)),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_id_parts() {
        let id = ShapeId::new("example.test#Record");
        assert_eq!(id.namespace(), "example.test");
        assert_eq!(id.name(), "Record");
        assert_eq!(ShapeId::from_parts("a.b", "C"), ShapeId::new("a.b#C"));
    }

    #[test]
    fn optionality_follows_required_and_default() {
        let mut member = Member {
            name: "count".into(),
            target: ShapeId::new("smithy.api#Integer"),
            traits: Traits::default(),
        };
        assert!(member.is_optional());
        member.traits.default = Some(serde_json::json!(0));
        assert!(!member.is_optional());
        member.traits.default = None;
        member.traits.required = true;
        assert!(!member.is_optional());
    }

    #[test]
    fn map_members_are_key_then_value() {
        let member = |name: &str| Member {
            name: name.into(),
            target: ShapeId::new("smithy.api#String"),
            traits: Traits::default(),
        };
        let shape = Shape::new(
            ShapeId::new("example.test#Attrs"),
            ShapeKind::Map { key: member("key"), value: member("value") },
        );
        let names: Vec<_> = shape.members().iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["key", "value"]);
        assert!(shape.member("value").is_some());
    }
}
