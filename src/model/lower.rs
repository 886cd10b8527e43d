//! AST → typed shapes.

use super::ast::{AstMember, AstShape};
use super::shape::*;
use super::PRELUDE_NAMESPACE;
use crate::error::{CodegenError, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

const UNIT: &str = "smithy.api#Unit";

#[derive(Deserialize)]
struct LengthTrait {
    min: Option<u64>,
    max: Option<u64>,
}

#[derive(Deserialize)]
struct RangeTrait {
    min: Option<f64>,
    max: Option<f64>,
}

fn default_http_code() -> u16 {
    200
}

#[derive(Deserialize)]
struct HttpTraitBody {
    method: String,
    uri: String,
    #[serde(default = "default_http_code")]
    code: u16,
}

// The 1.0 `@enum` trait on a string shape.
#[derive(Deserialize)]
struct LegacyEnumDefinition {
    value: String,
    name: Option<String>,
    documentation: Option<String>,
}

fn parse_trait<T: DeserializeOwned>(id: &ShapeId, name: &str, value: &Value) -> Result<T> {
    T::deserialize(value).map_err(|error| CodegenError::invalid_trait(id, name, error.to_string()))
}

fn lower_traits(id: &ShapeId, raw: &IndexMap<String, Value>) -> Result<Traits> {
    let mut traits = Traits::default();
    for (name, value) in raw {
        let short = name.strip_prefix("smithy.api#").unwrap_or(name.as_str());
        match short {
            "required" => traits.required = true,
            "default" => traits.default = Some(value.clone()),
            "length" => {
                let LengthTrait { min, max } = parse_trait(id, name, value)?;
                traits.length = Some(LengthBounds { min, max });
            }
            "range" => {
                let RangeTrait { min, max } = parse_trait(id, name, value)?;
                traits.range = Some(RangeBounds { min, max });
            }
            "pattern" => {
                let pattern: String = parse_trait(id, name, value)?;
                regex::Regex::new(&pattern).map_err(|source| CodegenError::InvalidPattern {
                    shape: id.clone(),
                    pattern: pattern.clone(),
                    source,
                })?;
                traits.pattern = Some(pattern);
            }
            "jsonName" => traits.json_name = Some(parse_trait(id, name, value)?),
            "timestampFormat" => {
                let format: String = parse_trait(id, name, value)?;
                traits.timestamp_format = Some(match format.as_str() {
                    "date-time" => TimestampFormat::DateTime,
                    "http-date" => TimestampFormat::HttpDate,
                    "epoch-seconds" => TimestampFormat::EpochSeconds,
                    other => return Err(CodegenError::invalid_trait(id, name, format!("unknown format `{other}`"))),
                });
            }
            "enumValue" => {
                let value = match value {
                    Value::String(value) => value.clone(),
                    Value::Number(number) => number.to_string(),
                    other => return Err(CodegenError::invalid_trait(id, name, format!("unexpected value {other}"))),
                };
                traits.enum_value = Some(value);
            }
            "sparse" => traits.sparse = true,
            "error" => {
                let fault: String = parse_trait(id, name, value)?;
                traits.error = Some(match fault.as_str() {
                    "client" => ErrorFault::Client,
                    "server" => ErrorFault::Server,
                    other => return Err(CodegenError::invalid_trait(id, name, format!("unknown fault `{other}`"))),
                });
            }
            "httpError" => traits.http_error = Some(parse_trait(id, name, value)?),
            "http" => {
                let HttpTraitBody { method, uri, code } = parse_trait(id, name, value)?;
                if !uri.starts_with('/') {
                    return Err(CodegenError::invalid_trait(id, name, "uri must start with `/`"));
                }
                traits.http = Some(HttpTrait { method, uri, code });
            }
            "httpHeader" => traits.http_header = Some(parse_trait(id, name, value)?),
            "httpQuery" => traits.http_query = Some(parse_trait(id, name, value)?),
            "httpLabel" => traits.http_label = true,
            "httpPayload" => traits.http_payload = true,
            "httpResponseCode" => traits.http_response_code = true,
            "streaming" => traits.streaming = true,
            "eventHeader" => traits.event_header = true,
            "eventPayload" => traits.event_payload = true,
            "documentation" => traits.documentation = Some(parse_trait(id, name, value)?),
            _ => {
                traits.other.insert(name.clone(), value.clone());
            }
        }
    }
    Ok(traits)
}

fn lower_member(container: &ShapeId, name: &str, ast: &AstMember) -> Result<Member> {
    let member_id = ShapeId::new(format!("{container}${name}"));
    Ok(Member {
        name: name.to_string(),
        target: ShapeId::new(ast.target.clone()),
        traits: lower_traits(&member_id, &ast.traits)?,
    })
}

fn lower_members(id: &ShapeId, members: &IndexMap<String, AstMember>) -> Result<Vec<Member>> {
    members
        .iter()
        .map(|(name, member)| lower_member(id, name, member))
        .collect()
}

fn required_member(id: &ShapeId, slot: &str, member: &Option<AstMember>) -> Result<Member> {
    let member = member
        .as_ref()
        .ok_or_else(|| CodegenError::invalid_trait(id, slot, format!("`{slot}` member is missing")))?;
    lower_member(id, slot, member)
}

fn operation_target(target: &Option<super::ast::AstTarget>) -> Option<ShapeId> {
    target
        .as_ref()
        .filter(|target| target.target != UNIT)
        .map(|target| ShapeId::new(target.target.clone()))
}

/// Lowers one AST shape. Shape types the generator has no use for (resources)
/// lower to `None`.
pub fn lower_shape(id: &str, ast: &AstShape) -> Result<Option<Shape>> {
    let id = ShapeId::new(id);
    let traits = lower_traits(&id, &ast.traits)?;
    let kind = match ast.kind.as_str() {
        "structure" => ShapeKind::Structure { members: lower_members(&id, &ast.members)? },
        "union" => ShapeKind::Union { members: lower_members(&id, &ast.members)? },
        "list" | "set" => ShapeKind::List { member: required_member(&id, "member", &ast.member)? },
        "map" => ShapeKind::Map {
            key: required_member(&id, "key", &ast.key)?,
            value: required_member(&id, "value", &ast.value)?,
        },
        "string" => match traits.other.get("smithy.api#enum") {
            Some(definitions) => {
                let definitions: Vec<LegacyEnumDefinition> = parse_trait(&id, "smithy.api#enum", definitions)?;
                ShapeKind::Enum {
                    variants: definitions
                        .into_iter()
                        .map(|definition| EnumVariant {
                            name: definition.name.unwrap_or_else(|| definition.value.clone()),
                            value: definition.value,
                            documentation: definition.documentation,
                        })
                        .collect(),
                }
            }
            None => ShapeKind::String,
        },
        "enum" => {
            let members = lower_members(&id, &ast.members)?;
            ShapeKind::Enum {
                variants: members
                    .into_iter()
                    .map(|member| EnumVariant {
                        value: member.traits.enum_value.clone().unwrap_or_else(|| member.name.clone()),
                        documentation: member.traits.documentation.clone(),
                        name: member.name,
                    })
                    .collect(),
            }
        }
        "intEnum" => {
            tracing::warn!(shape = %id, "intEnum is generated as a plain integer");
            ShapeKind::Number(NumberKind::Integer)
        }
        "byte" => ShapeKind::Number(NumberKind::Byte),
        "short" => ShapeKind::Number(NumberKind::Short),
        "integer" => ShapeKind::Number(NumberKind::Integer),
        "long" => ShapeKind::Number(NumberKind::Long),
        "float" => ShapeKind::Number(NumberKind::Float),
        "double" => ShapeKind::Number(NumberKind::Double),
        "bigInteger" => ShapeKind::Number(NumberKind::BigInteger),
        "bigDecimal" => ShapeKind::Number(NumberKind::BigDecimal),
        "boolean" => ShapeKind::Boolean,
        "blob" => ShapeKind::Blob,
        "timestamp" => ShapeKind::Timestamp,
        "document" => ShapeKind::Document,
        "operation" => ShapeKind::Operation(Operation {
            input: operation_target(&ast.input),
            output: operation_target(&ast.output),
            errors: ast.errors.iter().map(|error| ShapeId::new(error.target.clone())).collect(),
        }),
        "service" => ShapeKind::Service(Service {
            version: ast.version.clone(),
            operations: ast.operations.iter().map(|op| ShapeId::new(op.target.clone())).collect(),
        }),
        "resource" | "apply" => {
            tracing::debug!(shape = %id, kind = %ast.kind, "skipping shape");
            return Ok(None);
        }
        other => return Err(CodegenError::unsupported(&id, format!("unknown shape type `{other}`"))),
    };
    Ok(Some(Shape { id, kind, traits }))
}

/// Built-in simple shapes every model can target.
pub fn prelude() -> Vec<Shape> {
    let simple = |name: &str, kind: ShapeKind| Shape::new(ShapeId::from_parts(PRELUDE_NAMESPACE, name), kind);
    let primitive = |name: &str, kind: ShapeKind, default: Value| {
        let mut shape = simple(name, kind);
        shape.traits.default = Some(default);
        shape
    };
    vec![
        simple("String", ShapeKind::String),
        simple("Blob", ShapeKind::Blob),
        simple("Boolean", ShapeKind::Boolean),
        simple("Byte", ShapeKind::Number(NumberKind::Byte)),
        simple("Short", ShapeKind::Number(NumberKind::Short)),
        simple("Integer", ShapeKind::Number(NumberKind::Integer)),
        simple("Long", ShapeKind::Number(NumberKind::Long)),
        simple("Float", ShapeKind::Number(NumberKind::Float)),
        simple("Double", ShapeKind::Number(NumberKind::Double)),
        simple("BigInteger", ShapeKind::Number(NumberKind::BigInteger)),
        simple("BigDecimal", ShapeKind::Number(NumberKind::BigDecimal)),
        simple("Timestamp", ShapeKind::Timestamp),
        simple("Document", ShapeKind::Document),
        simple("Unit", ShapeKind::Structure { members: Vec::new() }),
        primitive("PrimitiveBoolean", ShapeKind::Boolean, Value::Bool(false)),
        primitive("PrimitiveByte", ShapeKind::Number(NumberKind::Byte), Value::from(0)),
        primitive("PrimitiveShort", ShapeKind::Number(NumberKind::Short), Value::from(0)),
        primitive("PrimitiveInteger", ShapeKind::Number(NumberKind::Integer), Value::from(0)),
        primitive("PrimitiveLong", ShapeKind::Number(NumberKind::Long), Value::from(0)),
        primitive("PrimitiveFloat", ShapeKind::Number(NumberKind::Float), Value::from(0)),
        primitive("PrimitiveDouble", ShapeKind::Number(NumberKind::Double), Value::from(0)),
    ]
}

/// Every member, operation and service reference must resolve.
pub fn validate_targets(model: &Model) -> Result<()> {
    for shape in model.shapes() {
        for member in shape.members() {
            if !model.contains(&member.target) {
                return Err(CodegenError::UnknownTarget {
                    shape: shape.id.clone(),
                    member: member.name.clone(),
                    target: member.target.to_string(),
                });
            }
        }
        let references: Vec<(&str, &ShapeId)> = match &shape.kind {
            ShapeKind::Operation(operation) => operation
                .input
                .iter()
                .map(|id| ("input", id))
                .chain(operation.output.iter().map(|id| ("output", id)))
                .chain(operation.errors.iter().map(|id| ("errors", id)))
                .collect(),
            ShapeKind::Service(service) => service.operations.iter().map(|id| ("operations", id)).collect(),
            _ => Vec::new(),
        };
        for (slot, target) in references {
            if !model.contains(target) {
                return Err(CodegenError::UnknownTarget {
                    shape: shape.id.clone(),
                    member: slot.to_string(),
                    target: target.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ast(value: Value) -> AstShape {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn structure_traits_are_typed() {
        let shape = lower_shape(
            "example.test#Record",
            &ast(json!({
                "type": "structure",
                "members": {
                    "id": {
                        "target": "example.test#IdString",
                        "traits": { "smithy.api#required": {}, "smithy.api#jsonName": "ID" }
                    },
                    "count": { "target": "smithy.api#Integer", "traits": { "smithy.api#default": 0 } }
                },
                "traits": { "smithy.api#documentation": "A record.", "example.test#custom": {} }
            })),
        )
        .unwrap()
        .unwrap();
        let id = shape.member("id").unwrap();
        assert!(id.traits.required);
        assert_eq!(id.json_name(), "ID");
        assert_eq!(shape.member("count").unwrap().traits.default, Some(json!(0)));
        assert_eq!(shape.traits.documentation.as_deref(), Some("A record."));
        assert!(shape.traits.other.contains_key("example.test#custom"));
    }

    #[test]
    fn enums_in_both_syntaxes() {
        let modern = lower_shape(
            "example.test#Kind",
            &ast(json!({
                "type": "enum",
                "members": {
                    "ALPHA": { "target": "smithy.api#Unit", "traits": { "smithy.api#enumValue": "alpha" } },
                    "BETA": { "target": "smithy.api#Unit" }
                }
            })),
        )
        .unwrap()
        .unwrap();
        let legacy = lower_shape(
            "example.test#Kind",
            &ast(json!({
                "type": "string",
                "traits": { "smithy.api#enum": [ { "value": "alpha", "name": "ALPHA" }, { "value": "BETA" } ] }
            })),
        )
        .unwrap()
        .unwrap();
        for shape in [modern, legacy] {
            match shape.kind {
                ShapeKind::Enum { variants } => {
                    let pairs: Vec<_> = variants.iter().map(|v| (v.name.as_str(), v.value.as_str())).collect();
                    assert_eq!(pairs, vec![("ALPHA", "alpha"), ("BETA", "BETA")]);
                }
                other => panic!("expected an enum, got {other:?}"),
            }
        }
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let error = lower_shape(
            "example.test#Bad",
            &ast(json!({ "type": "string", "traits": { "smithy.api#pattern": "([a-z" } })),
        )
        .unwrap_err();
        assert!(matches!(error, CodegenError::InvalidPattern { .. }));
    }

    #[test]
    fn unit_operation_targets_are_dropped() {
        let shape = lower_shape(
            "example.test#Ping",
            &ast(json!({ "type": "operation", "input": { "target": "smithy.api#Unit" } })),
        )
        .unwrap()
        .unwrap();
        match shape.kind {
            ShapeKind::Operation(operation) => assert_eq!(operation.input, None),
            other => panic!("expected an operation, got {other:?}"),
        }
    }

    #[test]
    fn http_trait_defaults_code() {
        let shape = lower_shape(
            "example.test#Put",
            &ast(json!({
                "type": "operation",
                "traits": { "smithy.api#http": { "method": "PUT", "uri": "/records/{id}" } }
            })),
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            shape.traits.http,
            Some(HttpTrait { method: "PUT".into(), uri: "/records/{id}".into(), code: 200 })
        );
    }

    #[test]
    fn unknown_targets_fail_validation() {
        let mut model = Model::new();
        for shape in prelude() {
            model.insert(shape);
        }
        let shape = lower_shape(
            "example.test#Holder",
            &ast(json!({ "type": "list", "member": { "target": "example.test#Missing" } })),
        )
        .unwrap()
        .unwrap();
        model.insert(shape);
        assert!(matches!(validate_targets(&model), Err(CodegenError::UnknownTarget { .. })));
    }
}
