//! JSON serializer generation.
//!
//! Structures and unions get `ser_<shape>(object, input)` writing into an
//! open object; lists and maps get `ser_<shape>(value, input)` writing one
//! value. Simple shapes are written inline. Functions are memoized per
//! (shape, mode), which is also what stops recursion on cyclic shapes.
//! Serializers never fail.

use crate::context::GenContext;
use crate::error::{CodegenError, Result};
use crate::model::{Member, Shape, ShapeId, ShapeKind};
use crate::symbol::{field_name, fn_stem, pascal, unknown_variant};
use crate::writer::{Dependency, Fragment, RustWriter, string_literal};
use crate::wln;
use std::collections::HashMap;

/// Which form of a structure a function handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SerdeMode {
    /// The full JSON object.
    Document,
    /// Only the members carried in an HTTP body or event payload.
    Body,
}

/// An expression for a value being written: either a reference (`&T`) or a
/// place of type `T`.
#[derive(Debug, Clone)]
pub(crate) enum ValueExpr {
    Ref(String),
    Value(String),
}

impl ValueExpr {
    pub(crate) fn as_ref(&self) -> String {
        match self {
            ValueExpr::Ref(expr) => expr.clone(),
            ValueExpr::Value(expr) => format!("&{expr}"),
        }
    }

    /// Only valid for `Copy` types.
    pub(crate) fn as_value(&self) -> String {
        match self {
            ValueExpr::Ref(expr) => format!("*{expr}"),
            ValueExpr::Value(expr) => expr.clone(),
        }
    }

    /// Receiver for method calls, which auto-reference.
    pub(crate) fn receiver(&self) -> &str {
        match self {
            ValueExpr::Ref(expr) | ValueExpr::Value(expr) => expr,
        }
    }
}

pub struct SerializerGenerator<'c, 'm> {
    ctx: &'c GenContext<'m>,
    memo: HashMap<(ShapeId, SerdeMode), String>,
    functions: Vec<String>,
    counter: usize,
}

impl<'c, 'm> SerializerGenerator<'c, 'm> {
    pub fn new(ctx: &'c GenContext<'m>) -> Self {
        SerializerGenerator {
            ctx,
            memo: HashMap::new(),
            functions: Vec::new(),
            counter: 0,
        }
    }

    fn fresh(&mut self, prefix: &str) -> String {
        self.counter += 1;
        format!("{prefix}_{}", self.counter)
    }

    /// Path of a generated function, for callers outside `protocol_serde`.
    pub fn path(&self, name: &str) -> String {
        format!("{}::{name}", self.ctx.module_path("protocol_serde"))
    }

    /// Everything generated so far, in generation order.
    pub fn finish(self) -> Fragment {
        let mut fragment = Fragment {
            name: "protocol_serde::ser".to_string(),
            code: self.functions.join("\n"),
            ..Fragment::default()
        };
        if !fragment.code.is_empty() {
            fragment.dependencies.insert(Dependency::Runtime);
        }
        fragment
    }

    /// `ser_<shape>` for a structure, union, list or map, generating it on
    /// first use.
    pub fn shape_fn(&mut self, shape: &Shape) -> Result<String> {
        let key = (shape.id.clone(), SerdeMode::Document);
        if let Some(name) = self.memo.get(&key) {
            return Ok(name.clone());
        }
        let name = format!("ser_{}", fn_stem(&shape.id));
        self.memo.insert(key, name.clone());
        tracing::trace!(shape = %shape.id, function = %name, "generating serializer");
        let code = match &shape.kind {
            ShapeKind::Structure { members } => {
                let members: Vec<&Member> = members
                    .iter()
                    .filter(|member| !self.ctx.is_streaming_member(member))
                    .collect();
                self.structure_fn(&name, shape, &members)?
            }
            ShapeKind::Union { .. } => self.union_fn(&name, shape)?,
            ShapeKind::List { member } => self.list_fn(&name, shape, member)?,
            ShapeKind::Map { key, value } => self.map_fn(&name, shape, key, value)?,
            _ => {
                return Err(CodegenError::unsupported(
                    &shape.id,
                    format!("{} shapes are serialized inline", shape.kind_name()),
                ));
            }
        };
        self.functions.push(code);
        Ok(name)
    }

    /// `ser_<shape>_body`: the members of an operation or event structure
    /// that travel in the JSON body.
    pub fn body_fn(&mut self, shape: &Shape, members: &[&Member]) -> Result<String> {
        let key = (shape.id.clone(), SerdeMode::Body);
        if let Some(name) = self.memo.get(&key) {
            return Ok(name.clone());
        }
        let name = format!("ser_{}_body", fn_stem(&shape.id));
        self.memo.insert(key, name.clone());
        let code = self.structure_fn(&name, shape, members)?;
        self.functions.push(code);
        Ok(name)
    }

    fn structure_fn(&mut self, name: &str, shape: &Shape, members: &[&Member]) -> Result<String> {
        let rt = self.ctx.rt().to_string();
        let structure = self.ctx.named_type(&shape.id);
        let mut w = RustWriter::new();
        w.block(
            &format!("pub fn {name}(object: &mut {rt}::json::JsonObjectWriter<'_>, input: &{structure})"),
            |w| {
                for member in members {
                    self.write_member(w, member)?;
                }
                Ok(())
            },
        )?;
        Ok(w.as_str().to_string())
    }

    fn write_member(&mut self, w: &mut RustWriter, member: &Member) -> Result<()> {
        let ctx = self.ctx;
        let target = ctx.model.target(member)?;
        let writer = format!("object.key({})", string_literal(member.json_name()));
        let field = field_name(member);
        if member.is_optional() {
            let var = self.fresh("var");
            w.block(&format!("if let Some({var}) = &input.{field}"), |w| {
                self.write_value(w, &writer, Some(member), target, &ValueExpr::Ref(var.clone()))
            })
        } else {
            self.write_value(w, &writer, Some(member), target, &ValueExpr::Value(format!("input.{field}")))
        }
    }

    /// Writes one value of `target`'s public type through the `JsonValueWriter`
    /// expression `writer`.
    pub(crate) fn write_value(
        &mut self,
        w: &mut RustWriter,
        writer: &str,
        member: Option<&Member>,
        target: &Shape,
        value: &ValueExpr,
    ) -> Result<()> {
        let ctx = self.ctx;
        let rt = ctx.rt().to_string();
        let newtype = ctx.has_public_newtype(target);
        let recv = value.receiver();
        match &target.kind {
            ShapeKind::String if newtype => wln!(w, "{writer}.string({recv}.as_str());")?,
            ShapeKind::String => wln!(w, "{writer}.string({});", value.as_ref())?,
            ShapeKind::Enum { .. } => wln!(w, "{writer}.string({recv}.as_str());")?,
            ShapeKind::Boolean => wln!(w, "{writer}.boolean({});", value.as_value())?,
            ShapeKind::Number(_) if newtype => wln!(w, "{writer}.number({rt}::Number::from(*{recv}.inner()));")?,
            ShapeKind::Number(_) => wln!(w, "{writer}.number({rt}::Number::from({}));", value.as_value())?,
            ShapeKind::Blob if newtype => wln!(w, "{writer}.blob({recv}.inner());")?,
            ShapeKind::Blob => wln!(w, "{writer}.blob({});", value.as_ref())?,
            ShapeKind::Timestamp => {
                let format = ctx.format_path(ctx.body_timestamp_format(member, target));
                wln!(w, "{writer}.date_time({}, {format});", value.as_ref())?
            }
            ShapeKind::Document => wln!(w, "{writer}.document({});", value.as_ref())?,
            ShapeKind::Structure { .. } | ShapeKind::Union { .. } => {
                let function = self.shape_fn(target)?;
                let object = self.fresh("object");
                wln!(w, "{{")?;
                {
                    let _indent = w.indent();
                    wln!(w, "let mut {object} = {writer}.start_object();")?;
                    wln!(w, "{function}(&mut {object}, {});", value.as_ref())?;
                    wln!(w, "{object}.finish();")?;
                }
                wln!(w, "}}")?;
            }
            ShapeKind::List { .. } | ShapeKind::Map { .. } => {
                let function = self.shape_fn(target)?;
                wln!(w, "{function}({writer}, {});", value.as_ref())?;
            }
            ShapeKind::Operation(_) | ShapeKind::Service(_) => {
                return Err(CodegenError::unsupported(&target.id, "cannot be serialized"));
            }
        }
        Ok(())
    }

    fn collection_input(&self, shape: &Shape) -> &'static str {
        if self.ctx.has_public_newtype(shape) { "input.inner()" } else { "input" }
    }

    fn list_fn(&mut self, name: &str, shape: &Shape, member: &Member) -> Result<String> {
        let ctx = self.ctx;
        let rt = ctx.rt().to_string();
        let public = ctx.public_type(shape)?;
        let target = ctx.model.target(member)?;
        let input = self.collection_input(shape);
        let sparse = shape.traits.sparse;
        let mut w = RustWriter::new();
        w.block(
            &format!("pub fn {name}(value: {rt}::json::JsonValueWriter<'_>, input: &{public})"),
            |w| {
                wln!(w, "let mut array = value.start_array();")?;
                w.block(&format!("for item in {input}"), |w| {
                    if sparse {
                        w.block_with("if let Some(item) = item", "} else {", |w| {
                            self.write_value(w, "array.value()", Some(member), target, &ValueExpr::Ref("item".into()))
                        })?;
                        null_arm(w, "array.value()")
                    } else {
                        self.write_value(w, "array.value()", Some(member), target, &ValueExpr::Ref("item".into()))
                    }
                })?;
                wln!(w, "array.finish();")?;
                Ok(())
            },
        )?;
        Ok(w.as_str().to_string())
    }

    fn map_fn(&mut self, name: &str, shape: &Shape, key: &Member, value: &Member) -> Result<String> {
        let ctx = self.ctx;
        let rt = ctx.rt().to_string();
        let public = ctx.public_type(shape)?;
        let key_target = ctx.model.target(key)?;
        let value_target = ctx.model.target(value)?;
        let input = self.collection_input(shape);
        let key_expr = match key_target.kind {
            ShapeKind::String if !ctx.has_public_newtype(key_target) => "key",
            ShapeKind::String | ShapeKind::Enum { .. } => "key.as_str()",
            _ => return Err(CodegenError::unsupported(&shape.id, "map keys must be strings or enums")),
        };
        let writer = format!("object.key({key_expr})");
        let sparse = shape.traits.sparse;
        let mut w = RustWriter::new();
        w.block(
            &format!("pub fn {name}(value: {rt}::json::JsonValueWriter<'_>, input: &{public})"),
            |w| {
                wln!(w, "let mut object = value.start_object();")?;
                w.block(&format!("for (key, item) in {input}"), |w| {
                    if sparse {
                        w.block_with("if let Some(item) = item", "} else {", |w| {
                            self.write_value(w, &writer, Some(value), value_target, &ValueExpr::Ref("item".into()))
                        })?;
                        null_arm(w, &writer)
                    } else {
                        self.write_value(w, &writer, Some(value), value_target, &ValueExpr::Ref("item".into()))
                    }
                })?;
                wln!(w, "object.finish();")?;
                Ok(())
            },
        )?;
        Ok(w.as_str().to_string())
    }

    fn union_fn(&mut self, name: &str, shape: &Shape) -> Result<String> {
        let ShapeKind::Union { members } = &shape.kind else {
            return Err(CodegenError::unsupported(&shape.id, "not a union"));
        };
        let ctx = self.ctx;
        let rt = ctx.rt().to_string();
        let union = ctx.named_type(&shape.id);
        let variants: Vec<Member> = if shape.is_event_stream() {
            crate::structure::event_members(shape, ctx)?
        } else {
            members.clone()
        };
        let unknown = unknown_variant(variants.iter().map(|member| member.name.as_str()));
        let mut w = RustWriter::new();
        w.block(
            &format!("pub fn {name}(object: &mut {rt}::json::JsonObjectWriter<'_>, input: &{union})"),
            |w| {
                w.block("match input", |w| {
                    for member in &variants {
                        let target = ctx.model.target(member)?;
                        let writer = format!("object.key({})", string_literal(member.json_name()));
                        w.block(&format!("{union}::{}(inner) =>", pascal(&member.name)), |w| {
                            self.write_value(w, &writer, Some(member), target, &ValueExpr::Ref("inner".into()))
                        })?;
                    }
                    if !ctx.is_server() {
                        wln!(w, "{union}::{unknown} => {{}}")?;
                    }
                    Ok(())
                })
            },
        )?;
        Ok(w.as_str().to_string())
    }
}

/// The `None` arm of a sparse element: closes the `if let` opened with
/// `} else {`.
fn null_arm(w: &mut RustWriter, writer: &str) -> Result<()> {
    {
        let _indent = w.indent();
        wln!(w, "{writer}.null();")?;
    }
    wln!(w, "}}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodegenSettings;
    use crate::model::{load, transform};

    const MODEL: &str = r#"{"smithy": "2.0", "shapes": {
        "t#Tags": { "type": "list", "member": { "target": "smithy.api#String" } },
        "t#Node": { "type": "structure", "members": {
            "value": { "target": "smithy.api#Integer", "traits": { "smithy.api#required": {} } },
            "next": { "target": "t#Node" }
        }},
        "t#Record": { "type": "structure", "members": {
            "id": { "target": "smithy.api#String", "traits": { "smithy.api#required": {}, "smithy.api#jsonName": "ID" } },
            "tags": { "target": "t#Tags" },
            "created": { "target": "smithy.api#Timestamp" },
            "head": { "target": "t#Node" }
        }},
        "t#Choice": { "type": "union", "members": {
            "text": { "target": "smithy.api#String" }
        }}
    }}"#;

    fn generate(settings: &CodegenSettings, shape: &str) -> String {
        let mut model = load::from_str(MODEL).unwrap();
        transform::run_all(&mut model).unwrap();
        let ctx = GenContext::new(&model, settings).unwrap();
        let mut generator = SerializerGenerator::new(&ctx);
        generator.shape_fn(model.get(&ShapeId::new(shape)).unwrap()).unwrap();
        generator.finish().code
    }

    #[test]
    fn structures_write_members_in_model_order() {
        let code = generate(&CodegenSettings::client(), "t#Record");
        let id = code.find("object.key(\"ID\").string(&input.id);").unwrap();
        let tags = code.find("ser_tags(object.key(\"tags\"), var_").unwrap();
        let created = code.find("::shapegen_runtime::date_time::Format::EpochSeconds").unwrap();
        assert!(id < tags && tags < created, "{code}");
        assert!(code.contains("pub fn ser_tags(value: ::shapegen_runtime::json::JsonValueWriter<'_>, input: &::std::vec::Vec<::std::string::String>)"));
    }

    #[test]
    fn recursive_structures_terminate() {
        let code = generate(&CodegenSettings::client(), "t#Node");
        assert_eq!(code.matches("pub fn ser_node(").count(), 1, "{code}");
        assert!(code.contains("ser_node(&mut object_"), "{code}");
        assert!(code.contains("number(::shapegen_runtime::Number::from(input.value))"), "{code}");
    }

    #[test]
    fn client_unions_ignore_unknown() {
        let code = generate(&CodegenSettings::client(), "t#Choice");
        assert!(code.contains("crate::model::Choice::Unknown => {}"), "{code}");
        let code = generate(&CodegenSettings::server(true), "t#Choice");
        assert!(!code.contains("Unknown"), "{code}");
    }
}
