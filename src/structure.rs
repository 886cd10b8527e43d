//! Rust type definitions for shapes, and the `error` module enums.

use crate::builder;
use crate::constraint;
use crate::context::GenContext;
use crate::error::{CodegenError, Result};
use crate::model::{Member, Shape, ShapeKind};
use crate::symbol::{SymbolMode, SymbolProvider, field_name, pascal, type_name, unknown_variant};
use crate::writer::RustWriter;
use crate::wln;
use heck::ToSnakeCase;

/// Renders everything the `model` module holds for one shape. `top` gets
/// items for `model` itself, `inner` items for the `model::<shape>`
/// submodule.
pub fn render_shape(ctx: &GenContext<'_>, shape: &Shape, top: &mut RustWriter, inner: &mut RustWriter) -> Result<()> {
    match &shape.kind {
        ShapeKind::Structure { members } => {
            render_structure(ctx, shape, members, top)?;
            builder::render(ctx, shape, top, inner)
        }
        ShapeKind::Union { members } => {
            render_union(ctx, shape, members, top)?;
            if ctx.is_server() && ctx.is_constrained(&shape.id) {
                constraint::union::render(ctx, shape, top, inner)?;
            }
            Ok(())
        }
        ShapeKind::Enum { .. } => constraint::enumeration::render(ctx, shape, top, inner),
        ShapeKind::String | ShapeKind::Number(_) | ShapeKind::Blob | ShapeKind::List { .. } | ShapeKind::Map { .. } => {
            if ctx.has_newtype(shape) {
                constraint::render_newtype(ctx, shape, top, inner)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn message_member(members: &[Member]) -> Option<&Member> {
    members
        .iter()
        .find(|member| member.name.eq_ignore_ascii_case("message"))
}

fn render_structure(ctx: &GenContext<'_>, shape: &Shape, members: &[Member], top: &mut RustWriter) -> Result<()> {
    let name = type_name(&shape.id);
    let public = ctx.symbols(SymbolMode::Public);
    let streaming = members.iter().any(|member| ctx.is_streaming_member(member));

    top.docs(shape.traits.documentation.as_deref())?;
    if streaming {
        wln!(top, "#[derive(Debug)]")?;
    } else {
        wln!(top, "#[derive(Debug, Clone, PartialEq)]")?;
    }
    top.block(&format!("pub struct {name}"), |w| {
        for member in members {
            let rendered = if ctx.is_streaming_member(member) {
                ctx.stream_type(&shape.id, member)?
            } else {
                public.member_symbol(member)?.render()
            };
            w.docs(member.traits.documentation.as_deref())?;
            wln!(w, "pub {}: {rendered},", field_name(member))?;
        }
        Ok(())
    })?;
    wln!(top)?;

    if shape.is_error() {
        render_error_structure(ctx, shape, members, top)?;
    }
    Ok(())
}

fn render_error_structure(ctx: &GenContext<'_>, shape: &Shape, members: &[Member], top: &mut RustWriter) -> Result<()> {
    let name = type_name(&shape.id);
    let message = message_member(members)
        .filter(|member| ctx.model.target(member).is_ok_and(|target| matches!(target.kind, ShapeKind::String)));

    top.block(&format!("impl ::std::fmt::Display for {name}"), |w| {
        w.block("fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result", |w| {
            wln!(w, "f.write_str({:?})?;", name)?;
            if let Some(member) = message {
                let field = field_name(member);
                if member.is_optional() {
                    w.block(&format!("if let Some(message) = &self.{field}"), |w| {
                        wln!(w, "write!(f, \": {{}}\", message)?;")?;
                        Ok(())
                    })?;
                } else {
                    wln!(w, "write!(f, \": {{}}\", self.{field})?;")?;
                }
            }
            wln!(w, "Ok(())")?;
            Ok(())
        })
    })?;
    wln!(top)?;
    wln!(top, "impl ::std::error::Error for {name} {{}}")?;
    wln!(top)?;
    Ok(())
}

/// Members of an event-stream union that are events rather than modeled
/// errors.
pub fn event_members(shape: &Shape, ctx: &GenContext<'_>) -> Result<Vec<Member>> {
    partition_stream_members(shape, ctx).map(|(events, _)| events)
}

pub fn error_members(shape: &Shape, ctx: &GenContext<'_>) -> Result<Vec<Member>> {
    partition_stream_members(shape, ctx).map(|(_, errors)| errors)
}

fn partition_stream_members(shape: &Shape, ctx: &GenContext<'_>) -> Result<(Vec<Member>, Vec<Member>)> {
    let ShapeKind::Union { members } = &shape.kind else {
        return Err(CodegenError::unsupported(&shape.id, "not a union"));
    };
    let mut events = Vec::new();
    let mut errors = Vec::new();
    for member in members {
        if ctx.model.target(member)?.is_error() {
            errors.push(member.clone());
        } else {
            events.push(member.clone());
        }
    }
    Ok((events, errors))
}

fn render_union(ctx: &GenContext<'_>, shape: &Shape, members: &[Member], top: &mut RustWriter) -> Result<()> {
    let name = type_name(&shape.id);
    let public = ctx.symbols(SymbolMode::Public);
    let variants = if shape.is_event_stream() {
        event_members(shape, ctx)?
    } else {
        members.to_vec()
    };
    if let Some(unit) = variants.iter().find(|member| member.target.as_str() == "smithy.api#Unit") {
        return Err(CodegenError::unsupported(
            &shape.id,
            format!("union member `{}` targets smithy.api#Unit", unit.name),
        ));
    }
    let client = !ctx.is_server();
    let unknown = unknown_variant(variants.iter().map(|member| member.name.as_str()));

    top.docs(shape.traits.documentation.as_deref())?;
    wln!(top, "#[derive(Debug, Clone, PartialEq)]")?;
    if client {
        wln!(top, "#[non_exhaustive]")?;
    }
    top.block(&format!("pub enum {name}"), |w| {
        for member in &variants {
            let mut symbol = public.member_symbol(member)?;
            symbol.optional = false;
            w.docs(member.traits.documentation.as_deref())?;
            wln!(w, "{}({}),", pascal(&member.name), symbol.render())?;
        }
        if client {
            wln!(w, "/// A variant this version of the model does not know about.")?;
            wln!(w, "{unknown},")?;
        }
        Ok(())
    })?;
    wln!(top)?;

    top.block(&format!("impl {name}"), |w| {
        for member in &variants {
            let mut symbol = public.member_symbol(member)?;
            symbol.optional = false;
            let variant = pascal(&member.name);
            let stem = member.name.to_snake_case();
            let rendered = symbol.render();
            wln!(w, "pub fn as_{stem}(&self) -> ::std::result::Result<&{rendered}, &Self> {{")?;
            wln!(w, "    if let {name}::{variant}(value) = self {{ Ok(value) }} else {{ Err(self) }}")?;
            wln!(w, "}}")?;
            wln!(w)?;
            wln!(w, "pub fn is_{stem}(&self) -> bool {{")?;
            wln!(w, "    self.as_{stem}().is_ok()")?;
            wln!(w, "}}")?;
            wln!(w)?;
        }
        if client {
            wln!(w, "pub fn is_unknown(&self) -> bool {{")?;
            wln!(w, "    matches!(self, Self::{unknown})")?;
            wln!(w, "}}")?;
        }
        Ok(())
    })?;
    wln!(top)?;
    Ok(())
}

// -------------------- error module --------------------

/// An error enum over modeled error structures, optionally with the
/// catch-all `Unhandled` variant.
fn render_error_enum(
    ctx: &GenContext<'_>,
    name: &str,
    errors: &[(String, String)],
    unhandled: bool,
    w: &mut RustWriter,
) -> Result<()> {
    let rt = ctx.rt();
    wln!(w, "#[derive(Debug)]")?;
    w.block(&format!("pub enum {name}"), |w| {
        for (variant, rust_type) in errors {
            wln!(w, "{variant}({rust_type}),")?;
        }
        if unhandled {
            wln!(w, "/// An error the model does not describe.")?;
            wln!(w, "Unhandled({rt}::error::Unhandled),")?;
        }
        Ok(())
    })?;
    wln!(w)?;

    if unhandled {
        w.block(&format!("impl {name}"), |w| {
            wln!(w, "pub fn unhandled(source: impl ::std::convert::Into<{rt}::error::BoxError>) -> Self {{")?;
            wln!(w, "    Self::Unhandled({rt}::error::Unhandled::from_source(source))")?;
            wln!(w, "}}")?;
            wln!(w)?;
            wln!(w, "pub fn generic(meta: {rt}::error::ErrorMetadata) -> Self {{")?;
            wln!(w, "    Self::Unhandled({rt}::error::Unhandled::new(meta))")?;
            wln!(w, "}}")?;
            wln!(w)?;
            w.block("pub fn code(&self) -> ::std::option::Option<&str>", |w| {
                w.block("match self", |w| {
                    for (variant, _) in errors {
                        wln!(w, "Self::{variant}(_) => Some({:?}),", variant)?;
                    }
                    wln!(w, "Self::Unhandled(inner) => inner.meta().code(),")?;
                    Ok(())
                })
            })
        })?;
        wln!(w)?;
    }

    let empty = errors.is_empty() && !unhandled;
    w.block(&format!("impl ::std::fmt::Display for {name}"), |w| {
        w.block("fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result", |w| {
            if empty {
                return Ok(wln!(w, "match *self {{}}")?);
            }
            w.block("match self", |w| {
                for (variant, _) in errors {
                    wln!(w, "Self::{variant}(inner) => ::std::fmt::Display::fmt(inner, f),")?;
                }
                if unhandled {
                    wln!(w, "Self::Unhandled(inner) => ::std::fmt::Display::fmt(inner, f),")?;
                }
                Ok(())
            })
        })
    })?;
    wln!(w)?;
    w.block(&format!("impl ::std::error::Error for {name}"), |w| {
        w.block(
            "fn source(&self) -> ::std::option::Option<&(dyn ::std::error::Error + 'static)>",
            |w| {
                if empty {
                    return Ok(wln!(w, "match *self {{}}")?);
                }
                w.block("match self", |w| {
                    for (variant, _) in errors {
                        wln!(w, "Self::{variant}(inner) => Some(inner),")?;
                    }
                    if unhandled {
                        wln!(w, "Self::Unhandled(inner) => Some(inner),")?;
                    }
                    Ok(())
                })
            },
        )
    })?;
    wln!(w)?;
    for (variant, rust_type) in errors {
        w.block(&format!("impl ::std::convert::From<{rust_type}> for {name}"), |w| {
            wln!(w, "fn from(value: {rust_type}) -> Self {{")?;
            wln!(w, "    Self::{variant}(value)")?;
            wln!(w, "}}")?;
            Ok(())
        })?;
        wln!(w)?;
    }
    Ok(())
}

/// Per-operation error enums and per-event-stream error enums.
pub fn render_error_module(ctx: &GenContext<'_>, w: &mut RustWriter) -> Result<()> {
    for operation_shape in ctx.operations()? {
        let ShapeKind::Operation(operation) = &operation_shape.kind else {
            continue;
        };
        let errors = operation
            .errors
            .iter()
            .map(|id| Ok((type_name(id), ctx.named_type(&ctx.model.expect_shape(id)?.id))))
            .collect::<Result<Vec<_>>>()?;
        let name = format!("{}Error", type_name(&operation_shape.id));
        wln!(w, "/// Errors `{}` can fail with.", operation_shape.id.name())?;
        render_error_enum(ctx, &name, &errors, !ctx.is_server(), w)?;
    }
    for shape in ctx.model.user_shapes().filter(|shape| shape.is_event_stream()) {
        let errors = error_members(shape, ctx)?
            .iter()
            .map(|member| (pascal(&member.name), ctx.named_type(&member.target)))
            .collect::<Vec<_>>();
        let name = format!("{}Error", type_name(&shape.id));
        wln!(w, "/// Modeled errors of the `{}` event stream.", shape.id.name())?;
        render_error_enum(ctx, &name, &errors, true, w)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodegenSettings;
    use crate::model::{ShapeId, load, transform};

    const MODEL: &str = r#"{"smithy": "2.0", "shapes": {
        "t#Choice": { "type": "union", "members": {
            "text": { "target": "smithy.api#String" },
            "count": { "target": "smithy.api#Integer" }
        }},
        "t#Conflict": { "type": "structure",
            "members": { "message": { "target": "smithy.api#String" } },
            "traits": { "smithy.api#error": "client" } },
        "t#Put": { "type": "operation", "errors": [ { "target": "t#Conflict" } ] }
    }}"#;

    fn ctx_model() -> crate::model::Model {
        let mut model = load::from_str(MODEL).unwrap();
        transform::run_all(&mut model).unwrap();
        model
    }

    fn render_one(settings: &CodegenSettings, shape: &str) -> String {
        let model = ctx_model();
        let ctx = GenContext::new(&model, settings).unwrap();
        let (mut top, mut inner) = (RustWriter::new(), RustWriter::new());
        render_shape(&ctx, model.get(&ShapeId::new(shape)).unwrap(), &mut top, &mut inner).unwrap();
        top.as_str().to_string()
    }

    #[test]
    fn client_unions_are_forward_compatible() {
        let top = render_one(&CodegenSettings::client(), "t#Choice");
        assert!(top.contains("#[non_exhaustive]"), "{top}");
        assert!(top.contains("    Unknown,"), "{top}");
        assert!(top.contains("Count(i32),"), "{top}");
        assert!(top.contains("pub fn as_text(&self) -> ::std::result::Result<&::std::string::String, &Self>"));

        let top = render_one(&CodegenSettings::server(true), "t#Choice");
        assert!(!top.contains("Unknown"), "{top}");
    }

    #[test]
    fn error_structures_display_their_message() {
        let top = render_one(&CodegenSettings::client(), "t#Conflict");
        assert!(top.contains("if let Some(message) = &self.message {"), "{top}");
        assert!(top.contains("impl ::std::error::Error for Conflict {}"), "{top}");
    }

    #[test]
    fn operation_errors() {
        let model = ctx_model();
        let client = CodegenSettings::client();
        let ctx = GenContext::new(&model, &client).unwrap();
        let mut w = RustWriter::new();
        render_error_module(&ctx, &mut w).unwrap();
        assert!(w.as_str().contains("pub enum PutError {"), "{}", w.as_str());
        assert!(w.as_str().contains("Conflict(crate::model::Conflict),"));
        assert!(w.as_str().contains("Unhandled(::shapegen_runtime::error::Unhandled),"));

        let server = CodegenSettings::server(true);
        let ctx = GenContext::new(&model, &server).unwrap();
        let mut w = RustWriter::new();
        render_error_module(&ctx, &mut w).unwrap();
        assert!(!w.as_str().contains("Unhandled"), "{}", w.as_str());
    }
}
