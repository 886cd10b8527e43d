//! Structure builders.
//!
//! One slot per member, a public method and a `set_` setter per member, and
//! `build`. `build` evaluates the structure literal's field initializers in
//! declaration order, each with `?`, so the first failing member wins: a
//! missing required member is reported before its value is validated, and a
//! member is validated only after every member declared before it succeeded.

use crate::constraint::violation_type;
use crate::context::GenContext;
use crate::error::{CodegenError, Result};
use crate::model::{Member, Shape, ShapeKind};
use crate::symbol::{SymbolMode, SymbolProvider, field_name, module_name, pascal, setter_name, type_name};
use crate::writer::{RustWriter, string_literal};
use crate::wln;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;

/// Everything the builder needs to know about one member.
struct Slot<'a> {
    member: &'a Member,
    field: String,
    setter: String,
    variant: String,
    /// `Sender`/`Receiver` type for event-stream members.
    stream: Option<String>,
    /// Holds `MaybeConstrained<_>` (server, constrained target).
    constrained: bool,
    boxed: bool,
    public: String,
    unconstrained: String,
    constrained_type: String,
    to_public: &'static str,
    nested_violation: String,
}

impl Slot<'_> {
    fn missing_variant(&self) -> String {
        format!("Missing{}", self.variant)
    }

    /// Required without default, or an event stream.
    fn must_be_set(&self) -> bool {
        self.stream.is_some() || (self.member.traits.required && self.member.traits.default.is_none())
    }
}

fn slots<'a>(ctx: &GenContext<'_>, shape: &Shape, members: &'a [Member]) -> Result<Vec<Slot<'a>>> {
    let public = ctx.symbols(SymbolMode::Public);
    let unconstrained = ctx.symbols(SymbolMode::Unconstrained);
    let constrained = ctx.symbols(SymbolMode::Constrained);
    members
        .iter()
        .map(|member| {
            let target = ctx.model.target(member)?;
            let stream = if target.is_event_stream() {
                Some(ctx.stream_type(&shape.id, member)?)
            } else {
                None
            };
            let (public_type, unconstrained_type, constrained_type) = if stream.is_some() {
                (String::new(), String::new(), String::new())
            } else {
                (
                    public.to_symbol(target)?.render(),
                    unconstrained.to_symbol(target)?.render(),
                    constrained.to_symbol(target)?.render(),
                )
            };
            Ok(Slot {
                member,
                field: field_name(member),
                setter: setter_name(member),
                variant: pascal(&member.name),
                constrained: stream.is_none() && ctx.is_constrained(&target.id),
                stream,
                boxed: member.traits.boxed,
                public: public_type,
                unconstrained: unconstrained_type,
                constrained_type,
                to_public: ctx.constrained_to_public(target),
                nested_violation: violation_type(ctx, &target.id),
            })
        })
        .collect()
}

/// Whether `build` can fail, decided from the model alone.
pub fn build_is_fallible(ctx: &GenContext<'_>, shape: &Shape) -> bool {
    if ctx.is_server() {
        return ctx.is_constrained(&shape.id);
    }
    shape.members().into_iter().any(|member| {
        (member.traits.required && member.traits.default.is_none()) || ctx.is_streaming_member(member)
    })
}

/// Renders a `@default` literal as an expression of the unconstrained type of
/// `target` (which equals the public type for unconstrained targets).
pub fn default_literal(ctx: &GenContext<'_>, member: &Member, target: &Shape, value: &Value) -> Result<String> {
    let rt = ctx.rt();
    let unsupported = || {
        CodegenError::invalid_trait(
            &target.id,
            "smithy.api#default",
            format!("default `{value}` of member `{}` cannot be rendered", member.name),
        )
    };
    Ok(match (&target.kind, value) {
        (ShapeKind::String, Value::String(text)) => format!("::std::string::String::from({})", string_literal(text)),
        (ShapeKind::Enum { .. }, Value::String(text)) if ctx.is_server() => {
            format!("::std::string::String::from({})", string_literal(text))
        }
        (ShapeKind::Enum { .. }, Value::String(text)) => {
            format!("{}::from({})", ctx.named_type(&target.id), string_literal(text))
        }
        (ShapeKind::Boolean, Value::Bool(flag)) => flag.to_string(),
        (ShapeKind::Number(kind), Value::Number(number)) => {
            let number = number.as_f64().ok_or_else(unsupported)?;
            let literal = crate::constraint::bound_literal(number, kind.is_integer());
            format!("{literal}_{}", ctx.symbols(SymbolMode::Unconstrained).newtype_inner(target)?)
        }
        (ShapeKind::Blob, Value::String(encoded)) => {
            let bytes = STANDARD.decode(encoded).map_err(|err| {
                CodegenError::invalid_trait(
                    &target.id,
                    "smithy.api#default",
                    format!("default of member `{}` is not valid base64: {err}", member.name),
                )
            })?;
            format!("{rt}::Blob::new({})", byte_vec_literal(&bytes))
        }
        (ShapeKind::Timestamp, Value::Number(seconds)) => {
            format!("{rt}::DateTime::from_secs_f64({:?})", seconds.as_f64().ok_or_else(unsupported)?)
        }
        (ShapeKind::Document, Value::Null) => format!("{rt}::Document::Null"),
        (ShapeKind::Document, Value::Bool(flag)) => format!("{rt}::Document::Bool({flag})"),
        (ShapeKind::Document, Value::String(text)) => {
            format!("{rt}::Document::String(::std::string::String::from({}))", string_literal(text))
        }
        (ShapeKind::List { .. }, Value::Array(items)) if items.is_empty() => "::std::vec::Vec::new()".to_string(),
        (ShapeKind::Map { .. }, Value::Object(entries)) if entries.is_empty() => {
            "::std::collections::HashMap::new()".to_string()
        }
        _ => return Err(unsupported()),
    })
}

fn byte_vec_literal(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "::std::vec::Vec::<u8>::new()".to_string();
    }
    let items: Vec<String> = bytes.iter().map(|byte| format!("{byte}u8")).collect();
    format!("::std::vec![{}]", items.join(", "))
}

fn slot_type(ctx: &GenContext<'_>, slot: &Slot<'_>) -> String {
    let inner = if let Some(stream) = &slot.stream {
        stream.clone()
    } else if slot.constrained {
        format!("{}::constrained::MaybeConstrained<{}>", ctx.root(), slot.constrained_type)
    } else {
        slot.public.clone()
    };
    if slot.boxed {
        format!("::std::option::Option<::std::boxed::Box<{inner}>>")
    } else {
        format!("::std::option::Option<{inner}>")
    }
}

fn boxed(slot: &Slot<'_>, expr: String) -> String {
    if slot.boxed {
        format!("::std::boxed::Box::new({expr})")
    } else {
        expr
    }
}

/// Renders the builder into the shape's submodule and the `builder()`
/// constructor plus conversions into the `model` module.
pub fn render(ctx: &GenContext<'_>, shape: &Shape, top: &mut RustWriter, inner: &mut RustWriter) -> Result<()> {
    let ShapeKind::Structure { members } = &shape.kind else {
        return Err(CodegenError::unsupported(&shape.id, "builders are generated for structures only"));
    };
    let slots = slots(ctx, shape, members)?;
    let name = type_name(&shape.id);
    let module = module_name(&shape.id);
    let structure = ctx.named_type(&shape.id);
    let fallible = build_is_fallible(ctx, shape);
    let server = ctx.is_server();
    let streaming = slots.iter().any(|slot| slot.stream.is_some());
    let maybe = format!("{}::constrained::MaybeConstrained", ctx.root());

    top.block(&format!("impl {name}"), |w| {
        wln!(w, "/// Creates a new builder-style object to manufacture [`{name}`].")?;
        wln!(w, "pub fn builder() -> {module}::Builder {{")?;
        wln!(w, "    {module}::Builder::default()")?;
        wln!(w, "}}")?;
        Ok(())
    })?;
    wln!(top)?;
    if server && fallible {
        top.block(&format!("impl {}::constrained::Constrained for {name}", ctx.root()), |w| {
            wln!(w, "type Unconstrained = {module}::Builder;")?;
            Ok(())
        })?;
        wln!(top)?;
        top.block(&format!("impl ::std::convert::TryFrom<{module}::Builder> for {name}"), |w| {
            wln!(w, "type Error = {module}::ConstraintViolation;")?;
            wln!(w)?;
            w.block(
                &format!("fn try_from(builder: {module}::Builder) -> ::std::result::Result<Self, Self::Error>"),
                |w| {
                    wln!(w, "builder.build()")?;
                    Ok(())
                },
            )
        })?;
        wln!(top)?;
    }

    // -------------------- builder type --------------------

    wln!(inner, "/// A builder for [`{name}`]({structure}).")?;
    if streaming {
        wln!(inner, "#[derive(Debug, Default)]")?;
    } else {
        wln!(inner, "#[derive(Debug, Clone, Default)]")?;
    }
    inner.block("pub struct Builder", |w| {
        for slot in &slots {
            wln!(w, "pub(crate) {}: {},", slot.field, slot_type(ctx, slot))?;
        }
        Ok(())
    })?;
    wln!(inner)?;

    inner.block("impl Builder", |w| {
        for slot in &slots {
            render_methods(ctx, slot, &maybe, w)?;
        }
        render_build(ctx, shape, &slots, fallible, &maybe, w)
    })?;
    wln!(inner)?;

    if fallible {
        render_violation(shape, &slots, inner)?;
    }
    Ok(())
}

fn render_methods(ctx: &GenContext<'_>, slot: &Slot<'_>, maybe: &str, w: &mut RustWriter) -> Result<()> {
    let field = &slot.field;
    let setter = &slot.setter;
    let server = ctx.is_server();
    w.docs(slot.member.traits.documentation.as_deref())?;

    if let Some(stream) = &slot.stream {
        wln!(w, "pub fn {field}(mut self, input: {stream}) -> Self {{")?;
        wln!(w, "    self.{field} = Some({});", boxed(slot, "input".into()))?;
        wln!(w, "    self")?;
        wln!(w, "}}")?;
        wln!(w)?;
        wln!(w, "pub fn {setter}(mut self, input: ::std::option::Option<{stream}>) -> Self {{")?;
        wln!(w, "    self.{field} = input;")?;
        wln!(w, "    self")?;
        wln!(w, "}}")?;
        wln!(w)?;
        return Ok(());
    }

    if !slot.constrained {
        let public = &slot.public;
        wln!(w, "pub fn {field}(mut self, input: {public}) -> Self {{")?;
        wln!(w, "    self.{field} = Some({});", boxed(slot, "input".into()))?;
        wln!(w, "    self")?;
        wln!(w, "}}")?;
        wln!(w)?;
        let visibility = if server { "pub(crate)" } else { "pub" };
        let store = if slot.boxed { "input.map(::std::boxed::Box::new)" } else { "input" };
        wln!(w, "{visibility} fn {setter}(mut self, input: ::std::option::Option<{public}>) -> Self {{")?;
        wln!(w, "    self.{field} = {store};")?;
        wln!(w, "    self")?;
        wln!(w, "}}")?;
        wln!(w)?;
        return Ok(());
    }

    // Constrained slot. With public constrained types the method takes the
    // already-validated public value; otherwise it takes the raw value and
    // `build` validates it.
    let (parameter, stored) = if ctx.settings.public_constrained_types {
        let stored = if slot.public == slot.constrained_type {
            format!("{maybe}::Constrained(input)")
        } else {
            format!("{maybe}::Constrained({}(input))", slot.constrained_type)
        };
        (slot.public.clone(), stored)
    } else {
        (slot.unconstrained.clone(), format!("{maybe}::Unconstrained(input)"))
    };
    wln!(w, "pub fn {field}(mut self, input: {parameter}) -> Self {{")?;
    wln!(w, "    self.{field} = Some({});", boxed(slot, stored))?;
    wln!(w, "    self")?;
    wln!(w, "}}")?;
    wln!(w)?;
    let unconstrained = &slot.unconstrained;
    let store = boxed(slot, format!("{maybe}::Unconstrained(input)"));
    wln!(
        w,
        "pub(crate) fn {setter}(mut self, input: ::std::option::Option<{unconstrained}>) -> Self {{"
    )?;
    wln!(w, "    self.{field} = input.map(|input| {store});")?;
    wln!(w, "    self")?;
    wln!(w, "}}")?;
    wln!(w)?;
    Ok(())
}

/// Initializer expression of one structure field inside `build`.
fn field_initializer(ctx: &GenContext<'_>, slot: &Slot<'_>, maybe: &str) -> Result<String> {
    let field = &slot.field;
    let missing = format!("ConstraintViolation::{}", slot.missing_variant());
    let default = slot.member.traits.default.as_ref();
    let target = ctx.model.target(slot.member)?;

    if !slot.constrained {
        return Ok(if let Some(value) = default {
            let literal = boxed(slot, default_literal(ctx, slot.member, target, value)?);
            format!("self.{field}.unwrap_or_else(|| {literal})")
        } else if slot.must_be_set() {
            format!("self.{field}.ok_or({missing})?")
        } else {
            format!("self.{field}")
        });
    }

    let variant = format!("ConstraintViolation::{}", slot.variant);
    let convert = |value: &str| {
        if slot.boxed {
            format!("(*{value}).into_constrained().map_err(|err| {variant}(::std::boxed::Box::new(err)))")
        } else {
            format!("{value}.into_constrained().map_err({variant})")
        }
    };
    let to_public = |value: String| boxed(slot, format!("{value}{}", slot.to_public));

    Ok(if let Some(value) = default {
        let literal = boxed(
            slot,
            format!("{maybe}::Unconstrained({})", default_literal(ctx, slot.member, target, value)?),
        );
        to_public(format!("{}?", convert(&format!("self.{field}.unwrap_or_else(|| {literal})"))))
    } else if slot.must_be_set() {
        to_public(format!("{}?", convert(&format!("self.{field}.ok_or({missing})?"))))
    } else {
        let mapped = to_public("value".to_string());
        let tail = if mapped == "value" { String::new() } else { format!("\n    .map(|value| {mapped})") };
        format!(
            "self.{field}\n    .map(|value| {})\n    .transpose()?{tail}",
            convert("value")
        )
    })
}

fn render_build(
    ctx: &GenContext<'_>,
    shape: &Shape,
    slots: &[Slot<'_>],
    fallible: bool,
    maybe: &str,
    w: &mut RustWriter,
) -> Result<()> {
    let structure = ctx.named_type(&shape.id);
    wln!(w, "/// Consumes the builder and constructs a [`{}`]({structure}).", type_name(&shape.id))?;
    if fallible {
        wln!(w, "///")?;
        wln!(w, "/// Members are checked in declaration order; the first violation is returned.")?;
    }
    let signature = if fallible {
        format!("pub fn build(self) -> ::std::result::Result<{structure}, ConstraintViolation>")
    } else {
        format!("pub fn build(self) -> {structure}")
    };
    w.block(&signature, |w| {
        let open = if fallible { format!("Ok({structure} {{") } else { format!("{structure} {{") };
        let close = if fallible { "})" } else { "}" };
        wln!(w, "{open}")?;
        {
            let _indent = w.indent();
            for slot in slots {
                let initializer = field_initializer(ctx, slot, maybe)?;
                wln!(w, "{}: {initializer},", slot.field)?;
            }
        }
        wln!(w, "{close}")?;
        Ok(())
    })
}

fn render_violation(shape: &Shape, slots: &[Slot<'_>], inner: &mut RustWriter) -> Result<()> {
    let name = type_name(&shape.id);
    let mut variants = Vec::new();
    let mut arms = Vec::new();
    for slot in slots {
        if slot.must_be_set() {
            variants.push(format!(
                "/// `{}` was not provided but it is required when building `{name}`.\n{},",
                slot.member.name,
                slot.missing_variant()
            ));
            arms.push(format!(
                "Self::{} => f.write_str(\"`{}` was not provided but it is required when building `{name}`\"),",
                slot.missing_variant(),
                slot.member.name
            ));
        }
        if slot.constrained {
            let nested = if slot.boxed {
                format!("::std::boxed::Box<{}>", slot.nested_violation)
            } else {
                slot.nested_violation.clone()
            };
            variants.push(format!("{}({nested}),", slot.variant));
            arms.push(format!(
                "Self::{}(violation) => write!(f, \"`{}`: {{}}\", violation),",
                slot.variant, slot.member.name
            ));
        }
    }
    wln!(inner, "#[derive(Debug, Clone, PartialEq)]")?;
    inner.block("pub enum ConstraintViolation", |w| {
        for variant in &variants {
            w.writeln(variant)?;
        }
        Ok(())
    })?;
    wln!(inner)?;
    crate::constraint::render_violation_display(inner, &arms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodegenSettings;
    use crate::model::{Model, ShapeId, load, transform};

    const MODEL: &str = r#"{"smithy": "2.0", "shapes": {
        "t#Name": { "type": "string", "traits": { "smithy.api#length": { "min": 1, "max": 3 } } },
        "t#Kind": { "type": "enum", "members": {
            "ALPHA": { "target": "smithy.api#Unit", "traits": { "smithy.api#enumValue": "alpha" } }
        }},
        "t#Record": { "type": "structure", "members": {
            "id": { "target": "smithy.api#String", "traits": { "smithy.api#required": {} } },
            "name": { "target": "t#Name" },
            "count": { "target": "smithy.api#Integer", "traits": { "smithy.api#default": 0 } },
            "kind": { "target": "t#Kind", "traits": { "smithy.api#default": "alpha" } }
        }},
        "t#Linked": { "type": "structure", "members": {
            "next": { "target": "t#Linked" },
            "id": { "target": "smithy.api#String", "traits": { "smithy.api#required": {} } }
        }},
        "t#Loose": { "type": "structure", "members": {
            "note": { "target": "smithy.api#String" }
        }}
    }}"#;

    fn render_for(settings: &CodegenSettings, shape: &str) -> (String, String) {
        let mut model = load::from_str(MODEL).unwrap();
        transform::run_all(&mut model).unwrap();
        let ctx = GenContext::new(&model, settings).unwrap();
        let (mut top, mut inner) = (RustWriter::new(), RustWriter::new());
        render(&ctx, model.get(&ShapeId::new(shape)).unwrap(), &mut top, &mut inner).unwrap();
        (top.as_str().to_string(), inner.as_str().to_string())
    }

    #[test]
    fn server_build_checks_members_in_declaration_order() {
        let (top, inner) = render_for(&CodegenSettings::server(true), "t#Record");
        assert!(top.contains("impl ::std::convert::TryFrom<record::Builder> for Record"), "{top}");
        let id = inner.find("id: self.id.ok_or(ConstraintViolation::MissingId)?,").unwrap();
        let name = inner.find("name: self.name").unwrap();
        let count = inner.find("count: self.count.unwrap_or_else(|| 0_i32),").unwrap();
        let kind = inner.find("kind: self.kind.unwrap_or_else(").unwrap();
        assert!(id < name && name < count && count < kind, "{inner}");
        assert!(inner.contains("Name(crate::model::name::ConstraintViolation),"), "{inner}");
        assert!(inner.contains("MissingId,"), "{inner}");
        assert!(
            inner.contains("crate::constrained::MaybeConstrained::Unconstrained(::std::string::String::from(\"alpha\"))"),
            "{inner}"
        );
    }

    #[test]
    fn public_constrained_types_shape_the_builder_api() {
        let (_, inner) = render_for(&CodegenSettings::server(true), "t#Record");
        assert!(inner.contains("pub fn name(mut self, input: crate::model::Name) -> Self {"), "{inner}");
        assert!(inner.contains("pub(crate) fn set_name(mut self, input: ::std::option::Option<::std::string::String>)"));

        let (_, inner) = render_for(&CodegenSettings::server(false), "t#Record");
        assert!(inner.contains("pub fn name(mut self, input: ::std::string::String) -> Self {"), "{inner}");
        assert!(inner.contains(".map(|value| value.into_inner())"), "{inner}");
    }

    #[test]
    fn boxed_members_box_their_slot() {
        let (_, inner) = render_for(&CodegenSettings::server(true), "t#Linked");
        assert!(
            inner.contains(
                "pub(crate) next: ::std::option::Option<::std::boxed::Box<crate::constrained::MaybeConstrained<crate::model::Linked>>>,"
            ),
            "{inner}"
        );
        assert!(inner.contains("(*value).into_constrained()"), "{inner}");
        assert!(inner.contains("Next(::std::boxed::Box<crate::model::linked::ConstraintViolation>),"), "{inner}");
    }

    #[test]
    fn unconstrained_structures_build_infallibly() {
        let (top, inner) = render_for(&CodegenSettings::server(true), "t#Loose");
        assert!(inner.contains("pub fn build(self) -> crate::model::Loose {"), "{inner}");
        assert!(!inner.contains("enum ConstraintViolation"), "{inner}");
        assert!(!top.contains("TryFrom"), "{top}");
    }

    #[test]
    fn client_builders_only_fail_on_missing_members() {
        let (_, inner) = render_for(&CodegenSettings::client(), "t#Record");
        assert!(inner.contains("pub fn set_name(mut self, input: ::std::option::Option<::std::string::String>)"));
        assert!(inner.contains("MissingId,"), "{inner}");
        assert!(!inner.contains("MaybeConstrained"), "{inner}");
        assert!(inner.contains("kind: self.kind.unwrap_or_else(|| crate::model::Kind::from(\"alpha\")),"), "{inner}");
    }

    fn blob_default_model(encoded: &str) -> Model {
        let mut model = load::from_str(&format!(
            r#"{{"smithy": "2.0", "shapes": {{
                "t#Thumbnail": {{ "type": "structure", "members": {{
                    "data": {{ "target": "smithy.api#Blob", "traits": {{ "smithy.api#default": "{encoded}" }} }}
                }}}}
            }}}}"#
        ))
        .unwrap();
        transform::run_all(&mut model).unwrap();
        model
    }

    #[test]
    fn blob_defaults_are_decoded_while_generating() {
        let model = blob_default_model("aGk=");
        let settings = CodegenSettings::client();
        let ctx = GenContext::new(&model, &settings).unwrap();
        let (mut top, mut inner) = (RustWriter::new(), RustWriter::new());
        render(&ctx, model.get(&ShapeId::new("t#Thumbnail")).unwrap(), &mut top, &mut inner).unwrap();
        assert!(
            inner.as_str().contains("::shapegen_runtime::Blob::new(::std::vec![104u8, 105u8])"),
            "{}",
            inner.as_str()
        );
    }

    #[test]
    fn invalid_blob_defaults_are_rejected() {
        let model = blob_default_model("***");
        let settings = CodegenSettings::client();
        let ctx = GenContext::new(&model, &settings).unwrap();
        let (mut top, mut inner) = (RustWriter::new(), RustWriter::new());
        let error = render(&ctx, model.get(&ShapeId::new("t#Thumbnail")).unwrap(), &mut top, &mut inner).unwrap_err();
        assert!(matches!(error, CodegenError::InvalidTrait { .. }), "{error}");
        assert!(error.to_string().contains("not valid base64"), "{error}");
    }
}
