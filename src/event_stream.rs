//! Event-stream message (un)marshallers.
//!
//! Each `@streaming` union gets three types in the `event_stream_serde`
//! module:
//!
//! * `<Union>Unmarshaller`, turning runtime messages into union events or
//!   modeled errors;
//! * `<Union>Marshaller`, the dual used by the sending half of a stream;
//! * `<Union>ErrorMarshaller`, turning `<Union>Error` back into exception
//!   messages.
//!
//! Event bodies reuse the JSON functions of the shared serializer and
//! deserializer generators.

use crate::builder::build_is_fallible;
use crate::context::GenContext;
use crate::deserializer::DeserializerGenerator;
use crate::error::{CodegenError, Result};
use crate::model::{Member, NumberKind, Shape, ShapeKind};
use crate::serializer::SerializerGenerator;
use crate::structure::{error_members, event_members};
use crate::symbol::{field_name, pascal, setter_name, type_name, unknown_variant};
use crate::writer::{Dependency, Fragment, RustWriter, string_literal};
use crate::wln;

/// Renders the (un)marshallers of every user event-stream union.
pub fn render_all(
    ctx: &GenContext<'_>,
    ser: &mut SerializerGenerator<'_, '_>,
    de: &mut DeserializerGenerator<'_, '_>,
) -> Result<Fragment> {
    let mut w = RustWriter::new();
    for shape in ctx.model.user_shapes().filter(|shape| shape.is_event_stream()) {
        tracing::debug!(shape = %shape.id, "generating event stream marshallers");
        render_unmarshaller(ctx, shape, de, &mut w)?;
        wln!(w)?;
        render_marshaller(ctx, shape, ser, &mut w)?;
        wln!(w)?;
        render_error_marshaller(ctx, shape, ser, &mut w)?;
        wln!(w)?;
        w.depends_on(Dependency::Runtime);
        w.depends_on(Dependency::Http);
    }
    Ok(w.into_fragment("event_stream_serde"))
}

fn unit_struct(w: &mut RustWriter, name: &str, docs: &str) -> Result<()> {
    wln!(w, "/// {docs}")?;
    wln!(w, "#[non_exhaustive]")?;
    wln!(w, "#[derive(Debug, Clone, Copy, Default)]")?;
    wln!(w, "pub struct {name};")?;
    wln!(w)?;
    w.block(&format!("impl {name}"), |w| {
        w.block("pub fn new() -> Self", |w| Ok(wln!(w, "{name}")?))
    })?;
    wln!(w)?;
    Ok(())
}

/// The event structure behind a union member.
fn event_structure<'m>(ctx: &GenContext<'m>, member: &Member) -> Result<&'m Shape> {
    let target = ctx.model.target(member)?;
    if !target.is_structure() {
        return Err(CodegenError::unsupported(
            &target.id,
            "event stream members must target structures",
        ));
    }
    Ok(target)
}

fn build_expr(ctx: &GenContext<'_>, shape: &Shape, what: &str) -> String {
    if build_is_fallible(ctx, shape) {
        format!(
            "builder\n    .build()\n    .map_err(|err| {}::event_stream::EventStreamError::unmarshalling(::std::format!(\"invalid {what}: {{}}\", err)))?",
            ctx.rt()
        )
    } else {
        "builder.build()".to_string()
    }
}

fn unmarshalling_err(rt: &str, what: &str) -> String {
    format!(".map_err(|err| {rt}::event_stream::EventStreamError::unmarshalling(::std::format!(\"failed to parse {what}: {{}}\", err)))?")
}

// ----------------------------- Unmarshaller ------------------------------ //

/// Expression reading an `@eventHeader` member's unconstrained value from
/// `header`.
fn header_read(ctx: &GenContext<'_>, member: &Member, target: &Shape) -> Result<String> {
    let rt = ctx.rt();
    let checked = |accessor: &str| {
        format!(
            "header.{accessor}().map_err(|found| {rt}::event_stream::EventStreamError::invalid_header_type({}, found))?",
            string_literal(&member.name)
        )
    };
    Ok(match &target.kind {
        ShapeKind::Boolean => checked("as_bool"),
        ShapeKind::Number(NumberKind::Byte) => checked("as_byte"),
        ShapeKind::Number(NumberKind::Short) => checked("as_int16"),
        ShapeKind::Number(NumberKind::Integer) => checked("as_int32"),
        ShapeKind::Number(NumberKind::Long) => checked("as_int64"),
        ShapeKind::String => format!("{}.to_string()", checked("as_string")),
        ShapeKind::Enum { .. } if ctx.is_server() => format!("{}.to_string()", checked("as_string")),
        ShapeKind::Enum { .. } => format!("{}::from({})", ctx.named_type(&target.id), checked("as_string")),
        ShapeKind::Blob => format!("{rt}::Blob::new({}.to_vec())", checked("as_byte_array")),
        ShapeKind::Timestamp => checked("as_timestamp"),
        _ => {
            return Err(CodegenError::unsupported(
                &target.id,
                format!("`{}` cannot be carried in an event header", target.kind_name()),
            ));
        }
    })
}

/// Expression reading an `@eventPayload` member from the raw payload, of
/// type `Option<unconstrained>`.
fn payload_read(ctx: &GenContext<'_>, de: &mut DeserializerGenerator<'_, '_>, target: &Shape) -> Result<String> {
    let rt = ctx.rt();
    Ok(match &target.kind {
        ShapeKind::Blob => format!("Some({rt}::Blob::new(message.payload().to_vec()))"),
        ShapeKind::String => format!(
            "Some(::std::string::String::from_utf8(message.payload().to_vec()){})",
            unmarshalling_err(rt, "event payload as UTF-8")
        ),
        ShapeKind::Structure { .. } | ShapeKind::Union { .. } => {
            let document = de.document_fn(target)?;
            format!("{}(message.payload()){}", de.path(&document), unmarshalling_err(rt, "event payload"))
        }
        _ => {
            return Err(CodegenError::unsupported(
                &target.id,
                format!("`{}` cannot be an event payload", target.kind_name()),
            ));
        }
    })
}

/// Statements filling `builder` from `message` for one event or error
/// structure.
fn read_structure(
    ctx: &GenContext<'_>,
    de: &mut DeserializerGenerator<'_, '_>,
    structure: &Shape,
    w: &mut RustWriter,
) -> Result<()> {
    let rt = ctx.rt().to_string();
    let members = structure.members();
    let payload = members.iter().find(|member| member.traits.event_payload);
    let mut body = Vec::new();
    for member in &members {
        let target = ctx.model.target(member)?;
        if member.traits.event_header {
            let read = header_read(ctx, member, target)?;
            w.block(
                &format!("if let Some(header) = message.header({})", string_literal(&member.name)),
                |w| Ok(wln!(w, "builder = builder.{}(Some({read}));", setter_name(member))?),
            )?;
        } else if !member.traits.event_payload {
            body.push(*member);
        }
    }
    match payload {
        Some(member) => {
            let read = payload_read(ctx, de, ctx.model.target(member)?)?;
            wln!(w, "builder = builder.{}({read});", setter_name(member))?;
        }
        None => {
            let function = de.body_fn(structure, &body)?;
            wln!(
                w,
                "builder = {}(message.payload(), builder){};",
                de.path(&function),
                unmarshalling_err(&rt, &format!("`{}` payload", structure.id.name()))
            )?;
        }
    }
    Ok(())
}

fn render_unmarshaller(
    ctx: &GenContext<'_>,
    shape: &Shape,
    de: &mut DeserializerGenerator<'_, '_>,
    w: &mut RustWriter,
) -> Result<()> {
    let rt = ctx.rt().to_string();
    let name = type_name(&shape.id);
    let union = ctx.named_type(&shape.id);
    let error = format!("{}::error::{name}Error", ctx.root());
    let unmarshaller = format!("{name}Unmarshaller");
    let events = event_members(shape, ctx)?;
    let errors = error_members(shape, ctx)?;

    let mut event_arms = Vec::new();
    for member in &events {
        let structure = event_structure(ctx, member)?;
        let mut arm = RustWriter::new();
        arm.block(&format!("{} =>", string_literal(&member.name)), |w| {
            wln!(w, "let mut builder = {}::Builder::default();", ctx.shape_module(&structure.id))?;
            read_structure(ctx, de, structure, w)?;
            wln!(w, "let value = {};", build_expr(ctx, structure, &format!("`{}` event", member.name)))?;
            let value = if member.traits.boxed { "::std::boxed::Box::new(value)" } else { "value" };
            wln!(
                w,
                "Ok({rt}::event_stream::UnmarshalledMessage::Event({union}::{}({value})))",
                pascal(&member.name)
            )?;
            Ok(())
        })?;
        event_arms.push(arm.as_str().to_string());
    }

    let mut error_arms = Vec::new();
    for member in &errors {
        let structure = ctx.model.target(member)?;
        let mut arm = RustWriter::new();
        arm.block(&format!("{} =>", string_literal(&member.name)), |w| {
            wln!(w, "let mut builder = {}::Builder::default();", ctx.shape_module(&structure.id))?;
            read_structure(ctx, de, structure, w)?;
            wln!(w, "let value = {};", build_expr(ctx, structure, &format!("`{}` exception", member.name)))?;
            wln!(
                w,
                "return Ok({rt}::event_stream::UnmarshalledMessage::Error({error}::{}(value)));",
                pascal(&member.name)
            )?;
            Ok(())
        })?;
        error_arms.push(arm.as_str().to_string());
    }

    unit_struct(w, &unmarshaller, &format!("Reads `{}` events from event-stream messages.", shape.id.name()))?;
    w.block(
        &format!("impl {rt}::event_stream::UnmarshallMessage for {unmarshaller}"),
        |w| {
            wln!(w, "type Output = {union};")?;
            wln!(w, "type Error = {error};")?;
            wln!(w)?;
            w.block(
                &format!(
                    "fn unmarshall(&self, message: &{rt}::event_stream::Message) -> ::std::result::Result<{rt}::event_stream::UnmarshalledMessage<Self::Output, Self::Error>, {rt}::event_stream::EventStreamError>"
                ),
                |w| {
                    wln!(w, "let response_headers = {rt}::event_stream::parse_response_headers(message)?;")?;
                    w.block("match response_headers.message_type", |w| {
                        w.block_with("\"event\" => match response_headers.smithy_type", "},", |w| {
                            for arm in &event_arms {
                                w.write_code(arm)?;
                            }
                            if ctx.is_server() {
                                wln!(
                                    w,
                                    "unknown => Err({rt}::event_stream::EventStreamError::unmarshalling(::std::format!(\"unrecognized event type `{{}}`\", unknown))),"
                                )?;
                            } else {
                                let unknown = unknown_variant(events.iter().map(|member| member.name.as_str()));
                                wln!(w, "_ => Ok({rt}::event_stream::UnmarshalledMessage::Event({union}::{unknown})),")?;
                            }
                            Ok(())
                        })?;
                        w.block("\"exception\" =>", |w| {
                            if !error_arms.is_empty() {
                                w.block("match response_headers.smithy_type", |w| {
                                    for arm in &error_arms {
                                        w.write_code(arm)?;
                                    }
                                    wln!(w, "_ => {{}}")?;
                                    Ok(())
                                })?;
                            }
                            wln!(
                                w,
                                "let generic = {rt}::json::errors::parse_error_metadata(message.payload(), &::http::HeaderMap::new()){};",
                                unmarshalling_err(&rt, "exception")
                            )?;
                            wln!(w, "let meta = {rt}::error::ErrorMetadata::new(")?;
                            wln!(w, "    Some(response_headers.smithy_type.to_string()),")?;
                            wln!(w, "    generic.message().map(::std::string::ToString::to_string),")?;
                            wln!(w, ");")?;
                            wln!(w, "Ok({rt}::event_stream::UnmarshalledMessage::Error({error}::generic(meta)))")?;
                            Ok(())
                        })?;
                        wln!(
                            w,
                            "other => Err({rt}::event_stream::EventStreamError::unmarshalling(::std::format!(\"unrecognized message type `{{}}` ({{}})\", other, response_headers.smithy_type))),"
                        )?;
                        Ok(())
                    })
                },
            )
        },
    )?;
    Ok(())
}

// ------------------------------ Marshallers ------------------------------ //

/// `HeaderValue` expression for a header member, given `value: &T` of the
/// member's public type.
fn header_write(ctx: &GenContext<'_>, target: &Shape) -> Result<String> {
    let rt = ctx.rt();
    let newtype = ctx.has_public_newtype(target);
    let value = if newtype { "value.inner()" } else { "value" };
    Ok(match &target.kind {
        ShapeKind::Boolean => format!("{rt}::event_stream::HeaderValue::Bool(*value)"),
        ShapeKind::Number(kind) => {
            let variant = match kind {
                NumberKind::Byte => "Byte",
                NumberKind::Short => "Int16",
                NumberKind::Integer => "Int32",
                NumberKind::Long => "Int64",
                _ => return Err(CodegenError::unsupported(&target.id, "event headers carry integers only")),
            };
            format!("{rt}::event_stream::HeaderValue::{variant}(*{value})")
        }
        ShapeKind::String if newtype => format!("{rt}::event_stream::HeaderValue::String(value.as_str().to_string())"),
        ShapeKind::String => format!("{rt}::event_stream::HeaderValue::String(value.clone())"),
        ShapeKind::Enum { .. } => format!("{rt}::event_stream::HeaderValue::String(value.as_str().to_string())"),
        ShapeKind::Blob => format!("{rt}::event_stream::HeaderValue::ByteArray({value}.clone().into_inner())"),
        ShapeKind::Timestamp => format!("{rt}::event_stream::HeaderValue::Timestamp(*value)"),
        _ => {
            return Err(CodegenError::unsupported(
                &target.id,
                format!("`{}` cannot be carried in an event header", target.kind_name()),
            ));
        }
    })
}

/// A block expression serializing `input` with a structure or union
/// serializer into JSON bytes.
fn json_bytes(rt: &str, function: &str, input: &str) -> String {
    format!(
        "{{\n    let mut out = ::std::string::String::new();\n    let mut object = {rt}::json::JsonObjectWriter::new(&mut out);\n    {function}(&mut object, {input});\n    object.finish();\n    out.into_bytes()\n}}"
    )
}

fn header_line(rt: &str, name: &str, value: &str) -> String {
    format!(
        ".add_header({rt}::event_stream::Header::new({rt}::event_stream::{name}, {rt}::event_stream::HeaderValue::String({}.into())))",
        string_literal(value)
    )
}

/// Statements binding `payload` and the content type for a structure held
/// in `inner`.
fn write_structure_payload(
    ctx: &GenContext<'_>,
    ser: &mut SerializerGenerator<'_, '_>,
    structure: &Shape,
    w: &mut RustWriter,
) -> Result<&'static str> {
    let rt = ctx.rt().to_string();
    let members = structure.members();
    let Some(member) = members.iter().find(|member| member.traits.event_payload) else {
        let body: Vec<&Member> = members
            .iter()
            .copied()
            .filter(|member| !member.traits.event_header)
            .collect();
        let function = ser.body_fn(structure, &body)?;
        wln!(w, "let payload = {};", json_bytes(&rt, &ser.path(&function), "&inner"))?;
        return Ok("application/json");
    };
    let target = ctx.model.target(member)?;
    let newtype = ctx.has_public_newtype(target);
    let (bytes, content_type) = match &target.kind {
        ShapeKind::Blob if newtype => ("value.inner().clone().into_inner()".to_string(), "application/octet-stream"),
        ShapeKind::Blob => ("value.clone().into_inner()".to_string(), "application/octet-stream"),
        ShapeKind::String if newtype => ("value.as_str().as_bytes().to_vec()".to_string(), "text/plain"),
        ShapeKind::String => ("value.as_bytes().to_vec()".to_string(), "text/plain"),
        ShapeKind::Structure { .. } | ShapeKind::Union { .. } => {
            let function = ser.shape_fn(target)?;
            (json_bytes(&rt, &ser.path(&function), "value"), "application/json")
        }
        _ => {
            return Err(CodegenError::unsupported(
                &target.id,
                format!("`{}` cannot be an event payload", target.kind_name()),
            ));
        }
    };
    let field = field_name(member);
    if member.is_optional() {
        w.block_with(&format!("let payload = match &inner.{field}"), "};", |w| {
            w.block_with("Some(value) =>", "}", |w| Ok(w.write_code(&bytes)?))?;
            wln!(w, "None => ::std::vec::Vec::new(),")?;
            Ok(())
        })?;
    } else {
        wln!(w, "let value = &inner.{field};")?;
        wln!(w, "let payload = {bytes};")?;
    }
    Ok(content_type)
}

fn write_headers(ctx: &GenContext<'_>, structure: &Shape, w: &mut RustWriter) -> Result<()> {
    let rt = ctx.rt().to_string();
    for member in structure.members() {
        if !member.traits.event_header {
            continue;
        }
        let header = header_write(ctx, ctx.model.target(member)?)?;
        let add = format!(
            "message = message.add_header({rt}::event_stream::Header::new({}, {header}));",
            string_literal(&member.name)
        );
        let field = field_name(member);
        if member.is_optional() {
            w.block(&format!("if let Some(value) = &inner.{field}"), |w| Ok(w.writeln(&add)?))?;
        } else {
            wln!(w, "{{")?;
            {
                let _indent = w.indent();
                wln!(w, "let value = &inner.{field};")?;
                w.writeln(&add)?;
            }
            wln!(w, "}}")?;
        }
    }
    Ok(())
}

fn render_marshaller(
    ctx: &GenContext<'_>,
    shape: &Shape,
    ser: &mut SerializerGenerator<'_, '_>,
    w: &mut RustWriter,
) -> Result<()> {
    let rt = ctx.rt().to_string();
    let name = type_name(&shape.id);
    let union = ctx.named_type(&shape.id);
    let marshaller = format!("{name}Marshaller");
    let events = event_members(shape, ctx)?;

    let mut arms = Vec::new();
    for member in &events {
        let structure = event_structure(ctx, member)?;
        let mut arm = RustWriter::new();
        arm.block(&format!("{union}::{}(inner) =>", pascal(&member.name)), |w| {
            let content_type = write_structure_payload(ctx, ser, structure, w)?;
            wln!(w, "let mut message = {rt}::event_stream::Message::new(payload)")?;
            wln!(w, "    {}", header_line(&rt, "MESSAGE_TYPE", "event"))?;
            wln!(w, "    {}", header_line(&rt, "EVENT_TYPE", &member.name))?;
            wln!(w, "    {};", header_line(&rt, "CONTENT_TYPE", content_type))?;
            write_headers(ctx, structure, w)?;
            wln!(w, "Ok(message)")?;
            Ok(())
        })?;
        arms.push(arm.as_str().to_string());
    }

    unit_struct(w, &marshaller, &format!("Writes `{}` events as event-stream messages.", shape.id.name()))?;
    w.block(&format!("impl {rt}::event_stream::MarshallMessage for {marshaller}"), |w| {
        wln!(w, "type Input = {union};")?;
        wln!(w)?;
        w.block(
            &format!(
                "fn marshall(&self, input: Self::Input) -> ::std::result::Result<{rt}::event_stream::Message, {rt}::event_stream::EventStreamError>"
            ),
            |w| {
                w.block("match input", |w| {
                    for arm in &arms {
                        w.write_code(arm)?;
                    }
                    if !ctx.is_server() {
                        let unknown = unknown_variant(events.iter().map(|member| member.name.as_str()));
                        wln!(
                            w,
                            "{union}::{unknown} => Err({rt}::event_stream::EventStreamError::marshalling(\"cannot marshall an unknown event\")),"
                        )?;
                    }
                    Ok(())
                })
            },
        )
    })?;
    Ok(())
}

fn render_error_marshaller(
    ctx: &GenContext<'_>,
    shape: &Shape,
    ser: &mut SerializerGenerator<'_, '_>,
    w: &mut RustWriter,
) -> Result<()> {
    let rt = ctx.rt().to_string();
    let name = type_name(&shape.id);
    let error = format!("{}::error::{name}Error", ctx.root());
    let marshaller = format!("{name}ErrorMarshaller");

    let mut arms = Vec::new();
    for member in error_members(shape, ctx)? {
        let structure = ctx.model.target(&member)?;
        let function = ser.shape_fn(structure)?;
        let mut arm = RustWriter::new();
        arm.block(&format!("{error}::{}(inner) =>", pascal(&member.name)), |w| {
            wln!(w, "let payload = {};", json_bytes(&rt, &ser.path(&function), "&inner"))?;
            wln!(w, "Ok({rt}::event_stream::Message::new(payload)")?;
            wln!(w, "    {}", header_line(&rt, "MESSAGE_TYPE", "exception"))?;
            wln!(w, "    {}", header_line(&rt, "EXCEPTION_TYPE", &member.name))?;
            wln!(w, "    {})", header_line(&rt, "CONTENT_TYPE", "application/json"))?;
            Ok(())
        })?;
        arms.push(arm.as_str().to_string());
    }

    unit_struct(w, &marshaller, &format!("Writes `{}` errors as exception messages.", shape.id.name()))?;
    w.block(&format!("impl {rt}::event_stream::MarshallMessage for {marshaller}"), |w| {
        wln!(w, "type Input = {error};")?;
        wln!(w)?;
        w.block(
            &format!(
                "fn marshall(&self, input: Self::Input) -> ::std::result::Result<{rt}::event_stream::Message, {rt}::event_stream::EventStreamError>"
            ),
            |w| {
                w.block("match input", |w| {
                    for arm in &arms {
                        w.write_code(arm)?;
                    }
                    w.block(&format!("{error}::Unhandled(inner) =>"), |w| {
                        wln!(w, "let meta = inner.meta();")?;
                        wln!(w, "let mut message = {rt}::event_stream::Message::new(::std::vec::Vec::new())")?;
                        wln!(w, "    {}", header_line(&rt, "MESSAGE_TYPE", "error"))?;
                        wln!(
                            w,
                            "    .add_header({rt}::event_stream::Header::new({rt}::event_stream::ERROR_CODE, {rt}::event_stream::HeaderValue::String(meta.code().unwrap_or(\"Unhandled\").to_string())));"
                        )?;
                        w.block("if let Some(text) = meta.message()", |w| {
                            wln!(
                                w,
                                "message = message.add_header({rt}::event_stream::Header::new(\":error-message\", {rt}::event_stream::HeaderValue::String(text.to_string())));"
                            )?;
                            Ok(())
                        })?;
                        wln!(w, "Ok(message)")?;
                        Ok(())
                    })
                })
            },
        )
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodegenSettings;
    use crate::model::{Model, load, transform};

    const MODEL: &str = r#"{"smithy": "2.0", "shapes": {
        "t#Chat": { "type": "union", "traits": { "smithy.api#streaming": {} }, "members": {
            "message": { "target": "t#MessageEvent" },
            "audio": { "target": "t#AudioEvent" },
            "throttled": { "target": "t#Throttled" }
        }},
        "t#MessageEvent": { "type": "structure", "members": {
            "sender": { "target": "smithy.api#String", "traits": { "smithy.api#eventHeader": {} } },
            "text": { "target": "smithy.api#String" }
        }},
        "t#AudioEvent": { "type": "structure", "members": {
            "data": { "target": "smithy.api#Blob", "traits": { "smithy.api#eventPayload": {} } }
        }},
        "t#Throttled": { "type": "structure",
            "members": { "message": { "target": "smithy.api#String" } },
            "traits": { "smithy.api#error": "client" } }
    }}"#;

    fn model() -> Model {
        let mut model = load::from_str(MODEL).unwrap();
        transform::run_all(&mut model).unwrap();
        model
    }

    fn generate(settings: &CodegenSettings) -> String {
        let model = model();
        let ctx = GenContext::new(&model, settings).unwrap();
        let mut ser = SerializerGenerator::new(&ctx);
        let mut de = DeserializerGenerator::new(&ctx);
        render_all(&ctx, &mut ser, &mut de).unwrap().code
    }

    #[test]
    fn unmarshallers_read_headers_and_bodies() {
        let code = generate(&CodegenSettings::client());
        assert!(code.contains("pub struct ChatUnmarshaller;"), "{code}");
        assert!(code.contains("if let Some(header) = message.header(\"sender\")"), "{code}");
        assert!(code.contains("header.as_string()"), "{code}");
        assert!(code.contains("(message.payload(), builder)"), "{code}");
        assert!(code.contains("::shapegen_runtime::Blob::new(message.payload().to_vec())"), "{code}");
    }

    #[test]
    fn unknown_events_depend_on_the_target() {
        let client = generate(&CodegenSettings::client());
        assert!(client.contains("_ => Ok(::shapegen_runtime::event_stream::UnmarshalledMessage::Event(crate::model::Chat::Unknown)),"));
        assert!(!client.contains("unrecognized event type"));

        let server = generate(&CodegenSettings::server(true));
        assert!(server.contains("unrecognized event type"), "{server}");
        assert!(!server.contains("crate::model::Chat::Unknown"));
    }

    #[test]
    fn modeled_exceptions_become_union_errors() {
        let code = generate(&CodegenSettings::client());
        assert!(code.contains("\"throttled\" =>"), "{code}");
        assert!(code.contains("UnmarshalledMessage::Error(crate::error::ChatError::Throttled(value))"), "{code}");
        assert!(code.contains("crate::error::ChatError::generic(meta)"), "{code}");
    }

    #[test]
    fn marshallers_set_protocol_headers() {
        let code = generate(&CodegenSettings::client());
        assert!(code.contains("crate::model::Chat::Message(inner) =>"), "{code}");
        assert!(code.contains(
            "event_stream::EVENT_TYPE, ::shapegen_runtime::event_stream::HeaderValue::String(\"message\".into())"
        ));
        assert!(code.contains("HeaderValue::String(\"application/octet-stream\".into())"), "{code}");
        assert!(code.contains("pub struct ChatErrorMarshaller;"), "{code}");
        assert!(code.contains("crate::error::ChatError::Unhandled(inner) =>"), "{code}");
    }
}
