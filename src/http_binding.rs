//! Operation-level HTTP (de)serializers for the REST-JSON binding.
//!
//! Built on top of the shape-level JSON functions: members bound to the
//! body go through `ser_<shape>_body` / `de_<shape>_body`, everything else is
//! written or read here from the URI, query string, headers and status.

use crate::binding::{HttpBinding, HttpBindingIndex, Location};
use crate::builder::build_is_fallible;
use crate::context::{Direction, GenContext};
use crate::deserializer::DeserializerGenerator;
use crate::error::{CodegenError, Result};
use crate::model::{Member, NumberKind, Shape, ShapeId, ShapeKind, TimestampFormat};
use crate::serializer::SerializerGenerator;
use crate::symbol::{field_name, fn_stem, setter_name, type_name};
use crate::writer::{Dependency, Fragment, RustWriter, string_literal};
use crate::wln;
use std::collections::HashSet;

/// A piece of a URI template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UriPiece {
    Literal(String),
    Label { name: String, greedy: bool },
}

/// Splits `/records/{id}/files/{path+}?x=1` into literals and labels.
pub fn uri_pieces(uri: &str) -> Vec<UriPiece> {
    let mut pieces = Vec::new();
    let mut rest = uri;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else {
            break;
        };
        if start > 0 {
            pieces.push(UriPiece::Literal(rest[..start].to_string()));
        }
        let label = &rest[start + 1..start + len];
        pieces.push(UriPiece::Label {
            name: label.trim_end_matches('+').to_string(),
            greedy: label.ends_with('+'),
        });
        rest = &rest[start + len + 1..];
    }
    if !rest.is_empty() {
        pieces.push(UriPiece::Literal(rest.to_string()));
    }
    pieces
}

/// How a parse failure of a bound value is reported.
#[derive(Debug, Clone, Copy)]
enum Reject<'a> {
    /// Server side: a `RequestRejection` variant naming the bound value.
    Rejection(&'a str, &'a str),
    /// Client side: the message itself, boxed by `?`.
    Boxed,
}

pub struct HttpGenerator<'g, 'c, 'm> {
    ctx: &'c GenContext<'m>,
    index: HttpBindingIndex<'m>,
    ser: &'g mut SerializerGenerator<'c, 'm>,
    de: &'g mut DeserializerGenerator<'c, 'm>,
    error_functions: HashSet<ShapeId>,
    functions: Vec<String>,
}

impl<'g, 'c, 'm> HttpGenerator<'g, 'c, 'm> {
    pub fn new(
        ctx: &'c GenContext<'m>,
        ser: &'g mut SerializerGenerator<'c, 'm>,
        de: &'g mut DeserializerGenerator<'c, 'm>,
    ) -> Self {
        HttpGenerator {
            ctx,
            index: HttpBindingIndex::new(ctx.model),
            ser,
            de,
            error_functions: HashSet::new(),
            functions: Vec::new(),
        }
    }

    /// Bindings for every operation the settings select.
    pub fn render_all(mut self) -> Result<Fragment> {
        for operation in self.ctx.operations()? {
            tracing::debug!(operation = %operation.id, "generating HTTP bindings");
            if self.ctx.is_server() {
                self.server_request(operation)?;
                self.server_response(operation)?;
                self.server_error(operation)?;
            } else {
                self.client_request(operation)?;
                self.client_response(operation)?;
            }
        }
        let mut fragment = Fragment {
            name: "http_serde".to_string(),
            code: self.functions.join("\n"),
            ..Fragment::default()
        };
        if !fragment.code.is_empty() {
            fragment.dependencies.insert(Dependency::Runtime);
            fragment.dependencies.insert(Dependency::Http);
        }
        Ok(fragment)
    }

    fn path(&self, name: &str) -> String {
        format!("{}::{name}", self.ctx.module_path("http_serde"))
    }

    fn rt(&self) -> String {
        self.ctx.rt().to_string()
    }

    // ------------------------- Bound value text -------------------------- //

    /// `String` expression rendering `value: &T` of a simple shape.
    fn value_text(&self, target: &Shape, format: TimestampFormat, value: &str) -> Result<String> {
        let newtype = self.ctx.has_public_newtype(target);
        Ok(match &target.kind {
            ShapeKind::String | ShapeKind::Enum { .. } => format!("{value}.as_str().to_string()"),
            ShapeKind::Boolean => format!("{value}.to_string()"),
            ShapeKind::Number(_) if newtype => format!("{value}.inner().to_string()"),
            ShapeKind::Number(_) => format!("{value}.to_string()"),
            ShapeKind::Timestamp => format!("{value}.fmt({})", self.ctx.format_path(format)),
            _ => {
                return Err(CodegenError::unsupported(
                    &target.id,
                    format!("`{}` cannot be bound outside the body", target.kind_name()),
                ));
            }
        })
    }

    fn reject_expr(&self, reject: Reject<'_>, reason: &str) -> String {
        match reject {
            Reject::Rejection(variant, name) => format!(
                "{}::http_binding::RequestRejection::{variant} {{ name: {}, reason: {reason} }}",
                self.rt(),
                string_literal(name)
            ),
            Reject::Boxed => reason.to_string(),
        }
    }

    /// Expression parsing `raw: &str` into the unconstrained value of a
    /// simple shape, failing through `?`.
    fn parse_text(&self, target: &Shape, format: TimestampFormat, reject: Reject<'_>) -> Result<String> {
        let ctx = self.ctx;
        let rt = self.rt();
        let map_err = format!(".map_err(|err| {})?", self.reject_expr(reject, "err.to_string()"));
        Ok(match &target.kind {
            ShapeKind::String => "raw.to_string()".to_string(),
            ShapeKind::Enum { .. } if ctx.is_server() => "raw.to_string()".to_string(),
            ShapeKind::Enum { .. } => format!("{}::from(raw)", ctx.named_type(&target.id)),
            ShapeKind::Boolean => format!("raw.parse::<bool>(){map_err}"),
            ShapeKind::Number(kind) => {
                let primitive = match kind {
                    NumberKind::Byte => "i8",
                    NumberKind::Short => "i16",
                    NumberKind::Integer => "i32",
                    NumberKind::Long => "i64",
                    NumberKind::Float => "f32",
                    NumberKind::Double => "f64",
                    NumberKind::BigInteger | NumberKind::BigDecimal => {
                        return Err(CodegenError::unsupported(&target.id, "arbitrary-precision numbers"));
                    }
                };
                format!("raw.parse::<{primitive}>(){map_err}")
            }
            ShapeKind::Timestamp => format!("{rt}::DateTime::from_str(raw, {}){map_err}", ctx.format_path(format)),
            _ => {
                return Err(CodegenError::unsupported(
                    &target.id,
                    format!("`{}` cannot be bound outside the body", target.kind_name()),
                ));
            }
        })
    }

    /// Element target and iterator expression of a bound list value.
    fn list_items(&self, list: &'m Shape, value: &str) -> Result<Option<(&'m Shape, String)>> {
        let ShapeKind::List { member } = &list.kind else {
            return Ok(None);
        };
        let element = self.ctx.model.target(member)?;
        let inner = if self.ctx.has_public_newtype(list) {
            format!("{value}.inner()")
        } else {
            value.to_string()
        };
        let flatten = if list.traits.sparse { ".flatten()" } else { "" };
        Ok(Some((element, format!("{inner}.iter(){flatten}"))))
    }

    /// Opens `if let Some(value) = &input.x` or a block binding
    /// `let value = &input.x;`, then runs `body`.
    fn with_member_value<F>(w: &mut RustWriter, member: &Member, input: &str, body: F) -> Result<()>
    where
        F: FnOnce(&mut RustWriter) -> Result<()>,
    {
        let field = field_name(member);
        if member.is_optional() {
            w.block(&format!("if let Some(value) = &{input}.{field}"), body)
        } else {
            wln!(w, "{{")?;
            {
                let _indent = w.indent();
                wln!(w, "let value = &{input}.{field};")?;
                body(w)?;
            }
            wln!(w, "}}")?;
            Ok(())
        }
    }

    // ------------------------- Writing messages -------------------------- //

    fn write_headers(&self, w: &mut RustWriter, bindings: &[HttpBinding<'m>], input: &str) -> Result<()> {
        let rt = self.rt();
        for binding in bindings {
            let Location::Header(name) = &binding.location else {
                continue;
            };
            let format = self.index.timestamp_format(binding.member, &binding.location);
            let name_literal = string_literal(name);
            let text = match self.list_items(binding.target, "value")? {
                Some((element, items)) => {
                    let item = self.value_text(element, format, "item")?;
                    let quoted = if matches!(element.kind, ShapeKind::Timestamp) && format == TimestampFormat::HttpDate {
                        item
                    } else {
                        format!("{rt}::http_binding::quote_header_value(&{item}).into_owned()")
                    };
                    format!("{items}\n    .map(|item| {quoted})\n    .collect::<::std::vec::Vec<_>>()\n    .join(\", \")")
                }
                None => self.value_text(binding.target, format, "value")?,
            };
            Self::with_member_value(w, binding.member, input, |w| {
                wln!(w, "let text = {text};")?;
                w.block("if !text.is_empty()", |w| {
                    wln!(
                        w,
                        "builder = builder.header({name_literal}, {rt}::http_binding::header_value({name_literal}, &text)?);"
                    )?;
                    Ok(())
                })
            })?;
        }
        Ok(())
    }

    /// Statements binding `body: Vec<u8>` for the members of `structure`
    /// that travel in the body, setting the content type on `builder`.
    fn write_body(
        &mut self,
        w: &mut RustWriter,
        structure: &'m Shape,
        bindings: &[HttpBinding<'m>],
        input: &str,
    ) -> Result<()> {
        let rt = self.rt();
        let content_type = |w: &mut RustWriter, value: &str| {
            wln!(w, "builder = builder.header(\"content-type\", {});", string_literal(value))
        };
        if let Some(payload) = bindings.iter().find(|binding| binding.location == Location::Payload) {
            let target = payload.target;
            if target.is_event_stream() {
                wln!(w, "let body = ::std::vec::Vec::new();")?;
                content_type(w, "application/vnd.amazon.eventstream")?;
                return Ok(());
            }
            let newtype = self.ctx.has_public_newtype(target);
            let (bytes, kind) = match &target.kind {
                ShapeKind::Blob if newtype => ("value.inner().clone().into_inner()".to_string(), "application/octet-stream"),
                ShapeKind::Blob => ("value.clone().into_inner()".to_string(), "application/octet-stream"),
                ShapeKind::String => ("value.as_str().as_bytes().to_vec()".to_string(), "text/plain"),
                ShapeKind::Document => (
                    format!(
                        "{{\n    let mut out = ::std::string::String::new();\n    {rt}::json::JsonValueWriter::new(&mut out).document(value);\n    out.into_bytes()\n}}"
                    ),
                    "application/json",
                ),
                _ => {
                    let function = self.ser.shape_fn(target)?;
                    (json_bytes(&rt, &self.ser.path(&function), "value"), "application/json")
                }
            };
            let field = field_name(payload.member);
            if payload.member.is_optional() {
                w.block_with(&format!("let body = match &{input}.{field}"), "};", |w| {
                    w.block_with("Some(value) =>", "}", |w| {
                        content_type(w, kind)?;
                        Ok(w.write_code(&bytes)?)
                    })?;
                    wln!(w, "None => ::std::vec::Vec::new(),")?;
                    Ok(())
                })?;
            } else {
                wln!(w, "let value = &{input}.{field};")?;
                content_type(w, kind)?;
                wln!(w, "let body = {bytes};")?;
            }
            return Ok(());
        }
        let members: Vec<&Member> = bindings
            .iter()
            .filter(|binding| binding.is_document())
            .map(|binding| binding.member)
            .collect();
        if members.is_empty() {
            wln!(w, "let body = ::std::vec::Vec::new();")?;
            return Ok(());
        }
        let function = self.ser.body_fn(structure, &members)?;
        content_type(w, "application/json")?;
        wln!(w, "let body = {};", json_bytes(&rt, &self.ser.path(&function), input))?;
        Ok(())
    }

    // ------------------------- Reading messages -------------------------- //

    fn read_headers(
        &self,
        w: &mut RustWriter,
        bindings: &[HttpBinding<'m>],
        headers: &str,
        server: bool,
    ) -> Result<()> {
        let rt = self.rt();
        for binding in bindings {
            let Location::Header(name) = &binding.location else {
                continue;
            };
            let format = self.index.timestamp_format(binding.member, &binding.location);
            let reject = if server { Reject::Rejection("InvalidHeader", name) } else { Reject::Boxed };
            let setter = setter_name(binding.member);
            let name_literal = string_literal(name);
            match self.list_items(binding.target, "value")? {
                Some((element, _)) => {
                    let helper = if matches!(element.kind, ShapeKind::Timestamp) && format == TimestampFormat::HttpDate {
                        "many_http_dates"
                    } else {
                        "many_headers"
                    };
                    let parse = self.parse_text(element, format, reject)?;
                    let error = if server {
                        format!("{rt}::http_binding::RequestRejection")
                    } else {
                        format!("{rt}::error::BoxError")
                    };
                    wln!(w, "let values = {rt}::http_binding::{helper}({headers}, {name_literal})?")?;
                    wln!(w, "    .iter()")?;
                    wln!(w, "    .map(|raw| -> ::std::result::Result<_, {error}> {{")?;
                    wln!(w, "        let raw = raw.as_str();")?;
                    wln!(w, "        Ok({parse})")?;
                    wln!(w, "    }})")?;
                    wln!(w, "    .collect::<::std::result::Result<::std::vec::Vec<_>, _>>()?;")?;
                    w.block("if !values.is_empty()", |w| {
                        Ok(wln!(w, "builder = builder.{setter}(Some(values));")?)
                    })?;
                }
                None => {
                    let parse = self.parse_text(binding.target, format, reject)?;
                    w.block(
                        &format!("if let Some(raw) = {rt}::http_binding::one_header({headers}, {name_literal})?"),
                        |w| Ok(wln!(w, "builder = builder.{setter}(Some({parse}));")?),
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Statements filling `builder` from the body bytes in `body`.
    fn read_body(&mut self, w: &mut RustWriter, structure: &'m Shape, bindings: &[HttpBinding<'m>], body: &str) -> Result<()> {
        let ctx = self.ctx;
        let rt = self.rt();
        if let Some(payload) = bindings.iter().find(|binding| binding.location == Location::Payload) {
            let target = payload.target;
            let setter = setter_name(payload.member);
            if target.is_event_stream() {
                wln!(
                    w,
                    "builder = builder.{setter}(Some({rt}::event_stream::Receiver::new({}::event_stream_serde::{}Unmarshaller::new())));",
                    ctx.root(),
                    type_name(&target.id)
                )?;
                return Ok(());
            }
            let read = match &target.kind {
                ShapeKind::Blob => format!("Some({rt}::Blob::new({body}.clone()))"),
                ShapeKind::String => format!(
                    "Some(::std::string::String::from_utf8({body}.clone()).map_err(|err| {rt}::json::DeserializeError::custom_source(\"payload is not valid UTF-8\", err))?)"
                ),
                ShapeKind::Document => format!(
                    "Some({rt}::json::token::expect_document(&mut {rt}::json::json_token_iter({body}).peekable())?)"
                ),
                _ => {
                    let function = self.de.document_fn(target)?;
                    format!("{}({body})?", self.de.path(&function))
                }
            };
            w.block(&format!("if !{body}.is_empty()"), |w| {
                Ok(wln!(w, "builder = builder.{setter}({read});")?)
            })?;
            return Ok(());
        }
        let members: Vec<&Member> = bindings
            .iter()
            .filter(|binding| binding.is_document())
            .map(|binding| binding.member)
            .collect();
        if !members.is_empty() {
            let function = self.de.body_fn(structure, &members)?;
            wln!(w, "builder = {}({body}, builder)?;", self.de.path(&function))?;
        }
        Ok(())
    }

    // ------------------------------ Client ------------------------------- //

    fn client_request(&mut self, operation: &'m Shape) -> Result<()> {
        let ctx = self.ctx;
        let rt = self.rt();
        let http = self.index.http_trait(operation);
        let input = self.index.structure(operation, Direction::Request)?;
        let bindings = self.index.bindings(operation, Direction::Request)?;
        let name = format!("ser_{}_http_request", fn_stem(&operation.id));
        let mut w = RustWriter::new();
        wln!(w, "/// Renders `{}` as an HTTP request.", operation.id.name())?;
        w.block(
            &format!(
                "pub fn {name}(input: &{}) -> ::std::result::Result<::http::Request<::std::vec::Vec<u8>>, {rt}::http_binding::SerializationError>",
                ctx.named_type(&input.id)
            ),
            |w| {
                wln!(w, "let mut uri = ::std::string::String::new();")?;
                for piece in uri_pieces(&http.uri) {
                    match piece {
                        UriPiece::Literal(text) => wln!(w, "uri.push_str({});", string_literal(&text))?,
                        UriPiece::Label { name, greedy } => {
                            let binding = bindings
                                .iter()
                                .find(|binding| binding.member.name == name)
                                .ok_or_else(|| {
                                    CodegenError::invalid_trait(
                                        &operation.id,
                                        "smithy.api#http",
                                        format!("no `@httpLabel` member for `{{{name}}}`"),
                                    )
                                })?;
                            let format = self.index.timestamp_format(binding.member, &binding.location);
                            let text = self.value_text(binding.target, format, "value")?;
                            Self::with_member_value(w, binding.member, "input", |w| {
                                wln!(w, "let encoded = {rt}::http_binding::fmt_label(&{text}, {greedy});")?;
                                w.block("if encoded.is_empty()", |w| {
                                    wln!(
                                        w,
                                        "return Err({rt}::http_binding::SerializationError::EmptyLabel({}));",
                                        string_literal(&name)
                                    )?;
                                    Ok(())
                                })?;
                                wln!(w, "uri.push_str(&encoded);")?;
                                Ok(())
                            })?;
                        }
                    }
                }
                wln!(w, "let mut query = {rt}::http_binding::QueryWriter::new(uri);")?;
                for binding in &bindings {
                    let Location::Query(key) = &binding.location else {
                        continue;
                    };
                    let format = self.index.timestamp_format(binding.member, &binding.location);
                    let key = string_literal(key);
                    let insert = match self.list_items(binding.target, "value")? {
                        Some((element, items)) => format!(
                            "for item in {items} {{\n    query.insert({key}, &{});\n}}",
                            self.value_text(element, format, "item")?
                        ),
                        None => format!("query.insert({key}, &{});", self.value_text(binding.target, format, "value")?),
                    };
                    Self::with_member_value(w, binding.member, "input", |w| Ok(w.write_code(&insert)?))?;
                }
                wln!(
                    w,
                    "let mut builder = ::http::Request::builder().method({}).uri(query.build_uri());",
                    string_literal(&http.method)
                )?;
                self.write_headers(w, &bindings, "input")?;
                self.write_body(w, input, &bindings, "input")?;
                wln!(w, "Ok(builder.body(body)?)")?;
                Ok(())
            },
        )?;
        self.functions.push(w.as_str().to_string());
        Ok(())
    }

    fn client_response(&mut self, operation: &'m Shape) -> Result<()> {
        let ctx = self.ctx;
        let rt = self.rt();
        let output = self.index.structure(operation, Direction::Response)?;
        let bindings = self.index.bindings(operation, Direction::Response)?;
        let stem = fn_stem(&operation.id);
        let error = format!("{}::error::{}Error", ctx.root(), type_name(&operation.id));
        let public = format!("pub fn de_{stem}_http_response");
        let parts = format!("de_{stem}_http_response_parts");
        let dispatch = format!("de_{stem}_http_error");

        let mut w = RustWriter::new();
        wln!(w, "/// Reads the response of `{}`, dispatching error statuses to [`{dispatch}`].", operation.id.name())?;
        w.block(
            &format!(
                "{public}(response: &::http::Response<::std::vec::Vec<u8>>) -> ::std::result::Result<{}, {error}>",
                ctx.named_type(&output.id)
            ),
            |w| {
                w.block("if !response.status().is_success()", |w| {
                    Ok(wln!(w, "return Err({dispatch}(response));")?)
                })?;
                wln!(w, "{parts}(response).map_err({error}::unhandled)")?;
                Ok(())
            },
        )?;
        wln!(w)?;
        w.block(
            &format!(
                "fn {parts}(response: &::http::Response<::std::vec::Vec<u8>>) -> ::std::result::Result<{}, {rt}::error::BoxError>",
                ctx.named_type(&output.id)
            ),
            |w| {
                self.client_read_structure(w, output, &bindings)?;
                Ok(())
            },
        )?;
        wln!(w)?;

        let ShapeKind::Operation(op) = &operation.kind else {
            return Err(CodegenError::unsupported(&operation.id, "not an operation"));
        };
        let mut arms = Vec::new();
        for id in &op.errors {
            let shape = ctx.model.expect_shape(id)?;
            let function = self.client_error_fn(shape)?;
            arms.push(format!(
                "Some({}) => match {function}(response) {{\n    Ok(value) => {error}::{}(value),\n    Err(err) => {error}::unhandled(err),\n}},",
                string_literal(id.name()),
                type_name(id)
            ));
        }
        w.block(
            &format!("pub fn {dispatch}(response: &::http::Response<::std::vec::Vec<u8>>) -> {error}"),
            |w| {
                w.block_with(
                    &format!("let meta = match {rt}::json::errors::parse_error_metadata(response.body(), response.headers())"),
                    "};",
                    |w| {
                        wln!(w, "Ok(meta) => meta,")?;
                        wln!(w, "Err(err) => return {error}::unhandled(err),")?;
                        Ok(())
                    },
                )?;
                w.block("match meta.code()", |w| {
                    for arm in &arms {
                        w.write_code(arm)?;
                    }
                    wln!(w, "_ => {error}::generic(meta),")?;
                    Ok(())
                })
            },
        )?;
        self.functions.push(w.as_str().to_string());
        Ok(())
    }

    /// Body of a `-> Result<Structure, BoxError>` function reading a
    /// response into `structure`.
    fn client_read_structure(&mut self, w: &mut RustWriter, structure: &'m Shape, bindings: &[HttpBinding<'m>]) -> Result<()> {
        let ctx = self.ctx;
        wln!(w, "#[allow(unused_mut)]")?;
        wln!(w, "let mut builder = {}::Builder::default();", ctx.shape_module(&structure.id))?;
        self.read_headers(w, bindings, "response.headers()", false)?;
        for binding in bindings {
            if binding.location == Location::ResponseCode {
                wln!(
                    w,
                    "builder = builder.{}(Some(i32::from(response.status().as_u16())));",
                    setter_name(binding.member)
                )?;
            }
        }
        self.read_body(w, structure, bindings, "response.body()")?;
        if build_is_fallible(ctx, structure) {
            wln!(w, "Ok(builder.build()?)")?;
        } else {
            wln!(w, "Ok(builder.build())")?;
        }
        Ok(())
    }

    fn client_error_fn(&mut self, error: &'m Shape) -> Result<String> {
        let name = self.path(&format!("de_{}_http_error", fn_stem(&error.id)));
        if !self.error_functions.insert(error.id.clone()) {
            return Ok(name);
        }
        let ctx = self.ctx;
        let rt = self.rt();
        let bindings = self.index.error_bindings(error)?;
        let mut w = RustWriter::new();
        w.block(
            &format!(
                "pub fn de_{}_http_error(response: &::http::Response<::std::vec::Vec<u8>>) -> ::std::result::Result<{}, {rt}::error::BoxError>",
                fn_stem(&error.id),
                ctx.named_type(&error.id)
            ),
            |w| self.client_read_structure(w, error, &bindings),
        )?;
        self.functions.push(w.as_str().to_string());
        Ok(name)
    }

    // ------------------------------ Server ------------------------------- //

    fn server_request(&mut self, operation: &'m Shape) -> Result<()> {
        let ctx = self.ctx;
        let rt = self.rt();
        let http = self.index.http_trait(operation);
        let input = self.index.structure(operation, Direction::Request)?;
        let bindings = self.index.bindings(operation, Direction::Request)?;
        let rejection = format!("{rt}::http_binding::RequestRejection");
        let mut w = RustWriter::new();
        wln!(w, "/// Reads an HTTP request into the input of `{}`.", operation.id.name())?;
        w.block(
            &format!(
                "pub fn de_{}_http_request(request: &::http::Request<::std::vec::Vec<u8>>) -> ::std::result::Result<{}, {rejection}>",
                fn_stem(&operation.id),
                ctx.named_type(&input.id)
            ),
            |w| {
                w.block(&format!("if request.method().as_str() != {}", string_literal(&http.method)), |w| {
                    w.block_with(&format!("return Err({rejection}::MethodMismatch"), "});", |w| {
                        wln!(w, "expected: {},", string_literal(&http.method))?;
                        wln!(w, "found: request.method().to_string(),")?;
                        Ok(())
                    })
                })?;
                wln!(
                    w,
                    "let labels = {rt}::http_binding::match_uri_template({}, request.uri().path())",
                    string_literal(&http.uri)
                )?;
                wln!(w, "    .ok_or_else(|| {rejection}::UriMismatch(request.uri().path().to_string()))?;")?;
                wln!(w, "#[allow(unused_mut)]")?;
                wln!(w, "let mut builder = {}::Builder::default();", ctx.shape_module(&input.id))?;

                let labels: Vec<&HttpBinding<'m>> = bindings
                    .iter()
                    .filter(|binding| matches!(binding.location, Location::Label { .. }))
                    .collect();
                if !labels.is_empty() {
                    w.block("for (name, raw) in &labels", |w| {
                        wln!(w, "let raw = raw.as_str();")?;
                        w.block("match name.as_str()", |w| {
                            for binding in &labels {
                                let format = self.index.timestamp_format(binding.member, &binding.location);
                                let parse = self.parse_text(
                                    binding.target,
                                    format,
                                    Reject::Rejection("InvalidLabel", &binding.member.name),
                                )?;
                                wln!(
                                    w,
                                    "{} => builder = builder.{}(Some({parse})),",
                                    string_literal(&binding.member.name),
                                    setter_name(binding.member)
                                )?;
                            }
                            wln!(w, "_ => {{}}")?;
                            Ok(())
                        })
                    })?;
                }

                let queries: Vec<&HttpBinding<'m>> = bindings
                    .iter()
                    .filter(|binding| matches!(binding.location, Location::Query(_)))
                    .collect();
                if !queries.is_empty() {
                    wln!(
                        w,
                        "let query = {rt}::http_binding::parse_query(request.uri().query().unwrap_or_default())?;"
                    )?;
                }
                for binding in queries {
                    let Location::Query(key) = &binding.location else {
                        continue;
                    };
                    let format = self.index.timestamp_format(binding.member, &binding.location);
                    let setter = setter_name(binding.member);
                    let reject = Reject::Rejection("InvalidQuery", key);
                    let key = string_literal(key);
                    match self.list_items(binding.target, "value")? {
                        Some((element, _)) => {
                            let parse = self.parse_text(element, format, reject)?;
                            wln!(w, "let values = query")?;
                            wln!(w, "    .iter()")?;
                            wln!(w, "    .filter(|(key, _)| key == {key})")?;
                            wln!(w, "    .map(|(_, raw)| -> ::std::result::Result<_, {rejection}> {{")?;
                            wln!(w, "        let raw = raw.as_str();")?;
                            wln!(w, "        Ok({parse})")?;
                            wln!(w, "    }})")?;
                            wln!(w, "    .collect::<::std::result::Result<::std::vec::Vec<_>, _>>()?;")?;
                            w.block("if !values.is_empty()", |w| {
                                Ok(wln!(w, "builder = builder.{setter}(Some(values));")?)
                            })?;
                        }
                        None => {
                            let parse = self.parse_text(binding.target, format, reject)?;
                            w.block(
                                &format!("if let Some((_, raw)) = query.iter().find(|(key, _)| key == {key})"),
                                |w| {
                                    wln!(w, "let raw = raw.as_str();")?;
                                    wln!(w, "builder = builder.{setter}(Some({parse}));")?;
                                    Ok(())
                                },
                            )?;
                        }
                    }
                }

                self.read_headers(w, &bindings, "request.headers()", true)?;
                self.read_body(w, input, &bindings, "request.body()")?;
                if build_is_fallible(ctx, input) {
                    wln!(w, "builder")?;
                    wln!(w, "    .build()")?;
                    wln!(w, "    .map_err(|err| {rejection}::ConstraintViolation(::std::boxed::Box::new(err)))")?;
                } else {
                    wln!(w, "Ok(builder.build())")?;
                }
                Ok(())
            },
        )?;
        self.functions.push(w.as_str().to_string());
        Ok(())
    }

    /// Statements writing the status, headers and body of a response for
    /// `input` into `builder`, ending in the built response.
    fn server_write_structure(
        &mut self,
        w: &mut RustWriter,
        structure: &'m Shape,
        bindings: &[HttpBinding<'m>],
        input: &str,
    ) -> Result<()> {
        for binding in bindings {
            if binding.location != Location::ResponseCode {
                continue;
            }
            let value = if self.ctx.has_public_newtype(binding.target) {
                "*value.inner()"
            } else {
                "*value"
            };
            Self::with_member_value(w, binding.member, input, |w| {
                w.block(&format!("if let Ok(status) = u16::try_from({value})"), |w| {
                    Ok(wln!(w, "builder = builder.status(status);")?)
                })
            })?;
        }
        self.write_headers(w, bindings, input)?;
        self.write_body(w, structure, bindings, input)?;
        wln!(w, "Ok(builder.body(body)?)")?;
        Ok(())
    }

    fn server_response(&mut self, operation: &'m Shape) -> Result<()> {
        let ctx = self.ctx;
        let rt = self.rt();
        let http = self.index.http_trait(operation);
        let output = self.index.structure(operation, Direction::Response)?;
        let bindings = self.index.bindings(operation, Direction::Response)?;
        let mut w = RustWriter::new();
        wln!(w, "/// Renders the output of `{}` as an HTTP response.", operation.id.name())?;
        w.block(
            &format!(
                "pub fn ser_{}_http_response(output: &{}) -> ::std::result::Result<::http::Response<::std::vec::Vec<u8>>, {rt}::http_binding::SerializationError>",
                fn_stem(&operation.id),
                ctx.named_type(&output.id)
            ),
            |w| {
                wln!(w, "let mut builder = ::http::Response::builder().status({}u16);", http.code)?;
                self.server_write_structure(w, output, &bindings, "output")
            },
        )?;
        self.functions.push(w.as_str().to_string());
        Ok(())
    }

    fn server_error_fn(&mut self, error: &'m Shape) -> Result<String> {
        let name = self.path(&format!("ser_{}_http_error", fn_stem(&error.id)));
        if !self.error_functions.insert(error.id.clone()) {
            return Ok(name);
        }
        let ctx = self.ctx;
        let rt = self.rt();
        let bindings = self.index.error_bindings(error)?;
        let status = self.index.error_status(error);
        let mut w = RustWriter::new();
        w.block(
            &format!(
                "pub fn ser_{}_http_error(error: &{}) -> ::std::result::Result<::http::Response<::std::vec::Vec<u8>>, {rt}::http_binding::SerializationError>",
                fn_stem(&error.id),
                ctx.named_type(&error.id)
            ),
            |w| {
                wln!(w, "let mut builder = ::http::Response::builder()")?;
                wln!(w, "    .status({status}u16)")?;
                wln!(
                    w,
                    "    .header({rt}::http_binding::ERROR_TYPE_HEADER, {});",
                    string_literal(error.id.name())
                )?;
                let has_body = bindings.iter().any(|binding| binding.is_document() || binding.location == Location::Payload);
                if has_body {
                    self.server_write_structure(w, error, &bindings, "error")
                } else {
                    self.write_headers(w, &bindings, "error")?;
                    wln!(w, "builder = builder.header(\"content-type\", \"application/json\");")?;
                    wln!(w, "Ok(builder.body(b\"{{}}\".to_vec())?)")?;
                    Ok(())
                }
            },
        )?;
        self.functions.push(w.as_str().to_string());
        Ok(name)
    }

    fn server_error(&mut self, operation: &'m Shape) -> Result<()> {
        let ctx = self.ctx;
        let rt = self.rt();
        let ShapeKind::Operation(op) = &operation.kind else {
            return Err(CodegenError::unsupported(&operation.id, "not an operation"));
        };
        let error = format!("{}::error::{}Error", ctx.root(), type_name(&operation.id));
        let mut arms = Vec::new();
        for id in &op.errors {
            let shape = ctx.model.expect_shape(id)?;
            let function = self.server_error_fn(shape)?;
            arms.push(format!("{error}::{}(inner) => {function}(inner),", type_name(id)));
        }
        let mut w = RustWriter::new();
        wln!(w, "/// Renders a modeled error of `{}` as an HTTP response.", operation.id.name())?;
        w.block(
            &format!(
                "pub fn ser_{}_http_error(error: &{error}) -> ::std::result::Result<::http::Response<::std::vec::Vec<u8>>, {rt}::http_binding::SerializationError>",
                fn_stem(&operation.id)
            ),
            |w| {
                if arms.is_empty() {
                    return Ok(wln!(w, "match *error {{}}")?);
                }
                w.block("match error", |w| {
                    for arm in &arms {
                        w.writeln(arm)?;
                    }
                    Ok(())
                })
            },
        )?;
        self.functions.push(w.as_str().to_string());
        Ok(())
    }
}

/// A block expression serializing `input` with a structure or union
/// serializer into JSON bytes.
fn json_bytes(rt: &str, function: &str, input: &str) -> String {
    format!(
        "{{\n    let mut out = ::std::string::String::new();\n    let mut object = {rt}::json::JsonObjectWriter::new(&mut out);\n    {function}(&mut object, {input});\n    object.finish();\n    out.into_bytes()\n}}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodegenSettings;
    use crate::model::{Model, load, transform};

    const MODEL: &str = r#"{"smithy": "2.0", "shapes": {
        "t#GetRecord": { "type": "operation",
            "input": { "target": "t#GetRecordInput" }, "output": { "target": "t#GetRecordOutput" },
            "errors": [ { "target": "t#NotFound" } ],
            "traits": { "smithy.api#http": { "method": "GET", "uri": "/records/{id}", "code": 200 } } },
        "t#GetRecordInput": { "type": "structure", "members": {
            "id": { "target": "smithy.api#String",
                    "traits": { "smithy.api#required": {}, "smithy.api#httpLabel": {} } },
            "limit": { "target": "smithy.api#Integer", "traits": { "smithy.api#httpQuery": "limit" } },
            "trace": { "target": "smithy.api#String", "traits": { "smithy.api#httpHeader": "X-Trace" } }
        }},
        "t#GetRecordOutput": { "type": "structure", "members": {
            "name": { "target": "smithy.api#String" }
        }},
        "t#NotFound": { "type": "structure",
            "members": { "message": { "target": "smithy.api#String" } },
            "traits": { "smithy.api#error": "client", "smithy.api#httpError": 404 } }
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
        HttpGenerator::new(&ctx, &mut ser, &mut de).render_all().unwrap().code
    }

    #[test]
    fn uri_templates_split_into_pieces() {
        assert_eq!(
            uri_pieces("/records/{id}/files/{path+}?x=1"),
            vec![
                UriPiece::Literal("/records/".into()),
                UriPiece::Label { name: "id".into(), greedy: false },
                UriPiece::Literal("/files/".into()),
                UriPiece::Label { name: "path".into(), greedy: true },
                UriPiece::Literal("?x=1".into()),
            ]
        );
    }

    #[test]
    fn client_requests_bind_labels_queries_and_headers() {
        let code = generate(&CodegenSettings::client());
        assert!(code.contains("pub fn ser_get_record_http_request(input: &crate::model::GetRecordInput)"), "{code}");
        assert!(code.contains("uri.push_str(\"/records/\");"), "{code}");
        assert!(code.contains("fmt_label(&value.as_str().to_string(), false)"), "{code}");
        assert!(code.contains("query.insert(\"limit\", &value.to_string());"), "{code}");
        assert!(code.contains("builder.header(\"x-trace\""), "{code}");
        assert!(code.contains(".method(\"GET\")"), "{code}");
    }

    #[test]
    fn client_errors_dispatch_on_the_error_code() {
        let code = generate(&CodegenSettings::client());
        assert!(code.contains("Some(\"NotFound\") => match crate::http_serde::de_not_found_http_error(response)"), "{code}");
        assert!(code.contains("_ => crate::error::GetRecordError::generic(meta),"), "{code}");
    }

    #[test]
    fn server_requests_reject_mismatched_methods() {
        let code = generate(&CodegenSettings::server(true));
        assert!(code.contains("if request.method().as_str() != \"GET\""), "{code}");
        assert!(code.contains("match_uri_template(\"/records/{id}\", request.uri().path())"), "{code}");
        assert!(code.contains("RequestRejection::InvalidQuery { name: \"limit\""), "{code}");
        assert!(code.contains("ConstraintViolation(::std::boxed::Box::new(err))"), "{code}");
    }

    #[test]
    fn server_errors_carry_status_and_type() {
        let code = generate(&CodegenSettings::server(true));
        assert!(code.contains(".status(404u16)"), "{code}");
        assert!(code.contains(".header(::shapegen_runtime::http_binding::ERROR_TYPE_HEADER, \"NotFound\");"), "{code}");
        assert!(code.contains("crate::error::GetRecordError::NotFound(inner) => crate::http_serde::ser_not_found_http_error(inner),"));
    }

    const STREAMING_MODEL: &str = r#"{"smithy": "2.0", "shapes": {
        "t#Watch": { "type": "operation",
            "input": { "target": "t#WatchInput" }, "output": { "target": "t#WatchOutput" },
            "traits": { "smithy.api#http": { "method": "GET", "uri": "/watch", "code": 200 } } },
        "t#WatchInput": { "type": "structure", "members": {} },
        "t#WatchOutput": { "type": "structure", "members": {
            "changes": { "target": "t#Changes", "traits": { "smithy.api#httpPayload": {} } }
        }},
        "t#Changes": { "type": "union", "traits": { "smithy.api#streaming": {} }, "members": {
            "changed": { "target": "t#Changed" }
        }},
        "t#Changed": { "type": "structure", "members": { "name": { "target": "smithy.api#String" } } }
    }}"#;

    fn generate_streaming(settings: &CodegenSettings) -> String {
        let mut model = load::from_str(STREAMING_MODEL).unwrap();
        transform::run_all(&mut model).unwrap();
        let ctx = GenContext::new(&model, settings).unwrap();
        let mut ser = SerializerGenerator::new(&ctx);
        let mut de = DeserializerGenerator::new(&ctx);
        HttpGenerator::new(&ctx, &mut ser, &mut de).render_all().unwrap().code
    }

    #[test]
    fn event_stream_payloads_leave_the_body_empty() {
        let server = generate_streaming(&CodegenSettings::server(true));
        assert!(server.contains("\"application/vnd.amazon.eventstream\""), "{server}");
        assert!(server.contains("let body = ::std::vec::Vec::new();"), "{server}");

        let client = generate_streaming(&CodegenSettings::client());
        assert!(
            client.contains(
                "builder = builder.set_changes(Some(::shapegen_runtime::event_stream::Receiver::new(crate::event_stream_serde::ChangesUnmarshaller::new())));"
            ),
            "{client}"
        );
    }
}
