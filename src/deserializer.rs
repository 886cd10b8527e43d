//! JSON deserializer generation, the dual of [`crate::serializer`].
//!
//! Every aggregate gets `de_<shape>(tokens)` returning `Option` of the
//! shape's unconstrained type: `None` for an explicit `null`. Structures
//! accumulate into their builder through the crate-private `set_` setters and
//! finish by returning the builder (server, constrained structure) or by
//! building. Unknown keys are skipped value by value.

use crate::builder::build_is_fallible;
use crate::context::GenContext;
use crate::error::{CodegenError, Result};
use crate::model::{Member, NumberKind, Shape, ShapeId, ShapeKind};
use crate::serializer::SerdeMode;
use crate::symbol::{SymbolMode, SymbolProvider, fn_stem, pascal, setter_name};
use crate::writer::{Dependency, Fragment, RustWriter, string_literal};
use crate::wln;
use std::collections::{HashMap, HashSet};

pub struct DeserializerGenerator<'c, 'm> {
    ctx: &'c GenContext<'m>,
    memo: HashMap<(ShapeId, SerdeMode), String>,
    documents: HashSet<ShapeId>,
    functions: Vec<String>,
}

impl<'c, 'm> DeserializerGenerator<'c, 'm> {
    pub fn new(ctx: &'c GenContext<'m>) -> Self {
        DeserializerGenerator {
            ctx,
            memo: HashMap::new(),
            documents: HashSet::new(),
            functions: Vec::new(),
        }
    }

    pub fn path(&self, name: &str) -> String {
        format!("{}::{name}", self.ctx.module_path("protocol_serde"))
    }

    pub fn finish(self) -> Fragment {
        let mut fragment = Fragment {
            name: "protocol_serde::de".to_string(),
            code: self.functions.join("\n"),
            ..Fragment::default()
        };
        if !fragment.code.is_empty() {
            fragment.dependencies.insert(Dependency::Runtime);
        }
        fragment
    }

    fn tokens_signature(&self, name: &str, output: &str) -> String {
        let rt = self.ctx.rt();
        format!(
            "pub fn {name}<'a, I>(tokens: &mut ::std::iter::Peekable<I>) -> ::std::result::Result<::std::option::Option<{output}>, {rt}::json::DeserializeError>\nwhere\n    I: ::std::iter::Iterator<Item = ::std::result::Result<{rt}::json::Token<'a>, {rt}::json::DeserializeError>>,"
        )
    }

    /// `de_<shape>` for a structure, union, list or map.
    pub fn shape_fn(&mut self, shape: &Shape) -> Result<String> {
        let key = (shape.id.clone(), SerdeMode::Document);
        if let Some(name) = self.memo.get(&key) {
            return Ok(name.clone());
        }
        let name = format!("de_{}", fn_stem(&shape.id));
        self.memo.insert(key, name.clone());
        tracing::trace!(shape = %shape.id, function = %name, "generating deserializer");
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
                    format!("{} shapes are deserialized inline", shape.kind_name()),
                ));
            }
        };
        self.functions.push(code);
        Ok(name)
    }

    /// `de_<shape>_document(bytes)`: a top-level entry point that rejects
    /// trailing tokens. An empty input reads as `{}` for structures.
    pub fn document_fn(&mut self, shape: &Shape) -> Result<String> {
        let name = format!("de_{}_document", fn_stem(&shape.id));
        if !self.documents.insert(shape.id.clone()) {
            return Ok(name);
        }
        let inner = self.shape_fn(shape)?;
        let rt = self.ctx.rt().to_string();
        let output = self.ctx.unconstrained_type(shape)?;
        let empty = if shape.is_structure() { "b\"{}\"" } else { "b\"null\"" };
        let mut w = RustWriter::new();
        w.block(
            &format!(
                "pub fn {name}(value: &[u8]) -> ::std::result::Result<::std::option::Option<{output}>, {rt}::json::DeserializeError>"
            ),
            |w| {
                wln!(w, "let value: &[u8] = if value.is_empty() {{ {empty} }} else {{ value }};")?;
                wln!(w, "let mut tokens_owned = {rt}::json::json_token_iter(value).peekable();")?;
                wln!(w, "let tokens = &mut tokens_owned;")?;
                wln!(w, "let result = {inner}(tokens)?;")?;
                trailing_tokens_check(w, &rt)?;
                wln!(w, "Ok(result)")?;
                Ok(())
            },
        )?;
        self.functions.push(w.as_str().to_string());
        Ok(name)
    }

    /// `de_<shape>_body(value, builder)`: reads the JSON body of an operation
    /// or event structure into an existing builder, touching only `members`.
    pub fn body_fn(&mut self, shape: &Shape, members: &[&Member]) -> Result<String> {
        let key = (shape.id.clone(), SerdeMode::Body);
        if let Some(name) = self.memo.get(&key) {
            return Ok(name.clone());
        }
        let name = format!("de_{}_body", fn_stem(&shape.id));
        self.memo.insert(key, name.clone());
        let ctx = self.ctx;
        let rt = ctx.rt().to_string();
        let builder = format!("{}::Builder", ctx.shape_module(&shape.id));
        let mut w = RustWriter::new();
        w.block(
            &format!(
                "pub fn {name}(value: &[u8], mut builder: {builder}) -> ::std::result::Result<{builder}, {rt}::json::DeserializeError>"
            ),
            |w| {
                wln!(w, "let value: &[u8] = if value.is_empty() {{ b\"{{}}\" }} else {{ value }};")?;
                wln!(w, "let mut tokens_owned = {rt}::json::json_token_iter(value).peekable();")?;
                wln!(w, "let tokens = &mut tokens_owned;")?;
                wln!(w, "{rt}::json::token::expect_start_object(tokens.next())?;")?;
                self.key_loop(w, members)?;
                trailing_tokens_check(w, &rt)?;
                wln!(w, "Ok(builder)")?;
                Ok(())
            },
        )?;
        self.functions.push(w.as_str().to_string());
        Ok(name)
    }

    /// The `loop` reading keys of an open object into `builder`.
    fn key_loop(&mut self, w: &mut RustWriter, members: &[&Member]) -> Result<()> {
        let ctx = self.ctx;
        let rt = ctx.rt().to_string();
        w.block("loop", |w| {
            w.block("match tokens.next().transpose()?", |w| {
                wln!(w, "Some({rt}::json::Token::EndObject {{ .. }}) => break,")?;
                w.block_with(
                    &format!("Some({rt}::json::Token::ObjectKey {{ key, .. }}) =>"),
                    "},",
                    |w| {
                        w.block("match key.to_unescaped()?.as_ref()", |w| {
                            for member in members {
                                let target = ctx.model.target(member)?;
                                let read = self.read_value(Some(*member), target)?;
                                w.block_with(&format!("{} =>", string_literal(member.json_name())), "}", |w| {
                                    wln!(w, "builder = builder.{}({read});", setter_name(member))?;
                                    Ok(())
                                })?;
                            }
                            wln!(w, "_ => {rt}::json::token::skip_value(tokens)?,")?;
                            Ok(())
                        })
                    },
                )?;
                unexpected_token_arm(w, &rt, "object key or end of object")
            })
        })
    }

    /// Expression reading one value of `target`'s unconstrained type from
    /// `tokens`, with type `Option<_>`.
    fn read_value(&mut self, member: Option<&Member>, target: &Shape) -> Result<String> {
        let ctx = self.ctx;
        let rt = ctx.rt().to_string();
        let token = format!("{rt}::json::token");
        Ok(match &target.kind {
            ShapeKind::String => format!("{token}::expect_owned_string_or_null(tokens.next())?"),
            ShapeKind::Enum { .. } if ctx.is_server() => {
                format!("{token}::expect_owned_string_or_null(tokens.next())?")
            }
            ShapeKind::Enum { .. } => format!(
                "{token}::expect_string_or_null(tokens.next())?\n    .map(|value| value.to_unescaped().map(|text| {}::from(text.as_ref())))\n    .transpose()?",
                ctx.named_type(&target.id)
            ),
            ShapeKind::Boolean => format!("{token}::expect_bool_or_null(tokens.next())?"),
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
                format!(
                    "{token}::expect_number_or_null(tokens.next())?\n    .map({primitive}::try_from)\n    .transpose()\n    .map_err(|err| {rt}::json::DeserializeError::custom_source(\"expected {primitive}\", err))?"
                )
            }
            ShapeKind::Blob => format!("{token}::expect_blob_or_null(tokens.next())?"),
            ShapeKind::Timestamp => {
                let format = ctx.format_path(ctx.body_timestamp_format(member, target));
                format!("{token}::expect_timestamp_or_null(tokens.next(), {format})?")
            }
            ShapeKind::Document => format!("Some({token}::expect_document(tokens)?)"),
            ShapeKind::Structure { .. } | ShapeKind::Union { .. } | ShapeKind::List { .. } | ShapeKind::Map { .. } => {
                format!("{}(tokens)?", self.shape_fn(target)?)
            }
            ShapeKind::Operation(_) | ShapeKind::Service(_) => {
                return Err(CodegenError::unsupported(&target.id, "cannot be deserialized"));
            }
        })
    }

    /// `match tokens.next()` over `null` and the opening token, with `body`
    /// handling the open container.
    fn open_container<F>(&mut self, w: &mut RustWriter, open: &str, expected: &str, body: F) -> Result<()>
    where
        F: FnOnce(&mut Self, &mut RustWriter) -> Result<()>,
    {
        let rt = self.ctx.rt().to_string();
        w.block("match tokens.next().transpose()?", |w| {
            wln!(w, "Some({rt}::json::Token::ValueNull {{ .. }}) => Ok(None),")?;
            w.block_with(&format!("Some({rt}::json::Token::{open} {{ .. }}) =>"), "}", |w| body(self, w))?;
            unexpected_token_arm(w, &rt, expected)
        })
    }

    fn structure_fn(&mut self, name: &str, shape: &Shape, members: &[&Member]) -> Result<String> {
        let ctx = self.ctx;
        let output = ctx.unconstrained_type(shape)?;
        let module = ctx.shape_module(&shape.id);
        let finalize = if ctx.is_server() && ctx.is_constrained(&shape.id) {
            "builder".to_string()
        } else if build_is_fallible(ctx, shape) {
            format!(
                "builder\n    .build()\n    .map_err(|err| {}::json::DeserializeError::custom_source(\"invalid `{}`\", err))?",
                ctx.rt(),
                shape.id.name()
            )
        } else {
            "builder.build()".to_string()
        };
        let mut w = RustWriter::new();
        w.block(&self.tokens_signature(name, &output), |w| {
            self.open_container(w, "StartObject", "start of object or null", |this, w| {
                wln!(w, "#[allow(unused_mut)]")?;
                wln!(w, "let mut builder = {module}::Builder::default();")?;
                this.key_loop(w, members)?;
                wln!(w, "Ok(Some({finalize}))")?;
                Ok(())
            })
        })?;
        Ok(w.as_str().to_string())
    }

    fn list_fn(&mut self, name: &str, shape: &Shape, member: &Member) -> Result<String> {
        let ctx = self.ctx;
        let rt = ctx.rt().to_string();
        let output = ctx.symbols(SymbolMode::Unconstrained).to_symbol(shape)?.render();
        let target = ctx.model.target(member)?;
        let read = self.read_value(Some(member), target)?;
        let sparse = shape.traits.sparse;
        let server = ctx.is_server();
        let mut w = RustWriter::new();
        w.block(&self.tokens_signature(name, &output), |w| {
            self.open_container(w, "StartArray", "start of array or null", |_, w| {
                wln!(w, "let mut items = ::std::vec::Vec::new();")?;
                w.block("loop", |w| {
                    w.block("match tokens.peek()", |w| {
                        w.block_with(&format!("Some(Ok({rt}::json::Token::EndArray {{ .. }})) =>"), "}", |w| {
                            wln!(w, "tokens.next().transpose()?;")?;
                            wln!(w, "break;")?;
                            Ok(())
                        })?;
                        w.block_with("_ =>", "}", |w| {
                            wln!(w, "let value = {read};")?;
                            if sparse {
                                wln!(w, "items.push(value);")?;
                            } else if server {
                                w.block("match value", |w| {
                                    wln!(w, "Some(value) => items.push(value),")?;
                                    wln!(
                                        w,
                                        "None => return Err({rt}::json::DeserializeError::custom(\"dense list cannot contain null values\")),"
                                    )?;
                                    Ok(())
                                })?;
                            } else {
                                w.block("if let Some(value) = value", |w| Ok(wln!(w, "items.push(value);")?))?;
                            }
                            Ok(())
                        })
                    })
                })?;
                wln!(w, "Ok(Some(items))")?;
                Ok(())
            })
        })?;
        Ok(w.as_str().to_string())
    }

    fn map_fn(&mut self, name: &str, shape: &Shape, key: &Member, value: &Member) -> Result<String> {
        let ctx = self.ctx;
        let rt = ctx.rt().to_string();
        let output = ctx.symbols(SymbolMode::Unconstrained).to_symbol(shape)?.render();
        let key_target = ctx.model.target(key)?;
        let key_expr = match key_target.kind {
            ShapeKind::Enum { .. } if !ctx.is_server() => {
                format!("{}::from(key.to_unescaped()?.as_ref())", ctx.named_type(&key_target.id))
            }
            ShapeKind::String | ShapeKind::Enum { .. } => "key.to_unescaped()?.into_owned()".to_string(),
            _ => return Err(CodegenError::unsupported(&shape.id, "map keys must be strings or enums")),
        };
        let read = self.read_value(Some(value), ctx.model.target(value)?)?;
        let sparse = shape.traits.sparse;
        let server = ctx.is_server();
        let mut w = RustWriter::new();
        w.block(&self.tokens_signature(name, &output), |w| {
            self.open_container(w, "StartObject", "start of object or null", |_, w| {
                wln!(w, "let mut map = ::std::collections::HashMap::new();")?;
                w.block("loop", |w| {
                    w.block("match tokens.next().transpose()?", |w| {
                        wln!(w, "Some({rt}::json::Token::EndObject {{ .. }}) => break,")?;
                        w.block_with(&format!("Some({rt}::json::Token::ObjectKey {{ key, .. }}) =>"), "}", |w| {
                            wln!(w, "let key = {key_expr};")?;
                            wln!(w, "let value = {read};")?;
                            if sparse {
                                wln!(w, "map.insert(key, value);")?;
                            } else if server {
                                w.block("match value", |w| {
                                    wln!(w, "Some(value) => {{ map.insert(key, value); }}")?;
                                    wln!(
                                        w,
                                        "None => return Err({rt}::json::DeserializeError::custom(\"dense map cannot contain null values\")),"
                                    )?;
                                    Ok(())
                                })?;
                            } else {
                                w.block("if let Some(value) = value", |w| Ok(wln!(w, "map.insert(key, value);")?))?;
                            }
                            Ok(())
                        })?;
                        unexpected_token_arm(w, &rt, "object key or end of object")
                    })
                })?;
                wln!(w, "Ok(Some(map))")?;
                Ok(())
            })
        })?;
        Ok(w.as_str().to_string())
    }

    fn union_fn(&mut self, name: &str, shape: &Shape) -> Result<String> {
        let ctx = self.ctx;
        let rt = ctx.rt().to_string();
        let output = ctx.unconstrained_type(shape)?;
        let variants: Vec<Member> = if shape.is_event_stream() {
            crate::structure::event_members(shape, ctx)?
        } else {
            shape.members().into_iter().cloned().collect()
        };
        let unknown = crate::symbol::unknown_variant(variants.iter().map(|member| member.name.as_str()));
        let known = variants
            .iter()
            .map(|member| string_literal(member.json_name()))
            .collect::<Vec<_>>()
            .join(" | ");
        let mut arms = Vec::new();
        for member in &variants {
            let target = ctx.model.target(member)?;
            let read = self.read_value(Some(member), target)?;
            let wrapped = if member.traits.boxed {
                "::std::boxed::Box::new(value)"
            } else {
                "value"
            };
            arms.push((member, read, wrapped));
        }
        let server = ctx.is_server();
        let mut w = RustWriter::new();
        w.block(&self.tokens_signature(name, &output), |w| {
            self.open_container(w, "StartObject", "start of object or null", |_, w| {
                wln!(w, "let mut variant = None;")?;
                w.block("loop", |w| {
                    w.block("match tokens.next().transpose()?", |w| {
                        wln!(w, "Some({rt}::json::Token::EndObject {{ .. }}) => break,")?;
                        w.block_with(&format!("Some({rt}::json::Token::ObjectKey {{ key, .. }}) =>"), "}", |w| {
                            w.block(&format!("if let Some(Ok({rt}::json::Token::ValueNull {{ .. }})) = tokens.peek()"), |w| {
                                wln!(w, "tokens.next().transpose()?;")?;
                                wln!(w, "continue;")?;
                                Ok(())
                            })?;
                            wln!(w, "let key = key.to_unescaped()?;")?;
                            if !known.is_empty() {
                                w.block(
                                    &format!("if variant.is_some() && matches!(key.as_ref(), {known})"),
                                    |w| {
                                        wln!(
                                            w,
                                            "return Err({rt}::json::DeserializeError::custom(\"encountered mixed variants in union\"));"
                                        )?;
                                        Ok(())
                                    },
                                )?;
                            }
                            w.block_with("variant = match key.as_ref()", "};", |w| {
                                for (member, read, wrapped) in &arms {
                                    w.block_with(&format!("{} =>", string_literal(member.json_name())), "}", |w| {
                                        wln!(w, "let value = {read}")?;
                                        wln!(
                                            w,
                                            "    .ok_or_else(|| {rt}::json::DeserializeError::custom(\"value for `{}` cannot be null\"))?;",
                                            member.name
                                        )?;
                                        wln!(w, "Some({output}::{}({wrapped}))", pascal(&member.name))?;
                                        Ok(())
                                    })?;
                                }
                                w.block_with("_ =>", "}", |w| {
                                    wln!(w, "{rt}::json::token::skip_value(tokens)?;")?;
                                    wln!(w, "variant")?;
                                    Ok(())
                                })
                            })
                        })?;
                        unexpected_token_arm(w, &rt, "object key or end of object")
                    })
                })?;
                if server {
                    w.block("match variant", |w| {
                        wln!(w, "Some(variant) => Ok(Some(variant)),")?;
                        wln!(
                            w,
                            "None => Err({rt}::json::DeserializeError::custom(\"union did not contain a valid variant\")),"
                        )?;
                        Ok(())
                    })
                } else {
                    wln!(w, "Ok(Some(variant.unwrap_or({output}::{unknown})))")?;
                    Ok(())
                }
            })
        })?;
        Ok(w.as_str().to_string())
    }
}

fn unexpected_token_arm(w: &mut RustWriter, rt: &str, expected: &str) -> Result<()> {
    wln!(
        w,
        "Some(other) => return Err({rt}::json::DeserializeError::custom(::std::format!(\"expected {expected}, found {{}}\", other.describe())).with_offset(other.offset().0)),"
    )?;
    wln!(w, "None => return Err({rt}::json::DeserializeError::unexpected_eos()),")?;
    Ok(())
}

fn trailing_tokens_check(w: &mut RustWriter, rt: &str) -> Result<()> {
    w.block("if tokens.next().is_some()", |w| {
        wln!(
            w,
            "return Err({rt}::json::DeserializeError::custom(\"found more JSON tokens after completing parsing\"));"
        )?;
        Ok(())
    })
}
