//! Shape → Rust type resolution.
//!
//! Each shape has up to three Rust representations:
//!
//! - **public**: what application code sees in struct fields and builder
//!   methods;
//! - **constrained**: the validated type a conversion produces (a newtype for
//!   constrained simple shapes and collections, the named type otherwise);
//! - **unconstrained**: what a deserializer produces before validation.
//!
//! They only differ on the server, and only for shapes the
//! [`ConstraintIndex`](crate::constraint::ConstraintIndex) marks.

use crate::context::GenContext;
use crate::error::{CodegenError, Result};
use crate::model::{Member, NumberKind, Shape, ShapeId, ShapeKind};
use heck::{ToSnakeCase, ToUpperCamelCase};
use once_cell::sync::Lazy;
use std::collections::HashSet;

pub const STRING: &str = "::std::string::String";

static RUST_KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "as", "async", "await", "break", "const", "continue", "dyn", "else", "enum", "extern", "false", "fn", "for",
        "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref", "return", "static", "struct",
        "trait", "true", "type", "unsafe", "use", "where", "while", "abstract", "become", "box", "do", "final", "gen",
        "macro", "override", "priv", "try", "typeof", "unsized", "virtual", "yield",
    ]
    .into_iter()
    .collect()
});

// Cannot be raw identifiers.
const RESERVED_PATH_SEGMENTS: &[&str] = &["self", "super", "crate", "Self"];

/// Escapes a snake_case identifier so it is usable as a field, function or
/// module name.
pub fn escape_ident(ident: String) -> String {
    if RESERVED_PATH_SEGMENTS.contains(&ident.as_str()) {
        format!("{ident}_")
    } else if RUST_KEYWORDS.contains(ident.as_str()) {
        format!("r#{ident}")
    } else if ident.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{ident}")
    } else {
        ident
    }
}

pub fn type_name(id: &ShapeId) -> String {
    pascal(id.name())
}

pub fn module_name(id: &ShapeId) -> String {
    escape_ident(id.name().to_snake_case())
}

/// Unescaped snake_case stem used to build function names (`ser_<stem>`).
pub fn fn_stem(id: &ShapeId) -> String {
    id.name().to_snake_case()
}

pub fn field_name(member: &Member) -> String {
    escape_ident(member.name.to_snake_case())
}

pub fn setter_name(member: &Member) -> String {
    format!("set_{}", member.name.to_snake_case())
}

/// Enum and union variant names.
pub fn pascal(name: &str) -> String {
    let converted = name.to_upper_camel_case();
    if converted.is_empty() || converted.starts_with(|c: char| c.is_ascii_digit()) {
        format!("Value{converted}")
    } else if converted == "Self" {
        "SelfValue".to_string()
    } else {
        converted
    }
}

/// Name of the forward-compatibility variant of client enums and unions,
/// avoiding a clash with a modeled `Unknown`.
pub fn unknown_variant<'a>(mut variants: impl Iterator<Item = &'a str>) -> &'static str {
    if variants.any(|name| pascal(name) == "Unknown") {
        "UnknownValue"
    } else {
        "Unknown"
    }
}

/// Which of the three representations to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolMode {
    Public,
    Constrained,
    Unconstrained,
}

/// A resolved Rust type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Bare type name, e.g. `Record` or `Vec`.
    pub name: String,
    /// Module path the type lives in, if it is generated.
    pub namespace: Option<String>,
    /// Fully rendered type without the member wrappers below.
    pub rust_type: String,
    pub optional: bool,
    pub boxed: bool,
}

impl Symbol {
    fn external(name: &str, rust_type: impl Into<String>) -> Self {
        Symbol {
            name: name.to_string(),
            namespace: None,
            rust_type: rust_type.into(),
            optional: false,
            boxed: false,
        }
    }

    fn generated(namespace: String, name: String) -> Self {
        Symbol {
            rust_type: format!("{namespace}::{name}"),
            name,
            namespace: Some(namespace),
            optional: false,
            boxed: false,
        }
    }

    /// The type with `Box` and `Option` applied.
    pub fn render(&self) -> String {
        let mut rendered = self.rust_type.clone();
        if self.boxed {
            rendered = format!("::std::boxed::Box<{rendered}>");
        }
        if self.optional {
            rendered = format!("::std::option::Option<{rendered}>");
        }
        rendered
    }
}

pub trait SymbolProvider {
    fn to_symbol(&self, shape: &Shape) -> Result<Symbol>;

    fn to_member_name(&self, member: &Member) -> String {
        field_name(member)
    }

    /// The symbol a structure field or union variant holding `member` uses.
    fn member_symbol(&self, member: &Member) -> Result<Symbol>;
}

pub struct RustSymbolProvider<'c, 'm> {
    ctx: &'c GenContext<'m>,
    mode: SymbolMode,
}

impl<'c, 'm> RustSymbolProvider<'c, 'm> {
    pub fn new(ctx: &'c GenContext<'m>, mode: SymbolMode) -> Self {
        RustSymbolProvider { ctx, mode }
    }

    pub fn with_mode(&self, mode: SymbolMode) -> Self {
        RustSymbolProvider { ctx: self.ctx, mode }
    }

    fn simple(&self, shape: &Shape) -> Result<Option<Symbol>> {
        let rt = self.ctx.rt();
        let symbol = match &shape.kind {
            ShapeKind::String => Symbol::external("String", STRING),
            ShapeKind::Boolean => Symbol::external("bool", "bool"),
            ShapeKind::Number(kind) => {
                let name = match kind {
                    NumberKind::Byte => "i8",
                    NumberKind::Short => "i16",
                    NumberKind::Integer => "i32",
                    NumberKind::Long => "i64",
                    NumberKind::Float => "f32",
                    NumberKind::Double => "f64",
                    NumberKind::BigInteger | NumberKind::BigDecimal => {
                        return Err(CodegenError::unsupported(
                            &shape.id,
                            "arbitrary-precision numbers have no Rust representation",
                        ));
                    }
                };
                Symbol::external(name, name)
            }
            ShapeKind::Blob => Symbol::external("Blob", format!("{rt}::Blob")),
            ShapeKind::Timestamp => Symbol::external("DateTime", format!("{rt}::DateTime")),
            ShapeKind::Document => Symbol::external("Document", format!("{rt}::Document")),
            _ => return Ok(None),
        };
        Ok(Some(symbol))
    }

    fn named(&self, shape: &Shape) -> Symbol {
        Symbol::generated(self.ctx.model_path(), type_name(&shape.id))
    }

    fn element(&self, member: &Member, sparse: bool) -> Result<String> {
        let rendered = self.to_symbol(self.ctx.model.target(member)?)?.render();
        Ok(if sparse {
            format!("::std::option::Option<{rendered}>")
        } else {
            rendered
        })
    }

    /// Collections expanded to `Vec` / `HashMap` in the current mode.
    fn collection(&self, shape: &Shape) -> Result<Symbol> {
        match &shape.kind {
            ShapeKind::List { member } => {
                let element = self.element(member, shape.traits.sparse)?;
                Ok(Symbol::external("Vec", format!("::std::vec::Vec<{element}>")))
            }
            ShapeKind::Map { key, value } => {
                let key = if self.mode == SymbolMode::Unconstrained && self.ctx.is_server() {
                    STRING.to_string()
                } else {
                    self.to_symbol(self.ctx.model.target(key)?)?.render()
                };
                let value = self.element(value, shape.traits.sparse)?;
                Ok(Symbol::external(
                    "HashMap",
                    format!("::std::collections::HashMap<{key}, {value}>"),
                ))
            }
            _ => Err(CodegenError::unsupported(&shape.id, "not a collection")),
        }
    }

    /// The type wrapped by a constrained newtype: the public expansion of the
    /// shape without the newtype itself.
    pub fn newtype_inner(&self, shape: &Shape) -> Result<String> {
        let public = self.with_mode(SymbolMode::Public);
        match &shape.kind {
            ShapeKind::List { .. } | ShapeKind::Map { .. } => Ok(public.collection(shape)?.rust_type),
            _ => public
                .simple(shape)?
                .map(|symbol| symbol.rust_type)
                .ok_or_else(|| CodegenError::unsupported(&shape.id, "shape cannot be wrapped in a newtype")),
        }
    }
}

impl SymbolProvider for RustSymbolProvider<'_, '_> {
    fn to_symbol(&self, shape: &Shape) -> Result<Symbol> {
        let ctx = self.ctx;
        let constrained = ctx.is_constrained(&shape.id);
        match (&shape.kind, self.mode) {
            (ShapeKind::Structure { .. }, SymbolMode::Unconstrained) if constrained => Ok(Symbol::generated(
                format!("{}::{}", ctx.model_path(), module_name(&shape.id)),
                "Builder".to_string(),
            )),
            (ShapeKind::Union { .. }, SymbolMode::Unconstrained) if constrained => Ok(Symbol::generated(
                format!("{}::{}", ctx.model_path(), module_name(&shape.id)),
                "Unconstrained".to_string(),
            )),
            (ShapeKind::Enum { .. }, SymbolMode::Unconstrained) if ctx.is_server() => {
                Ok(Symbol::external("String", STRING))
            }
            (ShapeKind::Structure { .. } | ShapeKind::Union { .. } | ShapeKind::Enum { .. }, _) => {
                Ok(self.named(shape))
            }
            (ShapeKind::Operation(_) | ShapeKind::Service(_), _) => Err(CodegenError::unsupported(
                &shape.id,
                "operations and services have no Rust type",
            )),
            (_, SymbolMode::Constrained) if ctx.has_newtype(shape) => Ok(self.named(shape)),
            (_, SymbolMode::Public) if ctx.has_public_newtype(shape) => Ok(self.named(shape)),
            (ShapeKind::List { .. } | ShapeKind::Map { .. }, _) => self.collection(shape),
            _ => self
                .simple(shape)?
                .ok_or_else(|| CodegenError::unsupported(&shape.id, "no Rust representation")),
        }
    }

    fn member_symbol(&self, member: &Member) -> Result<Symbol> {
        let target = self.ctx.model.target(member)?;
        let mut symbol = self.to_symbol(target)?;
        symbol.boxed = member.traits.boxed;
        symbol.optional = member.is_optional();
        Ok(symbol)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn identifiers_are_escaped() {
        assert_eq!(escape_ident("type".into()), "r#type");
        assert_eq!(escape_ident("self".into()), "self_");
        assert_eq!(escape_ident("9lives".into()), "_9lives");
        assert_eq!(escape_ident("record_id".into()), "record_id");
    }

    #[test]
    fn variant_names() {
        assert_eq!(pascal("ALPHA"), "Alpha");
        assert_eq!(pascal("alpha-beta"), "AlphaBeta");
        assert_eq!(pascal("2xl"), "Value2xl");
        assert_eq!(pascal("self"), "SelfValue");
    }

    #[test]
    fn unknown_variant_avoids_modeled_names() {
        assert_eq!(unknown_variant(["ALPHA", "BETA"].into_iter()), "Unknown");
        assert_eq!(unknown_variant(["UNKNOWN"].into_iter()), "UnknownValue");
    }

    #[test]
    fn member_names() {
        let member = Member {
            name: "recordId".into(),
            target: ShapeId::new("smithy.api#String"),
            traits: Default::default(),
        };
        assert_eq!(field_name(&member), "record_id");
        assert_eq!(setter_name(&member), "set_record_id");
        assert_eq!(module_name(&ShapeId::new("t#IdString")), "id_string");
        assert_eq!(type_name(&ShapeId::new("t#idString")), "IdString");
    }

    #[test]
    fn render_applies_box_then_option() {
        let mut symbol = Symbol::generated("crate::model".into(), "Node".into());
        symbol.boxed = true;
        symbol.optional = true;
        assert_eq!(
            symbol.render(),
            "::std::option::Option<::std::boxed::Box<crate::model::Node>>"
        );
    }

    proptest! {
        #[test]
        fn escaped_identifiers_are_never_bare_keywords(word in "[a-z][a-z0-9_]{0,8}") {
            let escaped = escape_ident(word);
            prop_assert!(!RUST_KEYWORDS.contains(escaped.as_str()));
            prop_assert!(!RESERVED_PATH_SEGMENTS.contains(&escaped.as_str()));
        }
    }
}
