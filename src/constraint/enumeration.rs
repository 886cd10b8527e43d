//! Enums. On the server an enum is a closed set and parsing an unlisted value
//! is a constraint violation; on the client unlisted values are kept in a
//! forward-compatible variant.

use crate::context::GenContext;
use crate::error::{CodegenError, Result};
use crate::model::{Shape, ShapeKind};
use crate::symbol::{STRING, module_name, pascal, type_name, unknown_variant};
use crate::writer::{RustWriter, string_literal};
use crate::wln;

pub fn render(ctx: &GenContext<'_>, shape: &Shape, top: &mut RustWriter, inner: &mut RustWriter) -> Result<()> {
    let ShapeKind::Enum { variants } = &shape.kind else {
        return Err(CodegenError::unsupported(&shape.id, "not an enum"));
    };
    let name = type_name(&shape.id);
    let unknown = unknown_variant(variants.iter().map(|variant| variant.name.as_str()));
    let server = ctx.is_server();

    top.docs(shape.traits.documentation.as_deref())?;
    wln!(top, "#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]")?;
    if !server {
        wln!(top, "#[non_exhaustive]")?;
    }
    top.block(&format!("pub enum {name}"), |w| {
        for variant in variants {
            w.docs(variant.documentation.as_deref())?;
            wln!(w, "{},", pascal(&variant.name))?;
        }
        if !server {
            wln!(w, "/// A value this version of the model does not list.")?;
            wln!(w, "{unknown}({STRING}),")?;
        }
        Ok(())
    })?;
    wln!(top)?;

    let values = variants
        .iter()
        .map(|variant| string_literal(&variant.value))
        .collect::<Vec<_>>()
        .join(", ");
    top.block(&format!("impl {name}"), |w| {
        wln!(w, "/// The wire value.")?;
        w.block("pub fn as_str(&self) -> &str", |w| {
            w.block("match self", |w| {
                for variant in variants {
                    wln!(w, "{name}::{} => {},", pascal(&variant.name), string_literal(&variant.value))?;
                }
                if !server {
                    wln!(w, "{name}::{unknown}(value) => value.as_str(),")?;
                }
                Ok(())
            })
        })?;
        wln!(w)?;
        wln!(w, "/// Every listed wire value, in model order.")?;
        wln!(w, "pub const fn values() -> &'static [&'static str] {{")?;
        wln!(w, "    &[{values}]")?;
        wln!(w, "}}")?;
        Ok(())
    })?;
    wln!(top)?;

    if server {
        render_server_conversions(ctx, shape, top, inner)?;
    } else {
        top.block(&format!("impl ::std::convert::From<&str> for {name}"), |w| {
            w.block("fn from(value: &str) -> Self", |w| {
                w.block("match value", |w| {
                    for variant in variants {
                        wln!(w, "{} => {name}::{},", string_literal(&variant.value), pascal(&variant.name))?;
                    }
                    wln!(w, "other => {name}::{unknown}(other.to_owned()),")?;
                    Ok(())
                })
            })
        })?;
        wln!(top)?;
        top.block(&format!("impl ::std::str::FromStr for {name}"), |w| {
            wln!(w, "type Err = ::std::convert::Infallible;")?;
            wln!(w)?;
            w.block("fn from_str(value: &str) -> ::std::result::Result<Self, Self::Err>", |w| {
                wln!(w, "Ok({name}::from(value))")?;
                Ok(())
            })
        })?;
        wln!(top)?;
    }

    top.block(&format!("impl ::std::convert::AsRef<str> for {name}"), |w| {
        w.block("fn as_ref(&self) -> &str", |w| {
            wln!(w, "self.as_str()")?;
            Ok(())
        })
    })?;
    wln!(top)?;
    top.block(&format!("impl ::std::fmt::Display for {name}"), |w| {
        w.block("fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result", |w| {
            wln!(w, "f.write_str(self.as_str())")?;
            Ok(())
        })
    })?;
    wln!(top)?;
    Ok(())
}

fn render_server_conversions(
    ctx: &GenContext<'_>,
    shape: &Shape,
    top: &mut RustWriter,
    inner: &mut RustWriter,
) -> Result<()> {
    let ShapeKind::Enum { variants } = &shape.kind else {
        return Ok(());
    };
    let name = type_name(&shape.id);
    let module = module_name(&shape.id);

    top.block(&format!("impl ::std::convert::TryFrom<&str> for {name}"), |w| {
        wln!(w, "type Error = {module}::ConstraintViolation;")?;
        wln!(w)?;
        w.block("fn try_from(value: &str) -> ::std::result::Result<Self, Self::Error>", |w| {
            w.block("match value", |w| {
                for variant in variants {
                    wln!(w, "{} => Ok({name}::{}),", string_literal(&variant.value), pascal(&variant.name))?;
                }
                wln!(w, "_ => Err({module}::ConstraintViolation(value.to_owned())),")?;
                Ok(())
            })
        })
    })?;
    wln!(top)?;
    top.block(&format!("impl ::std::convert::TryFrom<{STRING}> for {name}"), |w| {
        wln!(w, "type Error = {module}::ConstraintViolation;")?;
        wln!(w)?;
        w.block(
            &format!("fn try_from(value: {STRING}) -> ::std::result::Result<Self, Self::Error>"),
            |w| {
                wln!(w, "Self::try_from(value.as_str())")?;
                Ok(())
            },
        )
    })?;
    wln!(top)?;
    top.block(&format!("impl ::std::str::FromStr for {name}"), |w| {
        wln!(w, "type Err = {module}::ConstraintViolation;")?;
        wln!(w)?;
        w.block("fn from_str(value: &str) -> ::std::result::Result<Self, Self::Err>", |w| {
            wln!(w, "Self::try_from(value)")?;
            Ok(())
        })
    })?;
    wln!(top)?;
    top.block(
        &format!("impl {}::constrained::Constrained for {name}", ctx.root()),
        |w| {
            wln!(w, "type Unconstrained = {STRING};")?;
            Ok(())
        },
    )?;
    wln!(top)?;

    wln!(inner, "/// The rejected value.")?;
    wln!(inner, "#[derive(Debug, Clone, PartialEq, Eq)]")?;
    wln!(inner, "pub struct ConstraintViolation(pub(crate) {STRING});")?;
    wln!(inner)?;
    inner.block("impl ConstraintViolation", |w| {
        wln!(w, "pub fn value(&self) -> &str {{")?;
        wln!(w, "    &self.0")?;
        wln!(w, "}}")?;
        Ok(())
    })?;
    wln!(inner)?;
    inner.block("impl ::std::fmt::Display for ConstraintViolation", |w| {
        w.block("fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result", |w| {
            wln!(
                w,
                "write!(f, \"value `{{}}` provided for `{}` is not one of {{:?}}\", self.0, super::{name}::values())",
                shape.id
            )?;
            Ok(())
        })
    })?;
    wln!(inner)?;
    wln!(inner, "impl ::std::error::Error for ConstraintViolation {{}}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CodegenSettings;
    use crate::model::{ShapeId, load};

    const MODEL: &str = r#"{"smithy": "2.0", "shapes": {
        "t#Kind": { "type": "enum", "members": {
            "ALPHA": { "target": "smithy.api#Unit", "traits": { "smithy.api#enumValue": "alpha" } },
            "BETA": { "target": "smithy.api#Unit", "traits": { "smithy.api#enumValue": "beta" } }
        }}
    }}"#;

    fn render_for(settings: &CodegenSettings) -> (String, String) {
        let model = load::from_str(MODEL).unwrap();
        let ctx = GenContext::new(&model, settings).unwrap();
        let (mut top, mut inner) = (RustWriter::new(), RustWriter::new());
        render(&ctx, model.get(&ShapeId::new("t#Kind")).unwrap(), &mut top, &mut inner).unwrap();
        (top.as_str().to_string(), inner.as_str().to_string())
    }

    #[test]
    fn server_enums_reject_unknown_values() {
        let (top, inner) = render_for(&CodegenSettings::server(true));
        assert!(top.contains("\"alpha\" => Ok(Kind::Alpha),"), "{top}");
        assert!(top.contains("_ => Err(kind::ConstraintViolation(value.to_owned())),"), "{top}");
        assert!(!top.contains("Unknown"), "{top}");
        assert!(inner.contains("pub struct ConstraintViolation(pub(crate) ::std::string::String);"));
    }

    #[test]
    fn client_enums_keep_unknown_values() {
        let (top, inner) = render_for(&CodegenSettings::client());
        assert!(top.contains("Unknown(::std::string::String),"), "{top}");
        assert!(top.contains("other => Kind::Unknown(other.to_owned()),"), "{top}");
        assert!(top.contains("Kind::Beta => \"beta\","), "{top}");
        assert!(inner.is_empty());
    }
}
