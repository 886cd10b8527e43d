//! Newtypes for constrained lists and maps. `@length` is checked first, then
//! elements (lists, in order) or entries (maps) are converted.

use crate::constraint::{describe_length, length_violated, render_newtype_common, render_violation_display, violation_type};
use crate::context::GenContext;
use crate::error::{CodegenError, Result};
use crate::model::{Member, Shape, ShapeKind};
use crate::symbol::{SymbolMode, module_name, type_name};
use crate::writer::RustWriter;
use crate::wln;

/// How one element is converted from unconstrained to public form, when it
/// needs converting at all.
struct ElementConversion {
    constrained: String,
    to_public: &'static str,
    violation: String,
}

fn element_conversion(ctx: &GenContext<'_>, member: &Member) -> Result<Option<ElementConversion>> {
    let target = ctx.model.target(member)?;
    if !ctx.is_constrained(&target.id) {
        return Ok(None);
    }
    Ok(Some(ElementConversion {
        constrained: ctx.constrained_type(target)?,
        to_public: ctx.constrained_to_public(target),
        violation: violation_type(ctx, &target.id),
    }))
}

/// `EC::try_from(var)` mapped into the public type, errors wrapped by `wrap`.
fn convert_expr(conversion: &ElementConversion, var: &str, wrap: &str) -> String {
    let to_public = if conversion.to_public.is_empty() {
        String::new()
    } else {
        format!(".map(|value| value{})", conversion.to_public)
    };
    format!(
        "{}::try_from({var}){to_public}.map_err({wrap})",
        conversion.constrained
    )
}

pub fn render(ctx: &GenContext<'_>, shape: &Shape, top: &mut RustWriter, inner: &mut RustWriter) -> Result<()> {
    let name = type_name(&shape.id);
    let module = module_name(&shape.id);
    let visibility = if ctx.has_public_newtype(shape) { "pub" } else { "pub(crate)" };
    let inner_type = ctx.symbols(SymbolMode::Public).newtype_inner(shape)?;
    let unconstrained = ctx.unconstrained_type(shape)?;
    let length = shape.traits.length.as_ref();
    let sparse = shape.traits.sparse;

    top.docs(shape.traits.documentation.as_deref())?;
    wln!(top, "#[derive(Debug, Clone, PartialEq)]")?;
    wln!(top, "{visibility} struct {name}(pub(crate) {inner_type});")?;
    wln!(top)?;
    render_newtype_common(ctx, shape, &inner_type, &unconstrained, top)?;

    let mut variants = Vec::new();
    let mut arms = Vec::new();
    if let Some(bounds) = length {
        variants.push("Length(usize),".to_string());
        arms.push(format!(
            "Self::Length(length) => write!(f, \"`{}` has {{}} entries but must have {}\", length),",
            shape.id,
            describe_length(bounds)
        ));
    }

    let body = match &shape.kind {
        ShapeKind::List { member } => {
            let element = element_conversion(ctx, member)?;
            let mut body = Vec::new();
            if let Some(element) = &element {
                variants.push(format!("Member(usize, ::std::boxed::Box<{}>),", element.violation));
                arms.push(format!(
                    "Self::Member(index, violation) => write!(f, \"member {{}} of `{}`: {{}}\", index, violation),",
                    shape.id
                ));
                let wrap = format!("|err| {module}::ConstraintViolation::Member(index, ::std::boxed::Box::new(err))");
                let convert = if sparse {
                    format!("item.map(|item| {}).transpose()", convert_expr(element, "item", &wrap))
                } else {
                    convert_expr(element, "item", &wrap)
                };
                body.push("let value = value".to_string());
                body.push("    .into_iter()".to_string());
                body.push("    .enumerate()".to_string());
                body.push(format!("    .map(|(index, item)| {convert})"));
                body.push("    .collect::<::std::result::Result<::std::vec::Vec<_>, _>>()?;".to_string());
            }
            body
        }
        ShapeKind::Map { key, value } => {
            let key_conversion = element_conversion(ctx, key)?;
            let value_conversion = element_conversion(ctx, value)?;
            let mut body = Vec::new();
            if let Some(conversion) = &key_conversion {
                variants.push(format!("Key(::std::boxed::Box<{}>),", conversion.violation));
                arms.push(format!(
                    "Self::Key(violation) => write!(f, \"key in `{}`: {{}}\", violation),",
                    shape.id
                ));
            }
            if let Some(conversion) = &value_conversion {
                variants.push(format!(
                    "Value(::std::string::String, ::std::boxed::Box<{}>),",
                    conversion.violation
                ));
                arms.push(format!(
                    "Self::Value(key, violation) => write!(f, \"value for key `{{}}` in `{}`: {{}}\", key, violation),",
                    shape.id
                ));
            }
            if key_conversion.is_some() || value_conversion.is_some() {
                body.push("let mut constrained = ::std::collections::HashMap::with_capacity(value.len());".to_string());
                body.push("for (key, value) in value {".to_string());
                if value_conversion.is_some() {
                    body.push("    let key_name = key.clone();".to_string());
                }
                if let Some(conversion) = &key_conversion {
                    let wrap = format!("|err| {module}::ConstraintViolation::Key(::std::boxed::Box::new(err))");
                    body.push(format!("    let key = {}?;", convert_expr(conversion, "key", &wrap)));
                }
                if let Some(conversion) = &value_conversion {
                    let wrap =
                        format!("|err| {module}::ConstraintViolation::Value(key_name, ::std::boxed::Box::new(err))");
                    if sparse {
                        body.push("    let value = match value {".to_string());
                        body.push(format!(
                            "        Some(value) => Some({}?),",
                            convert_expr(conversion, "value", &wrap)
                        ));
                        body.push("        None => None,".to_string());
                        body.push("    };".to_string());
                    } else {
                        body.push(format!("    let value = {}?;", convert_expr(conversion, "value", &wrap)));
                    }
                }
                body.push("    constrained.insert(key, value);".to_string());
                body.push("}".to_string());
                body.push("let value = constrained;".to_string());
            }
            body
        }
        _ => return Err(CodegenError::unsupported(&shape.id, "not a collection")),
    };

    top.block(&format!("impl ::std::convert::TryFrom<{unconstrained}> for {name}"), |w| {
        wln!(w, "type Error = {module}::ConstraintViolation;")?;
        wln!(w)?;
        w.block(
            &format!("fn try_from(value: {unconstrained}) -> ::std::result::Result<Self, Self::Error>"),
            |w| {
                if let Some(condition) = length.and_then(|bounds| length_violated("length", bounds)) {
                    wln!(w, "let length = value.len();")?;
                    w.block(&format!("if {condition}"), |w| {
                        wln!(w, "return Err({module}::ConstraintViolation::Length(length));")?;
                        Ok(())
                    })?;
                }
                for line in &body {
                    w.writeln(line)?;
                }
                wln!(w, "Ok(Self(value))")?;
                Ok(())
            },
        )
    })?;
    wln!(top)?;

    wln!(inner, "#[derive(Debug, Clone, PartialEq)]")?;
    inner.block("pub enum ConstraintViolation", |w| {
        for variant in &variants {
            w.writeln(variant)?;
        }
        Ok(())
    })?;
    wln!(inner)?;
    render_violation_display(inner, &arms)
}

#[cfg(test)]
mod tests {
    use crate::config::CodegenSettings;
    use crate::constraint::render_newtype;
    use crate::context::GenContext;
    use crate::model::{ShapeId, load};
    use crate::writer::RustWriter;

    const MODEL: &str = r#"{"smithy": "2.0", "shapes": {
        "t#Name": { "type": "string", "traits": { "smithy.api#length": { "min": 1, "max": 3 } } },
        "t#Names": { "type": "list", "member": { "target": "t#Name" },
                     "traits": { "smithy.api#length": { "max": 2 } } },
        "t#ByName": { "type": "map", "key": { "target": "smithy.api#String" }, "value": { "target": "t#Name" } }
    }}"#;

    fn render(settings: &CodegenSettings, shape: &str) -> (String, String) {
        let model = load::from_str(MODEL).unwrap();
        let ctx = GenContext::new(&model, settings).unwrap();
        let (mut top, mut inner) = (RustWriter::new(), RustWriter::new());
        render_newtype(&ctx, model.get(&ShapeId::new(shape)).unwrap(), &mut top, &mut inner).unwrap();
        (top.as_str().to_string(), inner.as_str().to_string())
    }

    #[test]
    fn list_checks_length_then_members() {
        let (top, inner) = render(&CodegenSettings::server(true), "t#Names");
        assert!(
            top.contains("pub struct Names(pub(crate) ::std::vec::Vec<crate::model::Name>);"),
            "{top}"
        );
        let length = top.find("ConstraintViolation::Length(length)").unwrap();
        let members = top.find("crate::model::Name::try_from(item)").unwrap();
        assert!(length < members, "{top}");
        assert!(inner.contains("Member(usize, ::std::boxed::Box<crate::model::name::ConstraintViolation>),"));
    }

    #[test]
    fn hidden_element_newtypes_are_unwrapped() {
        let (top, _) = render(&CodegenSettings::server(false), "t#Names");
        assert!(top.contains("pub(crate) struct Names(pub(crate) ::std::vec::Vec<::std::string::String>);"), "{top}");
        assert!(top.contains(".map(|value| value.into_inner())"), "{top}");
    }

    #[test]
    fn map_values_report_their_key() {
        let (top, inner) = render(&CodegenSettings::server(true), "t#ByName");
        assert!(top.contains("let key_name = key.clone();"), "{top}");
        assert!(top.contains("ConstraintViolation::Value(key_name"), "{top}");
        assert!(!inner.contains("Key("), "{inner}");
        assert!(!inner.contains("Length("), "{inner}");
    }
}
