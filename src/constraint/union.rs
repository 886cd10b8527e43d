//! Constrained unions: an `Unconstrained` mirror enum holding raw variant
//! values, and the conversion validating the one variant that is set.

use crate::constraint::{render_violation_display, violation_type};
use crate::context::GenContext;
use crate::error::{CodegenError, Result};
use crate::model::{Shape, ShapeKind};
use crate::symbol::{SymbolMode, SymbolProvider, module_name, pascal, type_name};
use crate::writer::RustWriter;
use crate::wln;

pub fn render(ctx: &GenContext<'_>, shape: &Shape, top: &mut RustWriter, inner: &mut RustWriter) -> Result<()> {
    let ShapeKind::Union { members } = &shape.kind else {
        return Err(CodegenError::unsupported(&shape.id, "not a union"));
    };
    let name = type_name(&shape.id);
    let module = module_name(&shape.id);
    let unconstrained = ctx.symbols(SymbolMode::Unconstrained);

    wln!(inner, "#[derive(Debug, Clone)]")?;
    inner.block("pub enum Unconstrained", |w| {
        for member in members {
            let mut symbol = unconstrained.member_symbol(member)?;
            symbol.optional = false;
            wln!(w, "{}({}),", pascal(&member.name), symbol.render())?;
        }
        Ok(())
    })?;
    wln!(inner)?;

    let mut variants = Vec::new();
    let mut arms = Vec::new();
    let mut conversions = Vec::new();
    for member in members {
        let variant = pascal(&member.name);
        let target = ctx.model.target(member)?;
        if !ctx.is_constrained(&target.id) {
            conversions.push(format!("{module}::Unconstrained::{variant}(value) => {name}::{variant}(value),"));
            continue;
        }
        let nested = violation_type(ctx, &target.id);
        let constrained = ctx.constrained_type(target)?;
        let to_public = ctx.constrained_to_public(target);
        if member.traits.boxed {
            variants.push(format!("{variant}(::std::boxed::Box<{nested}>),"));
            conversions.push(format!(
                "{module}::Unconstrained::{variant}(value) => {name}::{variant}(::std::boxed::Box::new(\n    {constrained}::try_from(*value)\n        .map_err(|err| {module}::ConstraintViolation::{variant}(::std::boxed::Box::new(err)))?{to_public},\n)),"
            ));
        } else {
            variants.push(format!("{variant}({nested}),"));
            conversions.push(format!(
                "{module}::Unconstrained::{variant}(value) => {name}::{variant}(\n    {constrained}::try_from(value).map_err({module}::ConstraintViolation::{variant})?{to_public},\n),"
            ));
        }
        arms.push(format!(
            "Self::{variant}(violation) => write!(f, \"`{}` of `{}`: {{}}\", violation),",
            member.name, shape.id
        ));
    }

    top.block(
        &format!("impl ::std::convert::TryFrom<{module}::Unconstrained> for {name}"),
        |w| {
            wln!(w, "type Error = {module}::ConstraintViolation;")?;
            wln!(w)?;
            w.block(
                &format!("fn try_from(value: {module}::Unconstrained) -> ::std::result::Result<Self, Self::Error>"),
                |w| {
                    w.block_with("Ok(match value", "})", |w| {
                        for conversion in &conversions {
                            w.writeln(conversion)?;
                        }
                        Ok(())
                    })
                },
            )
        },
    )?;
    wln!(top)?;
    top.block(
        &format!("impl {}::constrained::Constrained for {name}", ctx.root()),
        |w| {
            wln!(w, "type Unconstrained = {module}::Unconstrained;")?;
            Ok(())
        },
    )?;
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
    use super::*;
    use crate::config::CodegenSettings;
    use crate::model::{ShapeId, load};

    #[test]
    fn only_constrained_variants_can_fail() {
        let model = load::from_str(
            r#"{"smithy": "2.0", "shapes": {
                "t#Name": { "type": "string", "traits": { "smithy.api#length": { "min": 1, "max": 3 } } },
                "t#Choice": { "type": "union", "members": {
                    "text": { "target": "smithy.api#String" },
                    "name": { "target": "t#Name" }
                }}
            }}"#,
        )
        .unwrap();
        let settings = CodegenSettings::server(true);
        let ctx = GenContext::new(&model, &settings).unwrap();
        let (mut top, mut inner) = (RustWriter::new(), RustWriter::new());
        render(&ctx, model.get(&ShapeId::new("t#Choice")).unwrap(), &mut top, &mut inner).unwrap();
        let (top, inner) = (top.as_str(), inner.as_str());

        assert!(top.contains("choice::Unconstrained::Text(value) => Choice::Text(value),"), "{top}");
        assert!(
            top.contains("crate::model::Name::try_from(value).map_err(choice::ConstraintViolation::Name)?"),
            "{top}"
        );
        assert!(inner.contains("Text(::std::string::String),"), "{inner}");
        assert!(inner.contains("Name(crate::model::name::ConstraintViolation),"), "{inner}");
        assert!(!inner.contains("Text(crate"), "{inner}");
    }
}
