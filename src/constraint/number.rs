use crate::constraint::{bound_literal, range_violated, render_newtype_common, render_violation_display};
use crate::context::GenContext;
use crate::error::Result;
use crate::model::{NumberKind, Shape};
use crate::symbol::{module_name, type_name};
use crate::writer::RustWriter;
use crate::wln;

pub fn render(
    ctx: &GenContext<'_>,
    shape: &Shape,
    kind: NumberKind,
    top: &mut RustWriter,
    inner: &mut RustWriter,
) -> Result<()> {
    let name = type_name(&shape.id);
    let module = module_name(&shape.id);
    let visibility = if ctx.has_public_newtype(shape) { "pub" } else { "pub(crate)" };
    let primitive = ctx.symbols(crate::symbol::SymbolMode::Public).newtype_inner(shape)?;
    let integer = kind.is_integer();
    let condition = shape
        .traits
        .range
        .as_ref()
        .and_then(|bounds| range_violated("value", bounds, integer));

    top.docs(shape.traits.documentation.as_deref())?;
    if integer {
        wln!(top, "#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]")?;
    } else {
        wln!(top, "#[derive(Debug, Clone, Copy, PartialEq)]")?;
    }
    wln!(top, "{visibility} struct {name}(pub(crate) {primitive});")?;
    wln!(top)?;
    render_newtype_common(ctx, shape, &primitive, &primitive, top)?;

    top.block(&format!("impl ::std::convert::TryFrom<{primitive}> for {name}"), |w| {
        wln!(w, "type Error = {module}::ConstraintViolation;")?;
        wln!(w)?;
        w.block(
            &format!("fn try_from(value: {primitive}) -> ::std::result::Result<Self, Self::Error>"),
            |w| {
                if let Some(condition) = &condition {
                    w.block(&format!("if {condition}"), |w| {
                        wln!(w, "return Err({module}::ConstraintViolation::Range(value));")?;
                        Ok(())
                    })?;
                }
                wln!(w, "Ok(Self(value))")?;
                Ok(())
            },
        )
    })?;
    wln!(top)?;

    wln!(inner, "#[derive(Debug, Clone, PartialEq)]")?;
    inner.block("pub enum ConstraintViolation", |w| {
        wln!(w, "Range({primitive}),")?;
        Ok(())
    })?;
    wln!(inner)?;
    let describe = match shape.traits.range.as_ref().map(|bounds| (bounds.min, bounds.max)) {
        Some((Some(min), Some(max))) => {
            format!("between {} and {}, inclusive", bound_literal(min, integer), bound_literal(max, integer))
        }
        Some((Some(min), None)) => format!("at least {}", bound_literal(min, integer)),
        Some((None, Some(max))) => format!("at most {}", bound_literal(max, integer)),
        _ => "in range".to_string(),
    };
    let arm = format!(
        "Self::Range(value) => write!(f, \"value {{}} provided for `{}` must be {describe}\", value),",
        shape.id
    );
    render_violation_display(inner, &[arm])
}

#[cfg(test)]
mod tests {
    use crate::config::CodegenSettings;
    use crate::constraint::render_newtype;
    use crate::context::GenContext;
    use crate::model::{ShapeId, load};
    use crate::writer::RustWriter;

    #[test]
    fn range_check_uses_typed_literals() {
        let model = load::from_str(
            r#"{"smithy": "2.0", "shapes": {
                "t#Percent": { "type": "integer", "traits": { "smithy.api#range": { "min": 0, "max": 100 } } },
                "t#Ratio": { "type": "double", "traits": { "smithy.api#range": { "min": 0.5 } } }
            }}"#,
        )
        .unwrap();
        let settings = CodegenSettings::server(true);
        let ctx = GenContext::new(&model, &settings).unwrap();

        let (mut top, mut inner) = (RustWriter::new(), RustWriter::new());
        render_newtype(&ctx, model.get(&ShapeId::new("t#Percent")).unwrap(), &mut top, &mut inner).unwrap();
        assert!(top.as_str().contains("pub struct Percent(pub(crate) i32);"), "{}", top.as_str());
        assert!(top.as_str().contains("if value < 0 || value > 100 {"), "{}", top.as_str());
        assert!(inner.as_str().contains("Range(i32),"));

        let (mut top, mut inner) = (RustWriter::new(), RustWriter::new());
        render_newtype(&ctx, model.get(&ShapeId::new("t#Ratio")).unwrap(), &mut top, &mut inner).unwrap();
        assert!(top.as_str().contains("if value < 0.5 {"), "{}", top.as_str());
        assert!(top.as_str().contains("#[derive(Debug, Clone, Copy, PartialEq)]"));
        assert!(inner.as_str().contains("at least 0.5"));
    }
}
