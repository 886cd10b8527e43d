use crate::constraint::{describe_length, length_violated, render_newtype_common, render_violation_display};
use crate::context::GenContext;
use crate::error::Result;
use crate::model::Shape;
use crate::symbol::{module_name, type_name};
use crate::writer::RustWriter;
use crate::wln;

/// Blob `@length` counts bytes.
pub fn render(ctx: &GenContext<'_>, shape: &Shape, top: &mut RustWriter, inner: &mut RustWriter) -> Result<()> {
    let rt = ctx.rt();
    let name = type_name(&shape.id);
    let module = module_name(&shape.id);
    let visibility = if ctx.has_public_newtype(shape) { "pub" } else { "pub(crate)" };
    let blob = format!("{rt}::Blob");
    let length = shape.traits.length.as_ref();

    top.docs(shape.traits.documentation.as_deref())?;
    wln!(top, "#[derive(Debug, Clone, PartialEq, Eq, Hash)]")?;
    wln!(top, "{visibility} struct {name}(pub(crate) {blob});")?;
    wln!(top)?;
    render_newtype_common(ctx, shape, &blob, &blob, top)?;

    top.block(&format!("impl ::std::convert::TryFrom<{blob}> for {name}"), |w| {
        wln!(w, "type Error = {module}::ConstraintViolation;")?;
        wln!(w)?;
        w.block(
            &format!("fn try_from(value: {blob}) -> ::std::result::Result<Self, Self::Error>"),
            |w| {
                if let Some(condition) = length.and_then(|bounds| length_violated("length", bounds)) {
                    wln!(w, "let length = value.len();")?;
                    w.block(&format!("if {condition}"), |w| {
                        wln!(w, "return Err({module}::ConstraintViolation::Length(length));")?;
                        Ok(())
                    })?;
                }
                wln!(w, "Ok(Self(value))")?;
                Ok(())
            },
        )
    })?;
    wln!(top)?;

    wln!(inner, "#[derive(Debug, Clone, PartialEq, Eq)]")?;
    inner.block("pub enum ConstraintViolation", |w| {
        wln!(w, "/// Length in bytes.")?;
        wln!(w, "Length(usize),")?;
        Ok(())
    })?;
    wln!(inner)?;
    let describe = length.map(describe_length).unwrap_or_else(|| "unconstrained".to_string());
    let arm = format!(
        "Self::Length(length) => write!(f, \"blob of {{}} bytes provided for `{}` must have a length {describe}\", length),",
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
    fn length_counts_bytes() {
        let model = load::from_str(
            r#"{"smithy": "2.0", "shapes": {
                "t#Thumbnail": { "type": "blob", "traits": { "smithy.api#length": { "max": 1024 } } }
            }}"#,
        )
        .unwrap();
        let settings = CodegenSettings::server(true);
        let ctx = GenContext::new(&model, &settings).unwrap();
        let shape = model.get(&ShapeId::new("t#Thumbnail")).unwrap();
        let (mut top, mut inner) = (RustWriter::new(), RustWriter::new());
        render_newtype(&ctx, shape, &mut top, &mut inner).unwrap();

        let (top, inner) = (top.as_str(), inner.as_str());
        assert!(top.contains("pub struct Thumbnail("), "{top}");
        assert!(top.contains("let length = value.len();"), "{top}");
        assert!(top.contains("if length > 1024"), "{top}");
        assert!(inner.contains("must have a length at most 1024"), "{inner}");
    }
}
