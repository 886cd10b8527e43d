use crate::constraint::{describe_length, length_violated, render_newtype_common, render_violation_display};
use crate::context::GenContext;
use crate::error::Result;
use crate::model::Shape;
use crate::symbol::{STRING, module_name, type_name};
use crate::writer::{RustWriter, string_literal};
use crate::wln;

/// `@length` counts Unicode scalar values; `@pattern` is checked after the
/// length and is unanchored unless the pattern anchors itself.
pub fn render(ctx: &GenContext<'_>, shape: &Shape, top: &mut RustWriter, inner: &mut RustWriter) -> Result<()> {
    let rt = ctx.rt();
    let name = type_name(&shape.id);
    let module = module_name(&shape.id);
    let visibility = if ctx.has_public_newtype(shape) { "pub" } else { "pub(crate)" };
    let length = shape.traits.length.as_ref();
    let pattern = shape.traits.pattern.as_deref();

    top.docs(shape.traits.documentation.as_deref())?;
    wln!(top, "#[derive(Debug, Clone, PartialEq, Eq, Hash)]")?;
    wln!(top, "{visibility} struct {name}(pub(crate) {STRING});")?;
    wln!(top)?;
    top.block(&format!("impl {name}"), |w| {
        wln!(w, "{visibility} fn as_str(&self) -> &str {{")?;
        wln!(w, "    &self.0")?;
        wln!(w, "}}")?;
        Ok(())
    })?;
    wln!(top)?;
    render_newtype_common(ctx, shape, STRING, STRING, top)?;

    top.block(&format!("impl ::std::convert::TryFrom<{STRING}> for {name}"), |w| {
        wln!(w, "type Error = {module}::ConstraintViolation;")?;
        wln!(w)?;
        w.block(
            &format!("fn try_from(value: {STRING}) -> ::std::result::Result<Self, Self::Error>"),
            |w| {
                if let Some(condition) = length.and_then(|bounds| length_violated("length", bounds)) {
                    wln!(w, "let length = {rt}::constraint::char_count(&value);")?;
                    w.block(&format!("if {condition}"), |w| {
                        wln!(w, "return Err({module}::ConstraintViolation::Length(length));")?;
                        Ok(())
                    })?;
                }
                if pattern.is_some() {
                    w.block(&format!("if !{module}::PATTERN.is_match(&value)"), |w| {
                        wln!(w, "return Err({module}::ConstraintViolation::Pattern(value));")?;
                        Ok(())
                    })?;
                }
                wln!(w, "Ok(Self(value))")?;
                Ok(())
            },
        )
    })?;
    wln!(top)?;
    top.block(&format!("impl ::std::convert::TryFrom<&str> for {name}"), |w| {
        wln!(w, "type Error = {module}::ConstraintViolation;")?;
        wln!(w)?;
        w.block("fn try_from(value: &str) -> ::std::result::Result<Self, Self::Error>", |w| {
            wln!(w, "Self::try_from(value.to_owned())")?;
            Ok(())
        })
    })?;
    wln!(top)?;
    top.block(&format!("impl ::std::fmt::Display for {name}"), |w| {
        w.block("fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result", |w| {
            wln!(w, "f.write_str(&self.0)")?;
            Ok(())
        })
    })?;
    wln!(top)?;

    if let Some(pattern) = pattern {
        wln!(
            inner,
            "pub(crate) static PATTERN: {rt}::constraint::Pattern = {rt}::constraint::Pattern::new({});",
            string_literal(pattern)
        )?;
        wln!(inner)?;
    }
    wln!(inner, "#[derive(Debug, Clone, PartialEq, Eq)]")?;
    inner.block("pub enum ConstraintViolation", |w| {
        if length.is_some() {
            wln!(w, "/// Length in Unicode scalar values.")?;
            wln!(w, "Length(usize),")?;
        }
        if pattern.is_some() {
            wln!(w, "/// The rejected value.")?;
            wln!(w, "Pattern({STRING}),")?;
        }
        Ok(())
    })?;
    wln!(inner)?;
    let mut arms = Vec::new();
    if let Some(bounds) = length {
        arms.push(format!(
            "Self::Length(length) => write!(f, \"value with length {{}} provided for `{}` must have a length {}\", length),",
            shape.id,
            describe_length(bounds)
        ));
    }
    if let Some(pattern) = pattern {
        arms.push(format!(
            "Self::Pattern(value) => write!(f, \"value `{{}}` provided for `{}` does not match the pattern `{{}}`\", value, {}),",
            shape.id,
            string_literal(pattern)
        ));
    }
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
        "t#Name": { "type": "string", "traits": {
            "smithy.api#length": { "min": 1, "max": 3 },
            "smithy.api#pattern": "^[a-z]+$"
        }}
    }}"#;

    fn render(settings: &CodegenSettings) -> (String, String) {
        let model = load::from_str(MODEL).unwrap();
        let ctx = GenContext::new(&model, settings).unwrap();
        let shape = model.get(&ShapeId::new("t#Name")).unwrap();
        let (mut top, mut inner) = (RustWriter::new(), RustWriter::new());
        render_newtype(&ctx, shape, &mut top, &mut inner).unwrap();
        (top.as_str().to_string(), inner.as_str().to_string())
    }

    #[test]
    fn length_is_checked_before_pattern() {
        let (top, inner) = render(&CodegenSettings::server(true));
        assert!(top.contains("pub struct Name(pub(crate) ::std::string::String);"), "{top}");
        let length = top.find("ConstraintViolation::Length(length)").unwrap();
        let pattern = top.find("ConstraintViolation::Pattern(value)").unwrap();
        assert!(length < pattern);
        assert!(top.contains("char_count(&value)"));
        assert!(inner.contains("Length(usize),"));
        assert!(inner.contains("between 1 and 3, inclusive"));
        assert!(inner.contains("static PATTERN"), "{inner}");
        assert!(top.contains("name::PATTERN.is_match(&value)"), "{top}");
    }

    #[test]
    fn crate_private_when_constrained_types_are_hidden() {
        let (top, _) = render(&CodegenSettings::server(false));
        assert!(top.contains("pub(crate) struct Name("), "{top}");
        assert!(top.contains("pub(crate) fn as_str"), "{top}");
    }
}
