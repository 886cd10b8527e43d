//! Server-side constraint analysis and the validating newtypes built from it.
//!
//! A shape is *directly* constrained when a trait restricts its values
//! (`@length`, `@pattern`, `@range`, enum membership). It is *transitively*
//! constrained when it is directly constrained, is a structure with a
//! required member lacking a default or an event-stream member, or reaches a
//! constrained shape through a member. Only transitively constrained shapes
//! get validating conversions.
pub mod blob;
pub mod collection;
pub mod enumeration;
pub mod number;
pub mod string;
pub mod union;

use crate::config::Target;
use crate::context::GenContext;
use crate::error::Result;
use crate::model::{LengthBounds, Model, RangeBounds, Shape, ShapeId, ShapeKind};
use crate::writer::RustWriter;
use crate::wln;
use std::collections::HashSet;

// ------------------------------- Analysis -------------------------------- //

#[derive(Debug, Default)]
pub struct ConstraintIndex {
    constrained: HashSet<ShapeId>,
}

impl ConstraintIndex {
    /// Least fixpoint over the member edges. Empty on the client.
    pub fn new(model: &Model, target: Target) -> Self {
        let mut constrained = HashSet::new();
        if target == Target::Client {
            return ConstraintIndex { constrained };
        }
        for shape in model.shapes() {
            if Self::is_directly_constrained(shape) || Self::has_mandatory_member(model, shape) {
                constrained.insert(shape.id.clone());
            }
        }
        loop {
            let before = constrained.len();
            for shape in model.shapes() {
                if constrained.contains(&shape.id) || shape.is_event_stream() {
                    continue;
                }
                let propagates = matches!(
                    shape.kind,
                    ShapeKind::Structure { .. } | ShapeKind::Union { .. } | ShapeKind::List { .. } | ShapeKind::Map { .. }
                );
                let reaches = shape.members().into_iter().any(|member| {
                    constrained.contains(&member.target)
                        && !model.get(&member.target).is_some_and(Shape::is_event_stream)
                });
                if propagates && reaches {
                    constrained.insert(shape.id.clone());
                }
            }
            if constrained.len() == before {
                break;
            }
        }
        ConstraintIndex { constrained }
    }

    pub fn is_constrained(&self, id: &ShapeId) -> bool {
        self.constrained.contains(id)
    }

    pub fn len(&self) -> usize {
        self.constrained.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constrained.is_empty()
    }

    pub fn is_directly_constrained(shape: &Shape) -> bool {
        let traits = &shape.traits;
        match &shape.kind {
            ShapeKind::String => traits.length.is_some() || traits.pattern.is_some(),
            ShapeKind::Enum { .. } => true,
            ShapeKind::Number(_) => traits.range.is_some(),
            ShapeKind::Blob | ShapeKind::List { .. } | ShapeKind::Map { .. } => traits.length.is_some(),
            _ => false,
        }
    }

    fn has_mandatory_member(model: &Model, shape: &Shape) -> bool {
        let ShapeKind::Structure { members } = &shape.kind else {
            return false;
        };
        members.iter().any(|member| {
            (member.traits.required && member.traits.default.is_none())
                || model.get(&member.target).is_some_and(Shape::is_event_stream)
        })
    }
}

// ------------------------------ Rendering -------------------------------- //

/// `ConstraintViolation` path of a shape.
pub fn violation_type(ctx: &GenContext<'_>, id: &ShapeId) -> String {
    format!("{}::ConstraintViolation", ctx.shape_module(id))
}

/// Boolean expression true when `var` falls outside `bounds`.
pub fn length_violated(var: &str, bounds: &LengthBounds) -> Option<String> {
    match (bounds.min, bounds.max) {
        (Some(min), Some(max)) => Some(format!("!({min}..={max}).contains(&{var})")),
        (Some(min), None) => Some(format!("{var} < {min}")),
        (None, Some(max)) => Some(format!("{var} > {max}")),
        (None, None) => None,
    }
}

pub fn describe_length(bounds: &LengthBounds) -> String {
    match (bounds.min, bounds.max) {
        (Some(min), Some(max)) => format!("between {min} and {max}, inclusive"),
        (Some(min), None) => format!("at least {min}"),
        (None, Some(max)) => format!("at most {max}"),
        (None, None) => "unconstrained".to_string(),
    }
}

/// Renders a range bound as a literal of the number's Rust type.
pub fn bound_literal(value: f64, integer: bool) -> String {
    if integer {
        format!("{}", value as i64)
    } else if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

pub fn range_violated(var: &str, bounds: &RangeBounds, integer: bool) -> Option<String> {
    let min = bounds.min.map(|min| format!("{var} < {}", bound_literal(min, integer)));
    let max = bounds.max.map(|max| format!("{var} > {}", bound_literal(max, integer)));
    match (min, max) {
        (Some(min), Some(max)) => Some(format!("{min} || {max}")),
        (Some(check), None) | (None, Some(check)) => Some(check),
        (None, None) => None,
    }
}

/// The `constrained` module: the trait tying a constrained type to its
/// unconstrained input, and the builder slot holding either.
pub fn render_support_module(w: &mut RustWriter) -> Result<()> {
    w.writeln("pub(crate) trait Constrained {")?;
    w.writeln("    type Unconstrained;")?;
    w.writeln("}")?;
    wln!(w)?;
    w.writeln("/// A builder slot: either already validated or still raw.")?;
    w.writeln("pub(crate) enum MaybeConstrained<T: Constrained> {")?;
    w.writeln("    Constrained(T),")?;
    w.writeln("    Unconstrained(T::Unconstrained),")?;
    w.writeln("}")?;
    wln!(w)?;
    w.block(
        "impl<T> MaybeConstrained<T>\nwhere\n    T: Constrained + ::std::convert::TryFrom<<T as Constrained>::Unconstrained>,",
        |w| {
            w.block(
                "pub(crate) fn into_constrained(self) -> ::std::result::Result<T, <T as ::std::convert::TryFrom<<T as Constrained>::Unconstrained>>::Error>",
                |w| {
                    w.block("match self", |w| {
                        w.writeln("Self::Constrained(value) => Ok(value),")?;
                        w.writeln("Self::Unconstrained(value) => T::try_from(value),")?;
                        Ok(())
                    })
                },
            )
        },
    )?;
    wln!(w)?;
    w.block(
        "impl<T> ::std::clone::Clone for MaybeConstrained<T>\nwhere\n    T: Constrained + ::std::clone::Clone,\n    T::Unconstrained: ::std::clone::Clone,",
        |w| {
            w.block("fn clone(&self) -> Self", |w| {
                w.block("match self", |w| {
                    w.writeln("Self::Constrained(value) => Self::Constrained(value.clone()),")?;
                    w.writeln("Self::Unconstrained(value) => Self::Unconstrained(value.clone()),")?;
                    Ok(())
                })
            })
        },
    )?;
    wln!(w)?;
    w.block(
        "impl<T> ::std::fmt::Debug for MaybeConstrained<T>\nwhere\n    T: Constrained + ::std::fmt::Debug,\n    T::Unconstrained: ::std::fmt::Debug,",
        |w| {
            w.block("fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result", |w| {
                w.block("match self", |w| {
                    w.writeln("Self::Constrained(value) => f.debug_tuple(\"Constrained\").field(value).finish(),")?;
                    w.writeln("Self::Unconstrained(value) => f.debug_tuple(\"Unconstrained\").field(value).finish(),")?;
                    Ok(())
                })
            })
        },
    )
}

/// Newtype, conversions and violation type for a constrained simple shape or
/// collection. `top` receives items for the `model` module, `inner` items for
/// the shape's own submodule.
pub fn render_newtype(ctx: &GenContext<'_>, shape: &Shape, top: &mut RustWriter, inner: &mut RustWriter) -> Result<()> {
    tracing::trace!(shape = %shape.id, "rendering constrained newtype");
    match &shape.kind {
        ShapeKind::String => string::render(ctx, shape, top, inner),
        ShapeKind::Number(kind) => number::render(ctx, shape, *kind, top, inner),
        ShapeKind::Blob => blob::render(ctx, shape, top, inner),
        ShapeKind::List { .. } | ShapeKind::Map { .. } => collection::render(ctx, shape, top, inner),
        _ => Ok(()),
    }
}

/// `impl Constrained` plus the `Display`/`Error` boilerplate shared by every
/// newtype, given the inner type's rendering and the unconstrained input.
pub(crate) fn render_newtype_common(
    ctx: &GenContext<'_>,
    shape: &Shape,
    inner_type: &str,
    unconstrained: &str,
    top: &mut RustWriter,
) -> Result<()> {
    let name = crate::symbol::type_name(&shape.id);
    let visibility = if ctx.has_public_newtype(shape) { "pub" } else { "pub(crate)" };
    top.block(&format!("impl {name}"), |w| {
        wln!(w, "/// Borrows the validated value.")?;
        wln!(w, "{visibility} fn inner(&self) -> &{inner_type} {{")?;
        wln!(w, "    &self.0")?;
        wln!(w, "}}")?;
        wln!(w)?;
        wln!(w, "{visibility} fn into_inner(self) -> {inner_type} {{")?;
        wln!(w, "    self.0")?;
        wln!(w, "}}")?;
        Ok(())
    })?;
    wln!(top)?;
    top.block(&format!("impl {root}::constrained::Constrained for {name}", root = ctx.root()), |w| {
        wln!(w, "type Unconstrained = {unconstrained};")?;
        Ok(())
    })?;
    wln!(top)?;
    top.block(&format!("impl ::std::convert::From<{name}> for {inner_type}"), |w| {
        wln!(w, "fn from(value: {name}) -> Self {{")?;
        wln!(w, "    value.into_inner()")?;
        wln!(w, "}}")?;
        Ok(())
    })?;
    wln!(top)?;
    Ok(())
}

/// `impl Display` and `impl Error` for a violation enum, `arms` being the
/// match arms of `fmt`.
pub fn render_violation_display(w: &mut RustWriter, arms: &[String]) -> Result<()> {
    w.block("impl ::std::fmt::Display for ConstraintViolation", |w| {
        w.block("fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result", |w| {
            if arms.is_empty() {
                return Ok(w.writeln("match *self {}")?);
            }
            w.block("match self", |w| {
                for arm in arms {
                    w.writeln(arm)?;
                }
                Ok(())
            })
        })
    })?;
    wln!(w)?;
    w.writeln("impl ::std::error::Error for ConstraintViolation {}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::load;

    fn model() -> Model {
        load::from_str(
            r#"{"smithy": "2.0", "shapes": {
                "t#Name": { "type": "string", "traits": { "smithy.api#length": { "min": 1, "max": 3 } } },
                "t#Plain": { "type": "string" },
                "t#Names": { "type": "list", "member": { "target": "t#Name" } },
                "t#Wrapper": { "type": "structure", "members": { "names": { "target": "t#Names" } } },
                "t#Loose": { "type": "structure", "members": { "plain": { "target": "t#Plain" } } },
                "t#Strict": { "type": "structure", "members": {
                    "plain": { "target": "t#Plain", "traits": { "smithy.api#required": {} } }
                }},
                "t#Defaulted": { "type": "structure", "members": {
                    "count": { "target": "smithy.api#Integer", "traits": { "smithy.api#required": {}, "smithy.api#default": 0 } }
                }},
                "t#Cycle": { "type": "structure", "members": {
                    "next": { "target": "t#Cycle" },
                    "strict": { "target": "t#Strict" }
                }}
            }}"#,
        )
        .unwrap()
    }

    fn constrained(index: &ConstraintIndex, name: &str) -> bool {
        index.is_constrained(&ShapeId::from_parts("t", name))
    }

    #[test]
    fn propagates_through_members() {
        let index = ConstraintIndex::new(&model(), Target::Server);
        assert!(constrained(&index, "Name"));
        assert!(constrained(&index, "Names"));
        assert!(constrained(&index, "Wrapper"));
        assert!(constrained(&index, "Strict"));
        assert!(constrained(&index, "Cycle"));
        assert!(!constrained(&index, "Plain"));
        assert!(!constrained(&index, "Loose"));
        assert!(!constrained(&index, "Defaulted"));
    }

    #[test]
    fn client_has_no_constrained_shapes() {
        assert!(ConstraintIndex::new(&model(), Target::Client).is_empty());
    }

    #[test]
    fn bound_checks() {
        let both = LengthBounds { min: Some(1), max: Some(3) };
        assert_eq!(length_violated("length", &both).unwrap(), "!(1..=3).contains(&length)");
        let min = LengthBounds { min: Some(2), max: None };
        assert_eq!(length_violated("length", &min).unwrap(), "length < 2");
        assert_eq!(describe_length(&both), "between 1 and 3, inclusive");

        let range = RangeBounds { min: Some(0.0), max: Some(10.0) };
        assert_eq!(range_violated("value", &range, true).unwrap(), "value < 0 || value > 10");
        assert_eq!(range_violated("value", &range, false).unwrap(), "value < 0.0 || value > 10.0");
    }
}
