//! The shape graph: loading, lowering and transforms.

mod ast;
pub mod load;
mod lower;
pub mod shape;
pub mod transform;

pub use shape::*;

pub const PRELUDE_NAMESPACE: &str = "smithy.api";
