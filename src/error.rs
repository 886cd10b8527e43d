use crate::model::ShapeId;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can abort a generation run.
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("unknown shape `{0}`")]
    UnknownShape(ShapeId),
    #[error("member `{member}` of `{shape}` targets unknown shape `{target}`")]
    UnknownTarget { shape: ShapeId, member: String, target: String },
    #[error("`{shape}` is not supported: {reason}")]
    Unsupported { shape: ShapeId, reason: String },
    #[error("invalid `{trait_name}` trait on `{shape}`: {reason}")]
    InvalidTrait { shape: ShapeId, trait_name: String, reason: String },
    #[error("invalid @pattern `{pattern}` on `{shape}`")]
    InvalidPattern {
        shape: ShapeId,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("shape `{0}` is defined more than once with different definitions")]
    ConflictingShape(ShapeId),
    #[error("failed to parse {origin}: {message}")]
    ModelParse { origin: String, message: String },
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to render generated code")]
    Fmt(#[from] std::fmt::Error),
}

pub type Result<T, E = CodegenError> = std::result::Result<T, E>;

impl CodegenError {
    pub fn unsupported(shape: &ShapeId, reason: impl Into<String>) -> Self {
        CodegenError::Unsupported {
            shape: shape.clone(),
            reason: reason.into(),
        }
    }

    pub fn invalid_trait(shape: &ShapeId, trait_name: &str, reason: impl Into<String>) -> Self {
        CodegenError::InvalidTrait {
            shape: shape.clone(),
            trait_name: trait_name.to_string(),
            reason: reason.into(),
        }
    }
}
