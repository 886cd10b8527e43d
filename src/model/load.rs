//! Reading JSON AST model files into a [`Model`].

use super::ast::AstModel;
use super::lower::{lower_shape, prelude, validate_targets};
use super::shape::{Model, ShapeId};
use crate::error::{CodegenError, Result};
use crate::path_de::from_slice_with_path;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Merges AST documents shape by shape. The same id may appear in several
/// documents only with an identical definition.
#[derive(Debug, Default)]
pub struct ModelAssembler {
    documents: Vec<(String, AstModel)>,
}

impl ModelAssembler {
    pub fn new() -> Self {
        ModelAssembler::default()
    }

    pub fn add_str(&mut self, source: &str, origin: &str) -> Result<&mut Self> {
        let document: AstModel = from_slice_with_path(source.as_bytes(), origin)?;
        if !document.smithy.starts_with('1') && !document.smithy.starts_with('2') {
            return Err(CodegenError::ModelParse {
                origin: origin.to_string(),
                message: format!("unsupported model version `{}`", document.smithy),
            });
        }
        tracing::debug!(origin, shapes = document.shapes.len(), "parsed model document");
        self.documents.push((origin.to_string(), document));
        Ok(self)
    }

    pub fn add_path(&mut self, path: &Path) -> Result<&mut Self> {
        let source = std::fs::read_to_string(path).map_err(|source| CodegenError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        self.add_str(&source, &path.to_string_lossy())
    }

    pub fn assemble(self) -> Result<Model> {
        let mut merged = IndexMap::new();
        for (origin, document) in self.documents {
            for (id, shape) in document.shapes {
                match merged.get(&id) {
                    Some((_, existing)) if existing != &shape => {
                        return Err(CodegenError::ConflictingShape(ShapeId::new(id)));
                    }
                    Some(_) => {}
                    None => {
                        merged.insert(id, (origin.clone(), shape));
                    }
                }
            }
        }

        let mut model = Model::new();
        for shape in prelude() {
            model.insert(shape);
        }
        for (id, (origin, ast)) in &merged {
            if let Some(shape) = lower_shape(id, ast)? {
                tracing::trace!(shape = %shape.id, kind = shape.kind_name(), origin = origin.as_str(), "lowered");
                model.insert(shape);
            }
        }
        validate_targets(&model)?;
        Ok(model)
    }
}

pub fn from_str(source: &str) -> Result<Model> {
    let mut assembler = ModelAssembler::new();
    assembler.add_str(source, "<string>")?;
    assembler.assemble()
}

pub fn from_path(path: &Path) -> Result<Model> {
    from_paths(&[path.to_path_buf()])
}

pub fn from_paths(paths: &[PathBuf]) -> Result<Model> {
    let mut assembler = ModelAssembler::new();
    for path in paths {
        assembler.add_path(path)?;
    }
    assembler.assemble()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r#"{
        "smithy": "2.0",
        "shapes": {
            "example.test#Record": {
                "type": "structure",
                "members": { "id": { "target": "smithy.api#String" } }
            }
        }
    }"#;

    #[test]
    fn prelude_is_always_present() {
        let model = from_str(RECORD).unwrap();
        assert!(model.contains(&ShapeId::new("smithy.api#String")));
        assert_eq!(model.user_shapes().count(), 1);
    }

    #[test]
    fn metadata_is_ignored() {
        let with_metadata = RECORD.replacen('{', r#"{ "metadata": { "suppressions": [ { "id": "X" } ] },"#, 1);
        let model = from_str(&with_metadata).unwrap();
        assert_eq!(model.user_shapes().count(), 1);
    }

    #[test]
    fn identical_duplicates_merge() {
        let mut assembler = ModelAssembler::new();
        assembler.add_str(RECORD, "a.json").unwrap();
        assembler.add_str(RECORD, "b.json").unwrap();
        assert_eq!(assembler.assemble().unwrap().user_shapes().count(), 1);
    }

    #[test]
    fn conflicting_duplicates_fail() {
        let other = RECORD.replace("smithy.api#String", "smithy.api#Integer");
        let mut assembler = ModelAssembler::new();
        assembler.add_str(RECORD, "a.json").unwrap();
        assembler.add_str(&other, "b.json").unwrap();
        assert!(matches!(assembler.assemble(), Err(CodegenError::ConflictingShape(_))));
    }

    #[test]
    fn parse_errors_carry_origin_and_path() {
        let error = ModelAssembler::new()
            .add_str(r#"{"smithy": "2.0", "shapes": {"a#B": {"type": 3}}}"#, "broken.json")
            .unwrap_err();
        let message = error.to_string();
        assert!(message.contains("broken.json"), "{message}");
        assert!(message.contains("shapes"), "{message}");
    }

    #[test]
    fn reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, RECORD).unwrap();
        let model = from_path(&path).unwrap();
        assert!(model.contains(&ShapeId::new("example.test#Record")));
        assert!(matches!(
            from_path(&dir.path().join("missing.json")),
            Err(CodegenError::Io { .. })
        ));
    }
}
