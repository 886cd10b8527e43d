//! Generation settings: a camelCase JSON document shaped like the `codegen`
//! block of a `smithy-build.json` projection.

use crate::error::{CodegenError, Result};
use crate::model::ShapeId;
use crate::path_de::from_slice_with_path;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Client,
    Server,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CodegenSettings {
    /// Restrict operation-level generation to this service's operations.
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default = "default_target")]
    pub target: Target,
    /// Server only: expose constrained newtypes in the public API.
    #[serde(default = "default_true")]
    pub public_constrained_types: bool,
    /// Path the generated code uses to reach `shapegen-runtime`.
    #[serde(default = "default_runtime_crate")]
    pub runtime_crate: String,
    /// Path of the module the generated modules are mounted under.
    #[serde(default = "default_crate_root")]
    pub crate_root: String,
}

fn default_target() -> Target {
    Target::Client
}

fn default_true() -> bool {
    true
}

fn default_runtime_crate() -> String {
    "::shapegen_runtime".to_string()
}

fn default_crate_root() -> String {
    "crate".to_string()
}

impl Default for CodegenSettings {
    fn default() -> Self {
        CodegenSettings {
            service: None,
            target: default_target(),
            public_constrained_types: default_true(),
            runtime_crate: default_runtime_crate(),
            crate_root: default_crate_root(),
        }
    }
}

#[derive(Deserialize)]
struct BuildFile {
    codegen: CodegenSettings,
}

impl CodegenSettings {
    pub fn client() -> Self {
        CodegenSettings::default()
    }

    pub fn server(public_constrained_types: bool) -> Self {
        CodegenSettings {
            target: Target::Server,
            public_constrained_types,
            ..CodegenSettings::default()
        }
    }

    pub fn with_crate_root(mut self, crate_root: impl Into<String>) -> Self {
        self.crate_root = crate_root.into();
        self
    }

    /// Accepts either the bare settings object or a document with a `codegen`
    /// key holding it.
    pub fn from_slice(bytes: &[u8], origin: &str) -> Result<Self> {
        let value: serde_json::Value = from_slice_with_path(bytes, origin)?;
        if value.get("codegen").is_some() {
            Ok(from_slice_with_path::<BuildFile>(bytes, origin)?.codegen)
        } else {
            from_slice_with_path(bytes, origin)
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|source| CodegenError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_slice(&bytes, &path.to_string_lossy())
    }

    pub fn service_id(&self) -> Option<ShapeId> {
        self.service.as_deref().map(ShapeId::new)
    }

    pub fn is_server(&self) -> bool {
        self.target == Target::Server
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_client() {
        let settings = CodegenSettings::from_slice(b"{}", "settings.json").unwrap();
        assert_eq!(settings, CodegenSettings::client());
        assert_eq!(settings.runtime_crate, "::shapegen_runtime");
    }

    #[test]
    fn reads_a_codegen_block() {
        let settings = CodegenSettings::from_slice(
            br#"{"codegen": {"target": "server", "publicConstrainedTypes": false, "crateRoot": "crate::server"}}"#,
            "smithy-build.json",
        )
        .unwrap();
        assert!(settings.is_server());
        assert!(!settings.public_constrained_types);
        assert_eq!(settings.crate_root, "crate::server");
    }

    #[test]
    fn unknown_keys_are_rejected_with_their_path() {
        let error = CodegenSettings::from_slice(br#"{"codegen": {"tagret": "server"}}"#, "build.json").unwrap_err();
        assert!(error.to_string().contains("codegen"), "{error}");
    }
}
