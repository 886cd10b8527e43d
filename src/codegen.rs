//! Orchestration: runs every generator over a model and lays the fragments
//! out as modules, either in one file or as a standalone crate.

use crate::config::CodegenSettings;
use crate::constraint::render_support_module;
use crate::context::GenContext;
use crate::deserializer::DeserializerGenerator;
use crate::error::{CodegenError, Result};
use crate::event_stream;
use crate::http_binding::HttpGenerator;
use crate::model::{Model, Shape, ShapeKind};
use crate::serializer::SerializerGenerator;
use crate::structure::{render_error_module, render_shape};
use crate::symbol::module_name;
use crate::writer::{Dependency, Fragment, RustWriter};
use crate::wln;
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;

/// Lints the generated modules opt out of.
const MODULE_ATTRIBUTES: &str =
    "#[allow(unused_mut, unused_variables, unused_imports, dead_code, private_interfaces, private_bounds, clippy::all)]";

const HEADER: &str = "// Code generated by shapegen. DO NOT EDIT.";

/// One generation run over a transformed model.
pub struct Codegen<'m> {
    model: &'m Model,
    settings: &'m CodegenSettings,
}

impl<'m> Codegen<'m> {
    pub fn new(model: &'m Model, settings: &'m CodegenSettings) -> Self {
        Codegen { model, settings }
    }

    pub fn generate(&self) -> Result<GeneratedCode> {
        let ctx = GenContext::new(self.model, self.settings)?;
        tracing::info!(
            shapes = self.model.user_shapes().count(),
            target = ?self.settings.target,
            "generating"
        );

        let mut constrained = RustWriter::new();
        render_support_module(&mut constrained)?;

        let model = self.render_model(&ctx)?;

        let mut errors = RustWriter::new();
        render_error_module(&ctx, &mut errors)?;
        errors.depends_on(Dependency::Runtime);

        let mut ser = SerializerGenerator::new(&ctx);
        let mut de = DeserializerGenerator::new(&ctx);
        for shape in self.model.user_shapes().filter(|shape| has_json_functions(shape)) {
            ser.shape_fn(shape)?;
            de.shape_fn(shape)?;
        }
        let event_streams = event_stream::render_all(&ctx, &mut ser, &mut de)?;
        let http = HttpGenerator::new(&ctx, &mut ser, &mut de).render_all()?;
        let protocol_serde = merge("protocol_serde", [ser.finish(), de.finish()]);

        let modules = vec![
            constrained.into_fragment("constrained"),
            model,
            errors.into_fragment("error"),
            protocol_serde,
            event_streams,
            http,
        ];
        for module in &modules {
            tracing::debug!(module = %module.name, bytes = module.code.len(), "rendered module");
        }
        Ok(GeneratedCode { modules })
    }

    /// Type definitions, rendered per shape in parallel and stitched back
    /// together in model order.
    fn render_model(&self, ctx: &GenContext<'_>) -> Result<Fragment> {
        let shapes: Vec<&Shape> = self.model.user_shapes().collect();
        let rendered = shapes
            .par_iter()
            .map(|shape| {
                let (mut top, mut inner) = (RustWriter::new(), RustWriter::new());
                render_shape(ctx, shape, &mut top, &mut inner)?;
                Ok((*shape, top.as_str().to_string(), inner.as_str().to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut w = RustWriter::new();
        for (shape, top, inner) in rendered {
            if top.trim().is_empty() && inner.trim().is_empty() {
                continue;
            }
            w.write_code(&top)?;
            wln!(w)?;
            if !inner.trim().is_empty() {
                wln!(w, "/// Builder and validation types for [`{}`].", module_name(&shape.id))?;
                w.block(&format!("pub mod {}", module_name(&shape.id)), |w| {
                    Ok(w.write_code(&inner)?)
                })?;
                wln!(w)?;
            }
        }
        w.depends_on(Dependency::Runtime);
        Ok(w.into_fragment("model"))
    }
}

fn has_json_functions(shape: &Shape) -> bool {
    match shape.kind {
        ShapeKind::Structure { .. } | ShapeKind::List { .. } | ShapeKind::Map { .. } => true,
        ShapeKind::Union { .. } => !shape.is_event_stream(),
        _ => false,
    }
}

fn merge<const N: usize>(name: &str, fragments: [Fragment; N]) -> Fragment {
    let mut merged = Fragment {
        name: name.to_string(),
        ..Fragment::default()
    };
    for fragment in fragments.into_iter().filter(|fragment| !fragment.is_empty()) {
        if !merged.code.is_empty() {
            merged.code.push('\n');
        }
        merged.code.push_str(&fragment.code);
        merged.dependencies.extend(fragment.dependencies);
    }
    merged
}

/// The modules of one run, in the order they are emitted.
#[derive(Debug, Clone)]
pub struct GeneratedCode {
    pub modules: Vec<Fragment>,
}

impl GeneratedCode {
    pub fn module(&self, name: &str) -> Option<&Fragment> {
        self.modules.iter().find(|module| module.name == name)
    }

    /// External crates the generated code needs.
    pub fn dependencies(&self) -> BTreeSet<Dependency> {
        self.modules
            .iter()
            .flat_map(|module| module.dependencies.iter().copied())
            .collect()
    }

    /// Every module as `pub mod name { .. }`, for `include!` under the
    /// configured crate root.
    pub fn render_single_file(&self) -> Result<String> {
        let mut w = RustWriter::new();
        wln!(w, "{HEADER}")?;
        wln!(w)?;
        for module in &self.modules {
            wln!(w, "{MODULE_ATTRIBUTES}")?;
            w.block(&format!("pub mod {}", module.name), |w| Ok(w.absorb(module)?))?;
            wln!(w)?;
        }
        Ok(w.as_str().to_string())
    }

    pub fn write_single_file(&self, path: &Path) -> Result<()> {
        write_file(path, &self.render_single_file()?)
    }

    /// `Cargo.toml` of a crate holding the generated code. The runtime comes
    /// from `runtime_path` when given, else from the registry.
    pub fn cargo_manifest(&self, crate_name: &str, runtime_path: Option<&Path>) -> Result<String> {
        let mut out = String::new();
        writeln!(out, "[package]")?;
        writeln!(out, "name = \"{crate_name}\"")?;
        writeln!(out, "version = \"0.1.0\"")?;
        writeln!(out, "edition = \"2024\"")?;
        writeln!(out)?;
        writeln!(out, "[dependencies]")?;
        for dependency in self.dependencies() {
            match (dependency, runtime_path) {
                (Dependency::Runtime, Some(path)) => {
                    writeln!(out, "{} = {{ path = {:?} }}", dependency.crate_name(), path.to_string_lossy())?
                }
                (Dependency::Runtime, None) => writeln!(out, "{} = \"0.1\"", dependency.crate_name())?,
                (Dependency::Http, _) => writeln!(out, "{} = \"1\"", dependency.crate_name())?,
            }
        }
        Ok(out)
    }

    /// A crate at `dir`: `Cargo.toml`, `src/lib.rs` and one file per module.
    pub fn write_crate(&self, dir: &Path, crate_name: &str, runtime_path: Option<&Path>) -> Result<()> {
        write_file(&dir.join("Cargo.toml"), &self.cargo_manifest(crate_name, runtime_path)?)?;
        let mut lib = RustWriter::new();
        wln!(lib, "{HEADER}")?;
        wln!(lib)?;
        for module in &self.modules {
            wln!(lib, "{MODULE_ATTRIBUTES}")?;
            wln!(lib, "pub mod {};", module.name)?;
            let mut file = RustWriter::new();
            wln!(file, "{HEADER}")?;
            wln!(file)?;
            file.absorb(module)?;
            write_file(&dir.join("src").join(format!("{}.rs", module.name)), file.as_str())?;
        }
        write_file(&dir.join("src").join("lib.rs"), lib.as_str())?;
        tracing::info!(dir = %dir.display(), modules = self.modules.len(), "wrote crate");
        Ok(())
    }
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    let write_error = |source| CodegenError::Write {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_error)?;
    }
    std::fs::write(path, contents).map_err(write_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{load, transform};

    const MODEL: &str = r#"{"smithy": "2.0", "shapes": {
        "t#Tags": { "type": "list", "member": { "target": "smithy.api#String" } },
        "t#Record": { "type": "structure", "members": {
            "id": { "target": "smithy.api#String", "traits": { "smithy.api#required": {} } },
            "tags": { "target": "t#Tags" }
        }},
        "t#PutRecord": { "type": "operation", "input": { "target": "t#Record" } }
    }}"#;

    fn generate(settings: &CodegenSettings) -> GeneratedCode {
        let mut model = load::from_str(MODEL).unwrap();
        transform::run_all(&mut model).unwrap();
        Codegen::new(&model, settings).generate().unwrap()
    }

    #[test]
    fn modules_are_emitted_in_a_fixed_order() {
        let code = generate(&CodegenSettings::client());
        let names: Vec<&str> = code.modules.iter().map(|module| module.name.as_str()).collect();
        assert_eq!(
            names,
            ["constrained", "model", "error", "protocol_serde", "event_stream_serde", "http_serde"]
        );
        assert!(code.module("model").unwrap().code.contains("pub struct Record"));
        assert!(code.module("protocol_serde").unwrap().code.contains("pub fn ser_record("));
        assert!(code.module("protocol_serde").unwrap().code.contains("pub fn de_record<'a, I>("));
    }

    #[test]
    fn generation_is_deterministic() {
        let settings = CodegenSettings::server(true);
        let first = generate(&settings).render_single_file().unwrap();
        let second = generate(&settings).render_single_file().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn single_file_output_wraps_modules() {
        let file = generate(&CodegenSettings::client()).render_single_file().unwrap();
        assert!(file.starts_with(HEADER));
        assert!(file.contains("pub mod model {"));
        assert!(file.contains("pub mod record {"));
    }

    #[test]
    fn manifest_lists_the_referenced_crates() {
        let code = generate(&CodegenSettings::client());
        let manifest = code.cargo_manifest("records", Some(Path::new("../runtime"))).unwrap();
        assert!(manifest.contains("name = \"records\""));
        assert!(manifest.contains("shapegen-runtime = { path = \"../runtime\" }"), "{manifest}");
        assert!(manifest.contains("http = \"1\""), "{manifest}");
    }

    #[test]
    fn crates_are_written_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let code = generate(&CodegenSettings::client());
        code.write_crate(dir.path(), "records", None).unwrap();
        let lib = std::fs::read_to_string(dir.path().join("src/lib.rs")).unwrap();
        assert!(lib.contains("pub mod protocol_serde;"));
        assert!(dir.path().join("src/http_serde.rs").exists());
        assert!(dir.path().join("Cargo.toml").exists());
    }
}
