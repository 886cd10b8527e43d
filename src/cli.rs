//! Command line: load models → (generate | shapes)
use crate::codegen::Codegen;
use crate::config::{CodegenSettings, Target};
use crate::context::GenContext;
use crate::model::{self, Model, ShapeKind};
use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// generate Rust types, JSON serde, builders, event stream marshallers and HTTP bindings from a shape model
#[derive(Parser, Debug)]
#[command(name = "shapegen", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// generate code for a model
    Generate(GenerateOut),
    /// print every shape with the Rust type it maps to
    Shapes(ShapesOut),
}

#[derive(Args, Debug, Clone)]
struct ModelSettings {
    /// One or more JSON AST model files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    model: Vec<String>,

    /// settings file, either the bare `codegen` object or a document holding one
    #[arg(long)]
    settings: Option<PathBuf>,

    /// overrides the target named in the settings file
    #[arg(long, value_enum)]
    target: Option<Target>,

    /// server only: expose constrained newtypes in the public API
    #[arg(long)]
    public_constrained_types: Option<bool>,

    /// restrict operation-level generation to one service
    #[arg(long)]
    service: Option<String>,
}

#[derive(clap::Parser, Debug)]
struct GenerateOut {
    #[command(flatten)]
    model_settings: ModelSettings,

    /// write a standalone crate into this directory
    #[arg(short, long, conflicts_with = "single_file")]
    out: Option<PathBuf>,

    /// write every module into one file meant for `include!` (stdout if neither output is given)
    #[arg(long)]
    single_file: Option<PathBuf>,

    /// package name of the generated crate
    #[arg(long, default_value = "generated")]
    crate_name: String,

    /// depend on `shapegen-runtime` through this path instead of the registry
    #[arg(long)]
    runtime_path: Option<PathBuf>,

    /// debugging
    #[arg(long)]
    no_op: bool,
}

#[derive(clap::Parser, Debug)]
struct ShapesOut {
    #[command(flatten)]
    model_settings: ModelSettings,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl ModelSettings {
    fn load_settings(&self) -> anyhow::Result<CodegenSettings> {
        let mut settings = match self.settings.as_ref() {
            Some(path) => CodegenSettings::from_path(path)?,
            None => CodegenSettings::default(),
        };
        if let Some(target) = self.target {
            settings.target = target;
        }
        if let Some(public) = self.public_constrained_types {
            settings.public_constrained_types = public;
        }
        if let Some(service) = self.service.as_ref() {
            settings.service = Some(service.clone());
        }
        Ok(settings)
    }

    fn load_model(&self) -> anyhow::Result<Model> {
        let source_paths = resolve_file_path_patterns(&self.model)?;
        tracing::debug!(files = source_paths.len(), "loading model");
        let mut model = model::load::from_paths(&source_paths).context("failed to load the model")?;
        model::transform::run_all(&mut model).context("failed to prepare the model")?;
        Ok(model)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Generate(target) => {
                // debug path
                if target.no_op {
                    eprintln!("{self:#?}");
                    return Ok(());
                }

                let settings = target.model_settings.load_settings()?;
                let model = target.model_settings.load_model()?;
                let code = Codegen::new(&model, &settings).generate()?;

                if let Some(dir) = target.out.as_ref() {
                    code.write_crate(dir, &target.crate_name, target.runtime_path.as_deref())?;
                    eprintln!("{} {}", "wrote".green().bold(), dir.display());
                } else if let Some(path) = target.single_file.as_ref() {
                    code.write_single_file(path)?;
                    eprintln!("{} {}", "wrote".green().bold(), path.display());
                } else {
                    print!("{}", code.render_single_file()?);
                }
                Ok(())
            }
            Command::Shapes(target) => {
                let settings = target.model_settings.load_settings()?;
                let model = target.model_settings.load_model()?;
                let ctx = GenContext::new(&model, &settings)?;
                for shape in model.user_shapes() {
                    let rust_type = match shape.kind {
                        ShapeKind::Operation(_) | ShapeKind::Service(_) => None,
                        _ => Some(ctx.public_type(shape)?),
                    };
                    let marker = if ctx.is_constrained(&shape.id) {
                        " constrained".yellow().to_string()
                    } else {
                        String::new()
                    };
                    match rust_type {
                        Some(rust_type) => println!(
                            "{} {} {}{marker}",
                            shape.id.as_str().bold(),
                            shape.kind_name().cyan(),
                            rust_type.dimmed()
                        ),
                        None => println!("{} {}", shape.id.as_str().bold(), shape.kind_name().cyan()),
                    }
                }
                Ok(())
            }
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    // Overlapping patterns load a file once.
    out.sort();
    out.dedup();
    Ok(out)
}
