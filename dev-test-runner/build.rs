//! Generates the three flavours of the records model that the tests compile
//! against: a server with public constrained types, a server that keeps them
//! crate-private, and a client.

use shapegen::model::{load, transform};
use shapegen::{Codegen, CodegenSettings};
use std::path::{Path, PathBuf};

const MODEL: &str = "model/records.json";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cargo:rerun-if-changed={MODEL}");
    let mut model = load::from_path(Path::new(MODEL))?;
    transform::run_all(&mut model)?;

    let out_dir = PathBuf::from(std::env::var("OUT_DIR")?);
    let flavours = [
        ("server.rs", CodegenSettings::server(true).with_crate_root("crate::server")),
        ("server_internal.rs", CodegenSettings::server(false).with_crate_root("crate::server_internal")),
        ("client.rs", CodegenSettings::client().with_crate_root("crate::client")),
    ];
    for (file, settings) in flavours {
        Codegen::new(&model, &settings)
            .generate()?
            .write_single_file(&out_dir.join(file))?;
    }
    Ok(())
}
