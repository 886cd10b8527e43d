//! Generates Rust code from a Smithy-style shape graph: data types, JSON
//! serializers and deserializers, constrained-type builders, event stream
//! marshallers and HTTP bindings.

pub mod binding;
pub mod builder;
pub mod cli;
pub mod codegen;
pub mod config;
pub mod constraint;
pub mod context;
pub mod deserializer;
pub mod error;
pub mod event_stream;
pub mod http_binding;
pub mod model;
pub mod path_de;
pub mod serializer;
pub mod structure;
pub mod symbol;
pub mod writer;

pub use codegen::{Codegen, GeneratedCode};
pub use config::{CodegenSettings, Target};
pub use error::{CodegenError, Result};
