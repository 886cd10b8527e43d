//! The records model compiled three ways, plus a few helpers the tests share.

use shapegen_runtime::json::deserialize::JsonTokenIterator;
use shapegen_runtime::json::{JsonObjectWriter, json_token_iter};
use std::iter::Peekable;

/// Server code with constrained newtypes in the public API.
pub mod server {
    include!(concat!(env!("OUT_DIR"), "/server.rs"));
}

/// Server code whose constrained newtypes stay crate-private.
pub mod server_internal {
    include!(concat!(env!("OUT_DIR"), "/server_internal.rs"));
}

pub mod client {
    include!(concat!(env!("OUT_DIR"), "/client.rs"));
}

/// Runs a structure serializer and returns the JSON object it wrote.
pub fn write_object(write: impl FnOnce(&mut JsonObjectWriter<'_>)) -> String {
    let mut out = String::new();
    let mut object = JsonObjectWriter::new(&mut out);
    write(&mut object);
    object.finish();
    out
}

pub fn tokens(input: &[u8]) -> Peekable<JsonTokenIterator<'_>> {
    json_token_iter(input).peekable()
}
