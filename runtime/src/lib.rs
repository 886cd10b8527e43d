//! Runtime support for code emitted by `shapegen`.
//!
//! Generated serializers, deserializers, builders and event-stream unmarshallers
//! call into this crate. Nothing here knows about any particular model: the
//! JSON tokenizer and writer, the primitive value types, event-stream message
//! plumbing, and the small HTTP helpers for labels, query strings and headers.

pub mod blob;
pub mod constraint;
pub mod date_time;
pub mod document;
pub mod error;
pub mod event_stream;
pub mod http_binding;
pub mod json;
pub mod number;

pub use blob::Blob;
pub use date_time::DateTime;
pub use document::Document;
pub use number::Number;
