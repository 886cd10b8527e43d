//! The JSON wire format: tokenizer, writers and token helpers.

pub mod deserialize;
pub mod errors;
pub mod escape;
pub mod serialize;
pub mod token;

pub use deserialize::{DeserializeError, EscapedStr, Offset, Token, json_token_iter};
pub use serialize::{JsonArrayWriter, JsonObjectWriter, JsonValueWriter};
