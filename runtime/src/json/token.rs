//! Token-level helpers called by generated deserializers.
//!
//! Each `expect_*` helper takes the next token (as returned by `Iterator::next`)
//! and either interprets it or reports what it found instead. `null` maps to
//! `Ok(None)` so callers can tell an explicit null from a missing key.

use crate::blob::Blob;
use crate::date_time::{DateTime, Format};
use crate::document::Document;
use crate::json::deserialize::{DeserializeError, EscapedStr, MAX_NESTING_DEPTH, Token};
use crate::number::Number;
use indexmap::IndexMap;
use std::iter::Peekable;

pub type NextToken<'a> = Option<Result<Token<'a>, DeserializeError>>;

fn unexpected(token: &Token<'_>, expected: &str) -> DeserializeError {
    DeserializeError::custom(format!("expected {expected}, found {}", token.describe()))
        .with_offset(token.offset().0)
}

pub fn expect_start_object(token: NextToken<'_>) -> Result<(), DeserializeError> {
    match token.transpose()? {
        Some(Token::StartObject { .. }) => Ok(()),
        Some(other) => Err(unexpected(&other, "start of object")),
        None => Err(DeserializeError::unexpected_eos()),
    }
}

pub fn expect_start_array(token: NextToken<'_>) -> Result<(), DeserializeError> {
    match token.transpose()? {
        Some(Token::StartArray { .. }) => Ok(()),
        Some(other) => Err(unexpected(&other, "start of array")),
        None => Err(DeserializeError::unexpected_eos()),
    }
}

pub fn expect_string_or_null<'a>(token: NextToken<'a>) -> Result<Option<EscapedStr<'a>>, DeserializeError> {
    match token.transpose()? {
        Some(Token::ValueNull { .. }) => Ok(None),
        Some(Token::ValueString { value, .. }) => Ok(Some(value)),
        Some(other) => Err(unexpected(&other, "string or null")),
        None => Err(DeserializeError::unexpected_eos()),
    }
}

pub fn expect_owned_string_or_null(token: NextToken<'_>) -> Result<Option<String>, DeserializeError> {
    expect_string_or_null(token)?
        .map(|value| value.to_unescaped().map(|unescaped| unescaped.into_owned()))
        .transpose()
        .map_err(DeserializeError::from)
}

/// Numbers, plus the string spellings of the non-finite floats.
pub fn expect_number_or_null(token: NextToken<'_>) -> Result<Option<Number>, DeserializeError> {
    match token.transpose()? {
        Some(Token::ValueNull { .. }) => Ok(None),
        Some(Token::ValueNumber { value, .. }) => Ok(Some(value)),
        Some(Token::ValueString { value, offset }) => match value.as_escaped_str() {
            "NaN" => Ok(Some(Number::Float(f64::NAN))),
            "Infinity" => Ok(Some(Number::Float(f64::INFINITY))),
            "-Infinity" => Ok(Some(Number::Float(f64::NEG_INFINITY))),
            other => Err(DeserializeError::custom(format!(
                "only `NaN`, `Infinity` and `-Infinity` may be written as strings, found `{other}`"
            ))
            .with_offset(offset.0)),
        },
        Some(other) => Err(unexpected(&other, "number or null")),
        None => Err(DeserializeError::unexpected_eos()),
    }
}

pub fn expect_bool_or_null(token: NextToken<'_>) -> Result<Option<bool>, DeserializeError> {
    match token.transpose()? {
        Some(Token::ValueNull { .. }) => Ok(None),
        Some(Token::ValueBool { value, .. }) => Ok(Some(value)),
        Some(other) => Err(unexpected(&other, "boolean or null")),
        None => Err(DeserializeError::unexpected_eos()),
    }
}

pub fn expect_blob_or_null(token: NextToken<'_>) -> Result<Option<Blob>, DeserializeError> {
    let offset = token.as_ref().and_then(|t| t.as_ref().ok()).map(|t| t.offset().0);
    let Some(encoded) = expect_string_or_null(token)? else {
        return Ok(None);
    };
    Blob::from_base64(encoded.as_escaped_str())
        .map(Some)
        .map_err(|error| {
            let error = DeserializeError::custom_source("invalid base64 blob", error);
            match offset {
                Some(offset) => error.with_offset(offset),
                None => error,
            }
        })
}

/// Epoch-seconds timestamps are numbers; the other formats are strings.
pub fn expect_timestamp_or_null(token: NextToken<'_>, format: Format) -> Result<Option<DateTime>, DeserializeError> {
    let parsed = match format {
        Format::EpochSeconds => match expect_number_or_null(token)? {
            Some(number) => {
                let seconds = number.to_f64_lossy();
                if !seconds.is_finite() {
                    return Err(DeserializeError::custom("epoch-seconds timestamp must be finite"));
                }
                Some(DateTime::from_secs_f64(seconds))
            }
            None => None,
        },
        Format::DateTime | Format::HttpDate => match expect_owned_string_or_null(token)? {
            Some(value) => Some(
                DateTime::from_str(&value, format)
                    .map_err(|error| DeserializeError::custom_source("invalid timestamp", error))?,
            ),
            None => None,
        },
    };
    Ok(parsed)
}

pub fn expect_document<'a, I>(tokens: &mut Peekable<I>) -> Result<Document, DeserializeError>
where
    I: Iterator<Item = Result<Token<'a>, DeserializeError>>,
{
    read_document(tokens, 0)
}

fn read_document<'a, I>(tokens: &mut Peekable<I>, depth: usize) -> Result<Document, DeserializeError>
where
    I: Iterator<Item = Result<Token<'a>, DeserializeError>>,
{
    if depth >= MAX_NESTING_DEPTH {
        return Err(DeserializeError::custom(format!(
            "document nesting exceeds {MAX_NESTING_DEPTH} levels"
        )));
    }
    match tokens.next().transpose()? {
        Some(Token::ValueNull { .. }) => Ok(Document::Null),
        Some(Token::ValueBool { value, .. }) => Ok(Document::Bool(value)),
        Some(Token::ValueNumber { value, .. }) => Ok(Document::Number(value)),
        Some(Token::ValueString { value, .. }) => Ok(Document::String(value.to_unescaped()?.into_owned())),
        Some(Token::StartArray { .. }) => {
            let mut array = Vec::new();
            loop {
                if let Some(Ok(Token::EndArray { .. })) = tokens.peek() {
                    tokens.next();
                    return Ok(Document::Array(array));
                }
                array.push(read_document(tokens, depth + 1)?);
            }
        }
        Some(Token::StartObject { .. }) => {
            let mut object = IndexMap::new();
            loop {
                match tokens.next().transpose()? {
                    Some(Token::EndObject { .. }) => return Ok(Document::Object(object)),
                    Some(Token::ObjectKey { key, .. }) => {
                        let key = key.to_unescaped()?.into_owned();
                        let value = read_document(tokens, depth + 1)?;
                        object.insert(key, value);
                    }
                    Some(other) => return Err(unexpected(&other, "object key or end of object")),
                    None => return Err(DeserializeError::unexpected_eos()),
                }
            }
        }
        Some(other) => Err(unexpected(&other, "a value")),
        None => Err(DeserializeError::unexpected_eos()),
    }
}

/// Consumes exactly the tokens of the next value, recursively.
pub fn skip_value<'a, I>(tokens: &mut I) -> Result<(), DeserializeError>
where
    I: Iterator<Item = Result<Token<'a>, DeserializeError>>,
{
    match tokens.next().transpose()? {
        Some(Token::StartArray { .. }) | Some(Token::StartObject { .. }) => skip_inner(tokens, 1),
        Some(
            Token::ValueBool { .. } | Token::ValueNull { .. } | Token::ValueNumber { .. } | Token::ValueString { .. },
        ) => Ok(()),
        Some(other) => Err(unexpected(&other, "a value")),
        None => Err(DeserializeError::unexpected_eos()),
    }
}

/// Consumes the remainder of the array or object that is currently open.
pub fn skip_to_end<'a, I>(tokens: &mut I) -> Result<(), DeserializeError>
where
    I: Iterator<Item = Result<Token<'a>, DeserializeError>>,
{
    skip_inner(tokens, 1)
}

fn skip_inner<'a, I>(tokens: &mut I, mut depth: usize) -> Result<(), DeserializeError>
where
    I: Iterator<Item = Result<Token<'a>, DeserializeError>>,
{
    while depth > 0 {
        match tokens.next().transpose()? {
            Some(Token::StartArray { .. } | Token::StartObject { .. }) => depth += 1,
            Some(Token::EndArray { .. } | Token::EndObject { .. }) => depth -= 1,
            Some(_) => {}
            None => return Err(DeserializeError::unexpected_eos()),
        }
    }
    Ok(())
}
