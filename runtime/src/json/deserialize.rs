//! Forward-only JSON tokenizer.
//!
//! The tokenizer never builds a tree. It yields one [`Token`] per structural
//! element and validates nesting as it goes, so generated deserializers can walk
//! a document with a `Peekable` and one token of lookahead.

use crate::error::BoxError;
use crate::json::escape::{EscapeError, unescape_string};
use crate::number::Number;
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;

/// Byte offset of a token in the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Offset(pub usize);

/// A string slice still carrying its JSON escapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscapedStr<'a>(&'a str);

impl<'a> EscapedStr<'a> {
    pub fn new(value: &'a str) -> Self {
        EscapedStr(value)
    }

    pub fn as_escaped_str(&self) -> &'a str {
        self.0
    }

    pub fn to_unescaped(self) -> Result<Cow<'a, str>, EscapeError> {
        unescape_string(self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    StartArray { offset: Offset },
    EndArray { offset: Offset },
    ObjectKey { offset: Offset, key: EscapedStr<'a> },
    StartObject { offset: Offset },
    EndObject { offset: Offset },
    ValueBool { offset: Offset, value: bool },
    ValueNull { offset: Offset },
    ValueNumber { offset: Offset, value: Number },
    ValueString { offset: Offset, value: EscapedStr<'a> },
}

impl Token<'_> {
    pub fn offset(&self) -> Offset {
        match self {
            Token::StartArray { offset }
            | Token::EndArray { offset }
            | Token::ObjectKey { offset, .. }
            | Token::StartObject { offset }
            | Token::EndObject { offset }
            | Token::ValueBool { offset, .. }
            | Token::ValueNull { offset }
            | Token::ValueNumber { offset, .. }
            | Token::ValueString { offset, .. } => *offset,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Token::StartArray { .. } => "start of array",
            Token::EndArray { .. } => "end of array",
            Token::ObjectKey { .. } => "object key",
            Token::StartObject { .. } => "start of object",
            Token::EndObject { .. } => "end of object",
            Token::ValueBool { .. } => "boolean",
            Token::ValueNull { .. } => "null",
            Token::ValueNumber { .. } => "number",
            Token::ValueString { .. } => "string",
        }
    }
}

#[derive(Debug, Error)]
pub enum DeserializeErrorKind {
    #[error("{message}")]
    Custom {
        message: Cow<'static, str>,
        #[source]
        source: Option<BoxError>,
    },
    #[error("expected literal `{0}`")]
    ExpectedLiteral(&'static str),
    #[error("invalid number")]
    InvalidNumber,
    #[error("invalid UTF-8 in string")]
    InvalidUtf8,
    #[error("failed to unescape string: {0}")]
    UnescapeFailed(#[from] EscapeError),
    #[error("unexpected control character 0x{0:02x} in string")]
    UnexpectedControlCharacter(u8),
    #[error("nesting exceeds {0} levels")]
    NestingTooDeep(usize),
    #[error("unexpected end of input")]
    UnexpectedEos,
    #[error("unexpected `{found}`, expected {expected}")]
    UnexpectedToken { found: char, expected: &'static str },
}

/// Failure while tokenizing or interpreting a JSON document.
#[derive(Debug)]
pub struct DeserializeError {
    kind: DeserializeErrorKind,
    offset: Option<usize>,
}

impl DeserializeError {
    fn new(kind: DeserializeErrorKind, offset: Option<usize>) -> Self {
        DeserializeError { kind, offset }
    }

    pub fn custom(message: impl Into<Cow<'static, str>>) -> Self {
        DeserializeError::new(
            DeserializeErrorKind::Custom { message: message.into(), source: None },
            None,
        )
    }

    pub fn custom_source(message: impl Into<Cow<'static, str>>, source: impl Into<BoxError>) -> Self {
        DeserializeError::new(
            DeserializeErrorKind::Custom { message: message.into(), source: Some(source.into()) },
            None,
        )
    }

    pub fn unexpected_eos() -> Self {
        DeserializeError::new(DeserializeErrorKind::UnexpectedEos, None)
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn kind(&self) -> &DeserializeErrorKind {
        &self.kind
    }

    pub fn offset(&self) -> Option<usize> {
        self.offset
    }
}

impl fmt::Display for DeserializeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "error parsing JSON at offset {offset}: {}", self.kind),
            None => write!(f, "error parsing JSON: {}", self.kind),
        }
    }
}

impl std::error::Error for DeserializeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.kind)
    }
}

impl From<EscapeError> for DeserializeError {
    fn from(error: EscapeError) -> Self {
        DeserializeError::new(DeserializeErrorKind::UnescapeFailed(error), None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Initial,
    ArrayFirstValueOrEnd,
    ArrayNextValueOrEnd,
    ObjectFirstKeyOrEnd,
    ObjectNextKeyOrEnd,
    ObjectFieldValue,
}

/// Deepest array/object nesting the tokenizer accepts. Generated
/// deserializers recurse once per level, so this also bounds their stack use.
pub const MAX_NESTING_DEPTH: usize = 128;

pub struct JsonTokenIterator<'a> {
    input: &'a [u8],
    index: usize,
    states: Vec<State>,
    failed: bool,
}

/// Tokenizes `input`. Values that follow a complete top-level value are
/// tokenized too, which is how document entry points detect trailing data.
pub fn json_token_iter(input: &[u8]) -> JsonTokenIterator<'_> {
    JsonTokenIterator {
        input,
        index: 0,
        states: vec![State::Initial],
        failed: false,
    }
}

impl<'a> JsonTokenIterator<'a> {
    fn peek_byte(&self) -> Option<u8> {
        self.input.get(self.index).copied()
    }

    fn discard_whitespace(&mut self) {
        while let Some(b' ' | b'\t' | b'\r' | b'\n') = self.peek_byte() {
            self.index += 1;
        }
    }

    fn error_at(&self, kind: DeserializeErrorKind) -> DeserializeError {
        DeserializeError::new(kind, Some(self.index))
    }

    fn unexpected(&self, expected: &'static str) -> DeserializeError {
        match self.peek_byte() {
            Some(byte) => self.error_at(DeserializeErrorKind::UnexpectedToken {
                found: char::from(byte),
                expected,
            }),
            None => self.error_at(DeserializeErrorKind::UnexpectedEos),
        }
    }

    fn replace_state(&mut self, state: State) {
        if let Some(top) = self.states.last_mut() {
            *top = state;
        }
    }

    fn read_value(&mut self) -> Result<Token<'a>, DeserializeError> {
        self.discard_whitespace();
        let offset = Offset(self.index);
        if matches!(self.peek_byte(), Some(b'{' | b'[')) && self.states.len() >= MAX_NESTING_DEPTH {
            return Err(self.error_at(DeserializeErrorKind::NestingTooDeep(MAX_NESTING_DEPTH)));
        }
        match self.peek_byte() {
            Some(b'{') => {
                self.index += 1;
                self.states.push(State::ObjectFirstKeyOrEnd);
                Ok(Token::StartObject { offset })
            }
            Some(b'[') => {
                self.index += 1;
                self.states.push(State::ArrayFirstValueOrEnd);
                Ok(Token::StartArray { offset })
            }
            Some(b'"') => Ok(Token::ValueString { offset, value: self.read_string()? }),
            Some(b't') => self.read_literal("true").map(|_| Token::ValueBool { offset, value: true }),
            Some(b'f') => self.read_literal("false").map(|_| Token::ValueBool { offset, value: false }),
            Some(b'n') => self.read_literal("null").map(|_| Token::ValueNull { offset }),
            Some(b'-' | b'0'..=b'9') => Ok(Token::ValueNumber { offset, value: self.read_number()? }),
            _ => Err(self.unexpected("a JSON value")),
        }
    }

    fn read_literal(&mut self, literal: &'static str) -> Result<(), DeserializeError> {
        let end = self.index + literal.len();
        if self.input.get(self.index..end) == Some(literal.as_bytes()) {
            self.index = end;
            Ok(())
        } else {
            Err(self.error_at(DeserializeErrorKind::ExpectedLiteral(literal)))
        }
    }

    fn read_string(&mut self) -> Result<EscapedStr<'a>, DeserializeError> {
        // Skip the opening quote.
        self.index += 1;
        let start = self.index;
        loop {
            match self.peek_byte() {
                None => return Err(self.error_at(DeserializeErrorKind::UnexpectedEos)),
                Some(b'"') => break,
                Some(b'\\') => self.index += 2,
                Some(byte) if byte < 0x20 => {
                    return Err(self.error_at(DeserializeErrorKind::UnexpectedControlCharacter(byte)));
                }
                Some(_) => self.index += 1,
            }
        }
        let raw = std::str::from_utf8(&self.input[start..self.index])
            .map_err(|_| DeserializeError::new(DeserializeErrorKind::InvalidUtf8, Some(start)))?;
        self.index += 1;
        Ok(EscapedStr::new(raw))
    }

    fn read_number(&mut self) -> Result<Number, DeserializeError> {
        let start = self.index;
        while let Some(b'-' | b'+' | b'.' | b'e' | b'E' | b'0'..=b'9') = self.peek_byte() {
            self.index += 1;
        }
        let invalid = || DeserializeError::new(DeserializeErrorKind::InvalidNumber, Some(start));
        let text = std::str::from_utf8(&self.input[start..self.index]).map_err(|_| invalid())?;
        let is_float = text.contains(['.', 'e', 'E']);
        let number = if is_float {
            text.parse::<f64>().ok().map(Number::Float)
        } else if text.starts_with('-') {
            text.parse::<i64>()
                .map(Number::NegInt)
                .ok()
                .or_else(|| text.parse::<f64>().ok().map(Number::Float))
        } else {
            text.parse::<u64>()
                .map(Number::PosInt)
                .ok()
                .or_else(|| text.parse::<f64>().ok().map(Number::Float))
        };
        number.ok_or_else(invalid)
    }

    fn read_key(&mut self) -> Result<Token<'a>, DeserializeError> {
        let offset = Offset(self.index);
        if self.peek_byte() != Some(b'"') {
            return Err(self.unexpected("an object key"));
        }
        let key = self.read_string()?;
        self.discard_whitespace();
        if self.peek_byte() != Some(b':') {
            return Err(self.unexpected("`:`"));
        }
        self.index += 1;
        self.replace_state(State::ObjectFieldValue);
        Ok(Token::ObjectKey { offset, key })
    }

    fn step(&mut self) -> Option<Result<Token<'a>, DeserializeError>> {
        self.discard_whitespace();
        let state = match self.states.last() {
            Some(state) => *state,
            None => {
                if self.index >= self.input.len() {
                    return None;
                }
                self.states.push(State::Initial);
                State::Initial
            }
        };
        let offset = Offset(self.index);
        let result = match state {
            State::Initial => {
                if self.index >= self.input.len() {
                    return None;
                }
                self.states.pop();
                self.read_value()
            }
            State::ArrayFirstValueOrEnd => {
                if self.peek_byte() == Some(b']') {
                    self.index += 1;
                    self.states.pop();
                    Ok(Token::EndArray { offset })
                } else {
                    self.replace_state(State::ArrayNextValueOrEnd);
                    self.read_value()
                }
            }
            State::ArrayNextValueOrEnd => match self.peek_byte() {
                Some(b']') => {
                    self.index += 1;
                    self.states.pop();
                    Ok(Token::EndArray { offset })
                }
                Some(b',') => {
                    self.index += 1;
                    self.read_value()
                }
                _ => Err(self.unexpected("`,` or `]`")),
            },
            State::ObjectFirstKeyOrEnd => {
                if self.peek_byte() == Some(b'}') {
                    self.index += 1;
                    self.states.pop();
                    Ok(Token::EndObject { offset })
                } else {
                    self.read_key()
                }
            }
            State::ObjectNextKeyOrEnd => match self.peek_byte() {
                Some(b'}') => {
                    self.index += 1;
                    self.states.pop();
                    Ok(Token::EndObject { offset })
                }
                Some(b',') => {
                    self.index += 1;
                    self.discard_whitespace();
                    self.read_key()
                }
                _ => Err(self.unexpected("`,` or `}`")),
            },
            State::ObjectFieldValue => {
                self.replace_state(State::ObjectNextKeyOrEnd);
                self.read_value()
            }
        };
        Some(result)
    }
}

impl<'a> Iterator for JsonTokenIterator<'a> {
    type Item = Result<Token<'a>, DeserializeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.step();
        if let Some(Err(_)) = &item {
            self.failed = true;
        }
        item
    }
}
