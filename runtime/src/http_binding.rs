//! Helpers for HTTP-bound members: URI labels, query strings and headers.

use crate::error::BoxError;
use crate::json::DeserializeError;
use http::HeaderMap;
use std::borrow::Cow;
use thiserror::Error;

pub const ERROR_TYPE_HEADER: &str = "x-amzn-errortype";

/// Why an incoming request could not be turned into an operation input.
#[derive(Debug, Error)]
pub enum RequestRejection {
    #[error("request method `{found}` does not match `{expected}`")]
    MethodMismatch { expected: &'static str, found: String },
    #[error("request path `{0}` does not match the operation's URI pattern")]
    UriMismatch(String),
    #[error("invalid value for label `{name}`: {reason}")]
    InvalidLabel { name: &'static str, reason: String },
    #[error("invalid value for header `{name}`: {reason}")]
    InvalidHeader { name: &'static str, reason: String },
    #[error("invalid value for query parameter `{name}`: {reason}")]
    InvalidQuery { name: &'static str, reason: String },
    #[error("malformed request body: {0}")]
    Body(#[from] DeserializeError),
    /// Carries the input structure's `ConstraintViolation`; downcast it to
    /// inspect the offending member.
    #[error("request failed validation: {0}")]
    ConstraintViolation(#[source] BoxError),
}

/// Failures while rendering a request or response. Only HTTP-level values
/// can fail; the JSON body never does.
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("invalid value for header `{name}`")]
    InvalidHeaderValue {
        name: &'static str,
        #[source]
        source: http::header::InvalidHeaderValue,
    },
    #[error("label `{0}` must not be empty")]
    EmptyLabel(&'static str),
    #[error("failed to build HTTP message")]
    Http(#[from] http::Error),
}

/// Percent-encodes a label value. Greedy labels keep their `/` separators.
pub fn fmt_label(value: &str, greedy: bool) -> String {
    if greedy {
        value
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/")
    } else {
        urlencoding::encode(value).into_owned()
    }
}

pub fn fmt_query(value: &str) -> Cow<'_, str> {
    urlencoding::encode(value)
}

/// Appends query parameters to a URI that may already carry a literal query.
#[derive(Debug, Clone)]
pub struct QueryWriter {
    uri: String,
    separator: char,
}

impl QueryWriter {
    pub fn new(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let separator = if uri.contains('?') { '&' } else { '?' };
        QueryWriter { uri, separator }
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.uri.push(self.separator);
        self.uri.push_str(&fmt_query(key));
        self.uri.push('=');
        self.uri.push_str(&fmt_query(value));
        self.separator = '&';
    }

    pub fn build_uri(self) -> String {
        self.uri
    }
}

pub fn percent_decode(value: &str) -> Result<String, std::string::FromUtf8Error> {
    urlencoding::decode(value).map(Cow::into_owned)
}

/// Splits a raw query string into decoded pairs, in order. Keys without `=`
/// get an empty value.
pub fn parse_query(query: &str) -> Result<Vec<(String, String)>, RequestRejection> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let decode = |raw: &str| {
                percent_decode(raw).map_err(|error| RequestRejection::InvalidQuery {
                    name: "query",
                    reason: error.to_string(),
                })
            };
            Ok((decode(key)?, decode(value)?))
        })
        .collect()
}

/// Matches a request path against a URI template such as
/// `/records/{id}/files/{path+}` and returns the decoded label values.
///
/// Any literal query in the template is ignored here.
pub fn match_uri_template(template: &str, path: &str) -> Option<Vec<(String, String)>> {
    let template_path = template.split('?').next().unwrap_or(template);
    let template_segments: Vec<&str> = template_path.trim_start_matches('/').split('/').collect();
    let path_segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

    let mut labels = Vec::new();
    let mut cursor = 0;
    for (position, segment) in template_segments.iter().enumerate() {
        let label = segment.strip_prefix('{').and_then(|rest| rest.strip_suffix('}'));
        match label {
            Some(name) if name.ends_with('+') => {
                let remaining_literals = template_segments.len() - position - 1;
                let take = path_segments.len().checked_sub(cursor + remaining_literals)?;
                if take == 0 {
                    return None;
                }
                let raw = path_segments[cursor..cursor + take].join("/");
                labels.push((name.trim_end_matches('+').to_string(), percent_decode(&raw).ok()?));
                cursor += take;
            }
            Some(name) => {
                let raw = path_segments.get(cursor)?;
                if raw.is_empty() {
                    return None;
                }
                labels.push((name.to_string(), percent_decode(raw).ok()?));
                cursor += 1;
            }
            None => {
                if path_segments.get(cursor) != Some(segment) {
                    return None;
                }
                cursor += 1;
            }
        }
    }
    (cursor == path_segments.len()).then_some(labels)
}

pub fn one_header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<Option<&'a str>, RequestRejection> {
    let mut values = headers.get_all(name).iter();
    let Some(first) = values.next() else {
        return Ok(None);
    };
    if values.next().is_some() {
        return Err(RequestRejection::InvalidHeader {
            name,
            reason: "expected a single value".to_string(),
        });
    }
    first.to_str().map(Some).map_err(|error| RequestRejection::InvalidHeader {
        name,
        reason: error.to_string(),
    })
}

/// All values of a list header, split on commas outside double quotes.
pub fn many_headers(headers: &HeaderMap, name: &'static str) -> Result<Vec<String>, RequestRejection> {
    let mut values = Vec::new();
    for raw in headers.get_all(name) {
        let raw = raw.to_str().map_err(|error| RequestRejection::InvalidHeader {
            name,
            reason: error.to_string(),
        })?;
        values.extend(split_header_list(raw).map_err(|reason| RequestRejection::InvalidHeader { name, reason })?);
    }
    Ok(values)
}

/// Like [`many_headers`], for lists of http-date timestamps, whose values
/// contain a comma of their own.
pub fn many_http_dates(headers: &HeaderMap, name: &'static str) -> Result<Vec<String>, RequestRejection> {
    let parts = many_headers(headers, name)?;
    if parts.len() % 2 != 0 {
        return Err(RequestRejection::InvalidHeader {
            name,
            reason: "incomplete http-date in list".to_string(),
        });
    }
    Ok(parts
        .chunks(2)
        .map(|pair| format!("{}, {}", pair[0], pair[1]))
        .collect())
}

fn split_header_list(raw: &str) -> Result<Vec<String>, String> {
    let mut values = Vec::new();
    let mut chars = raw.chars().peekable();
    loop {
        while chars.next_if(|ch| ch.is_ascii_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }
        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some('\\') => value.push(chars.next().ok_or("unterminated escape in quoted value")?),
                    Some(ch) => value.push(ch),
                    None => return Err("unterminated quoted value".to_string()),
                }
            }
            while chars.next_if(|ch| ch.is_ascii_whitespace()).is_some() {}
            match chars.next() {
                None | Some(',') => {}
                Some(other) => return Err(format!("unexpected `{other}` after quoted value")),
            }
        } else {
            for ch in chars.by_ref() {
                if ch == ',' {
                    break;
                }
                value.push(ch);
            }
            value.truncate(value.trim_end().len());
        }
        values.push(value);
    }
    Ok(values)
}

/// Quotes a list element that would otherwise be split or trimmed.
pub fn quote_header_value(value: &str) -> Cow<'_, str> {
    let needs_quotes = value.contains([',', '"'])
        || value.starts_with(|ch: char| ch.is_ascii_whitespace())
        || value.ends_with(|ch: char| ch.is_ascii_whitespace());
    if needs_quotes {
        Cow::Owned(format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\"")))
    } else {
        Cow::Borrowed(value)
    }
}

pub fn header_value(name: &'static str, value: &str) -> Result<http::HeaderValue, SerializationError> {
    http::HeaderValue::try_from(value).map_err(|source| SerializationError::InvalidHeaderValue { name, source })
}
