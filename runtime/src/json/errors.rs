//! Generic error-response parsing for the JSON protocol.

use crate::error::ErrorMetadata;
use crate::http_binding::ERROR_TYPE_HEADER;
use crate::json::deserialize::{DeserializeError, Token, json_token_iter};
use crate::json::token::{expect_owned_string_or_null, skip_value};

/// Strips a namespace prefix and a trailing `:` suffix from an error code.
///
/// `aws.protocoltests.restjson#FooError:http://internal.amazon.com/` becomes
/// `FooError`.
pub fn sanitize_error_code(error_code: &str) -> &str {
    let without_suffix = match error_code.find(':') {
        Some(idx) => &error_code[..idx],
        None => error_code,
    };
    match without_suffix.rfind('#') {
        Some(idx) => &without_suffix[idx + 1..],
        None => without_suffix,
    }
}

struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

fn parse_error_body(bytes: &[u8]) -> Result<ErrorBody, DeserializeError> {
    let mut tokens = json_token_iter(bytes).peekable();
    let (mut type_code, mut code, mut message) = (None, None, None);
    if let Some(Token::StartObject { .. }) = tokens.next().transpose()? {
        loop {
            match tokens.next().transpose()? {
                Some(Token::EndObject { .. }) => break,
                Some(Token::ObjectKey { key, .. }) => {
                    if let Some(Ok(Token::ValueString { .. })) = tokens.peek() {
                        match key.as_escaped_str() {
                            "__type" => type_code = expect_owned_string_or_null(tokens.next())?,
                            "code" | "Code" => code = expect_owned_string_or_null(tokens.next())?,
                            "message" | "Message" | "errorMessage" => {
                                message = expect_owned_string_or_null(tokens.next())?
                            }
                            _ => skip_value(&mut tokens)?,
                        }
                    } else {
                        skip_value(&mut tokens)?;
                    }
                }
                _ => return Err(DeserializeError::custom("expected object key or end of object")),
            }
        }
    }
    Ok(ErrorBody {
        code: type_code.or(code),
        message,
    })
}

/// Reads the error code from the `X-Amzn-Errortype` header when present,
/// otherwise from the body's `__type` or `code` field.
pub fn parse_error_metadata(payload: &[u8], headers: &http::HeaderMap) -> Result<ErrorMetadata, DeserializeError> {
    let ErrorBody { code, message } = parse_error_body(payload)?;
    let header_code = headers
        .get(ERROR_TYPE_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let code = header_code
        .or(code)
        .map(|code| sanitize_error_code(&code).to_string());
    Ok(ErrorMetadata::new(code, message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_codes() {
        assert_eq!(sanitize_error_code("FooError"), "FooError");
        assert_eq!(sanitize_error_code("FooError:http://internal.amazon.com/"), "FooError");
        assert_eq!(sanitize_error_code("aws.protocoltests.restjson#FooError"), "FooError");
        assert_eq!(
            sanitize_error_code("aws.protocoltests.restjson#FooError:http://internal.amazon.com/"),
            "FooError"
        );
    }

    #[test]
    fn header_wins_over_body() {
        let mut headers = http::HeaderMap::new();
        headers.insert(ERROR_TYPE_HEADER, http::HeaderValue::from_static("ns#FromHeader"));
        let meta = parse_error_metadata(br#"{"__type": "FromBody", "message": "boom"}"#, &headers).unwrap();
        assert_eq!(meta.code(), Some("FromHeader"));
        assert_eq!(meta.message(), Some("boom"));
    }

    #[test]
    fn body_type_then_code() {
        let headers = http::HeaderMap::new();
        let meta = parse_error_metadata(br#"{"code": "Second", "__type": "ns#First", "extra": [1]}"#, &headers).unwrap();
        assert_eq!(meta.code(), Some("First"));
        let meta = parse_error_metadata(br#"{"code": "Only"}"#, &headers).unwrap();
        assert_eq!(meta.code(), Some("Only"));
    }

    #[test]
    fn empty_body_has_no_code() {
        let meta = parse_error_metadata(b"", &http::HeaderMap::new()).unwrap();
        assert_eq!(meta.code(), None);
    }
}
