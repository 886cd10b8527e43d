use std::borrow::Cow;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscapeError {
    #[error("escape sequence runs past the end of the string")]
    UnexpectedEndOfString,
    #[error("invalid escape character `{0}`")]
    InvalidEscapeCharacter(char),
    #[error("invalid unicode escape `{0}`")]
    InvalidUnicodeEscape(String),
    #[error("unpaired surrogate in unicode escape `{0}`")]
    InvalidSurrogate(String),
}

/// Escapes `value` for use inside a JSON string literal.
pub fn escape_string(value: &str) -> Cow<'_, str> {
    let needs_escape = value.bytes().any(|b| b == b'"' || b == b'\\' || b < 0x20);
    if !needs_escape {
        return Cow::Borrowed(value);
    }
    let mut escaped = String::with_capacity(value.len() + 8);
    for ch in value.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\u{08}' => escaped.push_str("\\b"),
            '\u{0C}' => escaped.push_str("\\f"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            ch if (ch as u32) < 0x20 => escaped.push_str(&format!("\\u{:04x}", ch as u32)),
            ch => escaped.push(ch),
        }
    }
    Cow::Owned(escaped)
}

/// Reverses [`escape_string`]. Borrows when there is nothing to unescape.
pub fn unescape_string(value: &str) -> Result<Cow<'_, str>, EscapeError> {
    if !value.contains('\\') {
        return Ok(Cow::Borrowed(value));
    }
    let mut unescaped = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            unescaped.push(ch);
            continue;
        }
        match chars.next().ok_or(EscapeError::UnexpectedEndOfString)? {
            '"' => unescaped.push('"'),
            '\\' => unescaped.push('\\'),
            '/' => unescaped.push('/'),
            'b' => unescaped.push('\u{08}'),
            'f' => unescaped.push('\u{0C}'),
            'n' => unescaped.push('\n'),
            'r' => unescaped.push('\r'),
            't' => unescaped.push('\t'),
            'u' => unescaped.push(read_unicode_escape(&mut chars)?),
            other => return Err(EscapeError::InvalidEscapeCharacter(other)),
        }
    }
    Ok(Cow::Owned(unescaped))
}

fn read_code_unit(chars: &mut std::str::Chars<'_>) -> Result<u16, EscapeError> {
    let digits: String = chars.by_ref().take(4).collect();
    if digits.chars().count() != 4 {
        return Err(EscapeError::UnexpectedEndOfString);
    }
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(EscapeError::InvalidUnicodeEscape(digits));
    }
    u16::from_str_radix(&digits, 16).map_err(|_| EscapeError::InvalidUnicodeEscape(digits))
}

fn read_unicode_escape(chars: &mut std::str::Chars<'_>) -> Result<char, EscapeError> {
    let high = read_code_unit(chars)?;
    if !(0xD800..0xDC00).contains(&high) {
        return char::from_u32(u32::from(high))
            .ok_or_else(|| EscapeError::InvalidSurrogate(format!("\\u{high:04x}")));
    }
    if chars.next() != Some('\\') || chars.next() != Some('u') {
        return Err(EscapeError::InvalidSurrogate(format!("\\u{high:04x}")));
    }
    let low = read_code_unit(chars)?;
    if !(0xDC00..0xE000).contains(&low) {
        return Err(EscapeError::InvalidSurrogate(format!("\\u{high:04x}\\u{low:04x}")));
    }
    let combined = 0x10000 + ((u32::from(high) - 0xD800) << 10) + (u32::from(low) - 0xDC00);
    char::from_u32(combined).ok_or_else(|| EscapeError::InvalidSurrogate(format!("\\u{high:04x}\\u{low:04x}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn escapes_control_characters() {
        assert_eq!(escape_string("plain"), "plain");
        assert_eq!(escape_string("a\"b\\c\n\u{01}"), "a\\\"b\\\\c\\n\\u0001");
    }

    #[test]
    fn unescapes_surrogate_pairs() {
        assert_eq!(unescape_string("\\ud83d\\ude00").unwrap(), "😀");
        assert_eq!(unescape_string("caf\\u00e9").unwrap(), "café");
        assert!(matches!(unescape_string("\\ud83d"), Err(EscapeError::InvalidSurrogate(_))));
        assert!(matches!(unescape_string("\\q"), Err(EscapeError::InvalidEscapeCharacter('q'))));
        assert!(matches!(unescape_string("\\u12"), Err(EscapeError::UnexpectedEndOfString)));
    }

    proptest! {
        #[test]
        fn unescape_inverts_escape(value in any::<String>()) {
            let escaped = escape_string(&value);
            prop_assert_eq!(unescape_string(&escaped).unwrap(), value.as_str());
        }
    }
}
