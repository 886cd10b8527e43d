//! Helpers behind generated constraint checks.

use once_cell::sync::OnceCell;
use regex::Regex;
use std::fmt;

/// A `@pattern` regex compiled on first use.
///
/// Patterns are validated at generation time; a pattern that still fails to
/// compile here matches nothing.
pub struct Pattern {
    source: &'static str,
    compiled: OnceCell<Option<Regex>>,
}

impl Pattern {
    pub const fn new(source: &'static str) -> Self {
        Pattern {
            source,
            compiled: OnceCell::new(),
        }
    }

    pub fn source(&self) -> &'static str {
        self.source
    }

    /// Unanchored search, the way `@pattern` is defined.
    pub fn is_match(&self, value: &str) -> bool {
        let compiled = self.compiled.get_or_init(|| match Regex::new(self.source) {
            Ok(regex) => Some(regex),
            Err(error) => {
                tracing::warn!(pattern = self.source, %error, "pattern failed to compile");
                None
            }
        });
        compiled.as_ref().is_some_and(|regex| regex.is_match(value))
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pattern").field(&self.source).finish()
    }
}

/// String length as `@length` counts it: Unicode scalar values.
pub fn char_count(value: &str) -> usize {
    value.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    static LOWERCASE: Pattern = Pattern::new("^[a-z]+$");
    static BROKEN: Pattern = Pattern::new("([a-z");

    #[test]
    fn pattern_matches_lazily() {
        assert!(LOWERCASE.is_match("abc"));
        assert!(!LOWERCASE.is_match("ABC"));
        assert_eq!(LOWERCASE.source(), "^[a-z]+$");
    }

    #[test]
    fn invalid_pattern_never_matches() {
        assert!(!BROKEN.is_match("abc"));
    }

    #[test]
    fn counts_scalar_values_not_bytes() {
        assert_eq!(char_count("abc"), 3);
        assert_eq!(char_count("é"), 1);
        assert_eq!(char_count("😀"), 1);
        assert_eq!("😀".len(), 4);
    }
}
