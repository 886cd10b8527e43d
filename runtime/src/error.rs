//! Error plumbing shared by generated error enums.

use std::fmt;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Code and message recovered from an error response, modeled or not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorMetadata {
    code: Option<String>,
    message: Option<String>,
}

impl ErrorMetadata {
    pub fn new(code: Option<String>, message: Option<String>) -> Self {
        ErrorMetadata { code, message }
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for ErrorMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => write!(f, "{code}: {message}"),
            (Some(code), None) => f.write_str(code),
            (None, Some(message)) => f.write_str(message),
            (None, None) => f.write_str("unknown error"),
        }
    }
}

/// An error the model does not describe.
#[derive(Debug, Error)]
#[error("unhandled error ({meta})")]
pub struct Unhandled {
    meta: ErrorMetadata,
    #[source]
    source: Option<BoxError>,
}

impl Unhandled {
    pub fn new(meta: ErrorMetadata) -> Self {
        Unhandled { meta, source: None }
    }

    pub fn from_source(source: impl Into<BoxError>) -> Self {
        Unhandled {
            meta: ErrorMetadata::default(),
            source: Some(source.into()),
        }
    }

    pub fn meta(&self) -> &ErrorMetadata {
        &self.meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefers_code_and_message() {
        let meta = ErrorMetadata::new(Some("Throttled".into()), Some("slow down".into()));
        assert_eq!(Unhandled::new(meta).to_string(), "unhandled error (Throttled: slow down)");
        assert_eq!(
            Unhandled::new(ErrorMetadata::default()).to_string(),
            "unhandled error (unknown error)"
        );
    }

    #[test]
    fn source_is_exposed() {
        let error = Unhandled::from_source("boom");
        assert_eq!(std::error::Error::source(&error).map(|e| e.to_string()), Some("boom".to_string()));
    }
}
