use crate::error::CodegenError;
use serde::de::DeserializeOwned;

/// Deserialize with JSON-path context in error messages. `origin` names the
/// document (usually a file path) in the error.
pub fn from_slice_with_path<T: DeserializeOwned>(bytes: &[u8], origin: &str) -> Result<T, CodegenError> {
    let de = &mut serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| {
        let path = err.path().to_string();
        CodegenError::ModelParse {
            origin: origin.to_string(),
            message: format!("at JSON path {path} → {}", err.into_inner()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Outer {
        #[allow(dead_code)]
        inner: Inner,
    }

    #[derive(Debug, Deserialize)]
    struct Inner {
        #[allow(dead_code)]
        count: u32,
    }

    #[test]
    fn error_names_the_path() {
        let error = from_slice_with_path::<Outer>(br#"{"inner": {"count": "x"}}"#, "test.json").unwrap_err();
        let message = error.to_string();
        assert!(message.contains("test.json"), "{message}");
        assert!(message.contains("inner.count"), "{message}");
    }
}
