use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Binary data, carried as standard base64 inside JSON documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Blob {
    inner: Vec<u8>,
}

impl Blob {
    pub fn new<T: Into<Vec<u8>>>(input: T) -> Self {
        Blob { inner: input.into() }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.inner
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.inner)
    }

    pub fn from_base64(input: &str) -> Result<Self, base64::DecodeError> {
        STANDARD.decode(input).map(Blob::new)
    }
}

impl AsRef<[u8]> for Blob {
    fn as_ref(&self) -> &[u8] {
        &self.inner
    }
}

impl From<Vec<u8>> for Blob {
    fn from(value: Vec<u8>) -> Self {
        Blob::new(value)
    }
}

impl From<&[u8]> for Blob {
    fn from(value: &[u8]) -> Self {
        Blob::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::Blob;

    #[test]
    fn base64_round_trip() {
        let blob = Blob::new(b"hello\x00world".to_vec());
        let encoded = blob.to_base64();
        assert_eq!(encoded, "aGVsbG8Ad29ybGQ=");
        assert_eq!(Blob::from_base64(&encoded).unwrap(), blob);
    }

    #[test]
    fn invalid_base64_is_rejected() {
        assert!(Blob::from_base64("not base64!").is_err());
    }
}
