use crux_kv::{error::KeyValueError, KeyValue};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{AppError, ErrorKind};
use crate::event::Event;

pub const MAX_KEY_LENGTH: usize = 512;
pub const MAX_TOKEN_BYTES: usize = 16 * 1024;
pub const TOKEN_KEY: &str = "access_token";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KvKey {
    namespace: KeyNamespace,
    key: String,
}

impl KvKey {
    pub fn new(namespace: KeyNamespace, key: impl Into<String>) -> Result<Self, KvError> {
        let key = key.into();
        Self::validate_key(&key)?;
        Ok(Self { namespace, key })
    }

    #[must_use]
    pub fn raw(&self) -> String {
        format!("{}:{}", self.namespace.prefix(), self.key)
    }

    fn validate_key(key: &str) -> Result<(), KvError> {
        let invalid = |reason: &str| KvError::InvalidKey {
            key: key.chars().take(50).collect(),
            reason: reason.to_string(),
        };

        if key.trim().is_empty() {
            return Err(invalid("key cannot be empty"));
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(invalid("key is too long"));
        }
        if key.contains("..") || key.starts_with('/') || key.starts_with('\\') {
            return Err(invalid("key cannot contain path sequences"));
        }
        if key.chars().any(char::is_control) {
            return Err(invalid("key contains control characters"));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyNamespace {
    Session,
}

impl KeyNamespace {
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Session => "session",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KvError {
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("stored token is not valid UTF-8")]
    InvalidEncoding,

    #[error("stored token is too large: {size} bytes")]
    TooLarge { size: usize },
}

impl From<KeyValueError> for KvError {
    fn from(e: KeyValueError) -> Self {
        Self::Unavailable(e.to_string())
    }
}

impl From<KvError> for AppError {
    fn from(e: KvError) -> Self {
        AppError::new(ErrorKind::Storage, "Could not access secure storage")
            .with_context("kv_error", e.to_string())
    }
}

/// Reads, writes and clears the persisted bearer token. Nothing else in the
/// crate touches the key-value store.
pub struct TokenStore<'a> {
    kv: &'a KeyValue<Event>,
}

impl<'a> TokenStore<'a> {
    #[must_use]
    pub const fn new(kv: &'a KeyValue<Event>) -> Self {
        Self { kv }
    }

    pub fn key() -> Result<KvKey, KvError> {
        KvKey::new(KeyNamespace::Session, TOKEN_KEY)
    }

    pub fn load<F>(&self, make_event: F) -> Result<(), KvError>
    where
        F: FnOnce(Result<Option<Vec<u8>>, KeyValueError>) -> Event + Send + Sync + 'static,
    {
        self.kv.get(Self::key()?.raw(), make_event);
        Ok(())
    }

    pub fn save<F>(&self, token: &SecretString, make_event: F) -> Result<(), KvError>
    where
        F: FnOnce(Result<Option<Vec<u8>>, KeyValueError>) -> Event + Send + Sync + 'static,
    {
        let bytes = token.expose_secret().as_bytes().to_vec();
        if bytes.len() > MAX_TOKEN_BYTES {
            return Err(KvError::TooLarge { size: bytes.len() });
        }
        self.kv.set(Self::key()?.raw(), bytes, make_event);
        Ok(())
    }

    pub fn clear<F>(&self, make_event: F) -> Result<(), KvError>
    where
        F: FnOnce(Result<Option<Vec<u8>>, KeyValueError>) -> Event + Send + Sync + 'static,
    {
        self.kv.delete(Self::key()?.raw(), make_event);
        Ok(())
    }
}

/// Interprets a token read. Missing, empty, oversized and undecodable values all
/// come back as `None`; only the error detail differs.
pub fn decode_token(
    result: Result<Option<Vec<u8>>, KeyValueError>,
) -> (Option<String>, Option<KvError>) {
    let bytes = match result {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return (None, None),
        Err(e) => return (None, Some(e.into())),
    };

    if bytes.len() > MAX_TOKEN_BYTES {
        return (None, Some(KvError::TooLarge { size: bytes.len() }));
    }
    match String::from_utf8(bytes) {
        Ok(token) if token.trim().is_empty() => (None, None),
        Ok(token) => (Some(token.trim().to_string()), None),
        Err(_) => (None, Some(KvError::InvalidEncoding)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_key() {
        assert_eq!(TokenStore::key().unwrap().raw(), "session:access_token");
    }

    #[test]
    fn test_key_validation() {
        assert!(KvKey::new(KeyNamespace::Session, "").is_err());
        assert!(KvKey::new(KeyNamespace::Session, "   ").is_err());
        assert!(KvKey::new(KeyNamespace::Session, "../etc/passwd").is_err());
        assert!(KvKey::new(KeyNamespace::Session, "key\0value").is_err());
        assert!(KvKey::new(KeyNamespace::Session, "a".repeat(MAX_KEY_LENGTH + 1)).is_err());
        assert!(KvKey::new(KeyNamespace::Session, "refresh_token").is_ok());
    }

    #[test]
    fn test_decode_present_token() {
        let (token, err) = decode_token(Ok(Some(b"abc.def.ghi".to_vec())));
        assert_eq!(token.as_deref(), Some("abc.def.ghi"));
        assert!(err.is_none());
    }

    #[test]
    fn test_decode_missing_token() {
        assert_eq!(decode_token(Ok(None)), (None, None));
        assert_eq!(decode_token(Ok(Some(Vec::new()))), (None, None));
    }

    #[test]
    fn test_decode_fails_closed() {
        let (token, err) = decode_token(Err(KeyValueError::Io {
            message: "disk gone".into(),
        }));
        assert!(token.is_none());
        assert!(matches!(err, Some(KvError::Unavailable(_))));

        let (token, err) = decode_token(Ok(Some(vec![0xff, 0xfe])));
        assert!(token.is_none());
        assert_eq!(err, Some(KvError::InvalidEncoding));

        let (token, err) = decode_token(Ok(Some(vec![b'a'; MAX_TOKEN_BYTES + 1])));
        assert!(token.is_none());
        assert!(matches!(err, Some(KvError::TooLarge { .. })));
    }
}
