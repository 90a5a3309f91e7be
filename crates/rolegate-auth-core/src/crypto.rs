//! Signing keys, constant-time comparison and random tokens

use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Validated HMAC-SHA256 key, cheap to clone
#[derive(Clone)]
pub struct HmacKey {
    bytes: Arc<[u8]>,
}

impl HmacKey {
    /// Minimum key length in bytes
    pub const MIN_KEY_LENGTH: usize = 32;

    /// # Errors
    /// Returns error if the key is shorter than [`Self::MIN_KEY_LENGTH`].
    pub fn new(key: impl AsRef<[u8]>) -> Result<Self, HmacKeyError> {
        let bytes = key.as_ref();
        if bytes.len() < Self::MIN_KEY_LENGTH {
            return Err(HmacKeyError::KeyTooShort {
                actual: bytes.len(),
                minimum: Self::MIN_KEY_LENGTH,
            });
        }
        Ok(Self {
            bytes: Arc::from(bytes),
        })
    }

    /// MAC over `data`
    pub fn sign(&self, data: &[u8]) -> [u8; 32] {
        // Length checked in new(); HMAC accepts any key length anyway
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.bytes)
            .expect("HMAC accepts keys of any length");
        mac.update(data);
        mac.finalize().into_bytes().into()
    }

    /// Verify a MAC in constant time
    pub fn verify(&self, data: &[u8], signature: &[u8]) -> bool {
        constant_time_eq(&self.sign(data), signature)
    }
}

impl std::fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacKey")
            .field("key_length", &self.bytes.len())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum HmacKeyError {
    #[error("HMAC key too short: got {actual} bytes, need at least {minimum}")]
    KeyTooShort { actual: usize, minimum: usize },
}

/// Compare two byte slices without leaking where they differ.
///
/// Slices of different length compare unequal immediately; only the length
/// is observable.
#[inline]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

/// URL-safe random token (two v4 UUIDs, 244 random bits)
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    bytes[..16].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
    bytes[16..].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_minimum_length() {
        assert!(HmacKey::new("short").is_err());
        assert!(HmacKey::new("a".repeat(32)).is_ok());
    }

    #[test]
    fn test_sign_and_verify() {
        let key = HmacKey::new("k".repeat(32)).unwrap();
        let sig = key.sign(b"payload");
        assert!(key.verify(b"payload", &sig));
        assert!(!key.verify(b"payload2", &sig));
        assert!(!key.verify(b"payload", &sig[..31]));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"state-1", b"state-1"));
        assert!(!constant_time_eq(b"state-1", b"state-2"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_random_tokens_are_unique_and_url_safe() {
        let a = random_token();
        let b = random_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
