//! Signed cookie values
//!
//! Cookie format: `base64url(json payload) "." base64url(HMAC-SHA256(payload_b64))`.
//! Used for the session cookie and for the short-lived pending-login cookie.

use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use rolegate_types::Principal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::crypto::HmacKey;
use crate::AuthError;

/// Payloads that carry their own expiry
pub trait Expiring {
    /// Expiry as Unix milliseconds
    fn expires_at_millis(&self) -> i64;

    fn is_expired(&self) -> bool {
        Utc::now().timestamp_millis() > self.expires_at_millis()
    }
}

/// Session cookie payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    /// Server-side session registry key
    pub session_id: String,
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    /// Issue timestamp (milliseconds)
    pub issued: i64,
    /// Expiration timestamp (milliseconds)
    pub expires: i64,
}

impl SessionPayload {
    /// New session for a principal with a fresh random ID
    pub fn new(principal: &Principal, duration: Duration) -> Self {
        let now = Utc::now().timestamp_millis();
        let lifetime = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            user_id: principal.user_id().to_string(),
            email: principal.email().to_string(),
            display_name: principal.display_name().to_string(),
            issued: now,
            expires: now.saturating_add(lifetime),
        }
    }

    pub fn principal(&self) -> Principal {
        Principal::new(&self.user_id, &self.email, &self.display_name)
    }
}

impl Expiring for SessionPayload {
    fn expires_at_millis(&self) -> i64 {
        self.expires
    }
}

/// Signs and verifies cookie payloads
#[derive(Clone)]
pub struct SessionCodec {
    key: HmacKey,
}

impl SessionCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, AuthError> {
        let key = HmacKey::new(secret)
            .map_err(|e| AuthError::Configuration(format!("session secret: {e}")))?;
        Ok(Self { key })
    }

    /// Serialize and sign a payload
    pub fn seal<T: Serialize>(&self, payload: &T) -> Result<String, AuthError> {
        let json = serde_json::to_vec(payload).map_err(|e| {
            tracing::error!("Failed to serialize cookie payload: {}", e);
            AuthError::Internal("failed to create cookie".to_string())
        })?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(json);
        let signature = URL_SAFE_NO_PAD.encode(self.key.sign(payload_b64.as_bytes()));
        Ok(format!("{payload_b64}.{signature}"))
    }

    /// Verify the signature, decode, and reject expired payloads
    pub fn open<T: DeserializeOwned + Expiring>(&self, cookie: &str) -> Result<T, AuthError> {
        let (payload_b64, signature_b64) = cookie.rsplit_once('.').ok_or(AuthError::InvalidToken)?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| AuthError::InvalidToken)?;
        if !self.key.verify(payload_b64.as_bytes(), &signature) {
            tracing::debug!("Cookie signature mismatch");
            return Err(AuthError::InvalidToken);
        }

        let json = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| AuthError::InvalidToken)?;
        let payload: T = serde_json::from_slice(&json).map_err(|_| AuthError::InvalidToken)?;

        if payload.is_expired() {
            return Err(AuthError::TokenExpired);
        }
        Ok(payload)
    }
}

impl std::fmt::Debug for SessionCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCodec").finish_non_exhaustive()
    }
}
