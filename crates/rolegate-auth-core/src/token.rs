//! ID token validation with JWKS caching

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use moka::future::Cache;
use rolegate_types::Principal;
use serde::{Deserialize, Serialize};

use crate::crypto::constant_time_eq;
use crate::{AuthConfig, AuthError};

const KIDS_CACHE_KEY: &str = "jwks";

/// JWKS (JSON Web Key Set) structure
#[derive(Debug, Clone, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

/// Individual RSA signing key
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    pub kid: String,
    pub kty: String,
    #[serde(default)]
    pub n: String,
    #[serde(default)]
    pub e: String,
}

/// Claims read from an Azure AD v2.0 ID token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    /// Directory object ID, stable across apps
    #[serde(default)]
    pub oid: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub tid: Option<String>,
    pub iss: String,
    pub aud: String,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
}

impl IdTokenClaims {
    /// Build the signed-in principal.
    ///
    /// The user ID is `oid` (falling back to `sub`); the email is
    /// `preferred_username` falling back to `email`.
    pub fn into_principal(self) -> Result<Principal, AuthError> {
        let user_id = self
            .oid
            .filter(|v| !v.is_empty())
            .unwrap_or(self.sub);

        let email = self
            .preferred_username
            .filter(|v| !v.trim().is_empty())
            .or(self.email.filter(|v| !v.trim().is_empty()))
            .ok_or(AuthError::MissingClaim("preferred_username"))?;

        Ok(Principal::new(user_id, email, self.name.unwrap_or_default()))
    }
}

/// Validates ID tokens against the tenant's published signing keys
///
/// Keys are cached for `jwks_cache_duration`. While a key list is cached,
/// tokens naming an unknown key ID are rejected without refetching.
#[derive(Clone)]
pub struct IdTokenValidator {
    config: Arc<AuthConfig>,
    http_client: reqwest::Client,
    /// kid -> DecodingKey
    key_cache: Cache<String, Arc<DecodingKey>>,
    /// "jwks" -> kids in the last fetched key set
    jwks_kids_cache: Cache<String, Arc<Vec<String>>>,
}

impl IdTokenValidator {
    pub fn new(config: Arc<AuthConfig>) -> Self {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(2)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self::with_client(config, http_client)
    }

    pub fn with_client(config: Arc<AuthConfig>, http_client: reqwest::Client) -> Self {
        let ttl = config.jwks_cache_duration;
        Self {
            config,
            http_client,
            key_cache: Cache::builder().time_to_live(ttl).max_capacity(100).build(),
            jwks_kids_cache: Cache::builder().time_to_live(ttl).max_capacity(1).build(),
        }
    }

    /// Validate signature, issuer, audience, expiry and nonce
    pub async fn validate(&self, token: &str, expected_nonce: &str) -> Result<IdTokenClaims, AuthError> {
        let header = decode_header(token).map_err(|e| {
            tracing::debug!("Failed to decode token header: {}", e);
            AuthError::InvalidToken
        })?;

        let kid = header.kid.ok_or_else(|| {
            tracing::debug!("Token missing kid");
            AuthError::InvalidToken
        })?;

        let decoding_key = self.get_key(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.config.issuer()]);
        validation.set_audience(&[self.config.client_id.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);

        let claims = decode::<IdTokenClaims>(token, &decoding_key, &validation)
            .map_err(|e| {
                tracing::debug!("ID token validation failed: {}", e);
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                    _ => AuthError::InvalidToken,
                }
            })?
            .claims;

        let nonce_ok = claims
            .nonce
            .as_deref()
            .is_some_and(|n| constant_time_eq(n.as_bytes(), expected_nonce.as_bytes()));
        if !nonce_ok {
            tracing::debug!("ID token nonce mismatch");
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }

    async fn get_key(&self, kid: &str) -> Result<Arc<DecodingKey>, AuthError> {
        if let Some(key) = self.key_cache.get(kid).await {
            return Ok(key);
        }

        if let Some(known_kids) = self.jwks_kids_cache.get(KIDS_CACHE_KEY).await {
            if !known_kids.iter().any(|k| k == kid) {
                tracing::debug!(kid, "unknown key ID, not refetching JWKS");
                return Err(AuthError::InvalidToken);
            }
        }

        let jwks = self.fetch_jwks().await?;
        let kids: Vec<String> = jwks.keys.iter().map(|k| k.kid.clone()).collect();
        self.jwks_kids_cache
            .insert(KIDS_CACHE_KEY.to_string(), Arc::new(kids))
            .await;

        let mut found = None;
        for jwk in jwks.keys.iter().filter(|k| k.kty == "RSA") {
            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    let key = Arc::new(key);
                    if jwk.kid == kid {
                        found = Some(Arc::clone(&key));
                    }
                    self.key_cache.insert(jwk.kid.clone(), key).await;
                }
                Err(e) => tracing::warn!(kid = %jwk.kid, error = %e, "skipping unusable JWKS key"),
            }
        }

        found.ok_or_else(|| {
            tracing::debug!(kid, "key not found in JWKS");
            AuthError::InvalidToken
        })
    }

    async fn fetch_jwks(&self) -> Result<Jwks, AuthError> {
        let url = self.config.jwks_url();
        tracing::debug!("Fetching JWKS from {}", url);

        let response = self.http_client.get(&url).send().await.map_err(|e| {
            tracing::error!("Failed to fetch JWKS: {}", e);
            AuthError::Network(format!("failed to fetch signing keys: {e}"))
        })?;

        if !response.status().is_success() {
            tracing::error!("JWKS fetch returned status: {}", response.status());
            return Err(AuthError::Internal(format!(
                "signing key endpoint returned {}",
                response.status()
            )));
        }

        response.json::<Jwks>().await.map_err(|e| {
            tracing::error!("Failed to parse JWKS: {}", e);
            AuthError::Internal("failed to parse signing keys".to_string())
        })
    }

    /// Drop cached keys so the next validation refetches them
    pub fn invalidate_cache(&self) {
        self.key_cache.invalidate_all();
        self.jwks_kids_cache.invalidate_all();
    }
}

impl std::fmt::Debug for IdTokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdTokenValidator")
            .field("jwks_url", &self.config.jwks_url())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> IdTokenClaims {
        IdTokenClaims {
            sub: "sub-1".into(),
            oid: Some("oid-1".into()),
            preferred_username: Some("Alice@Example.com".into()),
            email: Some("alice@other.example".into()),
            name: Some("Alice".into()),
            nonce: Some("n".into()),
            tid: None,
            iss: "iss".into(),
            aud: "aud".into(),
            exp: 0,
            iat: 0,
        }
    }

    #[test]
    fn test_principal_from_claims() {
        let principal = claims().into_principal().unwrap();
        assert_eq!(principal.user_id(), "oid-1");
        assert_eq!(principal.email(), "alice@example.com");
        assert_eq!(principal.display_name(), "Alice");
    }

    #[test]
    fn test_principal_fallbacks() {
        let principal = IdTokenClaims {
            oid: None,
            preferred_username: None,
            name: None,
            ..claims()
        }
        .into_principal()
        .unwrap();
        assert_eq!(principal.user_id(), "sub-1");
        assert_eq!(principal.email(), "alice@other.example");
        assert_eq!(principal.display_name(), "");
    }

    #[test]
    fn test_principal_requires_an_email() {
        let result = IdTokenClaims {
            preferred_username: Some(" ".into()),
            email: None,
            ..claims()
        }
        .into_principal();
        assert!(matches!(result, Err(AuthError::MissingClaim(_))));
    }
}
