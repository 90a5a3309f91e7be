//! Configuration types for sign-in

use std::time::Duration;

use reqwest::Url;

use crate::crypto::HmacKey;
use crate::AuthError;

/// Public Azure AD authority
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Scopes requested at sign-in
pub const LOGIN_SCOPES: &str = "openid profile email";

/// Sign-in configuration
#[derive(Clone)]
pub struct AuthConfig {
    /// App registration (client) ID; also the expected ID token audience
    pub client_id: String,
    pub client_secret: String,
    /// Directory (tenant) ID
    pub tenant_id: String,
    /// Callback URL registered with the app
    pub redirect_uri: String,
    /// HMAC secret for session and login cookies
    pub session_secret: String,
    pub session_duration: Duration,
    /// How long a started login may take to come back
    pub login_timeout: Duration,
    pub jwks_cache_duration: Duration,
    /// Authority base URL, overridable for sovereign clouds and tests
    pub authority_host: String,
}

impl AuthConfig {
    /// Create a config without validating it
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        tenant_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        session_secret: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            tenant_id: tenant_id.into(),
            redirect_uri: redirect_uri.into(),
            session_secret: session_secret.into(),
            session_duration: Duration::from_secs(8 * 60 * 60),
            login_timeout: Duration::from_secs(10 * 60),
            jwks_cache_duration: Duration::from_secs(60 * 60),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
        }
    }

    /// Create and validate a config
    pub fn try_new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        tenant_id: impl Into<String>,
        redirect_uri: impl Into<String>,
        session_secret: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let config = Self::new(client_id, client_secret, tenant_id, redirect_uri, session_secret);
        config.validate()?;
        Ok(config)
    }

    /// Check required fields, the redirect URI and the session secret length
    pub fn validate(&self) -> Result<(), AuthError> {
        for (name, value) in [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("tenant_id", &self.tenant_id),
            ("redirect_uri", &self.redirect_uri),
        ] {
            if value.trim().is_empty() {
                return Err(AuthError::Configuration(format!("{name} must not be empty")));
            }
        }

        let redirect = Url::parse(&self.redirect_uri).map_err(|e| {
            AuthError::Configuration(format!("redirect_uri is not an absolute URL: {e}"))
        })?;
        if !matches!(redirect.scheme(), "http" | "https") {
            return Err(AuthError::Configuration(
                "redirect_uri must use http or https".to_string(),
            ));
        }

        HmacKey::new(&self.session_secret)
            .map_err(|e| AuthError::Configuration(format!("session_secret: {e}")))?;

        Url::parse(&self.authority_host)
            .map_err(|e| AuthError::Configuration(format!("authority_host: {e}")))?;
        Ok(())
    }

    fn tenant_base(&self) -> String {
        format!(
            "{}/{}",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }

    /// Expected `iss` claim
    pub fn issuer(&self) -> String {
        format!("{}/v2.0", self.tenant_base())
    }

    pub fn authorize_endpoint(&self) -> String {
        format!("{}/oauth2/v2.0/authorize", self.tenant_base())
    }

    pub fn token_endpoint(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.tenant_base())
    }

    pub fn jwks_url(&self) -> String {
        format!("{}/discovery/v2.0/keys", self.tenant_base())
    }

    /// Whether cookies should carry the `Secure` attribute
    pub fn secure_cookies(&self) -> bool {
        self.redirect_uri.starts_with("https://")
    }

    /// Set session duration
    pub fn with_session_duration(mut self, duration: Duration) -> Self {
        self.session_duration = duration;
        self
    }

    /// Set JWKS cache duration
    pub fn with_jwks_cache_duration(mut self, duration: Duration) -> Self {
        self.jwks_cache_duration = duration;
        self
    }

    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
        self.authority_host = host.into();
        self
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("tenant_id", &self.tenant_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("session_secret", &"[REDACTED]")
            .field("session_duration", &self.session_duration)
            .field("authority_host", &self.authority_host)
            .finish_non_exhaustive()
    }
}
