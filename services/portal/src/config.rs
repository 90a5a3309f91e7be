//! Configuration for the portal service.

use std::path::PathBuf;
use std::time::Duration;

use rolegate_appconfig::{connection, StoreConnection};
use rolegate_auth_core::AuthConfig;
use rolegate_roles::DEFAULT_ROLE_CACHE_TTL;

/// Portal configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,

    /// Sign-in and session cookie configuration
    pub auth: AuthConfig,

    /// Remote role store; `None` serves roles from memory
    pub store: Option<StoreConnection>,

    /// Role file used to seed the in-memory store
    pub roles_file: Option<PathBuf>,

    /// How long resolved roles stay cached per session
    pub role_cache_ttl: Duration,

    pub request_timeout: Duration,

    /// Expose `/metrics`
    pub metrics_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // App registration
        let client_id =
            var("AZURE_AUTH_CLIENT_ID").ok_or(ConfigError::Missing("AZURE_AUTH_CLIENT_ID"))?;
        let client_secret = var("AZURE_AUTH_CLIENT_SECRET")
            .ok_or(ConfigError::Missing("AZURE_AUTH_CLIENT_SECRET"))?;
        let tenant_id =
            var("AZURE_AUTH_TENANT_ID").ok_or(ConfigError::Missing("AZURE_AUTH_TENANT_ID"))?;
        let redirect_uri = var("AUTH_REDIRECT_URI")
            .or_else(|| var("AZURE_AUTH_REDIRECT_URI"))
            .ok_or(ConfigError::Missing("AUTH_REDIRECT_URI"))?;

        // Session secret (minimum 32 bytes)
        let session_secret = var("SESSION_SECRET").ok_or(ConfigError::Missing("SESSION_SECRET"))?;
        if session_secret.len() < 32 {
            return Err(ConfigError::Invalid(
                "SESSION_SECRET must be at least 32 characters",
            ));
        }

        let session_duration_hours: u64 = var("SESSION_DURATION_HOURS")
            .unwrap_or_else(|| "8".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("SESSION_DURATION_HOURS"))?;

        let jwks_cache_secs: u64 = var("JWKS_CACHE_SECS")
            .unwrap_or_else(|| "3600".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("JWKS_CACHE_SECS"))?;

        let role_cache_ttl = match var("ROLE_CACHE_TTL_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse()
                    .map_err(|_| ConfigError::Invalid("ROLE_CACHE_TTL_SECS"))?,
            ),
            None => DEFAULT_ROLE_CACHE_TTL,
        };

        let http_port = var("HTTP_PORT")
            .unwrap_or_else(|| "8501".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("HTTP_PORT"))?;

        let request_timeout_secs: u64 = var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("REQUEST_TIMEOUT_SECS"))?;

        let metrics_enabled = var("METRICS_ENABLED")
            .unwrap_or_else(|| "false".to_string())
            .parse()
            .unwrap_or(false);

        // Role store
        let store = StoreConnection::from_parts(
            var(connection::CONNECTION_STRING_ENV).as_deref(),
            var(connection::ENDPOINT_ENV).as_deref(),
        )
        .map_err(|e| ConfigError::Store(e.to_string()))?;

        let roles_file = var("ROLES_FILE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let mut auth = AuthConfig::new(
            client_id,
            client_secret,
            tenant_id,
            redirect_uri,
            session_secret,
        )
        .with_session_duration(Duration::from_secs(session_duration_hours * 3600))
        .with_jwks_cache_duration(Duration::from_secs(jwks_cache_secs));
        if let Some(host) = var("AZURE_AUTHORITY_HOST").filter(|v| !v.trim().is_empty()) {
            auth = auth.with_authority_host(host);
        }
        auth.validate()
            .map_err(|e| ConfigError::AuthConfig(e.to_string()))?;

        Ok(Self {
            http_port,
            auth,
            store,
            roles_file,
            role_cache_ttl,
            request_timeout: Duration::from_secs(request_timeout_secs),
            metrics_enabled,
        })
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Auth config error: {0}")]
    AuthConfig(String),

    #[error("Role store config error: {0}")]
    Store(String),
}
