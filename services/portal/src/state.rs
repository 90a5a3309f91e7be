//! Application state

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;
use rolegate_auth_core::{AuthError, Authenticator, IdentityProvider, SessionCodec, SessionPayload};
use rolegate_roles::{ConfigStore, RoleCache, RoleResolver};
use rolegate_types::Principal;

use crate::config::Config;

/// Everything the portal keeps for one signed-in browser session
#[derive(Debug)]
pub struct SessionContext {
    pub session_id: String,
    pub principal: Principal,
    /// Roles resolved for this session only
    pub roles: RoleCache,
    pub created_at: DateTime<Utc>,
}

/// Live sessions keyed by session ID.
///
/// Entries expire after the session duration without a request. Dropping an
/// entry drops its role cache with it.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Cache<String, Arc<SessionContext>>,
    role_cache_ttl: Duration,
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration, role_cache_ttl: Duration) -> Self {
        Self {
            sessions: Cache::builder()
                .time_to_idle(idle_timeout)
                .max_capacity(10_000)
                .build(),
            role_cache_ttl,
        }
    }

    /// Register a new session with an empty role cache
    pub async fn create(&self, payload: &SessionPayload) -> Arc<SessionContext> {
        let context = Arc::new(self.new_context(payload));
        self.sessions
            .insert(payload.session_id.clone(), Arc::clone(&context))
            .await;
        context
    }

    /// Registered session for a verified cookie payload.
    ///
    /// `None` once the session has been logged out or evicted, so a
    /// correctly signed cookie alone does not grant access.
    pub async fn get(&self, payload: &SessionPayload) -> Option<Arc<SessionContext>> {
        let context = self.sessions.get(&payload.session_id).await?;
        // Session IDs are random; a mismatch means a forged or mixed-up cookie
        if context.principal.email() != payload.principal().email() {
            tracing::warn!(session_id = %payload.session_id, "Session principal mismatch - rejecting");
            return None;
        }
        Some(context)
    }

    /// End a session, returning it if it was registered
    pub async fn remove(&self, session_id: &str) -> Option<Arc<SessionContext>> {
        self.sessions.remove(session_id).await
    }

    fn new_context(&self, payload: &SessionPayload) -> SessionContext {
        SessionContext {
            session_id: payload.session_id.clone(),
            principal: payload.principal(),
            roles: RoleCache::new(self.role_cache_ttl),
            created_at: Utc::now(),
        }
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.entry_count())
            .field("role_cache_ttl", &self.role_cache_ttl)
            .finish()
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Login flow against the identity provider
    pub authenticator: Authenticator,
    pub resolver: RoleResolver,
    /// Signs the session and pending-login cookies
    pub codec: SessionCodec,
    pub sessions: SessionRegistry,
    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: Config,
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn ConfigStore>,
    ) -> Result<Self, AuthError> {
        let codec = SessionCodec::new(&config.auth.session_secret)?;
        Ok(Self {
            authenticator: Authenticator::new(provider, config.auth.login_timeout),
            resolver: RoleResolver::new(store),
            codec,
            sessions: SessionRegistry::new(config.auth.session_duration, config.role_cache_ttl),
            config: Arc::new(config),
        })
    }

    /// Get request timeout from config
    pub fn request_timeout(&self) -> Duration {
        self.config.request_timeout
    }

    /// Whether cookies carry the `Secure` attribute
    pub fn secure_cookies(&self) -> bool {
        self.config.auth.secure_cookies()
    }
}
