//! Login orchestration: start a sign-in, then verify its callback

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rolegate_types::Principal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::crypto::{constant_time_eq, random_token};
use crate::provider::IdentityProvider;
use crate::session::Expiring;
use crate::AuthError;

/// A login that has been started but not yet completed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingLogin {
    pub state: String,
    pub nonce: String,
    pub expires_at: DateTime<Utc>,
}

impl Expiring for PendingLogin {
    fn expires_at_millis(&self) -> i64 {
        self.expires_at.timestamp_millis()
    }
}

/// Where to send the browser, plus what to remember until it comes back
#[derive(Debug, Clone)]
pub struct LoginRedirect {
    pub url: String,
    pub pending: PendingLogin,
}

/// Query parameters of the provider callback
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Runs the authorization-code flow against an identity provider
pub struct Authenticator<P: IdentityProvider + ?Sized = dyn IdentityProvider> {
    provider: Arc<P>,
    login_timeout: Duration,
}

impl<P: IdentityProvider + ?Sized> Clone for Authenticator<P> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            login_timeout: self.login_timeout,
        }
    }
}

impl<P: IdentityProvider + ?Sized> Authenticator<P> {
    pub fn new(provider: Arc<P>, login_timeout: Duration) -> Self {
        Self {
            provider,
            login_timeout,
        }
    }

    /// Start a login with a fresh state and nonce
    pub fn begin_login(&self) -> LoginRedirect {
        let timeout = chrono::Duration::from_std(self.login_timeout)
            .unwrap_or_else(|_| chrono::Duration::minutes(10));
        let pending = PendingLogin {
            state: random_token(),
            nonce: random_token(),
            expires_at: Utc::now() + timeout,
        };
        LoginRedirect {
            url: self.provider.authorization_url(&pending.state, &pending.nonce),
            pending,
        }
    }

    /// Complete a login from its callback.
    ///
    /// The provider is only contacted once the callback has been matched to
    /// `pending`.
    #[instrument(skip_all)]
    pub async fn authenticate(
        &self,
        callback: &CallbackParams,
        pending: Option<&PendingLogin>,
    ) -> Result<Principal, AuthError> {
        if let Some(error) = callback.error.as_deref() {
            warn!(error, "provider returned an error on callback");
            return Err(AuthError::ProviderRejected {
                error: error.to_string(),
                description: callback.error_description.clone(),
            });
        }

        let pending = match pending {
            Some(p) if !p.is_expired() => p,
            _ => return Err(AuthError::LoginExpired),
        };

        let state_ok = callback
            .state
            .as_deref()
            .is_some_and(|s| constant_time_eq(s.as_bytes(), pending.state.as_bytes()));
        if !state_ok {
            warn!("callback state does not match pending login");
            return Err(AuthError::StateMismatch);
        }

        let code = callback
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(AuthError::MissingCode)?;

        let principal = self.provider.exchange_code(code, &pending.nonce).await?;
        info!(user_id = %principal.user_id(), email = %principal.email(), "user signed in");
        Ok(principal)
    }
}

impl<P: IdentityProvider + ?Sized> std::fmt::Debug for Authenticator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("login_timeout", &self.login_timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct FakeProvider {
        exchanges: AtomicU32,
    }

    #[async_trait]
    impl IdentityProvider for FakeProvider {
        fn authorization_url(&self, state: &str, nonce: &str) -> String {
            format!("https://idp.test/authorize?state={state}&nonce={nonce}")
        }

        async fn exchange_code(&self, code: &str, nonce: &str) -> Result<Principal, AuthError> {
            self.exchanges.fetch_add(1, Ordering::SeqCst);
            assert_eq!(code, "the-code");
            assert!(!nonce.is_empty());
            Ok(Principal::new("oid-1", "a@x.com", "Alice"))
        }
    }

    fn setup() -> (Authenticator<FakeProvider>, Arc<FakeProvider>) {
        let provider = Arc::new(FakeProvider::default());
        (Authenticator::new(Arc::clone(&provider), Duration::from_secs(600)), provider)
    }

    fn callback(state: &str, code: Option<&str>) -> CallbackParams {
        CallbackParams {
            code: code.map(str::to_string),
            state: Some(state.to_string()),
            ..CallbackParams::default()
        }
    }

    #[test]
    fn test_begin_login_generates_fresh_values() {
        let (auth, _) = setup();
        let a = auth.begin_login();
        let b = auth.begin_login();
        assert_ne!(a.pending.state, b.pending.state);
        assert_ne!(a.pending.state, a.pending.nonce);
        assert!(a.url.contains(&a.pending.state));
        assert!(!a.pending.is_expired());
    }

    #[tokio::test]
    async fn test_successful_callback() {
        let (auth, provider) = setup();
        let login = auth.begin_login();
        let principal = auth
            .authenticate(&callback(&login.pending.state, Some("the-code")), Some(&login.pending))
            .await
            .unwrap();
        assert_eq!(principal.email(), "a@x.com");
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_provider_error_wins() {
        let (auth, provider) = setup();
        let params = CallbackParams {
            error: Some("access_denied".into()),
            error_description: Some("declined".into()),
            ..CallbackParams::default()
        };
        let err = auth.authenticate(&params, None).await.unwrap_err();
        assert!(matches!(err, AuthError::ProviderRejected { ref error, .. } if error == "access_denied"));
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_or_expired_pending_login() {
        let (auth, _) = setup();
        let err = auth.authenticate(&callback("s", Some("the-code")), None).await.unwrap_err();
        assert!(matches!(err, AuthError::LoginExpired));

        let mut login = auth.begin_login();
        login.pending.expires_at = Utc::now() - chrono::Duration::seconds(1);
        let err = auth
            .authenticate(&callback(&login.pending.state, Some("the-code")), Some(&login.pending))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::LoginExpired));
    }

    #[tokio::test]
    async fn test_state_mismatch_never_reaches_provider() {
        let (auth, provider) = setup();
        let login = auth.begin_login();
        let err = auth
            .authenticate(&callback("forged", Some("the-code")), Some(&login.pending))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::StateMismatch));

        let no_state = CallbackParams {
            code: Some("the-code".into()),
            ..CallbackParams::default()
        };
        let err = auth.authenticate(&no_state, Some(&login.pending)).await.unwrap_err();
        assert!(matches!(err, AuthError::StateMismatch));
        assert_eq!(provider.exchanges.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_code() {
        let (auth, _) = setup();
        let login = auth.begin_login();
        let err = auth
            .authenticate(&callback(&login.pending.state, None), Some(&login.pending))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MissingCode));
    }
}
