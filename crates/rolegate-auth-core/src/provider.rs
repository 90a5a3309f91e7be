//! Identity provider abstraction and the Azure AD implementation

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use rolegate_types::Principal;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::config::LOGIN_SCOPES;
use crate::token::IdTokenValidator;
use crate::{AuthConfig, AuthError};

/// An OpenID Connect provider driving the authorization-code flow
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is sent to for sign-in
    fn authorization_url(&self, state: &str, nonce: &str) -> String;

    /// Redeem an authorization code and return the verified principal
    async fn exchange_code(&self, code: &str, nonce: &str) -> Result<Principal, AuthError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    id_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Azure AD (Microsoft identity platform v2.0) provider
#[derive(Clone)]
pub struct AzureAdProvider {
    config: Arc<AuthConfig>,
    http_client: reqwest::Client,
    validator: IdTokenValidator,
}

impl AzureAdProvider {
    pub fn new(config: Arc<AuthConfig>) -> Self {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let validator = IdTokenValidator::with_client(Arc::clone(&config), http_client.clone());
        Self {
            config,
            http_client,
            validator,
        }
    }

    pub fn validator(&self) -> &IdTokenValidator {
        &self.validator
    }
}

#[async_trait]
impl IdentityProvider for AzureAdProvider {
    fn authorization_url(&self, state: &str, nonce: &str) -> String {
        let base = self.config.authorize_endpoint();
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("response_mode", "query"),
            ("scope", LOGIN_SCOPES),
            ("state", state),
            ("nonce", nonce),
            ("prompt", "select_account"),
        ];
        match Url::parse_with_params(&base, params) {
            Ok(url) => url.into(),
            // authority_host is validated with the rest of the config
            Err(_) => base,
        }
    }

    #[instrument(skip_all)]
    async fn exchange_code(&self, code: &str, nonce: &str) -> Result<Principal, AuthError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("scope", LOGIN_SCOPES),
        ];

        let response = self
            .http_client
            .post(self.config.token_endpoint())
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "token endpoint unreachable");
                AuthError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => {
                    warn!(status = %status, error = %err.error, "token exchange rejected");
                    AuthError::ProviderRejected {
                        error: err.error,
                        description: err.error_description,
                    }
                }
                Err(_) if status.is_server_error() => {
                    AuthError::Network(format!("token endpoint returned {status}"))
                }
                Err(_) => AuthError::ProviderRejected {
                    error: format!("http_{}", status.as_u16()),
                    description: None,
                },
            });
        }

        let tokens: TokenResponse = response.json().await.map_err(|e| {
            warn!(error = %e, "unreadable token response");
            AuthError::Internal("failed to parse token response".to_string())
        })?;
        let id_token = tokens.id_token.ok_or(AuthError::MissingClaim("id_token"))?;

        let principal = self.validator.validate(&id_token, nonce).await?.into_principal()?;
        debug!(user_id = %principal.user_id(), "code exchanged");
        Ok(principal)
    }
}

impl std::fmt::Debug for AzureAdProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureAdProvider")
            .field("tenant_id", &self.config.tenant_id)
            .field("client_id", &self.config.client_id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorization_url() {
        let config = AuthConfig::new(
            "client-id",
            "secret",
            "tenant-id",
            "https://portal.example.com/auth/callback",
            "s".repeat(32),
        );
        let provider = AzureAdProvider::new(Arc::new(config));
        let url = Url::parse(&provider.authorization_url("st", "no")).unwrap();

        assert_eq!(url.host_str(), Some("login.microsoftonline.com"));
        assert_eq!(url.path(), "/tenant-id/oauth2/v2.0/authorize");
        let query: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(query["client_id"], "client-id");
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["redirect_uri"], "https://portal.example.com/auth/callback");
        assert_eq!(query["scope"], "openid profile email");
        assert_eq!(query["state"], "st");
        assert_eq!(query["nonce"], "no");
        assert_eq!(query["prompt"], "select_account");
    }
}
