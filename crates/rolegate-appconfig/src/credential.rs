//! Azure AD token credentials for bearer-authenticated store access

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use rolegate_roles::{ConfigStoreError, StoreResult};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use crate::client::error_for_status;

pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
pub const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// Tokens are refreshed this long before they expire
pub const REFRESH_MARGIN: Duration = Duration::from_secs(300);

const IMDS_TIMEOUT: Duration = Duration::from_secs(3);

/// A bearer token and its expiry
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    /// Whether the token expires within `margin` of `now`
    pub fn expires_within(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        let margin = chrono::Duration::from_std(margin).unwrap_or_else(|_| chrono::Duration::zero());
        self.expires_on - margin <= now
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("expires_on", &self.expires_on)
            .finish_non_exhaustive()
    }
}

/// Source of Azure AD access tokens
#[async_trait]
pub trait TokenCredential: Send + Sync + fmt::Debug {
    /// Obtain a token for `scope` (e.g. `https://demo.azconfig.io/.default`)
    async fn get_token(&self, scope: &str) -> StoreResult<AccessToken>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
    #[serde(default)]
    expires_on: Option<serde_json::Value>,
}

impl TokenResponse {
    /// Token endpoints disagree on number vs. string and relative vs.
    /// absolute expiry, so accept all of them.
    fn into_access_token(self, now: DateTime<Utc>) -> StoreResult<AccessToken> {
        fn as_i64(value: &serde_json::Value) -> Option<i64> {
            match value {
                serde_json::Value::Number(n) => n.as_i64(),
                serde_json::Value::String(s) => s.trim().parse().ok(),
                _ => None,
            }
        }

        let expires_on = if let Some(at) = self.expires_on.as_ref().and_then(as_i64) {
            DateTime::from_timestamp(at, 0)
        } else if let Some(secs) = self.expires_in.as_ref().and_then(as_i64) {
            Some(now + chrono::Duration::seconds(secs))
        } else {
            None
        };

        let expires_on = expires_on
            .ok_or_else(|| ConfigStoreError::Decode("token response has no expiry".into()))?;
        Ok(AccessToken {
            token: self.access_token,
            expires_on,
        })
    }
}

async fn read_token(response: reqwest::Response) -> StoreResult<AccessToken> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(match status.as_u16() {
            400 | 401 | 403 => ConfigStoreError::Unauthenticated(format!("token request rejected ({status}): {body}")),
            _ => error_for_status(status, body),
        });
    }
    let parsed: TokenResponse = response
        .json()
        .await
        .map_err(|e| ConfigStoreError::Decode(e.to_string()))?;
    parsed.into_access_token(Utc::now())
}

fn network(err: reqwest::Error) -> ConfigStoreError {
    ConfigStoreError::Network(err.to_string())
}

/// Service principal using a client secret (client credentials grant)
#[derive(Clone)]
pub struct ClientSecretCredential {
    authority_host: Url,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
}

impl ClientSecretCredential {
    pub fn new(
        authority_host: Url,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            authority_host,
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            http,
        }
    }

    /// Build from `AZURE_CLIENT_ID`, `AZURE_CLIENT_SECRET` and
    /// `AZURE_TENANT_ID`; `None` unless all three are set.
    pub fn from_env(http: reqwest::Client) -> Option<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        let authority_host = var("AZURE_AUTHORITY_HOST")
            .and_then(|host| Url::parse(&host).ok())
            .or_else(|| Url::parse(DEFAULT_AUTHORITY_HOST).ok())?;

        Some(Self::new(
            authority_host,
            var("AZURE_TENANT_ID")?,
            var("AZURE_CLIENT_ID")?,
            var("AZURE_CLIENT_SECRET")?,
            http,
        ))
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.as_str().trim_end_matches('/'),
            self.tenant_id
        )
    }
}

impl fmt::Debug for ClientSecretCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSecretCredential")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    #[instrument(skip(self), level = "debug")]
    async fn get_token(&self, scope: &str) -> StoreResult<AccessToken> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope),
        ];
        let response = self
            .http
            .post(self.token_url())
            .form(&form)
            .send()
            .await
            .map_err(network)?;
        read_token(response).await
    }
}

#[derive(Debug, Clone)]
enum ManagedIdentitySource {
    /// App Service / Functions / Container Apps
    AppService { endpoint: String, header: String },
    /// Azure instance metadata service
    Imds { endpoint: String },
}

/// Managed identity of the hosting Azure resource
#[derive(Clone)]
pub struct ManagedIdentityCredential {
    source: ManagedIdentitySource,
    http: reqwest::Client,
}

impl ManagedIdentityCredential {
    /// Use `IDENTITY_ENDPOINT` + `IDENTITY_HEADER` when present, IMDS otherwise
    pub fn from_env(http: reqwest::Client) -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        match (var("IDENTITY_ENDPOINT"), var("IDENTITY_HEADER")) {
            (Some(endpoint), Some(header)) => Self::app_service(endpoint, header, http),
            _ => Self::imds(IMDS_ENDPOINT, http),
        }
    }

    pub fn app_service(
        endpoint: impl Into<String>,
        header: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            source: ManagedIdentitySource::AppService {
                endpoint: endpoint.into(),
                header: header.into(),
            },
            http,
        }
    }

    pub fn imds(endpoint: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            source: ManagedIdentitySource::Imds {
                endpoint: endpoint.into(),
            },
            http,
        }
    }
}

impl fmt::Debug for ManagedIdentityCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            ManagedIdentitySource::AppService { .. } => "app_service",
            ManagedIdentitySource::Imds { .. } => "imds",
        };
        f.debug_struct("ManagedIdentityCredential")
            .field("source", &kind)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    #[instrument(skip(self), level = "debug")]
    async fn get_token(&self, scope: &str) -> StoreResult<AccessToken> {
        let resource = scope.trim_end_matches("/.default");
        let request = match &self.source {
            ManagedIdentitySource::AppService { endpoint, header } => self
                .http
                .get(endpoint.as_str())
                .query(&[("api-version", "2019-08-01"), ("resource", resource)])
                .header("X-IDENTITY-HEADER", header),
            ManagedIdentitySource::Imds { endpoint } => self
                .http
                .get(endpoint.as_str())
                .query(&[("api-version", "2018-02-01"), ("resource", resource)])
                .header("Metadata", "true")
                .timeout(IMDS_TIMEOUT),
        };
        let response = request.send().await.map_err(network)?;
        read_token(response).await
    }
}

/// Tries each credential in order and returns the first token obtained
#[derive(Debug, Clone, Default)]
pub struct ChainedTokenCredential {
    sources: Vec<Arc<dyn TokenCredential>>,
}

impl ChainedTokenCredential {
    pub fn new(sources: Vec<Arc<dyn TokenCredential>>) -> Self {
        Self { sources }
    }

    /// Environment client secret (when configured), then managed identity
    pub fn from_env(http: reqwest::Client) -> Self {
        let mut sources: Vec<Arc<dyn TokenCredential>> = Vec::new();
        if let Some(credential) = ClientSecretCredential::from_env(http.clone()) {
            sources.push(Arc::new(credential));
        }
        sources.push(Arc::new(ManagedIdentityCredential::from_env(http)));
        Self::new(sources)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[async_trait]
impl TokenCredential for ChainedTokenCredential {
    async fn get_token(&self, scope: &str) -> StoreResult<AccessToken> {
        let mut failures = Vec::new();
        for source in &self.sources {
            match source.get_token(scope).await {
                Ok(token) => return Ok(token),
                Err(err) => {
                    debug!(credential = ?source, error = %err, "credential unavailable, trying next");
                    failures.push(err.to_string());
                }
            }
        }
        Err(ConfigStoreError::Unauthenticated(format!(
            "no credential produced a token: [{}]",
            failures.join("; ")
        )))
    }
}

/// Reuses a token until it is within [`REFRESH_MARGIN`] of expiry
#[derive(Debug)]
pub struct CachedCredential {
    inner: Arc<dyn TokenCredential>,
    cached: Mutex<Option<(String, AccessToken)>>,
}

impl CachedCredential {
    pub fn new(inner: Arc<dyn TokenCredential>) -> Self {
        Self {
            inner,
            cached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TokenCredential for CachedCredential {
    async fn get_token(&self, scope: &str) -> StoreResult<AccessToken> {
        // Held across the fetch so concurrent callers share one refresh
        let mut cached = self.cached.lock().await;
        if let Some((cached_scope, token)) = cached.as_ref() {
            if cached_scope == scope && !token.expires_within(Utc::now(), REFRESH_MARGIN) {
                return Ok(token.clone());
            }
        }

        let token = self.inner.get_token(scope).await?;
        debug!(expires_on = %token.expires_on, "acquired store access token");
        *cached = Some((scope.to_string(), token.clone()));
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct FixedCredential {
        lifetime: chrono::Duration,
        calls: AtomicU32,
        fail: bool,
    }

    impl FixedCredential {
        fn new(lifetime: chrono::Duration) -> Self {
            Self {
                lifetime,
                calls: AtomicU32::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(chrono::Duration::hours(1))
            }
        }
    }

    #[async_trait]
    impl TokenCredential for FixedCredential {
        async fn get_token(&self, _scope: &str) -> StoreResult<AccessToken> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ConfigStoreError::Unauthenticated("no identity".into()));
            }
            Ok(AccessToken {
                token: format!("token-{n}"),
                expires_on: Utc::now() + self.lifetime,
            })
        }
    }

    #[test]
    fn test_expires_within() {
        let now = Utc::now();
        let token = AccessToken {
            token: "t".into(),
            expires_on: now + chrono::Duration::minutes(4),
        };
        assert!(token.expires_within(now, REFRESH_MARGIN));
        assert!(!token.expires_within(now, Duration::from_secs(60)));
    }

    #[test]
    fn test_token_response_expiry_forms() {
        let now = Utc::now();
        let relative: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","expires_in":3599}"#).unwrap();
        assert_eq!(relative.into_access_token(now).unwrap().expires_on, now + chrono::Duration::seconds(3599));

        let absolute: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","expires_on":"1700000000"}"#).unwrap();
        assert_eq!(absolute.into_access_token(now).unwrap().expires_on.timestamp(), 1_700_000_000);

        let missing: TokenResponse = serde_json::from_str(r#"{"access_token":"a"}"#).unwrap();
        assert!(matches!(missing.into_access_token(now), Err(ConfigStoreError::Decode(_))));
    }

    #[tokio::test]
    async fn test_cached_credential_reuses_token() {
        let inner = Arc::new(FixedCredential::new(chrono::Duration::hours(1)));
        let cached = CachedCredential::new(inner.clone());

        let first = cached.get_token("https://demo.azconfig.io/.default").await.unwrap();
        let second = cached.get_token("https://demo.azconfig.io/.default").await.unwrap();
        assert_eq!(first.token, second.token);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cached_credential_refreshes_near_expiry() {
        let inner = Arc::new(FixedCredential::new(chrono::Duration::minutes(2)));
        let cached = CachedCredential::new(inner.clone());

        cached.get_token("scope").await.unwrap();
        cached.get_token("scope").await.unwrap();
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_chain_falls_through_to_next_source() {
        let chain = ChainedTokenCredential::new(vec![
            Arc::new(FixedCredential::failing()),
            Arc::new(FixedCredential::new(chrono::Duration::hours(1))),
        ]);
        assert_eq!(chain.get_token("scope").await.unwrap().token, "token-0");
    }

    #[tokio::test]
    async fn test_chain_reports_all_failures() {
        let chain = ChainedTokenCredential::new(vec![
            Arc::new(FixedCredential::failing()),
            Arc::new(FixedCredential::failing()),
        ]);
        let err = chain.get_token("scope").await.unwrap_err();
        assert!(matches!(err, ConfigStoreError::Unauthenticated(_)));
        assert_eq!(err.to_string().matches("no identity").count(), 2);
    }
}
