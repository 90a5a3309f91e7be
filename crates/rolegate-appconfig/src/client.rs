//! App Configuration REST client

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use rolegate_roles::{
    ConfigSetting, ConfigStore, ConfigStoreError, ConfigStoreWriter, StoreResult, ROLE_KEY_FILTER,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::connection::{ConnectionString, StoreConnection};
use crate::credential::{CachedCredential, ChainedTokenCredential, TokenCredential};
use crate::signing::HmacSigner;

/// REST API version sent with every request
pub const API_VERSION: &str = "1.0";

const KV_CONTENT_TYPE: &str = "application/vnd.microsoft.appconfig.kv+json";

#[derive(Clone)]
enum ClientAuth {
    Hmac(HmacSigner),
    Bearer {
        credential: Arc<dyn TokenCredential>,
        scope: String,
    },
}

/// Key-value record as returned by the service
#[derive(Debug, Deserialize)]
struct KeyValue {
    key: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default)]
    etag: Option<String>,
}

impl From<KeyValue> for ConfigSetting {
    fn from(kv: KeyValue) -> Self {
        Self {
            key: kv.key,
            value: kv.value,
            content_type: kv.content_type,
            etag: kv.etag,
        }
    }
}

#[derive(Debug, Deserialize)]
struct KeyValuePage {
    #[serde(default)]
    items: Vec<KeyValue>,
    #[serde(rename = "@nextLink", default)]
    next_link: Option<String>,
}

#[derive(Serialize)]
struct PutBody<'a> {
    value: Option<&'a str>,
    content_type: Option<&'a str>,
}

/// Client for one App Configuration store
#[derive(Clone)]
pub struct AppConfigClient {
    http: reqwest::Client,
    endpoint: Url,
    auth: ClientAuth,
}

/// HTTP client with the stack's standard timeouts
pub fn default_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

impl AppConfigClient {
    /// Client authenticating with an `Endpoint=...;Id=...;Secret=...` string
    pub fn from_connection_string(raw: &str) -> StoreResult<Self> {
        let connection = ConnectionString::parse(raw)?;
        Ok(Self::with_signer(&connection))
    }

    fn with_signer(connection: &ConnectionString) -> Self {
        Self {
            http: default_http_client(),
            endpoint: connection.endpoint.clone(),
            auth: ClientAuth::Hmac(HmacSigner::from_connection_string(connection)),
        }
    }

    /// Client authenticating with bearer tokens from `credential`.
    ///
    /// Tokens are requested for `{endpoint}/.default` and cached until
    /// shortly before expiry.
    pub fn with_credential(endpoint: Url, credential: Arc<dyn TokenCredential>) -> Self {
        let scope = format!("{}/.default", endpoint.as_str().trim_end_matches('/'));
        Self {
            http: default_http_client(),
            endpoint,
            auth: ClientAuth::Bearer {
                credential: Arc::new(CachedCredential::new(credential)),
                scope,
            },
        }
    }

    /// Build a client for a resolved connection. Endpoint-only connections
    /// use the environment credential chain.
    pub fn connect(connection: &StoreConnection) -> Self {
        match connection {
            StoreConnection::ConnectionString(c) => Self::with_signer(c),
            StoreConnection::Endpoint(endpoint) => {
                let chain = ChainedTokenCredential::from_env(default_http_client());
                Self::with_credential(endpoint.clone(), Arc::new(chain))
            }
        }
    }

    /// Replace the HTTP client used for store requests
    #[must_use]
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Check that the store is reachable and the credentials are accepted
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn probe(&self) -> StoreResult<()> {
        let url = self.list_url(ROLE_KEY_FILTER)?;
        let response = self.send(Method::GET, url, None).await?;
        if response.status().is_success() {
            debug!("store probe succeeded");
            Ok(())
        } else {
            Err(read_error(response).await)
        }
    }

    fn kv_url(&self, key: &str) -> StoreResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ConfigStoreError::Configuration(format!("endpoint cannot hold a path: {}", self.endpoint))
            })?
            .pop_if_empty()
            .push("kv")
            .push(key);
        url.query_pairs_mut().append_pair("api-version", API_VERSION);
        Ok(url)
    }

    fn list_url(&self, filter: &str) -> StoreResult<Url> {
        let mut url = self.endpoint.join("kv").map_err(|e| {
            ConfigStoreError::Configuration(format!("invalid store endpoint {}: {e}", self.endpoint))
        })?;
        url.query_pairs_mut()
            .append_pair("key", filter)
            .append_pair("api-version", API_VERSION);
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url, body: Option<Vec<u8>>) -> StoreResult<reqwest::Response> {
        let mut request = self.http.request(method.clone(), url.clone());

        match &self.auth {
            ClientAuth::Hmac(signer) => {
                let payload = body.as_deref().unwrap_or_default();
                let signed = signer.sign(&method, &url, payload, Utc::now());
                request = request
                    .header("x-ms-date", signed.date)
                    .header("x-ms-content-sha256", signed.content_hash)
                    .header(AUTHORIZATION, signed.authorization);
            }
            ClientAuth::Bearer { credential, scope } => {
                let token = credential.get_token(scope).await?;
                request = request.bearer_auth(token.token);
            }
        }

        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, KV_CONTENT_TYPE).body(body);
        }

        request.send().await.map_err(|e| {
            warn!(error = %e, method = %method, "store request failed");
            ConfigStoreError::Network(e.to_string())
        })
    }
}

impl std::fmt::Debug for AppConfigClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let auth = match self.auth {
            ClientAuth::Hmac(_) => "hmac",
            ClientAuth::Bearer { .. } => "aad",
        };
        f.debug_struct("AppConfigClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("auth", &auth)
            .finish_non_exhaustive()
    }
}

/// Map a non-success status to a store error
pub(crate) fn error_for_status(status: StatusCode, body: String) -> ConfigStoreError {
    let message = if body.trim().is_empty() {
        status.to_string()
    } else {
        body
    };
    match status {
        StatusCode::UNAUTHORIZED => ConfigStoreError::Unauthenticated(message),
        StatusCode::FORBIDDEN => ConfigStoreError::PermissionDenied(message),
        StatusCode::TOO_MANY_REQUESTS => ConfigStoreError::Unavailable(message),
        s if s.is_server_error() => ConfigStoreError::Unavailable(message),
        s => ConfigStoreError::Rejected {
            status: s.as_u16(),
            message,
        },
    }
}

async fn read_error(response: reqwest::Response) -> ConfigStoreError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    warn!(status = %status, "store returned an error");
    error_for_status(status, body)
}

async fn read_json<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> StoreResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| ConfigStoreError::Decode(e.to_string()))
}

#[async_trait]
impl ConfigStore for AppConfigClient {
    #[instrument(skip(self), level = "debug")]
    async fn get_setting(&self, key: &str) -> StoreResult<Option<ConfigSetting>> {
        let url = self.kv_url(key)?;
        let response = self.send(Method::GET, url, None).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(read_json::<KeyValue>(response).await?.into())),
            _ => Err(read_error(response).await),
        }
    }
}

#[async_trait]
impl ConfigStoreWriter for AppConfigClient {
    #[instrument(skip(self, setting), fields(key = %setting.key), level = "debug")]
    async fn set_setting(&self, setting: ConfigSetting) -> StoreResult<ConfigSetting> {
        let url = self.kv_url(&setting.key)?;
        let body = serde_json::to_vec(&PutBody {
            value: setting.value.as_deref(),
            content_type: setting.content_type.as_deref(),
        })
        .map_err(|e| ConfigStoreError::Decode(e.to_string()))?;

        let response = self.send(Method::PUT, url, Some(body)).await?;
        if !response.status().is_success() {
            return Err(read_error(response).await);
        }
        Ok(read_json::<KeyValue>(response).await?.into())
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete_setting(&self, key: &str) -> StoreResult<bool> {
        let url = self.kv_url(key)?;
        let response = self.send(Method::DELETE, url, None).await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            _ => Err(read_error(response).await),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_keys(&self, filter: &str) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        let mut next = Some(self.list_url(filter)?);

        while let Some(url) = next.take() {
            let response = self.send(Method::GET, url, None).await?;
            if !response.status().is_success() {
                return Err(read_error(response).await);
            }
            let page: KeyValuePage = read_json(response).await?;
            keys.extend(page.items.into_iter().map(|kv| kv.key));

            if let Some(link) = page.next_link {
                next = Some(self.endpoint.join(&link).map_err(|e| {
                    ConfigStoreError::Decode(format!("invalid @nextLink {link}: {e}"))
                })?);
            }
        }

        debug!(count = keys.len(), "listed keys");
        Ok(keys)
    }
}
