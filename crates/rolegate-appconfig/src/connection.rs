//! Store connection settings

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Url;
use rolegate_roles::ConfigStoreError;

/// Environment variable holding the HMAC connection string
pub const CONNECTION_STRING_ENV: &str = "AZURE_APPCONFIG_CONNECTION_STRING";
/// Environment variable holding the store endpoint for bearer auth
pub const ENDPOINT_ENV: &str = "AZURE_APPCONFIG_ENDPOINT";

/// Parsed `Endpoint=...;Id=...;Secret=...` connection string
#[derive(Clone)]
pub struct ConnectionString {
    pub endpoint: Url,
    pub id: String,
    secret: Vec<u8>,
}

impl ConnectionString {
    /// Parse a connection string. Field names are case-insensitive and the
    /// secret must be base64.
    pub fn parse(raw: &str) -> Result<Self, ConfigStoreError> {
        let mut endpoint = None;
        let mut id = None;
        let mut secret = None;

        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            // values are not echoed back, the segment may be the secret
            let (name, value) = part.split_once('=').ok_or_else(|| {
                ConfigStoreError::Configuration("malformed connection string segment".into())
            })?;
            match name.trim().to_ascii_lowercase().as_str() {
                "endpoint" => endpoint = Some(value.trim()),
                "id" => id = Some(value.trim()),
                "secret" => secret = Some(value.trim()),
                _ => {}
            }
        }

        let endpoint = endpoint.ok_or_else(|| missing("Endpoint"))?;
        let id = id.filter(|v| !v.is_empty()).ok_or_else(|| missing("Id"))?;
        let secret = secret.filter(|v| !v.is_empty()).ok_or_else(|| missing("Secret"))?;

        Ok(Self {
            endpoint: parse_endpoint(endpoint)?,
            id: id.to_string(),
            secret: STANDARD.decode(secret).map_err(|e| {
                ConfigStoreError::Configuration(format!("connection string secret is not base64: {e}"))
            })?,
        })
    }

    /// Decoded signing secret
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }
}

impl fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionString")
            .field("endpoint", &self.endpoint.as_str())
            .field("id", &self.id)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

fn missing(field: &str) -> ConfigStoreError {
    ConfigStoreError::Configuration(format!("connection string is missing {field}"))
}

/// Parse a store endpoint, requiring an absolute http(s) URL
pub fn parse_endpoint(raw: &str) -> Result<Url, ConfigStoreError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ConfigStoreError::Configuration(format!("invalid store endpoint {raw}: {e}")))?;
    match url.scheme() {
        "https" | "http" if url.host_str().is_some() => Ok(url),
        _ => Err(ConfigStoreError::Configuration(format!(
            "store endpoint must be an http(s) URL: {raw}"
        ))),
    }
}

/// How to reach and authenticate against the store
#[derive(Debug, Clone)]
pub enum StoreConnection {
    /// HMAC-signed requests
    ConnectionString(ConnectionString),
    /// Bearer tokens from an Azure AD credential
    Endpoint(Url),
}

impl StoreConnection {
    /// Pick a connection from optional settings. A non-blank connection
    /// string wins over an endpoint; `Ok(None)` when neither is set.
    pub fn from_parts(
        connection_string: Option<&str>,
        endpoint: Option<&str>,
    ) -> Result<Option<Self>, ConfigStoreError> {
        fn non_blank(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|v| !v.is_empty())
        }

        if let Some(raw) = non_blank(connection_string) {
            return ConnectionString::parse(raw).map(|c| Some(Self::ConnectionString(c)));
        }
        if let Some(raw) = non_blank(endpoint) {
            return parse_endpoint(raw).map(|url| Some(Self::Endpoint(url)));
        }
        Ok(None)
    }

    /// Read `AZURE_APPCONFIG_CONNECTION_STRING` / `AZURE_APPCONFIG_ENDPOINT`
    pub fn from_env() -> Result<Option<Self>, ConfigStoreError> {
        let connection_string = std::env::var(CONNECTION_STRING_ENV).ok();
        let endpoint = std::env::var(ENDPOINT_ENV).ok();
        Self::from_parts(connection_string.as_deref(), endpoint.as_deref())
    }

    pub fn endpoint(&self) -> &Url {
        match self {
            Self::ConnectionString(c) => &c.endpoint,
            Self::Endpoint(url) => url,
        }
    }

    /// Short label for logs
    pub fn auth_kind(&self) -> &'static str {
        match self {
            Self::ConnectionString(_) => "hmac",
            Self::Endpoint(_) => "aad",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "c2VjcmV0LWtleS1ieXRlcw==";

    #[test]
    fn test_parse_connection_string() {
        let raw = format!("Endpoint=https://demo.azconfig.io;Id=abc-l0-s0:xyz;Secret={SECRET}");
        let parsed = ConnectionString::parse(&raw).unwrap();
        assert_eq!(parsed.endpoint.as_str(), "https://demo.azconfig.io/");
        assert_eq!(parsed.id, "abc-l0-s0:xyz");
        assert_eq!(parsed.secret(), b"secret-key-bytes");
    }

    #[test]
    fn test_parse_is_case_insensitive_and_tolerates_spacing() {
        let raw = format!(" endpoint=https://demo.azconfig.io ; ID=abc ; secret={SECRET};");
        assert!(ConnectionString::parse(&raw).is_ok());
    }

    #[test]
    fn test_parse_rejects_incomplete_strings() {
        assert!(ConnectionString::parse("Endpoint=https://demo.azconfig.io;Id=abc").is_err());
        assert!(ConnectionString::parse(&format!("Id=abc;Secret={SECRET}")).is_err());
        assert!(ConnectionString::parse("Endpoint=https://demo.azconfig.io;Id=abc;Secret=%%%").is_err());
        assert!(ConnectionString::parse(&format!("Endpoint=demo;Id=abc;Secret={SECRET}")).is_err());
        assert!(ConnectionString::parse("garbage").is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let raw = format!("Endpoint=https://demo.azconfig.io;Id=abc;Secret={SECRET}");
        let debug = format!("{:?}", ConnectionString::parse(&raw).unwrap());
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains(SECRET));
    }

    #[test]
    fn test_connection_string_wins_over_endpoint() {
        let raw = format!("Endpoint=https://one.azconfig.io;Id=abc;Secret={SECRET}");
        let conn = StoreConnection::from_parts(Some(&raw), Some("https://two.azconfig.io"))
            .unwrap()
            .unwrap();
        assert_eq!(conn.auth_kind(), "hmac");
        assert_eq!(conn.endpoint().host_str(), Some("one.azconfig.io"));
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let conn = StoreConnection::from_parts(Some("  "), Some("https://two.azconfig.io"))
            .unwrap()
            .unwrap();
        assert_eq!(conn.auth_kind(), "aad");
        assert!(StoreConnection::from_parts(None, Some("")).unwrap().is_none());
    }
}
