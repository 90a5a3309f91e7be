//! Azure App Configuration client
//!
//! Implements the [`ConfigStore`](rolegate_roles::ConfigStore) and
//! [`ConfigStoreWriter`](rolegate_roles::ConfigStoreWriter) traits over the
//! App Configuration REST API. Requests are authenticated either with
//! HMAC-signed connection-string credentials or with Azure AD bearer tokens.

pub mod client;
pub mod connection;
pub mod credential;
pub mod signing;

pub use client::{default_http_client, AppConfigClient, API_VERSION};
pub use connection::{ConnectionString, StoreConnection};
pub use credential::{
    AccessToken, CachedCredential, ChainedTokenCredential, ClientSecretCredential,
    ManagedIdentityCredential, TokenCredential,
};
pub use signing::{HmacSigner, SignedHeaders};
