//! Rolegate Auth Core - sign-in against Azure AD
//!
//! Authorization-code flow with ID token validation, plus HMAC-signed
//! cookies for sessions and in-flight logins.

pub mod authenticator;
pub mod config;
pub mod crypto;
pub mod error;
pub mod provider;
pub mod session;
pub mod token;

pub use authenticator::{Authenticator, CallbackParams, LoginRedirect, PendingLogin};
pub use config::{AuthConfig, DEFAULT_AUTHORITY_HOST};
pub use crypto::{constant_time_eq, random_token, HmacKey, HmacKeyError};
pub use error::AuthError;
pub use provider::{AzureAdProvider, IdentityProvider};
pub use session::{Expiring, SessionCodec, SessionPayload};
pub use token::{IdTokenClaims, IdTokenValidator, Jwk, Jwks};
