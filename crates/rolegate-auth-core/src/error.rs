//! Auth errors

use thiserror::Error;

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// The identity provider reported an error on the callback or token exchange
    #[error("sign-in rejected by provider: {error}")]
    ProviderRejected {
        error: String,
        description: Option<String>,
    },

    /// No pending login, or it outlived its window
    #[error("login attempt expired")]
    LoginExpired,

    /// Callback state does not match the pending login
    #[error("login state mismatch")]
    StateMismatch,

    /// Callback carried no authorization code
    #[error("authorization code missing from callback")]
    MissingCode,

    /// Invalid token (malformed, bad signature, wrong audience, issuer or nonce)
    #[error("invalid token")]
    InvalidToken,

    /// Token has expired
    #[error("token expired")]
    TokenExpired,

    /// A claim needed to build the principal is absent
    #[error("token is missing the {0} claim")]
    MissingClaim(&'static str),

    /// Could not reach the identity provider
    #[error("network error: {0}")]
    Network(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ProviderRejected { .. }
            | Self::InvalidToken
            | Self::TokenExpired
            | Self::MissingClaim(_) => 401,
            Self::LoginExpired | Self::StateMismatch | Self::MissingCode => 400,
            Self::Network(_) => 502,
            Self::Configuration(_) | Self::Internal(_) => 500,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ProviderRejected { .. } => "PROVIDER_REJECTED",
            Self::LoginExpired => "LOGIN_EXPIRED",
            Self::StateMismatch => "STATE_MISMATCH",
            Self::MissingCode => "MISSING_CODE",
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::MissingClaim(_) => "MISSING_CLAIM",
            Self::Network(_) => "PROVIDER_UNREACHABLE",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show on the login error page
    pub fn user_message(&self) -> String {
        match self {
            Self::ProviderRejected { error, description } => match description {
                Some(description) if !description.is_empty() => {
                    format!("Sign-in was not completed ({error}): {description}")
                }
                _ => format!("Sign-in was not completed ({error})."),
            },
            Self::LoginExpired => "Your sign-in attempt expired. Please try again.".to_string(),
            Self::StateMismatch | Self::MissingCode => {
                "The sign-in response was not valid. Please try again.".to_string()
            }
            Self::InvalidToken | Self::TokenExpired | Self::MissingClaim(_) => {
                "Your identity could not be verified. Please try again.".to_string()
            }
            Self::Network(_) => {
                "The sign-in service could not be reached. Please try again shortly.".to_string()
            }
            Self::Configuration(_) | Self::Internal(_) => {
                "Sign-in is unavailable due to a server error.".to_string()
            }
        }
    }
}
