//! Principal types

use serde::{Deserialize, Serialize};

/// An authenticated user's identity record.
///
/// Created on successful login and never mutated afterwards. The email is
/// lowercased on construction because role keys in the store are lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    user_id: String,
    email: String,
    display_name: String,
}

impl Principal {
    /// Create a new principal
    pub fn new(
        user_id: impl Into<String>,
        email: impl AsRef<str>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            email: normalize_email(email.as_ref()),
            display_name: display_name.into(),
        }
    }

    /// Stable identifier issued by the identity provider
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Lowercased email (sign-in name)
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Display name as reported by the identity provider
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Name to greet the user with, falling back to the email
    pub fn greeting_name(&self) -> &str {
        if self.display_name.trim().is_empty() {
            &self.email
        } else {
            &self.display_name
        }
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.greeting_name(), self.email)
    }
}

/// Normalize an email for key construction and comparisons
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
