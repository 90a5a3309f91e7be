//! Store key layout for role assignments

use rolegate_types::normalize_email;

/// Key filter matching every role assignment
pub const ROLE_KEY_FILTER: &str = "users:*";

/// Build the store key holding a user's roles: `users:{email}:roles`
pub fn role_key(email: &str) -> String {
    format!("users:{}:roles", normalize_email(email))
}

/// Extract the email from a role key.
///
/// Only keys with exactly three segments `users`, a non-empty email, and
/// `roles` are recognized.
pub fn parse_role_key(key: &str) -> Option<&str> {
    let mut parts = key.split(':');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("users"), Some(email), Some("roles"), None) if !email.is_empty() => Some(email),
        _ => None,
    }
}
