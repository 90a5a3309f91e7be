//! Role types

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Ordered sequence of role names granted to a principal.
///
/// Serialized as a plain JSON array, which is also the format stored under
/// `users:{email}:roles`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(Vec<String>);

impl RoleSet {
    /// An empty role set
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no roles are granted
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of role names
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Exact, case-sensitive membership check
    pub fn contains(&self, role: &str) -> bool {
        self.0.iter().any(|r| r == role)
    }

    /// Iterate role names in stored order
    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for RoleSet {
    fn from(roles: Vec<String>) -> Self {
        Self(roles)
    }
}

impl From<Vec<&str>> for RoleSet {
    fn from(roles: Vec<&str>) -> Self {
        Self(roles.into_iter().map(String::from).collect())
    }
}

impl FromIterator<String> for RoleSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a RoleSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl std::fmt::Display for RoleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

/// Role names the content gate knows how to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KnownRole {
    /// Administrator view
    Admin,
    /// Member view
    Member,
}

impl KnownRole {
    /// All known roles, highest priority first
    pub const ALL: [KnownRole; 2] = [KnownRole::Admin, KnownRole::Member];

    /// Role name as stored in the configuration store
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Member => "Member",
        }
    }

    /// Highest-priority known role present in a role set
    pub fn highest_in(roles: &RoleSet) -> Option<Self> {
        Self::ALL.into_iter().find(|role| roles.contains(role.as_str()))
    }
}

impl std::fmt::Display for KnownRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role name is not one of [`KnownRole`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for KnownRole {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Self::Admin),
            "Member" => Ok(Self::Member),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}
