//! Role file parsing
//!
//! Two shapes are accepted:
//!
//! ```json
//! { "a@x.com": ["Admin"], "b@x.com": ["Member"] }
//! ```
//!
//! and the list form written by older tooling:
//!
//! ```json
//! [ { "name": "a@x.com", "role": "Admin" } ]
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use rolegate_types::{normalize_email, RoleSet};
use serde::Deserialize;

use crate::error::SyncError;

/// One user's desired roles
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignment {
    /// Lowercased email
    pub email: String,
    pub roles: RoleSet,
}

impl RoleAssignment {
    pub fn new(email: &str, roles: RoleSet) -> Self {
        Self {
            email: normalize_email(email),
            roles,
        }
    }

    /// Entries without an email or without roles are not applied
    pub fn is_valid(&self) -> bool {
        !self.email.is_empty() && !self.roles.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRoleFile {
    Map(BTreeMap<String, Vec<String>>),
    List(Vec<ListEntry>),
}

#[derive(Debug, Deserialize)]
struct ListEntry {
    #[serde(default)]
    name: String,
    #[serde(default)]
    role: String,
}

/// Parsed role file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleFile {
    assignments: Vec<RoleAssignment>,
}

impl RoleFile {
    /// Parse role file JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: RawRoleFile = serde_json::from_str(json)?;

        let assignments = match raw {
            RawRoleFile::Map(map) => map
                .into_iter()
                .map(|(email, roles)| RoleAssignment::new(&email, RoleSet::from(roles)))
                .collect(),
            RawRoleFile::List(entries) => entries
                .into_iter()
                .map(|entry| {
                    let roles = if entry.role.trim().is_empty() {
                        RoleSet::new()
                    } else {
                        RoleSet::from(vec![entry.role])
                    };
                    RoleAssignment::new(&entry.name, roles)
                })
                .collect(),
        };

        Ok(Self { assignments })
    }

    /// Load and parse a role file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SyncError::FileNotFound(path.to_path_buf())
            } else {
                SyncError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let file = Self::from_json(&contents).map_err(|source| SyncError::InvalidJson {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!(
            path = %path.display(),
            users = file.len(),
            "loaded role file"
        );
        Ok(file)
    }

    pub fn assignments(&self) -> &[RoleAssignment] {
        &self.assignments
    }

    /// Every non-empty email named in the file, valid entry or not
    pub fn emails(&self) -> HashSet<String> {
        self.assignments
            .iter()
            .filter(|a| !a.email.is_empty())
            .map(|a| a.email.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_map_form() {
        let file = RoleFile::from_json(r#"{"B@x.com": ["Member"], "a@x.com": ["Admin", "Member"]}"#)
            .unwrap();
        assert_eq!(
            file.assignments(),
            &[
                RoleAssignment::new("a@x.com", RoleSet::from(vec!["Admin", "Member"])),
                RoleAssignment::new("b@x.com", RoleSet::from(vec!["Member"])),
            ]
        );
    }

    #[test]
    fn test_list_form() {
        let file = RoleFile::from_json(
            r#"[{"name": "A@x.com", "role": "Admin"}, {"name": "b@x.com"}, {"role": "Member"}]"#,
        )
        .unwrap();
        let assignments = file.assignments();
        assert_eq!(assignments.len(), 3);
        assert_eq!(assignments[0], RoleAssignment::new("a@x.com", RoleSet::from(vec!["Admin"])));
        assert!(!assignments[1].is_valid());
        assert!(!assignments[2].is_valid());
        assert_eq!(file.emails(), HashSet::from(["a@x.com".to_string(), "b@x.com".to_string()]));
    }

    #[test]
    fn test_invalid_shape_is_rejected() {
        assert!(RoleFile::from_json(r#""a@x.com""#).is_err());
        assert!(RoleFile::from_json(r#"{"a@x.com": "Admin"}"#).is_err());
        assert!(RoleFile::from_json("{not json").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = RoleFile::load(dir.path().join("users.json"));
        assert!(matches!(result, Err(SyncError::FileNotFound(_))));
    }

    #[test]
    fn test_load_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[{{").unwrap();
        let result = RoleFile::load(file.path());
        assert!(matches!(result, Err(SyncError::InvalidJson { .. })));
    }

    #[test]
    fn test_load_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"a@x.com": ["Admin"]}}"#).unwrap();
        let parsed = RoleFile::load(file.path()).unwrap();
        assert_eq!(parsed.len(), 1);
    }
}
