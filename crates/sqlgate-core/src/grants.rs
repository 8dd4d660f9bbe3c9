//! Grants file loading.
//!
//! Role grants are persisted configuration (the policy source collaborator).
//! A grants file maps role names to their [`TableGrant`] lists:
//!
//! ```yaml
//! roles:
//!   analyst:
//!     - table: orders
//!       columns: [id, total]
//!       row_filter: "region = 'east'"
//!     - table: products
//! ```

use crate::policy::{AccessPolicy, TableGrant};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Error type for grants loading.
#[derive(Debug, thiserror::Error)]
pub enum GrantsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown role: {0}")]
    UnknownRole(String),
}

/// Grants for every role, as loaded from configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrantsFile {
    #[serde(default)]
    pub roles: BTreeMap<String, Vec<TableGrant>>,
}

impl GrantsFile {
    /// Load a grants file from a YAML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, GrantsError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse grants from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, GrantsError> {
        serde_yaml::from_str(content).map_err(GrantsError::from)
    }

    /// Materialize an immutable policy snapshot for one role.
    pub fn policy_for(&self, role: &str) -> Result<AccessPolicy, GrantsError> {
        let grants = self
            .roles
            .get(role)
            .ok_or_else(|| GrantsError::UnknownRole(role.to_string()))?;
        Ok(AccessPolicy::from_grants(grants.iter().cloned()))
    }

    /// Materialize a policy from the union of several roles' grants, in the
    /// order given. Unknown roles fail rather than silently granting nothing.
    pub fn policy_for_roles<'a, I>(&self, roles: I) -> Result<AccessPolicy, GrantsError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut merged = Vec::new();
        for role in roles {
            let grants = self
                .roles
                .get(role)
                .ok_or_else(|| GrantsError::UnknownRole(role.to_string()))?;
            merged.extend(grants.iter().cloned());
        }
        Ok(AccessPolicy::from_grants(merged))
    }
}
