//! Access policy types.
//!
//! A policy is assembled fresh for every authorization decision from the
//! union of a user's role grants and is never mutated afterwards, so two
//! concurrent requests can never observe partially merged state.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A single grant row: one table a role may read, with an optional column
/// allow-list and an optional mandatory row filter.
///
/// Mirrors one row of the persisted `role_permissions` configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableGrant {
    /// Physical table name.
    pub table: String,

    /// Visible columns. `None` means every column of the table is visible.
    #[serde(default)]
    pub columns: Option<Vec<String>>,

    /// Row-level predicate that must hold whenever the table is queried.
    #[serde(default)]
    pub row_filter: Option<String>,
}

/// The materialized set of tables, columns and row filters a role may use.
///
/// Invariant: every key of `allowed_columns` and `mandatory_filters` is a
/// member of `allowed_tables`. The invariant is upheld by construction via
/// [`AccessPolicy::from_grants`]; the struct fields are read-only to callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessPolicy {
    allowed_tables: BTreeSet<String>,
    allowed_columns: BTreeMap<String, BTreeSet<String>>,
    mandatory_filters: BTreeMap<String, Vec<String>>,
}

impl AccessPolicy {
    /// Assemble a policy from the union of a user's role grants.
    ///
    /// Merge rules for repeated tables:
    /// - column lists union; a grant without a column list widens the table
    ///   to "all columns visible"
    /// - row filters append in encounter order, de-duplicated
    pub fn from_grants<I>(grants: I) -> Self
    where
        I: IntoIterator<Item = TableGrant>,
    {
        let mut allowed_tables = BTreeSet::new();
        let mut allowed_columns: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut all_columns: BTreeSet<String> = BTreeSet::new();
        let mut mandatory_filters: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for grant in grants {
            allowed_tables.insert(grant.table.clone());

            match grant.columns {
                Some(cols) if !all_columns.contains(&grant.table) => {
                    allowed_columns
                        .entry(grant.table.clone())
                        .or_default()
                        .extend(cols);
                }
                Some(_) => {
                    // A previous grant already widened this table to all columns.
                }
                None => {
                    all_columns.insert(grant.table.clone());
                    allowed_columns.remove(&grant.table);
                }
            }

            if let Some(filter) = grant.row_filter {
                let filter = filter.trim().to_string();
                if !filter.is_empty() {
                    let filters = mandatory_filters.entry(grant.table.clone()).or_default();
                    if !filters.contains(&filter) {
                        filters.push(filter);
                    }
                }
            }
        }

        Self {
            allowed_tables,
            allowed_columns,
            mandatory_filters,
        }
    }

    /// Check whether a table is visible to the role.
    pub fn allows_table(&self, table: &str) -> bool {
        self.allowed_tables.contains(table)
    }

    /// Check whether a column of a table is visible. Tables without an
    /// explicit allow-list permit every column.
    pub fn allows_column(&self, table: &str, column: &str) -> bool {
        match self.allowed_columns.get(table) {
            Some(cols) => cols.contains(column),
            None => self.allows_table(table),
        }
    }

    /// Tables visible to the role, in name order.
    pub fn allowed_tables(&self) -> impl Iterator<Item = &str> {
        self.allowed_tables.iter().map(String::as_str)
    }

    /// Explicit column allow-list for a table, if one exists.
    pub fn allowed_columns(&self, table: &str) -> Option<&BTreeSet<String>> {
        self.allowed_columns.get(table)
    }

    /// Mandatory row-filter predicates for a table, in grant order.
    pub fn mandatory_filters(&self, table: &str) -> &[String] {
        self.mandatory_filters
            .get(table)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// True when the policy grants nothing at all.
    pub fn is_empty(&self) -> bool {
        self.allowed_tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(table: &str, columns: Option<&[&str]>, filter: Option<&str>) -> TableGrant {
        TableGrant {
            table: table.to_string(),
            columns: columns.map(|c| c.iter().map(|s| s.to_string()).collect()),
            row_filter: filter.map(|s| s.to_string()),
        }
    }

    #[test]
    fn empty_policy_denies_everything() {
        let policy = AccessPolicy::from_grants([]);
        assert!(policy.is_empty());
        assert!(!policy.allows_table("orders"));
        assert!(!policy.allows_column("orders", "id"));
    }

    #[test]
    fn column_lists_union_across_grants() {
        let policy = AccessPolicy::from_grants([
            grant("orders", Some(&["id"]), None),
            grant("orders", Some(&["total"]), None),
        ]);

        assert!(policy.allows_column("orders", "id"));
        assert!(policy.allows_column("orders", "total"));
        assert!(!policy.allows_column("orders", "customer_ssn"));
    }

    #[test]
    fn grant_without_columns_widens_to_all() {
        let policy = AccessPolicy::from_grants([
            grant("orders", Some(&["id"]), None),
            grant("orders", None, None),
            grant("orders", Some(&["total"]), None),
        ]);

        // Once widened, later narrow grants do not shrink visibility.
        assert!(policy.allowed_columns("orders").is_none());
        assert!(policy.allows_column("orders", "anything"));
    }

    #[test]
    fn row_filters_append_and_dedup() {
        let policy = AccessPolicy::from_grants([
            grant("orders", None, Some("region = 'east'")),
            grant("orders", None, Some("region = 'east'")),
            grant("orders", None, Some("status <> 'void'")),
        ]);

        assert_eq!(
            policy.mandatory_filters("orders"),
            &["region = 'east'", "status <> 'void'"]
        );
    }

    #[test]
    fn blank_row_filter_is_ignored() {
        let policy = AccessPolicy::from_grants([grant("orders", None, Some("  "))]);
        assert!(policy.mandatory_filters("orders").is_empty());
    }

    #[test]
    fn column_check_on_unknown_table_denies() {
        let policy = AccessPolicy::from_grants([grant("orders", None, None)]);
        assert!(!policy.allows_column("customers", "id"));
    }
}
