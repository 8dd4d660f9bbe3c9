//! Virtual schema construction.
//!
//! A [`SchemaView`] is the redacted description of the database a role is
//! allowed to see. Cross-boundary foreign-key edges are dropped, not
//! redirected: an edge pointing at an invisible table would imply the
//! table exists.

use serde::{Deserialize, Serialize};
use sqlgate_core::{AccessPolicy, SchemaCatalog};
use std::collections::BTreeMap;

/// Errors from view construction.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The policy grants tables but none of them resolve against the
    /// catalog; a fully empty view would misrepresent the database as gone.
    #[error("schema unavailable: none of the granted tables exist in the catalog")]
    SchemaUnavailable,
}

/// A redacted column descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnView {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    #[serde(default)]
    pub comment: Option<String>,
    pub primary_key: bool,
}

/// One table as a role sees it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableView {
    pub name: String,
    pub columns: Vec<ColumnView>,
    /// Foreign-key edges whose referenced table is also in the view.
    pub foreign_keys: Vec<sqlgate_core::ForeignKey>,
    /// Mandatory row filters, joined with AND.
    #[serde(default)]
    pub row_filter: Option<String>,
}

/// The redacted virtual schema for one role.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaView {
    pub tables: BTreeMap<String, TableView>,
    /// Granted tables that were absent from the catalog (schema drift);
    /// skipped with a diagnostic rather than failing the view.
    #[serde(default)]
    pub skipped: Vec<String>,
}

/// Builds role-scoped schema views.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaViewBuilder;

impl SchemaViewBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Derive the virtual schema for a policy over a catalog snapshot.
    pub fn build_view(
        &self,
        catalog: &SchemaCatalog,
        policy: &AccessPolicy,
    ) -> Result<SchemaView, SchemaError> {
        let mut view = SchemaView::default();

        for table_name in policy.allowed_tables() {
            let Some(table) = catalog.table(table_name) else {
                tracing::warn!(table = table_name, "granted table missing from catalog, skipping");
                view.skipped.push(table_name.to_string());
                continue;
            };

            let allow_list = policy.allowed_columns(table_name);
            let columns: Vec<ColumnView> = table
                .columns
                .iter()
                .filter(|c| allow_list.is_none_or(|cols| cols.contains(&c.name)))
                .map(|c| ColumnView {
                    name: c.name.clone(),
                    data_type: c.data_type.clone(),
                    nullable: c.nullable,
                    comment: c.comment.clone(),
                    primary_key: c.primary_key,
                })
                .collect();

            let foreign_keys = table
                .foreign_keys
                .iter()
                .filter(|fk| policy.allows_table(&fk.referred_table))
                .cloned()
                .collect();

            let filters = policy.mandatory_filters(table_name);
            let row_filter = if filters.is_empty() {
                None
            } else {
                Some(filters.join(" AND "))
            };

            view.tables.insert(
                table_name.to_string(),
                TableView {
                    name: table_name.to_string(),
                    columns,
                    foreign_keys,
                    row_filter,
                },
            );
        }

        if view.tables.is_empty() && !policy.is_empty() {
            return Err(SchemaError::SchemaUnavailable);
        }

        Ok(view)
    }
}
