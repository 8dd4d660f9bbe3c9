//! Schema catalog snapshot types.
//!
//! A [`SchemaCatalog`] is a read-only snapshot of the physical database
//! structure, produced by an introspection adapter and serializable to a
//! JSON snapshot file. This crate never mutates a catalog after it is
//! built; cache refresh is the owning caller's responsibility.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A column descriptor as reported by introspection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    /// Declared type as a string, e.g. `varchar(100)` or `decimal(10,2)`.
    pub data_type: String,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub primary_key: bool,
}

/// A foreign-key edge from one table to another.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForeignKey {
    /// Constrained columns on the owning table.
    pub columns: Vec<String>,
    pub referred_table: String,
    pub referred_columns: Vec<String>,
}

/// Physical structure of one table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    /// Columns in ordinal order.
    pub columns: Vec<ColumnSchema>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    /// Primary-key column names, in column order.
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// A table whose introspection failed during a catalog scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntrospectionFailure {
    pub table: String,
    pub error: String,
}

/// Immutable snapshot of a database's structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchemaCatalog {
    /// When the snapshot was captured (UTC).
    pub captured_at: DateTime<Utc>,
    /// Tables by physical name.
    pub tables: BTreeMap<String, TableSchema>,
    /// Tables that could not be introspected. A partial scan is still a
    /// usable catalog; the failures are carried for diagnostics.
    #[serde(default)]
    pub failures: Vec<IntrospectionFailure>,
}

impl SchemaCatalog {
    /// Create an empty catalog stamped with the current time.
    pub fn new() -> Self {
        Self {
            captured_at: Utc::now(),
            tables: BTreeMap::new(),
            failures: Vec::new(),
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn insert(&mut self, table: TableSchema) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn record_failure(&mut self, table: impl Into<String>, error: impl Into<String>) {
        self.failures.push(IntrospectionFailure {
            table: table.into(),
            error: error.into(),
        });
    }
}

impl Default for SchemaCatalog {
    fn default() -> Self {
        Self::new()
    }
}
