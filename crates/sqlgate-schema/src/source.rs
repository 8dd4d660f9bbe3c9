//! Database introspection boundary.
//!
//! Adapters implement [`SchemaSource`]; [`load_catalog`] drives a full scan
//! and assembles a [`SchemaCatalog`], tolerating per-table failures so one
//! broken table cannot blank out the whole catalog.

use async_trait::async_trait;
use sqlgate_core::{ColumnSchema, ForeignKey, SchemaCatalog, TableSchema};

/// Read-only access to a database's physical structure.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Names of all user tables.
    async fn list_tables(&self) -> anyhow::Result<Vec<String>>;

    /// Column descriptors for one table, in ordinal order. Primary-key
    /// flags are set by the caller from `primary_key`.
    async fn columns(&self, table: &str) -> anyhow::Result<Vec<ColumnSchema>>;

    /// Primary-key column names for one table.
    async fn primary_key(&self, table: &str) -> anyhow::Result<Vec<String>>;

    /// Foreign-key edges leaving one table.
    async fn foreign_keys(&self, table: &str) -> anyhow::Result<Vec<ForeignKey>>;
}

/// Scan every table of a source into a catalog snapshot.
///
/// A table whose introspection fails is recorded in `catalog.failures` and
/// skipped; the scan continues.
pub async fn load_catalog(source: &dyn SchemaSource) -> anyhow::Result<SchemaCatalog> {
    let mut catalog = SchemaCatalog::new();

    for table_name in source.list_tables().await? {
        match introspect_table(source, &table_name).await {
            Ok(table) => catalog.insert(table),
            Err(e) => {
                tracing::warn!(table = table_name, error = %e, "table introspection failed");
                catalog.record_failure(table_name, e.to_string());
            }
        }
    }

    Ok(catalog)
}

async fn introspect_table(source: &dyn SchemaSource, table: &str) -> anyhow::Result<TableSchema> {
    let mut columns = source.columns(table).await?;
    let primary_key = source.primary_key(table).await?;
    let foreign_keys = source.foreign_keys(table).await?;

    for column in &mut columns {
        column.primary_key = primary_key.iter().any(|pk| pk == &column.name);
    }

    Ok(TableSchema {
        name: table.to_string(),
        columns,
        foreign_keys,
    })
}
