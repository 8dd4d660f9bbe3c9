//! Versioned catalog cache.
//!
//! The cache owns the current catalog snapshot explicitly. Refresh is an
//! operation the caller drives (on a schema-change notification or a TTL
//! it manages); nothing in this crate mutates a snapshot in place, so every
//! holder of an `Arc` keeps a consistent view for the duration of its
//! request.

use sqlgate_core::SchemaCatalog;
use std::sync::Arc;

/// Explicitly owned, versioned schema snapshot.
#[derive(Debug, Clone)]
pub struct CatalogCache {
    snapshot: Arc<SchemaCatalog>,
    version: u64,
}

impl CatalogCache {
    /// Seed the cache with an initial snapshot (version 1).
    pub fn new(catalog: SchemaCatalog) -> Self {
        Self {
            snapshot: Arc::new(catalog),
            version: 1,
        }
    }

    /// The current snapshot. Cheap to clone and hand to a request.
    pub fn snapshot(&self) -> Arc<SchemaCatalog> {
        Arc::clone(&self.snapshot)
    }

    /// Monotonic version, bumped on every refresh.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Replace the snapshot with a freshly introspected catalog.
    pub fn refresh(&mut self, catalog: SchemaCatalog) {
        self.snapshot = Arc::new(catalog);
        self.version += 1;
        tracing::debug!(
            version = self.version,
            tables = self.snapshot.tables.len(),
            "catalog snapshot refreshed"
        );
    }
}
