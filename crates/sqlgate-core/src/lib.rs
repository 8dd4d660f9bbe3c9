//! # sqlgate-core
//!
//! Shared data types for sqlgate: access policies assembled from role
//! grants, and read-only schema catalog snapshots produced by database
//! introspection.
//!
//! Nothing in this crate performs I/O beyond loading a grants file; the
//! policy and catalog types are plain immutable values that the guard and
//! schema crates consume.

pub mod catalog;
pub mod grants;
pub mod policy;

pub use catalog::{ColumnSchema, ForeignKey, IntrospectionFailure, SchemaCatalog, TableSchema};
pub use grants::{GrantsError, GrantsFile};
pub use policy::{AccessPolicy, TableGrant};
