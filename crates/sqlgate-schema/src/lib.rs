//! # sqlgate-schema
//!
//! Role-scoped schema views for sqlgate.
//!
//! This crate provides functionality to:
//! - Derive a redacted [`SchemaView`] from a physical catalog and an access
//!   policy: only granted tables and columns, foreign-key edges pruned to
//!   visible tables, row-filter annotations attached
//! - Render a view as prompt text for NL-to-SQL generation
//! - Hold a versioned, explicitly refreshed catalog snapshot
//! - Define the async [`SchemaSource`] boundary that introspection adapters
//!   implement

pub mod cache;
pub mod render;
pub mod source;
pub mod view;

pub use cache::CatalogCache;
pub use render::render_prompt;
pub use source::{load_catalog, SchemaSource};
pub use view::{ColumnView, SchemaError, SchemaView, SchemaViewBuilder, TableView};
