//! # sqlgate-guard
//!
//! SQL structural analysis, access validation and mandatory row-filter
//! injection for sqlgate.
//!
//! This crate provides functionality to:
//! - Parse a single-level `SELECT` into a structured descriptor using `sqlparser`
//! - Validate the referenced tables and columns against an [`AccessPolicy`](sqlgate_core::AccessPolicy)
//! - Inject mandatory row filters into the WHERE clause when they are missing
//!
//! ## How It Works
//!
//! The validator parses candidate SQL (typically produced by an NL-to-SQL
//! generation layer) and either denies it or returns it with the role's row
//! filters guaranteed present:
//!
//! **Before (from generator):**
//! ```sql
//! SELECT id, total FROM orders
//! ```
//!
//! **After (cleared for execution):**
//! ```sql
//! SELECT id, total FROM orders WHERE region = 'east'
//! ```
//!
//! ## Fail-closed rule
//!
//! Any reference the parser cannot confidently attribute to a known table
//! or column, and any filter that cannot be safely spliced, results in a
//! denial. Best-guess authorization is never granted.

pub mod error;
pub mod parser;
pub mod rewrite;
pub mod validator;

pub use error::{Denial, DenialKind};
pub use parser::{ColumnSet, JoinClause, ParseFailure, ParsedStatement, SelectAnalyzer, StatementKind};
pub use rewrite::FilterInjector;
pub use validator::{AccessValidator, Clearance};
