//! Denial types for access validation.
//!
//! A denial is an expected, frequent outcome rather than an exceptional
//! one, so it is modeled as a plain value with a kind and a human-readable
//! message, never raised as a panic.

use std::fmt;

/// A terminal, non-retryable refusal to clear a SQL statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    /// The kind of denial.
    pub kind: DenialKind,
    /// Human-readable message.
    pub message: String,
}

impl Denial {
    /// Create a new denial.
    pub fn new(kind: DenialKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// The statement is not a supported single-level SELECT.
    pub fn unsupported_statement(detail: &str) -> Self {
        Self::new(
            DenialKind::UnsupportedStatement,
            format!("unsupported statement: {}, only SELECT queries are allowed", detail),
        )
    }

    /// The statement references a table outside the role's policy, or a
    /// FROM relation that could not be resolved to a physical table.
    pub fn table_forbidden(table: &str) -> Self {
        Self::new(
            DenialKind::TableForbidden,
            format!("access to table '{}' is not allowed", table),
        )
    }

    /// The statement projects a column outside the table's allow-list, or a
    /// field reference that could not be resolved.
    pub fn column_forbidden(table: &str, column: &str) -> Self {
        Self::new(
            DenialKind::ColumnForbidden,
            format!("access to column '{}.{}' is not allowed", table, column),
        )
    }

    /// A mandatory row filter is missing and could not be safely injected.
    pub fn missing_filter_unrepairable(table: &str, predicate: &str) -> Self {
        Self::new(
            DenialKind::MissingFilterUnrepairable,
            format!(
                "mandatory filter '{}' for table '{}' is missing and could not be injected",
                predicate, table
            ),
        )
    }
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Denial {}

/// Categories of denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialKind {
    /// Not a SELECT, or text the parser could not decompose.
    UnsupportedStatement,
    /// Table outside the policy (or unresolved relation).
    TableForbidden,
    /// Column outside the table's allow-list (or unresolved reference).
    ColumnForbidden,
    /// Mandatory filter missing and injection failed.
    MissingFilterUnrepairable,
}
