//! Access validation over parsed statements.
//!
//! The `AccessValidator` is the entry point callers use for every candidate
//! SQL string. Checks run in order, short-circuiting on the first failure:
//!
//! 1. **Statement kind** - only single-level SELECT passes
//! 2. **Unresolved relations** - anything the parser could not name denies
//! 3. **Table access** - every referenced table must be granted
//! 4. **Column access** - projected columns against per-table allow-lists
//! 5. **Mandatory filters** - required row predicates present, or injected
//!
//! The validator is pure and stateless; one instance can serve arbitrarily
//! many concurrent validations.

use crate::error::Denial;
use crate::parser::{ParsedStatement, SelectAnalyzer, StatementKind};
use crate::rewrite::FilterInjector;
use sqlparser::ast::{visit_expressions_mut, Expr};
use sqlgate_core::AccessPolicy;
use std::collections::HashMap;
use std::ops::ControlFlow;

/// A statement cleared for execution, possibly rewritten to carry the
/// role's mandatory row filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clearance {
    /// The SQL to execute: the original text, or the rewritten form when
    /// filters were injected.
    pub sql: String,
    /// Whether `sql` differs from the input.
    pub rewritten: bool,
    /// Predicates that were injected, rendered to text.
    pub injected: Vec<String>,
}

/// Validates SQL statements against an access policy.
#[derive(Clone, Default)]
pub struct AccessValidator {
    analyzer: SelectAnalyzer,
    injector: FilterInjector,
}

impl AccessValidator {
    pub fn new() -> Self {
        Self {
            analyzer: SelectAnalyzer::new(),
            injector: FilterInjector::new(),
        }
    }

    /// Validate a SQL string against a policy snapshot.
    ///
    /// Returns a [`Clearance`] on success or a [`Denial`] naming the first
    /// violation. Denials are expected outcomes, not faults; this function
    /// never panics on untrusted input.
    pub fn validate(&self, sql: &str, policy: &AccessPolicy) -> Result<Clearance, Denial> {
        let parsed = match self.analyzer.parse(sql) {
            Ok(parsed) => parsed,
            // Unparseable text cannot be authorized. Fail closed.
            Err(failure) => return Err(Denial::unsupported_statement(&failure.to_string())),
        };

        if let StatementKind::Other(label) = &parsed.kind {
            return Err(Denial::unsupported_statement(label));
        }

        self.check_tables(&parsed, policy)?;
        self.check_columns(&parsed, policy)?;
        let missing = self.missing_filters(&parsed, policy);

        if missing.is_empty() {
            tracing::debug!(tables = ?parsed.tables, "statement cleared without rewrite");
            return Ok(Clearance {
                sql: sql.to_string(),
                rewritten: false,
                injected: Vec::new(),
            });
        }

        self.repair(sql, &missing)
    }

    fn check_tables(&self, parsed: &ParsedStatement, policy: &AccessPolicy) -> Result<(), Denial> {
        // A FROM relation that is not a plain table cannot be attributed to
        // any grant, so it denies outright.
        if let Some(raw) = parsed.unresolved_relations.first() {
            return Err(Denial::table_forbidden(raw));
        }

        for table in &parsed.tables {
            if !policy.allows_table(table) {
                return Err(Denial::table_forbidden(table));
            }
        }
        Ok(())
    }

    fn check_columns(&self, parsed: &ParsedStatement, policy: &AccessPolicy) -> Result<(), Denial> {
        if let Some(raw) = parsed.unresolved_fields.first() {
            let table = parsed.tables.first().map(String::as_str).unwrap_or("?");
            return Err(Denial::column_forbidden(table, raw));
        }

        for (table, set) in &parsed.projected {
            // The `*` sentinel stands for the whole table, which passed the
            // table check already.
            for column in &set.columns {
                if !policy.allows_column(table, column) {
                    return Err(Denial::column_forbidden(table, column));
                }
            }
        }
        Ok(())
    }

    /// Collect every mandatory filter that is not already present, keeping
    /// them all so the repair step can splice them in one pass.
    fn missing_filters<'p>(
        &self,
        parsed: &ParsedStatement,
        policy: &'p AccessPolicy,
    ) -> Vec<MissingFilter<'p>> {
        let mut missing = Vec::new();

        for table in &parsed.tables {
            for required in policy.mandatory_filters(table) {
                if !self.filter_present(parsed, table, required) {
                    missing.push(MissingFilter {
                        table: table.clone(),
                        predicate: required,
                    });
                }
            }
        }
        missing
    }

    /// A required predicate counts as present only when it matches a
    /// top-level AND conjunct of the WHERE clause, compared case-insensitively
    /// after AST rendering with table qualifiers resolved. A match inside an
    /// OR group never satisfies the requirement: `region = 'east' OR 1=1`
    /// does not restrict rows to the east region.
    fn filter_present(&self, parsed: &ParsedStatement, table: &str, required: &str) -> bool {
        let required_norm = match self.injector.parse_predicate(required) {
            Ok(expr) => render_normalized(&expr),
            // An unparseable requirement can never be verified present; it
            // falls through to the repair step, which will fail closed.
            Err(_) => return false,
        };

        parsed.conjuncts.iter().any(|conjunct| {
            let stripped = strip_qualifiers(conjunct, table, &parsed.aliases);
            render_normalized(&stripped) == required_norm
        })
    }

    fn repair(&self, sql: &str, missing: &[MissingFilter<'_>]) -> Result<Clearance, Denial> {
        let mut predicates = Vec::with_capacity(missing.len());
        for filter in missing {
            let expr = self.injector.parse_predicate(filter.predicate).map_err(|e| {
                tracing::warn!(table = filter.table, error = %e, "row filter cannot be parsed");
                Denial::missing_filter_unrepairable(&filter.table, filter.predicate)
            })?;
            predicates.push(expr);
        }

        let rewritten = self.injector.inject(sql, &predicates).map_err(|e| {
            let first = &missing[0];
            tracing::warn!(error = %e, "row filter injection failed");
            Denial::missing_filter_unrepairable(&first.table, first.predicate)
        })?;

        let injected: Vec<String> = predicates.iter().map(|p| p.to_string()).collect();
        tracing::debug!(injected = ?injected, "statement cleared with injected filters");

        Ok(Clearance {
            sql: rewritten,
            rewritten: true,
            injected,
        })
    }
}

struct MissingFilter<'p> {
    table: String,
    predicate: &'p str,
}

fn render_normalized(expr: &Expr) -> String {
    expr.to_string().to_lowercase()
}

/// Rewrite `alias.column` / `table.column` references to bare columns when
/// the qualifier resolves to the target table, so a configured filter
/// `region = 'east'` matches a generated `o.region = 'east'`. The visitor
/// reaches every expression form, so qualified IN / BETWEEN / LIKE filters
/// match too.
fn strip_qualifiers(expr: &Expr, table: &str, aliases: &HashMap<String, String>) -> Expr {
    let mut stripped = expr.clone();
    let _ = visit_expressions_mut(&mut stripped, |e: &mut Expr| {
        if let Expr::CompoundIdentifier(parts) = e {
            if parts.len() >= 2 {
                let qualifier = parts[parts.len() - 2].value.as_str();
                let resolved = aliases
                    .get(qualifier)
                    .map(String::as_str)
                    .unwrap_or(qualifier);
                if resolved == table {
                    *e = Expr::Identifier(parts[parts.len() - 1].clone());
                }
            }
        }
        ControlFlow::<()>::Continue(())
    });
    stripped
}
