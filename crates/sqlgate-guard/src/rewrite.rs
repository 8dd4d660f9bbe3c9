//! Mandatory-filter injection.
//!
//! Injection is AST-level: the missing predicate is parsed as an expression
//! and appended as an AND conjunct to the statement's selection (creating a
//! WHERE clause when absent), then the whole statement is rendered back to
//! text. There is no textual splicing, so GROUP BY / ORDER BY / LIMIT tails
//! survive untouched. Any predicate that cannot be parsed, or a statement
//! shape that cannot take a selection, is reported to the caller, which
//! fails closed.

use sqlparser::ast::{BinaryOperator, Expr, SetExpr, Statement};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

/// Characters of mangled quoting seen in persisted filter configuration:
/// full-width quotes pasted from IME input alongside ASCII ones.
const FULLWIDTH_QUOTES: [char; 6] = [
    '\u{2018}', '\u{2019}', '\u{201C}', '\u{201D}', '\u{FF07}', '\u{FF02}',
];

/// Injects row-filter predicates into SELECT statements.
pub struct FilterInjector {
    dialect: MySqlDialect,
}

impl Clone for FilterInjector {
    fn clone(&self) -> Self {
        Self {
            dialect: MySqlDialect {},
        }
    }
}

impl Default for FilterInjector {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterInjector {
    pub fn new() -> Self {
        Self {
            dialect: MySqlDialect {},
        }
    }

    /// Parse a configured predicate string into an expression, normalizing
    /// its quoting first.
    pub fn parse_predicate(&self, raw: &str) -> Result<Expr, String> {
        let normalized = normalize_predicate(raw);
        Parser::new(&self.dialect)
            .try_with_sql(&normalized)
            .and_then(|mut p| p.parse_expr())
            .map_err(|e| format!("predicate '{}' does not parse: {}", normalized, e))
    }

    /// Append the given predicates to the statement's WHERE clause as AND
    /// conjuncts, creating the clause when absent, and render the result.
    pub fn inject(&self, sql: &str, predicates: &[Expr]) -> Result<String, String> {
        if predicates.is_empty() {
            return Ok(sql.to_string());
        }

        let mut statements =
            Parser::parse_sql(&self.dialect, sql).map_err(|e| e.to_string())?;
        let stmt = match statements.as_mut_slice() {
            [stmt] => stmt,
            _ => return Err("expected exactly one statement".to_string()),
        };

        let query = match stmt {
            Statement::Query(query) => query,
            _ => return Err("only SELECT statements can take a row filter".to_string()),
        };

        let select = match query.body.as_mut() {
            SetExpr::Select(select) => select,
            _ => return Err("statement shape cannot take a row filter".to_string()),
        };

        let mut selection = select.selection.take();
        for predicate in predicates {
            selection = Some(match selection {
                Some(existing) => Expr::BinaryOp {
                    // Rendering does not re-insert precedence parentheses, so
                    // an OR operand must be nested or the AND would bind
                    // tighter than written.
                    left: Box::new(parenthesize_or(existing)),
                    op: BinaryOperator::And,
                    right: Box::new(parenthesize_or(predicate.clone())),
                },
                None => predicate.clone(),
            });
        }
        select.selection = selection;

        Ok(stmt.to_string())
    }
}

/// Wrap a top-level OR in parentheses so it survives as one operand of the
/// injected AND.
fn parenthesize_or(expr: Expr) -> Expr {
    match expr {
        Expr::BinaryOp {
            op: BinaryOperator::Or,
            ..
        } => Expr::Nested(Box::new(expr)),
        other => other,
    }
}

/// Normalize a configured predicate's quoting: map full-width quote
/// characters to ASCII, trim trailing terminators, and re-quote a simple
/// trailing literal whose quoting came out mangled.
pub fn normalize_predicate(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| if FULLWIDTH_QUOTES.contains(&c) { '\'' } else { c })
        .collect();
    let trimmed = mapped.trim().trim_end_matches(';').trim_end();

    match split_comparison(trimmed) {
        Some((lhs, op, rhs)) if rhs.contains(['\'', '"']) && is_simple_token(rhs) => {
            let bare: String = rhs.chars().filter(|c| !matches!(c, '\'' | '"')).collect();
            if is_bare_literal(&bare) {
                format!("{} {} {}", lhs.trim_end(), op, bare)
            } else {
                format!("{} {} '{}'", lhs.trim_end(), op, bare)
            }
        }
        _ => trimmed.to_string(),
    }
}

/// Split `lhs op rhs` on the last comparison operator, if any.
fn split_comparison(predicate: &str) -> Option<(&str, &str, &str)> {
    for op in [">=", "<=", "<>", "!=", "=", ">", "<"] {
        if let Some(pos) = predicate.rfind(op) {
            let lhs = &predicate[..pos];
            let rhs = predicate[pos + op.len()..].trim();
            if !lhs.trim().is_empty() && !rhs.is_empty() {
                return Some((lhs, op, rhs));
            }
        }
    }
    None
}

/// A right-hand side we are willing to re-quote: one token, no nested
/// structure.
fn is_simple_token(rhs: &str) -> bool {
    !rhs.contains([' ', '(', ')', ','])
}

/// Values that stay unquoted after normalization.
fn is_bare_literal(value: &str) -> bool {
    value.parse::<f64>().is_ok()
        || matches!(
            value.to_ascii_uppercase().as_str(),
            "NULL" | "TRUE" | "FALSE"
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn injector() -> FilterInjector {
        FilterInjector::new()
    }

    #[test]
    fn normalization_is_idempotent_on_clean_predicates() {
        assert_eq!(normalize_predicate("region = 'east'"), "region = 'east'");
        assert_eq!(normalize_predicate("total > 100"), "total > 100");
    }

    #[test]
    fn fullwidth_quotes_are_mapped() {
        assert_eq!(
            normalize_predicate("region = \u{201C}east\u{201D}"),
            "region = 'east'"
        );
    }

    #[test]
    fn mixed_quotes_are_requoted() {
        assert_eq!(normalize_predicate("region = \"east'"), "region = 'east'");
    }

    #[test]
    fn numeric_and_null_stay_bare() {
        assert_eq!(normalize_predicate("total = '100'"), "total = 100");
        assert_eq!(normalize_predicate("deleted = 'NULL'"), "deleted = NULL");
    }

    #[test]
    fn trailing_semicolon_is_trimmed() {
        assert_eq!(normalize_predicate("region = 'east';"), "region = 'east'");
    }

    #[test]
    fn in_lists_pass_through_untouched() {
        assert_eq!(
            normalize_predicate("status IN ('a', 'b')"),
            "status IN ('a', 'b')"
        );
    }

    #[test]
    fn inject_creates_where_clause() {
        let inj = injector();
        let pred = inj.parse_predicate("region = 'east'").unwrap();
        let out = inj
            .inject("SELECT id, total FROM orders", &[pred])
            .unwrap();
        assert_eq!(out, "SELECT id, total FROM orders WHERE region = 'east'");
    }

    #[test]
    fn inject_appends_to_existing_where() {
        let inj = injector();
        let pred = inj.parse_predicate("region = 'east'").unwrap();
        let out = inj
            .inject("SELECT id FROM orders WHERE total > 100", &[pred])
            .unwrap();
        assert_eq!(
            out,
            "SELECT id FROM orders WHERE total > 100 AND region = 'east'"
        );
    }

    #[test]
    fn inject_lands_before_trailing_clauses() {
        let inj = injector();
        let pred = inj.parse_predicate("region = 'east'").unwrap();
        let out = inj
            .inject(
                "SELECT region, COUNT(*) FROM orders GROUP BY region ORDER BY region LIMIT 10",
                &[pred],
            )
            .unwrap();
        assert_eq!(
            out,
            "SELECT region, COUNT(*) FROM orders WHERE region = 'east' \
             GROUP BY region ORDER BY region LIMIT 10"
        );
    }

    #[test]
    fn existing_or_selection_is_parenthesized() {
        let inj = injector();
        let pred = inj.parse_predicate("region = 'east'").unwrap();
        let out = inj
            .inject("SELECT id FROM orders WHERE a = 1 OR b = 2", &[pred])
            .unwrap();
        assert_eq!(
            out,
            "SELECT id FROM orders WHERE (a = 1 OR b = 2) AND region = 'east'"
        );
    }

    #[test]
    fn or_predicate_is_parenthesized() {
        let inj = injector();
        let pred = inj.parse_predicate("region = 'east' OR region = 'west'").unwrap();
        let out = inj
            .inject("SELECT id FROM orders WHERE total > 5", &[pred])
            .unwrap();
        assert_eq!(
            out,
            "SELECT id FROM orders WHERE total > 5 AND (region = 'east' OR region = 'west')"
        );
    }

    #[test]
    fn inject_multiple_predicates_in_order() {
        let inj = injector();
        let preds = vec![
            inj.parse_predicate("region = 'east'").unwrap(),
            inj.parse_predicate("status <> 'void'").unwrap(),
        ];
        let out = inj.inject("SELECT id FROM orders", &preds).unwrap();
        assert_eq!(
            out,
            "SELECT id FROM orders WHERE region = 'east' AND status <> 'void'"
        );
    }

    #[test]
    fn unparseable_predicate_is_an_error() {
        assert!(injector().parse_predicate("region = = 'east'").is_err());
    }

    #[test]
    fn non_select_cannot_take_a_filter() {
        let inj = injector();
        let pred = inj.parse_predicate("region = 'east'").unwrap();
        assert!(inj.inject("DELETE FROM orders", &[pred]).is_err());
    }
}
