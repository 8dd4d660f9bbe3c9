//! SQL structural analysis.
//!
//! Turns a candidate SQL string into a [`ParsedStatement`]: the tables,
//! aliases, projected columns, join clauses and top-level filter conjuncts
//! the statement references. Only single-level `SELECT` statements are
//! decomposed; anything else is classified so the validator can reject it.
//!
//! References the analyzer cannot confidently attribute to a known table or
//! column are recorded as unresolved rather than dropped. The validator
//! treats every unresolved entry as a policy violation.

use sqlparser::ast::{
    visit_expressions, BinaryOperator, Expr, FunctionArg, FunctionArgExpr, FunctionArguments,
    Join, JoinConstraint, JoinOperator, ObjectName, Select, SelectItem,
    SelectItemQualifiedWildcardKind, SetExpr, Statement, TableFactor, TableWithJoins,
};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::ControlFlow;

/// SQL text the parser could not decompose at all.
#[derive(Debug, Clone, thiserror::Error)]
#[error("failed to parse SQL: {0}")]
pub struct ParseFailure(pub String);

/// Statement classification. Everything but `Select` is rejected downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Other(String),
}

/// Columns a statement projects from one table. `wildcard` is the `*`
/// sentinel meaning "all columns of that table".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSet {
    pub wildcard: bool,
    pub columns: BTreeSet<String>,
}

/// One JOIN clause of the statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinClause {
    pub join_type: String,
    pub table: String,
    pub alias: Option<String>,
    pub on_condition: Option<String>,
}

/// Structured descriptor of one SQL statement.
#[derive(Debug, Clone, Default)]
pub struct ParsedStatement {
    pub kind: StatementKind,
    /// Physical table names in FROM/JOIN order, de-duplicated.
    pub tables: Vec<String>,
    /// Alias -> physical table.
    pub aliases: HashMap<String, String>,
    /// Referenced columns per physical table.
    pub projected: BTreeMap<String, ColumnSet>,
    /// FROM relations that are not plain tables (subqueries, table functions).
    pub unresolved_relations: Vec<String>,
    /// Field references whose qualifier or shape could not be resolved.
    pub unresolved_fields: Vec<String>,
    /// Top-level AND conjuncts of the WHERE clause. An OR group stays one
    /// conjunct; it is never decomposed further.
    pub conjuncts: Vec<Expr>,
    /// The conjuncts rendered to text, for reporting.
    pub predicates: Vec<String>,
    pub joins: Vec<JoinClause>,
}

impl Default for StatementKind {
    fn default() -> Self {
        StatementKind::Other("empty".to_string())
    }
}

impl ParsedStatement {
    fn other(label: impl Into<String>) -> Self {
        Self {
            kind: StatementKind::Other(label.into()),
            ..Default::default()
        }
    }

    /// Resolve an alias or table name to the physical table it denotes.
    pub fn resolve(&self, qualifier: &str) -> Option<&str> {
        if let Some(table) = self.aliases.get(qualifier) {
            return Some(table);
        }
        self.tables
            .iter()
            .find(|t| t.as_str() == qualifier)
            .map(String::as_str)
    }
}

/// Outcome of reducing one projected expression to its base column.
#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldRef {
    /// A column, possibly qualified by an alias or table name.
    Column {
        qualifier: Option<String>,
        column: String,
    },
    /// A pure literal or constant expression; excluded from column checks.
    Literal,
    /// An expression with no confidently extractable base column.
    Unresolved(String),
}

/// Analyzes SQL statements to extract their surface structure.
pub struct SelectAnalyzer {
    dialect: MySqlDialect,
}

impl Clone for SelectAnalyzer {
    fn clone(&self) -> Self {
        Self {
            dialect: MySqlDialect {},
        }
    }
}

impl Default for SelectAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SelectAnalyzer {
    /// Create a new analyzer.
    pub fn new() -> Self {
        Self {
            dialect: MySqlDialect {},
        }
    }

    /// Parse a SQL string into a structured descriptor.
    ///
    /// Returns `Err` only for text that is not SQL at all. Recognized but
    /// unsupported statements come back as `StatementKind::Other`, and
    /// odd-but-parseable SELECTs come back with their resolvable structure
    /// plus unresolved leftovers, so the validator can fail closed instead
    /// of this function failing exceptionally.
    pub fn parse(&self, sql: &str) -> Result<ParsedStatement, ParseFailure> {
        let statements =
            Parser::parse_sql(&self.dialect, sql).map_err(|e| ParseFailure(e.to_string()))?;

        match statements.as_slice() {
            [] => Err(ParseFailure("empty statement".to_string())),
            [stmt] => Ok(self.analyze(stmt)),
            _ => Ok(ParsedStatement::other("multiple statements")),
        }
    }

    fn analyze(&self, stmt: &Statement) -> ParsedStatement {
        let query = match stmt {
            Statement::Query(query) => query,
            other => return ParsedStatement::other(statement_label(other)),
        };

        if query.with.is_some() {
            return ParsedStatement::other("WITH query");
        }

        let select = match query.body.as_ref() {
            SetExpr::Select(select) => select,
            _ => return ParsedStatement::other("set operation"),
        };

        let mut parsed = ParsedStatement {
            kind: StatementKind::Select,
            ..Default::default()
        };

        let mut on_exprs = Vec::new();
        for table_with_joins in &select.from {
            self.visit_table_with_joins(table_with_joins, &mut parsed, &mut on_exprs);
        }

        self.visit_projection(select, &mut parsed);

        if let Some(selection) = &select.selection {
            flatten_conjuncts(selection, &mut parsed.conjuncts);
            parsed.predicates = parsed.conjuncts.iter().map(|e| e.to_string()).collect();
        }

        // Qualifiers inside filters and ON conditions must resolve against
        // the FROM set, same as projected fields.
        let mut unknown = Vec::new();
        for expr in parsed.conjuncts.iter().chain(on_exprs.iter()) {
            unknown.extend(unknown_qualifier_refs(expr, &parsed));
        }
        parsed.unresolved_fields.extend(unknown);

        parsed
    }

    fn visit_table_with_joins(
        &self,
        twj: &TableWithJoins,
        parsed: &mut ParsedStatement,
        on_exprs: &mut Vec<Expr>,
    ) {
        self.register_relation(&twj.relation, parsed);

        for join in &twj.joins {
            let table = self.register_relation(&join.relation, parsed);
            if let Some(table) = table {
                let alias = relation_alias(&join.relation);
                let (join_type, constraint) = join_parts(join);
                let on_condition = match constraint {
                    Some(JoinConstraint::On(expr)) => {
                        on_exprs.push(expr.clone());
                        Some(expr.to_string())
                    }
                    _ => None,
                };
                parsed.joins.push(JoinClause {
                    join_type: join_type.to_string(),
                    table,
                    alias,
                    on_condition,
                });
            }
        }
    }

    /// Register a FROM/JOIN relation; returns the physical table name when
    /// the relation is a plain table.
    fn register_relation(
        &self,
        relation: &TableFactor,
        parsed: &mut ParsedStatement,
    ) -> Option<String> {
        match relation {
            TableFactor::Table { name, alias, .. } => {
                let table = physical_name(name);
                if !parsed.tables.contains(&table) {
                    parsed.tables.push(table.clone());
                }
                if let Some(alias) = alias {
                    parsed
                        .aliases
                        .insert(alias.name.value.clone(), table.clone());
                }
                Some(table)
            }
            other => {
                parsed.unresolved_relations.push(other.to_string());
                None
            }
        }
    }

    fn visit_projection(&self, select: &Select, parsed: &mut ParsedStatement) {
        for item in &select.projection {
            match item {
                SelectItem::Wildcard(_) => {
                    // `SELECT *` projects every table in the FROM list.
                    for table in parsed.tables.clone() {
                        parsed.projected.entry(table).or_default().wildcard = true;
                    }
                }
                SelectItem::QualifiedWildcard(kind, _) => match kind {
                    SelectItemQualifiedWildcardKind::ObjectName(name) => {
                        let qualifier = physical_name(name);
                        match parsed.resolve(&qualifier) {
                            Some(table) => {
                                let table = table.to_string();
                                parsed.projected.entry(table).or_default().wildcard = true;
                            }
                            None => parsed.unresolved_fields.push(format!("{}.*", qualifier)),
                        }
                    }
                    _ => parsed.unresolved_fields.push(item.to_string()),
                },
                SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                    self.attribute_field(expr, parsed);
                }
            }
        }
    }

    /// Reduce one projected expression to a base column and attribute it to
    /// a table, or record it as unresolved.
    fn attribute_field(&self, expr: &Expr, parsed: &mut ParsedStatement) {
        match resolve_field(expr) {
            FieldRef::Literal => {}
            FieldRef::Column {
                qualifier: None,
                column,
            } => {
                // No table qualifier: attribute to the first FROM table,
                // matching common single-table generation output.
                match parsed.tables.first() {
                    Some(table) => {
                        let table = table.clone();
                        parsed
                            .projected
                            .entry(table)
                            .or_default()
                            .columns
                            .insert(column);
                    }
                    None => parsed.unresolved_fields.push(column),
                }
            }
            FieldRef::Column {
                qualifier: Some(qualifier),
                column,
            } => match parsed.resolve(&qualifier) {
                Some(table) => {
                    let table = table.to_string();
                    parsed
                        .projected
                        .entry(table)
                        .or_default()
                        .columns
                        .insert(column);
                }
                None => parsed
                    .unresolved_fields
                    .push(format!("{}.{}", qualifier, column)),
            },
            FieldRef::Unresolved(raw) => parsed.unresolved_fields.push(raw),
        }
    }
}

/// Reduce an expression to its originating column: unwrap CAST, descend into
/// function arguments and arithmetic, first column wins.
fn resolve_field(expr: &Expr) -> FieldRef {
    match expr {
        Expr::Identifier(ident) => FieldRef::Column {
            qualifier: None,
            column: ident.value.clone(),
        },
        Expr::CompoundIdentifier(parts) if parts.len() >= 2 => {
            let column = parts[parts.len() - 1].value.clone();
            let qualifier = parts[parts.len() - 2].value.clone();
            FieldRef::Column {
                qualifier: Some(qualifier),
                column,
            }
        }
        Expr::Value(_) => FieldRef::Literal,
        Expr::Cast { expr, .. } => resolve_field(expr),
        Expr::Nested(inner) => resolve_field(inner),
        Expr::UnaryOp { expr, .. } => resolve_field(expr),
        Expr::BinaryOp { left, right, .. } => combine(resolve_field(left), || resolve_field(right)),
        Expr::Function(func) => {
            let mut result = FieldRef::Literal;
            if let FunctionArguments::List(list) = &func.args {
                for arg in &list.args {
                    let arg_expr = match arg {
                        FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => Some(e),
                        FunctionArg::Named {
                            arg: FunctionArgExpr::Expr(e),
                            ..
                        } => Some(e),
                        // COUNT(*) and friends reference no single column.
                        FunctionArg::Unnamed(FunctionArgExpr::Wildcard) => None,
                        _ => None,
                    };
                    if let Some(e) = arg_expr {
                        result = combine(result, || resolve_field(e));
                        if matches!(result, FieldRef::Column { .. }) {
                            break;
                        }
                    }
                }
            }
            result
        }
        other => FieldRef::Unresolved(other.to_string()),
    }
}

/// Keep the first resolved column; literals are absorbed; anything else
/// stays unresolved.
fn combine(first: FieldRef, second: impl FnOnce() -> FieldRef) -> FieldRef {
    match first {
        FieldRef::Column { .. } => first,
        FieldRef::Literal => second(),
        FieldRef::Unresolved(raw) => match second() {
            found @ FieldRef::Column { .. } => found,
            _ => FieldRef::Unresolved(raw),
        },
    }
}

/// Flatten a WHERE expression on top-level AND. OR groups are kept whole:
/// an OR-combined predicate does not guarantee the same restriction as an
/// AND-combined one, so it must stay visible as a single unit.
fn flatten_conjuncts(expr: &Expr, out: &mut Vec<Expr>) {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            flatten_conjuncts(left, out);
            flatten_conjuncts(right, out);
        }
        Expr::Nested(inner) => flatten_conjuncts(inner, out),
        other => out.push(other.clone()),
    }
}

/// Collect `qualifier.column` references whose qualifier resolves to no
/// FROM table or alias. Runs over filter conjuncts and join ON conditions;
/// projected fields are resolved separately during attribution.
fn unknown_qualifier_refs(expr: &Expr, parsed: &ParsedStatement) -> Vec<String> {
    let mut unknown = Vec::new();
    let _ = visit_expressions(expr, |e: &Expr| {
        if let Expr::CompoundIdentifier(parts) = e {
            if parts.len() >= 2 {
                let qualifier = &parts[parts.len() - 2].value;
                if parsed.resolve(qualifier).is_none() {
                    unknown.push(format!("{}.{}", qualifier, parts[parts.len() - 1].value));
                }
            }
        }
        ControlFlow::<()>::Continue(())
    });
    unknown
}

/// Strip a schema prefix, keeping the bare table name (`shop.orders` ->
/// `orders`), to match grant configuration which uses bare names.
fn physical_name(name: &ObjectName) -> String {
    let rendered = name.to_string();
    rendered
        .rsplit('.')
        .next()
        .unwrap_or(&rendered)
        .trim_matches('`')
        .to_string()
}

fn relation_alias(relation: &TableFactor) -> Option<String> {
    match relation {
        TableFactor::Table { alias, .. } => alias.as_ref().map(|a| a.name.value.clone()),
        _ => None,
    }
}

fn join_parts(join: &Join) -> (&'static str, Option<&JoinConstraint>) {
    match &join.join_operator {
        JoinOperator::Join(c) => ("JOIN", Some(c)),
        JoinOperator::Inner(c) => ("INNER JOIN", Some(c)),
        JoinOperator::Left(c) => ("LEFT JOIN", Some(c)),
        JoinOperator::LeftOuter(c) => ("LEFT OUTER JOIN", Some(c)),
        JoinOperator::Right(c) => ("RIGHT JOIN", Some(c)),
        JoinOperator::RightOuter(c) => ("RIGHT OUTER JOIN", Some(c)),
        JoinOperator::FullOuter(c) => ("FULL OUTER JOIN", Some(c)),
        JoinOperator::CrossJoin(_) => ("CROSS JOIN", None),
        _ => ("JOIN", None),
    }
}

fn statement_label(stmt: &Statement) -> &'static str {
    match stmt {
        Statement::Insert { .. } => "INSERT",
        Statement::Update { .. } => "UPDATE",
        Statement::Delete { .. } => "DELETE",
        Statement::CreateTable { .. } => "CREATE TABLE",
        Statement::CreateView { .. } => "CREATE VIEW",
        Statement::CreateIndex { .. } => "CREATE INDEX",
        Statement::AlterTable { .. } => "ALTER TABLE",
        Statement::Drop { .. } => "DROP",
        Statement::Truncate { .. } => "TRUNCATE",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(sql: &str) -> ParsedStatement {
        SelectAnalyzer::new().parse(sql).unwrap()
    }

    #[test]
    fn simple_select() {
        let parsed = parse("SELECT id, total FROM orders");
        assert_eq!(parsed.kind, StatementKind::Select);
        assert_eq!(parsed.tables, vec!["orders"]);
        let cols = &parsed.projected["orders"];
        assert!(!cols.wildcard);
        assert_eq!(
            cols.columns.iter().collect::<Vec<_>>(),
            vec!["id", "total"]
        );
    }

    #[test]
    fn wildcard_is_a_sentinel() {
        let parsed = parse("SELECT * FROM orders");
        assert!(parsed.projected["orders"].wildcard);
        assert!(parsed.projected["orders"].columns.is_empty());
    }

    #[test]
    fn aliases_resolve_to_physical_tables() {
        let parsed = parse("SELECT o.id, c.name FROM orders o JOIN customers c ON o.cust_id = c.id");
        assert_eq!(parsed.tables, vec!["orders", "customers"]);
        assert_eq!(parsed.aliases["o"], "orders");
        assert_eq!(parsed.aliases["c"], "customers");
        assert!(parsed.projected["orders"].columns.contains("id"));
        assert!(parsed.projected["customers"].columns.contains("name"));
    }

    #[test]
    fn join_clauses_are_recorded() {
        let parsed = parse("SELECT o.id FROM orders o LEFT JOIN customers c ON o.cust_id = c.id");
        assert_eq!(parsed.joins.len(), 1);
        let join = &parsed.joins[0];
        assert_eq!(join.join_type, "LEFT JOIN");
        assert_eq!(join.table, "customers");
        assert_eq!(join.alias.as_deref(), Some("c"));
        assert_eq!(join.on_condition.as_deref(), Some("o.cust_id = c.id"));
    }

    #[test]
    fn schema_prefix_is_stripped() {
        let parsed = parse("SELECT id FROM shop.orders");
        assert_eq!(parsed.tables, vec!["orders"]);
    }

    #[test]
    fn cast_unwraps_to_base_column() {
        let parsed = parse("SELECT CAST(total AS DECIMAL(10,2)) FROM orders");
        assert!(parsed.projected["orders"].columns.contains("total"));
    }

    #[test]
    fn nested_aggregate_cast_unwraps() {
        let parsed = parse("SELECT AVG(CAST(o.total AS DECIMAL(10,2))) AS avg_total FROM orders o");
        assert!(parsed.projected["orders"].columns.contains("total"));
    }

    #[test]
    fn function_comma_does_not_split_fields() {
        let parsed = parse("SELECT COALESCE(nickname, name), id FROM customers");
        let cols = &parsed.projected["customers"];
        assert!(cols.columns.contains("nickname"));
        assert!(cols.columns.contains("id"));
    }

    #[test]
    fn count_star_references_no_column() {
        let parsed = parse("SELECT COUNT(*) FROM orders");
        assert!(parsed.projected.get("orders").is_none());
        assert!(parsed.unresolved_fields.is_empty());
    }

    #[test]
    fn pure_literal_fields_are_excluded() {
        let parsed = parse("SELECT 1, 'x', id FROM orders");
        let cols = &parsed.projected["orders"];
        assert_eq!(cols.columns.iter().collect::<Vec<_>>(), vec!["id"]);
    }

    #[test]
    fn unqualified_column_attributes_to_first_table() {
        let parsed = parse("SELECT name FROM customers c JOIN orders o ON o.cust_id = c.id");
        assert!(parsed.projected["customers"].columns.contains("name"));
    }

    #[test]
    fn unknown_qualifier_is_unresolved() {
        let parsed = parse("SELECT x.secret FROM orders");
        assert!(parsed.projected.is_empty());
        assert_eq!(parsed.unresolved_fields, vec!["x.secret"]);
    }

    #[test]
    fn where_qualifier_must_resolve_to_a_from_table() {
        let parsed = parse("SELECT id FROM orders WHERE ghost.secret = 1");
        assert_eq!(parsed.unresolved_fields, vec!["ghost.secret"]);
    }

    #[test]
    fn on_condition_qualifiers_must_resolve() {
        let parsed = parse("SELECT o.id FROM orders o JOIN customers c ON o.cust_id = ghost.id");
        assert_eq!(parsed.unresolved_fields, vec!["ghost.id"]);
    }

    #[test]
    fn resolvable_where_qualifiers_are_not_flagged() {
        let parsed = parse("SELECT o.id FROM orders o WHERE o.region = 'east'");
        assert!(parsed.unresolved_fields.is_empty());
    }

    #[test]
    fn subquery_relation_is_unresolved() {
        let parsed = parse("SELECT t.id FROM (SELECT id FROM orders) t");
        assert!(!parsed.unresolved_relations.is_empty());
    }

    #[test]
    fn where_splits_on_top_level_and_only() {
        let parsed =
            parse("SELECT id FROM orders WHERE region = 'east' AND (status = 'open' OR total > 5)");
        assert_eq!(
            parsed.predicates,
            vec!["region = 'east'", "status = 'open' OR total > 5"]
        );
    }

    #[test]
    fn nested_ands_flatten() {
        let parsed = parse("SELECT id FROM orders WHERE (a = 1 AND b = 2) AND c = 3");
        assert_eq!(parsed.predicates.len(), 3);
    }

    #[test]
    fn non_select_is_classified() {
        let parsed = parse("DELETE FROM orders WHERE id = 1");
        assert_eq!(parsed.kind, StatementKind::Other("DELETE".to_string()));
    }

    #[test]
    fn cte_is_not_a_supported_select() {
        let parsed = parse("WITH t AS (SELECT id FROM orders) SELECT * FROM t");
        assert!(matches!(parsed.kind, StatementKind::Other(_)));
    }

    #[test]
    fn union_is_not_a_supported_select() {
        let parsed = parse("SELECT id FROM orders UNION SELECT id FROM customers");
        assert!(matches!(parsed.kind, StatementKind::Other(_)));
    }

    #[test]
    fn garbage_is_a_parse_failure() {
        assert!(SelectAnalyzer::new().parse("not sql at all ;;;").is_err());
    }

    #[test]
    fn qualified_wildcard() {
        let parsed = parse("SELECT o.* FROM orders o");
        assert!(parsed.projected["orders"].wildcard);
    }
}
