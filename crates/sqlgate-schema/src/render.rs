//! Prompt-text rendering of a schema view.
//!
//! Produces the table-by-table description handed to the NL-to-SQL
//! generation layer, so the generator only ever sees tables and columns the
//! role is allowed to touch.

use crate::view::SchemaView;
use std::fmt::Write;

/// Render a view as generation-prompt text.
pub fn render_prompt(view: &SchemaView) -> String {
    let mut out = String::new();

    for table in view.tables.values() {
        let _ = writeln!(out, "Table '{}':", table.name);
        let _ = writeln!(out, "Columns:");
        for column in &table.columns {
            let _ = write!(out, "  - {}: {}", column.name, column.data_type);
            if column.primary_key {
                let _ = write!(out, " (Primary Key)");
            }
            if let Some(comment) = column.comment.as_deref().filter(|c| !c.is_empty()) {
                let _ = write!(out, " -- {}", comment);
            }
            let _ = writeln!(out);
        }

        if !table.foreign_keys.is_empty() {
            let _ = writeln!(out, "Foreign Keys:");
            for fk in &table.foreign_keys {
                let _ = writeln!(
                    out,
                    "  - {} -> {}.{}",
                    fk.columns.join(", "),
                    fk.referred_table,
                    fk.referred_columns.join(", ")
                );
            }
        }

        if let Some(filter) = &table.row_filter {
            let _ = writeln!(out, "Row filter: {}", filter);
        }

        let _ = writeln!(out);
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{ColumnView, TableView};
    use sqlgate_core::ForeignKey;

    #[test]
    fn renders_tables_columns_and_annotations() {
        let mut view = SchemaView::default();
        view.tables.insert(
            "orders".to_string(),
            TableView {
                name: "orders".to_string(),
                columns: vec![
                    ColumnView {
                        name: "id".to_string(),
                        data_type: "int".to_string(),
                        nullable: false,
                        comment: None,
                        primary_key: true,
                    },
                    ColumnView {
                        name: "total".to_string(),
                        data_type: "decimal(10,2)".to_string(),
                        nullable: true,
                        comment: Some("order total".to_string()),
                        primary_key: false,
                    },
                ],
                foreign_keys: vec![ForeignKey {
                    columns: vec!["cust_id".to_string()],
                    referred_table: "customers".to_string(),
                    referred_columns: vec!["id".to_string()],
                }],
                row_filter: Some("region = 'east'".to_string()),
            },
        );

        let text = render_prompt(&view);
        assert_eq!(
            text,
            "Table 'orders':\n\
             Columns:\n\
             \x20 - id: int (Primary Key)\n\
             \x20 - total: decimal(10,2) -- order total\n\
             Foreign Keys:\n\
             \x20 - cust_id -> customers.id\n\
             Row filter: region = 'east'"
        );
    }

    #[test]
    fn empty_view_renders_empty() {
        assert_eq!(render_prompt(&SchemaView::default()), "");
    }
}
