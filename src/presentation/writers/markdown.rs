use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt::Write as FmtWrite;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::domain::{
    diff_result::DiffResult,
    ports::{OutputWriter, RenderOptions},
    table_diff::UpdatedRow,
    value::{render_value, RowMap},
};
use crate::presentation::writers::{format_row, limited};

/// GitHub-flavoured Markdown report, one section per table.
pub struct MarkdownWriter;

impl OutputWriter for MarkdownWriter {
    fn format(&self, result: &DiffResult, opts: &RenderOptions) -> Result<String> {
        let mut out = String::new();
        writeln!(out, "# Diff `{}` → `{}`\n", result.from, result.to)?;

        for (name, table) in &result.tables {
            writeln!(out, "## Table: {}\n", name)?;

            if table.is_empty() {
                writeln!(out, "_No changes._\n")?;
                continue;
            }

            if !table.inserted.is_empty() {
                writeln!(out, "### Inserted ({} rows)\n", table.inserted.len())?;
                let (rows, more) = limited(&table.inserted, opts.limit);
                writeln!(out, "{}", rows_table(rows))?;
                write_more(&mut out, more)?;
            }

            if !table.updated.is_empty() {
                writeln!(out, "### Updated ({} rows)\n", table.updated.len())?;
                let (rows, more) = limited(&table.updated, opts.limit);
                writeln!(out, "{}", updates_table(rows))?;
                write_more(&mut out, more)?;
            }

            if !table.deleted.is_empty() {
                writeln!(out, "### Deleted ({} rows)\n", table.deleted.len())?;
                let (rows, more) = limited(&table.deleted, opts.limit);
                writeln!(out, "{}", rows_table(rows))?;
                write_more(&mut out, more)?;
            }
        }

        Ok(out)
    }

    fn name(&self) -> &'static str {
        "markdown"
    }
}

fn write_more(out: &mut String, more: usize) -> std::fmt::Result {
    if more > 0 {
        writeln!(out, "_... and {} more rows_\n", more)?;
    } else {
        writeln!(out)?;
    }
    Ok(())
}

/// A Markdown table cell must stay on one line.
fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace(['\n', '\r'], "<br>")
}

fn cell(value: Option<&Value>) -> String {
    value.map(|v| escape_cell(&render_value(v))).unwrap_or_default()
}

/// Full rows; the header is the union of their columns.
fn rows_table(rows: &[RowMap]) -> String {
    let columns: BTreeSet<&String> = rows.iter().flat_map(|r| r.keys()).collect();

    let mut builder = Builder::default();
    builder.push_record(columns.iter().map(|c| escape_cell(c)));
    for row in rows {
        builder.push_record(columns.iter().map(|c| cell(row.get(*c))));
    }
    builder.build().with(Style::markdown()).to_string()
}

/// One line per changed column; the key is only printed on a row's first line.
fn updates_table(rows: &[UpdatedRow]) -> String {
    let mut builder = Builder::default();
    builder.push_record(["Key", "Column", "Before", "After"].map(String::from));
    for row in rows {
        let key = match row.primary_key.values().next() {
            Some(v) if row.primary_key.len() == 1 => cell(Some(v)),
            _ => escape_cell(&format_row(&row.primary_key)),
        };
        for (i, change) in row.changed_columns().into_iter().enumerate() {
            builder.push_record([
                if i == 0 { key.clone() } else { String::new() },
                change.column,
                cell(change.before.as_ref()),
                cell(change.after.as_ref()),
            ]);
        }
    }
    builder.build().with(Style::markdown()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::writers::fixtures::sample_result;

    #[test]
    fn renders_sections_and_tables() {
        let out = MarkdownWriter
            .format(&sample_result(), &RenderOptions::default())
            .unwrap();
        assert!(out.starts_with("# Diff `before` → `after`"), "{out}");
        assert!(out.contains("## Table: users"), "{out}");
        assert!(out.contains("### Inserted (1 rows)"), "{out}");
        assert!(out.contains("### Updated (1 rows)"), "{out}");
        assert!(out.contains("### Deleted (1 rows)"), "{out}");
        assert!(out.contains("## Table: audit\n\n_No changes._"), "{out}");
    }

    #[test]
    fn update_rows_list_changed_columns_only() {
        let out = MarkdownWriter
            .format(&sample_result(), &RenderOptions::default())
            .unwrap();
        let updated = out.split("### Updated").nth(1).unwrap();
        let section = updated.split("###").next().unwrap();
        assert!(section.contains("| 1 "), "{section}");
        assert!(section.contains("| name "), "{section}");
        assert!(section.contains("| a2 "), "{section}");
        assert!(!section.contains("| id "), "{section}");
    }

    #[test]
    fn limit_adds_footer() {
        let out = MarkdownWriter
            .format(&sample_result(), &RenderOptions { limit: 2 })
            .unwrap();
        assert!(out.contains("_... and 1 more rows_"), "{out}");
    }

    #[test]
    fn pipes_in_values_are_escaped() {
        let rows: Vec<RowMap> = vec![[("note".to_string(), serde_json::json!("a|b"))].into()];
        assert!(rows_table(&rows).contains(r"a\|b"));
    }

    #[test]
    fn line_breaks_in_values_stay_in_one_row() {
        let rows: Vec<RowMap> = vec![[
            ("id".to_string(), serde_json::json!(1)),
            ("note".to_string(), serde_json::json!("first\nsecond\r\nthird")),
        ]
        .into()];
        let table = rows_table(&rows);
        assert!(table.contains("first<br>second<br>third"), "{table}");
        // header, separator, one data row
        assert_eq!(table.lines().count(), 3, "{table}");
    }
}
