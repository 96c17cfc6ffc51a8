use anyhow::Result;
use serde_json::Value;
use std::fmt::Write as FmtWrite;

use crate::domain::{
    diff_result::DiffResult,
    ports::{OutputWriter, RenderOptions},
    table_diff::UpdatedRow,
    value::render_value,
};
use crate::presentation::writers::{format_row, limited};

/// Plain-text listing: one `+` / `~` / `-` line per row.
pub struct TextWriter;

impl OutputWriter for TextWriter {
    fn format(&self, result: &DiffResult, opts: &RenderOptions) -> Result<String> {
        let mut out = String::new();

        if result.tables.is_empty() {
            writeln!(out, "No tables compared.")?;
            return Ok(out);
        }

        for (name, table) in &result.tables {
            writeln!(out, "Table: {}", name)?;

            if table.is_empty() {
                writeln!(out, "  no changes")?;
            }

            if !table.inserted.is_empty() {
                writeln!(out, "  Inserted: {}", table.inserted.len())?;
                let (rows, more) = limited(&table.inserted, opts.limit);
                for row in rows {
                    writeln!(out, "      + {}", format_row(row))?;
                }
                write_more(&mut out, more)?;
            }

            if !table.updated.is_empty() {
                writeln!(out, "  Updated: {}", table.updated.len())?;
                let (rows, more) = limited(&table.updated, opts.limit);
                for row in rows {
                    writeln!(
                        out,
                        "      ~ {}, {}",
                        format_row(&row.primary_key),
                        format_changes(row)
                    )?;
                }
                write_more(&mut out, more)?;
            }

            if !table.deleted.is_empty() {
                writeln!(out, "  Deleted: {}", table.deleted.len())?;
                let (rows, more) = limited(&table.deleted, opts.limit);
                for row in rows {
                    writeln!(out, "      - {}", format_row(row))?;
                }
                write_more(&mut out, more)?;
            }

            writeln!(out)?;
        }

        Ok(out)
    }

    fn name(&self) -> &'static str {
        "cli"
    }
}

fn write_more(out: &mut String, more: usize) -> std::fmt::Result {
    if more > 0 {
        writeln!(out, "      ... and {} more", more)?;
    }
    Ok(())
}

/// `col: before → after` for each changed column; a missing side shows as `null`.
fn format_changes(row: &UpdatedRow) -> String {
    let side = |v: Option<Value>| render_value(&v.unwrap_or(Value::Null));
    row.changed_columns()
        .into_iter()
        .map(|c| format!("{}: {} → {}", c.column, side(c.before), side(c.after)))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::writers::fixtures::sample_result;

    #[test]
    fn lists_every_bucket_with_markers() {
        let out = TextWriter
            .format(&sample_result(), &RenderOptions::default())
            .unwrap();
        assert!(out.contains("Table: users\n"), "{out}");
        assert!(out.contains("  Inserted: 1\n      + id: 3, name: c\n"), "{out}");
        assert!(out.contains("      ~ id: 1, name: a → a2\n"), "{out}");
        assert!(out.contains("      - id: 2, name: b\n"), "{out}");
        assert!(out.contains("Table: audit\n  no changes\n"), "{out}");
    }

    #[test]
    fn limit_cuts_rows_and_reports_the_rest() {
        let out = TextWriter
            .format(&sample_result(), &RenderOptions { limit: 1 })
            .unwrap();
        assert!(out.contains("  Inserted: 3\n      + id: 1, total: 9.5\n      ... and 2 more\n"), "{out}");
        assert!(!out.contains("id: 2, total"), "{out}");
    }

    #[test]
    fn columns_missing_on_one_side_show_null() {
        let row = UpdatedRow {
            primary_key: [("id".to_string(), serde_json::json!(1))].into(),
            before: [("note".to_string(), serde_json::json!("x"))].into(),
            after: [("tag".to_string(), serde_json::json!(true))].into(),
        };
        assert_eq!(format_changes(&row), "note: x → null, tag: null → true");
    }

    #[test]
    fn empty_result_says_so() {
        let out = TextWriter
            .format(&DiffResult::default(), &RenderOptions::default())
            .unwrap();
        assert_eq!(out, "No tables compared.\n");
    }
}
