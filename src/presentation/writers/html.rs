use anyhow::Result;
use sailfish::TemplateOnce;
use std::collections::BTreeSet;

use crate::domain::{
    diff_result::{DiffResult, Summary},
    ports::{OutputWriter, RenderOptions},
    table_diff::{TableDiff, UpdatedRow},
    value::{render_value, RowMap},
};
use crate::presentation::writers::{format_row, limited};

// ─── View types ───────────────────────────────────────────────────────────────
//
// Everything is pre-rendered to strings so the template stays logic-free.

struct RowsView {
    total: usize,
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    more: usize,
}

struct ChangeView {
    column: String,
    before: String,
    after: String,
}

struct UpdateView {
    key: String,
    changes: Vec<ChangeView>,
}

struct TableView {
    name: String,
    inserted: RowsView,
    updated_total: usize,
    updated: Vec<UpdateView>,
    updated_more: usize,
    deleted: RowsView,
}

#[derive(TemplateOnce)]
#[template(path = "html/diff.stpl")] // base dir declared inside sailfish.toml
struct DiffTemplate<'a> {
    from: &'a str,
    to: &'a str,
    summary: Summary,
    tables: Vec<TableView>,
}

fn rows_view(all: &[RowMap], limit: usize) -> RowsView {
    let (rows, more) = limited(all, limit);
    let columns: Vec<String> = rows
        .iter()
        .flat_map(|r| r.keys())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .cloned()
        .collect();
    let rows = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(c).map(render_value).unwrap_or_default())
                .collect()
        })
        .collect();
    RowsView {
        total: all.len(),
        columns,
        rows,
        more,
    }
}

fn update_view(row: &UpdatedRow) -> UpdateView {
    let render = |v: Option<serde_json::Value>| v.as_ref().map(render_value).unwrap_or_default();
    UpdateView {
        key: format_row(&row.primary_key),
        changes: row
            .changed_columns()
            .into_iter()
            .map(|c| ChangeView {
                column: c.column,
                before: render(c.before),
                after: render(c.after),
            })
            .collect(),
    }
}

fn table_view(table: &TableDiff, limit: usize) -> TableView {
    let (updated, updated_more) = limited(&table.updated, limit);
    TableView {
        name: table.table_name.clone(),
        inserted: rows_view(&table.inserted, limit),
        updated_total: table.updated.len(),
        updated: updated.iter().map(update_view).collect(),
        updated_more,
        deleted: rows_view(&table.deleted, limit),
    }
}

/// Standalone HTML page rendered with sailfish.
pub struct HtmlWriter;

impl OutputWriter for HtmlWriter {
    fn format(&self, result: &DiffResult, opts: &RenderOptions) -> Result<String> {
        let template = DiffTemplate {
            from: &result.from,
            to: &result.to,
            summary: result.summary(),
            tables: result
                .tables
                .values()
                .map(|t| table_view(t, opts.limit))
                .collect(),
        };
        Ok(template.render_once()?)
    }

    fn name(&self) -> &'static str {
        "html"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presentation::writers::fixtures::sample_result;

    #[test]
    fn page_lists_tables_and_changes() {
        let out = HtmlWriter
            .format(&sample_result(), &RenderOptions::default())
            .unwrap();
        assert!(out.contains("<title>snapdiff: before → after</title>"), "{out}");
        assert!(out.contains("users"), "{out}");
        assert!(out.contains("a2"), "{out}");
        assert!(out.contains("No changes"), "{out}");
    }

    #[test]
    fn summary_row_carries_totals() {
        let out = HtmlWriter
            .format(&sample_result(), &RenderOptions::default())
            .unwrap();
        assert!(out.contains(r#"<td class="ins">4</td>"#), "{out}");
        assert!(out.contains(r#"<td class="upd">1</td>"#), "{out}");
        assert!(out.contains(r#"<td class="del">1</td>"#), "{out}");
        assert!(out.contains("<td>6</td>"), "{out}");
        assert!(out.contains("<td>2</td>"), "{out}");
        assert!(out.contains("<code>before</code> → <code>after</code>"), "{out}");
    }

    #[test]
    fn values_are_html_escaped() {
        let mut result = sample_result();
        if let Some(users) = result.tables.get_mut("users") {
            users.inserted[0].insert("name".into(), serde_json::json!("<script>"));
        }
        let out = HtmlWriter.format(&result, &RenderOptions::default()).unwrap();
        assert!(!out.contains("<script>"), "{out}");
        assert!(out.contains("&lt;script&gt;"), "{out}");
    }

    #[test]
    fn rows_view_reports_truncation() {
        let rows: Vec<RowMap> = (0..5)
            .map(|i| [("id".to_string(), serde_json::json!(i))].into())
            .collect();
        let view = rows_view(&rows, 2);
        assert_eq!(view.total, 5);
        assert_eq!(view.rows.len(), 2);
        assert_eq!(view.more, 3);
        assert_eq!(view.columns, vec!["id".to_string()]);
    }
}
