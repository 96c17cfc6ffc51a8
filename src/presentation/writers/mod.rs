use crate::application::assert::canonicalize;
use crate::domain::{
    diff_result::DiffResult,
    ports::{OutputWriter, RenderOptions},
    value::{render_value, RowMap},
};
use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::Path;

use self::{
    html::HtmlWriter, json::JsonWriter, markdown::MarkdownWriter, text::TextWriter,
    yaml::YamlWriter,
};

pub mod html;
pub mod json;
pub mod markdown;
pub mod text;
pub mod yaml;

/// Every available writer, in `--format` help order.
pub fn all_writers() -> Vec<Box<dyn OutputWriter>> {
    vec![
        Box::new(TextWriter),
        Box::new(MarkdownWriter),
        Box::new(YamlWriter),
        Box::new(JsonWriter),
        Box::new(HtmlWriter),
    ]
}

pub fn writer_for(format: &str) -> Option<Box<dyn OutputWriter>> {
    all_writers().into_iter().find(|w| w.name() == format)
}

/// Render `result` and write it to `out`, or to stdout when `out` is `None`.
pub fn write_output(
    writer: &dyn OutputWriter,
    result: &DiffResult,
    opts: &RenderOptions,
    out: Option<&Path>,
) -> Result<()> {
    let content = writer.format(result, opts)?;
    match out {
        Some(path) => {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
            fs::write(path, &content)
                .with_context(|| format!("Failed to write {}", path.display()))
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(content.as_bytes())?;
            stdout.flush()?;
            Ok(())
        }
    }
}

// ─── Shared helpers ──────────────────────────────────────────────────────────

/// First `limit` items (all of them when `limit` is 0) and how many were cut.
pub(crate) fn limited<T>(items: &[T], limit: usize) -> (&[T], usize) {
    if limit == 0 || items.len() <= limit {
        (items, 0)
    } else {
        (&items[..limit], items.len() - limit)
    }
}

/// `col: value, col: value` in column order.
pub(crate) fn format_row(row: &RowMap) -> String {
    row.iter()
        .map(|(k, v)| format!("{}: {}", k, render_value(v)))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Canonical assertion shape with every bucket cut to `limit` rows.
pub(crate) fn limited_canonical(result: &DiffResult, limit: usize) -> Value {
    let mut doc = canonicalize(result);
    if limit == 0 {
        return doc;
    }
    if let Value::Object(tables) = &mut doc {
        for entry in tables.values_mut() {
            if let Value::Object(buckets) = entry {
                for rows in buckets.values_mut() {
                    if let Value::Array(rows) = rows {
                        rows.truncate(limit);
                    }
                }
            }
        }
    }
    doc
}
