use crate::application::monitoring::PerfReport;
use crate::domain::assertion::AssertionOutcome;
use crate::domain::diff_result::DiffResult;
use crate::domain::snapshot::SnapshotInfo;
use colored::*;
use tabled::settings::{object::Columns, Alignment, Modify, Style};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct TableRow {
    table: String,
    inserted: String,
    updated: String,
    deleted: String,
}

/// Per-table change counts of a diff, printed to stderr so stdout stays
/// reserved for writer output.
pub fn print_summary(result: &DiffResult) {
    eprintln!();
    eprintln!("{}", "SNAPDIFF SUMMARY".bold().cyan());
    eprintln!("{} → {}", result.from.blue(), result.to.green());
    eprintln!();

    let summary = result.summary();
    if summary.total_changes == 0 {
        eprintln!("{}", "No changes detected.".italic());
        eprintln!();
        return;
    }

    let rows: Vec<TableRow> = result
        .tables
        .values()
        .filter(|t| !t.is_empty())
        .map(|t| TableRow {
            table: t.table_name.bold().to_string(),
            inserted: t.inserted.len().to_string().green().to_string(),
            updated: t.updated.len().to_string().yellow().to_string(),
            deleted: t.deleted.len().to_string().red().to_string(),
        })
        .collect();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..=3)).with(Alignment::right()))
        .to_string();
    eprintln!("{table}");
    eprintln!(
        "  {} inserted · {} updated · {} deleted in {} table(s)",
        summary.total_inserted.to_string().green(),
        summary.total_updated.to_string().yellow(),
        summary.total_deleted.to_string().red(),
        summary.tables_affected.to_string().bold(),
    );
    eprintln!();
}

// ─── Snapshot listing ─────────────────────────────────────────────────────────

#[derive(Tabled)]
struct SnapshotRow {
    label: String,
    tables: String,
    rows: String,
    #[tabled(rename = "created at")]
    created_at: String,
}

pub fn print_snapshot_list(snapshots: &[SnapshotInfo]) {
    if snapshots.is_empty() {
        println!("{}", "No snapshots found.".italic());
        return;
    }

    let rows: Vec<SnapshotRow> = snapshots
        .iter()
        .map(|s| SnapshotRow {
            label: s.label.bold().to_string(),
            tables: s.tables.len().to_string(),
            rows: s
                .manifest
                .as_ref()
                .map(|m| m.tables.values().map(|t| t.rows).sum::<usize>().to_string())
                .unwrap_or_else(|| "?".dimmed().to_string()),
            created_at: s
                .manifest
                .as_ref()
                .map(|m| m.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "?".dimmed().to_string()),
        })
        .collect();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..=2)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

// ─── Assertion ────────────────────────────────────────────────────────────────

/// Print the outcome of `assert`. Returns `true` on a match.
pub fn print_assertion(outcome: &AssertionOutcome) -> bool {
    match outcome.diagnostics() {
        None => {
            println!("{}", "✓ Diff matches the expected changes.".bold().green());
            true
        }
        Some((expected, actual)) => {
            eprintln!("{}", "✗ Diff does not match the expected changes.".bold().red());
            eprintln!();
            eprintln!("{}", "Expected:".bold());
            eprintln!("{}", expected.dimmed());
            eprintln!();
            eprintln!("{}", "Actual:".bold());
            eprintln!("{}", actual.yellow());
            false
        }
    }
}

// ─── Performance summary ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct PerfRow {
    operation: String,
    table: String,
    rows: String,
    #[tabled(rename = "time (ms)")]
    duration_ms: String,
}

/// Print a performance timing table to stderr.
pub fn print_perf_summary(report: &PerfReport) {
    if report.timings.is_empty() {
        return;
    }

    eprintln!("{}", "PERFORMANCE".bold().cyan());

    let rows: Vec<PerfRow> = report
        .timings
        .iter()
        .map(|t| PerfRow {
            operation: t.operation.dimmed().to_string(),
            table: t.table.bold().to_string(),
            rows: t.rows.to_string(),
            duration_ms: format_duration(t.duration_ms),
        })
        .collect();

    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..=3)).with(Alignment::right()))
        .to_string();
    eprintln!("{table}");

    eprintln!(
        "  Total: {} row(s) fetched  ·  {} ms",
        report.total_rows_fetched.to_string().bold(),
        format_duration(report.total_ms),
    );
    eprintln!();
}

fn format_duration(ms: u128) -> String {
    if ms >= 1_000 {
        format!("{:.1}s", ms as f64 / 1_000.0).yellow().to_string()
    } else if ms >= 100 {
        ms.to_string().yellow().to_string()
    } else {
        ms.to_string().green().to_string()
    }
}
