use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

// ─── Log level ────────────────────────────────────────────────────────────────

/// Controls the verbosity of snapdiff's internal tracing output.
///
/// Pass to [`init_tracing`] before calling any async entry point.
///
/// | Variant | `tracing` level | When to use                          |
/// |---------|-----------------|--------------------------------------|
/// | `Error` | `error`         | `--quiet` / CI scripting             |
/// | `Info`  | `info`          | Default, shows per-table timings     |
/// | `Debug` | `debug`         | `--verbose`, shows SQL and skips too |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    fn filter(self) -> &'static str {
        match self {
            LogLevel::Error => "snapdiff=error",
            LogLevel::Info => "snapdiff=info",
            LogLevel::Debug => "snapdiff=debug",
        }
    }
}

/// Initialise the global `tracing` subscriber. `RUST_LOG` wins over `level`.
///
/// Call this once at startup. Library consumers who manage their own
/// subscriber should skip it.
#[cfg(feature = "cli")]
pub fn init_tracing(level: LogLevel) {
    use tracing_subscriber::fmt::format::FmtSpan;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.filter().into()),
        )
        .init();
}

// ─── Public API Facade ───

pub use application::assert::{assert_matches, canonicalize, parse_expected, ExpectedFormat};
pub use application::diff::{DiffOptions, DiffService, TableDiffer};
pub use application::monitoring::PerfReport;
pub use domain::assertion::AssertionOutcome;
pub use domain::diff_result::{DiffResult, Summary};
pub use domain::equality::{rows_equal, values_equal};
pub use domain::fingerprint::fingerprint;
pub use domain::identity::{IdColumnResolver, IdentityKey, IdentityResolver, KeyColumnsResolver};
pub use domain::ports::{SnapshotProvider, SnapshotStore};
pub use domain::snapshot::MapSnapshotProvider;
pub use domain::table_diff::{ColumnChange, TableDiff, UpdatedRow};
pub use domain::value::RowMap;
pub use domain::value_objects::{Fingerprint, IgnoredColumns, Schema, SnapshotLabel, TableName};
pub use infrastructure::config::{AppConfig, DbConfig, DiffConfig, OutputConfig, StoreConfig};
pub use infrastructure::storage::{FsSnapshotStore, SnapshotFormat};

use crate::application::monitoring::{MonitoringDiffer, MonitoringRowSource};
use crate::application::snapshot::SnapshotService;
use crate::domain::ports::RowSource;
use crate::infrastructure::db::client::connect;

// ─── Public entry points ───

/// Read the current contents of `tables` (every table of the configured
/// schema when empty) from the configured database. Ignored columns are not
/// selected.
pub async fn capture(
    cfg: &AppConfig,
    tables: &[String],
    ignored: &IgnoredColumns,
) -> Result<BTreeMap<String, Vec<RowMap>>> {
    let (rows, _) = capture_with_timing(cfg, tables, ignored).await?;
    Ok(rows)
}

/// [`capture`] plus a [`PerfReport`] with per-table fetch timings.
pub async fn capture_with_timing(
    cfg: &AppConfig,
    tables: &[String],
    ignored: &IgnoredColumns,
) -> Result<(BTreeMap<String, Vec<RowMap>>, PerfReport)> {
    let report = PerfReport::new();
    let source: Arc<dyn RowSource> = Arc::new(MonitoringRowSource::new(
        Arc::new(connect(&cfg.database).await?),
        Arc::clone(&report),
    ));

    let schema = Schema(cfg.database.schema.clone());
    let rows = SnapshotService::new(source)
        .capture(&schema, tables, ignored)
        .await?;

    Ok((rows, PerfReport::snapshot(&report)))
}

/// Capture and persist under `label`. Returns the number of tables saved.
pub async fn take_snapshot(
    cfg: &AppConfig,
    store: &dyn SnapshotStore,
    label: &SnapshotLabel,
    tables: &[String],
    ignored: &IgnoredColumns,
) -> Result<(usize, PerfReport)> {
    let (rows, perf) = capture_with_timing(cfg, tables, ignored).await?;
    store
        .save(label, &rows)
        .with_context(|| format!("Failed to save snapshot {}", label))?;
    Ok((rows.len(), perf))
}

/// Diff two in-memory snapshots.
pub fn diff_snapshots(
    from_label: &str,
    to_label: &str,
    from: &dyn SnapshotProvider,
    to: &dyn SnapshotProvider,
    opts: &DiffOptions,
) -> DiffResult {
    DiffService::new(Arc::new(TableDiffer::new())).run(from_label, to_label, from, to, opts)
}

/// Load two stored snapshots and diff them.
pub fn diff(
    store: &dyn SnapshotStore,
    from: &SnapshotLabel,
    to: &SnapshotLabel,
    opts: &DiffOptions,
) -> Result<DiffResult> {
    let (result, _) = diff_with_timing(store, from, to, opts)?;
    Ok(result)
}

/// [`diff`] plus a [`PerfReport`] with per-table diff timings.
pub fn diff_with_timing(
    store: &dyn SnapshotStore,
    from: &SnapshotLabel,
    to: &SnapshotLabel,
    opts: &DiffOptions,
) -> Result<(DiffResult, PerfReport)> {
    let from_snap = store.load(from)?;
    let to_snap = store.load(to)?;

    let report = PerfReport::new();
    let differ = Arc::new(MonitoringDiffer::new(
        Arc::new(TableDiffer::new()),
        Arc::clone(&report),
    ));
    let result = DiffService::new(differ).run(
        from.as_str(),
        to.as_str(),
        &from_snap,
        &to_snap,
        opts,
    );

    Ok((result, PerfReport::snapshot(&report)))
}

/// Diff two stored snapshots and compare the result with the expected
/// changes in `expected_path` (JSON, or YAML for `.yaml`/`.yml`).
pub fn assert_expected(
    store: &dyn SnapshotStore,
    from: &SnapshotLabel,
    to: &SnapshotLabel,
    opts: &DiffOptions,
    expected_path: &Path,
) -> Result<AssertionOutcome> {
    let text = std::fs::read_to_string(expected_path)
        .with_context(|| format!("Failed to read {}", expected_path.display()))?;
    let expected = parse_expected(
        &text,
        ExpectedFormat::from_path(&expected_path.to_string_lossy()),
    )
    .with_context(|| format!("Invalid expected changes in {}", expected_path.display()))?;

    let result = diff(store, from, to, opts)?;
    Ok(assert_matches(&expected, &result))
}

/// Wrap a captured or deserialised snapshot map as a [`SnapshotProvider`].
pub fn snapshot_provider(data: BTreeMap<String, Vec<RowMap>>) -> MapSnapshotProvider {
    MapSnapshotProvider::new(data)
}
