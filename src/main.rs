use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use snapdiff::presentation::cli_summary::{
    print_assertion, print_perf_summary, print_snapshot_list, print_summary,
};
use snapdiff::presentation::writers::{all_writers, write_output, writer_for};
use snapdiff::domain::ports::RenderOptions;
use snapdiff::{
    AppConfig, DiffOptions, FsSnapshotStore, IgnoredColumns, LogLevel, SnapshotLabel,
    SnapshotStore,
};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(
    name = "snapdiff",
    version,
    about = "Snapshot database tables and diff them: inserted, updated and deleted rows."
)]
struct Cli {
    /// Config file (default: ./snapdiff.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// Snapshot store directory [config: store.base_dir, default .snapdiff]
    #[arg(long)]
    base_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SelectArgs {
    /// Restrict to this table (repeatable)
    #[arg(long = "table")]
    tables: Vec<String>,

    /// Columns excluded from comparison, comma separated
    #[arg(long, value_delimiter = ',')]
    ignore_columns: Vec<String>,

    /// Omit tables without changes
    #[arg(long)]
    only_changed: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture tables from a live database under a label
    Snapshot {
        #[arg(long)]
        label: String,
        /// Connection URL [config: database.dsn]
        #[arg(long)]
        dsn: Option<String>,
        #[arg(long)]
        schema: Option<String>,
        #[arg(long = "table")]
        tables: Vec<String>,
        /// Columns never captured, comma separated
        #[arg(long, value_delimiter = ',')]
        ignore_columns: Vec<String>,
        #[arg(long)]
        timings: bool,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Compare two snapshots
    Diff {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[command(flatten)]
        select: SelectArgs,
        /// cli, markdown, yaml, json or html [config: output.format]
        #[arg(short, long)]
        format: Option<String>,
        /// Write to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
        /// Max rows per bucket, 0 = all [config: output.limit]
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        timings: bool,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Fail unless the diff of two snapshots equals an expected-changes file
    Assert {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        /// JSON or YAML (by extension) document keyed by table name
        #[arg(long)]
        expected: PathBuf,
        #[command(flatten)]
        select: SelectArgs,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// List stored snapshots
    List {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Delete a stored snapshot
    Rm {
        label: String,
        #[command(flatten)]
        store: StoreArgs,
    },
}

fn open_store(cfg: &AppConfig, args: &StoreArgs) -> Result<FsSnapshotStore> {
    let base_dir = args
        .base_dir
        .clone()
        .unwrap_or_else(|| cfg.store.base_dir.clone());
    FsSnapshotStore::open(base_dir, cfg.store.format)
}

fn diff_options(cfg: &AppConfig, select: SelectArgs) -> DiffOptions {
    cfg.diff
        .to_options(select.tables, &select.ignore_columns, select.only_changed)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    snapdiff::init_tracing(if cli.quiet {
        LogLevel::Error
    } else if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    });

    let mut cfg = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Snapshot {
            label,
            dsn,
            schema,
            tables,
            ignore_columns,
            timings,
            store,
        } => {
            let label = SnapshotLabel::parse(&label)?;
            if dsn.is_some() {
                cfg.database.dsn = dsn;
            }
            if let Some(schema) = schema {
                cfg.database.schema = schema;
            }
            let store = open_store(&cfg, &store)?;
            let ignored: IgnoredColumns = ignore_columns.into_iter().collect();

            let (count, perf) =
                snapdiff::take_snapshot(&cfg, &store, &label, &tables, &ignored).await?;
            println!("Snapshot '{}' saved: {} table(s)", label, count);
            if timings {
                print_perf_summary(&perf);
            }
        }

        Command::Diff {
            from,
            to,
            select,
            format,
            out,
            limit,
            timings,
            store,
        } => {
            let format = format.unwrap_or_else(|| cfg.output.format.clone());
            let writer = writer_for(&format).ok_or_else(|| {
                let names: Vec<&str> = all_writers().iter().map(|w| w.name()).collect();
                anyhow!("Unknown format: {} (expected one of {})", format, names.join(", "))
            })?;

            let store = open_store(&cfg, &store)?;
            let opts = diff_options(&cfg, select);
            let (result, perf) = snapdiff::diff_with_timing(
                &store,
                &SnapshotLabel::parse(&from)?,
                &SnapshotLabel::parse(&to)?,
                &opts,
            )?;

            let render = RenderOptions {
                limit: limit.unwrap_or(cfg.output.limit),
            };
            write_output(writer.as_ref(), &result, &render, out.as_deref())?;

            if out.is_some() || writer.name() != "cli" {
                print_summary(&result);
            }
            if timings {
                print_perf_summary(&perf);
            }
        }

        Command::Assert {
            from,
            to,
            expected,
            select,
            store,
        } => {
            let store = open_store(&cfg, &store)?;
            let opts = diff_options(&cfg, select);
            let outcome = snapdiff::assert_expected(
                &store,
                &SnapshotLabel::parse(&from)?,
                &SnapshotLabel::parse(&to)?,
                &opts,
                &expected,
            )?;
            if !print_assertion(&outcome) {
                return Ok(ExitCode::from(1));
            }
        }

        Command::List { store } => {
            let store = open_store(&cfg, &store)?;
            print_snapshot_list(&store.list()?);
        }

        Command::Rm { label, store } => {
            let store = open_store(&cfg, &store)?;
            let label = SnapshotLabel::parse(&label)?;
            let removed = store.delete(&label)?;
            println!("Snapshot '{}' removed ({} table(s))", label, removed);
        }
    }

    Ok(ExitCode::SUCCESS)
}
