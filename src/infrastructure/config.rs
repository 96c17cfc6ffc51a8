use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::application::diff::DiffOptions;
use crate::domain::value_objects::IgnoredColumns;
use crate::infrastructure::storage::SnapshotFormat;

/// Name of the config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "snapdiff.toml";

/// Prefix of environment overrides, e.g. `SNAPDIFF__STORE__BASE_DIR=/tmp/snaps`.
pub const ENV_PREFIX: &str = "SNAPDIFF";

/// Settings shared by every command. CLI flags take precedence over these.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub database: DbConfig,
    pub store: StoreConfig,
    pub diff: DiffConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DbConfig {
    /// Connection URL: `postgres://…`, `mysql://…`, `mariadb://…` or `sqlite://…`.
    pub dsn: Option<String>,
    /// Schema to read from; empty = the driver default (`public` on PostgreSQL).
    pub schema: String,
    pub max_connections: u32,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            schema: String::new(),
            max_connections: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub base_dir: PathBuf,
    /// Format new snapshots are written in.
    pub format: SnapshotFormat,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(".snapdiff"),
            format: SnapshotFormat::Json,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DiffConfig {
    pub ignore_columns: Vec<String>,
    pub only_changed: bool,
    pub id_column: String,
    /// Explicit identity columns per table, e.g. `tax_rates = ["region", "category"]`.
    pub key_columns: BTreeMap<String, Vec<String>>,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            ignore_columns: Vec::new(),
            only_changed: false,
            id_column: "id".to_string(),
            key_columns: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    /// Writer used by `diff` when `--format` is not given.
    pub format: String,
    /// Max rows per bucket; 0 = unlimited.
    pub limit: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "cli".to_string(),
            limit: 0,
        }
    }
}

impl DiffConfig {
    /// Build the per-invocation options. CLI values are merged on top:
    /// ignored columns are added, `tables` replaces nothing from config.
    pub fn to_options(
        &self,
        tables: Vec<String>,
        extra_ignored: &[String],
        only_changed: bool,
    ) -> DiffOptions {
        DiffOptions {
            tables,
            ignore_columns: self
                .ignore_columns
                .iter()
                .chain(extra_ignored)
                .cloned()
                .collect::<IgnoredColumns>(),
            only_changed: only_changed || self.only_changed,
            id_column: self.id_column.clone(),
            key_columns: self.key_columns.clone(),
        }
    }
}

impl AppConfig {
    /// Load from `path`, or from the first existing default location, then
    /// apply `SNAPDIFF__SECTION__KEY` environment overrides.
    ///
    /// An explicit `path` that does not exist is an error; missing default
    /// files are not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        match path {
            Some(p) => {
                builder = builder.add_source(
                    config::File::from(p)
                        .format(config::FileFormat::Toml)
                        .required(true),
                );
            }
            None => {
                if let Some(p) = default_config_path() {
                    debug!(path = %p.display(), "using config file");
                    builder = builder.add_source(
                        config::File::from(p.as_path())
                            .format(config::FileFormat::Toml)
                            .required(false),
                    );
                }
            }
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("diff.ignore_columns")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| match path {
                Some(p) => format!("Failed to read config file: {}", p.display()),
                None => "Failed to read configuration".to_string(),
            })?;

        settings
            .try_deserialize::<AppConfig>()
            .with_context(|| "Failed to parse configuration")
    }
}

/// `./snapdiff.toml`, else `<config dir>/snapdiff/config.toml`, if either exists.
fn default_config_path() -> Option<PathBuf> {
    let local = PathBuf::from(LOCAL_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("snapdiff").join("config.toml"))
        .filter(|p| p.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_usable() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.store.base_dir, PathBuf::from(".snapdiff"));
        assert_eq!(cfg.diff.id_column, "id");
        assert_eq!(cfg.output.format, "cli");
        assert!(cfg.database.dsn.is_none());
    }

    #[test]
    fn loads_partial_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[store]
base_dir = "/tmp/snaps"
format = "yaml"

[diff]
ignore_columns = ["updated_at"]
only_changed = true

[diff.key_columns]
tax_rates = ["region", "category"]
"#
        )
        .unwrap();

        let cfg = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.store.base_dir, PathBuf::from("/tmp/snaps"));
        assert_eq!(cfg.store.format, SnapshotFormat::Yaml);
        assert_eq!(cfg.diff.ignore_columns, vec!["updated_at".to_string()]);
        assert!(cfg.diff.only_changed);
        assert_eq!(cfg.diff.id_column, "id");
        assert_eq!(cfg.diff.key_columns["tax_rates"], vec!["region", "category"]);
        assert_eq!(cfg.output.limit, 0);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(AppConfig::load(Some(Path::new("/definitely/not/here.toml"))).is_err());
    }

    #[test]
    fn cli_values_merge_into_options() {
        let cfg = DiffConfig {
            ignore_columns: vec!["updated_at".into()],
            ..DiffConfig::default()
        };
        let opts = cfg.to_options(vec!["users".into()], &["created_at".to_string()], true);
        assert_eq!(opts.tables, vec!["users".to_string()]);
        assert!(opts.ignore_columns.contains("updated_at"));
        assert!(opts.ignore_columns.contains("created_at"));
        assert!(opts.only_changed);
    }
}
