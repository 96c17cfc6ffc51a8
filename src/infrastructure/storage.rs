use anyhow::{bail, Context, Result};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::domain::fingerprint::fingerprint;
use crate::domain::ports::SnapshotStore;
use crate::domain::snapshot::{MapSnapshotProvider, SnapshotInfo, SnapshotManifest, TableManifest};
use crate::domain::value::{rows_from_value, RowMap};
use crate::domain::value_objects::{validate_path_segment, SnapshotLabel};

const SNAPSHOTS_DIR: &str = "snapshots";
const MANIFEST_FILE: &str = ".manifest.json";
/// Work directories next to the labelled ones; labels never start with a dot.
const STAGING_PREFIX: &str = ".staging-";
const RETIRED_PREFIX: &str = ".retired-";

/// On-disk encoding of a table file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    #[default]
    Json,
    Yaml,
}

impl SnapshotFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SnapshotFormat::Json => "json",
            SnapshotFormat::Yaml => "yaml",
        }
    }

    fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "json" => Some(SnapshotFormat::Json),
            "yaml" | "yml" => Some(SnapshotFormat::Yaml),
            _ => None,
        }
    }

    fn encode(&self, rows: &[RowMap]) -> Result<String> {
        Ok(match self {
            SnapshotFormat::Json => serde_json::to_string_pretty(rows)?,
            SnapshotFormat::Yaml => serde_yaml::to_string(rows)?,
        })
    }

    fn decode(&self, text: &str) -> Result<Value> {
        Ok(match self {
            SnapshotFormat::Json => serde_json::from_str(text)?,
            SnapshotFormat::Yaml => serde_yaml::from_str(text)?,
        })
    }
}

/// Directory-backed snapshot store:
/// `<base_dir>/snapshots/<label>/<table>.<json|yaml>` plus `.manifest.json`.
pub struct FsSnapshotStore {
    base_dir: PathBuf,
    format: SnapshotFormat,
}

impl FsSnapshotStore {
    /// Open (and create if needed) the store rooted at `base_dir`.
    pub fn open(base_dir: impl Into<PathBuf>, format: SnapshotFormat) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(base_dir.join(SNAPSHOTS_DIR)).with_context(|| {
            format!("Failed to create snapshot directory under {}", base_dir.display())
        })?;
        Ok(Self { base_dir, format })
    }

    fn snapshot_dir(&self, label: &SnapshotLabel) -> PathBuf {
        self.base_dir.join(SNAPSHOTS_DIR).join(label.as_str())
    }

    fn existing_dir(&self, label: &SnapshotLabel) -> Result<PathBuf> {
        let dir = self.snapshot_dir(label);
        if !dir.is_dir() {
            bail!("snapshot does not exist: {}", label);
        }
        Ok(dir)
    }

    /// `(table, path, format)` of every table file in `dir`, sorted by table.
    fn table_files(dir: &Path) -> Result<Vec<(String, PathBuf, SnapshotFormat)>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)
            .with_context(|| format!("Failed to read snapshot directory {}", dir.display()))?
        {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let (Some(stem), Some(ext)) = (
                path.file_stem().and_then(|s| s.to_str()),
                path.extension().and_then(|s| s.to_str()),
            ) else {
                continue;
            };
            if stem.starts_with('.') {
                continue;
            }
            if let Some(format) = SnapshotFormat::from_extension(ext) {
                files.push((stem.to_string(), path.clone(), format));
            }
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    fn read_table(path: &Path, format: SnapshotFormat) -> Result<Vec<RowMap>> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read snapshot file {}", path.display()))?;
        let value = format
            .decode(&text)
            .with_context(|| format!("Failed to parse snapshot file {}", path.display()))?;
        let Some((rows, skipped)) = rows_from_value(value) else {
            bail!("snapshot file {} does not contain an array of rows", path.display());
        };
        if skipped > 0 {
            warn!(file = %path.display(), skipped, "ignored non-object entries in snapshot file");
        }
        Ok(rows)
    }

    fn read_manifest(dir: &Path) -> Option<SnapshotManifest> {
        let text = fs::read_to_string(dir.join(MANIFEST_FILE)).ok()?;
        match serde_json::from_str(&text) {
            Ok(m) => Some(m),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "unreadable snapshot manifest");
                None
            }
        }
    }

    /// Move a fully written `staged` directory to `dir`. A snapshot already at
    /// `dir` is kept until the new one is in place, and put back on failure.
    fn swap_into_place(root: &Path, staged: &Path, dir: &Path) -> Result<()> {
        if !dir.exists() {
            fs::rename(staged, dir)?;
            return Ok(());
        }

        // removed by hand: it must survive a failed restore
        let retired = tempfile::Builder::new()
            .prefix(RETIRED_PREFIX)
            .keep(true)
            .tempdir_in(root)?;
        let previous = retired.path().join("previous");
        fs::rename(dir, &previous)?;

        if let Err(e) = fs::rename(staged, dir) {
            match fs::rename(&previous, dir) {
                Ok(()) => {
                    let _ = fs::remove_dir(retired.path());
                }
                Err(restore) => warn!(
                    kept = %previous.display(),
                    error = %restore,
                    "could not restore previous snapshot"
                ),
            }
            return Err(e.into());
        }

        fs::remove_dir_all(retired.path())
            .with_context(|| format!("Failed to clean up {}", retired.path().display()))?;
        Ok(())
    }
}

impl SnapshotStore for FsSnapshotStore {
    fn save(&self, label: &SnapshotLabel, tables: &BTreeMap<String, Vec<RowMap>>) -> Result<()> {
        for table in tables.keys() {
            validate_path_segment("table name", table)?;
        }

        let root = self.base_dir.join(SNAPSHOTS_DIR);
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&root)
            .with_context(|| format!("Failed to create staging directory in {}", root.display()))?;

        let mut manifest = SnapshotManifest {
            label: label.to_string(),
            created_at: Utc::now(),
            tables: BTreeMap::new(),
        };

        for (table, rows) in tables {
            let path = staging
                .path()
                .join(format!("{}.{}", table, self.format.extension()));
            let content = self
                .format
                .encode(rows)
                .with_context(|| format!("Failed to encode table {}", table))?;
            fs::write(&path, content)
                .with_context(|| format!("Failed to write snapshot file for table {}", table))?;

            debug!(table = %table, rows = rows.len(), "staged table");
            manifest.tables.insert(
                table.clone(),
                TableManifest {
                    rows: rows.len(),
                    fingerprint: fingerprint(rows),
                },
            );
        }

        let manifest_json = serde_json::to_string_pretty(&manifest)?;
        fs::write(staging.path().join(MANIFEST_FILE), manifest_json)
            .with_context(|| format!("Failed to write manifest of snapshot {}", label))?;

        let dir = self.snapshot_dir(label);
        Self::swap_into_place(&root, staging.path(), &dir)
            .with_context(|| format!("Failed to store snapshot {}", label))?;
        debug!(snapshot = %label, path = %dir.display(), "saved snapshot");
        Ok(())
    }

    fn load(&self, label: &SnapshotLabel) -> Result<MapSnapshotProvider> {
        let dir = self.existing_dir(label)?;
        let mut tables = BTreeMap::new();
        for (table, path, format) in Self::table_files(&dir)? {
            let rows = Self::read_table(&path, format)?;
            debug!(snapshot = %label, table = %table, rows = rows.len(), "loaded table");
            tables.insert(table, rows);
        }
        Ok(MapSnapshotProvider::new(tables))
    }

    fn list(&self) -> Result<Vec<SnapshotInfo>> {
        let root = self.base_dir.join(SNAPSHOTS_DIR);
        let mut infos = Vec::new();
        for entry in fs::read_dir(&root)
            .with_context(|| format!("Failed to read {}", root.display()))?
        {
            let path = entry?.path();
            if !path.is_dir() {
                continue;
            }
            let Some(label) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if label.starts_with('.') {
                continue;
            }
            let tables = Self::table_files(&path)?
                .into_iter()
                .map(|(table, _, _)| table)
                .collect();
            infos.push(SnapshotInfo {
                label: label.to_string(),
                tables,
                manifest: Self::read_manifest(&path),
            });
        }
        infos.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(infos)
    }

    fn tables(&self, label: &SnapshotLabel) -> Result<Vec<String>> {
        let dir = self.existing_dir(label)?;
        Ok(Self::table_files(&dir)?
            .into_iter()
            .map(|(table, _, _)| table)
            .collect())
    }

    fn delete(&self, label: &SnapshotLabel) -> Result<usize> {
        let count = self.tables(label)?.len();
        fs::remove_dir_all(self.snapshot_dir(label))
            .with_context(|| format!("Failed to delete snapshot {}", label))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn label(s: &str) -> SnapshotLabel {
        SnapshotLabel::parse(s).unwrap()
    }

    fn sample() -> BTreeMap<String, Vec<RowMap>> {
        let users: Vec<RowMap> = vec![
            [("id".to_string(), json!(1)), ("meta".to_string(), json!({"k": [1, 2]}))].into(),
            [("id".to_string(), json!(2)), ("meta".to_string(), Value::Null)].into(),
        ];
        [("users".to_string(), users), ("empty".to_string(), vec![])].into()
    }

    #[test]
    fn save_then_load_json() {
        let tmp = TempDir::new().unwrap();
        let store = FsSnapshotStore::open(tmp.path(), SnapshotFormat::Json).unwrap();
        store.save(&label("before"), &sample()).unwrap();

        let loaded = store.load(&label("before")).unwrap().into_inner();
        assert_eq!(loaded, sample());
        assert!(tmp.path().join("snapshots/before/users.json").is_file());
    }

    #[test]
    fn save_then_load_yaml() {
        let tmp = TempDir::new().unwrap();
        let store = FsSnapshotStore::open(tmp.path(), SnapshotFormat::Yaml).unwrap();
        store.save(&label("before"), &sample()).unwrap();

        assert!(tmp.path().join("snapshots/before/users.yaml").is_file());
        let loaded = store.load(&label("before")).unwrap().into_inner();
        assert_eq!(loaded["users"], sample()["users"]);
    }

    #[test]
    fn manifest_is_hidden_from_tables_and_listed() {
        let tmp = TempDir::new().unwrap();
        let store = FsSnapshotStore::open(tmp.path(), SnapshotFormat::Json).unwrap();
        store.save(&label("b"), &sample()).unwrap();
        store.save(&label("a"), &BTreeMap::new()).unwrap();

        assert_eq!(store.tables(&label("b")).unwrap(), vec!["empty", "users"]);

        let infos = store.list().unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].label, "a");
        assert!(infos[0].tables.is_empty());

        let manifest = infos[1].manifest.as_ref().unwrap();
        assert_eq!(manifest.tables["users"].rows, 2);
        assert_eq!(
            manifest.tables["users"].fingerprint,
            fingerprint(&sample()["users"])
        );
    }

    #[test]
    fn resave_replaces_previous_tables() {
        let tmp = TempDir::new().unwrap();
        let store = FsSnapshotStore::open(tmp.path(), SnapshotFormat::Json).unwrap();
        store.save(&label("x"), &sample()).unwrap();

        let only_users: BTreeMap<String, Vec<RowMap>> =
            [("users".to_string(), vec![])].into();
        store.save(&label("x"), &only_users).unwrap();
        assert_eq!(store.tables(&label("x")).unwrap(), vec!["users"]);
    }

    #[test]
    fn delete_reports_table_count() {
        let tmp = TempDir::new().unwrap();
        let store = FsSnapshotStore::open(tmp.path(), SnapshotFormat::Json).unwrap();
        store.save(&label("gone"), &sample()).unwrap();

        assert_eq!(store.delete(&label("gone")).unwrap(), 2);
        assert!(store.load(&label("gone")).is_err());
        assert!(store.delete(&label("gone")).is_err());
    }

    #[test]
    fn missing_snapshot_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = FsSnapshotStore::open(tmp.path(), SnapshotFormat::Json).unwrap();
        assert!(store.load(&label("nope")).is_err());
    }

    #[test]
    fn non_array_table_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = FsSnapshotStore::open(tmp.path(), SnapshotFormat::Json).unwrap();
        let dir = tmp.path().join("snapshots/bad");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("users.json"), r#"{"id": 1}"#).unwrap();
        assert!(store.load(&label("bad")).is_err());
    }

    #[test]
    fn non_object_rows_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let store = FsSnapshotStore::open(tmp.path(), SnapshotFormat::Json).unwrap();
        let dir = tmp.path().join("snapshots/mixed");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("users.json"), r#"[{"id": 1}, "junk", {"id": 2}]"#).unwrap();

        let loaded = store.load(&label("mixed")).unwrap().into_inner();
        assert_eq!(loaded["users"].len(), 2);
    }

    #[test]
    fn unsafe_table_name_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = FsSnapshotStore::open(tmp.path(), SnapshotFormat::Json).unwrap();
        let tables: BTreeMap<String, Vec<RowMap>> = [("../escape".to_string(), vec![])].into();
        assert!(store.save(&label("x"), &tables).is_err());
    }

    #[test]
    fn failed_resave_keeps_previous_snapshot() {
        let tmp = TempDir::new().unwrap();
        let store = FsSnapshotStore::open(tmp.path(), SnapshotFormat::Json).unwrap();
        store.save(&label("prod"), &sample()).unwrap();

        // valid as a path segment, but longer than any filesystem allows
        let too_long: BTreeMap<String, Vec<RowMap>> = [("t".repeat(300), vec![])].into();
        assert!(store.save(&label("prod"), &too_long).is_err());

        let loaded = store.load(&label("prod")).unwrap().into_inner();
        assert_eq!(loaded, sample());
        let listed: Vec<String> = store.list().unwrap().into_iter().map(|i| i.label).collect();
        assert_eq!(listed, vec!["prod"]);
        assert_eq!(
            fs::read_dir(tmp.path().join(SNAPSHOTS_DIR)).unwrap().count(),
            1,
            "no staging directories left behind"
        );
    }

    #[test]
    fn control_characters_in_table_names_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = FsSnapshotStore::open(tmp.path(), SnapshotFormat::Json).unwrap();
        store.save(&label("x"), &sample()).unwrap();

        let tables: BTreeMap<String, Vec<RowMap>> = [("users\0".to_string(), vec![])].into();
        assert!(store.save(&label("x"), &tables).is_err());
        assert_eq!(store.tables(&label("x")).unwrap(), vec!["empty", "users"]);
    }

    #[test]
    fn work_directories_are_not_listed() {
        let tmp = TempDir::new().unwrap();
        let store = FsSnapshotStore::open(tmp.path(), SnapshotFormat::Json).unwrap();
        store.save(&label("kept"), &sample()).unwrap();
        fs::create_dir_all(tmp.path().join("snapshots/.staging-abc")).unwrap();

        let listed: Vec<String> = store.list().unwrap().into_iter().map(|i| i.label).collect();
        assert_eq!(listed, vec!["kept"]);
    }
}
