use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::ports::SnapshotProvider;
use crate::domain::value::RowMap;
use crate::domain::value_objects::{Fingerprint, TableName};

/// In-memory implementation of [`SnapshotProvider`].
///
/// Wraps the `BTreeMap<table_name, Vec<RowMap>>` returned by
/// `snapdiff::capture()` or loaded from the snapshot store.
#[derive(Debug, Clone, Default)]
pub struct MapSnapshotProvider(BTreeMap<String, Vec<RowMap>>);

impl MapSnapshotProvider {
    pub fn new(data: BTreeMap<String, Vec<RowMap>>) -> Self {
        Self(data)
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<RowMap>> {
        self.0
    }
}

impl SnapshotProvider for MapSnapshotProvider {
    fn get(&self, table: &TableName) -> Option<&[RowMap]> {
        self.0.get(&table.0).map(|v| v.as_slice())
    }

    fn table_names(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }
}

/// Per-table entry of a [`SnapshotManifest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableManifest {
    pub rows: usize,
    pub fingerprint: Fingerprint,
}

/// Metadata written next to the table files of a stored snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub tables: BTreeMap<String, TableManifest>,
}

/// One entry of `snapdiff list`.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotInfo {
    pub label: String,
    pub tables: Vec<String>,
    pub manifest: Option<SnapshotManifest>,
}
