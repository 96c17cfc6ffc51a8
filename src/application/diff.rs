use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use crate::domain::equality::rows_equal;
use crate::domain::identity::{IdColumnResolver, IdentityKey, IdentityResolver, KeyColumnsResolver};
use crate::domain::value::{strip_columns, RowMap};
use crate::domain::{
    diff_result::DiffResult,
    ports::{Differ, SnapshotProvider},
    table_diff::{TableDiff, UpdatedRow},
    value_objects::{ColumnName, IgnoredColumns, TableName},
};

// ─── Options ───

/// Everything one diff invocation needs, built fresh per call.
#[derive(Debug, Clone)]
pub struct DiffOptions {
    /// Tables to compare; empty = every table present on either side.
    pub tables: Vec<String>,
    pub ignore_columns: IgnoredColumns,
    /// Drop tables without any change from the result.
    pub only_changed: bool,
    /// Identifier column used when a table has no explicit key columns.
    pub id_column: String,
    /// Explicit identity columns per table.
    pub key_columns: BTreeMap<String, Vec<String>>,
}

impl Default for DiffOptions {
    fn default() -> Self {
        Self {
            tables: Vec::new(),
            ignore_columns: IgnoredColumns::default(),
            only_changed: false,
            id_column: "id".to_string(),
            key_columns: BTreeMap::new(),
        }
    }
}

impl DiffOptions {
    /// Identity strategy for `table`.
    pub fn resolver_for(&self, table: &str) -> Box<dyn IdentityResolver> {
        match self.key_columns.get(table) {
            Some(cols) if !cols.is_empty() => Box::new(KeyColumnsResolver::new(
                cols.iter().map(|c| ColumnName(c.clone())).collect(),
            )),
            _ => Box::new(IdColumnResolver::new(self.id_column.clone())),
        }
    }
}

// ─── Diff Service ───

/// Runs the table differ over every requested table of two snapshots.
pub struct DiffService {
    differ: Arc<dyn Differ>,
}

impl DiffService {
    pub fn new(differ: Arc<dyn Differ>) -> Self {
        Self { differ }
    }

    pub fn run(
        &self,
        from_label: &str,
        to_label: &str,
        from: &dyn SnapshotProvider,
        to: &dyn SnapshotProvider,
        opts: &DiffOptions,
    ) -> DiffResult {
        let tables: BTreeSet<String> = if opts.tables.is_empty() {
            from.table_names()
                .into_iter()
                .chain(to.table_names())
                .collect()
        } else {
            opts.tables.iter().cloned().collect()
        };

        let mut diffs = BTreeMap::new();
        for name in tables {
            let table = TableName(name);
            let (from_rows, to_rows) = match (from.get(&table), to.get(&table)) {
                (None, None) => {
                    debug!(table = %table.0, "table absent from both snapshots, skipping");
                    continue;
                }
                (f, t) => (f.unwrap_or_default(), t.unwrap_or_default()),
            };

            let resolver = opts.resolver_for(&table.0);
            let diff = self.differ.diff_table(
                &table,
                from_rows,
                to_rows,
                resolver.as_ref(),
                &opts.ignore_columns,
            );

            if opts.only_changed && diff.is_empty() {
                continue;
            }
            diffs.insert(table.0, diff);
        }

        DiffResult::new(from_label, to_label, diffs)
    }
}

// ─── Table Differ (implementation of the port) ───

#[derive(Default)]
pub struct TableDiffer;

impl TableDiffer {
    pub fn new() -> Self {
        Self
    }
}

impl Differ for TableDiffer {
    fn diff_table(
        &self,
        table_name: &TableName,
        from: &[RowMap],
        to: &[RowMap],
        resolver: &dyn IdentityResolver,
        ignored: &IgnoredColumns,
    ) -> TableDiff {
        // duplicate keys within one side: the last row wins
        let from_index: BTreeMap<IdentityKey, &RowMap> =
            from.iter().map(|r| (resolver.resolve(r), r)).collect();
        let to_index: BTreeMap<IdentityKey, &RowMap> =
            to.iter().map(|r| (resolver.resolve(r), r)).collect();

        let inserted: Vec<RowMap> = to_index
            .iter()
            .filter(|(k, _)| !from_index.contains_key(*k))
            .map(|(_, row)| (*row).clone())
            .collect();

        let deleted: Vec<RowMap> = from_index
            .iter()
            .filter(|(k, _)| !to_index.contains_key(*k))
            .map(|(_, row)| (*row).clone())
            .collect();

        let updated: Vec<UpdatedRow> = from_index
            .iter()
            .filter_map(|(k, before)| {
                let after = to_index.get(k)?;
                if rows_equal(before, after, ignored) {
                    return None;
                }
                Some(UpdatedRow {
                    primary_key: resolver.primary_key(before),
                    before: strip_columns(before, ignored),
                    after: strip_columns(after, ignored),
                })
            })
            .collect();

        TableDiff {
            table_name: table_name.0.clone(),
            inserted,
            updated,
            deleted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::snapshot::MapSnapshotProvider;
    use serde_json::{json, Value};

    fn row(pairs: &[(&str, Value)]) -> RowMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn table(name: &str) -> TableName {
        TableName(name.to_string())
    }

    fn diff(from: &[RowMap], to: &[RowMap], ignored: &IgnoredColumns) -> TableDiff {
        TableDiffer::new().diff_table(
            &table("users"),
            from,
            to,
            &IdColumnResolver::default(),
            ignored,
        )
    }

    fn provider(tables: &[(&str, Vec<RowMap>)]) -> MapSnapshotProvider {
        MapSnapshotProvider::new(
            tables
                .iter()
                .map(|(name, rows)| (name.to_string(), rows.clone()))
                .collect(),
        )
    }

    // ── TableDiffer ──

    #[test]
    fn detects_insert_update_delete() {
        let from = vec![
            row(&[("id", json!(1)), ("name", json!("a"))]),
            row(&[("id", json!(2)), ("name", json!("b"))]),
        ];
        let to = vec![
            row(&[("id", json!(1)), ("name", json!("a2"))]),
            row(&[("id", json!(3)), ("name", json!("c"))]),
        ];

        let d = diff(&from, &to, &IgnoredColumns::default());

        assert_eq!(d.inserted, vec![row(&[("id", json!(3)), ("name", json!("c"))])]);
        assert_eq!(d.deleted, vec![row(&[("id", json!(2)), ("name", json!("b"))])]);
        assert_eq!(
            d.updated,
            vec![UpdatedRow {
                primary_key: row(&[("id", json!(1))]),
                before: row(&[("id", json!(1)), ("name", json!("a"))]),
                after: row(&[("id", json!(1)), ("name", json!("a2"))]),
            }]
        );
    }

    #[test]
    fn identical_input_yields_empty_diff() {
        let rows = vec![
            row(&[("id", json!(1)), ("x", json!(10))]),
            row(&[("x", json!(20))]),
            row(&[]),
        ];
        assert!(diff(&rows, &rows, &IgnoredColumns::default()).is_empty());
    }

    #[test]
    fn row_order_is_irrelevant() {
        let a = row(&[("id", json!(1)), ("x", json!(10))]);
        let b = row(&[("id", json!(2)), ("x", json!(20))]);
        let d = diff(
            &[a.clone(), b.clone()],
            &[b, a],
            &IgnoredColumns::default(),
        );
        assert!(d.is_empty());
    }

    #[test]
    fn ignored_only_difference_is_no_change() {
        let from = vec![row(&[("id", json!(1)), ("updated_at", json!("t1"))])];
        let to = vec![row(&[("id", json!(1)), ("updated_at", json!("t2"))])];
        let d = diff(&from, &to, &IgnoredColumns::from_iter(["updated_at"]));
        assert!(d.is_empty());
    }

    #[test]
    fn updated_payloads_drop_ignored_but_inserts_keep_them() {
        let from = vec![row(&[("id", json!(1)), ("n", json!(1)), ("ts", json!("t1"))])];
        let to = vec![
            row(&[("id", json!(1)), ("n", json!(2)), ("ts", json!("t2"))]),
            row(&[("id", json!(2)), ("n", json!(5)), ("ts", json!("t3"))]),
        ];
        let d = diff(&from, &to, &IgnoredColumns::from_iter(["ts"]));

        assert_eq!(d.updated.len(), 1);
        assert!(!d.updated[0].before.contains_key("ts"));
        assert!(!d.updated[0].after.contains_key("ts"));
        assert_eq!(d.inserted.len(), 1);
        assert!(d.inserted[0].contains_key("ts"));
    }

    #[test]
    fn large_unsigned_and_float_ids_join() {
        let from = vec![row(&[("id", json!(9_300_000_000_000_000_000u64)), ("v", json!(1))])];
        let to = vec![row(&[("id", json!(9.3e18)), ("v", json!(2))])];
        let d = diff(&from, &to, &IgnoredColumns::default());
        assert_eq!(d.updated.len(), 1);
        assert!(d.inserted.is_empty());
        assert!(d.deleted.is_empty());
    }

    #[test]
    fn keyless_change_is_delete_plus_insert() {
        let from = vec![row(&[("code", json!("FR")), ("rate", json!(20))])];
        let to = vec![row(&[("code", json!("FR")), ("rate", json!(21))])];
        let d = diff(&from, &to, &IgnoredColumns::default());
        assert!(d.updated.is_empty());
        assert_eq!(d.inserted.len(), 1);
        assert_eq!(d.deleted.len(), 1);
    }

    #[test]
    fn explicit_key_columns_detect_keyless_update() {
        let opts = DiffOptions {
            key_columns: [("rates".to_string(), vec!["code".to_string()])].into(),
            ..DiffOptions::default()
        };
        let from = vec![row(&[("code", json!("FR")), ("rate", json!(20))])];
        let to = vec![row(&[("code", json!("FR")), ("rate", json!(21))])];
        let resolver = opts.resolver_for("rates");
        let d = TableDiffer::new().diff_table(
            &table("rates"),
            &from,
            &to,
            resolver.as_ref(),
            &opts.ignore_columns,
        );
        assert_eq!(d.updated.len(), 1);
        assert_eq!(d.updated[0].primary_key, row(&[("code", json!("FR"))]));
    }

    #[test]
    fn duplicate_keys_last_write_wins() {
        let from = vec![
            row(&[("id", json!(1)), ("v", json!("first"))]),
            row(&[("id", json!(1)), ("v", json!("second"))]),
        ];
        let to = vec![row(&[("id", json!(1)), ("v", json!("second"))])];
        assert!(diff(&from, &to, &IgnoredColumns::default()).is_empty());
    }

    #[test]
    fn buckets_are_sorted_by_identity_key() {
        let to = vec![
            row(&[("id", json!("b"))]),
            row(&[("id", json!("c"))]),
            row(&[("id", json!("a"))]),
        ];
        let d = diff(&[], &to, &IgnoredColumns::default());
        let ids: Vec<&Value> = d.inserted.iter().map(|r| &r["id"]).collect();
        assert_eq!(ids, vec![&json!("a"), &json!("b"), &json!("c")]);
    }

    #[test]
    fn each_key_lands_in_one_bucket() {
        let from = vec![
            row(&[("id", json!(1)), ("v", json!(1))]),
            row(&[("id", json!(2)), ("v", json!(2))]),
            row(&[("id", json!(3)), ("v", json!(3))]),
        ];
        let to = vec![
            row(&[("id", json!(2)), ("v", json!(20))]),
            row(&[("id", json!(3)), ("v", json!(3))]),
            row(&[("id", json!(4)), ("v", json!(4))]),
        ];
        let d = diff(&from, &to, &IgnoredColumns::default());
        let mut seen: Vec<String> = d
            .inserted
            .iter()
            .chain(d.deleted.iter())
            .map(|r| r["id"].to_string())
            .chain(d.updated.iter().map(|u| u.primary_key["id"].to_string()))
            .collect();
        seen.sort();
        assert_eq!(seen, vec!["1", "2", "4"]);
    }

    // ── DiffService ──

    fn service() -> DiffService {
        DiffService::new(Arc::new(TableDiffer::new()))
    }

    #[test]
    fn table_only_in_to_is_all_inserts() {
        let rows = vec![row(&[("id", json!(1))]), row(&[("id", json!(2))])];
        let from = provider(&[]);
        let to = provider(&[("users", rows.clone())]);

        let result = service().run("a", "b", &from, &to, &DiffOptions::default());
        let users = &result.tables["users"];
        assert_eq!(users.inserted, rows);
        assert!(users.deleted.is_empty() && users.updated.is_empty());

        let reverse = service().run("b", "a", &to, &from, &DiffOptions::default());
        assert_eq!(reverse.tables["users"].deleted, rows);
    }

    #[test]
    fn only_changed_drops_clean_tables_only() {
        let same = vec![row(&[("id", json!(1))])];
        let from = provider(&[("a", same.clone()), ("b", same.clone())]);
        let to = provider(&[("a", same), ("b", vec![])]);

        let all = service().run("x", "y", &from, &to, &DiffOptions::default());
        assert_eq!(all.tables.len(), 2);

        let opts = DiffOptions {
            only_changed: true,
            ..DiffOptions::default()
        };
        let changed = service().run("x", "y", &from, &to, &opts);
        assert_eq!(changed.tables.keys().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn table_filter_limits_tables_and_skips_unknown() {
        let rows = vec![row(&[("id", json!(1))])];
        let from = provider(&[("a", rows.clone()), ("b", rows.clone())]);
        let to = provider(&[("a", vec![]), ("b", vec![])]);

        let opts = DiffOptions {
            tables: vec!["b".into(), "ghost".into()],
            ..DiffOptions::default()
        };
        let result = service().run("x", "y", &from, &to, &opts);
        assert_eq!(result.tables.keys().collect::<Vec<_>>(), vec!["b"]);
    }

    #[test]
    fn identical_snapshots_are_clean() {
        let snap = provider(&[
            ("users", vec![row(&[("id", json!(1)), ("n", json!("a"))])]),
            ("orders", vec![row(&[("total", json!(9.5))])]),
        ]);
        let result = service().run("x", "x", &snap, &snap, &DiffOptions::default());
        assert_eq!(result.tables.len(), 2);
        assert!(result.is_clean());
    }
}
