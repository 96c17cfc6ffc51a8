use anyhow::{Context, Result};
use sqlx::any::AnyRow;
use sqlx::{Column, Row, TypeInfo};
use std::collections::BTreeMap;

use crate::domain::value::RowMap;
use crate::infrastructure::db::dialect::RowDecoder;

/// Convert a fetched `AnyRow` into a snapshot row.
///
/// `col_types` holds catalog `data_type`s by column name; when a column is
/// missing from it (always, on SQLite) the runtime type name is the hint.
pub fn row_to_map(
    row: &AnyRow,
    col_types: &BTreeMap<String, String>,
    decoder: &dyn RowDecoder,
) -> Result<RowMap> {
    let mut map = RowMap::new();
    for col in row.columns() {
        let hint = match col_types.get(col.name()) {
            Some(t) => t.as_str(),
            None => col.type_info().name(),
        };
        let value = decoder
            .decode_column(row, col.ordinal(), hint)
            .with_context(|| format!("Failed to decode column {} ({})", col.name(), hint))?;
        map.insert(col.name().to_string(), value);
    }
    Ok(map)
}

/// Read a catalog string column. MySQL reports `information_schema` text as
/// BLOB through `AnyRow`.
pub fn catalog_string(row: &AnyRow, idx: usize) -> Result<String> {
    if row.column(idx).type_info().name() == "BLOB" {
        let bytes: Vec<u8> = row.try_get(idx)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    } else {
        Ok(row.try_get(idx)?)
    }
}
