use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::any::AnyPoolOptions;
use sqlx::AnyPool;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::domain::ports::RowSource;
use crate::domain::value::RowMap;
use crate::domain::value_objects::{Schema, TableName};
use crate::infrastructure::config::DbConfig;
use crate::infrastructure::db::dialect::{from_url, normalize_url, Dialect};
use crate::infrastructure::db::row_mapper::{catalog_string, row_to_map};
use crate::infrastructure::db::sql_utils::build_select_query;

/// `RowSource` backed by a sqlx `AnyPool`. The dialect is picked from the
/// DSN scheme.
pub struct SqlxRowSource {
    pool: AnyPool,
    dialect: Arc<dyn Dialect>,
}

/// Connect to the database described in `cfg`.
pub async fn connect(cfg: &DbConfig) -> Result<SqlxRowSource> {
    let dsn = cfg
        .dsn
        .as_deref()
        .context("No database DSN configured (use --dsn or [database] dsn)")?;

    sqlx::any::install_default_drivers();

    let dialect: Arc<dyn Dialect> = Arc::from(from_url(dsn));
    let pool = AnyPoolOptions::new()
        .max_connections(cfg.max_connections.max(1))
        .connect(&normalize_url(dsn))
        .await
        .with_context(|| format!("Failed to connect to {} database", dialect.name()))?;

    debug!(driver = dialect.name(), "connected");

    Ok(SqlxRowSource { pool, dialect })
}

impl SqlxRowSource {
    /// An empty schema means the driver default.
    fn effective_schema(&self, schema: &Schema) -> Schema {
        if schema.0.is_empty() {
            Schema(self.dialect.default_schema().to_string())
        } else {
            schema.clone()
        }
    }

    /// `(column_name, data_type)` pairs in ordinal order.
    async fn column_types(
        &self,
        schema: &Schema,
        table: &TableName,
    ) -> Result<Vec<(String, String)>> {
        let schema = self.effective_schema(schema);
        let mut query = sqlx::query(self.dialect.columns_sql());
        if self.dialect.binds_schema() {
            query = query.bind(schema.0.clone());
        }
        let rows = query
            .bind(table.0.clone())
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to read columns of {}.{}", schema.0, table.0))?;

        rows.iter()
            .map(|row| Ok((catalog_string(row, 0)?, catalog_string(row, 1)?)))
            .collect()
    }
}

#[async_trait]
impl RowSource for SqlxRowSource {
    async fn list_tables(&self, schema: &Schema) -> Result<Vec<TableName>> {
        let schema = self.effective_schema(schema);
        let mut query = sqlx::query(self.dialect.list_tables_sql());
        if self.dialect.binds_schema() {
            query = query.bind(schema.0.clone());
        }
        let rows = query
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to list tables of {}", schema.0))?;

        rows.iter()
            .map(|row| catalog_string(row, 0).map(TableName))
            .collect()
    }

    async fn table_columns(&self, schema: &Schema, table: &TableName) -> Result<Vec<String>> {
        let cols = self.column_types(schema, table).await?;
        if cols.is_empty() {
            anyhow::bail!("Table {} not found", table.0);
        }
        Ok(cols.into_iter().map(|(name, _)| name).collect())
    }

    async fn fetch_rows(
        &self,
        schema: &Schema,
        table: &TableName,
        columns: &[String],
    ) -> Result<Vec<RowMap>> {
        let col_types = self.column_types(schema, table).await?;

        let query = build_select_query(
            &self.effective_schema(schema),
            table,
            columns,
            &col_types,
            self.dialect.as_ref(),
        );
        debug!("Executing: {}", query);

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to query {}", table.0))?;

        let type_map: BTreeMap<String, String> = col_types.into_iter().collect();
        rows.iter()
            .map(|row| row_to_map(row, &type_map, self.dialect.as_ref()))
            .collect()
    }
}
