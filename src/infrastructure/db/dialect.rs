use anyhow::Result;
use serde_json::{json, Value};
use sqlx::any::AnyRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

// ─────────────────────────────────────────────────────────────────────────────
// Traits
// ─────────────────────────────────────────────────────────────────────────────

/// SQL dialect: catalog queries and identifier handling, per driver.
///
/// Pure string manipulation; the sqlx-facing half lives in [`RowDecoder`].
pub trait QueryDialect: Send + Sync {
    /// Driver name as a lowercase string ("postgres", "mysql", …).
    fn name(&self) -> &'static str;

    /// `true` if catalog queries take the schema as their first bind parameter.
    fn binds_schema(&self) -> bool {
        true
    }

    /// Schema used when none is configured.
    fn default_schema(&self) -> &'static str;

    /// Quote an identifier (table, column, schema).
    fn quote_ident(&self, s: &str) -> String;

    /// `schema.` prefix for a qualified table reference.
    fn schema_prefix(&self, schema: &str) -> String {
        format!("{}.", self.quote_ident(schema))
    }

    /// Expression coercing an unsupported column to text readable by `AnyRow`.
    fn cast_to_text(&self, col_quoted: &str) -> String;

    /// `true` if `data_type` decodes through `AnyRow` without a cast.
    fn is_native_type(&self, data_type: &str) -> bool;

    /// Base tables of a schema, one `table_name` column, sorted.
    fn list_tables_sql(&self) -> &'static str;

    /// `(column_name, data_type)` rows of a table in ordinal order.
    fn columns_sql(&self) -> &'static str;
}

/// Row decoder: read a single `AnyRow` column into a `serde_json::Value`.
pub trait RowDecoder: Send + Sync {
    /// `type_hint` is the catalog `data_type`, or the runtime type name when
    /// the dialect does not introspect.
    fn decode_column(&self, row: &AnyRow, idx: usize, type_hint: &str) -> Result<Value>;
}

/// Combined supertrait so callers only store one object.
pub trait Dialect: QueryDialect + RowDecoder {}
impl Dialect for PostgresDialect {}
impl Dialect for MysqlDialect {}
impl Dialect for SqliteDialect {}

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL
// ─────────────────────────────────────────────────────────────────────────────

pub struct PostgresDialect;

impl QueryDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn default_schema(&self) -> &'static str {
        "public"
    }

    fn quote_ident(&self, s: &str) -> String {
        format!("\"{}\"", s.replace('"', "\"\""))
    }

    fn cast_to_text(&self, col_quoted: &str) -> String {
        format!("{}::TEXT AS {}", col_quoted, col_quoted)
    }

    fn is_native_type(&self, data_type: &str) -> bool {
        matches!(
            data_type.to_lowercase().as_str(),
            "boolean" | "smallint" | "integer" | "bigint" | "real" | "double precision"
        )
    }

    fn list_tables_sql(&self) -> &'static str {
        "SELECT table_name::TEXT \
         FROM information_schema.tables \
         WHERE table_schema = $1 AND table_type = 'BASE TABLE' \
         ORDER BY table_name"
    }

    fn columns_sql(&self) -> &'static str {
        "SELECT column_name::TEXT, data_type::TEXT \
         FROM information_schema.columns \
         WHERE table_schema = $1 AND table_name = $2 \
         ORDER BY ordinal_position"
    }
}

impl RowDecoder for PostgresDialect {
    fn decode_column(&self, row: &AnyRow, idx: usize, type_hint: &str) -> Result<Value> {
        decode_typed(row, idx, ValueKind::of(type_hint))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MySQL / MariaDB (same wire protocol and AnyRow behaviour)
// ─────────────────────────────────────────────────────────────────────────────

pub struct MysqlDialect;

impl QueryDialect for MysqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    // the connection's database; resolved by the catalog query when empty
    fn default_schema(&self) -> &'static str {
        ""
    }

    fn quote_ident(&self, s: &str) -> String {
        format!("`{}`", s.replace('`', "``"))
    }

    fn schema_prefix(&self, schema: &str) -> String {
        if schema.is_empty() {
            String::new()
        } else {
            format!("{}.", self.quote_ident(schema))
        }
    }

    fn cast_to_text(&self, col_quoted: &str) -> String {
        format!("CONVERT({} USING utf8mb4) AS {}", col_quoted, col_quoted)
    }

    fn is_native_type(&self, data_type: &str) -> bool {
        matches!(
            data_type.to_lowercase().as_str(),
            "int" | "mediumint" | "bigint" | "float" | "double"
        )
    }

    fn list_tables_sql(&self) -> &'static str {
        "SELECT table_name \
         FROM information_schema.tables \
         WHERE table_schema = COALESCE(NULLIF(?, ''), DATABASE()) AND table_type = 'BASE TABLE' \
         ORDER BY table_name"
    }

    fn columns_sql(&self) -> &'static str {
        "SELECT column_name, data_type \
         FROM information_schema.columns \
         WHERE table_schema = COALESCE(NULLIF(?, ''), DATABASE()) AND table_name = ? \
         ORDER BY ordinal_position"
    }
}

impl RowDecoder for MysqlDialect {
    fn decode_column(&self, row: &AnyRow, idx: usize, type_hint: &str) -> Result<Value> {
        // non-native columns come back as BLOB whatever the cast
        if row.column(idx).type_info().name() == "BLOB" {
            let bytes: Option<Vec<u8>> = row.try_get(idx)?;
            return Ok(bytes.map_or(Value::Null, |b| {
                ValueKind::of(type_hint).parse_text(String::from_utf8_lossy(&b).into_owned())
            }));
        }
        decode_typed(row, idx, ValueKind::of(type_hint))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite
// ─────────────────────────────────────────────────────────────────────────────

pub struct SqliteDialect;

impl QueryDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn binds_schema(&self) -> bool {
        false
    }

    fn default_schema(&self) -> &'static str {
        "main"
    }

    fn quote_ident(&self, s: &str) -> String {
        format!("\"{}\"", s.replace('"', "\"\""))
    }

    fn schema_prefix(&self, _schema: &str) -> String {
        String::new()
    }

    fn cast_to_text(&self, col_quoted: &str) -> String {
        format!("CAST({} AS TEXT) AS {}", col_quoted, col_quoted)
    }

    /// Declared types sqlx maps to bool, date/time or numeric are refused by
    /// the `Any` driver; everything else follows a storage class.
    fn is_native_type(&self, data_type: &str) -> bool {
        let t = data_type.to_uppercase();
        !(t.starts_with("BOOL")
            || t.starts_with("DATE")
            || t.starts_with("TIME")
            || t.contains("NUMERIC")
            || t.contains("DECIMAL"))
    }

    fn list_tables_sql(&self) -> &'static str {
        "SELECT name FROM sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
         ORDER BY name"
    }

    fn columns_sql(&self) -> &'static str {
        "SELECT name, type FROM pragma_table_info(?) ORDER BY cid"
    }
}

impl RowDecoder for SqliteDialect {
    /// Column affinity does not bind the stored value, so decoding follows the
    /// value's own storage class. The declared type only shapes text values.
    fn decode_column(&self, row: &AnyRow, idx: usize, type_hint: &str) -> Result<Value> {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        match ValueKind::of(raw.type_info().name()) {
            ValueKind::Text => {
                let text: String = row.try_get(idx)?;
                Ok(ValueKind::of(type_hint).parse_text(text))
            }
            stored => decode_typed(row, idx, stored),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Factory
// ─────────────────────────────────────────────────────────────────────────────

/// Resolve the dialect from a connection URL scheme. Unknown schemes fall
/// back to PostgreSQL.
pub fn from_url(url: &str) -> Box<dyn Dialect> {
    let scheme = url.split(':').next().unwrap_or_default().to_lowercase();
    match scheme.as_str() {
        "mysql" | "mariadb" => Box::new(MysqlDialect),
        "sqlite" => Box::new(SqliteDialect),
        _ => Box::new(PostgresDialect),
    }
}

/// sqlx's `Any` driver only understands `mysql://` for MariaDB servers too.
pub fn normalize_url(url: &str) -> String {
    match url.strip_prefix("mariadb:") {
        Some(rest) => format!("mysql:{}", rest),
        None => url.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoding
// ─────────────────────────────────────────────────────────────────────────────

/// How a column type maps onto the snapshot value universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Bool,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    /// Exact numerics, read as text and parsed.
    Decimal,
    /// JSON documents, read as text and parsed.
    Json,
    /// Raw bytes, kept as lossy UTF-8 text.
    Bytes,
    /// Text-like and anything unrecognised.
    Text,
}

impl ValueKind {
    fn of(type_name: &str) -> Self {
        match type_name.to_uppercase().as_str() {
            "BOOL" | "BOOLEAN" => ValueKind::Bool,
            "INT2" | "SMALLINT" | "SMALLSERIAL" | "TINYINT" => ValueKind::SmallInt,
            "INT4" | "INT" | "INTEGER" | "SERIAL" | "MEDIUMINT" => ValueKind::Int,
            "INT8" | "BIGINT" | "BIGSERIAL" => ValueKind::BigInt,
            "FLOAT4" | "REAL" | "FLOAT" => ValueKind::Float,
            "FLOAT8" | "DOUBLE" | "DOUBLE PRECISION" => ValueKind::Double,
            "NUMERIC" | "DECIMAL" => ValueKind::Decimal,
            "JSON" | "JSONB" => ValueKind::Json,
            "BLOB" => ValueKind::Bytes,
            _ => ValueKind::Text,
        }
    }

    /// Interpret text (a cast column or a MySQL BLOB) according to the kind.
    fn parse_text(self, s: String) -> Value {
        match self {
            ValueKind::Json => serde_json::from_str(&s).unwrap_or(Value::String(s)),
            ValueKind::SmallInt | ValueKind::Int | ValueKind::BigInt => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .unwrap_or(Value::String(s)),
            // integral decimals stay integers so they join with integer keys
            ValueKind::Decimal => match s.trim().parse::<i64>() {
                Ok(i) => Value::from(i),
                Err(_) => parse_float(s),
            },
            ValueKind::Float | ValueKind::Double => parse_float(s),
            ValueKind::Bool => match s.to_ascii_lowercase().as_str() {
                "t" | "true" | "1" => Value::Bool(true),
                "f" | "false" | "0" => Value::Bool(false),
                _ => Value::String(s),
            },
            ValueKind::Bytes | ValueKind::Text => Value::String(s),
        }
    }
}

fn parse_float(s: String) -> Value {
    s.trim()
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::String(s))
}

/// Decode a column that is either natively supported or was cast to text.
fn decode_typed(row: &AnyRow, idx: usize, kind: ValueKind) -> Result<Value> {
    Ok(match kind {
        ValueKind::Bool => row
            .try_get::<Option<bool>, _>(idx)?
            .map_or(Value::Null, Value::Bool),
        ValueKind::SmallInt | ValueKind::Int => row
            .try_get::<Option<i32>, _>(idx)?
            .map_or(Value::Null, |v| json!(v)),
        ValueKind::BigInt => row
            .try_get::<Option<i64>, _>(idx)?
            .map_or(Value::Null, |v| json!(v)),
        ValueKind::Float => row
            .try_get::<Option<f32>, _>(idx)?
            .map_or(Value::Null, |v| json!(v as f64)),
        ValueKind::Double => row
            .try_get::<Option<f64>, _>(idx)?
            .map_or(Value::Null, |v| json!(v)),
        ValueKind::Bytes => row
            .try_get::<Option<Vec<u8>>, _>(idx)?
            .map_or(Value::Null, |b| {
                Value::String(String::from_utf8_lossy(&b).into_owned())
            }),
        ValueKind::Decimal | ValueKind::Json | ValueKind::Text => row
            .try_get::<Option<String>, _>(idx)?
            .map_or(Value::Null, |s| kind.parse_text(s)),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
