use crate::domain::value_objects::{Schema, TableName};
use crate::infrastructure::db::dialect::QueryDialect;

/// Qualified, quoted table reference (`"public"."users"`, `` `app`.`users` ``, `"users"`).
pub fn qualified_table(schema: &Schema, table: &TableName, dialect: &dyn QueryDialect) -> String {
    format!(
        "{}{}",
        dialect.schema_prefix(&schema.0),
        dialect.quote_ident(&table.0)
    )
}

/// Build the SELECT that captures a table.
///
/// Only `columns` are selected, in the given order. A column whose catalog
/// type (looked up in `col_types`) is not decodable by `AnyRow` is wrapped in
/// the dialect's text cast; columns without a known type are selected as-is.
pub fn build_select_query(
    schema: &Schema,
    table: &TableName,
    columns: &[String],
    col_types: &[(String, String)],
    dialect: &dyn QueryDialect,
) -> String {
    let exprs: Vec<String> = columns
        .iter()
        .map(|col| {
            let quoted = dialect.quote_ident(col);
            let data_type = col_types
                .iter()
                .find(|(name, _)| name == col)
                .map(|(_, t)| t.as_str());
            match data_type {
                Some(t) if !dialect.is_native_type(t) => dialect.cast_to_text(&quoted),
                _ => quoted,
            }
        })
        .collect();

    format!(
        "SELECT {} FROM {}",
        exprs.join(", "),
        qualified_table(schema, table, dialect)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::db::dialect::{MysqlDialect, PostgresDialect, SqliteDialect};

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn types(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(c, t)| (c.to_string(), t.to_string()))
            .collect()
    }

    #[test]
    fn postgres_casts_non_native_columns() {
        let q = build_select_query(
            &Schema("sandbox".into()),
            &TableName("orders".into()),
            &cols(&["id", "total", "note", "paid"]),
            &types(&[
                ("id", "integer"),
                ("total", "numeric"),
                ("note", "character varying"),
                ("paid", "boolean"),
                ("updated_at", "timestamp without time zone"),
            ]),
            &PostgresDialect,
        );
        assert_eq!(
            q,
            r#"SELECT "id", "total"::TEXT AS "total", "note"::TEXT AS "note", "paid" FROM "sandbox"."orders""#
        );
    }

    #[test]
    fn ignored_columns_are_not_selected() {
        let q = build_select_query(
            &Schema("public".into()),
            &TableName("users".into()),
            &cols(&["id"]),
            &types(&[("id", "integer"), ("updated_at", "timestamp")]),
            &PostgresDialect,
        );
        assert!(!q.contains("updated_at"), "{}", q);
    }

    #[test]
    fn mysql_converts_decimal_and_json() {
        let q = build_select_query(
            &Schema("shop".into()),
            &TableName("items".into()),
            &cols(&["id", "price", "meta"]),
            &types(&[("id", "int"), ("price", "decimal"), ("meta", "json")]),
            &MysqlDialect,
        );
        assert!(q.starts_with("SELECT `id`, "), "{}", q);
        assert!(q.contains("CONVERT(`price` USING utf8mb4) AS `price`"), "{}", q);
        assert!(q.contains("CONVERT(`meta` USING utf8mb4) AS `meta`"), "{}", q);
        assert!(q.ends_with("FROM `shop`.`items`"), "{}", q);
    }

    #[test]
    fn sqlite_selects_plain_columns_without_schema() {
        let q = build_select_query(
            &Schema("main".into()),
            &TableName("tax_rates".into()),
            &cols(&["region", "rate"]),
            &[],
            &SqliteDialect,
        );
        assert_eq!(q, r#"SELECT "region", "rate" FROM "tax_rates""#);
    }

    #[test]
    fn qualified_table_quotes_both_parts() {
        assert_eq!(
            qualified_table(&Schema("a b".into()), &TableName("t".into()), &PostgresDialect),
            r#""a b"."t""#
        );
    }
}
