//! Warehouse catalog introspection.
//!
//! Serves `list_tables` and `get_schema` from the engine's system catalogs,
//! over the calling tenant's own session so visibility follows the tenant's
//! role privileges.

use crate::error::{WarehouseError, WarehouseResult};
use crate::models::{ColumnDescription, TableDescription, TableEntry};
use sqlx::{PgConnection, Row};
use tracing::debug;

mod queries {
    pub const LIST_TABLES_ALL: &str = r#"
        SELECT
            t.table_schema,
            t.table_name,
            t.table_type,
            obj_description(
                (quote_ident(t.table_schema) || '.' || quote_ident(t.table_name))::regclass
            ) AS comment
        FROM information_schema.tables t
        WHERE t.table_type IN ('BASE TABLE', 'VIEW')
          AND t.table_schema NOT IN ('pg_catalog', 'information_schema')
        ORDER BY t.table_schema, t.table_name
        "#;

    pub const LIST_TABLES_ALLOWED: &str = r#"
        SELECT
            t.table_schema,
            t.table_name,
            t.table_type,
            obj_description(
                (quote_ident(t.table_schema) || '.' || quote_ident(t.table_name))::regclass
            ) AS comment
        FROM information_schema.tables t
        WHERE t.table_type IN ('BASE TABLE', 'VIEW')
          AND t.table_schema = ANY($1)
        ORDER BY t.table_schema, t.table_name
        "#;

    pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            c.column_name,
            c.data_type,
            c.character_maximum_length,
            c.column_default,
            c.is_nullable,
            col_description(
                (quote_ident(c.table_schema) || '.' || quote_ident(c.table_name))::regclass,
                c.ordinal_position::int
            ) AS comment
        FROM information_schema.columns c
        WHERE c.table_schema = $1 AND c.table_name = $2
        ORDER BY c.ordinal_position
        "#;
}

/// Catalog queries over a tenant session.
pub struct CatalogInspector;

impl CatalogInspector {
    /// Enumerate tables and views visible to the session, optionally
    /// restricted to an allow-list of schemas.
    pub async fn list_tables(
        conn: &mut PgConnection,
        allowed_schemas: &[String],
    ) -> WarehouseResult<Vec<TableEntry>> {
        let rows = if allowed_schemas.is_empty() {
            sqlx::query(queries::LIST_TABLES_ALL)
                .fetch_all(&mut *conn)
                .await
        } else {
            sqlx::query(queries::LIST_TABLES_ALLOWED)
                .bind(allowed_schemas)
                .fetch_all(&mut *conn)
                .await
        }
        .map_err(WarehouseError::from)?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in rows {
            tables.push(TableEntry {
                schema: row.try_get("table_schema").map_err(WarehouseError::from)?,
                name: row.try_get("table_name").map_err(WarehouseError::from)?,
                table_type: row.try_get("table_type").map_err(WarehouseError::from)?,
                comment: row.try_get("comment").ok().flatten(),
            });
        }
        debug!(count = tables.len(), "Listed catalog tables");
        Ok(tables)
    }

    /// Describe one relation's columns. `Ok(None)` means the relation does
    /// not exist (or is not visible to the session).
    pub async fn describe_table(
        conn: &mut PgConnection,
        schema: &str,
        table: &str,
    ) -> WarehouseResult<Option<TableDescription>> {
        let rows = sqlx::query(queries::DESCRIBE_COLUMNS)
            .bind(schema)
            .bind(table)
            .fetch_all(&mut *conn)
            .await
            .map_err(WarehouseError::from)?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut columns = Vec::with_capacity(rows.len());
        for row in rows {
            let nullable: String = row.try_get("is_nullable").map_err(WarehouseError::from)?;
            columns.push(ColumnDescription {
                name: row.try_get("column_name").map_err(WarehouseError::from)?,
                data_type: row.try_get("data_type").map_err(WarehouseError::from)?,
                max_length: row.try_get("character_maximum_length").ok().flatten(),
                nullable: nullable.eq_ignore_ascii_case("YES"),
                default: row.try_get("column_default").ok().flatten(),
                comment: row.try_get("comment").ok().flatten(),
            });
        }

        Ok(Some(TableDescription {
            schema: schema.to_string(),
            name: table.to_string(),
            columns,
        }))
    }
}
