//! Catalog introspection
//!
//! Reads `information_schema` for the database the connection is bound to
//! and produces an immutable [`TableSnapshot`]. Snapshots are never cached;
//! every comparison sees the catalog as it is right now.

use indexmap::IndexMap;
use sqlx::mysql::MySqlPool;
use sqlx::FromRow;

use crate::error::{Error, Result};
use crate::schema::types::{ColumnSnapshot, IndexSnapshot, PrimaryKeySnapshot, TableSnapshot};

#[derive(FromRow)]
struct ColumnRow {
    column_name: String,
    column_type: String,
    is_nullable: String,
    column_key: String,
    column_default: Option<String>,
    extra: String,
    column_comment: String,
}

#[derive(FromRow)]
struct IndexRow {
    index_name: String,
    column_name: String,
    non_unique: i64,
    index_type: String,
}

/// Capture the current structure of `table_name`
///
/// Fails with [`Error::TableNotFound`] when the catalog reports no columns
/// for the table.
pub async fn snapshot(pool: &MySqlPool, table_name: &str) -> Result<TableSnapshot> {
    let mut table = TableSnapshot::new(table_name);

    let columns_sql = r#"
        SELECT
            COLUMN_NAME AS column_name,
            COLUMN_TYPE AS column_type,
            IS_NULLABLE AS is_nullable,
            COLUMN_KEY AS column_key,
            COLUMN_DEFAULT AS column_default,
            EXTRA AS extra,
            COLUMN_COMMENT AS column_comment
        FROM INFORMATION_SCHEMA.COLUMNS
        WHERE TABLE_SCHEMA = DATABASE()
          AND TABLE_NAME = ?
        ORDER BY ORDINAL_POSITION
    "#;

    let column_rows = sqlx::query_as::<_, ColumnRow>(columns_sql)
        .bind(table_name)
        .fetch_all(pool)
        .await
        .map_err(|e| Error::Catalog(format!("failed to query columns of '{}': {}", table_name, e)))?;

    if column_rows.is_empty() {
        return Err(Error::TableNotFound(table_name.to_string()));
    }

    let mut pk_columns = Vec::new();

    for row in column_rows {
        let on_update = row
            .extra
            .to_lowercase()
            .contains("on update current_timestamp");

        if row.column_key == "PRI" {
            pk_columns.push(row.column_name.clone());
        }

        table.columns.push(ColumnSnapshot {
            name: row.column_name,
            column_type: row.column_type,
            nullable: row.is_nullable == "YES",
            column_key: row.column_key,
            default: row.column_default,
            extra: row.extra,
            comment: row.column_comment,
            on_update_current_timestamp: on_update,
        });
    }

    if !pk_columns.is_empty() {
        table.primary_key = Some(PrimaryKeySnapshot {
            columns: pk_columns,
        });
    }

    let indexes_sql = r#"
        SELECT
            INDEX_NAME AS index_name,
            COLUMN_NAME AS column_name,
            NON_UNIQUE AS non_unique,
            INDEX_TYPE AS index_type
        FROM INFORMATION_SCHEMA.STATISTICS
        WHERE TABLE_SCHEMA = DATABASE()
          AND TABLE_NAME = ?
        ORDER BY INDEX_NAME, SEQ_IN_INDEX
    "#;

    let index_rows = sqlx::query_as::<_, IndexRow>(indexes_sql)
        .bind(table_name)
        .fetch_all(pool)
        .await
        .map_err(|e| Error::Catalog(format!("failed to query indexes of '{}': {}", table_name, e)))?;

    // Group rows sharing an index name, preserving first-seen column order.
    let mut index_map: IndexMap<String, IndexSnapshot> = IndexMap::new();

    for row in index_rows {
        // The primary index is modeled separately.
        if row.index_name == "PRIMARY" {
            continue;
        }

        index_map
            .entry(row.index_name.clone())
            .or_insert_with(|| IndexSnapshot {
                name: row.index_name,
                columns: Vec::new(),
                unique: row.non_unique == 0,
                method: row.index_type,
            })
            .columns
            .push(row.column_name);
    }

    table.indexes = index_map.into_values().collect();

    Ok(table)
}

/// List every base table in the connection's database
pub async fn all_table_names(pool: &MySqlPool) -> Result<Vec<String>> {
    let sql = r#"
        SELECT TABLE_NAME AS table_name
        FROM INFORMATION_SCHEMA.TABLES
        WHERE TABLE_SCHEMA = DATABASE()
          AND TABLE_TYPE = 'BASE TABLE'
        ORDER BY TABLE_NAME
    "#;

    #[derive(FromRow)]
    struct TableRow {
        table_name: String,
    }

    let rows = sqlx::query_as::<_, TableRow>(sql)
        .fetch_all(pool)
        .await
        .map_err(|e| Error::Catalog(format!("failed to query table names: {}", e)))?;

    Ok(rows.into_iter().map(|r| r.table_name).collect())
}

/// Column names of one table in ordinal order
///
/// Fails with [`Error::TableNotFound`] when the table has no columns.
pub async fn column_names(pool: &MySqlPool, table_name: &str) -> Result<Vec<String>> {
    let sql = r#"
        SELECT COLUMN_NAME AS column_name
        FROM INFORMATION_SCHEMA.COLUMNS
        WHERE TABLE_SCHEMA = DATABASE()
          AND TABLE_NAME = ?
        ORDER BY ORDINAL_POSITION
    "#;

    #[derive(FromRow)]
    struct NameRow {
        column_name: String,
    }

    let rows = sqlx::query_as::<_, NameRow>(sql)
        .bind(table_name)
        .fetch_all(pool)
        .await
        .map_err(|e| Error::Catalog(format!("failed to query columns of '{}': {}", table_name, e)))?;

    if rows.is_empty() {
        return Err(Error::TableNotFound(table_name.to_string()));
    }

    Ok(rows.into_iter().map(|r| r.column_name).collect())
}

/// The table's CREATE TABLE statement as reported by the server
pub async fn create_table_sql(pool: &MySqlPool, table_name: &str) -> Result<String> {
    let sql = format!("SHOW CREATE TABLE {}", crate::schema::ddl::quote_ident(table_name));

    let row: (String, String) = sqlx::query_as(&sql)
        .fetch_one(pool)
        .await
        .map_err(|e| Error::Catalog(format!("failed to get CREATE TABLE for '{}': {}", table_name, e)))?;

    Ok(row.1)
}
