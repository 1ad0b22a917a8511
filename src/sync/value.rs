//! Typed transport for arbitrary row data
//!
//! Rows are read without compile-time knowledge of their shape, so each cell
//! is decoded into a [`SqlValue`] chosen from the column's declared type and
//! bound back as the same type on the write side.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use sqlx::mysql::{MySql, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::error::{Error, Result};
use crate::schema::ddl::quote_ident;

/// One cell of a replicated row
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

/// Decode every cell of a row into name/value pairs in column order
pub fn decode_row(row: &MySqlRow) -> Result<Vec<(String, SqlValue)>> {
    let mut cells = Vec::with_capacity(row.columns().len());

    for (i, column) in row.columns().iter().enumerate() {
        let value = decode_cell(row, i, column.type_info().name())
            .map_err(|e| Error::Replication(format!("failed to decode column '{}': {}", column.name(), e)))?;
        cells.push((column.name().to_string(), value));
    }

    Ok(cells)
}

fn decode_cell(row: &MySqlRow, i: usize, type_name: &str) -> std::result::Result<SqlValue, sqlx::Error> {
    if row.try_get_raw(i)?.is_null() {
        return Ok(SqlValue::Null);
    }

    let upper = type_name.to_uppercase();
    let value = match upper.as_str() {
        "BOOLEAN" => SqlValue::Bool(row.try_get::<bool, _>(i)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            SqlValue::Int(row.try_get::<i64, _>(i)?)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => SqlValue::UInt(row.try_get::<u64, _>(i)?),
        "YEAR" => SqlValue::UInt(row.try_get::<u16, _>(i)? as u64),
        "FLOAT" => SqlValue::Float(row.try_get::<f32, _>(i)? as f64),
        "DOUBLE" => SqlValue::Float(row.try_get::<f64, _>(i)?),
        "DECIMAL" => SqlValue::Decimal(row.try_get::<Decimal, _>(i)?),
        "DATE" => SqlValue::Date(row.try_get::<NaiveDate, _>(i)?),
        "TIME" => SqlValue::Time(row.try_get::<NaiveTime, _>(i)?),
        "DATETIME" | "TIMESTAMP" => SqlValue::DateTime(row.try_get::<NaiveDateTime, _>(i)?),
        "CHAR" | "VARCHAR" | "TINYTEXT" | "TEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET"
        | "JSON" => SqlValue::Text(row.try_get::<String, _>(i)?),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => SqlValue::Bytes(row.try_get::<Vec<u8>, _>(i)?),
        _ => {
            // Unrecognized types fall back to text, then raw bytes.
            match row.try_get::<String, _>(i) {
                Ok(s) => SqlValue::Text(s),
                Err(_) => SqlValue::Bytes(row.try_get::<Vec<u8>, _>(i)?),
            }
        }
    };

    Ok(value)
}

/// Bind one value onto a prepared query
pub fn bind_value<'q>(
    query: Query<'q, MySql, sqlx::mysql::MySqlArguments>,
    value: &'q SqlValue,
) -> Query<'q, MySql, sqlx::mysql::MySqlArguments> {
    match value {
        SqlValue::Null => query.bind(Option::<String>::None),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Int(v) => query.bind(*v),
        SqlValue::UInt(v) => query.bind(*v),
        SqlValue::Float(v) => query.bind(*v),
        SqlValue::Decimal(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.as_str()),
        SqlValue::Bytes(v) => query.bind(v.as_slice()),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::Time(v) => query.bind(*v),
        SqlValue::DateTime(v) => query.bind(*v),
    }
}

/// `INSERT .. ON DUPLICATE KEY UPDATE` touching every listed column
pub fn upsert_statement(table: &str, columns: &[String]) -> String {
    let quoted: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let updates: Vec<String> = quoted.iter().map(|c| format!("{c} = VALUES({c})")).collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON DUPLICATE KEY UPDATE {}",
        quote_ident(table),
        quoted.join(", "),
        placeholders,
        updates.join(", ")
    )
}

/// Plain `INSERT` for tables that cannot see duplicates, such as a freshly
/// created temporary table
pub fn insert_statement(table: &str, columns: &[String]) -> String {
    let quoted: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        quoted.join(", "),
        placeholders
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_upsert_statement_updates_every_column() {
        assert_eq!(
            upsert_statement("users", &cols(&["id", "email"])),
            "INSERT INTO `users` (`id`, `email`) VALUES (?, ?) \
             ON DUPLICATE KEY UPDATE `id` = VALUES(`id`), `email` = VALUES(`email`)"
        );
    }

    #[test]
    fn test_insert_statement() {
        assert_eq!(
            insert_statement("temp_users_1", &cols(&["id"])),
            "INSERT INTO `temp_users_1` (`id`) VALUES (?)"
        );
    }

    #[test]
    fn test_statements_quote_awkward_identifiers() {
        let sql = upsert_statement("odd`table", &cols(&["select"]));
        assert!(sql.starts_with("INSERT INTO `odd``table` (`select`)"));
    }
}
