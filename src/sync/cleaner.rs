//! Orphan cleanup
//!
//! Upserts never remove anything, so after replication the target may hold
//! rows the source has deleted. The live source key set is staged into a
//! temporary table on the target and everything the stage does not contain
//! is deleted, all inside one transaction.

use sqlx::mysql::MySqlConnection;
use sqlx::{Connection, Row};
use tracing::{debug, info, warn};

use crate::db::DbContext;
use crate::error::{Error, Result};
use crate::schema::ddl::quote_ident;
use crate::sync::task::SyncTask;
use crate::sync::value;

/// Delete target rows absent from the source, returning how many were
/// removed
pub async fn cleanup(ctx: &DbContext, task: &SyncTask) -> Result<u64> {
    let pk = primary_key_column(ctx, &task.target_table).await?;

    let target_rows = count(ctx, &task.target_table).await?;
    if target_rows == 0 {
        return Ok(0);
    }

    // Nanosecond suffix keeps concurrent runs against different tables from
    // colliding on the stage name.
    let stage = format!(
        "temp_{}_{}",
        task.target_table,
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    );

    let mut conn = ctx
        .target
        .acquire()
        .await
        .map_err(|e| Error::Cleanup(format!("failed to acquire connection: {}", e)))?;

    let result = cleanup_in_tx(ctx, task, &stage, &pk, &mut conn).await;

    // FOREIGN_KEY_CHECKS is session-scoped; restore it before the connection
    // returns to the pool.
    if let Err(e) = sqlx::query("SET FOREIGN_KEY_CHECKS = 1")
        .execute(&mut *conn)
        .await
    {
        warn!(error = %e, "Could not re-enable foreign key checks");
    }

    let deleted = result?;

    if deleted > 0 {
        info!(table = %task.target_table, rows = deleted, "Removed orphaned rows");
    }

    Ok(deleted)
}

/// Stage, anti-join delete and stage drop in one target transaction
async fn cleanup_in_tx(
    ctx: &DbContext,
    task: &SyncTask,
    stage: &str,
    pk: &str,
    conn: &mut MySqlConnection,
) -> Result<u64> {
    let mut tx = conn
        .begin()
        .await
        .map_err(|e| Error::Cleanup(format!("failed to open transaction: {}", e)))?;

    if let Err(e) = sqlx::query("SET FOREIGN_KEY_CHECKS = 0")
        .execute(&mut *tx)
        .await
    {
        warn!(error = %e, "Could not disable foreign key checks");
    }

    let create = format!(
        "CREATE TEMPORARY TABLE {} LIKE {}",
        quote_ident(stage),
        quote_ident(&task.target_table)
    );
    sqlx::query(&create)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Cleanup(format!("failed to create stage table: {}", e)))?;

    stage_source_rows(ctx, task, stage, &mut tx).await?;

    let delete = format!(
        "DELETE t1 FROM {target} t1 \
         LEFT JOIN {stage} t2 ON t1.{pk} = t2.{pk} \
         WHERE t2.{pk} IS NULL",
        target = quote_ident(&task.target_table),
        stage = quote_ident(stage),
        pk = quote_ident(pk)
    );
    let deleted = sqlx::query(&delete)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Cleanup(format!("anti-join delete failed: {}", e)))?
        .rows_affected();

    let drop = format!("DROP TEMPORARY TABLE {}", quote_ident(stage));
    sqlx::query(&drop)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Cleanup(format!("failed to drop stage table: {}", e)))?;

    tx.commit()
        .await
        .map_err(|e| Error::Cleanup(format!("commit failed: {}", e)))?;

    Ok(deleted)
}

/// Copy the current source rows into the stage table in batches
///
/// The stage mirrors the target's structure, so full rows are staged rather
/// than key columns alone; NOT NULL columns without defaults would reject a
/// key-only insert.
async fn stage_source_rows(
    ctx: &DbContext,
    task: &SyncTask,
    stage: &str,
    tx: &mut sqlx::Transaction<'_, sqlx::MySql>,
) -> Result<()> {
    let select = format!(
        "SELECT * FROM {} LIMIT ? OFFSET ?",
        quote_ident(&task.source_table)
    );

    let batch = task.batch_size as i64;
    let mut offset = 0i64;

    loop {
        let rows = sqlx::query(&select)
            .bind(batch)
            .bind(offset)
            .fetch_all(&ctx.source)
            .await
            .map_err(|e| Error::Cleanup(format!("failed to read source rows: {}", e)))?;

        if rows.is_empty() {
            break;
        }
        let page_len = rows.len() as i64;

        for row in &rows {
            let cells = value::decode_row(row)
                .map_err(|e| Error::Cleanup(format!("failed to decode source row: {}", e)))?;
            let columns: Vec<String> = cells.iter().map(|(name, _)| name.clone()).collect();
            let insert = value::insert_statement(stage, &columns);

            let mut query = sqlx::query(&insert);
            for (_, cell) in &cells {
                query = value::bind_value(query, cell);
            }
            query
                .execute(&mut **tx)
                .await
                .map_err(|e| Error::Cleanup(format!("failed to stage source row: {}", e)))?;
        }

        offset += page_len;
        if page_len < batch {
            break;
        }
    }

    debug!(stage = %stage, "Staged source rows");
    Ok(())
}

async fn count(ctx: &DbContext, table: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
    let row = sqlx::query(&sql)
        .fetch_one(&ctx.target)
        .await
        .map_err(|e| Error::Cleanup(format!("failed to count '{}': {}", table, e)))?;

    row.try_get(0)
        .map_err(|e| Error::Cleanup(format!("count of '{}' unreadable: {}", table, e)))
}

/// The first primary-key column of the target table
///
/// Tables without a declared primary key fall back to an `id` column; the
/// anti-join is only correct when that column is actually unique.
async fn primary_key_column(ctx: &DbContext, table: &str) -> Result<String> {
    let sql = r#"
        SELECT COLUMN_NAME AS column_name
        FROM INFORMATION_SCHEMA.COLUMNS
        WHERE TABLE_SCHEMA = DATABASE()
          AND TABLE_NAME = ?
          AND COLUMN_KEY = 'PRI'
        ORDER BY ORDINAL_POSITION
        LIMIT 1
    "#;

    let row = sqlx::query(sql)
        .bind(table)
        .fetch_optional(&ctx.target)
        .await
        .map_err(|e| Error::Cleanup(format!("failed to resolve primary key: {}", e)))?;

    match row {
        Some(row) => row
            .try_get("column_name")
            .map_err(|e| Error::Cleanup(format!("primary key unreadable: {}", e))),
        None => {
            warn!(table = %table, "No primary key declared, assuming an 'id' column");
            Ok("id".to_string())
        }
    }
}
