//! Batch row replication
//!
//! Rows are read from the source in fixed-size pages and written to the
//! target as row-wise upserts. Each page is applied inside its own target
//! transaction; a failed page is retried with exponential backoff, each
//! attempt on a fresh transaction. Exhausting the retries fails the run and
//! skips the remaining pages.

use std::future::Future;
use std::time::Duration;

use chrono::NaiveDateTime;
use sqlx::mysql::{MySqlConnection, MySqlPool};
use sqlx::{Connection, Row};
use tracing::{debug, info, warn};

use crate::config::SyncMode;
use crate::db::DbContext;
use crate::error::{Error, Result};
use crate::schema::ddl::quote_ident;
use crate::sync::task::SyncTask;
use crate::sync::value::{self, SqlValue};

const RETRY_COUNT: u32 = 3;
const BASE_DELAY: Duration = Duration::from_millis(100);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Backoff before the next attempt: base delay doubled per failed attempt,
/// capped
fn retry_delay(attempt: u32) -> Duration {
    let delay = BASE_DELAY * 2u32.saturating_pow(attempt.saturating_sub(1));
    delay.min(MAX_RETRY_DELAY)
}

/// Run `op` up to the retry limit, sleeping between attempts
async fn with_retries<T, F, Fut>(label: &str, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < RETRY_COUNT => {
                let delay = retry_delay(attempt);
                warn!(
                    %label,
                    attempt,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Replicate one table pair, returning the number of rows written
pub async fn replicate(
    ctx: &DbContext,
    task: &SyncTask,
    mode: SyncMode,
    update_column: Option<&str>,
) -> Result<u64> {
    // The incremental floor is read once up front; rows written mid-run move
    // the target maximum and must not shrink later pages.
    let floor = match (mode, update_column) {
        (SyncMode::Incremental, Some(column)) => {
            target_max(&ctx.target, &task.target_table, column).await?
        }
        _ => None,
    };

    let total = source_count(&ctx.source, &task.source_table, update_column, floor).await?;
    if total == 0 {
        debug!(table = %task.source_table, "No rows to replicate");
        return Ok(0);
    }

    let batch = task.batch_size as u64;
    let pages = total.div_ceil(batch);
    let mut written = 0u64;

    info!(
        table = %task.source_table,
        rows = total,
        pages,
        batch_size = task.batch_size,
        incremental = floor.is_some(),
        "Replicating"
    );

    for page in 0..pages {
        let rows = fetch_page(
            &ctx.source,
            &task.source_table,
            update_column,
            floor,
            batch,
            page * batch,
        )
        .await?;

        if rows.is_empty() {
            break;
        }

        written += apply_page(&ctx.target, &task.target_table, &rows).await?;
    }

    info!(table = %task.target_table, rows = written, "Replication finished");
    Ok(written)
}

async fn target_max(
    pool: &MySqlPool,
    table: &str,
    column: &str,
) -> Result<Option<NaiveDateTime>> {
    let sql = format!(
        "SELECT MAX({}) FROM {}",
        quote_ident(column),
        quote_ident(table)
    );

    let row = sqlx::query(&sql)
        .fetch_one(pool)
        .await
        .map_err(|e| Error::Replication(format!("failed to read target floor: {}", e)))?;

    row.try_get::<Option<NaiveDateTime>, _>(0)
        .map_err(|e| Error::Replication(format!("target floor unreadable: {}", e)))
}

async fn source_count(
    pool: &MySqlPool,
    table: &str,
    update_column: Option<&str>,
    floor: Option<NaiveDateTime>,
) -> Result<u64> {
    let mut sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
    if let (Some(column), Some(_)) = (update_column, floor) {
        sql.push_str(&format!(" WHERE {} > ?", quote_ident(column)));
    }

    let mut query = sqlx::query(&sql);
    if let Some(floor) = floor.filter(|_| update_column.is_some()) {
        query = query.bind(floor);
    }

    let row = query
        .fetch_one(pool)
        .await
        .map_err(|e| Error::Replication(format!("failed to count '{}': {}", table, e)))?;

    let count: i64 = row
        .try_get(0)
        .map_err(|e| Error::Replication(format!("count of '{}' unreadable: {}", table, e)))?;

    Ok(count as u64)
}

async fn fetch_page(
    pool: &MySqlPool,
    table: &str,
    update_column: Option<&str>,
    floor: Option<NaiveDateTime>,
    limit: u64,
    offset: u64,
) -> Result<Vec<Vec<(String, SqlValue)>>> {
    let mut sql = format!("SELECT * FROM {}", quote_ident(table));
    if let (Some(column), Some(_)) = (update_column, floor) {
        sql.push_str(&format!(" WHERE {} > ?", quote_ident(column)));
    }
    sql.push_str(" LIMIT ? OFFSET ?");

    let mut query = sqlx::query(&sql);
    if let Some(floor) = floor.filter(|_| update_column.is_some()) {
        query = query.bind(floor);
    }
    let query = query.bind(limit as i64).bind(offset as i64);

    let rows = query
        .fetch_all(pool)
        .await
        .map_err(|e| Error::Replication(format!("failed to read page of '{}': {}", table, e)))?;

    rows.iter().map(value::decode_row).collect()
}

/// Upsert one page inside a transaction, retried as a whole
async fn apply_page(
    pool: &MySqlPool,
    table: &str,
    rows: &[Vec<(String, SqlValue)>],
) -> Result<u64> {
    let columns: Vec<String> = rows[0].iter().map(|(name, _)| name.clone()).collect();
    let stmt = value::upsert_statement(table, &columns);

    with_retries("apply batch", |_attempt| {
        let stmt = stmt.as_str();
        let pool = &*pool;
        async move {
            let mut conn = pool.acquire().await.map_err(|e| {
                Error::Replication(format!("failed to acquire connection: {}", e))
            })?;

            let result = upsert_page(&mut conn, table, stmt, rows).await;

            // FOREIGN_KEY_CHECKS is session-scoped; restore it before the
            // connection returns to the pool.
            if let Err(e) = sqlx::query("SET FOREIGN_KEY_CHECKS = 1")
                .execute(&mut *conn)
                .await
            {
                warn!(error = %e, "Could not re-enable foreign key checks");
            }

            result
        }
    })
    .await
}

async fn upsert_page(
    conn: &mut MySqlConnection,
    table: &str,
    stmt: &str,
    rows: &[Vec<(String, SqlValue)>],
) -> Result<u64> {
    let mut tx = conn
        .begin()
        .await
        .map_err(|e| Error::Replication(format!("failed to open transaction: {}", e)))?;

    // Rows may arrive before their referenced parents within a run.
    if let Err(e) = sqlx::query("SET FOREIGN_KEY_CHECKS = 0")
        .execute(&mut *tx)
        .await
    {
        warn!(error = %e, "Could not disable foreign key checks");
    }

    let mut affected = 0u64;
    for row in rows {
        let mut query = sqlx::query(stmt);
        for (_, cell) in row {
            query = value::bind_value(query, cell);
        }
        let result = query
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Replication(format!("upsert into '{}' failed: {}", table, e)))?;
        affected += result.rows_affected();
    }

    tx.commit()
        .await
        .map_err(|e| Error::Replication(format!("commit failed: {}", e)))?;

    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[rstest]
    #[case(1, 100)]
    #[case(2, 200)]
    #[case(3, 400)]
    #[case(10, 2000)]
    fn test_retry_delay_doubles_and_caps(#[case] attempt: u32, #[case] expected_ms: u64) {
        assert_eq!(retry_delay(attempt), Duration::from_millis(expected_ms));
    }

    #[tokio::test]
    async fn test_with_retries_recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);

        let result = with_retries("test op", |_| {
            let calls = &calls;
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::Replication("transient".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_with_retries_gives_up_after_limit() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_retries("test op", |_| {
            let calls = &calls;
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Replication("persistent".to_string()))
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), RETRY_COUNT);
    }

    #[rstest]
    #[case(0, 100, 0)]
    #[case(1, 100, 1)]
    #[case(100, 100, 1)]
    #[case(101, 100, 2)]
    #[case(250, 100, 3)]
    fn test_page_count(#[case] total: u64, #[case] batch: u64, #[case] expected: u64) {
        assert_eq!(total.div_ceil(batch), expected);
    }
}
