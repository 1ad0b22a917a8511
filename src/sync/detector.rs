//! Change detection
//!
//! Decides per run whether a table pair needs replication at all. Three
//! strategies exist behind one trait; the configured strategy is re-resolved
//! on every run so a column dropped mid-flight downgrades the pair to the
//! checksum strategy instead of failing it.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::mysql::MySqlPool;
use sqlx::Row;
use tracing::{debug, warn};

use crate::config::{CheckMethod, TablePairConfig};
use crate::db::DbContext;
use crate::error::{Error, Result};
use crate::schema::extractor;

#[async_trait]
pub trait ChangeCheck: Send + Sync {
    async fn needs_sync(&self, ctx: &DbContext, source: &str, target: &str) -> Result<bool>;
}

/// `CHECKSUM TABLE` on both sides; any inequality means sync
pub struct ChecksumCheck;

#[async_trait]
impl ChangeCheck for ChecksumCheck {
    async fn needs_sync(&self, ctx: &DbContext, source: &str, target: &str) -> Result<bool> {
        let src = table_checksum(&ctx.source, source).await?;
        let tgt = table_checksum(&ctx.target, target).await?;

        debug!(source_checksum = ?src, target_checksum = ?tgt, table = source, "Checksum check");
        Ok(src != tgt)
    }
}

async fn table_checksum(pool: &MySqlPool, table: &str) -> Result<Option<i64>> {
    let sql = format!(
        "CHECKSUM TABLE {}",
        crate::schema::ddl::quote_ident(table)
    );

    let row = sqlx::query(&sql)
        .fetch_one(pool)
        .await
        .map_err(|e| Error::Detection(format!("checksum of '{}' failed: {}", table, e)))?;

    row.try_get::<Option<i64>, _>("Checksum")
        .map_err(|e| Error::Detection(format!("checksum of '{}' unreadable: {}", table, e)))
}

/// Row-count comparison; cheap but blind to in-place updates
pub struct CountCheck;

#[async_trait]
impl ChangeCheck for CountCheck {
    async fn needs_sync(&self, ctx: &DbContext, source: &str, target: &str) -> Result<bool> {
        let src = row_count(&ctx.source, source).await?;
        let tgt = row_count(&ctx.target, target).await?;

        debug!(source_rows = src, target_rows = tgt, table = source, "Count check");
        Ok(src != tgt)
    }
}

async fn row_count(pool: &MySqlPool, table: &str) -> Result<i64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {}",
        crate::schema::ddl::quote_ident(table)
    );

    let row = sqlx::query(&sql)
        .fetch_one(pool)
        .await
        .map_err(|e| Error::Detection(format!("count of '{}' failed: {}", table, e)))?;

    row.try_get::<i64, _>(0)
        .map_err(|e| Error::Detection(format!("count of '{}' unreadable: {}", table, e)))
}

/// Compares `MAX(update_column)` on both sides
pub struct UpdateTimeCheck {
    pub column: String,
}

#[async_trait]
impl ChangeCheck for UpdateTimeCheck {
    async fn needs_sync(&self, ctx: &DbContext, source: &str, target: &str) -> Result<bool> {
        let src = max_timestamp(&ctx.source, source, &self.column).await?;
        let tgt = max_timestamp(&ctx.target, target, &self.column).await?;

        debug!(source_max = ?src, target_max = ?tgt, table = source, "Update-time check");
        Ok(src != tgt)
    }
}

async fn max_timestamp(
    pool: &MySqlPool,
    table: &str,
    column: &str,
) -> Result<Option<NaiveDateTime>> {
    let sql = format!(
        "SELECT MAX({}) FROM {}",
        crate::schema::ddl::quote_ident(column),
        crate::schema::ddl::quote_ident(table)
    );

    let row = sqlx::query(&sql)
        .fetch_one(pool)
        .await
        .map_err(|e| Error::Detection(format!("max timestamp of '{}' failed: {}", table, e)))?;

    row.try_get::<Option<NaiveDateTime>, _>(0)
        .map_err(|e| Error::Detection(format!("max timestamp of '{}' unreadable: {}", table, e)))
}

/// The strategy picked for one run, plus the timestamp column that survived
/// verification (used by incremental replication)
pub struct ResolvedCheck {
    pub check: Box<dyn ChangeCheck>,
    pub update_column: Option<String>,
}

/// Pick the effective method for a pair
///
/// `update_time` is only effective when a column is configured; strategy
/// resolution verifies the column exists in both tables before honoring it.
pub fn effective_method(pair: &TablePairConfig) -> CheckMethod {
    match pair.check_method.unwrap_or(CheckMethod::Checksum) {
        CheckMethod::UpdateTime if pair.update_field.as_deref().unwrap_or("").is_empty() => {
            CheckMethod::Checksum
        }
        method => method,
    }
}

/// Resolve the configured strategy against the live catalogs
pub async fn resolve(ctx: &DbContext, pair: &TablePairConfig) -> Result<ResolvedCheck> {
    match effective_method(pair) {
        CheckMethod::Count => Ok(ResolvedCheck {
            check: Box::new(CountCheck),
            update_column: None,
        }),
        CheckMethod::Checksum => Ok(ResolvedCheck {
            check: Box::new(ChecksumCheck),
            update_column: None,
        }),
        CheckMethod::UpdateTime => {
            let source_cols = extractor::column_names(&ctx.source, &pair.source).await?;
            Ok(resolve_update_time(pair, &source_cols))
        }
    }
}

/// Honor the update-time strategy only when the source actually carries the
/// configured column; the target gets it through schema repair
fn resolve_update_time(pair: &TablePairConfig, source_columns: &[String]) -> ResolvedCheck {
    let column = pair.update_field.clone().unwrap_or_default();

    if source_columns.contains(&column) {
        ResolvedCheck {
            check: Box::new(UpdateTimeCheck {
                column: column.clone(),
            }),
            update_column: Some(column),
        }
    } else {
        warn!(
            table = %pair.source,
            column = %column,
            "Update-time column missing in source, falling back to checksum"
        );
        ResolvedCheck {
            check: Box::new(ChecksumCheck),
            update_column: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn pair(check_method: Option<CheckMethod>, update_field: Option<&str>) -> TablePairConfig {
        TablePairConfig {
            source: "users".to_string(),
            target: "users".to_string(),
            check_method,
            update_field: update_field.map(|s| s.to_string()),
        }
    }

    #[rstest]
    #[case(None, None, CheckMethod::Checksum)]
    #[case(Some(CheckMethod::Count), None, CheckMethod::Count)]
    #[case(Some(CheckMethod::Checksum), None, CheckMethod::Checksum)]
    #[case(Some(CheckMethod::UpdateTime), Some("updated_at"), CheckMethod::UpdateTime)]
    fn test_effective_method(
        #[case] method: Option<CheckMethod>,
        #[case] field: Option<&str>,
        #[case] expected: CheckMethod,
    ) {
        assert_eq!(effective_method(&pair(method, field)), expected);
    }

    #[test]
    fn test_update_time_column_verified_against_source_only() {
        let pair = pair(Some(CheckMethod::UpdateTime), Some("updated_at"));
        let source_columns = vec!["id".to_string(), "updated_at".to_string()];

        let resolved = resolve_update_time(&pair, &source_columns);
        assert_eq!(resolved.update_column.as_deref(), Some("updated_at"));
    }

    #[test]
    fn test_missing_source_column_falls_back_to_checksum() {
        let pair = pair(Some(CheckMethod::UpdateTime), Some("updated_at"));
        let source_columns = vec!["id".to_string(), "name".to_string()];

        let resolved = resolve_update_time(&pair, &source_columns);
        assert_eq!(resolved.update_column, None);
    }

    #[test]
    fn test_update_time_without_field_degrades_to_checksum() {
        assert_eq!(
            effective_method(&pair(Some(CheckMethod::UpdateTime), None)),
            CheckMethod::Checksum
        );
        assert_eq!(
            effective_method(&pair(Some(CheckMethod::UpdateTime), Some(""))),
            CheckMethod::Checksum
        );
    }
}
