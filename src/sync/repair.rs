//! Pre-sync schema repair
//!
//! Replication binds every source column by name, so columns present in the
//! source but missing from the target are added to the target first. Columns
//! the target has beyond the source are left untouched.

use std::collections::HashSet;

use tracing::info;

use crate::db::DbContext;
use crate::error::{Error, Result};
use crate::schema::{ddl, extractor};

/// Add source-only columns to the target, returning how many were added
pub async fn ensure_columns(
    ctx: &DbContext,
    source_table: &str,
    target_table: &str,
) -> Result<usize> {
    let source = extractor::snapshot(&ctx.source, source_table).await?;
    let target_cols: HashSet<String> = extractor::column_names(&ctx.target, target_table)
        .await?
        .into_iter()
        .collect();

    let mut added = 0;

    for column in &source.columns {
        if target_cols.contains(&column.name) {
            continue;
        }

        let sql = ddl::add_column(target_table, column);
        sqlx::query(&sql).execute(&ctx.target).await.map_err(|e| {
            Error::SchemaRepair(format!(
                "failed to add column '{}' to '{}': {}",
                column.name, target_table, e
            ))
        })?;

        info!(
            table = target_table,
            column = %column.name,
            "Added missing column to target"
        );
        added += 1;
    }

    Ok(added)
}
