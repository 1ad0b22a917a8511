//! Structure comparison driver
//!
//! Owns a pool pair, snapshots both sides and turns the diff into per-table
//! [`SyncPlan`]s. Comparison is read-only; nothing is ever executed against
//! either database.

use sqlx::mysql::MySqlPool;
use tracing::{error, info};

use crate::config::DbConnection;
use crate::db::context::connect_pool;
use crate::error::Result;
use crate::schema::diff::diff_tables;
use crate::schema::extractor;
use crate::schema::plan::SyncPlan;

pub struct Comparer {
    source: MySqlPool,
    target: MySqlPool,
}

impl Comparer {
    pub fn new(source: MySqlPool, target: MySqlPool) -> Self {
        Self { source, target }
    }

    /// Connect both sides from connection settings
    pub async fn connect(source: &DbConnection, target: &DbConnection) -> Result<Self> {
        Ok(Self {
            source: connect_pool(source).await?,
            target: connect_pool(target).await?,
        })
    }

    /// Compare one table present on both sides
    pub async fn compare(&self, table_name: &str) -> Result<SyncPlan> {
        let source = extractor::snapshot(&self.source, table_name).await?;
        let target = extractor::snapshot(&self.target, table_name).await?;

        let mut plan = SyncPlan::new(table_name);
        for diff in diff_tables(&source, &target) {
            plan.push(diff);
        }

        info!(
            table = table_name,
            differences = plan.differences.len(),
            "Compared table"
        );

        Ok(plan)
    }

    /// Compare every source table
    ///
    /// A table that fails to compare, including one the target does not
    /// have, is logged and skipped; the remaining tables are still compared.
    pub async fn compare_all(&self) -> Result<Vec<SyncPlan>> {
        let source_tables = extractor::all_table_names(&self.source).await?;

        let mut results = Vec::new();
        for table in source_tables {
            let result = self.compare(&table).await;
            results.push((table, result));
        }

        Ok(collect_plans(results))
    }

    /// Target-only tables together with their CREATE TABLE statements
    ///
    /// These tables have no source counterpart to diff against; their full
    /// definition is captured instead so an operator can decide what to do
    /// with them.
    pub async fn extra_tables(&self) -> Result<Vec<(String, String)>> {
        let source_tables = extractor::all_table_names(&self.source).await?;
        let target_tables = extractor::all_table_names(&self.target).await?;

        let mut extras = Vec::new();
        for table in target_tables {
            if source_tables.contains(&table) {
                continue;
            }
            let create_sql = extractor::create_table_sql(&self.target, &table).await?;
            info!(table = %table, "Found target-only table");
            extras.push((table, create_sql));
        }

        Ok(extras)
    }
}

/// Keep the successful comparisons, logging and skipping each failed table
fn collect_plans(results: Vec<(String, Result<SyncPlan>)>) -> Vec<SyncPlan> {
    let mut plans = Vec::new();
    for (table, result) in results {
        match result {
            Ok(plan) => plans.push(plan),
            Err(e) => error!(table = %table, error = %e, "Skipping table, comparison failed"),
        }
    }
    plans
}
