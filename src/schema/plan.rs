//! Sync plan artifacts
//!
//! A [`SyncPlan`] carries the ordered differences for one table and can be
//! persisted as a JSON report or an executable SQL script. A
//! [`MergedSyncPlan`] aggregates every non-empty per-table plan into one
//! combined pair of artifacts.

use std::fs;
use std::path::Path;

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::diff::Difference;

/// Differences found for a single table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPlan {
    #[serde(rename = "table")]
    pub table_name: String,
    #[serde(rename = "diff")]
    pub differences: Vec<Difference>,
    pub status: String,
}

impl SyncPlan {
    pub fn new(table_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            differences: Vec::new(),
            status: "pending".to_string(),
        }
    }

    pub fn push(&mut self, difference: Difference) {
        self.differences.push(difference);
    }

    pub fn is_empty(&self) -> bool {
        self.differences.is_empty()
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Render the differences as an executable script wrapped in a
    /// transaction
    pub fn render_sql(&self) -> String {
        let mut out = String::new();

        out.push_str(&format!("-- Sync script for table: {}\n", self.table_name));
        out.push_str(&format!(
            "-- Generated at: {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        out.push_str(&format!("-- Differences: {}\n\n", self.differences.len()));
        out.push_str("START TRANSACTION;\n\n");

        for (i, diff) in self.differences.iter().enumerate() {
            out.push_str(&format!("-- {}. {}: {}\n", i + 1, diff.kind, diff.description));
            out.push_str(&diff.sql);
            out.push_str(";\n\n");
        }

        out.push_str("COMMIT;\n");
        out
    }

    pub fn save_sql(&self, path: &Path) -> Result<()> {
        fs::write(path, self.render_sql())?;
        Ok(())
    }
}

/// Every per-table plan rolled into a single artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedSyncPlan {
    pub tables: Vec<SyncPlan>,
    pub total_tables: usize,
    #[serde(rename = "total_differences")]
    pub total_diffs: usize,
    pub status: String,
}

impl MergedSyncPlan {
    /// Merge the non-empty plans, keeping their original order
    pub fn from_plans(plans: Vec<SyncPlan>) -> Self {
        let tables: Vec<SyncPlan> = plans.into_iter().filter(|p| !p.is_empty()).collect();
        let total_tables = tables.len();
        let total_diffs = tables.iter().map(|p| p.differences.len()).sum();

        Self {
            tables,
            total_tables,
            total_diffs,
            status: "completed".to_string(),
        }
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn save_sql(&self, path: &Path) -> Result<()> {
        let mut out = String::new();

        out.push_str("-- Merged sync script\n");
        out.push_str(&format!(
            "-- Generated at: {}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        ));
        out.push_str(&format!(
            "-- Tables: {}, differences: {}\n\n",
            self.total_tables, self.total_diffs
        ));

        for plan in &self.tables {
            out.push_str(&plan.render_sql());
            out.push('\n');
        }

        fs::write(path, out)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::diff::DifferenceKind;
    use pretty_assertions::assert_eq;

    fn sample_diff() -> Difference {
        Difference {
            kind: DifferenceKind::AddColumn,
            name: "email".to_string(),
            description: "Column 'email' (varchar(255)) exists in source but not in target"
                .to_string(),
            sql: "ALTER TABLE `users` ADD COLUMN `email` varchar(255) NOT NULL".to_string(),
        }
    }

    #[test]
    fn test_json_field_names() {
        let mut plan = SyncPlan::new("users");
        plan.push(sample_diff());

        let value = serde_json::to_value(&plan).unwrap();

        assert_eq!(value["table"], "users");
        assert_eq!(value["status"], "pending");
        assert_eq!(value["diff"][0]["type"], "ADD_COLUMN");
        assert_eq!(value["diff"][0]["name"], "email");
        assert!(value["diff"][0]["sql"].as_str().unwrap().starts_with("ALTER TABLE"));
    }

    #[test]
    fn test_render_sql_is_transactional_and_numbered() {
        let mut plan = SyncPlan::new("users");
        plan.push(sample_diff());
        plan.push(Difference {
            kind: DifferenceKind::DropColumn,
            name: "legacy".to_string(),
            description: "Column 'legacy' exists in target but not in source".to_string(),
            sql: "ALTER TABLE `users` DROP COLUMN `legacy`".to_string(),
        });

        let sql = plan.render_sql();

        assert!(sql.contains("START TRANSACTION;"));
        assert!(sql.contains("-- 1. ADD_COLUMN:"));
        assert!(sql.contains("-- 2. DROP_COLUMN:"));
        assert!(sql.contains("ALTER TABLE `users` DROP COLUMN `legacy`;\n"));
        assert!(sql.trim_end().ends_with("COMMIT;"));
    }

    #[test]
    fn test_merged_plan_drops_empty_tables() {
        let mut with_diffs = SyncPlan::new("users");
        with_diffs.push(sample_diff());
        let empty = SyncPlan::new("orders");

        let merged = MergedSyncPlan::from_plans(vec![with_diffs, empty]);

        assert_eq!(merged.total_tables, 1);
        assert_eq!(merged.total_diffs, 1);
        assert_eq!(merged.status, "completed");

        let value = serde_json::to_value(&merged).unwrap();
        assert_eq!(value["total_differences"], 1);
    }

    #[test]
    fn test_save_round_trips_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut plan = SyncPlan::new("users");
        plan.push(sample_diff());

        let json_path = dir.path().join("users.json");
        let sql_path = dir.path().join("users.sql");
        plan.save_json(&json_path).unwrap();
        plan.save_sql(&sql_path).unwrap();

        let loaded: SyncPlan =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(loaded.table_name, "users");
        assert_eq!(loaded.differences.len(), 1);

        let sql = std::fs::read_to_string(&sql_path).unwrap();
        assert!(sql.contains("-- Sync script for table: users"));
    }
}
