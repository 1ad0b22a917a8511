//! Structure diffing
//!
//! Pure comparison of two snapshots into an ordered list of differences.
//! Ordering is deterministic: column differences in source column order
//! followed by target-only drops, then index differences the same way, then
//! primary-key changes. The source is authoritative; the emitted DDL drives
//! the target toward it.

use serde::{Deserialize, Serialize};

use crate::schema::ddl;
use crate::schema::types::{ColumnSnapshot, TableSnapshot};

/// Category tag carried on every difference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DifferenceKind {
    AddColumn,
    ModifyColumn,
    DropColumn,
    AddIndex,
    ModifyIndex,
    DropIndex,
    AddPrimaryKey,
    DropPrimaryKey,
}

impl std::fmt::Display for DifferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DifferenceKind::AddColumn => "ADD_COLUMN",
            DifferenceKind::ModifyColumn => "MODIFY_COLUMN",
            DifferenceKind::DropColumn => "DROP_COLUMN",
            DifferenceKind::AddIndex => "ADD_INDEX",
            DifferenceKind::ModifyIndex => "MODIFY_INDEX",
            DifferenceKind::DropIndex => "DROP_INDEX",
            DifferenceKind::AddPrimaryKey => "ADD_PRIMARY_KEY",
            DifferenceKind::DropPrimaryKey => "DROP_PRIMARY_KEY",
        };
        f.write_str(s)
    }
}

/// One structural difference with its remediation statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Difference {
    #[serde(rename = "type")]
    pub kind: DifferenceKind,
    /// The column or index the difference concerns
    pub name: String,
    pub description: String,
    /// DDL that resolves the difference when applied to the target
    pub sql: String,
}

/// Whether two column definitions should be treated as diverged
///
/// Comments are deliberately ignored; a comment-only change never produces
/// a difference.
fn columns_differ(source: &ColumnSnapshot, target: &ColumnSnapshot) -> bool {
    source.column_type != target.column_type
        || source.nullable != target.nullable
        || source.extra != target.extra
        || source.default != target.default
        || source.on_update_current_timestamp != target.on_update_current_timestamp
}

/// Compare two snapshots, producing the ordered difference list
pub fn diff_tables(source: &TableSnapshot, target: &TableSnapshot) -> Vec<Difference> {
    let mut diffs = Vec::new();
    let table = source.name.as_str();

    // Columns, in source order.
    for src_col in &source.columns {
        match target.column(&src_col.name) {
            None => diffs.push(Difference {
                kind: DifferenceKind::AddColumn,
                name: src_col.name.clone(),
                description: format!(
                    "Column '{}' ({}) exists in source but not in target",
                    src_col.name, src_col.column_type
                ),
                sql: ddl::add_column(table, src_col),
            }),
            Some(tgt_col) if columns_differ(src_col, tgt_col) => diffs.push(Difference {
                kind: DifferenceKind::ModifyColumn,
                name: src_col.name.clone(),
                description: format!(
                    "Column '{}' differs: source is {}, target is {}",
                    src_col.name, src_col.column_type, tgt_col.column_type
                ),
                sql: ddl::modify_column(table, src_col),
            }),
            Some(_) => {}
        }
    }

    for tgt_col in &target.columns {
        if source.column(&tgt_col.name).is_none() {
            diffs.push(Difference {
                kind: DifferenceKind::DropColumn,
                name: tgt_col.name.clone(),
                description: format!(
                    "Column '{}' exists in target but not in source",
                    tgt_col.name
                ),
                sql: ddl::drop_column(table, &tgt_col.name),
            });
        }
    }

    // Secondary indexes, matched by name. A changed index becomes a drop
    // followed by a re-create with the source definition.
    for src_idx in &source.indexes {
        match target.index(&src_idx.name) {
            None => diffs.push(Difference {
                kind: DifferenceKind::AddIndex,
                name: src_idx.name.clone(),
                description: format!(
                    "Index '{}' on ({}) exists in source but not in target",
                    src_idx.name,
                    src_idx.columns.join(", ")
                ),
                sql: ddl::create_index(table, src_idx),
            }),
            Some(tgt_idx) if src_idx != tgt_idx => {
                diffs.push(Difference {
                    kind: DifferenceKind::DropIndex,
                    name: src_idx.name.clone(),
                    description: format!(
                        "Index '{}' definition differs; dropping target version",
                        src_idx.name
                    ),
                    sql: ddl::drop_index(table, &src_idx.name),
                });
                diffs.push(Difference {
                    kind: DifferenceKind::AddIndex,
                    name: src_idx.name.clone(),
                    description: format!(
                        "Index '{}' re-created with source definition on ({})",
                        src_idx.name,
                        src_idx.columns.join(", ")
                    ),
                    sql: ddl::create_index(table, src_idx),
                });
            }
            Some(_) => {}
        }
    }

    for tgt_idx in &target.indexes {
        if source.index(&tgt_idx.name).is_none() {
            diffs.push(Difference {
                kind: DifferenceKind::DropIndex,
                name: tgt_idx.name.clone(),
                description: format!(
                    "Index '{}' exists in target but not in source",
                    tgt_idx.name
                ),
                sql: ddl::drop_index(table, &tgt_idx.name),
            });
        }
    }

    // Primary key.
    match (&source.primary_key, &target.primary_key) {
        (None, None) => {}
        (None, Some(_)) => diffs.push(Difference {
            kind: DifferenceKind::DropPrimaryKey,
            name: "PRIMARY".to_string(),
            description: "Primary key exists in target but not in source".to_string(),
            sql: ddl::drop_primary_key(table),
        }),
        (Some(src_pk), None) => diffs.push(Difference {
            kind: DifferenceKind::AddPrimaryKey,
            name: "PRIMARY".to_string(),
            description: format!("Primary key ({}) missing in target", src_pk.columns.join(", ")),
            sql: ddl::add_primary_key(table, src_pk),
        }),
        (Some(src_pk), Some(tgt_pk)) if src_pk != tgt_pk => {
            diffs.push(Difference {
                kind: DifferenceKind::DropPrimaryKey,
                name: "PRIMARY".to_string(),
                description: format!(
                    "Primary key differs: source is ({}), target is ({})",
                    src_pk.columns.join(", "),
                    tgt_pk.columns.join(", ")
                ),
                sql: ddl::drop_primary_key(table),
            });
            diffs.push(Difference {
                kind: DifferenceKind::AddPrimaryKey,
                name: "PRIMARY".to_string(),
                description: format!(
                    "Primary key re-created as ({})",
                    src_pk.columns.join(", ")
                ),
                sql: ddl::add_primary_key(table, src_pk),
            });
        }
        (Some(_), Some(_)) => {}
    }

    diffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{IndexSnapshot, PrimaryKeySnapshot};
    use pretty_assertions::assert_eq;

    fn col(name: &str, column_type: &str, nullable: bool) -> ColumnSnapshot {
        ColumnSnapshot {
            name: name.to_string(),
            column_type: column_type.to_string(),
            nullable,
            column_key: String::new(),
            default: None,
            extra: String::new(),
            comment: String::new(),
            on_update_current_timestamp: false,
        }
    }

    fn table(name: &str, columns: Vec<ColumnSnapshot>) -> TableSnapshot {
        TableSnapshot {
            name: name.to_string(),
            columns,
            indexes: Vec::new(),
            primary_key: None,
        }
    }

    #[test]
    fn test_identical_tables_have_no_differences() {
        let t = table(
            "users",
            vec![col("id", "bigint", false), col("email", "varchar(255)", false)],
        );

        assert_eq!(diff_tables(&t, &t.clone()), Vec::new());
    }

    #[test]
    fn test_missing_column_is_added_in_source_order() {
        let source = table(
            "users",
            vec![
                col("id", "bigint", false),
                col("email", "varchar(255)", false),
                col("created_at", "datetime", true),
            ],
        );
        let target = table("users", vec![col("id", "bigint", false)]);

        let diffs = diff_tables(&source, &target);
        let kinds: Vec<_> = diffs.iter().map(|d| d.kind).collect();
        let names: Vec<_> = diffs.iter().map(|d| d.name.as_str()).collect();

        assert_eq!(kinds, vec![DifferenceKind::AddColumn, DifferenceKind::AddColumn]);
        assert_eq!(names, vec!["email", "created_at"]);
    }

    #[test]
    fn test_comment_only_change_is_ignored() {
        let source = table("users", vec![col("id", "bigint", false)]);
        let mut target = source.clone();
        target.columns[0].comment = "old note".to_string();

        assert!(diff_tables(&source, &target).is_empty());
    }

    #[test]
    fn test_type_change_produces_modify() {
        let source = table("users", vec![col("email", "varchar(320)", false)]);
        let target = table("users", vec![col("email", "varchar(255)", false)]);

        let diffs = diff_tables(&source, &target);

        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].kind, DifferenceKind::ModifyColumn);
        assert_eq!(
            diffs[0].sql,
            "ALTER TABLE `users` MODIFY COLUMN `email` varchar(320) NOT NULL"
        );
    }

    #[test]
    fn test_target_only_column_is_dropped_after_additions() {
        let source = table("users", vec![col("id", "bigint", false), col("new_col", "int", true)]);
        let target = table("users", vec![col("id", "bigint", false), col("legacy", "int", true)]);

        let diffs = diff_tables(&source, &target);
        let kinds: Vec<_> = diffs.iter().map(|d| d.kind).collect();

        assert_eq!(kinds, vec![DifferenceKind::AddColumn, DifferenceKind::DropColumn]);
        assert_eq!(diffs[1].name, "legacy");
    }

    #[test]
    fn test_index_column_order_change_is_drop_then_add() {
        let mut source = table("events", vec![col("a", "int", false), col("b", "int", false)]);
        let mut target = source.clone();

        source.indexes.push(IndexSnapshot {
            name: "ix_ab".to_string(),
            columns: vec!["a".to_string(), "b".to_string()],
            unique: false,
            method: "BTREE".to_string(),
        });
        target.indexes.push(IndexSnapshot {
            name: "ix_ab".to_string(),
            columns: vec!["b".to_string(), "a".to_string()],
            unique: false,
            method: "BTREE".to_string(),
        });

        let diffs = diff_tables(&source, &target);
        let kinds: Vec<_> = diffs.iter().map(|d| d.kind).collect();

        assert_eq!(kinds, vec![DifferenceKind::DropIndex, DifferenceKind::AddIndex]);
        assert_eq!(
            diffs[1].sql,
            "CREATE INDEX `ix_ab` ON `events` (`a`, `b`) USING BTREE"
        );
    }

    #[test]
    fn test_primary_key_change_is_drop_then_add() {
        let mut source = table("orders", vec![col("id", "bigint", false), col("tenant", "int", false)]);
        let mut target = source.clone();

        source.primary_key = Some(PrimaryKeySnapshot {
            columns: vec!["tenant".to_string(), "id".to_string()],
        });
        target.primary_key = Some(PrimaryKeySnapshot {
            columns: vec!["id".to_string()],
        });

        let diffs = diff_tables(&source, &target);
        let kinds: Vec<_> = diffs.iter().map(|d| d.kind).collect();

        assert_eq!(
            kinds,
            vec![DifferenceKind::DropPrimaryKey, DifferenceKind::AddPrimaryKey]
        );
        assert_eq!(
            diffs[1].sql,
            "ALTER TABLE `orders` ADD PRIMARY KEY (`tenant`, `id`)"
        );
    }

    #[test]
    fn test_source_only_primary_key_is_added() {
        let mut source = table("orders", vec![col("id", "bigint", false)]);
        let target = source.clone();

        source.primary_key = Some(PrimaryKeySnapshot {
            columns: vec!["id".to_string()],
        });

        let diffs = diff_tables(&source, &target);

        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].kind, DifferenceKind::AddPrimaryKey);
    }

    #[test]
    fn test_ordering_columns_then_indexes_then_primary_key() {
        let mut source = table("t", vec![col("a", "int", false), col("n", "int", true)]);
        let mut target = table("t", vec![col("a", "int", false)]);

        source.indexes.push(IndexSnapshot {
            name: "ix_n".to_string(),
            columns: vec!["n".to_string()],
            unique: false,
            method: "BTREE".to_string(),
        });
        source.primary_key = Some(PrimaryKeySnapshot {
            columns: vec!["a".to_string()],
        });
        target.primary_key = None;

        let kinds: Vec<_> = diff_tables(&source, &target).iter().map(|d| d.kind).collect();

        assert_eq!(
            kinds,
            vec![
                DifferenceKind::AddColumn,
                DifferenceKind::AddIndex,
                DifferenceKind::AddPrimaryKey,
            ]
        );
    }
}
