//! DDL statement templates
//!
//! All statements are produced from deterministic templates with every
//! identifier backtick-quoted. A default literal equal to the
//! `CURRENT_TIMESTAMP` sentinel is rendered unquoted; every other default is
//! rendered as a quoted literal.

use crate::schema::types::{ColumnSnapshot, IndexSnapshot, PrimaryKeySnapshot};

const CURRENT_TIMESTAMP: &str = "CURRENT_TIMESTAMP";

/// Backtick-quote a MySQL identifier
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// The column definition clause shared by ADD and MODIFY statements
fn column_definition(column: &ColumnSnapshot) -> String {
    let mut parts = vec![column.column_type.clone()];

    if column.nullable {
        parts.push("NULL".to_string());
    } else {
        parts.push("NOT NULL".to_string());
    }

    if let Some(default) = &column.default {
        if default == CURRENT_TIMESTAMP {
            parts.push(format!("DEFAULT {}", CURRENT_TIMESTAMP));
        } else {
            parts.push(format!("DEFAULT '{}'", escape_literal(default)));
        }
    }

    if column.on_update_current_timestamp {
        parts.push(format!("ON UPDATE {}", CURRENT_TIMESTAMP));
    }

    if column.extra.to_lowercase().contains("auto_increment") {
        parts.push("AUTO_INCREMENT".to_string());
    }

    if !column.comment.is_empty() {
        parts.push(format!("COMMENT '{}'", escape_literal(&column.comment)));
    }

    parts.join(" ")
}

fn escape_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// `ALTER TABLE .. ADD COLUMN ..` reproducing the full source definition
pub fn add_column(table: &str, column: &ColumnSnapshot) -> String {
    format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        quote_ident(table),
        quote_ident(&column.name),
        column_definition(column)
    )
}

/// `ALTER TABLE .. MODIFY COLUMN ..` driving the target toward the source
pub fn modify_column(table: &str, column: &ColumnSnapshot) -> String {
    format!(
        "ALTER TABLE {} MODIFY COLUMN {} {}",
        quote_ident(table),
        quote_ident(&column.name),
        column_definition(column)
    )
}

pub fn drop_column(table: &str, column_name: &str) -> String {
    format!(
        "ALTER TABLE {} DROP COLUMN {}",
        quote_ident(table),
        quote_ident(column_name)
    )
}

/// `CREATE [UNIQUE] INDEX .. ON .. (..) USING ..`
pub fn create_index(table: &str, index: &IndexSnapshot) -> String {
    let kind = if index.unique { "UNIQUE INDEX" } else { "INDEX" };
    let columns = index
        .columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "CREATE {} {} ON {} ({}) USING {}",
        kind,
        quote_ident(&index.name),
        quote_ident(table),
        columns,
        index.method
    )
}

pub fn drop_index(table: &str, index_name: &str) -> String {
    format!(
        "DROP INDEX {} ON {}",
        quote_ident(index_name),
        quote_ident(table)
    )
}

pub fn add_primary_key(table: &str, pk: &PrimaryKeySnapshot) -> String {
    let columns = pk
        .columns
        .iter()
        .map(|c| quote_ident(c))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "ALTER TABLE {} ADD PRIMARY KEY ({})",
        quote_ident(table),
        columns
    )
}

pub fn drop_primary_key(table: &str) -> String {
    format!("ALTER TABLE {} DROP PRIMARY KEY", quote_ident(table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn column(name: &str, column_type: &str) -> ColumnSnapshot {
        ColumnSnapshot {
            name: name.to_string(),
            column_type: column_type.to_string(),
            nullable: true,
            column_key: String::new(),
            default: None,
            extra: String::new(),
            comment: String::new(),
            on_update_current_timestamp: false,
        }
    }

    #[test]
    fn test_quote_ident_escapes_backticks() {
        assert_eq!(quote_ident("name"), "`name`");
        assert_eq!(quote_ident("odd`name"), "`odd``name`");
    }

    #[test]
    fn test_add_column_with_quoted_default() {
        let mut col = column("status", "varchar(32)");
        col.nullable = false;
        col.default = Some("new".to_string());

        assert_eq!(
            add_column("orders", &col),
            "ALTER TABLE `orders` ADD COLUMN `status` varchar(32) NOT NULL DEFAULT 'new'"
        );
    }

    #[test]
    fn test_current_timestamp_default_is_unquoted() {
        let mut col = column("updated_at", "timestamp");
        col.nullable = false;
        col.default = Some("CURRENT_TIMESTAMP".to_string());
        col.on_update_current_timestamp = true;

        assert_eq!(
            modify_column("users", &col),
            "ALTER TABLE `users` MODIFY COLUMN `updated_at` timestamp NOT NULL \
             DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP"
        );
    }

    #[test]
    fn test_auto_increment_and_comment() {
        let mut col = column("id", "bigint unsigned");
        col.nullable = false;
        col.extra = "auto_increment".to_string();
        col.comment = "surrogate key".to_string();

        assert_eq!(
            add_column("users", &col),
            "ALTER TABLE `users` ADD COLUMN `id` bigint unsigned NOT NULL \
             AUTO_INCREMENT COMMENT 'surrogate key'"
        );
    }

    #[test]
    fn test_comment_quotes_are_escaped() {
        let mut col = column("note", "text");
        col.comment = "user's note".to_string();

        assert!(add_column("t", &col).ends_with("COMMENT 'user\\'s note'"));
    }

    #[test]
    fn test_create_unique_index() {
        let index = IndexSnapshot {
            name: "uq_email".to_string(),
            columns: vec!["email".to_string(), "tenant_id".to_string()],
            unique: true,
            method: "BTREE".to_string(),
        };

        assert_eq!(
            create_index("users", &index),
            "CREATE UNIQUE INDEX `uq_email` ON `users` (`email`, `tenant_id`) USING BTREE"
        );
    }

    #[test]
    fn test_primary_key_statements() {
        let pk = PrimaryKeySnapshot {
            columns: vec!["tenant_id".to_string(), "id".to_string()],
        };

        assert_eq!(
            add_primary_key("events", &pk),
            "ALTER TABLE `events` ADD PRIMARY KEY (`tenant_id`, `id`)"
        );
        assert_eq!(
            drop_primary_key("events"),
            "ALTER TABLE `events` DROP PRIMARY KEY"
        );
    }
}
