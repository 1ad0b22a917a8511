//! Structural snapshots of MySQL tables
//!
//! A snapshot is captured fresh from the catalog on every comparison and is
//! immutable afterwards. Column, index and primary-key ordering follows
//! catalog order exactly; index and primary-key column order participates in
//! equality.

/// Point-in-time structure of one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSnapshot {
    pub name: String,
    pub columns: Vec<ColumnSnapshot>,
    pub indexes: Vec<IndexSnapshot>,
    pub primary_key: Option<PrimaryKeySnapshot>,
}

impl TableSnapshot {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            indexes: Vec::new(),
            primary_key: None,
        }
    }

    /// Find a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnSnapshot> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Find an index by name
    pub fn index(&self, name: &str) -> Option<&IndexSnapshot> {
        self.indexes.iter().find(|i| i.name == name)
    }
}

/// One column as reported by the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSnapshot {
    pub name: String,
    /// Full declared type, e.g. `varchar(255)` or `int unsigned`
    pub column_type: String,
    pub nullable: bool,
    /// Key-role tag from the catalog: `PRI`, `UNI`, `MUL` or empty
    pub column_key: String,
    pub default: Option<String>,
    /// Raw extra modifier text, e.g. `auto_increment`
    pub extra: String,
    pub comment: String,
    /// Derived: the column auto-updates to the current time on write
    pub on_update_current_timestamp: bool,
}

/// One secondary index; the implicit primary-key index is modeled separately
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSnapshot {
    pub name: String,
    /// Column names in index order; order is semantically significant
    pub columns: Vec<String>,
    pub unique: bool,
    /// Index method tag, e.g. `BTREE`
    pub method: String,
}

/// Primary-key column sequence, in catalog order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKeySnapshot {
    pub columns: Vec<String>,
}
