//! Table structure snapshots, diffing and sync-plan generation

pub mod comparer;
pub mod ddl;
pub mod diff;
pub mod extractor;
pub mod plan;
pub mod types;

pub use comparer::Comparer;
pub use diff::{diff_tables, Difference, DifferenceKind};
pub use plan::{MergedSyncPlan, SyncPlan};
pub use types::{ColumnSnapshot, IndexSnapshot, PrimaryKeySnapshot, TableSnapshot};
