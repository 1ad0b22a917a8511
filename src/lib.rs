//! MySQL-to-MySQL table reconciliation
//!
//! Two engines share one configuration and connection layer:
//!
//! - Structure comparison snapshots `information_schema` on both sides,
//!   diffs the snapshots and writes per-table (or merged) JSON reports and
//!   SQL scripts. Nothing is ever executed against either database.
//! - Data synchronization runs on an interval: it repairs missing target
//!   columns, detects changed tables by checksum, row count or update
//!   timestamp, replicates rows in batched upserts with retries, and removes
//!   target rows the source no longer has.

pub mod config;
pub mod db;
pub mod error;
pub mod schema;
pub mod sync;

pub use config::Config;
pub use db::DbContext;
pub use error::{Error, Result};
pub use schema::Comparer;
pub use sync::{LogObserver, SyncService};
