//! Continuous data synchronization
//!
//! Repairs target structure, detects changed tables, replicates rows in
//! batches and removes rows the source no longer has, all on a fixed
//! interval.

pub mod cleaner;
pub mod detector;
pub mod observer;
pub mod repair;
pub mod replicator;
pub mod service;
pub mod task;
pub mod value;

pub use observer::{LogObserver, SyncObserver};
pub use service::SyncService;
pub use task::{SyncTask, TaskStatus};
