//! Run lifecycle notifications
//!
//! Observers are registered before the service starts and notified
//! synchronously at the start and end of every per-table run. An observer
//! must not block; long-running reactions belong in their own tasks.

use tracing::{error, info};

use crate::error::Error;
use crate::sync::task::SyncTask;

pub trait SyncObserver: Send + Sync {
    fn on_start(&self, task: &SyncTask);
    fn on_complete(&self, task: &SyncTask);
    fn on_error(&self, task: &SyncTask, error: &Error);
}

/// Writes each lifecycle event to the log
pub struct LogObserver;

impl SyncObserver for LogObserver {
    fn on_start(&self, task: &SyncTask) {
        info!(
            source = %task.source_table,
            target = %task.target_table,
            "Sync started"
        );
    }

    fn on_complete(&self, task: &SyncTask) {
        info!(
            source = %task.source_table,
            target = %task.target_table,
            status = %task.status(),
            "Sync finished"
        );
    }

    fn on_error(&self, task: &SyncTask, err: &Error) {
        error!(
            source = %task.source_table,
            target = %task.target_table,
            error = %err,
            "Sync failed"
        );
    }
}
