//! Interval scheduler
//!
//! One task exists per configured table pair. Every tick runs all tasks
//! concurrently and waits for them to finish before the next tick; a failing
//! table never blocks the others. Shutdown is honored between ticks so an
//! in-flight run always completes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::db::DbContext;
use crate::error::Result;
use crate::sync::observer::SyncObserver;
use crate::sync::task::SyncTask;
use crate::sync::{cleaner, detector, repair, replicator};

pub struct SyncService {
    ctx: DbContext,
    config: Arc<Config>,
    tasks: HashMap<String, Arc<SyncTask>>,
    observers: Vec<Box<dyn SyncObserver>>,
}

impl SyncService {
    pub fn new(ctx: DbContext, config: Arc<Config>) -> Self {
        let mut tasks = HashMap::new();
        for pair in &config.sync.table_pairs {
            tasks.insert(
                pair.source.clone(),
                Arc::new(SyncTask::new(
                    &pair.source,
                    &pair.target,
                    config.sync.batch_size,
                )),
            );
        }

        if tasks.is_empty() {
            warn!("No table pairs configured, nothing will be synchronized");
        }

        Self {
            ctx,
            config,
            tasks,
            observers: Vec::new(),
        }
    }

    /// Register an observer; must happen before [`SyncService::run`]
    pub fn register_observer(&mut self, observer: Box<dyn SyncObserver>) {
        self.observers.push(observer);
    }

    pub fn task(&self, source_table: &str) -> Option<&Arc<SyncTask>> {
        self.tasks.get(source_table)
    }

    /// Run until a shutdown signal arrives
    ///
    /// The first cycle starts immediately; afterwards cycles run on the
    /// configured interval. Shutdown is only observed between cycles.
    pub async fn run(self: Arc<Self>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.config.sync.interval));

        info!(
            interval_secs = self.config.sync.interval,
            tables = self.tasks.len(),
            "Sync service started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!("Shutdown signal received, stopping sync service");
                    break;
                }
                _ = ticker.tick() => {
                    self.sync_all().await;
                }
            }
        }
    }

    /// Run every task once, concurrently, and wait for all of them
    pub async fn sync_all(self: &Arc<Self>) {
        let mut workers = JoinSet::new();

        for task in self.tasks.values() {
            let service = Arc::clone(self);
            let task = Arc::clone(task);
            workers.spawn(async move {
                service.run_task(&task).await;
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Sync worker panicked");
            }
        }
    }

    async fn run_task(&self, task: &SyncTask) {
        for observer in &self.observers {
            observer.on_start(task);
        }

        match self.sync_table(task).await {
            Ok(()) => {
                task.complete();
                for observer in &self.observers {
                    observer.on_complete(task);
                }
            }
            Err(e) => {
                task.record_error(&e.to_string());
                for observer in &self.observers {
                    observer.on_error(task, &e);
                }
            }
        }
    }

    /// One full pass over a table pair
    async fn sync_table(&self, task: &SyncTask) -> Result<()> {
        repair::ensure_columns(&self.ctx, &task.source_table, &task.target_table).await?;

        let pair = self.config.sync.pair_for(&task.source_table);
        let resolved = detector::resolve(&self.ctx, &pair).await?;

        if !resolved
            .check
            .needs_sync(&self.ctx, &task.source_table, &task.target_table)
            .await?
        {
            debug!(table = %task.source_table, "No changes detected");
            return Ok(());
        }

        replicator::replicate(
            &self.ctx,
            task,
            self.config.sync.sync_mode,
            resolved.update_column.as_deref(),
        )
        .await?;

        cleaner::cleanup(&self.ctx, task).await?;

        Ok(())
    }
}
