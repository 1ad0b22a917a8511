//! Per-table sync task state

use std::sync::Mutex;

/// Lifecycle state of a task across runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Ready,
    Completed,
    Error,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Ready => "ready",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
struct TaskState {
    status: TaskStatus,
    last_error: Option<String>,
}

/// One source-to-target table pairing with its mutable run state
#[derive(Debug)]
pub struct SyncTask {
    pub source_table: String,
    pub target_table: String,
    pub batch_size: usize,
    state: Mutex<TaskState>,
}

impl SyncTask {
    pub fn new(source_table: &str, target_table: &str, batch_size: usize) -> Self {
        Self {
            source_table: source_table.to_string(),
            target_table: target_table.to_string(),
            batch_size,
            state: Mutex::new(TaskState {
                status: TaskStatus::Ready,
                last_error: None,
            }),
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.state.lock().unwrap().status
    }

    pub fn last_error(&self) -> Option<String> {
        self.state.lock().unwrap().last_error.clone()
    }

    /// Mark the latest run successful, clearing any earlier error
    pub fn complete(&self) {
        let mut state = self.state.lock().unwrap();
        state.status = TaskStatus::Completed;
        state.last_error = None;
    }

    pub fn record_error(&self, message: &str) {
        let mut state = self.state.lock().unwrap();
        state.status = TaskStatus::Error;
        state.last_error = Some(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_task_is_ready() {
        let task = SyncTask::new("users", "users", 100);

        assert_eq!(task.status(), TaskStatus::Ready);
        assert_eq!(task.last_error(), None);
    }

    #[test]
    fn test_error_then_complete_clears_error() {
        let task = SyncTask::new("users", "users_copy", 50);

        task.record_error("connection reset");
        assert_eq!(task.status(), TaskStatus::Error);
        assert_eq!(task.last_error(), Some("connection reset".to_string()));

        task.complete();
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.last_error(), None);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TaskStatus::Ready.to_string(), "ready");
        assert_eq!(TaskStatus::Completed.to_string(), "completed");
        assert_eq!(TaskStatus::Error.to_string(), "error");
    }
}
