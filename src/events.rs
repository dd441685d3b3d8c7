use serde::{Deserialize, Serialize};

/// Structured event emitted during a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    RunStarted {
        run_id: uuid::Uuid,
        command: String,
        tasks: usize,
        rollback: bool,
    },
    TaskStarted {
        title: String,
    },
    TaskSkipped {
        title: String,
        reason: String,
    },
    TaskCompleted {
        title: String,
    },
    TaskFailed {
        title: String,
        error: String,
    },
    RollbackStarted {
        title: String,
    },
    RollbackCompleted {
        undone: usize,
    },
    RollbackFailed {
        undone: usize,
        errors: Vec<String>,
    },
    RunCompleted {
        run_id: uuid::Uuid,
        at: chrono::DateTime<chrono::Utc>,
    },
    RunAborted {
        run_id: uuid::Uuid,
        at: chrono::DateTime<chrono::Utc>,
    },
}
