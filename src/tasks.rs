//! Sequential task list.
//!
//! Tasks run one at a time in the order they were added. When a task fails
//! its rollback hook (if any) is invoked once and the run stops.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use futures::future::{BoxFuture, FutureExt};
use tracing::{error, info};

use crate::events::Event;
use crate::ledger::{ReplaySummary, RollbackError};
use crate::reporter::Reporter;

/// Handler invoked when a task fails.
pub type RollbackHook =
    Arc<dyn Fn() -> BoxFuture<'static, Result<ReplaySummary, RollbackError>> + Send + Sync>;

type ExecuteFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;
type SkipFn = Box<dyn Fn() -> Option<String> + Send>;

/// A named unit of work.
pub struct Task {
    title: String,
    execute: ExecuteFn,
    skip: Option<SkipFn>,
    rollback: Option<RollbackHook>,
}

impl Task {
    pub fn new<F, Fut>(title: impl Into<String>, execute: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            title: title.into(),
            execute: Box::new(move || execute().boxed()),
            skip: None,
            rollback: None,
        }
    }

    /// Skip the task when `skip` returns a reason. Evaluated just before the
    /// task would run, so it sees the effects of earlier tasks.
    pub fn with_skip<F>(mut self, skip: F) -> Self
    where
        F: Fn() -> Option<String> + Send + 'static,
    {
        self.skip = Some(Box::new(skip));
        self
    }

    pub fn with_rollback(mut self, hook: RollbackHook) -> Self {
        self.rollback = Some(hook);
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn has_rollback(&self) -> bool {
        self.rollback.is_some()
    }
}

/// What a successful run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub skipped: usize,
}

/// A task failed. `error` is the task's own error, untouched; `rollback`
/// holds whatever went wrong while undoing.
#[derive(Debug)]
pub struct TaskFailure {
    pub task: String,
    pub error: anyhow::Error,
    pub rollback: Option<RollbackError>,
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for TaskFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        // Display already prints the task error itself
        std::error::Error::source(&*self.error)
    }
}

/// Executes a list of tasks in order.
#[derive(Default)]
pub struct TaskRunner {
    tasks: Vec<Task>,
}

impl TaskRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, task: Task) {
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Use `hook` as the rollback handler of every task.
    pub fn set_rollback_hook(&mut self, hook: RollbackHook) {
        for task in &mut self.tasks {
            task.rollback = Some(hook.clone());
        }
    }

    pub async fn run(self, reporter: &mut Reporter) -> Result<RunSummary, TaskFailure> {
        let mut summary = RunSummary::default();
        for task in self.tasks {
            let Task {
                title,
                execute,
                skip,
                rollback,
            } = task;

            if let Some(reason) = skip.as_ref().and_then(|skip| skip()) {
                info!(task = %title, %reason, "skipping task");
                reporter.record(Event::TaskSkipped { title, reason });
                summary.skipped += 1;
                continue;
            }

            info!(task = %title, "running task");
            reporter.record(Event::TaskStarted {
                title: title.clone(),
            });
            match execute().await {
                Ok(()) => {
                    reporter.record(Event::TaskCompleted { title });
                    summary.completed += 1;
                }
                Err(err) => {
                    error!(task = %title, error = %format!("{err:#}"), "task failed");
                    reporter.record(Event::TaskFailed {
                        title: title.clone(),
                        error: format!("{err:#}"),
                    });
                    let rollback = match rollback {
                        Some(hook) => run_rollback(&title, hook, reporter).await,
                        None => None,
                    };
                    return Err(TaskFailure {
                        task: title,
                        error: err,
                        rollback,
                    });
                }
            }
        }
        Ok(summary)
    }
}

async fn run_rollback(
    title: &str,
    hook: RollbackHook,
    reporter: &mut Reporter,
) -> Option<RollbackError> {
    reporter.record(Event::RollbackStarted {
        title: title.to_string(),
    });
    match hook().await {
        Ok(done) => {
            info!(undone = done.undone, "rolled back");
            reporter.record(Event::RollbackCompleted {
                undone: done.undone,
            });
            None
        }
        Err(err) => {
            for failure in &err.failures {
                error!(step = %failure.step, error = %format!("{:#}", failure.error), "could not undo step");
            }
            reporter.record(Event::RollbackFailed {
                undone: err.undone,
                errors: err
                    .failures
                    .iter()
                    .map(|f| format!("{}: {:#}", f.step, f.error))
                    .collect(),
            });
            Some(err)
        }
    }
}
