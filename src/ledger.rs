//! Undo stack for a single generation run.
//!
//! Tasks record how to reverse what they are about to do: either a snapshot
//! of a file taken before it is written or deleted, or an arbitrary undo
//! action. [`RollbackLedger::replay`] pops everything in last-in-first-out
//! order. Steps recorded with `at_end` sit at the far end of the stack and
//! are therefore undone after every other step.

use std::collections::VecDeque;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, warn};

use crate::tasks::{RollbackHook, TaskRunner};

/// Boxed undo action. Every action is async, sync work simply completes on
/// first poll.
pub type UndoFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<()>> + Send>;

/// A single recorded undo step.
pub enum RollbackStep {
    /// Snapshot of a file. `prior` is `None` when the file did not exist.
    File { path: PathBuf, prior: Option<Vec<u8>> },
    /// Arbitrary undo action.
    Action { label: String, undo: UndoFn },
}

impl RollbackStep {
    pub fn describe(&self) -> String {
        match self {
            RollbackStep::File { path, prior: Some(_) } => format!("restore {}", path.display()),
            RollbackStep::File { path, prior: None } => format!("remove {}", path.display()),
            RollbackStep::Action { label, .. } => label.clone(),
        }
    }

    async fn undo(self, base: Option<&Path>) -> Result<()> {
        match self {
            RollbackStep::File {
                path,
                prior: Some(bytes),
            } => {
                if let Some(parent) = path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    std::fs::create_dir_all(parent)
                        .with_context(|| format!("failed to recreate {}", parent.display()))?;
                }
                std::fs::write(&path, bytes)
                    .with_context(|| format!("failed to restore {}", path.display()))
            }
            RollbackStep::File { path, prior: None } => crate::fsops::remove_created_file(&path, base),
            RollbackStep::Action { undo, .. } => undo().await,
        }
    }
}

impl std::fmt::Debug for RollbackStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RollbackStep::File { path, prior } => f
                .debug_struct("File")
                .field("path", path)
                .field("prior_len", &prior.as_ref().map(Vec::len))
                .finish(),
            RollbackStep::Action { label, .. } => {
                f.debug_struct("Action").field("label", label).finish()
            }
        }
    }
}

/// Outcome of a replay in which every step succeeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub undone: usize,
}

/// A step that could not be undone.
#[derive(Debug)]
pub struct StepFailure {
    pub step: String,
    pub error: anyhow::Error,
}

/// Replay attempted every step but some of them failed.
#[derive(Debug, thiserror::Error)]
#[error("rollback incomplete: {} step(s) failed, {undone} undone", .failures.len())]
pub struct RollbackError {
    pub undone: usize,
    pub failures: Vec<StepFailure>,
}

#[derive(Debug, Default)]
struct LedgerState {
    steps: VecDeque<RollbackStep>,
}

/// Handle to one run's undo stack. Clones share the same stack.
#[derive(Debug, Clone, Default)]
pub struct RollbackLedger {
    state: Arc<Mutex<LedgerState>>,
    base: Option<Arc<PathBuf>>,
}

impl RollbackLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger whose directory pruning never removes `base`.
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            state: Arc::default(),
            base: Some(Arc::new(base.into())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, step: RollbackStep, at_end: bool) {
        debug!(step = %step.describe(), at_end, "recording rollback step");
        let mut state = self.lock();
        if at_end {
            state.steps.push_front(step);
        } else {
            state.steps.push_back(step);
        }
    }

    /// Snapshot `path` so replay can put it back the way it is now.
    ///
    /// A missing file is recorded as such and will be deleted on replay.
    pub fn record_file_change(&self, path: impl AsRef<Path>, at_end: bool) -> Result<()> {
        let path = path.as_ref();
        let prior = match std::fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(e).with_context(|| format!("failed to snapshot {}", path.display()));
            }
        };
        self.insert(
            RollbackStep::File {
                path: path.to_path_buf(),
                prior,
            },
            at_end,
        );
        Ok(())
    }

    /// Record an arbitrary undo action.
    pub fn record_action<F, Fut>(&self, label: impl Into<String>, undo: F, at_end: bool)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let undo: UndoFn = Box::new(move || undo().boxed());
        self.insert(
            RollbackStep::Action {
                label: label.into(),
                undo,
            },
            at_end,
        );
    }

    fn pop(&self) -> Option<RollbackStep> {
        self.lock().steps.pop_back()
    }

    /// Undo every recorded step, most recent first, until the ledger is empty.
    ///
    /// A failing step does not stop the replay; failures are collected and
    /// returned together once nothing is left to undo.
    pub async fn replay(&self) -> Result<ReplaySummary, RollbackError> {
        let base = self.base.as_deref().map(PathBuf::as_path);
        let mut undone = 0;
        let mut failures = Vec::new();
        while let Some(step) = self.pop() {
            let description = step.describe();
            match step.undo(base).await {
                Ok(()) => {
                    debug!(step = %description, "undid rollback step");
                    undone += 1;
                }
                Err(error) => {
                    warn!(step = %description, error = %format!("{error:#}"), "rollback step failed");
                    failures.push(StepFailure {
                        step: description,
                        error,
                    });
                }
            }
        }
        if failures.is_empty() {
            Ok(ReplaySummary { undone })
        } else {
            Err(RollbackError { undone, failures })
        }
    }

    /// Drop every recorded step without running it.
    pub fn reset(&self) {
        self.lock().steps.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().steps.is_empty()
    }

    /// Hook that replays this ledger, for use as a task's rollback handler.
    pub fn rollback_hook(&self) -> RollbackHook {
        let ledger = self.clone();
        Arc::new(move || {
            let ledger = ledger.clone();
            async move { ledger.replay().await }.boxed()
        })
    }

    /// Start a fresh ledger and make its replay the rollback hook of every
    /// task in `runner`.
    pub fn attach_to_task_runner(&self, runner: &mut TaskRunner) {
        self.reset();
        runner.set_rollback_hook(self.rollback_hook());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex as StdMutex;

    fn order_log() -> Arc<StdMutex<Vec<&'static str>>> {
        Arc::new(StdMutex::new(Vec::new()))
    }

    fn record_named(ledger: &RollbackLedger, log: &Arc<StdMutex<Vec<&'static str>>>, name: &'static str, at_end: bool) {
        let log = log.clone();
        ledger.record_action(
            name,
            move || async move {
                log.lock().unwrap().push(name);
                anyhow::Ok(())
            },
            at_end,
        );
    }

    #[tokio::test]
    async fn restores_overwritten_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "C").unwrap();

        let ledger = RollbackLedger::new();
        ledger.record_file_change(&path, false).unwrap();
        fs::write(&path, "C2").unwrap();

        let summary = ledger.replay().await.unwrap();
        assert_eq!(summary.undone, 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "C");
    }

    #[tokio::test]
    async fn removes_created_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("keep.txt"), "").unwrap();
        let path = dir.path().join("new.txt");

        let ledger = RollbackLedger::new();
        ledger.record_file_change(&path, false).unwrap();
        fs::write(&path, "C3").unwrap();

        ledger.replay().await.unwrap();
        assert!(!path.exists());
        assert!(dir.path().exists());
    }

    #[tokio::test]
    async fn prunes_two_empty_levels_only() {
        let dir = tempfile::tempdir().unwrap();
        let top = dir.path().join("web");
        fs::create_dir(&top).unwrap();
        fs::write(top.join("other.txt"), "keep").unwrap();
        let file = top.join("pages").join("Home").join("Home.tsx");

        let ledger = RollbackLedger::new();
        ledger.record_file_change(&file, false).unwrap();
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, "export default Home").unwrap();

        ledger.replay().await.unwrap();
        assert!(!file.exists());
        assert!(!top.join("pages").join("Home").exists());
        assert!(!top.join("pages").exists());
        assert!(top.join("other.txt").exists());
    }

    #[tokio::test]
    async fn stops_pruning_after_grandparent() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a").join("b").join("c").join("f.txt");
        fs::write(dir.path().join("keep.txt"), "").unwrap();

        let ledger = RollbackLedger::new();
        ledger.record_file_change(&file, false).unwrap();
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, "x").unwrap();

        ledger.replay().await.unwrap();
        assert!(!dir.path().join("a/b/c").exists());
        assert!(!dir.path().join("a/b").exists());
        // three levels up is left alone even though it is now empty
        assert!(dir.path().join("a").is_dir());
    }

    #[tokio::test]
    async fn keeps_non_empty_grandparent() {
        let dir = tempfile::tempdir().unwrap();
        let gp = dir.path().join("gp");
        fs::create_dir(&gp).unwrap();
        fs::write(gp.join("keep"), "").unwrap();
        let file = gp.join("p").join("f.txt");

        let ledger = RollbackLedger::new();
        ledger.record_file_change(&file, false).unwrap();
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, "x").unwrap();

        ledger.replay().await.unwrap();
        assert!(!gp.join("p").exists());
        assert!(gp.is_dir());
        assert!(gp.join("keep").exists());
    }

    #[tokio::test]
    async fn never_prunes_base() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("project");
        let file = base.join("src").join("a.rs");

        let ledger = RollbackLedger::with_base(&base);
        ledger.record_file_change(&file, false).unwrap();
        fs::create_dir_all(file.parent().unwrap()).unwrap();
        fs::write(&file, "x").unwrap();

        ledger.replay().await.unwrap();
        assert!(!base.join("src").exists());
        assert!(base.is_dir());
    }

    #[tokio::test]
    async fn replays_in_reverse_order() {
        let ledger = RollbackLedger::new();
        let log = order_log();
        record_named(&ledger, &log, "1", false);
        record_named(&ledger, &log, "2", false);
        record_named(&ledger, &log, "3", false);

        ledger.replay().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["3", "2", "1"]);
    }

    #[tokio::test]
    async fn at_end_steps_run_last() {
        let ledger = RollbackLedger::new();
        let log = order_log();
        record_named(&ledger, &log, "A", false);
        record_named(&ledger, &log, "B", true);
        record_named(&ledger, &log, "C", false);

        ledger.replay().await.unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["C", "A", "B"]);
    }

    #[tokio::test]
    async fn empty_replay_is_noop() {
        let ledger = RollbackLedger::new();
        let summary = ledger.replay().await.unwrap();
        assert_eq!(summary, ReplaySummary { undone: 0 });
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn reset_discards_pending_steps() {
        let ledger = RollbackLedger::new();
        let log = order_log();
        record_named(&ledger, &log, "discarded", false);
        assert_eq!(ledger.len(), 1);

        ledger.reset();
        ledger.replay().await.unwrap();
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn walks_back_through_repeated_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.ts");
        fs::write(&path, "v0").unwrap();

        let ledger = RollbackLedger::new();
        ledger.record_file_change(&path, false).unwrap();
        fs::write(&path, "v1").unwrap();
        ledger.record_file_change(&path, false).unwrap();
        fs::write(&path, "v2").unwrap();

        ledger.replay().await.unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "v0");
    }

    #[tokio::test]
    async fn failing_step_does_not_stop_replay() {
        let ledger = RollbackLedger::new();
        let log = order_log();
        record_named(&ledger, &log, "first", false);
        ledger.record_action(
            "broken undo",
            || async { Err::<(), _>(anyhow::anyhow!("directory not empty")) },
            false,
        );
        record_named(&ledger, &log, "last", false);

        let err = ledger.replay().await.unwrap_err();
        assert_eq!(err.undone, 2);
        assert_eq!(err.failures.len(), 1);
        assert_eq!(err.failures[0].step, "broken undo");
        assert_eq!(*log.lock().unwrap(), vec!["last", "first"]);
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn clones_share_one_stack() {
        let ledger = RollbackLedger::new();
        let handle = ledger.clone();
        let log = order_log();
        record_named(&handle, &log, "from clone", false);
        assert_eq!(ledger.len(), 1);
        ledger.replay().await.unwrap();
        assert!(handle.is_empty());
    }

    #[tokio::test]
    async fn end_to_end_restore_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, "hello").unwrap();

        let ledger = RollbackLedger::new();
        ledger.record_file_change(&a, false).unwrap();
        fs::write(&a, "hello world").unwrap();
        ledger.record_file_change(&b, false).unwrap();
        fs::write(&b, "new").unwrap();

        ledger.replay().await.unwrap();
        assert_eq!(fs::read_to_string(&a).unwrap(), "hello");
        assert!(!b.exists());
    }
}
