//! Derived list of every file in the project.
//!
//! The index is regenerated from disk, never edited in place, so undoing it
//! means rebuilding it once everything else has been put back.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ledger::RollbackLedger;
use crate::tasks::Task;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileIndex {
    pub files: Vec<PathBuf>,
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

/// Collect all non-hidden files under `root`, relative and sorted.
pub fn scan(root: &Path, index_path: &Path) -> Result<FileIndex> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() || entry.path() == index_path {
            continue;
        }
        files.push(entry.path().strip_prefix(root)?.to_path_buf());
    }
    files.sort();
    Ok(FileIndex { files })
}

/// Rewrite the index at `index_path` from what is currently on disk.
pub fn rebuild(root: &Path, index_path: &Path) -> Result<FileIndex> {
    let index = scan(root, index_path)?;
    if let Some(parent) = index_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(&index)?;
    std::fs::write(index_path, json)
        .with_context(|| format!("failed to write index {}", index_path.display()))?;
    Ok(index)
}

/// Task that refreshes the index and, should the run fail, refreshes it
/// again after every other undo.
pub fn update_index_task(ledger: &RollbackLedger, root: PathBuf, index_path: PathBuf) -> Task {
    let ledger = ledger.clone();
    Task::new("Updating file index", move || async move {
        {
            let root = root.clone();
            let index_path = index_path.clone();
            ledger.record_action(
                "rebuild file index",
                move || async move { rebuild(&root, &index_path).map(drop) },
                true,
            );
        }
        let index = rebuild(&root, &index_path)?;
        tracing::debug!(files = index.files.len(), "file index rebuilt");
        anyhow::Ok(())
    })
}
