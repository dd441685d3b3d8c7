use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};

use crate::ledger::RollbackLedger;
use crate::tasks::Task;

/// Write `contents` to `target`, recording the previous state first.
pub fn write_file(
    ledger: &RollbackLedger,
    target: &Path,
    contents: &[u8],
    overwrite: bool,
) -> Result<()> {
    if !overwrite && target.exists() {
        bail!("{} already exists.", target.display());
    }
    ledger.record_file_change(target, false)?;
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(target, contents)
        .with_context(|| format!("failed to write {}", target.display()))?;
    Ok(())
}

/// Delete `target`, recording its contents first.
pub fn delete_file(ledger: &RollbackLedger, target: &Path) -> Result<()> {
    ledger.record_file_change(target, false)?;
    std::fs::remove_file(target)
        .with_context(|| format!("failed to delete {}", target.display()))?;
    Ok(())
}

/// Remove a file the run created, then its parent and grandparent
/// directories if that left them empty. `base` is never removed.
pub fn remove_created_file(path: &Path, base: Option<&Path>) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        // never written, nothing to undo
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
    let mut dir = path.parent();
    for _ in 0..2 {
        let Some(current) = dir else { break };
        if !remove_dir_if_empty(current, base)? {
            break;
        }
        dir = current.parent();
    }
    Ok(())
}

fn remove_dir_if_empty(dir: &Path, base: Option<&Path>) -> Result<bool> {
    if dir.as_os_str().is_empty() || base.is_some_and(|base| base == dir) {
        return Ok(false);
    }
    let mut entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e).with_context(|| format!("failed to list {}", dir.display())),
    };
    if entries.next().is_some() {
        return Ok(false);
    }
    std::fs::remove_dir(dir).with_context(|| format!("failed to remove {}", dir.display()))?;
    Ok(true)
}

fn display_relative(root: &Path, target: &Path) -> String {
    let rel = target.strip_prefix(root).unwrap_or(target);
    format!("./{}", rel.display())
}

/// One task per file that writes it through the ledger.
pub fn write_files_tasks(
    ledger: &RollbackLedger,
    root: &Path,
    files: Vec<(PathBuf, String)>,
    overwrite: bool,
) -> Vec<Task> {
    files
        .into_iter()
        .map(|(target, contents)| {
            let ledger = ledger.clone();
            let title = format!("Writing `{}`", display_relative(root, &target));
            Task::new(title, move || async move {
                write_file(&ledger, &target, contents.as_bytes(), overwrite)
            })
        })
        .collect()
}

/// One task per file that deletes it through the ledger. Files that are
/// already gone are skipped.
pub fn delete_files_tasks(ledger: &RollbackLedger, root: &Path, files: Vec<PathBuf>) -> Vec<Task> {
    files
        .into_iter()
        .map(|target| {
            let ledger = ledger.clone();
            let title = format!("Destroying `{}`", display_relative(root, &target));
            let probe = target.clone();
            Task::new(title, move || async move { delete_file(&ledger, &target) }).with_skip(
                move || (!probe.exists()).then(|| "File doesn't exist".to_string()),
            )
        })
        .collect()
}
