use anyhow::{Result, bail};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::model::{GenerationPlan, Generator};

/// A file ready to be written: resolved absolute target plus contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedFile {
    pub target: PathBuf,
    pub content: String,
}

/// Resolve every generated file under the plan root, preserving order.
///
/// Two entries resolving to the same target are rejected.
pub fn normalize_generate(plan: &GenerationPlan, root: &std::path::Path) -> Result<Vec<NormalizedFile>> {
    let mut seen = BTreeSet::new();
    let mut normalized = Vec::new();
    for (path, content) in plan.files()? {
        let target = crate::resolve::resolve_path(root, &path)?;
        if !seen.insert(target.clone()) {
            bail!("file listed twice: {}", target.display());
        }
        normalized.push(NormalizedFile { target, content });
    }
    Ok(normalized)
}

/// Resolve the files a destroy run removes. A directory stands for every
/// file beneath it.
pub fn normalize_destroy(plan: &GenerationPlan, root: &std::path::Path) -> Result<Vec<PathBuf>> {
    let mut seen = BTreeSet::new();
    let mut targets = Vec::new();
    for file in &plan.files {
        let resolved = crate::resolve::resolve_path(root, &file.path)?;
        if resolved.is_dir() {
            for entry in walkdir::WalkDir::new(&resolved).sort_by_file_name() {
                let entry = entry?;
                if entry.file_type().is_file() && seen.insert(entry.path().to_path_buf()) {
                    targets.push(entry.path().to_path_buf());
                }
            }
        } else if seen.insert(resolved.clone()) {
            targets.push(resolved);
        }
    }
    Ok(targets)
}

/// Resolve the optional index path.
pub fn resolve_index(plan: &GenerationPlan, root: &std::path::Path) -> Result<Option<PathBuf>> {
    plan.index
        .as_ref()
        .map(|index| crate::resolve::resolve_path(root, index))
        .transpose()
}
