use anyhow::{Result, bail};
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

/// Resolve a path relative to root, ensuring it stays within root.
///
/// Targets usually do not exist yet, so normalization is lexical.
pub fn resolve_path(root: &Path, path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };
    let resolved = joined.absolutize()?.into_owned();
    let root_abs = root.absolutize()?.into_owned();
    if !resolved.starts_with(&root_abs) || resolved == root_abs {
        bail!("path escapes root: {} -> {}", path.display(), resolved.display());
    }
    Ok(resolved)
}

/// Normalized root directory.
pub fn resolve_root(root: &Path) -> Result<PathBuf> {
    Ok(root.absolutize()?.into_owned())
}
