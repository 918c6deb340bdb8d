//! URL path to filesystem path resolution.
//!
//! Every resolved path is canonicalized and must stay below the canonical
//! part root, so `..` segments and symlinks cannot escape it.

use std::{
    fs,
    path::{Component, Path, PathBuf},
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no such file")]
    NotFound,

    #[error("path escapes the part root")]
    Outside,

    #[error("invalid path segment")]
    InvalidSegment,

    #[error("path is a directory")]
    IsDirectory,
}

/// Resolve a decoded, root-relative URL path to a file inside `root`.
///
/// Directories resolve to the first existing entry of `index`.
pub fn resolve(root: &Path, relative: &str, index: &[String]) -> Result<PathBuf, ResolveError> {
    let root = canonical_root(root)?;
    let local = root.join(relative.trim_start_matches('/'));

    let canonical = local.canonicalize().map_err(|_| ResolveError::NotFound)?;
    ensure_inside(&canonical, &root)?;

    if canonical.is_file() {
        return Ok(canonical);
    }

    if canonical.is_dir() {
        for name in index {
            let Ok(candidate) = canonical.join(name).canonicalize() else {
                continue;
            };
            if candidate.is_file() && candidate.starts_with(&root) {
                return Ok(candidate);
            }
        }
    }

    Err(ResolveError::NotFound)
}

/// Resolve the destination of a write below `root`.
///
/// The file need not exist, but every existing ancestor must resolve inside
/// `root`, and an existing target must not be a directory.
pub fn resolve_for_write(root: &Path, relative: &str) -> Result<PathBuf, ResolveError> {
    let root = canonical_root(root)?;

    let mut target = root.clone();
    for component in Path::new(relative.trim_start_matches('/')).components() {
        match component {
            Component::Normal(segment) => target.push(segment),
            _ => return Err(ResolveError::InvalidSegment),
        }
    }
    if target == root {
        return Err(ResolveError::IsDirectory);
    }

    if fs::symlink_metadata(&target).is_ok() {
        let canonical = target.canonicalize().map_err(|_| ResolveError::Outside)?;
        ensure_inside(&canonical, &root)?;
        if canonical.is_dir() {
            return Err(ResolveError::IsDirectory);
        }
        return Ok(target);
    }

    let existing = target
        .ancestors()
        .skip(1)
        .find(|dir| dir.exists())
        .ok_or(ResolveError::NotFound)?;
    let canonical = existing.canonicalize().map_err(|_| ResolveError::NotFound)?;
    ensure_inside(&canonical, &root)?;
    if !canonical.is_dir() {
        return Err(ResolveError::NotFound);
    }

    Ok(target)
}

fn canonical_root(root: &Path) -> Result<PathBuf, ResolveError> {
    root.canonicalize().map_err(|_| ResolveError::NotFound)
}

fn ensure_inside(path: &Path, root: &Path) -> Result<(), ResolveError> {
    if path.starts_with(root) {
        Ok(())
    } else {
        Err(ResolveError::Outside)
    }
}
