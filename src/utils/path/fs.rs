//! Filesystem path helpers.
//!
//! - `normalize_path` - file system paths (canonicalize + fallback)
//! - `walk_relative` - sorted recursive listing, hidden files included
//! - `copy_dir_all` - recursive copy
//! - `remove_dir_if_exists` - `remove_dir_all` that tolerates a missing dir

use jwalk::WalkDir;
use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// Normalize a file system path to absolute form.
///
/// Tries `canonicalize()` first (resolves symlinks, `.`, `..`).
/// Falls back to:
/// - Return as-is if already absolute
/// - Join with current directory if relative
#[inline]
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
        }
    })
}

/// One entry below a walked directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Path relative to the walked directory.
    pub relative: PathBuf,
    pub is_dir: bool,
}

/// List everything below `dir` (not `dir` itself), parents before children.
pub fn walk_relative(dir: &Path) -> io::Result<Vec<WalkEntry>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).skip_hidden(false).sort(true).min_depth(1) {
        let entry = entry.map_err(|e| io::Error::other(e.to_string()))?;
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(dir) else {
            continue;
        };
        entries.push(WalkEntry {
            relative: relative.to_path_buf(),
            is_dir: entry.file_type().is_dir(),
        });
    }
    Ok(entries)
}

/// Recursively copy `src` into `dst`, creating `dst` if needed.
///
/// Returns the number of files copied.
pub fn copy_dir_all(src: &Path, dst: &Path) -> io::Result<usize> {
    fs::create_dir_all(dst)?;
    let mut copied = 0;
    for entry in walk_relative(src)? {
        let to = dst.join(&entry.relative);
        if entry.is_dir {
            fs::create_dir_all(&to)?;
        } else {
            fs::copy(src.join(&entry.relative), &to)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// `remove_dir_all` that treats a missing directory as success.
pub fn remove_dir_if_exists(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_path_absolute() {
        let path = Path::new("/absolute/path/file.txt");
        let normalized = normalize_path(path);
        assert!(normalized.is_absolute());
    }

    #[test]
    fn test_normalize_path_relative() {
        let path = Path::new("relative/path/file.txt");
        let normalized = normalize_path(path);
        assert!(normalized.is_absolute());
    }

    #[test]
    fn test_walk_includes_hidden_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a/.config")).unwrap();
        fs::write(dir.path().join("a/.config/settings"), "x").unwrap();
        fs::write(dir.path().join(".env"), "y").unwrap();

        let entries = walk_relative(dir.path()).unwrap();
        let files: Vec<_> = entries
            .iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.relative.clone())
            .collect();
        assert_eq!(files.len(), 2);
        assert!(files.contains(&PathBuf::from(".env")));
        assert!(files.contains(&PathBuf::from("a/.config/settings")));
    }

    #[test]
    fn test_copy_dir_all() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("nested/deeper")).unwrap();
        fs::write(src.path().join("top.txt"), "top").unwrap();
        fs::write(src.path().join("nested/deeper/leaf.txt"), "leaf").unwrap();

        let target = dst.path().join("copy");
        let copied = copy_dir_all(src.path(), &target).unwrap();

        assert_eq!(copied, 2);
        assert_eq!(fs::read_to_string(target.join("top.txt")).unwrap(), "top");
        assert_eq!(
            fs::read_to_string(target.join("nested/deeper/leaf.txt")).unwrap(),
            "leaf"
        );
    }

    #[test]
    fn test_remove_missing_dir_is_ok() {
        let dir = TempDir::new().unwrap();
        assert!(remove_dir_if_exists(&dir.path().join("missing")).is_ok());

        let present = dir.path().join("present");
        fs::create_dir(&present).unwrap();
        remove_dir_if_exists(&present).unwrap();
        assert!(!present.exists());
    }
}
