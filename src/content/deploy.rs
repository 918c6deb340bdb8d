//! Per-part deployment policies.
//!
//! - `tutorial`: [`replace_tree`], the target mirrors the source exactly
//! - `workspace`: [`merge_tree`], files already present are never touched

use std::{fs, io, path::Path};

use crate::utils::path::{copy_dir_all, remove_dir_if_exists, walk_relative};

/// Outcome of deploying one part.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Files written to the target.
    pub copied: usize,
    /// Files left alone because the target already had them.
    pub kept: usize,
}

/// Delete `dst` and copy `src` over it.
pub fn replace_tree(src: &Path, dst: &Path) -> io::Result<TreeStats> {
    remove_dir_if_exists(dst)?;
    let copied = copy_dir_all(src, dst)?;
    Ok(TreeStats { copied, kept: 0 })
}

/// Copy every file of `src` that does not yet exist below `dst`.
pub fn merge_tree(src: &Path, dst: &Path) -> io::Result<TreeStats> {
    fs::create_dir_all(dst)?;
    let mut stats = TreeStats::default();

    for entry in walk_relative(src)? {
        let to = dst.join(&entry.relative);
        if entry.is_dir {
            fs::create_dir_all(&to)?;
        } else if to.exists() {
            stats.kept += 1;
        } else {
            fs::copy(src.join(&entry.relative), &to)?;
            stats.copied += 1;
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seed(dir: &Path, files: &[(&str, &str)]) {
        for (name, body) in files {
            let path = dir.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, body).unwrap();
        }
    }

    #[test]
    fn test_replace_tree_drops_stale_files() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        seed(&src, &[("index.html", "new"), ("img/a.png", "png")]);
        seed(&dst, &[("index.html", "old"), ("stale.html", "gone")]);

        let stats = replace_tree(&src, &dst).unwrap();

        assert_eq!(stats.copied, 2);
        assert_eq!(fs::read_to_string(dst.join("index.html")).unwrap(), "new");
        assert!(dst.join("img/a.png").is_file());
        assert!(!dst.join("stale.html").exists());
    }

    #[test]
    fn test_merge_tree_preserves_existing() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        seed(&src, &[("main.py", "template"), ("lib/util.py", "util")]);
        seed(&dst, &[("main.py", "student edit"), ("notes.txt", "mine")]);

        let stats = merge_tree(&src, &dst).unwrap();

        assert_eq!(stats, TreeStats { copied: 1, kept: 1 });
        assert_eq!(fs::read_to_string(dst.join("main.py")).unwrap(), "student edit");
        assert_eq!(fs::read_to_string(dst.join("lib/util.py")).unwrap(), "util");
        assert_eq!(fs::read_to_string(dst.join("notes.txt")).unwrap(), "mine");
    }

    #[test]
    fn test_merge_tree_twice_is_stable() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        seed(&src, &[("a.txt", "a"), ("b/c.txt", "c")]);

        merge_tree(&src, &dst).unwrap();
        let second = merge_tree(&src, &dst).unwrap();

        assert_eq!(second, TreeStats { copied: 0, kept: 2 });
    }
}
