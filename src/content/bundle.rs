//! Zip bundle of every deployed part, served by `/download`.

use std::{
    collections::HashSet,
    fs::File,
    io::{self, Cursor},
    path::{Component, Path},
};

use zip::{ZipWriter, write::SimpleFileOptions};

use crate::{config::ServerConfig, utils::path::walk_relative};

/// Build an in-memory zip of all part targets.
///
/// Entries are named `<app.name>/<path relative to app.home>`; parts that
/// share a target directory are included once.
pub fn build_bundle(config: &ServerConfig) -> io::Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    let home = &config.app.home;

    let mut seen = HashSet::new();
    for part in config.parts() {
        let target = config.target_dir(&part);
        if !seen.insert(target.clone()) || !target.is_dir() {
            continue;
        }

        let prefix = target.strip_prefix(home).unwrap_or(Path::new(part.name));
        for entry in walk_relative(&target)? {
            if entry.is_dir {
                continue;
            }
            let name = entry_name(&config.app.name, &prefix.join(&entry.relative));
            zip.start_file(name, options).map_err(io::Error::other)?;
            io::copy(&mut File::open(target.join(&entry.relative))?, &mut zip)?;
        }
    }

    let cursor = zip.finish().map_err(io::Error::other)?;
    Ok(cursor.into_inner())
}

/// Zip entry names always use `/`.
fn entry_name(root: &str, relative: &Path) -> String {
    let mut name = root.to_string();
    for component in relative.components() {
        if let Component::Normal(part) = component {
            name.push('/');
            name.push_str(&part.to_string_lossy());
        }
    }
    name
}

/// `Content-Disposition` header value for the bundle.
pub fn disposition(config: &ServerConfig) -> String {
    format!("attachment; filename={}.zip", config.app.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config_at;
    use std::{fs, io::Read};
    use tempfile::TempDir;

    #[test]
    fn test_bundle_contains_each_target_once() {
        let dir = TempDir::new().unwrap();
        let config = test_config_at(dir.path(), "content");
        let home = &config.app.home;
        fs::create_dir_all(home.join("tutorial/img")).unwrap();
        fs::create_dir_all(home.join("workspace")).unwrap();
        fs::write(home.join("tutorial/index.html"), "lesson").unwrap();
        fs::write(home.join("tutorial/img/a.png"), "png").unwrap();
        fs::write(home.join("workspace/main.py"), "print()").unwrap();

        let bytes = build_bundle(&config).unwrap();
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();

        let mut names: Vec<_> = zip.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(
            names,
            [
                "tutorial/tutorial/img/a.png",
                "tutorial/tutorial/index.html",
                "tutorial/workspace/main.py",
            ]
        );

        let mut body = String::new();
        zip.by_name("tutorial/workspace/main.py")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "print()");
    }

    #[test]
    fn test_bundle_skips_missing_targets() {
        let dir = TempDir::new().unwrap();
        let config = test_config_at(dir.path(), "content");

        let bytes = build_bundle(&config).unwrap();
        let zip = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(zip.len(), 0);
    }

    #[test]
    fn test_disposition() {
        let dir = TempDir::new().unwrap();
        let config = test_config_at(dir.path(), "content");
        assert_eq!(disposition(&config), "attachment; filename=tutorial.zip");
    }
}
