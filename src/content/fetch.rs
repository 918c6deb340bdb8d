//! Content fetching: turn a source descriptor into a local content directory.
//!
//! ```text
//! Remote(url) ──download+sniff──▶ Archive(path, kind) ──extract──▶ content/
//!                                      ▲                              │
//!                                      └── single nested archive ◀────┘
//! Directory(path) ──copy──▶ content/
//! ```
//!
//! Every transition counts against [`MAX_DEPTH`].

use reqwest::blocking::Client;
use std::{
    fmt, fs, io,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use url::Url;

use super::archive::{ArchiveError, ArchiveKind};
use crate::{
    debug,
    utils::path::{copy_dir_all, remove_dir_if_exists, walk_relative},
};

/// Maximum number of fetch stages before giving up.
pub const MAX_DEPTH: usize = 4;

/// Where the tutorial content comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// `http(s)://` URL, fetched with an optional bearer token.
    Remote { url: Url, token: Option<String> },
    /// Local archive or directory.
    Local(PathBuf),
}

impl Source {
    /// Parse a configured source; relative local paths resolve against `root`.
    pub fn parse(raw: &str, root: &Path, token: Option<String>) -> Self {
        let raw = raw.trim();
        if let Ok(url) = Url::parse(raw)
            && matches!(url.scheme(), "http" | "https")
        {
            return Self::Remote { url, token };
        }

        let expanded = PathBuf::from(shellexpand::tilde(raw).into_owned());
        if expanded.is_absolute() {
            Self::Local(expanded)
        } else {
            Self::Local(root.join(expanded))
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote { url, .. } => write!(f, "{url}"),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed")]
    Request {
        url: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: Url, status: u16 },

    #[error("`{0}` is not a zip, tar.bz2 or tar.gz archive")]
    Unsupported(PathBuf),

    #[error("source `{0}` does not exist")]
    Missing(PathBuf),

    #[error("archives nested deeper than {MAX_DEPTH} levels")]
    TooDeep,

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("I/O error at `{path}`")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One step of the fetch loop.
#[derive(Debug)]
enum Stage {
    Remote { url: Url, token: Option<String> },
    Archive { path: PathBuf, kind: ArchiveKind },
    Directory(PathBuf),
}

/// Downloads and unpacks content into `<tmp>/content`.
#[derive(Debug)]
pub struct Fetcher {
    client: Client,
    tmp: PathBuf,
}

impl Fetcher {
    pub fn new(tmp: PathBuf, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tutorial-server/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, tmp })
    }

    /// Directory the content ends up in.
    pub fn content_dir(&self) -> PathBuf {
        self.tmp.join("content")
    }

    /// Fetch `source` and return the directory holding the unpacked content.
    ///
    /// The working directory must exist; nothing outside it is written.
    pub fn fetch(&self, source: &Source) -> Result<PathBuf, FetchError> {
        let content = self.content_dir();
        let mut stage = Self::initial_stage(source)?;

        for depth in 0..MAX_DEPTH {
            debug!("fetch"; "stage {}: {:?}", depth, stage);
            stage = match stage {
                Stage::Remote { url, token } => self.download(url, token.as_deref())?,
                Stage::Directory(dir) => {
                    copy_dir_all(&dir, &content).map_err(FetchError::io(&dir))?;
                    return Ok(content);
                }
                Stage::Archive { path, kind } => {
                    remove_dir_if_exists(&content).map_err(FetchError::io(&content))?;
                    kind.extract(&path, &content)?;
                    match self.take_nested_archive(&content, depth)? {
                        Some(next) => next,
                        None => return Ok(content),
                    }
                }
            };
        }

        Err(FetchError::TooDeep)
    }

    fn initial_stage(source: &Source) -> Result<Stage, FetchError> {
        let path = match source {
            Source::Remote { url, token } => {
                return Ok(Stage::Remote {
                    url: url.clone(),
                    token: token.clone(),
                });
            }
            Source::Local(path) => path,
        };

        if let Some(kind) = ArchiveKind::from_suffix(path)
            && path.is_file()
        {
            return Ok(Stage::Archive {
                path: path.clone(),
                kind,
            });
        }
        if path.is_dir() {
            return Ok(Stage::Directory(path.clone()));
        }
        if !path.exists() {
            return Err(FetchError::Missing(path.clone()));
        }

        match ArchiveKind::sniff(path).map_err(FetchError::io(path))? {
            Some(kind) => Ok(Stage::Archive {
                path: path.clone(),
                kind,
            }),
            None => Err(FetchError::Unsupported(path.clone())),
        }
    }

    /// Stream `url` to `<tmp>/download`, then rename it after its sniffed format.
    fn download(&self, url: Url, token: Option<&str>) -> Result<Stage, FetchError> {
        let request_err = |source| FetchError::Request {
            url: url.clone(),
            source,
        };

        let mut request = self.client.get(url.clone());
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        let mut response = request.send().map_err(request_err)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let download = self.tmp.join("download");
        let mut file = fs::File::create(&download).map_err(FetchError::io(&download))?;
        let bytes = response.copy_to(&mut file).map_err(request_err)?;
        drop(file);
        debug!("fetch"; "downloaded {} bytes from {}", bytes, url);

        let kind = ArchiveKind::sniff(&download)
            .map_err(FetchError::io(&download))?
            .ok_or_else(|| FetchError::Unsupported(download.clone()))?;
        let renamed = self.tmp.join(format!("download.{}", kind.extension()));
        fs::rename(&download, &renamed).map_err(FetchError::io(&download))?;

        Ok(Stage::Archive {
            path: renamed,
            kind,
        })
    }

    /// If `content` holds exactly one regular file and it is an archive,
    /// move it out of the way and return the stage that unpacks it.
    fn take_nested_archive(&self, content: &Path, depth: usize) -> Result<Option<Stage>, FetchError> {
        let entries = walk_relative(content).map_err(FetchError::io(content))?;
        let [entry] = entries.as_slice() else {
            return Ok(None);
        };
        if entry.is_dir {
            return Ok(None);
        }

        let inner = content.join(&entry.relative);
        let Some(kind) = ArchiveKind::sniff(&inner).map_err(FetchError::io(&inner))? else {
            return Ok(None);
        };

        let moved = self.tmp.join(format!("nested-{depth}.{}", kind.extension()));
        fs::rename(&inner, &moved).map_err(FetchError::io(&inner))?;
        debug!("fetch"; "unwrapping nested {} archive {}", kind, entry.relative.display());
        Ok(Some(Stage::Archive { path: moved, kind }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::archive::fixtures::*;
    use tempfile::TempDir;

    fn fetcher(dir: &TempDir) -> Fetcher {
        let tmp = dir.path().join("tmp");
        fs::create_dir_all(&tmp).unwrap();
        Fetcher::new(tmp, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_source_parse() {
        let root = Path::new("/srv");
        assert!(matches!(
            Source::parse("https://example.com/a.zip", root, None),
            Source::Remote { .. }
        ));
        assert_eq!(
            Source::parse("content.zip", root, None),
            Source::Local(PathBuf::from("/srv/content.zip"))
        );
        assert_eq!(
            Source::parse("/data/tutorial", root, Some("ignored".into())),
            Source::Local(PathBuf::from("/data/tutorial"))
        );
        assert!(matches!(
            Source::parse("ftp://example.com/a.zip", root, None),
            Source::Local(_)
        ));
    }

    #[test]
    fn test_fetch_local_directory() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("tutorial")).unwrap();
        fs::write(src.join("tutorial/index.html"), "hi").unwrap();

        let fetcher = fetcher(&dir);
        let content = fetcher.fetch(&Source::Local(src)).unwrap();
        assert_eq!(fs::read_to_string(content.join("tutorial/index.html")).unwrap(), "hi");
    }

    #[test]
    fn test_fetch_local_archive_by_suffix() {
        let dir = TempDir::new().unwrap();
        let archive = dir.path().join("content.tar.gz");
        write_tar_gz(&archive, &[("workspace/main.py", b"print(1)")]);

        let fetcher = fetcher(&dir);
        let content = fetcher.fetch(&Source::Local(archive)).unwrap();
        assert_eq!(
            fs::read_to_string(content.join("workspace/main.py")).unwrap(),
            "print(1)"
        );
    }

    #[test]
    fn test_fetch_unwraps_nested_archive() {
        let dir = TempDir::new().unwrap();
        let inner = dir.path().join("inner.tar.bz2");
        write_tar_bz2(&inner, &[("tutorial/index.html", b"nested")]);
        let outer = dir.path().join("outer.zip");
        write_zip(&outer, &[("bundle.bin", &fs::read(&inner).unwrap())]);

        let fetcher = fetcher(&dir);
        let content = fetcher.fetch(&Source::Local(outer)).unwrap();
        assert_eq!(
            fs::read_to_string(content.join("tutorial/index.html")).unwrap(),
            "nested"
        );
        assert!(!content.join("bundle.bin").exists());
    }

    #[test]
    fn test_fetch_gives_up_on_endless_nesting() {
        let dir = TempDir::new().unwrap();
        let mut current = dir.path().join("level0.zip");
        write_zip(&current, &[("leaf.txt", b"leaf")]);
        for level in 1..=MAX_DEPTH {
            let next = dir.path().join(format!("level{level}.zip"));
            write_zip(&next, &[("inner.zip", &fs::read(&current).unwrap())]);
            current = next;
        }

        let fetcher = fetcher(&dir);
        let result = fetcher.fetch(&Source::Local(current));
        assert!(matches!(result, Err(FetchError::TooDeep)));
    }

    #[test]
    fn test_fetch_missing_source() {
        let dir = TempDir::new().unwrap();
        let fetcher = fetcher(&dir);
        let result = fetcher.fetch(&Source::Local(dir.path().join("nope")));
        assert!(matches!(result, Err(FetchError::Missing(_))));
    }

    #[test]
    fn test_fetch_unrecognized_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("content.bin");
        fs::write(&file, "just text").unwrap();

        let fetcher = fetcher(&dir);
        let result = fetcher.fetch(&Source::Local(file));
        assert!(matches!(result, Err(FetchError::Unsupported(_))));
    }
}
