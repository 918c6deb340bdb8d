//! `[app]` section configuration.
//!
//! Describes where the tutorial content comes from and where it is deployed.
//!
//! # Example
//!
//! ```toml
//! [app]
//! name = "python-basics"                          # Download folder / file name
//! source = "https://example.com/python.tar.gz"    # URL or local path
//! token = "secret"                                # Optional bearer token for URLs
//! home = "./home"                                 # Target tree
//! tmp = "./tmp"                                   # Working tree (deleted after each run)
//! default = "tutorial"                            # Part that `/` redirects to
//! parts = ["tutorial", "workspace", "live"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::{ConfigDiagnostics, FieldPath};

/// Content source and deployment locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Tutorial name, used as the top-level folder of the download archive.
    pub name: String,

    /// Content source: `http(s)://` URL, local archive, or local directory.
    pub source: String,

    /// Bearer token sent with URL sources.
    pub token: Option<String>,

    /// Timeout in seconds for downloading a URL source.
    pub fetch_timeout: u64,

    /// Root of the target tree.
    pub home: PathBuf,

    /// Working tree used while fetching and extracting.
    pub tmp: PathBuf,

    /// Part that the root URL redirects to (defaults to the first part).
    pub default: Option<String>,

    /// Ordered part names; each needs a `[parts.<name>]` table.
    pub parts: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "tutorial".to_string(),
            source: String::new(),
            token: None,
            fetch_timeout: 300,
            home: PathBuf::from("home"),
            tmp: PathBuf::from("tmp"),
            default: None,
            parts: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.source.trim().is_empty() {
            diag.error_with_hint(
                FieldPath::new("app.source"),
                "no content source configured",
                "set a http(s) URL, an archive path or a directory path",
            );
        }
        if self.parts.is_empty() {
            diag.error(FieldPath::new("app.parts"), "at least one part is required");
        }
        if self.name.trim().is_empty() || self.name.contains(['/', '\\']) {
            diag.error(
                FieldPath::new("app.name"),
                format!("`{}` is not usable as a folder name", self.name),
            );
        }
        // The working tree is wiped after every run
        if self.home.starts_with(&self.tmp) || self.tmp.starts_with(&self.home) {
            diag.error_with_hint(
                FieldPath::new("app.tmp"),
                "working tree and target tree must not contain each other",
                "point app.home and app.tmp at separate directories",
            );
        }
    }
}
