//! `[parts.<name>]` tables.
//!
//! # Example
//!
//! ```toml
//! [parts.tutorial]
//! type = "tutorial"       # tutorial | workspace | live
//! source = "tutorial"     # Subpath inside the fetched content
//! target = "tutorial"     # Subpath inside app.home
//! path = "lesson"         # Optional URL segment (defaults to the part name)
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Deployment and serving policy of a part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartKind {
    /// Read-only material, fully replaced on every deployment.
    Tutorial,
    /// User-editable files; deployment only adds missing files.
    Workspace,
    /// Served through the CGI bridge; never deployed itself.
    Live,
}

impl PartKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tutorial => "tutorial",
            Self::Workspace => "workspace",
            Self::Live => "live",
        }
    }
}

impl fmt::Display for PartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `[parts.<name>]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartConfig {
    #[serde(rename = "type")]
    pub kind: PartKind,

    /// Subpath inside the fetched content (defaults to the part name).
    #[serde(default)]
    pub source: Option<PathBuf>,

    /// Subpath inside `app.home` (defaults to the part name).
    #[serde(default)]
    pub target: Option<PathBuf>,

    /// URL segment override (defaults to the part name).
    #[serde(default)]
    pub path: Option<String>,
}

/// A configured part resolved against its name.
#[derive(Debug, Clone, Copy)]
pub struct Part<'a> {
    pub name: &'a str,
    pub config: &'a PartConfig,
}

impl<'a> Part<'a> {
    pub fn kind(&self) -> PartKind {
        self.config.kind
    }

    pub fn source(&self) -> PathBuf {
        self.config
            .source
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.name))
    }

    pub fn target(&self) -> PathBuf {
        self.config
            .target
            .clone()
            .unwrap_or_else(|| PathBuf::from(self.name))
    }

    /// URL segment this part is served under.
    pub fn url_segment(&self) -> &'a str {
        self.config
            .path
            .as_deref()
            .map(|p| p.trim_matches('/'))
            .unwrap_or(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_part_defaults_to_name() {
        let config = test_parse_config("");
        let part = config.part("workspace").unwrap();
        assert_eq!(part.kind(), PartKind::Workspace);
        assert_eq!(part.source(), PathBuf::from("workspace"));
        assert_eq!(part.url_segment(), "workspace");
    }

    #[test]
    fn test_part_overrides() {
        let config = test_parse_config(
            "[parts.extra]\ntype = \"tutorial\"\nsource = \"_static/x\"\ntarget = \"x\"\npath = \"/lesson/\"",
        );
        let part = config.part("extra").unwrap();
        assert_eq!(part.source(), PathBuf::from("_static/x"));
        assert_eq!(part.target(), PathBuf::from("x"));
        assert_eq!(part.url_segment(), "lesson");
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result: Result<PartConfig, _> = toml::from_str("type = \"notebook\"");
        assert!(result.is_err());
    }
}
