//! Server configuration loaded from `tutorial.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/       # Configuration section definitions
//! │   ├── app        # [app]
//! │   ├── part       # [parts.<name>]
//! │   ├── serve      # [server]
//! │   └── live       # [live]
//! ├── types/         # ConfigError, ConfigDiagnostics, FieldPath
//! └── mod.rs         # ServerConfig (this file)
//! ```
//!
//! The configuration is built once at startup and shared as an
//! `Arc<ServerConfig>`; nothing mutates it afterwards.

pub mod section;
pub mod types;

pub use section::{AppConfig, LiveConfig, Part, PartConfig, PartKind, ServeConfig};
pub use types::{ConfigDiagnostics, ConfigError, FieldPath};

use crate::{cli::Cli, content::Source, log, utils::path::normalize_path};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Component, Path, PathBuf},
    str::FromStr,
};

/// URL segments used by the server's own routes.
pub const RESERVED_SEGMENTS: &[&str] = &["ready", "download", "refresh"];

/// Index candidates for non-live parts.
const DEFAULT_INDEX: &[&str] = &["index.html"];

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing tutorial.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Directory containing the config file; relative paths resolve here
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub app: AppConfig,

    #[serde(default)]
    pub parts: BTreeMap<String, PartConfig>,

    #[serde(default)]
    pub server: ServeConfig,

    #[serde(default)]
    pub live: LiveConfig,
}

impl ServerConfig {
    /// Load, normalize and validate the configuration named on the command line.
    pub fn load(cli: &Cli) -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to get current working directory")?;
        let config_path = normalize_path(&cwd.join(&cli.config));

        let mut config = Self::from_path(&config_path)?;
        let root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or(cwd);

        config.config_path = config_path;
        config.finalize(&root);
        config.apply_cli(cli);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })
        .map_err(ConfigError::Toml)?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {} are ignored: {}", display_path, fields.join(", "));
    }

    /// Resolve every configured path against `root`.
    pub fn finalize(&mut self, root: &Path) {
        self.root = normalize_path(root);
        self.app.home = Self::resolve_dir(&self.app.home, &self.root);
        self.app.tmp = Self::resolve_dir(&self.app.tmp, &self.root);
        if !self.app.source.trim().is_empty() {
            self.app.source = self.source_from(&self.app.source).to_string();
        }
    }

    fn source_from(&self, raw: &str) -> Source {
        Source::parse(raw, &self.root, self.app.token.clone())
    }

    /// Expand `~` and make `path` absolute relative to `root`.
    fn resolve_dir(path: &Path, root: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        let path = PathBuf::from(expanded);
        let full = if path.is_relative() {
            root.join(path)
        } else {
            path
        };
        normalize_path(&full)
    }

    fn apply_cli(&mut self, cli: &Cli) {
        crate::logger::set_verbose(cli.verbose);

        if let Some(prefix) = &cli.basepath {
            self.server.prefix = prefix.clone();
        }
        if let Some(interface) = cli.interface {
            self.server.interface = interface;
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
    }

    // ========================================================================
    // accessors
    // ========================================================================

    /// The content source descriptor for a deployment run.
    pub fn source(&self) -> Source {
        self.source_from(&self.app.source)
    }

    /// Configured parts in `app.parts` order; names without a table are skipped.
    pub fn parts(&self) -> impl Iterator<Item = Part<'_>> {
        let mut seen = HashSet::new();
        self.app
            .parts
            .iter()
            .filter(move |name| seen.insert(name.as_str()))
            .filter_map(|name| self.part(name))
    }

    /// Look up a part by name.
    pub fn part(&self, name: &str) -> Option<Part<'_>> {
        self.parts
            .get_key_value(name)
            .map(|(name, config)| Part {
                name: name.as_str(),
                config,
            })
    }

    /// Find the part served under the URL segment `segment`.
    pub fn part_by_segment(&self, segment: &str) -> Option<Part<'_>> {
        self.parts().find(|part| part.url_segment() == segment)
    }

    /// Part that `/` redirects to.
    pub fn default_part(&self) -> Option<Part<'_>> {
        match &self.app.default {
            Some(name) => self.parts().find(|p| p.name == name.as_str()),
            None => self.parts().next(),
        }
    }

    /// Absolute target directory of `part` inside the target tree.
    pub fn target_dir(&self, part: &Part<'_>) -> PathBuf {
        self.app.home.join(part.target())
    }

    /// Directory index candidates for `part`.
    pub fn index_for(&self, part: &Part<'_>) -> Vec<String> {
        match part.kind() {
            PartKind::Live => self.live.index.clone(),
            _ => DEFAULT_INDEX.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// URL prefix with a leading and no trailing slash.
    pub fn prefix(&self) -> String {
        self.server.normalized_prefix()
    }

    // ========================================================================
    // validation
    // ========================================================================

    /// Validate configuration, collecting all errors before returning.
    pub fn validate(&self) -> Result<()> {
        let diag = self.diagnostics();
        diag.print_warnings();
        diag.into_result()
            .map_err(|e| ConfigError::Diagnostics(e).into())
    }

    fn diagnostics(&self) -> ConfigDiagnostics {
        let mut diag = ConfigDiagnostics::new();

        self.app.validate(&mut diag);
        self.validate_parts(&mut diag);

        if let Some(default) = &self.app.default
            && self.parts().all(|p| p.name != default.as_str())
        {
            diag.error_with_hint(
                FieldPath::new("app.default"),
                format!("`{default}` is not a configured part"),
                "use one of the names listed in app.parts",
            );
        }

        if self.parts().any(|p| p.kind() == PartKind::Live) {
            self.live.validate(&mut diag);
        }

        if let Source::Local(path) = self.source()
            && !path.exists()
        {
            diag.warn(
                FieldPath::new("app.source"),
                format!("{} does not exist yet, deployment will fail", path.display()),
            );
        }

        diag
    }

    fn validate_parts(&self, diag: &mut ConfigDiagnostics) {
        for name in &self.app.parts {
            if !self.parts.contains_key(name) {
                diag.warn(
                    FieldPath::new("app.parts"),
                    format!("part `{name}` has no [parts.{name}] table and will be skipped"),
                );
            }
        }

        let mut segments = HashSet::new();
        for part in self.parts() {
            let segment = part.url_segment();
            let field = FieldPath::part(part.name, "path");
            if segment.is_empty() || segment.contains('/') {
                diag.error(field, format!("`{segment}` is not a single URL segment"));
            } else if RESERVED_SEGMENTS.contains(&segment) {
                diag.error_with_hint(
                    field,
                    format!("`{segment}` is reserved by the server"),
                    "set `path` to another URL segment",
                );
            } else if !segments.insert(segment) {
                diag.error(field, format!("URL segment `{segment}` is used by another part"));
            }

            if !is_plain_subpath(&part.source()) {
                diag.error_with_hint(
                    FieldPath::part(part.name, "source"),
                    format!("`{}` is not a subpath of the fetched content", part.source().display()),
                    "use a relative path without `..` or `.` segments",
                );
            }
            if !is_plain_subpath(&part.target()) {
                diag.error_with_hint(
                    FieldPath::part(part.name, "target"),
                    format!("`{}` is not a subpath of app.home", part.target().display()),
                    "use a relative path without `..` or `.` segments",
                );
            }
        }
    }
}

/// A non-empty relative path made only of plain names.
fn is_plain_subpath(path: &Path) -> bool {
    let mut components = path.components().peekable();
    components.peek().is_some() && components.all(|c| matches!(c, Component::Normal(_)))
}

impl FromStr for ServerConfig {
    type Err = anyhow::Error;

    /// Parse configuration from a TOML string, ignoring unknown fields.
    fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse a config whose `[app]` table is extended with `extra`.
///
/// Defines the parts `tutorial`, `workspace` and `live` (live shares the
/// workspace target). Panics on unknown fields to catch typos in tests.
#[cfg(test)]
pub fn test_parse_config(extra: &str) -> ServerConfig {
    let config = format!(
        "[app]\nsource = \"content\"\nparts = [\"tutorial\", \"workspace\", \"live\"]\n{extra}\n\
         [parts.tutorial]\ntype = \"tutorial\"\n\
         [parts.workspace]\ntype = \"workspace\"\n\
         [parts.live]\ntype = \"live\"\ntarget = \"workspace\"\n"
    );
    let (parsed, ignored) = ServerConfig::parse_with_ignored(&config).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}

/// Build a finalized config rooted at `root` with the given source.
#[cfg(test)]
pub fn test_config_at(root: &Path, source: &str) -> ServerConfig {
    let mut config = test_parse_config("");
    config.app.source = source.to_string();
    config.live.interpreter = "sh".to_string();
    config.finalize(root);
    config
}

// ============================================================================
// tests
// ============================================================================
