//! `[live]` section configuration.
//!
//! Settings for the CGI bridge used by `live` parts.
//!
//! # Example
//!
//! ```toml
//! [live]
//! interpreter = "php-cgi"             # Program spawned per request
//! timeout = 30                        # Seconds before the child is killed
//! extensions = ["php"]                # Files executed instead of served
//! index = ["index.html", "index.php"] # Directory index candidates
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::config::{ConfigDiagnostics, FieldPath};

/// CGI bridge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub interpreter: String,
    pub timeout: u64,
    pub extensions: Vec<String>,
    pub index: Vec<String>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            interpreter: "php-cgi".to_string(),
            timeout: 30,
            extensions: vec!["php".to_string()],
            index: vec!["index.html".to_string(), "index.php".to_string()],
        }
    }
}

impl LiveConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Whether `path` is executed through the interpreter.
    pub fn is_script(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// Only checked when a live part is configured.
    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if self.timeout == 0 {
            diag.error(FieldPath::new("live.timeout"), "timeout must be at least 1 second");
        }
        if self.interpreter.trim().is_empty() {
            diag.error(FieldPath::new("live.interpreter"), "no interpreter configured");
        } else if which::which(&self.interpreter).is_err() {
            diag.warn(
                FieldPath::new("live.interpreter"),
                format!("`{}` not found in PATH, live parts will fail", self.interpreter),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_live_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.live.interpreter, "php-cgi");
        assert_eq!(config.live.timeout(), Duration::from_secs(30));
        assert_eq!(config.live.index, ["index.html", "index.php"]);
    }

    #[test]
    fn test_is_script() {
        let live = LiveConfig::default();
        assert!(live.is_script(Path::new("/w/index.php")));
        assert!(live.is_script(Path::new("/w/INDEX.PHP")));
        assert!(!live.is_script(Path::new("/w/style.css")));
        assert!(!live.is_script(Path::new("/w/php")));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let live = LiveConfig {
            timeout: 0,
            interpreter: "sh".to_string(),
            ..LiveConfig::default()
        };
        let mut diag = ConfigDiagnostics::new();
        live.validate(&mut diag);
        assert!(diag.has_errors());
    }
}
