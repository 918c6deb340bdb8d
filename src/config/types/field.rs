//! Config field path used in diagnostics.

use owo_colors::OwoColorize;
use std::fmt;

/// A config field path such as `app.source` or `parts.tutorial.type`.
///
/// Static paths are declared as constants next to their section; per-part
/// paths are built at validation time with [`FieldPath::part`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath(String);

impl FieldPath {
    #[inline]
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Path of a field inside a `[parts.<name>]` table.
    pub fn part(name: &str, field: &str) -> Self {
        Self(format!("parts.{name}.{field}"))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_args!("`{}`", self.0).bright_blue())
    }
}

impl AsRef<str> for FieldPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_field_path() {
        assert_eq!(FieldPath::part("workspace", "type").as_str(), "parts.workspace.type");
        assert_eq!(FieldPath::new("app.source").as_ref(), "app.source");
    }
}
