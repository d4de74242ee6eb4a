//! Merge configuration (`feedmerge.toml`).
//!
//! Every field is optional. A missing file yields all defaults; unknown keys
//! are rejected so typos do not silently fall back to defaults.

use std::fmt;
use std::path::{Path, PathBuf};

use gtfs_schema::Schema;
use serde::Deserialize;

use crate::error::MergeError;
use crate::feed::MergeType;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedmergeConfig {
    /// Merge behaviour.
    #[serde(default)]
    pub merge: MergeConfig,

    /// Log output.
    #[serde(default)]
    pub log: LogConfig,
}

// ---------------------------------------------------------------------------
// MergeConfig
// ---------------------------------------------------------------------------

/// Merge behaviour settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MergeConfig {
    /// Merge type used when the command line does not name one.
    #[serde(default, rename = "type")]
    pub merge_type: MergeType,

    /// Tables to leave out of the merged archive entirely.
    #[serde(default)]
    pub skip_tables: Vec<String>,

    /// Keep `feed_info` rows in namespace merges (dropped by default).
    #[serde(default)]
    pub include_feed_info: bool,

    /// Separator between a feed's id scope and a value (default `":"`).
    #[serde(default = "default_scope_separator")]
    pub scope_separator: String,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            merge_type: MergeType::default(),
            skip_tables: Vec::new(),
            include_feed_info: false,
            scope_separator: default_scope_separator(),
        }
    }
}

fn default_scope_separator() -> String {
    ":".to_owned()
}

impl MergeConfig {
    /// Prefix `value` with `scope`.
    #[must_use]
    pub fn scoped(&self, scope: &str, value: &str) -> String {
        format!("{scope}{}{value}", self.scope_separator)
    }

    /// Whether `table` is listed in `skip_tables`.
    #[must_use]
    pub fn skips(&self, table: &str) -> bool {
        self.skip_tables.iter().any(|t| t == table)
    }
}

// ---------------------------------------------------------------------------
// LogConfig
// ---------------------------------------------------------------------------

/// Log output settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Default filter directive when `RUST_LOG` is unset (e.g. `"debug"`).
    #[serde(default)]
    pub level: Option<String>,
}

/// Log line format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    /// Human-readable lines on stderr.
    #[default]
    Pretty,
    /// One JSON object per line on stderr.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Error loading a configuration file.
#[derive(Debug)]
pub struct ConfigError {
    /// The path that was being loaded (if available).
    pub path: Option<PathBuf>,
    /// Human-readable message with line-level detail when possible.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(p) = &self.path {
            write!(f, "{}: {}", p.display(), self.message)
        } else {
            write!(f, "config error: {}", self.message)
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for MergeError {
    fn from(err: ConfigError) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

impl FeedmergeConfig {
    /// Load configuration from a TOML file.
    ///
    /// - If the file does not exist, returns all defaults (not an error).
    /// - If the file exists but is invalid TOML, names unknown keys, or lists
    ///   tables the schema does not know, returns a [`ConfigError`].
    ///
    /// # Errors
    /// Returns `ConfigError` on I/O errors (other than not-found), parse
    /// errors, or failed validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ConfigError {
                    path: Some(path.to_owned()),
                    message: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|mut e| {
            e.path = Some(path.to_owned());
            e
        })
    }

    /// Parse and validate configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfigError` on invalid TOML, unknown fields, or failed
    /// validation.
    pub fn parse(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str).map_err(|e| {
            let mut message = e.message().to_owned();
            if let Some(span) = e.span() {
                let line = toml_str[..span.start]
                    .chars()
                    .filter(|&c| c == '\n')
                    .count()
                    + 1;
                message = format!("line {line}: {message}");
            }
            ConfigError {
                path: None,
                message,
            }
        })?;
        config.validate(&Schema::default())?;
        Ok(config)
    }

    /// Check settings against the table schema.
    ///
    /// # Errors
    /// Returns `ConfigError` when `skip_tables` names an unknown table or the
    /// scope separator is empty.
    pub fn validate(&self, schema: &Schema) -> Result<(), ConfigError> {
        if let Some(unknown) = self
            .merge
            .skip_tables
            .iter()
            .find(|t| !schema.contains(t))
        {
            let known = schema
                .tables()
                .iter()
                .map(|t| t.name)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ConfigError {
                path: None,
                message: format!(
                    "merge.skip_tables: unknown table '{unknown}'\n  To fix: use one of: {known}"
                ),
            });
        }
        if self.merge.scope_separator.is_empty() {
            return Err(ConfigError {
                path: None,
                message: "merge.scope_separator must not be empty".to_owned(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_all_fields() {
        let cfg = FeedmergeConfig::default();
        assert_eq!(cfg.merge.merge_type, MergeType::Namespace);
        assert!(cfg.merge.skip_tables.is_empty());
        assert!(!cfg.merge.include_feed_info);
        assert_eq!(cfg.merge.scope_separator, ":");
        assert_eq!(cfg.log.format, LogFormat::Pretty);
        assert_eq!(cfg.log.level, None);
    }

    #[test]
    fn parse_empty_string() {
        let cfg = FeedmergeConfig::parse("").unwrap();
        assert_eq!(cfg, FeedmergeConfig::default());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[merge]
type = "reconciling"
skip_tables = ["frequencies", "transfers"]
include_feed_info = true
scope_separator = "::"

[log]
format = "json"
level = "debug"
"#;
        let cfg = FeedmergeConfig::parse(toml).unwrap();
        assert_eq!(cfg.merge.merge_type, MergeType::Reconciling);
        assert_eq!(cfg.merge.skip_tables, vec!["frequencies", "transfers"]);
        assert!(cfg.merge.include_feed_info);
        assert_eq!(cfg.merge.scoped("Bart2", "R1"), "Bart2::R1");
        assert_eq!(cfg.log.format, LogFormat::Json);
        assert_eq!(cfg.log.level.as_deref(), Some("debug"));
    }

    #[test]
    fn legacy_merge_type_names_are_accepted() {
        let cfg = FeedmergeConfig::parse("[merge]\ntype = \"service-period\"\n").unwrap();
        assert_eq!(cfg.merge.merge_type, MergeType::Reconciling);
    }

    #[test]
    fn unknown_field_reports_line() {
        let err = FeedmergeConfig::parse("[merge]\nbogus = 1\n").unwrap_err();
        assert!(err.message.contains("line 2"), "{}", err.message);
    }

    #[test]
    fn unknown_skip_table_is_rejected() {
        let err = FeedmergeConfig::parse("[merge]\nskip_tables = [\"pathways\"]\n").unwrap_err();
        assert!(err.message.contains("pathways"));
        assert!(err.message.contains("To fix"));
    }

    #[test]
    fn empty_separator_is_rejected() {
        let err = FeedmergeConfig::parse("[merge]\nscope_separator = \"\"\n").unwrap_err();
        assert!(err.message.contains("scope_separator"));
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let cfg = FeedmergeConfig::load(Path::new("/nonexistent/feedmerge.toml")).unwrap();
        assert_eq!(cfg, FeedmergeConfig::default());
    }

    #[test]
    fn load_invalid_file_shows_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not valid [[[toml").unwrap();
        let err = FeedmergeConfig::load(&path).unwrap_err();
        assert_eq!(err.path.as_deref(), Some(path.as_path()));
        assert!(err.to_string().starts_with(&path.display().to_string()));
    }

    #[test]
    fn config_error_converts_to_merge_error() {
        let err: MergeError = ConfigError {
            path: None,
            message: "boom".into(),
        }
        .into();
        assert!(matches!(err, MergeError::Config { .. }));
    }
}
