//! Session configuration
//!
//! Read from an optional `gilt.toml`; every key may be left out.
//! ```toml
//! test_mode = true
//! source_roots = ["./go"]
//! log_filter = "gilt=debug"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GiltError, Result};
use crate::typechecker::CheckConfig;

/// File looked for in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "gilt.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub disable_unused_import_check: bool,
    /// Check submissions as complete packages rather than prompt input
    pub full_package: bool,
    /// Allow test-only bridges such as `gitesting`
    pub test_mode: bool,
    /// Directories searched for imported Go source, after `vendor/`
    pub source_roots: Vec<PathBuf>,
    /// Suppress the REPL banner and result echo
    pub quiet: bool,
    /// `tracing` filter directive, e.g. `gilt=debug`
    pub log_filter: Option<String>,
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Config> {
        toml::from_str(text).map_err(|err| GiltError::ConfigError(err.to_string()))
    }

    pub fn load(path: &Path) -> Result<Config> {
        let text = fs::read_to_string(path)
            .map_err(|err| GiltError::ConfigError(format!("cannot read {}: {}", path.display(), err)))?;
        let config = Self::from_toml(&text)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Loads `path`, or `gilt.toml` if it exists, or the defaults
    pub fn discover(path: Option<&Path>) -> Result<Config> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => Self::load(Path::new(DEFAULT_CONFIG_FILE)),
            None => Ok(Config::default()),
        }
    }

    pub fn check_config(&self) -> CheckConfig {
        CheckConfig {
            disable_unused_import_check: self.disable_unused_import_check,
            full_package: self.full_package,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_for_missing_keys() {
        let config = Config::from_toml("test_mode = true\n").unwrap();
        assert_eq!(
            config,
            Config {
                test_mode: true,
                ..Config::default()
            }
        );
    }

    #[test]
    fn test_full_file() {
        let config = Config::from_toml(
            r#"
disable_unused_import_check = true
source_roots = ["go/src", "/opt/go"]
quiet = true
log_filter = "gilt=trace"
"#,
        )
        .unwrap();
        assert_eq!(config.source_roots, vec![PathBuf::from("go/src"), PathBuf::from("/opt/go")]);
        assert_eq!(config.log_filter.as_deref(), Some("gilt=trace"));
        assert_eq!(
            config.check_config(),
            CheckConfig {
                disable_unused_import_check: true,
                full_package: false,
            }
        );
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = Config::from_toml("colour = true\n").unwrap_err();
        assert!(matches!(err, GiltError::ConfigError(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Path::new("/definitely/not/here/gilt.toml")).unwrap_err();
        assert!(err.to_string().starts_with("Configuration error: cannot read"));
    }
}
