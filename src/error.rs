//! Error types for gilt

use thiserror::Error;

use crate::ast::Pos;

/// Result type alias for gilt operations
pub type Result<T> = std::result::Result<T, GiltError>;

/// Main error type for compile, import and run operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GiltError {
    #[error("Parser error at line {line}, column {column}: {message}")]
    ParserError {
        line: usize,
        column: usize,
        message: String,
    },

    /// First static error of a `check_files` call.
    #[error("{pos}: {message}")]
    TypeError { pos: Pos, message: String },

    /// A foreign package that is neither bridged nor checkable from source.
    #[error(
        "error on import: problem with package '{path}' (not shadowed?): {cause}. \
         To shadow it, add a bridge table for '{path}' under src/stdlib and register it \
         in the bridge registry, or make its source reachable from a configured source root."
    )]
    SourceImport { path: String, cause: String },

    #[error(
        "deep source imports forbidden: problem with import of package '{path}' at depth {depth} \
         (limit {limit}); shadow the package instead of importing it from source"
    )]
    DeepImport {
        path: String,
        depth: usize,
        limit: usize,
    },

    #[error("Runtime error: {0}")]
    RuntimeError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for GiltError {
    fn from(err: std::io::Error) -> Self {
        GiltError::Io(err.to_string())
    }
}

impl GiltError {
    /// Import-resolution failures are fatal to the submission and never retried.
    pub fn is_import_error(&self) -> bool {
        matches!(
            self,
            GiltError::SourceImport { .. } | GiltError::DeepImport { .. }
        )
    }
}
