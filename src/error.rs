//! Error types for the directory fingerprinting engine.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building, persisting, or decoding manifests.
///
/// Only root-level structural errors abort a whole build; per-entry
/// failures are downgraded to diagnostics and skip counts.
#[derive(Debug, Error)]
pub enum SigError {
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Unreadable: {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed manifest: {0}")]
    MalformedManifest(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SigError {
    /// Convenience constructor for read failures on a specific path.
    pub fn unreadable(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SigError::Unreadable {
            path: path.into(),
            source,
        }
    }

    /// Map an error to a process exit code for the driving CLI.
    ///
    /// Each fatal condition gets a distinct non-zero code so callers
    /// can script against the tool.
    pub fn exit_code(&self) -> i32 {
        match self {
            SigError::NotFound(_) => 2,
            SigError::NotADirectory(_) => 3,
            SigError::Unreadable { .. } => 4,
            SigError::MalformedManifest(_) => 5,
            _ => 1,
        }
    }
}

impl From<config::ConfigError> for SigError {
    fn from(err: config::ConfigError) -> Self {
        SigError::Config(err.to_string())
    }
}
