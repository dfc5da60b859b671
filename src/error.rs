//! Error types for the operations that are allowed to fail loudly.
//!
//! Detection and catalog loading never surface errors; they degrade to
//! `None` or an empty catalog.  The types here cover process invocation
//! (converted to `None` by callers), persistence, configuration, and the two
//! user-facing validations: picking a PHP binary and picking a directory.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single external process invocation.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("'{program}' produced more than {limit} bytes of output")]
    OutputTooLarge { program: String, limit: usize },

    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("failed to read output of '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// The user picked something that is not a working PHP interpreter.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error(
        "'{}' is not a valid PHP binary. Please select the correct PHP executable.",
        .0.display()
    )]
    InvalidBinary(PathBuf),
}

/// The user picked a directory that is not a WordPress installation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("'{}' is not a WordPress installation", .0.display())]
    NotWordPress(PathBuf),

    #[error("'{}' is no longer a valid WordPress installation", .0.display())]
    NoLongerWordPress(PathBuf),
}

/// Failure to persist or read the catalog store file.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store file {} is not valid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("store writer task failed: {0}")]
    Writer(#[from] tokio::task::JoinError),
}

/// Failure to read the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}
