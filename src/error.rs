//! Error types for the capability host.
//!
//! Errors are split by the boundary that contains them: `LoadError` stays
//! inside a single file's reload, `BehaviorError` stays inside a single
//! invocation, and `ApiError` is what the host surfaces to its caller.

use std::path::PathBuf;
use thiserror::Error;

/// Crate-level error returned by host, config, server and CLI operations.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("Capability not found: {0}")]
    CapabilityNotFound(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Invocation failed: {0}")]
    InvocationFailed(String),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

/// Why a capability file could not be turned into descriptors.
///
/// A missing file is not an error: the loader reports it as its own outcome.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported capability file extension: {0}")]
    UnsupportedExtension(PathBuf),

    #[error("Failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("{path} must contain a top-level table of exports")]
    NotATable { path: PathBuf },

    #[error("Export '{export}' in {path} is malformed: {message}")]
    InvalidExport {
        path: PathBuf,
        export: String,
        message: String,
    },

    #[error("Export '{export}' in {path} declares an invalid input schema: {message}")]
    InvalidSchema {
        path: PathBuf,
        export: String,
        message: String,
    },
}

/// Failure raised while executing a capability's behavior.
#[derive(Error, Debug)]
pub enum BehaviorError {
    #[error("Failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Command exited with status {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("Command output is not valid JSON: {0}")]
    InvalidOutput(String),

    #[error("Command timed out after {0} ms")]
    Timeout(u64),

    #[error("Invocation cancelled")]
    Cancelled,

    #[error("Template references missing argument '{0}'")]
    MissingArgument(String),

    #[error("Behavior panicked: {0}")]
    Panicked(String),
}
