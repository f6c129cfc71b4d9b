//! Error types for cached-venv
//!
//! All modules use `VenvResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for cached-venv operations
pub type VenvResult<T> = Result<T, VenvError>;

/// All errors that can occur while provisioning an environment
#[derive(Error, Debug)]
pub enum VenvError {
    // Input errors
    #[error("Environment name must not be empty")]
    EmptyName,

    #[error("Cache key field '{field}' must not contain '{separator}': {value}")]
    KeyFieldSeparator {
        field: &'static str,
        separator: &'static str,
        value: String,
    },

    #[error("Cache key field '{field}' must not contain a line break: {value:?}")]
    KeyFieldLineBreak { field: &'static str, value: String },

    #[error("'{field}' must be a single path component, got {value:?}")]
    InvalidPathComponent { field: &'static str, value: String },

    #[error("Output '{name}' cannot be written to {file}: {reason}")]
    OutputValue {
        name: &'static str,
        file: &'static str,
        reason: String,
    },

    #[error("Unsupported platform: {0}. Expected Linux, macOS or Windows.")]
    UnsupportedPlatform(String),

    // Interpreter errors
    #[error("Python interpreter not found: {program}")]
    InterpreterNotFound {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not determine Python version from {program}: {output}")]
    InterpreterVersion { program: String, output: String },

    #[error("Failed to create virtual environment at {path}: {stderr}")]
    VenvCreate { path: PathBuf, stderr: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Cache store errors
    #[error("Cache store error at {path}: {reason}")]
    CacheStore { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl VenvError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a cache store error
    pub fn store(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CacheStore {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::InterpreterNotFound { .. } => {
                Some("Install Python 3 or point --python at an interpreter")
            }
            Self::InterpreterVersion { .. } => Some("Pass --python-version explicitly"),
            Self::UnsupportedPlatform(_) => Some("Pass --os Linux, macOS or Windows"),
            Self::EmptyName => Some("Pass a non-empty --name"),
            Self::InvalidPathComponent { .. } => {
                Some("Use a plain name such as unit-tests, without '/', '\\' or '..'")
            }
            Self::KeyFieldLineBreak { .. } => Some("Strip trailing newlines from --cache-seed"),
            _ => None,
        }
    }
}
