//! Error types for schema sources, configuration, and snapshots.

use std::path::PathBuf;

use argspec_core::{ImportError, SchemaError};
use thiserror::Error;

/// Errors that can occur while loading schemas or configuration.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A source decoded but failed load-time validation.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// A source validated but its imports could not be resolved.
    #[error(transparent)]
    Import(#[from] ImportError),

    /// A schema file whose extension is not `.json`, `.yaml`, or `.yml`.
    #[error("unsupported schema format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// No schema files were configured or found.
    #[error("no schema sources available")]
    NoSources,
}

impl StoreError {
    /// Process exit status: schema and import problems keep the core codes,
    /// everything else is 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Schema(err) => argspec_core::Error::from(err.clone()).exit_code(),
            Self::Import(err) => argspec_core::Error::from(err.clone()).exit_code(),
            _ => 1,
        }
    }
}

/// Convenience alias for results with [`StoreError`].
pub type Result<T> = std::result::Result<T, StoreError>;
