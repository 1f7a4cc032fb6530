//! Error types for schema loading and identifier resolution.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type alias for schema loading.
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Errors raised while loading schema modules.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Module file could not be read.
    #[error("failed to read schema module {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Module file is not valid YAML or has the wrong shape.
    #[error("failed to parse schema module {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// No file for the module exists on any search path.
    #[error("schema module {module} not found in search paths {paths:?}")]
    ModuleNotFound { module: String, paths: Vec<PathBuf> },

    /// Module content is inconsistent.
    #[error("invalid schema module {module}: {message}")]
    Invalid { module: String, message: String },
}

impl SchemaError {
    pub fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn parse(path: &Path, source: serde_yaml::Error) -> Self {
        Self::Parse {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn invalid(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            module: module.into(),
            message: message.into(),
        }
    }
}

/// Errors raised by [`crate::Resolver::lookup`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The lookup string was empty.
    #[error("empty identifier")]
    Empty,

    /// No schema object matches the identifier.
    #[error("object not found: {item}")]
    NotFound { item: String },

    /// The instance suffix after the object name is not numeric.
    #[error("invalid instance suffix {suffix:?} in {item}")]
    InvalidInstance { item: String, suffix: String },
}

impl ResolveError {
    pub fn not_found(item: impl Into<String>) -> Self {
        Self::NotFound { item: item.into() }
    }

    pub fn invalid_instance(item: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self::InvalidInstance {
            item: item.into(),
            suffix: suffix.into(),
        }
    }
}
