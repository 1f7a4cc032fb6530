//! Error types for the poller daemon.
//!
//! Every failure of an order surfaces as one [`EngineError`] carrying the
//! target and the stage that failed. The worker pool requeues any first
//! failure and logs [`EngineError::is_retryable`] alongside it, so an
//! operator can tell transient trouble from orders that need fixing.
//!
//! Startup problems are [`PollerError`]s.

use poller_schema::{ResolveError, SchemaError};
use poller_snmp::SnmpError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for daemon startup and plumbing.
pub type Result<T> = std::result::Result<T, PollerError>;

/// Errors that abort startup or the main loop.
#[derive(Debug, Error)]
pub enum PollerError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The OID schema files could not be loaded.
    #[error("schema loading failed: {0}")]
    Schema(#[from] SchemaError),

    /// The work queue could not be reached.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// The output sink could not be opened.
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid TOML for this schema.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range or missing.
    #[error("invalid configuration for {field}: {message}")]
    Invalid { field: String, message: String },

    /// The tracing subscriber could not be installed.
    #[error("failed to set logger: {0}")]
    Logging(String),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Failure to build an index map.
#[derive(Debug, Error)]
pub enum MapError {
    /// A column name is not in the schema.
    #[error("lookup of oid failed: {0}")]
    Resolve(#[from] ResolveError),

    /// A column resolved to the root path.
    #[error("column {column} resolved to an empty path")]
    EmptyColumn { column: String },

    /// Walking the column failed.
    #[error("walk failed: {0}")]
    Walk(#[from] SnmpError),

    /// A reply whose trailer is not exactly one integer index.
    #[error("malformed reply: {oid} is not a single index below {column}")]
    MalformedReply { column: String, oid: String },
}

/// Failure of one order. Carries the target and the stage that failed.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Another order for the same target is running.
    #[error("{target}: unable to acquire host lock")]
    HostLocked { target: String },

    /// No session could be opened to the target.
    #[error("{target}: session creation failed: {source}")]
    Session {
        target: String,
        #[source]
        source: SnmpError,
    },

    /// A requested OID name is not in the schema.
    #[error("{target}: unable to look up oid {oid}: {source}")]
    Resolve {
        target: String,
        oid: String,
        #[source]
        source: ResolveError,
    },

    /// The order named nothing to poll.
    #[error("{target}: 0 oids to poll")]
    NoOids { target: String },

    /// The element filter is not a valid regex.
    #[error("{target}: invalid element pattern {pattern:?}: {source}")]
    InvalidElementPattern {
        target: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// An index map walk failed.
    #[error("{target}: failed to build {key} map: {source}")]
    IndexMap {
        target: String,
        key: String,
        #[source]
        source: MapError,
    },

    /// The Get or walk for the requested OIDs failed.
    #[error("{target}: snmp get/walk failed: {source}")]
    Poll {
        target: String,
        #[source]
        source: SnmpError,
    },

    /// The collected metrics could not be delivered.
    #[error("{target}: send failed: {source}")]
    Send {
        target: String,
        #[source]
        source: SinkError,
    },
}

impl EngineError {
    pub fn target(&self) -> &str {
        match self {
            EngineError::HostLocked { target }
            | EngineError::Session { target, .. }
            | EngineError::Resolve { target, .. }
            | EngineError::NoOids { target }
            | EngineError::InvalidElementPattern { target, .. }
            | EngineError::IndexMap { target, .. }
            | EngineError::Poll { target, .. }
            | EngineError::Send { target, .. } => target,
        }
    }

    /// Whether running the same order again is likely to succeed without
    /// outside changes. Only reported; requeueing does not depend on it.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::NoOids { .. }
            | EngineError::InvalidElementPattern { .. }
            | EngineError::Resolve { .. } => false,
            EngineError::IndexMap {
                source: MapError::Resolve(_),
                ..
            } => false,
            EngineError::Poll { source, .. } => {
                !matches!(source, SnmpError::EmptyRequest | SnmpError::CorruptLookup)
            }
            _ => true,
        }
    }
}

/// Errors from the work queue.
#[derive(Debug, Error)]
pub enum QueueError {
    /// A Redis command failed.
    #[error("redis operation failed: {operation}: {source}")]
    Redis {
        operation: &'static str,
        #[source]
        source: redis::RedisError,
    },

    /// A message could not be serialized for requeueing.
    #[error("failed to encode queue message: {0}")]
    Encode(#[source] serde_json::Error),

    /// Reading orders from the file source failed.
    #[error("failed to read orders: {0}")]
    Io(#[from] io::Error),
}

impl QueueError {
    pub fn redis(operation: &'static str, source: redis::RedisError) -> Self {
        Self::Redis { operation, source }
    }
}

/// Errors from a result sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// A record could not be serialized.
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    /// Writing a record to the output failed.
    #[error("failed to write record: {0}")]
    Io(#[from] io::Error),

    /// The HTTP request could not be sent.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The HTTP endpoint answered with a non-success status.
    #[error("http sink returned status {status}")]
    Status { status: u16 },
}
