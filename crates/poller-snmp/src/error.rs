//! Error types for SNMP sessions.
//!
//! Every session operation returns [`SnmpError`]. Transport trouble
//! (connect, I/O, timeout) is kept apart from protocol trouble (decode,
//! error-status, exception values) so callers can log which side failed.
//!
//! Errors raised by a reply visitor are wrapped in [`SnmpError::Visitor`]
//! and end the walk at once.

use poller_types::Oid;
use std::io;
use thiserror::Error;

/// Result type alias for SNMP operations.
pub type Result<T> = std::result::Result<T, SnmpError>;

/// Errors that can occur while talking to an agent.
#[derive(Debug, Error)]
pub enum SnmpError {
    /// Address resolution or socket setup failed.
    #[error("session creation failed for {target}: {message}")]
    Connect { target: String, message: String },

    /// Socket send/receive failed.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),

    /// No response after all retries.
    #[error("request to {target} timed out after {attempts} attempts")]
    Timeout { target: String, attempts: u32 },

    /// Malformed message.
    #[error("malformed message: {0}")]
    Decode(String),

    /// A value or identifier cannot be encoded.
    #[error("cannot encode message: {0}")]
    Encode(String),

    /// The agent answered with a non-zero error-status.
    #[error("response error: {status} (index {index})")]
    ErrorStatus { status: &'static str, index: i64 },

    /// A Get was asked for no nodes at all.
    #[error("refusing to carry out GET for 0 nodes")]
    EmptyRequest,

    /// The first requested path is empty, which means the caller resolved
    /// nothing useful.
    #[error("corrupt oid-lookup, probably a bug: first path is blank")]
    CorruptLookup,

    /// An exception value arrived where it cannot be handled.
    #[error("unexpected {value} for {oid}")]
    Exception { oid: Oid, value: &'static str },

    /// The reply visitor aborted the operation.
    #[error("callback returned error: {0}")]
    Visitor(#[source] anyhow::Error),

    /// The transport has been closed.
    #[error("transport closed")]
    Closed,
}

impl SnmpError {
    pub fn connect(target: impl Into<String>, message: impl ToString) -> Self {
        Self::Connect {
            target: target.into(),
            message: message.to_string(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Returns true for failures that may go away when tried again later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SnmpError::Connect { .. } | SnmpError::Io(_) | SnmpError::Timeout { .. }
        )
    }
}

/// Returns the RFC 3416 name of an error-status value.
pub fn error_status_name(status: i64) -> &'static str {
    match status {
        0 => "noError",
        1 => "tooBig",
        2 => "noSuchName",
        3 => "badValue",
        4 => "readOnly",
        5 => "genErr",
        6 => "noAccess",
        7 => "wrongType",
        8 => "wrongLength",
        9 => "wrongEncoding",
        10 => "wrongValue",
        11 => "noCreation",
        12 => "inconsistentValue",
        13 => "resourceUnavailable",
        14 => "commitFailed",
        15 => "undoFailed",
        16 => "authorizationError",
        17 => "notWritable",
        18 => "inconsistentName",
        _ => "unknownError",
    }
}
