//! Request/response transports.

use crate::error::Result;
use async_trait::async_trait;
use poller_types::{Oid, VarBind};
use std::time::Duration;

/// Default agent port.
pub const DEFAULT_PORT: u16 = 161;

/// A decoded Response PDU.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub error_status: i64,
    pub error_index: i64,
    pub varbinds: Vec<VarBind>,
}

/// One request/response channel to one agent.
#[async_trait]
pub trait Transport: Send {
    /// Issues a GetRequest for `oids`.
    async fn get(&mut self, oids: &[Oid]) -> Result<Response>;

    /// Issues a GetBulkRequest for `oids`.
    async fn get_bulk(
        &mut self,
        oids: &[Oid],
        non_repeaters: u32,
        max_repetitions: u32,
    ) -> Result<Response>;

    /// Releases the underlying resources.
    async fn close(&mut self) {}
}

/// Opens transports to targets.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, target: &str, community: &str) -> Result<Box<dyn Transport>>;
}

/// Per-request behaviour of network transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub port: u16,
    pub timeout: Duration,
    pub retries: u32,
    /// Double the timeout after each unanswered attempt.
    pub exponential_timeout: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            timeout: Duration::from_secs(3),
            retries: 1,
            exponential_timeout: true,
        }
    }
}

impl SessionOptions {
    /// Timeout for the given zero-based attempt.
    pub fn timeout_for_attempt(&self, attempt: u32) -> Duration {
        if self.exponential_timeout {
            self.timeout.saturating_mul(1u32 << attempt.min(16))
        } else {
            self.timeout
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = SessionOptions::default();
        assert_eq!(opts.port, 161);
        assert_eq!(opts.timeout, Duration::from_secs(3));
        assert_eq!(opts.retries, 1);
        assert!(opts.exponential_timeout);
    }

    #[test]
    fn test_exponential_backoff() {
        let opts = SessionOptions::default();
        assert_eq!(opts.timeout_for_attempt(0), Duration::from_secs(3));
        assert_eq!(opts.timeout_for_attempt(1), Duration::from_secs(6));
        assert_eq!(opts.timeout_for_attempt(2), Duration::from_secs(12));

        let flat = SessionOptions {
            exponential_timeout: false,
            ..SessionOptions::default()
        };
        assert_eq!(flat.timeout_for_attempt(3), Duration::from_secs(3));
    }
}
