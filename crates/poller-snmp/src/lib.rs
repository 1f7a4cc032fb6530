//! SNMPv2c protocol layer for the poller.
//!
//! - [`pdu`]: BER encoding of messages and PDUs
//! - [`Transport`] / [`Connector`]: request/response channels to an agent,
//!   with a UDP implementation ([`UdpTransport`], [`UdpConnector`])
//! - [`Session`]: batched Get and paginated BulkWalk over a transport
//! - [`MemoryAgent`]: an in-memory agent implementing both traits
//!
//! # Example
//!
//! ```ignore
//! use poller_snmp::{Session, SessionOptions, UdpConnector};
//!
//! let connector = UdpConnector::new(SessionOptions::default());
//! let mut session = Session::connect(&connector, "192.0.2.1", "public").await?;
//! session.bulk_walk(&nodes, |vb| {
//!     println!("{} = {}", vb.oid, vb.value);
//!     Ok(())
//! }).await?;
//! session.finalize().await;
//! ```

mod ber;
mod error;
mod memory;
pub mod pdu;
mod session;
mod transport;
mod udp;

pub use error::{error_status_name, Result, SnmpError};
pub use memory::{CallKind, MemoryAgent, RecordedCall};
pub use session::{Session, BULK_MAX_REPETITIONS, BULK_MAX_ROOTS, MAX_GET_OIDS};
pub use transport::{Connector, Response, SessionOptions, Transport, DEFAULT_PORT};
pub use udp::{UdpConnector, UdpTransport};
