//! Queue-driven SNMP telemetry poller.
//!
//! Orders arrive on a work queue, a fixed pool of workers runs each one
//! through the [`Engine`], and every successful poll becomes one
//! [`ResultRecord`] handed to the configured [`Sink`].
//!
//! - [`config`]: TOML configuration
//! - [`order`]: the order model
//! - [`engine`]: per-order dispatch, target locking, index map caching
//! - [`queue`]: Redis and line-based work queues
//! - [`worker`]: the worker pool and retry policy
//! - [`sink`]: stdout, file and HTTP sinks

pub mod config;
pub mod engine;
pub mod error;
pub mod index_map;
pub mod inventory;
pub mod logging;
pub mod order;
pub mod queue;
pub mod record;
pub mod shape;
pub mod sink;
pub mod worker;

pub use config::{PollerConfig, QueueKind, SinkConfig};
pub use engine::{Engine, OrderRunner};
pub use error::{ConfigError, EngineError, MapError, PollerError, QueueError, Result, SinkError};
pub use index_map::{build_index_map, IndexMap, IndexMapCache};
pub use inventory::{Host, HostGuard, HostLocks, Inventory, StaticInventory};
pub use order::{Mode, Order, ResultShape, DEFAULT_MAP_KEY};
pub use queue::{Delivery, Envelope, LineQueue, OrderSource, RedisPublisher, RedisQueue};
pub use record::{Metadata, RecordData, ResultRecord};
pub use sink::{build_sink, HttpSink, MemorySink, Sink, WriterSink};
pub use worker::{PoolStats, RetryPolicy, WorkerPool};
