//! Work queues feeding the worker pool.
//!
//! A [`Delivery`] is one message taken from an [`OrderSource`]; it must be
//! settled exactly once with ack, nack or reject.
//!
//! The Redis adapter implements a reliable list: consumers move messages
//! into `<queue>:processing` with BLMOVE and remove them from there when
//! settled. Messages are JSON [`Envelope`]s; a plain order body is accepted
//! as well.

use crate::error::QueueError;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::Notify;
use tracing::{debug, info, instrument, warn};

/// Seconds a consumer blocks in BLMOVE before polling again.
const BLOCK_TIMEOUT_SECS: f64 = 1.0;

/// One message taken from a queue.
#[async_trait]
pub trait Delivery: Send {
    fn body(&self) -> &[u8];

    /// True if this message has been handed out before.
    fn redelivered(&self) -> bool;

    async fn ack(self: Box<Self>) -> Result<(), QueueError>;

    /// Negative acknowledgement, optionally putting the message back.
    async fn nack(self: Box<Self>, requeue: bool) -> Result<(), QueueError>;

    /// Drops a message that can never be processed.
    async fn reject(self: Box<Self>) -> Result<(), QueueError>;
}

/// A stream of deliveries.
#[async_trait]
pub trait OrderSource: Send {
    /// Waits for the next message. `None` means the source is exhausted.
    async fn next(&mut self) -> Result<Option<Box<dyn Delivery>>, QueueError>;
}

/// Queue message wrapper carrying delivery state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// The order JSON.
    pub body: String,

    #[serde(default)]
    pub redelivered: bool,

    /// Unix time in milliseconds after which the message is dropped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl Envelope {
    pub fn new(body: impl Into<String>, ttl: Option<Duration>) -> Self {
        let expires_at = ttl.map(|ttl| Utc::now().timestamp_millis() + ttl.as_millis() as i64);
        Self {
            body: body.into(),
            redelivered: false,
            expires_at,
        }
    }

    /// Parses a raw list item. Anything that is not an envelope is taken
    /// as a plain order body.
    pub fn from_raw(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|_| Self {
            body: raw.to_string(),
            redelivered: false,
            expires_at: None,
        })
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at.is_some_and(|at| at <= now_ms)
    }

    pub fn encode(&self) -> Result<String, QueueError> {
        serde_json::to_string(self).map_err(QueueError::Encode)
    }
}

async fn open(url: &str) -> Result<ConnectionManager, QueueError> {
    let client = Client::open(url).map_err(|e| QueueError::redis("open", e))?;
    ConnectionManager::new(client)
        .await
        .map_err(|e| QueueError::redis("connect", e))
}

fn processing_list(queue: &str) -> String {
    format!("{}:processing", queue)
}

/// Consumer side of the Redis reliable list.
pub struct RedisQueue {
    conn: ConnectionManager,
    queue: String,
    processing: String,
}

impl RedisQueue {
    /// Connects and moves messages left in the processing list by a
    /// previous run back onto the queue.
    #[instrument(skip_all, fields(queue = %queue))]
    pub async fn connect(url: &str, queue: &str) -> Result<Self, QueueError> {
        let mut this = Self {
            conn: open(url).await?,
            queue: queue.to_string(),
            processing: processing_list(queue),
        };
        let recovered = this.recover().await?;
        if recovered > 0 {
            warn!(recovered, "Requeued messages left in processing list");
        }
        info!("Listening for orders");
        Ok(this)
    }

    async fn recover(&mut self) -> Result<usize, QueueError> {
        let mut recovered = 0;
        loop {
            let moved: Option<String> = redis::cmd("LMOVE")
                .arg(&self.processing)
                .arg(&self.queue)
                .arg("RIGHT")
                .arg("LEFT")
                .query_async(&mut self.conn)
                .await
                .map_err(|e| QueueError::redis("lmove", e))?;
            if moved.is_none() {
                return Ok(recovered);
            }
            recovered += 1;
        }
    }

    async fn settle(
        conn: &mut ConnectionManager,
        processing: &str,
        raw: &str,
    ) -> Result<(), QueueError> {
        let _: i64 = conn
            .lrem(processing, 1, raw)
            .await
            .map_err(|e| QueueError::redis("lrem", e))?;
        Ok(())
    }
}

#[async_trait]
impl OrderSource for RedisQueue {
    async fn next(&mut self) -> Result<Option<Box<dyn Delivery>>, QueueError> {
        loop {
            let raw: Option<String> = redis::cmd("BLMOVE")
                .arg(&self.queue)
                .arg(&self.processing)
                .arg("LEFT")
                .arg("RIGHT")
                .arg(BLOCK_TIMEOUT_SECS)
                .query_async(&mut self.conn)
                .await
                .map_err(|e| QueueError::redis("blmove", e))?;
            let Some(raw) = raw else {
                continue;
            };

            let envelope = Envelope::from_raw(&raw);
            if envelope.is_expired(Utc::now().timestamp_millis()) {
                debug!(queue = %self.queue, "dropping expired message");
                Self::settle(&mut self.conn, &self.processing, &raw).await?;
                continue;
            }

            return Ok(Some(Box::new(RedisDelivery {
                conn: self.conn.clone(),
                queue: self.queue.clone(),
                processing: self.processing.clone(),
                raw,
                envelope,
            })));
        }
    }
}

struct RedisDelivery {
    conn: ConnectionManager,
    queue: String,
    processing: String,
    raw: String,
    envelope: Envelope,
}

#[async_trait]
impl Delivery for RedisDelivery {
    fn body(&self) -> &[u8] {
        self.envelope.body.as_bytes()
    }

    fn redelivered(&self) -> bool {
        self.envelope.redelivered
    }

    async fn ack(mut self: Box<Self>) -> Result<(), QueueError> {
        RedisQueue::settle(&mut self.conn, &self.processing, &self.raw).await
    }

    async fn nack(mut self: Box<Self>, requeue: bool) -> Result<(), QueueError> {
        if !requeue {
            return RedisQueue::settle(&mut self.conn, &self.processing, &self.raw).await;
        }
        let mut again = self.envelope.clone();
        again.redelivered = true;
        let encoded = again.encode()?;
        let _: () = redis::pipe()
            .atomic()
            .lrem(&self.processing, 1, &self.raw)
            .ignore()
            .rpush(&self.queue, encoded)
            .ignore()
            .query_async(&mut self.conn)
            .await
            .map_err(|e| QueueError::redis("requeue", e))?;
        Ok(())
    }

    async fn reject(mut self: Box<Self>) -> Result<(), QueueError> {
        RedisQueue::settle(&mut self.conn, &self.processing, &self.raw).await
    }
}

/// Producer side of the Redis reliable list.
pub struct RedisPublisher {
    conn: ConnectionManager,
    queue: String,
}

impl RedisPublisher {
    pub async fn connect(url: &str, queue: &str) -> Result<Self, QueueError> {
        Ok(Self {
            conn: open(url).await?,
            queue: queue.to_string(),
        })
    }

    /// Appends `body` to the queue. Returns the encoded size.
    pub async fn publish(&mut self, body: &str, ttl: Option<Duration>) -> Result<usize, QueueError> {
        let encoded = Envelope::new(body, ttl).encode()?;
        let _: i64 = self
            .conn
            .rpush(&self.queue, &encoded)
            .await
            .map_err(|e| QueueError::redis("rpush", e))?;
        Ok(encoded.len())
    }
}

#[derive(Debug, Default)]
struct LineShared {
    requeued: Mutex<VecDeque<Vec<u8>>>,
    outstanding: AtomicUsize,
    settled: Notify,
}

impl LineShared {
    fn settle(&self, requeue: Option<Vec<u8>>) {
        if let Some(body) = requeue {
            self.requeued.lock().push_back(body);
        }
        self.outstanding.fetch_sub(1, Ordering::AcqRel);
        self.settled.notify_one();
    }
}

/// One JSON order per line, for ad-hoc runs from stdin or a file.
///
/// Requeued orders are handed out again before new lines. The source is
/// exhausted once input ends and every delivery has been settled.
pub struct LineQueue<R> {
    lines: Lines<R>,
    eof: bool,
    shared: Arc<LineShared>,
}

impl LineQueue<BufReader<tokio::io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin + Send> LineQueue<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            eof: false,
            shared: Arc::new(LineShared::default()),
        }
    }

    fn deliver(&self, body: Vec<u8>, redelivered: bool) -> Box<dyn Delivery> {
        self.shared.outstanding.fetch_add(1, Ordering::AcqRel);
        Box::new(LineDelivery {
            body,
            redelivered,
            shared: Arc::clone(&self.shared),
        })
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> OrderSource for LineQueue<R> {
    async fn next(&mut self) -> Result<Option<Box<dyn Delivery>>, QueueError> {
        loop {
            let requeued = self.shared.requeued.lock().pop_front();
            if let Some(body) = requeued {
                return Ok(Some(self.deliver(body, true)));
            }

            if !self.eof {
                // a settled delivery may have been requeued while we wait for input
                let read = tokio::select! {
                    line = self.lines.next_line() => Some(line?),
                    _ = self.shared.settled.notified() => None,
                };
                match read {
                    Some(Some(line)) if line.trim().is_empty() => {}
                    Some(Some(line)) => return Ok(Some(self.deliver(line.into_bytes(), false))),
                    Some(None) => self.eof = true,
                    None => {}
                }
                continue;
            }

            if self.shared.outstanding.load(Ordering::Acquire) == 0 {
                return Ok(None);
            }
            self.shared.settled.notified().await;
        }
    }
}

struct LineDelivery {
    body: Vec<u8>,
    redelivered: bool,
    shared: Arc<LineShared>,
}

#[async_trait]
impl Delivery for LineDelivery {
    fn body(&self) -> &[u8] {
        &self.body
    }

    fn redelivered(&self) -> bool {
        self.redelivered
    }

    async fn ack(self: Box<Self>) -> Result<(), QueueError> {
        self.shared.settle(None);
        Ok(())
    }

    async fn nack(self: Box<Self>, requeue: bool) -> Result<(), QueueError> {
        let this = *self;
        this.shared.settle(requeue.then_some(this.body));
        Ok(())
    }

    async fn reject(self: Box<Self>) -> Result<(), QueueError> {
        self.shared.settle(None);
        Ok(())
    }
}
