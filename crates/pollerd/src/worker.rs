//! Worker pool and retry policy.

use crate::config::RetryConfig;
use crate::engine::OrderRunner;
use crate::error::QueueError;
use crate::order::Order;
use crate::queue::{Delivery, OrderSource};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Decides whether and when a failed order goes back on the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    base: Duration,
    jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn new(base: Duration, jitter: Duration) -> Self {
        Self { base, jitter }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.base_delay(), config.jitter())
    }

    /// A failed message goes back once; a redelivered one is dropped.
    pub fn should_requeue(&self, redelivered: bool) -> bool {
        !redelivered
    }

    /// Delay before handing a failed order back: base plus up to `jitter`.
    pub fn delay(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.base + Duration::from_millis(extra)
    }

    pub fn max_delay(&self) -> Duration {
        self.base + self.jitter
    }
}

/// Counters across all workers.
#[derive(Debug, Default)]
struct PoolCounters {
    ok: AtomicU64,
    failed: AtomicU64,
    requeued: AtomicU64,
    rejected: AtomicU64,
}

impl PoolCounters {
    fn snapshot(&self) -> PoolStats {
        PoolStats {
            ok: self.ok.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub ok: u64,
    pub failed: u64,
    pub requeued: u64,
    /// Messages dropped before reaching a worker (unparsable).
    pub rejected: u64,
}

struct Job {
    order: Order,
    delivery: Box<dyn Delivery>,
    _permit: OwnedSemaphorePermit,
}

/// Fixed set of workers sharing one job channel.
///
/// At most `workers + 1` messages are held at a time (running plus one
/// waiting), so a slow pool leaves the rest on the queue.
pub struct WorkerPool {
    sender: mpsc::Sender<Job>,
    handles: Vec<JoinHandle<()>>,
    permits: Arc<Semaphore>,
    counters: Arc<PoolCounters>,
}

impl WorkerPool {
    pub fn start(runner: Arc<dyn OrderRunner>, workers: usize, retry: RetryPolicy) -> Self {
        let workers = workers.max(1);
        let (sender, receiver) = mpsc::channel(1);
        let receiver = Arc::new(Mutex::new(receiver));
        let counters = Arc::new(PoolCounters::default());

        let handles = (0..workers)
            .map(|id| {
                tokio::spawn(worker_loop(
                    id,
                    Arc::clone(&receiver),
                    Arc::clone(&runner),
                    retry.clone(),
                    Arc::clone(&counters),
                ))
            })
            .collect();
        info!(workers, "Started workers");

        Self {
            sender,
            handles,
            permits: Arc::new(Semaphore::new(workers + 1)),
            counters,
        }
    }

    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }

    /// Feeds deliveries from `source` to the workers until it is exhausted.
    ///
    /// Unparsable messages are rejected here and never reach a worker.
    pub async fn consume(&self, source: &mut dyn OrderSource) -> Result<(), QueueError> {
        loop {
            let Ok(permit) = Arc::clone(&self.permits).acquire_owned().await else {
                return Ok(());
            };
            let Some(delivery) = source.next().await? else {
                debug!("order source exhausted");
                return Ok(());
            };

            let order = match Order::from_json(delivery.body()) {
                Ok(order) => order,
                Err(e) => {
                    warn!(error = %e, "order json unmarshal failed, rejecting");
                    self.counters.rejected.fetch_add(1, Ordering::Relaxed);
                    if let Err(e) = delivery.reject().await {
                        warn!(error = %e, "reject failed");
                    }
                    continue;
                }
            };

            let job = Job {
                order,
                delivery,
                _permit: permit,
            };
            if self.sender.send(job).await.is_err() {
                warn!("all workers gone, stopping consumption");
                return Ok(());
            }
        }
    }

    /// Lets the workers finish every job already handed over, then
    /// returns the final counters.
    pub async fn shutdown(self) -> PoolStats {
        let WorkerPool {
            sender,
            handles,
            counters,
            permits,
        } = self;
        drop(sender);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "worker task failed");
            }
        }
        permits.close();
        counters.snapshot()
    }
}

async fn worker_loop(
    id: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    runner: Arc<dyn OrderRunner>,
    retry: RetryPolicy,
    counters: Arc<PoolCounters>,
) {
    loop {
        let job = receiver.lock().await.recv().await;
        let Some(job) = job else {
            debug!(worker = id, "worker stopping");
            return;
        };
        process(id, job, runner.as_ref(), &retry, &counters).await;
    }
}

async fn process(
    id: usize,
    job: Job,
    runner: &dyn OrderRunner,
    retry: &RetryPolicy,
    counters: &PoolCounters,
) {
    let Job {
        order, delivery, ..
    } = job;
    let started = Instant::now();
    let result = runner.run(&order).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let settled = match result {
        Ok(()) => {
            counters.ok.fetch_add(1, Ordering::Relaxed);
            info!(
                worker = id,
                target = %order.target,
                id = order.id.as_deref(),
                outcome = "ok",
                elapsed_ms,
                "order OK"
            );
            delivery.ack().await
        }
        Err(e) => {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            let requeue = retry.should_requeue(delivery.redelivered());
            warn!(
                worker = id,
                target = %order.target,
                id = order.id.as_deref(),
                outcome = "failed",
                elapsed_ms,
                requeue,
                retryable = e.is_retryable(),
                error = %e,
                "order FAIL"
            );
            if requeue {
                counters.requeued.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(retry.delay()).await;
            }
            delivery.nack(requeue).await
        }
    };
    if let Err(e) = settled {
        warn!(worker = id, target = %order.target, error = %e, "failed to settle delivery");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_redelivered_is_never_requeued() {
        let policy = RetryPolicy::default();
        assert!(policy.should_requeue(false));
        assert!(!policy.should_requeue(true));
    }

    #[test]
    fn test_delay_within_jitter_bound() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_delay(), Duration::from_secs(10));
        for _ in 0..200 {
            let delay = policy.delay();
            assert!(delay >= Duration::from_secs(1), "{:?}", delay);
            assert!(delay <= Duration::from_secs(10), "{:?}", delay);
        }
        let fixed = RetryPolicy::new(Duration::from_millis(5), Duration::ZERO);
        assert_eq!(fixed.delay(), Duration::from_millis(5));
    }
}
