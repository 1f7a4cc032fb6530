//! Worker pool fed from a line queue with a scripted runner.

use async_trait::async_trait;
use parking_lot::Mutex;
use pollerd::{EngineError, LineQueue, Order, OrderRunner, PoolStats, RetryPolicy, WorkerPool};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Fails "flaky" on its first attempt and "broken" always.
#[derive(Default)]
struct ScriptedRunner {
    attempts: Mutex<HashMap<String, usize>>,
}

impl ScriptedRunner {
    fn attempts(&self, target: &str) -> usize {
        self.attempts.lock().get(target).copied().unwrap_or(0)
    }
}

#[async_trait]
impl OrderRunner for ScriptedRunner {
    async fn run(&self, order: &Order) -> Result<(), EngineError> {
        let attempt = {
            let mut attempts = self.attempts.lock();
            let n = attempts.entry(order.target.clone()).or_default();
            *n += 1;
            *n
        };
        match order.target.as_str() {
            "flaky" if attempt == 1 => Err(EngineError::HostLocked {
                target: order.target.clone(),
            }),
            "broken" => Err(EngineError::NoOids {
                target: order.target.clone(),
            }),
            _ => Ok(()),
        }
    }
}

fn no_delay() -> RetryPolicy {
    RetryPolicy::new(Duration::ZERO, Duration::ZERO)
}

#[tokio::test]
async fn test_pool_settles_every_message() {
    let input: &[u8] = br#"{"target": "ok", "oids": ["sysName.0"], "mode": "get"}

{"Target": "flaky", "Oids": ["sysName.0"], "Mode": "Get"}
{"target": "broken"}
this is not an order
"#;
    let runner = Arc::new(ScriptedRunner::default());
    let pool = WorkerPool::start(runner.clone(), 2, no_delay());
    let mut queue = LineQueue::new(input);

    pool.consume(&mut queue).await.unwrap();
    let stats = pool.shutdown().await;

    assert_eq!(
        stats,
        PoolStats {
            ok: 2,
            failed: 3,
            requeued: 2,
            rejected: 1,
        }
    );
    assert_eq!(runner.attempts("ok"), 1);
    assert_eq!(runner.attempts("flaky"), 2);
    assert_eq!(runner.attempts("broken"), 2);
}

#[tokio::test]
async fn test_requeued_once_only() {
    struct AlwaysBusy;

    #[async_trait]
    impl OrderRunner for AlwaysBusy {
        async fn run(&self, order: &Order) -> Result<(), EngineError> {
            Err(EngineError::HostLocked {
                target: order.target.clone(),
            })
        }
    }

    let input: &[u8] = b"{\"target\": \"10.0.0.1\", \"oids\": [\"sysName.0\"]}\n";
    let pool = WorkerPool::start(Arc::new(AlwaysBusy), 1, no_delay());
    let mut queue = LineQueue::new(input);
    pool.consume(&mut queue).await.unwrap();

    let stats = pool.shutdown().await;
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.requeued, 1);
    assert_eq!(stats.ok, 0);
}

#[tokio::test]
async fn test_non_retryable_failure_still_requeued_once() {
    let input: &[u8] = b"{\"target\": \"broken\", \"oids\": []}\n";
    let runner = Arc::new(ScriptedRunner::default());
    let pool = WorkerPool::start(runner.clone(), 1, no_delay());
    let mut queue = LineQueue::new(input);
    pool.consume(&mut queue).await.unwrap();

    let stats = pool.shutdown().await;
    assert_eq!(runner.attempts("broken"), 2);
    assert_eq!(
        stats,
        PoolStats {
            ok: 0,
            failed: 2,
            requeued: 1,
            rejected: 0,
        }
    );
}
