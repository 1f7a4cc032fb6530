//! In-memory agent for tests and dry runs.

use crate::error::{Result, SnmpError};
use crate::transport::{Connector, Response, Transport};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use poller_types::{Oid, ParseError, SnmpValue, VarBind};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Kind of request an agent received.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Get,
    GetBulk,
}

/// A request as seen by the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub kind: CallKind,
    pub oids: Vec<Oid>,
}

#[derive(Debug, Default)]
struct AgentState {
    data: RwLock<BTreeMap<Oid, SnmpValue>>,
    calls: Mutex<Vec<RecordedCall>>,
    connections: Mutex<Vec<(String, String)>>,
    latency: Mutex<Option<Duration>>,
    error_status: AtomicI64,
    refuse: AtomicBool,
    closed: AtomicUsize,
    rewrites: Mutex<BTreeMap<Oid, Oid>>,
}

/// An agent serving a sorted table of values.
///
/// Answers Get and GetBulk with the same semantics as a real agent
/// (repetition-major GetBulk ordering, `endOfMibView` past the last
/// object) and records every request. Clones share state, so a test can
/// keep a handle while the engine owns the connector.
#[derive(Debug, Clone, Default)]
pub struct MemoryAgent {
    state: Arc<AgentState>,
}

impl MemoryAgent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, oid: Oid, value: SnmpValue) {
        self.state.data.write().insert(oid, value);
    }

    /// Inserts entries given as dotted strings.
    pub fn load<'a>(
        &self,
        entries: impl IntoIterator<Item = (&'a str, SnmpValue)>,
    ) -> std::result::Result<(), ParseError> {
        let mut data = self.state.data.write();
        for (oid, value) in entries {
            data.insert(oid.parse()?, value);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.state.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.data.read().is_empty()
    }

    /// Opens a transport directly, bypassing [`Connector`].
    pub fn transport(&self) -> Box<dyn Transport> {
        Box::new(MemoryTransport {
            agent: self.clone(),
        })
    }

    /// Delays every response.
    pub fn set_latency(&self, latency: Duration) {
        *self.state.latency.lock() = Some(latency);
    }

    /// Makes every response carry `status` as error-status.
    pub fn fail_with_status(&self, status: i64) {
        self.state.error_status.store(status, Ordering::Relaxed);
    }

    /// Answers Get requests for `from` as if the value lived at `to`, like
    /// an agent that replies with a path nobody asked for.
    pub fn rewrite_reply(&self, from: Oid, to: Oid) {
        self.state.rewrites.lock().insert(from, to);
    }

    /// Makes [`Connector::connect`] fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.refuse.store(refuse, Ordering::Relaxed);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.calls.lock().clone()
    }

    /// Number of paths in each Get request, in order.
    pub fn get_sizes(&self) -> Vec<usize> {
        self.state
            .calls
            .lock()
            .iter()
            .filter(|c| c.kind == CallKind::Get)
            .map(|c| c.oids.len())
            .collect()
    }

    /// Targets and communities passed to [`Connector::connect`].
    pub fn connections(&self) -> Vec<(String, String)> {
        self.state.connections.lock().clone()
    }

    /// Number of closed transports.
    pub fn closed(&self) -> usize {
        self.state.closed.load(Ordering::Relaxed)
    }

    fn record(&self, kind: CallKind, oids: &[Oid]) {
        self.state.calls.lock().push(RecordedCall {
            kind,
            oids: oids.to_vec(),
        });
    }

    async fn delay(&self) {
        let latency = *self.state.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn status(&self) -> Option<Response> {
        let status = self.state.error_status.load(Ordering::Relaxed);
        if status == 0 {
            return None;
        }
        Some(Response {
            error_status: status,
            error_index: 1,
            varbinds: Vec::new(),
        })
    }

    fn successor(data: &BTreeMap<Oid, SnmpValue>, oid: &Oid) -> VarBind {
        match data
            .range((Bound::Excluded(oid), Bound::Unbounded))
            .next()
        {
            Some((next, value)) => VarBind::new(next.clone(), value.clone()),
            None => VarBind::new(oid.clone(), SnmpValue::EndOfMibView),
        }
    }
}

#[async_trait]
impl Connector for MemoryAgent {
    async fn connect(&self, target: &str, community: &str) -> Result<Box<dyn Transport>> {
        self.state
            .connections
            .lock()
            .push((target.to_string(), community.to_string()));
        if self.state.refuse.load(Ordering::Relaxed) {
            return Err(SnmpError::connect(target, "connection refused"));
        }
        Ok(self.transport())
    }
}

struct MemoryTransport {
    agent: MemoryAgent,
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn get(&mut self, oids: &[Oid]) -> Result<Response> {
        self.agent.record(CallKind::Get, oids);
        self.agent.delay().await;
        if let Some(failed) = self.agent.status() {
            return Ok(failed);
        }

        let data = self.agent.state.data.read();
        let rewrites = self.agent.state.rewrites.lock();
        let varbinds = oids
            .iter()
            .map(|oid| {
                let value = data.get(oid).cloned().unwrap_or(SnmpValue::NoSuchInstance);
                let reported = rewrites.get(oid).unwrap_or(oid);
                VarBind::new(reported.clone(), value)
            })
            .collect();
        Ok(Response {
            error_status: 0,
            error_index: 0,
            varbinds,
        })
    }

    async fn get_bulk(
        &mut self,
        oids: &[Oid],
        non_repeaters: u32,
        max_repetitions: u32,
    ) -> Result<Response> {
        self.agent.record(CallKind::GetBulk, oids);
        self.agent.delay().await;
        if let Some(failed) = self.agent.status() {
            return Ok(failed);
        }

        let data = self.agent.state.data.read();
        let split = (non_repeaters as usize).min(oids.len());
        let mut varbinds: Vec<VarBind> = oids[..split]
            .iter()
            .map(|oid| MemoryAgent::successor(&data, oid))
            .collect();

        let mut cursors: Vec<Oid> = oids[split..].to_vec();
        if !cursors.is_empty() {
            for _ in 0..max_repetitions {
                for cursor in cursors.iter_mut() {
                    let vb = MemoryAgent::successor(&data, cursor);
                    *cursor = vb.oid.clone();
                    varbinds.push(vb);
                }
            }
        }

        Ok(Response {
            error_status: 0,
            error_index: 0,
            varbinds,
        })
    }

    async fn close(&mut self) {
        self.agent.state.closed.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn oid(s: &str) -> Oid {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_get_bulk_is_repetition_major() {
        let agent = MemoryAgent::new();
        agent
            .load([
                ("1.1.1", SnmpValue::Integer(11)),
                ("1.1.2", SnmpValue::Integer(12)),
                ("1.2.1", SnmpValue::Integer(21)),
                ("1.2.2", SnmpValue::Integer(22)),
            ])
            .unwrap();

        let mut transport = agent.transport();
        let response = transport
            .get_bulk(&[oid("1.1"), oid("1.2")], 0, 2)
            .await
            .unwrap();
        let got: Vec<String> = response.varbinds.iter().map(|vb| vb.oid.to_string()).collect();
        assert_eq!(got, vec!["1.1.1", "1.2.1", "1.1.2", "1.2.2"]);
    }

    #[tokio::test]
    async fn test_get_bulk_end_of_view() {
        let agent = MemoryAgent::new();
        agent.insert(oid("1.1.1"), SnmpValue::Integer(1));
        let mut transport = agent.transport();
        let response = transport.get_bulk(&[oid("1.1")], 0, 3).await.unwrap();
        let values: Vec<&SnmpValue> = response.varbinds.iter().map(|vb| &vb.value).collect();
        assert_eq!(
            values,
            vec![
                &SnmpValue::Integer(1),
                &SnmpValue::EndOfMibView,
                &SnmpValue::EndOfMibView
            ]
        );
    }

    #[tokio::test]
    async fn test_non_repeaters() {
        let agent = MemoryAgent::new();
        agent
            .load([("1.1", SnmpValue::Integer(1)), ("1.2", SnmpValue::Integer(2))])
            .unwrap();
        let mut transport = agent.transport();
        let response = transport.get_bulk(&[oid("1.0"), oid("1.1")], 1, 5).await.unwrap();
        assert_eq!(response.varbinds[0].oid, oid("1.1"));
        assert_eq!(response.varbinds[1].oid, oid("1.2"));
        assert_eq!(response.varbinds.len(), 6);
    }

    #[tokio::test]
    async fn test_connector_records_and_refuses() {
        let agent = MemoryAgent::new();
        assert!(agent.connect("10.0.0.1", "public").await.is_ok());
        agent.refuse_connections(true);
        assert!(agent.connect("10.0.0.2", "secret").await.is_err());
        assert_eq!(
            agent.connections(),
            vec![
                ("10.0.0.1".to_string(), "public".to_string()),
                ("10.0.0.2".to_string(), "secret".to_string())
            ]
        );
    }
}
