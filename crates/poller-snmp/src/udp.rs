//! SNMPv2c over UDP.

use crate::error::{error_status_name, Result, SnmpError};
use crate::pdu::{Message, Pdu, PduType};
use crate::transport::{Connector, Response, SessionOptions, Transport};
use async_trait::async_trait;
use poller_types::Oid;
use rand::Rng;
use std::net::SocketAddr;
use tokio::net::{lookup_host, UdpSocket};
use tracing::{debug, warn};

const MAX_DATAGRAM: usize = 65_535;

/// A UDP socket connected to one agent.
#[derive(Debug)]
pub struct UdpTransport {
    socket: Option<UdpSocket>,
    target: String,
    community: Vec<u8>,
    options: SessionOptions,
    request_id: i32,
    buf: Vec<u8>,
}

impl UdpTransport {
    /// Resolves `target` (host name, address, or `host:port`) and connects a
    /// socket to it.
    pub async fn connect(target: &str, community: &str, options: SessionOptions) -> Result<Self> {
        let addr = resolve(target, options.port).await?;
        let bind: SocketAddr = if addr.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };

        let socket = UdpSocket::bind(bind)
            .await
            .map_err(|e| SnmpError::connect(target, e))?;
        socket
            .connect(addr)
            .await
            .map_err(|e| SnmpError::connect(target, e))?;

        let request_id = rand::thread_rng().gen_range(1..i32::MAX / 2);
        debug!(target = %target, %addr, "udp transport connected");

        Ok(Self {
            socket: Some(socket),
            target: target.to_string(),
            community: community.as_bytes().to_vec(),
            options,
            request_id,
            buf: vec![0u8; MAX_DATAGRAM],
        })
    }

    fn next_request_id(&mut self) -> i32 {
        self.request_id = self.request_id.wrapping_add(1) & 0x7fff_ffff;
        self.request_id
    }

    async fn request(&mut self, pdu: Pdu) -> Result<Response> {
        let request_id = pdu.request_id;
        let bytes = Message::new(&self.community, pdu).encode()?;
        let attempts = self.options.retries + 1;

        for attempt in 0..attempts {
            let timeout = self.options.timeout_for_attempt(attempt);
            let socket = self.socket.as_ref().ok_or(SnmpError::Closed)?;
            socket.send(&bytes).await?;

            match tokio::time::timeout(timeout, self.receive(request_id)).await {
                Ok(result) => return result,
                Err(_) => {
                    debug!(
                        target = %self.target,
                        request_id,
                        attempt,
                        timeout_ms = timeout.as_millis() as u64,
                        "request timed out"
                    );
                }
            }
        }

        Err(SnmpError::Timeout {
            target: self.target.clone(),
            attempts,
        })
    }

    async fn receive(&mut self, request_id: i32) -> Result<Response> {
        let socket = self.socket.as_ref().ok_or(SnmpError::Closed)?;
        loop {
            let n = socket.recv(&mut self.buf).await?;
            let msg = Message::decode(&self.buf[..n])?;
            if msg.pdu.pdu_type != PduType::Response || msg.pdu.request_id != request_id {
                debug!(
                    target = %self.target,
                    expected = request_id,
                    got = msg.pdu.request_id,
                    "ignoring unrelated message"
                );
                continue;
            }
            if msg.pdu.error_status != 0 {
                debug!(
                    target = %self.target,
                    status = error_status_name(msg.pdu.error_status),
                    index = msg.pdu.error_index,
                    "agent returned error status"
                );
            }
            return Ok(Response {
                error_status: msg.pdu.error_status,
                error_index: msg.pdu.error_index,
                varbinds: msg.pdu.varbinds,
            });
        }
    }
}

async fn resolve(target: &str, port: u16) -> Result<SocketAddr> {
    if let Ok(addr) = target.parse::<SocketAddr>() {
        return Ok(addr);
    }
    let candidates: Vec<SocketAddr> = match target.rsplit_once(':') {
        Some((host, p)) if !host.contains(':') && p.parse::<u16>().is_ok() => {
            lookup_host(target).await.map(|addrs| addrs.collect())
        }
        _ => lookup_host((target, port)).await.map(|addrs| addrs.collect()),
    }
    .map_err(|e| SnmpError::connect(target, e))?;

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| SnmpError::connect(target, "no addresses found"))
}

#[async_trait]
impl Transport for UdpTransport {
    async fn get(&mut self, oids: &[Oid]) -> Result<Response> {
        let id = self.next_request_id();
        self.request(Pdu::request(PduType::GetRequest, id, oids)).await
    }

    async fn get_bulk(
        &mut self,
        oids: &[Oid],
        non_repeaters: u32,
        max_repetitions: u32,
    ) -> Result<Response> {
        let id = self.next_request_id();
        self.request(Pdu::get_bulk(id, oids, non_repeaters, max_repetitions))
            .await
    }

    async fn close(&mut self) {
        if self.socket.take().is_none() {
            warn!(target = %self.target, "transport closed twice");
        }
    }
}

/// Opens [`UdpTransport`]s with fixed options.
#[derive(Debug, Clone, Default)]
pub struct UdpConnector {
    options: SessionOptions,
}

impl UdpConnector {
    pub fn new(options: SessionOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl Connector for UdpConnector {
    async fn connect(&self, target: &str, community: &str) -> Result<Box<dyn Transport>> {
        let transport = UdpTransport::connect(target, community, self.options.clone()).await?;
        Ok(Box::new(transport))
    }
}
