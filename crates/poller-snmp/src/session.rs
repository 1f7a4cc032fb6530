//! Paginated Get and BulkWalk over a transport.

use crate::error::{error_status_name, Result, SnmpError};
use crate::transport::{Connector, Response, Transport};
use poller_types::{Node, Oid, SnmpValue, VarBind};
use tracing::{debug, instrument, warn};

/// Maximum number of paths per GetRequest.
pub const MAX_GET_OIDS: usize = 50;

/// Max-repetitions used for GetBulk.
pub const BULK_MAX_REPETITIONS: u32 = 10;

/// Maximum number of walk roots per GetBulk.
pub const BULK_MAX_ROOTS: usize = 10;

/// Owns one transport to one target.
///
/// The session is consumed by [`Session::finalize`], so the transport is
/// released exactly once.
pub struct Session {
    target: String,
    transport: Box<dyn Transport>,
}

#[derive(Debug, Clone)]
struct WalkCursor {
    root: Oid,
    last: Oid,
}

impl Session {
    pub fn new(target: impl Into<String>, transport: Box<dyn Transport>) -> Self {
        Self {
            target: target.into(),
            transport,
        }
    }

    /// Opens a session through `connector`.
    pub async fn connect(connector: &dyn Connector, target: &str, community: &str) -> Result<Self> {
        let transport = connector.connect(target, community).await?;
        Ok(Self::new(target, transport))
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Fetches exactly the requested instances, in batches of
    /// [`MAX_GET_OIDS`].
    ///
    /// `noSuchObject`/`noSuchInstance` replies are skipped, `endOfMibView`
    /// is an error, and replies outside the requested paths are ignored
    /// with a warning.
    #[instrument(skip(self, nodes, visitor), fields(target = %self.target, nodes = nodes.len()))]
    pub async fn get<F>(&mut self, nodes: &[Node], mut visitor: F) -> Result<()>
    where
        F: FnMut(VarBind) -> anyhow::Result<()> + Send,
    {
        if nodes.is_empty() {
            return Err(SnmpError::EmptyRequest);
        }
        let oids: Vec<Oid> = nodes.iter().map(|n| n.request_oid().clone()).collect();
        if oids[0].is_empty() {
            return Err(SnmpError::CorruptLookup);
        }

        let mut runs = 0;
        for batch in oids.chunks(MAX_GET_OIDS) {
            self.get_batch(batch, &mut visitor).await?;
            runs += 1;
        }
        debug!(oids = oids.len(), runs, "get finished");
        Ok(())
    }

    async fn get_batch<F>(&mut self, batch: &[Oid], visitor: &mut F) -> Result<()>
    where
        F: FnMut(VarBind) -> anyhow::Result<()> + Send,
    {
        let response = self.transport.get(batch).await?;
        check_status(&response)?;

        for vb in response.varbinds {
            match vb.value {
                SnmpValue::EndOfMibView => {
                    return Err(SnmpError::Exception {
                        oid: vb.oid,
                        value: "endOfMibView",
                    })
                }
                SnmpValue::NoSuchObject | SnmpValue::NoSuchInstance => {
                    debug!(oid = %vb.oid, value = vb.value.type_name(), "no such object, ignoring");
                    continue;
                }
                _ => {}
            }

            if !batch.iter().any(|requested| vb.oid.starts_with(requested)) {
                warn!(target = %self.target, oid = %vb.oid, "reply outside requested paths, ignoring");
                continue;
            }
            visitor(vb).map_err(SnmpError::Visitor)?;
        }
        Ok(())
    }

    /// Walks every node's subtree with GetBulk until no root yields further
    /// children.
    ///
    /// Replies are attributed to roots by position. A reply counts only when
    /// it lies strictly below its root and after that root's cursor;
    /// anything else is a miss. Roots without a hit in a round are done.
    /// Any exception value is fatal.
    #[instrument(skip(self, nodes, visitor), fields(target = %self.target, nodes = nodes.len()))]
    pub async fn bulk_walk<F>(&mut self, nodes: &[Node], mut visitor: F) -> Result<()>
    where
        F: FnMut(VarBind) -> anyhow::Result<()> + Send,
    {
        if nodes.is_empty() {
            return Err(SnmpError::EmptyRequest);
        }
        if nodes[0].numeric.is_empty() {
            return Err(SnmpError::CorruptLookup);
        }

        let mut active: Vec<WalkCursor> = nodes
            .iter()
            .map(|n| WalkCursor {
                root: n.numeric.clone(),
                last: n.numeric.clone(),
            })
            .collect();
        let mut iterations = 0u32;
        let mut hits = 0u64;
        let mut misses = 0u64;

        while !active.is_empty() {
            let mut next = Vec::with_capacity(active.len());

            for chunk in active.chunks(BULK_MAX_ROOTS) {
                let request: Vec<Oid> = chunk.iter().map(|c| c.last.clone()).collect();
                let response = self
                    .transport
                    .get_bulk(&request, 0, BULK_MAX_REPETITIONS)
                    .await
                    .map_err(|e| {
                        debug!(iterations, error = %e, "get bulk failed");
                        e
                    })?;
                check_status(&response)?;

                let mut advanced: Vec<Option<Oid>> = vec![None; chunk.len()];
                for (i, vb) in response.varbinds.into_iter().enumerate() {
                    if vb.value.is_exception() {
                        return Err(SnmpError::Exception {
                            oid: vb.oid,
                            value: vb.value.type_name(),
                        });
                    }

                    let slot = i % chunk.len();
                    let cursor = &chunk[slot];
                    let accepted = {
                        let current = advanced[slot].as_ref().unwrap_or(&cursor.last);
                        vb.oid.is_descendant_of(&cursor.root) && vb.oid > *current
                    };
                    if !accepted {
                        misses += 1;
                        continue;
                    }

                    advanced[slot] = Some(vb.oid.clone());
                    visitor(vb).map_err(SnmpError::Visitor)?;
                    hits += 1;
                }

                for (cursor, last) in chunk.iter().zip(advanced) {
                    if let Some(last) = last {
                        next.push(WalkCursor {
                            root: cursor.root.clone(),
                            last,
                        });
                    }
                }
            }

            iterations += 1;
            active = next;
        }

        debug!(
            roots = nodes.len(),
            iterations,
            hits,
            misses,
            "bulk walk done"
        );
        Ok(())
    }

    /// Releases the transport.
    pub async fn finalize(mut self) {
        self.transport.close().await;
        debug!(target = %self.target, "session finalized");
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

fn check_status(response: &Response) -> Result<()> {
    if response.error_status != 0 {
        return Err(SnmpError::ErrorStatus {
            status: error_status_name(response.error_status),
            index: response.error_index,
        });
    }
    Ok(())
}
