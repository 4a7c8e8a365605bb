//! Node registry: the live node handles and the ring built over them.
//!
//! [`NodeRegistry`] is created empty, populated by
//! [`initialize`](NodeRegistry::initialize), read concurrently by the router,
//! and emptied by [`cleanup`](NodeRegistry::cleanup). Each initialize builds
//! a new immutable [`Topology`]; readers take a snapshot of it and never
//! wait on the lifecycle lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use reef_placement::HashRing;
use reef_store::{Connector, NodeHandle, StoreError};
use reef_types::NodeId;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::RouteError;

/// An immutable set of node handles plus the ring over their IDs.
pub struct Topology {
    handles: HashMap<NodeId, Arc<dyn NodeHandle>>,
    ring: HashRing,
}

impl Topology {
    /// Handle registered under `id`.
    pub fn handle(&self, id: &str) -> Option<&Arc<dyn NodeHandle>> {
        self.handles.get(id)
    }

    /// The ring's choice for `key`.
    pub fn ring_node_for(&self, key: &str) -> Option<&NodeId> {
        self.ring.get_node(key)
    }

    /// The ring itself.
    pub fn ring(&self) -> &HashRing {
        &self.ring
    }

    /// Registered node IDs, sorted.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.ring.node_ids()
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether no node is registered.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl std::fmt::Debug for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topology")
            .field("nodes", &self.node_ids())
            .field("slots", &self.ring.slot_count())
            .finish()
    }
}

/// Owns the node handles and the ring built from them.
///
/// `initialize` and `cleanup` are mutually exclusive. Routing reads clone an
/// `Arc` of the current [`Topology`] under a short read lock and then work
/// on that snapshot.
pub struct NodeRegistry {
    connector: Arc<dyn Connector>,
    replicas: u32,
    /// Serialises initialize / cleanup.
    lifecycle: Mutex<()>,
    /// Current topology; `None` before initialize and after cleanup.
    current: RwLock<Option<Arc<Topology>>>,
}

impl NodeRegistry {
    /// Create an empty registry that opens handles through `connector` and
    /// gives each node `replicas` ring positions.
    pub fn new(connector: Arc<dyn Connector>, replicas: u32) -> Self {
        Self {
            connector,
            replicas,
            lifecycle: Mutex::new(()),
            current: RwLock::new(None),
        }
    }

    /// Replica count used for every node.
    pub fn replicas(&self) -> u32 {
        self.replicas
    }

    /// Open a handle for every `(id, address)` and build a fresh ring.
    ///
    /// Calling this on an initialized registry replaces the topology: the
    /// new one is installed first, then the previous handles are closed.
    /// If any handle fails to open, the handles opened by this call are
    /// closed and the current topology is left untouched.
    pub async fn initialize(&self, addresses: &BTreeMap<NodeId, String>) -> Result<(), RouteError> {
        let _guard = self.lifecycle.lock().await;

        if addresses.is_empty() {
            return Err(RouteError::NoNodesAvailable);
        }

        let mut handles: HashMap<NodeId, Arc<dyn NodeHandle>> =
            HashMap::with_capacity(addresses.len());
        for (id, address) in addresses {
            match self.connector.connect(id, address).await {
                Ok(handle) => {
                    debug!(node = %id, address = %address, "opened node handle");
                    handles.insert(id.clone(), handle);
                }
                Err(e) => {
                    warn!(node = %id, address = %address, error = %e, "failed to open node handle");
                    close_all(&handles).await;
                    return Err(e.into());
                }
            }
        }

        let mut ring = HashRing::new(self.replicas);
        for id in addresses.keys() {
            ring.add_node(id.clone());
        }

        let topology = Arc::new(Topology { handles, ring });
        info!(
            nodes = topology.len(),
            slots = topology.ring.slot_count(),
            replicas = self.replicas,
            "node registry initialized"
        );

        let previous = self
            .current
            .write()
            .expect("registry lock poisoned")
            .replace(topology);

        if let Some(previous) = previous {
            info!(nodes = previous.len(), "closing replaced node handles");
            close_all(&previous.handles).await;
        }

        Ok(())
    }

    /// Close every handle and empty the registry.
    ///
    /// Best effort: a failing close is logged and collected, and the
    /// remaining handles are still closed. Returns the collected failures.
    /// A registry that was never initialized is left as is.
    pub async fn cleanup(&self) -> Vec<StoreError> {
        let _guard = self.lifecycle.lock().await;

        let Some(topology) = self.current.write().expect("registry lock poisoned").take() else {
            debug!("cleanup on empty registry");
            return Vec::new();
        };

        let errors = close_all(&topology.handles).await;
        info!(
            nodes = topology.len(),
            failed = errors.len(),
            "node registry cleaned up"
        );
        errors
    }

    /// Snapshot of the current topology.
    pub fn snapshot(&self) -> Option<Arc<Topology>> {
        self.current.read().expect("registry lock poisoned").clone()
    }

    /// Whether a topology is installed.
    pub fn is_initialized(&self) -> bool {
        self.current.read().expect("registry lock poisoned").is_some()
    }

    /// Handle registered under `id`.
    pub fn handle_for(&self, id: &str) -> Option<Arc<dyn NodeHandle>> {
        self.snapshot()?.handle(id).cloned()
    }

    /// The ring's choice for `key`.
    pub fn ring_node_for(&self, key: &str) -> Option<NodeId> {
        self.snapshot()?.ring_node_for(key).cloned()
    }

    /// Registered node IDs, sorted. Empty when uninitialized.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.snapshot().map(|t| t.node_ids()).unwrap_or_default()
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("replicas", &self.replicas)
            .field("current", &self.snapshot())
            .finish_non_exhaustive()
    }
}

/// Close handles in ID order, collecting failures.
async fn close_all(handles: &HashMap<NodeId, Arc<dyn NodeHandle>>) -> Vec<StoreError> {
    let mut ids: Vec<&NodeId> = handles.keys().collect();
    ids.sort();

    let mut errors = Vec::new();
    for id in ids {
        if let Err(e) = handles[id].close().await {
            warn!(node = %id, error = %e, "failed to close node handle");
            errors.push(e);
        }
    }
    errors
}
