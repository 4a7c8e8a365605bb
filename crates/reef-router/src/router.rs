//! Region-aware node selection.
//!
//! The ring is always consulted first. Under
//! [`AffinityPolicy::RegionFirst`] a caller whose region is a registered
//! node is then served by that node, whatever the ring said; callers from an
//! unknown region get the ring's choice. Under [`AffinityPolicy::RingOnly`]
//! the ring's choice is always used.
//!
//! Selection is pure in-memory work: no I/O and no waiting on the registry's
//! lifecycle lock.

use std::sync::Arc;

use reef_store::NodeHandle;
use reef_types::{AffinityPolicy, NodeId, RouteReason};
use tracing::trace;

use crate::access::AccessTracker;
use crate::error::RouteError;
use crate::registry::NodeRegistry;

/// The outcome of routing one key.
#[derive(Clone)]
pub struct Selection {
    /// Node that will serve the key.
    pub node_id: NodeId,
    /// Node the ring picked for the key.
    pub ring_choice: NodeId,
    /// Why `node_id` was picked.
    pub reason: RouteReason,
    /// Handle for `node_id`.
    pub handle: Arc<dyn NodeHandle>,
}

impl std::fmt::Debug for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selection")
            .field("node_id", &self.node_id)
            .field("ring_choice", &self.ring_choice)
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

/// Resolves `(key, caller region)` to the node handle that should serve it.
#[derive(Debug)]
pub struct Router {
    registry: Arc<NodeRegistry>,
    tracker: Arc<AccessTracker>,
    policy: AffinityPolicy,
}

impl Router {
    /// Create a router with the default [`AffinityPolicy::RegionFirst`].
    pub fn new(registry: Arc<NodeRegistry>, tracker: Arc<AccessTracker>) -> Self {
        Self {
            registry,
            tracker,
            policy: AffinityPolicy::default(),
        }
    }

    /// Use `policy` to weigh the caller region against the ring.
    pub fn with_policy(mut self, policy: AffinityPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The active affinity policy.
    pub fn policy(&self) -> AffinityPolicy {
        self.policy
    }

    /// The registry this router reads from.
    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Access records kept as a side effect of routing.
    pub fn tracker(&self) -> &Arc<AccessTracker> {
        &self.tracker
    }

    /// Return the handle that should serve `key` for a caller in `region`.
    pub fn select_node(&self, key: &str, region: &str) -> Result<Arc<dyn NodeHandle>, RouteError> {
        self.select(key, region).map(|s| s.handle)
    }

    /// Route `key` for a caller in `region`, reporting how the node was chosen.
    ///
    /// Fails with [`RouteError::NoNodesAvailable`] when the registry is
    /// empty or uninitialized.
    pub fn select(&self, key: &str, region: &str) -> Result<Selection, RouteError> {
        let topology = self
            .registry
            .snapshot()
            .ok_or(RouteError::NoNodesAvailable)?;

        let ring_choice = topology
            .ring_node_for(key)
            .cloned()
            .ok_or(RouteError::NoNodesAvailable)?;
        self.tracker.touch(key);

        let region_known = topology.handle(region).is_some();
        let (node_id, reason) = match self.policy {
            _ if region_known && ring_choice.as_str() == region => {
                (ring_choice.clone(), RouteReason::RingAgrees)
            }
            AffinityPolicy::RegionFirst if region_known => {
                (NodeId::from(region), RouteReason::RegionOverride)
            }
            _ => (ring_choice.clone(), RouteReason::RingFallback),
        };

        let handle = topology
            .handle(node_id.as_str())
            .cloned()
            .ok_or(RouteError::NoNodesAvailable)?;

        trace!(key, region, node = %node_id, ring = %ring_choice, %reason, "routed key");

        Ok(Selection {
            node_id,
            ring_choice,
            reason,
            handle,
        })
    }
}
