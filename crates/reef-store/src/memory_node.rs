//! In-memory cache node backend.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use reef_types::NodeId;
use tokio::time::Instant;
use tracing::debug;

use crate::error::StoreError;
use crate::traits::{Connector, NodeHandle};

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Smallest map size that triggers a purge of expired entries.
const MIN_PURGE_AT: usize = 64;

/// Entry map plus the size at which expired entries are next swept.
struct Entries {
    map: HashMap<String, Entry>,
    purge_at: usize,
}

impl Default for Entries {
    fn default() -> Self {
        Self {
            map: HashMap::new(),
            purge_at: MIN_PURGE_AT,
        }
    }
}

impl Entries {
    /// Sweep expired entries once the map has doubled since the last sweep,
    /// so each write pays amortised O(1).
    fn maybe_purge(&mut self, now: Instant) {
        if self.map.len() < self.purge_at {
            return;
        }
        self.map.retain(|_, e| e.is_live(now));
        self.purge_at = (self.map.len() * 2).max(MIN_PURGE_AT);
    }
}

/// In-memory cache node backed by a `RwLock<HashMap>`.
///
/// Useful for tests and for running the daemon without any cache servers.
/// Expired entries are hidden from reads and swept in batches on write.
/// [`MemoryNode::set_unreachable`] makes every call fail as if the node were
/// down.
pub struct MemoryNode {
    id: NodeId,
    address: String,
    entries: RwLock<Entries>,
    closed: AtomicBool,
    unreachable: AtomicBool,
}

impl MemoryNode {
    /// Create an empty node.
    pub fn new(id: NodeId, address: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
            entries: RwLock::new(Entries::default()),
            closed: AtomicBool::new(false),
            unreachable: AtomicBool::new(false),
        }
    }

    /// Address this node was opened with.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Simulate the node going down (`true`) or coming back (`false`).
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Whether [`NodeHandle::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().expect("lock poisoned");
        entries.map.values().filter(|e| e.is_live(now)).count()
    }

    /// Whether the node holds no live entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed(self.id.clone()));
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable {
                node: self.id.clone(),
                reason: "node is down".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl NodeHandle for MemoryNode {
    fn id(&self) -> &NodeId {
        &self.id
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        let now = Instant::now();
        let entries = self.entries.read().expect("lock poisoned");
        Ok(entries
            .map
            .get(key)
            .filter(|e| e.is_live(now))
            .map(|e| e.value.clone()))
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        self.check()?;
        let now = Instant::now();
        let expires_at = (!ttl.is_zero()).then(|| now + ttl);

        let mut entries = self.entries.write().expect("lock poisoned");
        entries.maybe_purge(now);
        entries.map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        debug!(node = %self.id, key, ttl_ms = ttl.as_millis() as u64, "stored value in memory");
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(StoreError::Closed(self.id.clone()));
        }
        *self.entries.write().expect("lock poisoned") = Entries::default();
        debug!(node = %self.id, "closed memory node");
        Ok(())
    }
}

/// [`Connector`] that creates a fresh [`MemoryNode`] per connect call.
///
/// Every node it hands out stays reachable through [`MemoryConnector::node`],
/// so tests can inspect contents or inject failures after the registry has
/// taken ownership of the handle.
#[derive(Default)]
pub struct MemoryConnector {
    nodes: Mutex<BTreeMap<NodeId, Arc<MemoryNode>>>,
    refused: Mutex<HashSet<NodeId>>,
}

impl MemoryConnector {
    /// Create a connector with no nodes.
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently created node for `id`.
    pub fn node(&self, id: &str) -> Option<Arc<MemoryNode>> {
        self.nodes.lock().expect("lock poisoned").get(id).cloned()
    }

    /// Make future connect calls for `id` fail.
    pub fn refuse(&self, id: impl Into<NodeId>) {
        self.refused.lock().expect("lock poisoned").insert(id.into());
    }

    /// Allow connect calls for `id` again.
    pub fn accept(&self, id: &str) {
        self.refused.lock().expect("lock poisoned").remove(id);
    }
}

#[async_trait::async_trait]
impl Connector for MemoryConnector {
    async fn connect(
        &self,
        node: &NodeId,
        address: &str,
    ) -> Result<Arc<dyn NodeHandle>, StoreError> {
        if self.refused.lock().expect("lock poisoned").contains(node) {
            return Err(StoreError::Unreachable {
                node: node.clone(),
                reason: format!("connection to {address} refused"),
            });
        }

        let handle = Arc::new(MemoryNode::new(node.clone(), address));
        self.nodes
            .lock()
            .expect("lock poisoned")
            .insert(node.clone(), Arc::clone(&handle));
        Ok(handle)
    }
}
