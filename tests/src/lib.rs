//! Shared test harness for Reef integration tests.
//!
//! Provides [`TestCluster`], a set of regional in-memory cache nodes behind
//! a real [`NodeRegistry`] and [`Router`], with failure injection for node
//! outages and refused connections.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use reef_engine::{EngineError, Loader, ReadThrough, StaticLoader};
use reef_placement::DEFAULT_REPLICAS;
use reef_router::{AccessTracker, NodeRegistry, RouteError, Router};
use reef_store::{MemoryConnector, MemoryNode};
use reef_types::{AffinityPolicy, NodeId};

/// The three regions of the default deployment.
pub const REGIONS: [&str; 3] = ["Europe", "Asia", "NorthAmerica"];

// =========================================================================
// TestCluster
// =========================================================================

/// Regional memory nodes wired into a registry and router.
pub struct TestCluster {
    connector: Arc<MemoryConnector>,
    registry: Arc<NodeRegistry>,
    router: Arc<Router>,
    addresses: BTreeMap<NodeId, String>,
}

impl TestCluster {
    /// Initialized cluster over the three default regions.
    pub async fn three_regions() -> Self {
        Self::new(&REGIONS).await
    }

    /// Initialized cluster with one node per region, region-first routing.
    pub async fn new(regions: &[&str]) -> Self {
        Self::with_policy(regions, AffinityPolicy::RegionFirst).await
    }

    /// Initialized cluster using `policy`.
    pub async fn with_policy(regions: &[&str], policy: AffinityPolicy) -> Self {
        let cluster = Self::uninitialized(regions, policy);
        cluster
            .initialize()
            .await
            .expect("memory nodes always connect");
        cluster
    }

    /// Cluster whose registry has not been initialized yet.
    pub fn uninitialized(regions: &[&str], policy: AffinityPolicy) -> Self {
        let connector = Arc::new(MemoryConnector::new());
        let registry = Arc::new(NodeRegistry::new(connector.clone(), DEFAULT_REPLICAS));
        let router = Arc::new(
            Router::new(Arc::clone(&registry), Arc::new(AccessTracker::new())).with_policy(policy),
        );
        let addresses = regions
            .iter()
            .enumerate()
            .map(|(i, r)| (NodeId::from(*r), format!("localhost:{}", 6379 + i)))
            .collect();

        Self {
            connector,
            registry,
            router,
            addresses,
        }
    }

    /// (Re)initialize the registry from the configured addresses.
    pub async fn initialize(&self) -> Result<(), RouteError> {
        self.registry.initialize(&self.addresses).await
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn connector(&self) -> &Arc<MemoryConnector> {
        &self.connector
    }

    pub fn addresses(&self) -> &BTreeMap<NodeId, String> {
        &self.addresses
    }

    /// Read-through wrapper over this cluster's router.
    pub fn read_through(&self, loader: Arc<dyn Loader>) -> ReadThrough {
        ReadThrough::new(Arc::clone(&self.router), loader)
    }

    /// The live memory node for `region`.
    pub fn node(&self, region: &str) -> Arc<MemoryNode> {
        self.connector
            .node(region)
            .unwrap_or_else(|| panic!("no node for {region}"))
    }

    /// Make the node for `region` fail every request.
    pub fn kill_node(&self, region: &str) {
        self.node(region).set_unreachable(true);
    }

    /// Undo [`kill_node`](Self::kill_node).
    pub fn revive_node(&self, region: &str) {
        self.node(region).set_unreachable(false);
    }

    /// Make future connects to `region` fail.
    pub fn refuse_connections(&self, region: &str) {
        self.connector.refuse(region);
    }

    /// Allow connects to `region` again.
    pub fn accept_connections(&self, region: &str) {
        self.connector.accept(region);
    }

    /// Number of cached entries per region.
    pub fn entry_counts(&self) -> BTreeMap<String, usize> {
        self.addresses
            .keys()
            .map(|id| (id.to_string(), self.node(id.as_str()).len()))
            .collect()
    }
}

// =========================================================================
// Loaders and data
// =========================================================================

/// Loader over a fixed catalogue that counts how often it is consulted.
pub struct CountingLoader {
    inner: StaticLoader,
    calls: AtomicUsize,
}

impl CountingLoader {
    pub fn new(inner: StaticLoader) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Loader for CountingLoader {
    async fn load(&self, key: &str) -> Result<String, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.load(key).await
    }
}

/// Catalogue of `n` books keyed `book::<i>`.
pub fn catalogue(n: usize) -> StaticLoader {
    (0..n).map(|i| (book_key(i), book_value(i))).collect()
}

pub fn book_key(i: usize) -> String {
    format!("book::{i}")
}

pub fn book_value(i: usize) -> String {
    format!("Book #{i}, Price: ${}.99", 10 + i % 40)
}

/// `n` random alphanumeric keys, reproducible for a given `seed`.
pub fn random_keys(n: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let len = rng.random_range(4..24);
            (0..len)
                .map(|_| char::from(rng.sample(rand::distr::Alphanumeric)))
                .collect()
        })
        .collect()
}
