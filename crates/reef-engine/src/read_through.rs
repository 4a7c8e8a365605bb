//! [`ReadThrough`] — fetch a key, populating the cache on a miss.

use std::sync::Arc;
use std::time::Duration;

use reef_router::Router;
use reef_types::{NodeId, RouteReason};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::loader::Loader;

/// TTL applied to values written back after a miss.
pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

/// Result of a [`ReadThrough::fetch_detailed`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// The value.
    pub value: String,
    /// Whether the value came from the cache.
    pub hit: bool,
    /// Node that served (or was populated with) the value.
    pub node_id: NodeId,
    /// Why that node was selected.
    pub reason: RouteReason,
}

/// Cache-aside reads over a [`Router`].
///
/// The router decides the node, the node is read, and on a miss the value
/// is loaded and written back. A failed write-back only costs a future miss,
/// so it is logged and the loaded value is still returned. A failed read is
/// returned to the caller: an unreachable node is never treated as a miss.
pub struct ReadThrough {
    router: Arc<Router>,
    loader: Arc<dyn Loader>,
    ttl: Duration,
}

impl ReadThrough {
    /// Create a read-through wrapper with the [`DEFAULT_TTL`].
    pub fn new(router: Arc<Router>, loader: Arc<dyn Loader>) -> Self {
        Self {
            router,
            loader,
            ttl: DEFAULT_TTL,
        }
    }

    /// Use `ttl` for values written back after a miss.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// TTL applied on write-back.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fetch `key` for a caller in `region`.
    pub async fn fetch(&self, key: &str, region: &str) -> Result<String, EngineError> {
        self.fetch_detailed(key, region).await.map(|o| o.value)
    }

    /// Fetch `key` for a caller in `region`, reporting hit/miss and the node.
    #[tracing::instrument(skip(self), fields(node = tracing::field::Empty))]
    pub async fn fetch_detailed(&self, key: &str, region: &str) -> Result<FetchOutcome, EngineError> {
        let selection = self.router.select(key, region)?;
        tracing::Span::current().record("node", selection.node_id.as_str());

        if let Some(value) = selection.handle.get(key).await? {
            debug!(key, region, node = %selection.node_id, "cache hit");
            return Ok(FetchOutcome {
                value,
                hit: true,
                node_id: selection.node_id,
                reason: selection.reason,
            });
        }

        info!(key, region, node = %selection.node_id, "cache miss");
        let value = self.loader.load(key).await?;

        if let Err(e) = selection.handle.set_with_ttl(key, &value, self.ttl).await {
            warn!(key, node = %selection.node_id, error = %e, "failed to populate cache");
        }

        Ok(FetchOutcome {
            value,
            hit: false,
            node_id: selection.node_id,
            reason: selection.reason,
        })
    }
}

impl std::fmt::Debug for ReadThrough {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadThrough")
            .field("router", &self.router)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
