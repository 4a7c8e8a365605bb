//! Core traits for cache node access.

use std::sync::Arc;
use std::time::Duration;

use reef_types::NodeId;

use crate::error::StoreError;

/// A live handle to one backing cache store.
///
/// All implementations must be `Send + Sync`: the router hands the same
/// handle to any number of concurrent requests.
#[async_trait::async_trait]
pub trait NodeHandle: Send + Sync {
    /// The node this handle talks to.
    fn id(&self) -> &NodeId;

    /// Read a value. Returns `None` on a cache miss.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value that expires after `ttl`. A zero `ttl` never expires.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration)
    -> Result<(), StoreError>;

    /// Release the underlying connection. Later calls return
    /// [`StoreError::Closed`].
    async fn close(&self) -> Result<(), StoreError>;
}

/// Opens [`NodeHandle`]s from configured addresses.
///
/// The registry only ever creates handles through a connector, which lets
/// tests substitute in-memory nodes for real ones.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Open a handle for `node` at `address`.
    async fn connect(&self, node: &NodeId, address: &str)
    -> Result<Arc<dyn NodeHandle>, StoreError>;
}
