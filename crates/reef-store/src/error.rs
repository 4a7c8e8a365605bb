//! Error types for cache node operations.

use reef_types::NodeId;

/// Errors that can occur while talking to a cache node.
///
/// A missing key is not an error: [`NodeHandle::get`] returns `Ok(None)`.
///
/// [`NodeHandle::get`]: crate::NodeHandle::get
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The node could not be reached (connect, IO, timeout, dropped connection).
    #[error("node {node} unreachable: {reason}")]
    Unreachable {
        /// The node that failed.
        node: NodeId,
        /// Underlying failure.
        reason: String,
    },

    /// The node answered with an error.
    #[error("node {node} backend error: {reason}")]
    Backend {
        /// The node that failed.
        node: NodeId,
        /// Error reported by the backend.
        reason: String,
    },

    /// The handle was already closed.
    #[error("node {0} handle is closed")]
    Closed(NodeId),

    /// The configured address could not be turned into a client.
    #[error("invalid address {address:?} for node {node}: {reason}")]
    InvalidAddress {
        /// The node being opened.
        node: NodeId,
        /// The rejected address.
        address: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl StoreError {
    /// Whether this error means the node could not be reached.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, StoreError::Unreachable { .. })
    }
}
