//! Error types for the router crate.

use reef_store::StoreError;

/// Errors produced while building the registry or routing a key.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// The registry is empty or was never initialized.
    #[error("no cache nodes available")]
    NoNodesAvailable,

    /// A node handle could not be opened.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
