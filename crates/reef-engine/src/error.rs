//! Error types for the engine.

/// Errors that can occur during a read-through fetch.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No node could be selected for the key.
    #[error("routing error: {0}")]
    Route(#[from] reef_router::RouteError),

    /// The selected node failed the read.
    #[error("store error: {0}")]
    Store(#[from] reef_store::StoreError),

    /// The backing data source has no value for the key.
    #[error("not found: {key}")]
    NotFound {
        /// The requested key.
        key: String,
    },

    /// The backing data source failed.
    #[error("loader error: {0}")]
    Loader(String),
}
