//! Read-through cache access.
//!
//! [`ReadThrough`] asks the [`Router`](reef_router::Router) for the node that
//! serves a key, reads from it, and on a miss computes the value through a
//! [`Loader`] and writes it back with a TTL.

pub mod error;
pub mod loader;
pub mod read_through;

pub use error::EngineError;
pub use loader::{Loader, StaticLoader};
pub use read_through::{DEFAULT_TTL, FetchOutcome, ReadThrough};
