//! Cache node handles and backend implementations.
//!
//! This crate defines the [`NodeHandle`] trait for talking to one backing
//! cache store, the [`Connector`] trait the registry uses to open handles,
//! and two concrete backends:
//!
//! - [`MemoryNode`] — in-memory store with per-entry expiry, plus failure
//!   injection for tests.
//! - [`RedisNode`] — a lazily connected Redis client.

mod error;
mod memory_node;
mod redis_node;
mod traits;

pub use error::StoreError;
pub use memory_node::{MemoryConnector, MemoryNode};
pub use redis_node::{RedisConnector, RedisNode};
pub use traits::{Connector, NodeHandle};
