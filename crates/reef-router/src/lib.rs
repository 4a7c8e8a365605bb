//! Region-aware routing over a consistent hash ring.
//!
//! This crate provides:
//!
//! - [`NodeRegistry`] — owns the live node handles and the ring built over
//!   them; serialises initialize / cleanup.
//! - [`Router`] — resolves `(key, caller region)` to exactly one
//!   [`NodeHandle`](reef_store::NodeHandle).
//! - [`AccessTracker`] — last-access bookkeeping per key.

mod access;
mod error;
mod registry;
mod router;

pub use access::{AccessRecord, AccessTracker};
pub use error::RouteError;
pub use registry::{NodeRegistry, Topology};
pub use router::{Router, Selection};
