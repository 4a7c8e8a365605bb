//! Consistent hashing ring for deterministic key placement.
//!
//! This crate implements a consistent hash ring that maps arbitrary string
//! keys to node IDs. Each node is given multiple positions on the ring
//! (virtual replicas) at `fnv1a_32("<node>:<i>")`, and a key is owned by the
//! first position at or after its own hash, wrapping around to the lowest
//! position when it falls past the last one.
//!
//! Positions depend only on node names and the replica count, so they are
//! stable across restarts and reproducible by any FNV-1a client.

mod hash;
mod ring;

pub use hash::fnv1a_32;
pub use ring::{DEFAULT_REPLICAS, HashRing};
