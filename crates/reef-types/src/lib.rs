//! Shared types and identifiers for Reef.
//!
//! This crate defines the types used across the Reef workspace:
//! the shard identifier ([`NodeId`]), ring positions ([`RingSlot`]),
//! and the routing vocabulary ([`AffinityPolicy`], [`RouteReason`]).

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ID types
// ---------------------------------------------------------------------------

/// Identifier for a cache shard.
///
/// In a region-sharded deployment this is the region name (`"Europe"`,
/// `"Asia"`, ...). It is used both as the registry key and as the value
/// stored in ring slots.
#[derive(Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create an identifier from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for NodeId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Ring types
// ---------------------------------------------------------------------------

/// A single position on the hash ring and the node that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingSlot {
    /// Position on the 32-bit ring.
    pub hash: u32,
    /// Node owning this position.
    pub owner: NodeId,
}

// ---------------------------------------------------------------------------
// Routing types
// ---------------------------------------------------------------------------

/// How the caller's region is weighed against the ring's choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AffinityPolicy {
    /// A registered caller region always wins over the ring.
    #[default]
    #[serde(rename = "region")]
    RegionFirst,
    /// The ring always decides; the caller region is only observed.
    #[serde(rename = "ring")]
    RingOnly,
}

impl FromStr for AffinityPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "region" => Ok(Self::RegionFirst),
            "ring" => Ok(Self::RingOnly),
            other => Err(format!(
                "unknown affinity policy {other:?} (expected \"region\" or \"ring\")"
            )),
        }
    }
}

impl fmt::Display for AffinityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RegionFirst => f.write_str("region"),
            Self::RingOnly => f.write_str("ring"),
        }
    }
}

/// Why the router picked the node it returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteReason {
    /// The caller's region is registered and the ring chose it too.
    RingAgrees,
    /// The caller's region is registered and overrides the ring.
    RegionOverride,
    /// The caller's region is unknown (or ignored); the ring decided.
    RingFallback,
}

impl fmt::Display for RouteReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RingAgrees => f.write_str("ring-agrees"),
            Self::RegionOverride => f.write_str("region-override"),
            Self::RingFallback => f.write_str("ring-fallback"),
        }
    }
}
