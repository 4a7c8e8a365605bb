//! Data sources consulted on a cache miss.

use std::collections::HashMap;

use crate::error::EngineError;

/// Produces the authoritative value for a key on a cache miss.
#[async_trait::async_trait]
pub trait Loader: Send + Sync {
    /// Load the value for `key`.
    async fn load(&self, key: &str) -> Result<String, EngineError>;
}

/// A [`Loader`] over a fixed in-memory table.
#[derive(Debug, Clone, Default)]
pub struct StaticLoader {
    entries: HashMap<String, String>,
}

impl StaticLoader {
    /// Create an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for StaticLoader {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[async_trait::async_trait]
impl Loader for StaticLoader {
    async fn load(&self, key: &str) -> Result<String, EngineError> {
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| EngineError::NotFound {
                key: key.to_string(),
            })
    }
}
