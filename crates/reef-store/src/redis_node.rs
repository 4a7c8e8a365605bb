//! Redis cache node backend.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use redis::AsyncCommands;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use reef_types::NodeId;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::traits::{Connector, NodeHandle};

/// Default time allowed to establish a connection.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default time allowed for a single command round trip.
const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(1);

/// How long a failed connect short-circuits later calls before retrying.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Lazily established connection plus the time of the last failed attempt.
#[derive(Default)]
struct ConnState {
    conn: Option<ConnectionManager>,
    last_failure: Option<Instant>,
}

/// A cache node served by a Redis instance.
///
/// Construction only parses the address; the connection is established on
/// first use and re-established transparently by the connection manager.
/// A node that is down therefore fails its first `get`/`set` with
/// [`StoreError::Unreachable`] rather than failing registry startup.
///
/// Establishment is bounded by the connect timeout. After a failed attempt,
/// calls fail fast with [`StoreError::Unreachable`] for [`RECONNECT_BACKOFF`]
/// instead of queueing behind another connect.
pub struct RedisNode {
    id: NodeId,
    client: redis::Client,
    connect_timeout: Duration,
    response_timeout: Duration,
    state: Mutex<ConnState>,
    closed: AtomicBool,
}

impl RedisNode {
    /// Create a handle for the Redis server at `address` (`host:port` or a
    /// full `redis://` URL).
    pub fn open(
        id: NodeId,
        address: &str,
        connect_timeout: Duration,
        response_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let url = if address.contains("://") {
            address.to_string()
        } else {
            format!("redis://{address}/")
        };

        let client = redis::Client::open(url).map_err(|e| StoreError::InvalidAddress {
            node: id.clone(),
            address: address.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            id,
            client,
            connect_timeout,
            response_timeout,
            state: Mutex::new(ConnState::default()),
            closed: AtomicBool::new(false),
        })
    }

    /// Return a connection, establishing it on first use.
    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed(self.id.clone()));
        }

        let mut state = self.state.lock().await;
        // close() may have run while we waited for the lock.
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::Closed(self.id.clone()));
        }
        if let Some(conn) = state.conn.as_ref() {
            return Ok(conn.clone());
        }
        if let Some(failed_at) = state.last_failure
            && failed_at.elapsed() < RECONNECT_BACKOFF
        {
            return Err(StoreError::Unreachable {
                node: self.id.clone(),
                reason: "recent connect failed, backing off".to_string(),
            });
        }

        let config = ConnectionManagerConfig::new()
            .set_connection_timeout(self.connect_timeout)
            .set_response_timeout(self.response_timeout)
            .set_number_of_retries(0);
        let connect = ConnectionManager::new_with_config(self.client.clone(), config);
        let result = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(result) => result.map_err(|e| self.map_err(e)),
            Err(_) => Err(StoreError::Unreachable {
                node: self.id.clone(),
                reason: format!("connect timed out after {:?}", self.connect_timeout),
            }),
        };

        match result {
            Ok(conn) => {
                debug!(node = %self.id, "connected to redis");
                state.conn = Some(conn.clone());
                state.last_failure = None;
                Ok(conn)
            }
            Err(e) => {
                warn!(node = %self.id, error = %e, "redis connect failed");
                state.last_failure = Some(Instant::now());
                Err(e)
            }
        }
    }

    fn map_err(&self, err: redis::RedisError) -> StoreError {
        if err.is_io_error()
            || err.is_connection_refusal()
            || err.is_timeout()
            || err.is_connection_dropped()
        {
            StoreError::Unreachable {
                node: self.id.clone(),
                reason: err.to_string(),
            }
        } else {
            StoreError::Backend {
                node: self.id.clone(),
                reason: err.to_string(),
            }
        }
    }
}

#[async_trait::async_trait]
impl NodeHandle for RedisNode {
    fn id(&self) -> &NodeId {
        &self.id
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await.map_err(|e| self.map_err(e))?;
        Ok(value)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<()> = if ttl.is_zero() {
            conn.set(key, value).await
        } else {
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
            conn.pset_ex(key, value, millis).await
        };
        result.map_err(|e| self.map_err(e))
    }

    async fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(StoreError::Closed(self.id.clone()));
        }
        // Dropping the last manager clone tears the connection down.
        if self.state.lock().await.conn.take().is_some() {
            debug!(node = %self.id, "closed redis connection");
        }
        Ok(())
    }
}

/// [`Connector`] that opens [`RedisNode`]s.
#[derive(Debug, Clone)]
pub struct RedisConnector {
    connect_timeout: Duration,
    response_timeout: Duration,
}

impl RedisConnector {
    /// Create a connector with default timeouts.
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }

    /// Set the connection establishment timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-command response timeout.
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }
}

impl Default for RedisConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Connector for RedisConnector {
    async fn connect(
        &self,
        node: &NodeId,
        address: &str,
    ) -> Result<Arc<dyn NodeHandle>, StoreError> {
        let handle = RedisNode::open(
            node.clone(),
            address,
            self.connect_timeout,
            self.response_timeout,
        )
        .inspect_err(|e| warn!(%node, address, error = %e, "rejected redis address"))?;
        Ok(Arc::new(handle))
    }
}
