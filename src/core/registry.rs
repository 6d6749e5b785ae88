//! Set of currently open connections

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::core::connection::Connection;

/// Tracks open connections keyed by id.
///
/// Callers never lock; `add` and `remove` are idempotent.
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Arc<Connection>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection; returns false if it was already present
    pub async fn add(&self, connection: Arc<Connection>) -> bool {
        let mut connections = self.connections.write().await;
        if connections.contains_key(&connection.id) {
            return false;
        }
        connections.insert(connection.id.clone(), connection);
        true
    }

    /// Remove a connection; returns false if it was already gone
    pub async fn remove(&self, id: &str) -> bool {
        self.connections.write().await.remove(id).is_some()
    }

    /// Membership at call time, for iteration without holding the lock
    pub async fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().await.values().cloned().collect()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.connections.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
