//! Connection store with idle expiry.
//!
//! Lookups that resolve a connection for a request also touch it: the
//! last-used time moves forward and the idle timer is re-armed for a full
//! TTL. Resolution and touch happen under the map's read lock, while expiry
//! removes under the write lock and only when the firing timer is still the
//! connection's current one. A touch and an expiry therefore never both win.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;

use super::connection::Connection;
use super::expiry::{ExpiryHandle, ExpiryScheduler};
use super::id::{IdGenerator, UuidGenerator};

struct StoreInner {
    connections: RwLock<HashMap<String, Arc<Connection>>>,
    scheduler: ExpiryScheduler,
    ids: Box<dyn IdGenerator>,
    default_model: String,
}

impl StoreInner {
    async fn expire(&self, id: &str, generation: u64) {
        let mut connections = self.connections.write().await;

        let Some(connection) = connections.get(id).cloned() else {
            return;
        };

        let current = connection
            .expiry
            .lock()
            .await
            .as_ref()
            .map(ExpiryHandle::generation);
        if current != Some(generation) {
            return;
        }

        connections.remove(id);
        tracing::info!(
            connection_id = %id,
            remaining = connections.len(),
            "Connection expired"
        );
    }
}

/// Arm (or re-arm) the idle timer for connection `id`.
fn arm_expiry(inner: &Arc<StoreInner>, id: &str, previous: Option<ExpiryHandle>) -> ExpiryHandle {
    let weak: Weak<StoreInner> = Arc::downgrade(inner);
    let id = id.to_string();

    inner.scheduler.rearm(previous, move |generation| async move {
        if let Some(inner) = weak.upgrade() {
            inner.expire(&id, generation).await;
        }
    })
}

/// Shared handle to all live connections.
#[derive(Clone)]
pub struct ConnectionStore {
    inner: Arc<StoreInner>,
}

impl ConnectionStore {
    /// Create a store that names connections with random UUIDs.
    pub fn new(default_model: impl Into<String>, ttl: Duration) -> Self {
        Self::with_id_generator(default_model, ttl, UuidGenerator)
    }

    pub fn with_id_generator(
        default_model: impl Into<String>,
        ttl: Duration,
        ids: impl IdGenerator + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                connections: RwLock::new(HashMap::new()),
                scheduler: ExpiryScheduler::new(ttl),
                ids: Box::new(ids),
                default_model: default_model.into(),
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.scheduler.ttl()
    }

    pub fn default_model(&self) -> &str {
        &self.inner.default_model
    }

    /// Create a connection in its default state and start its idle timer.
    pub async fn create(&self) -> Arc<Connection> {
        let mut connections = self.inner.connections.write().await;

        let mut id = self.inner.ids.next_id();
        while connections.contains_key(&id) {
            tracing::warn!(connection_id = %id, "Generated connection id collided, retrying");
            id = self.inner.ids.next_id();
        }

        let connection = Arc::new(Connection::new(id.clone(), self.inner.default_model.clone()));
        *connection.expiry.lock().await = Some(arm_expiry(&self.inner, &id, None));
        connections.insert(id.clone(), Arc::clone(&connection));

        tracing::info!(
            connection_id = %id,
            total = connections.len(),
            "Connection created"
        );

        connection
    }

    /// Look up a connection without touching it.
    pub async fn get(&self, id: &str) -> Option<Arc<Connection>> {
        self.inner.connections.read().await.get(id).cloned()
    }

    /// Touch a connection: refresh last-used and restart its idle countdown.
    /// Returns false when the id is unknown.
    pub async fn touch(&self, id: &str) -> bool {
        self.resolve(id).await.is_some()
    }

    /// Look up a connection and touch it in one step.
    pub async fn resolve(&self, id: &str) -> Option<Arc<Connection>> {
        let connections = self.inner.connections.read().await;
        let connection = connections.get(id).cloned()?;

        connection.mark_used().await;
        let mut slot = connection.expiry.lock().await;
        let previous = slot.take();
        *slot = Some(arm_expiry(&self.inner, id, previous));
        drop(slot);

        Some(connection)
    }

    /// Number of live connections.
    pub async fn len(&self) -> usize {
        self.inner.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
