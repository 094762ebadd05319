//! The per-client session entity.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{
    Mutex, MutexGuard, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock,
};

use super::expiry::ExpiryHandle;
use super::history::ChatHistories;

/// Mutable session state. Lock it only for in-memory work; never hold the
/// guard across a backend call or an image fetch.
#[derive(Debug)]
pub struct ConnectionState {
    /// Backend model used for future turns
    pub model: String,
    pub histories: ChatHistories,
    /// Image to attach to the next assembled user message
    pub pending_image: Option<String>,
    pub last_used: DateTime<Utc>,
    /// When false, replies are stripped of markdown
    pub formatting_enabled: bool,
}

/// A server-held client session.
#[derive(Debug)]
pub struct Connection {
    id: String,
    state: Mutex<ConnectionState>,
    /// Shared by per-chat work, exclusive for whole-map replacement
    chats_gate: Arc<RwLock<()>>,
    chat_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    pub(super) expiry: Mutex<Option<ExpiryHandle>>,
}

impl Connection {
    pub(super) fn new(id: String, model: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: Mutex::new(ConnectionState {
                model,
                histories: ChatHistories::new(),
                pending_image: None,
                last_used: now,
                formatting_enabled: true,
            }),
            chats_gate: Arc::new(RwLock::new(())),
            chat_locks: Mutex::new(HashMap::new()),
            expiry: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Lock the mutable state.
    pub async fn state(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().await
    }

    pub async fn last_used(&self) -> DateTime<Utc> {
        self.state.lock().await.last_used
    }

    pub(super) async fn mark_used(&self) {
        self.state.lock().await.last_used = Utc::now();
    }

    pub async fn model(&self) -> String {
        self.state.lock().await.model.clone()
    }

    /// Switch the backend model. Blank names are ignored.
    pub async fn set_model(&self, model: &str) -> String {
        let mut state = self.state.lock().await;
        let model = model.trim();
        if !model.is_empty() {
            state.model = model.to_string();
        }
        state.model.clone()
    }

    pub async fn formatting_enabled(&self) -> bool {
        self.state.lock().await.formatting_enabled
    }

    pub async fn set_formatting_enabled(&self, enabled: bool) {
        self.state.lock().await.formatting_enabled = enabled;
    }

    /// Set (or clear, for an empty url) the image for the next message.
    /// Returns whether an image is now pending.
    pub async fn attach_image(&self, url: &str) -> bool {
        let mut state = self.state.lock().await;
        state.pending_image = Some(url.trim().to_string()).filter(|u| !u.is_empty());
        state.pending_image.is_some()
    }

    pub async fn pending_image(&self) -> Option<String> {
        self.state.lock().await.pending_image.clone()
    }

    /// Consume the pending image, leaving none behind.
    pub async fn take_pending_image(&self) -> Option<String> {
        self.state.lock().await.pending_image.take()
    }

    async fn chat_mutex(&self, chat_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.chat_locks.lock().await;
        Arc::clone(locks.entry(chat_id.to_string()).or_default())
    }

    /// Serialize work on one chat id. Held across the backend call of a send.
    pub async fn lock_chat(&self, chat_id: &str) -> ChatGuard {
        self.lock_chats([chat_id.to_string()]).await
    }

    /// Lock several chats at once, in sorted id order.
    pub async fn lock_chats<I>(&self, chat_ids: I) -> ChatGuard
    where
        I: IntoIterator<Item = String>,
    {
        let gate = Arc::clone(&self.chats_gate).read_owned().await;
        let ordered: BTreeSet<String> = chat_ids.into_iter().collect();
        let mut chats = Vec::with_capacity(ordered.len());
        for chat_id in ordered {
            chats.push(self.chat_mutex(&chat_id).await.lock_owned().await);
        }
        ChatGuard {
            _chats: chats,
            _gate: gate,
        }
    }

    /// Exclude every per-chat operation, including ones on ids that do not
    /// exist yet. Waits for in-flight chat work to finish.
    pub async fn lock_all_chats(&self) -> OwnedRwLockWriteGuard<()> {
        Arc::clone(&self.chats_gate).write_owned().await
    }

    /// Drop lock entries that no task holds or waits on.
    pub async fn prune_chat_locks(&self) {
        self.chat_locks
            .lock()
            .await
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    #[cfg(test)]
    pub(crate) async fn chat_lock_count(&self) -> usize {
        self.chat_locks.lock().await.len()
    }
}

/// Held while working on one or more chats.
///
/// Fields drop in order: chat locks first, then the shared gate.
pub struct ChatGuard {
    _chats: Vec<OwnedMutexGuard<()>>,
    _gate: OwnedRwLockReadGuard<()>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn connection() -> Connection {
        Connection::new("conn-1".into(), "llama-3.1-8b-instruct-fast".into())
    }

    #[tokio::test]
    async fn test_defaults() {
        let conn = connection();
        let state = conn.state().await;
        assert_eq!(state.model, "llama-3.1-8b-instruct-fast");
        assert!(state.histories.is_empty());
        assert!(state.pending_image.is_none());
        assert!(state.formatting_enabled);
    }

    #[tokio::test]
    async fn test_set_model_ignores_blank() {
        let conn = connection();
        assert_eq!(conn.set_model("  qwq-32b ").await, "qwq-32b");
        assert_eq!(conn.set_model("   ").await, "qwq-32b");
    }

    #[tokio::test]
    async fn test_attach_and_take_image() {
        let conn = connection();
        assert!(conn.attach_image("http://img/cat.png").await);
        assert_eq!(conn.take_pending_image().await.as_deref(), Some("http://img/cat.png"));
        assert!(conn.pending_image().await.is_none());

        assert!(!conn.attach_image("").await);
        assert!(conn.pending_image().await.is_none());
    }

    #[tokio::test]
    async fn test_chat_lock_is_exclusive_per_chat() {
        let conn = Arc::new(connection());
        let guard = conn.lock_chat("c1").await;

        let other = conn.lock_chat("c2").await;
        drop(other);

        let waiter = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move {
                let _guard = conn.lock_chat("c1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        waiter.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_lock_all_chats_waits_for_chat_work_and_blocks_new_ids() {
        let conn = Arc::new(connection());
        let busy = conn.lock_chat("a").await;

        let replacer = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move {
                let _all = conn.lock_all_chats().await;
                tokio::time::sleep(Duration::from_millis(50)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!replacer.is_finished());

        let newcomer = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move {
                let _guard = conn.lock_chat("z").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!newcomer.is_finished());

        drop(busy);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!newcomer.is_finished());
        assert!(!replacer.is_finished());

        replacer.await.unwrap();
        newcomer.await.unwrap();
    }

    #[tokio::test]
    async fn test_prune_keeps_held_locks_only() {
        let conn = connection();
        drop(conn.lock_chat("gone").await);
        let held = conn.lock_chat("kept").await;
        assert_eq!(conn.chat_lock_count().await, 2);

        conn.prune_chat_locks().await;
        assert_eq!(conn.chat_lock_count().await, 1);

        drop(held);
        conn.prune_chat_locks().await;
        assert_eq!(conn.chat_lock_count().await, 0);
    }
}
