//! Chat operations on a connection.
//!
//! Every operation that mutates a chat holds that chat's lock for its whole
//! duration. For `send` the lock spans the backend call, so at most one send
//! is in flight per chat id and replies are appended in call order. A
//! replace import excludes all chat work on the connection, including work
//! on ids it has never seen. The connection state lock, by contrast, is only
//! held for in-memory steps.

use std::sync::Arc;

use crate::assembler::MessageAssembler;
use crate::format::apply_formatting;
use crate::provider::{ChatRequest, ChatResponse, Provider, ProviderError};
use crate::session::{ChatHistories, Connection, ImportMode, Message};

/// Backend-facing chat operations.
#[derive(Clone)]
pub struct ChatService {
    provider: Arc<dyn Provider>,
    assembler: MessageAssembler,
}

impl ChatService {
    pub fn new(provider: Arc<dyn Provider>, assembler: MessageAssembler) -> Self {
        Self {
            provider,
            assembler,
        }
    }

    /// Send `prompt` to chat `chat_id` with the chat's full history as context.
    ///
    /// On success the chat grows by exactly two messages: the user message
    /// and the assistant reply (formatted per the connection's setting). If
    /// the backend call fails or panics, the user message is removed again
    /// before the error or panic reaches the caller.
    pub async fn send(
        &self,
        connection: &Connection,
        chat_id: &str,
        prompt: &str,
    ) -> Result<ChatResponse, ProviderError> {
        let _chat = connection.lock_chat(chat_id).await;

        connection.state().await.histories.ensure(chat_id);
        let user_message = self.assembler.assemble(connection, prompt).await;

        let request = {
            let mut state = connection.state().await;
            state.histories.append(chat_id, user_message.clone());
            ChatRequest {
                model: state.model.clone(),
                messages: state.histories.history(chat_id),
            }
        };
        let model = request.model.clone();

        let provider = Arc::clone(&self.provider);
        let outcome = tokio::spawn(async move { provider.chat(request).await }).await;

        let mut response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                rollback(connection, chat_id, &user_message).await;
                tracing::warn!(
                    connection_id = %connection.id(),
                    chat_id = %chat_id,
                    error = %e,
                    "Backend call failed, user message rolled back"
                );
                return Err(e);
            }
            Err(join_error) => {
                rollback(connection, chat_id, &user_message).await;
                tracing::error!(
                    connection_id = %connection.id(),
                    chat_id = %chat_id,
                    "Backend call aborted, user message rolled back"
                );
                if join_error.is_panic() {
                    std::panic::resume_unwind(join_error.into_panic());
                }
                return Err(ProviderError {
                    provider: self.provider.name().to_string(),
                    model,
                    message: "Request cancelled".into(),
                });
            }
        };

        let mut state = connection.state().await;
        response.reply = apply_formatting(response.reply, state.formatting_enabled);
        state
            .histories
            .append(chat_id, Message::assistant(response.reply.clone()));

        tracing::debug!(
            connection_id = %connection.id(),
            chat_id = %chat_id,
            status = response.status,
            history_len = state.histories.get(chat_id).map_or(0, <[Message]>::len),
            "Chat turn completed"
        );

        Ok(response)
    }

    /// One-shot generation with no stored context. Consumes a pending image.
    pub async fn generate(
        &self,
        connection: &Connection,
        prompt: &str,
    ) -> Result<ChatResponse, ProviderError> {
        let user_message = self.assembler.assemble(connection, prompt).await;
        let request = ChatRequest {
            model: connection.model().await,
            messages: vec![user_message],
        };

        let mut response = self.provider.chat(request).await?;
        response.reply = apply_formatting(response.reply, connection.formatting_enabled().await);
        Ok(response)
    }

    /// Create the chat if absent. Never clears an existing one.
    pub async fn ensure_chat(&self, connection: &Connection, chat_id: &str) {
        let _chat = connection.lock_chat(chat_id).await;
        connection.state().await.histories.ensure(chat_id);
    }

    /// Append a system message without calling the backend.
    pub async fn inform(&self, connection: &Connection, chat_id: &str, text: &str) {
        let _chat = connection.lock_chat(chat_id).await;
        connection
            .state()
            .await
            .histories
            .append(chat_id, Message::system(text));
    }

    pub async fn reset(&self, connection: &Connection, chat_id: &str) {
        let _chat = connection.lock_chat(chat_id).await;
        connection.state().await.histories.reset(chat_id);
        tracing::info!(connection_id = %connection.id(), chat_id = %chat_id, "Chat reset");
    }

    /// Remove a chat. Returns whether it existed.
    pub async fn delete(&self, connection: &Connection, chat_id: &str) -> bool {
        let chat = connection.lock_chat(chat_id).await;
        let existed = connection.state().await.histories.delete(chat_id);
        drop(chat);
        connection.prune_chat_locks().await;
        tracing::info!(
            connection_id = %connection.id(),
            chat_id = %chat_id,
            existed,
            "Chat deleted"
        );
        existed
    }

    /// Copy of one chat's messages; empty when absent.
    pub async fn history(&self, connection: &Connection, chat_id: &str) -> Vec<Message> {
        connection.state().await.histories.history(chat_id)
    }

    /// Replace one chat's messages wholesale.
    pub async fn import_history(
        &self,
        connection: &Connection,
        chat_id: &str,
        messages: Vec<Message>,
    ) {
        let _chat = connection.lock_chat(chat_id).await;
        let count = messages.len();
        connection.state().await.histories.replace(chat_id, messages);
        tracing::info!(
            connection_id = %connection.id(),
            chat_id = %chat_id,
            messages = count,
            "Chat history imported"
        );
    }

    /// Install a set of chats, replacing or merging with the existing ones.
    pub async fn import_chats(
        &self,
        connection: &Connection,
        chats: ChatHistories,
        mode: ImportMode,
    ) {
        let count = chats.len();
        match mode {
            ImportMode::Replace => {
                let _all = connection.lock_all_chats().await;
                connection.state().await.histories.import(chats, mode);
                connection.prune_chat_locks().await;
            }
            ImportMode::Merge => {
                let _chats = connection.lock_chats(chats.active_ids()).await;
                connection.state().await.histories.import(chats, mode);
            }
        }
        tracing::info!(
            connection_id = %connection.id(),
            chats = count,
            mode = ?mode,
            "Chats imported"
        );
    }

    /// Snapshot of every chat on the connection.
    pub async fn all_chats(&self, connection: &Connection) -> ChatHistories {
        connection.state().await.histories.clone()
    }

    /// Ids of every chat, including empty ones, in sorted order.
    pub async fn active_ids(&self, connection: &Connection) -> Vec<String> {
        connection.state().await.histories.active_ids()
    }
}

/// Undo the user message of a send whose backend call did not complete.
async fn rollback(connection: &Connection, chat_id: &str, user_message: &Message) {
    connection
        .state()
        .await
        .histories
        .remove_last_if(chat_id, user_message);
}
