//! Orchestration facade
//!
//! The single entry point a front end talks to. Ties the conversation
//! store, the settings store, and the completion gateway together, and
//! serializes sends per chat so a reply never interleaves with a
//! concurrent append to the same chat.
//!
//! Failure handling here is deliberately different from the store's
//! fail-fast contract: when reply generation fails, a fixed apology is
//! persisted as the AI sender so the transcript stays self-describing,
//! and the true error travels back to the caller alongside it.

use crate::error::Result;
use crate::gateway::{CompletionGateway, ConnectionReport};
use crate::settings::SettingsStore;
use crate::store::{Chat, ChatDraft, ConversationStore, Message, MessageDraft};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Mutex as SendLock;

/// Transcript text persisted when reply generation fails
pub const AI_APOLOGY: &str =
    "Sorry, I wasn't able to respond just now. Please try again in a moment.";

/// Outcome of sending a user message
///
/// `ai_message` is the generated reply, or the persisted apology when
/// generation failed; `ai_error` carries the real failure in that case.
#[derive(Debug)]
pub struct SendOutcome {
    /// The persisted user message
    pub user_message: Message,
    /// The persisted AI reply or apology; `None` for non-AI chats
    pub ai_message: Option<Message>,
    /// The generation failure behind an apology, with its class intact
    pub ai_error: Option<anyhow::Error>,
}

/// Front-end facade over store, settings and gateway
///
/// Cheap to clone; clones share the stores and the per-chat send locks.
#[derive(Clone)]
pub struct ChatService {
    store: ConversationStore,
    settings: SettingsStore,
    gateway: CompletionGateway,
    send_locks: Arc<Mutex<HashMap<String, Arc<SendLock<()>>>>>,
}

impl ChatService {
    /// Assemble the service over an opened database
    pub fn new(db: sled::Db) -> Self {
        let store = ConversationStore::new(db.clone());
        let settings = SettingsStore::new(db);
        let gateway = CompletionGateway::new(store.clone(), settings.clone());
        Self {
            store,
            settings,
            gateway,
            send_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// The underlying conversation store
    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// The underlying settings store
    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// Send a user message into a chat
    ///
    /// The user message is always persisted first. For AI chats a reply
    /// is then generated and persisted; if generation fails, the fixed
    /// apology is persisted in its place and the real error is returned
    /// in the outcome. Sends to the same chat are serialized; dropping
    /// the returned future before completion persists no partial reply.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the chat does not exist, or a `Storage`
    /// failure from persisting.
    pub async fn send_user_message(&self, chat_id: &str, text: &str) -> Result<SendOutcome> {
        let lock = self.send_lock(chat_id);
        let _guard = lock.lock().await;

        let chat = self.store.get_chat(chat_id)?;
        let user_message = self
            .store
            .append_message(chat_id, MessageDraft::from_user(text))?;

        if !chat.is_ai {
            return Ok(SendOutcome {
                user_message,
                ai_message: None,
                ai_error: None,
            });
        }

        match self.gateway.generate_reply(chat_id, text).await {
            Ok(reply) => {
                let ai_message = self
                    .store
                    .append_message(chat_id, MessageDraft::from_ai(reply))?;
                Ok(SendOutcome {
                    user_message,
                    ai_message: Some(ai_message),
                    ai_error: None,
                })
            }
            Err(e) => {
                tracing::warn!("Reply generation failed for chat {}: {:#}", chat_id, e);
                let apology = self
                    .store
                    .append_message(chat_id, MessageDraft::from_ai(AI_APOLOGY))?;
                Ok(SendOutcome {
                    user_message,
                    ai_message: Some(apology),
                    ai_error: Some(e),
                })
            }
        }
    }

    /// Probe the configured backend without persisting anything
    pub async fn test_connection(&self) -> ConnectionReport {
        self.gateway.test_connection().await
    }

    /// Summarize a chat's transcript through the backend
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the chat does not exist. Backend failures
    /// do not error; they yield the placeholder summary.
    pub async fn summarize_chat(&self, chat_id: &str) -> Result<String> {
        self.store.get_chat(chat_id)?;
        let messages = self.store.list_messages(chat_id)?;
        Ok(self.gateway.summarize(&messages).await)
    }

    /// Create a chat
    pub fn create_chat(&self, draft: ChatDraft) -> Result<Chat> {
        self.store.create_chat(draft)
    }

    /// All chats, most recently active first
    pub fn list_chats(&self) -> Result<Vec<Chat>> {
        self.store.list_chats()
    }

    /// Delete a chat and its messages
    ///
    /// Waits for any in-flight send on the chat before deleting, so a
    /// send never races the removal of its chat.
    pub async fn delete_chat(&self, chat_id: &str) -> Result<()> {
        let lock = self.send_lock(chat_id);
        let _guard = lock.lock().await;
        self.store.delete_chat(chat_id)?;
        self.send_locks
            .lock()
            .expect("send lock map poisoned")
            .remove(chat_id);
        Ok(())
    }

    /// The per-chat send lock, created on first use
    fn send_lock(&self, chat_id: &str) -> Arc<SendLock<()>> {
        self.send_locks
            .lock()
            .expect("send lock map poisoned")
            .entry(chat_id.to_string())
            .or_default()
            .clone()
    }
}
