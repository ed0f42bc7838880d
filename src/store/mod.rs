//! Conversation store for ChatForge
//!
//! Owns chat and message lifetimes: CRUD, ordering, search, statistics,
//! retention cleanup, and export/import. Records live in a single sled
//! tree as JSON values under fixed key names: the chat list under
//! `"chats"`, each chat's messages under `"messages:<chatId>"`.
//!
//! Message appends update the owning chat's last-message bookkeeping in
//! the same sled transaction, so both records commit or neither does.

use crate::error::{ChatForgeError, Result};
use anyhow::Context;
use chrono::{Duration, Utc};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{
    ConflictableTransactionError, ConflictableTransactionResult, TransactionError,
    TransactionResult, TransactionalTree,
};
use std::path::PathBuf;
use uuid::Uuid;

pub mod export;
pub mod types;

pub use export::{Bundle, ChatExport, ImportMode, ImportReport, BUNDLE_VERSION};
pub use types::{
    Chat, ChatDraft, ChatPatch, ChatSettings, CleanupReport, Message, MessageDraft, MessageKind,
    MessageStatus, SearchHit, Stats, SENDER_AI, SENDER_USER,
};

/// Key holding the chat list record
const CHATS_KEY: &[u8] = b"chats";

/// Prefix for per-chat message records
const MESSAGES_PREFIX: &str = "messages:";

/// Key for the message record of one chat
fn messages_key(chat_id: &str) -> String {
    format!("{}{}", MESSAGES_PREFIX, chat_id)
}

/// Open the sled database at the default application data directory
///
/// The path can be overridden via the `CHATFORGE_DB` environment
/// variable, which makes it easy to point the binary at a test database
/// without changing the user's data dir.
pub fn open_default_db() -> Result<sled::Db> {
    if let Ok(override_path) = std::env::var("CHATFORGE_DB") {
        return open_db_at(override_path);
    }

    let proj_dirs = ProjectDirs::from("com", "chatforge", "chatforge")
        .ok_or_else(|| ChatForgeError::Storage("Could not determine data directory".into()))?;

    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .context("Failed to create data directory")
        .map_err(|e| ChatForgeError::Storage(e.to_string()))?;

    open_db_at(data_dir.join("chatforge.db"))
}

/// Open the sled database at an explicit path
///
/// Primarily useful for tests where the default application data
/// directory is not desirable (for example, a temporary directory).
pub fn open_db_at<P: Into<PathBuf>>(path: P) -> Result<sled::Db> {
    let path = path.into();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .context("Failed to create parent directory for database")
            .map_err(|e| ChatForgeError::Storage(e.to_string()))?;
    }
    let db = sled::open(&path).map_err(|e| ChatForgeError::Storage(e.to_string()))?;
    tracing::debug!("Opened conversation database at {}", path.display());
    Ok(db)
}

/// Store for chats and their ordered messages
///
/// Cheap to clone; clones share the same underlying database.
///
/// # Examples
///
/// ```no_run
/// use chatforge::store::{ConversationStore, ChatDraft, MessageDraft};
///
/// # fn example() -> chatforge::error::Result<()> {
/// let db = chatforge::store::open_default_db()?;
/// let store = ConversationStore::new(db);
/// let chat = store.create_chat(ChatDraft { is_ai: true, ..Default::default() })?;
/// store.append_message(&chat.id, MessageDraft::from_user("Hello"))?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ConversationStore {
    db: sled::Db,
}

impl ConversationStore {
    /// Create a store over an already-opened database
    pub fn new(db: sled::Db) -> Self {
        Self { db }
    }

    /// Read and decode a JSON record, `None` when the key is absent
    fn read_json<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        match self
            .db
            .get(key)
            .map_err(|e| ChatForgeError::Storage(e.to_string()))?
        {
            Some(raw) => {
                let value = serde_json::from_slice(&raw).map_err(|e| {
                    ChatForgeError::Storage(format!(
                        "corrupt record {}: {}",
                        String::from_utf8_lossy(key),
                        e
                    ))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// All chats, ordered by last-message time (most recent first)
    ///
    /// Chats without messages sort by their creation time; exact ties
    /// fall back to creation order.
    pub fn list_chats(&self) -> Result<Vec<Chat>> {
        let mut chats: Vec<Chat> = self.read_json(CHATS_KEY)?.unwrap_or_default();
        chats.sort_by(|a, b| {
            let a_time = a.last_message_at.unwrap_or(a.created_at);
            let b_time = b.last_message_at.unwrap_or(b.created_at);
            b_time
                .cmp(&a_time)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(chats)
    }

    /// Look up a single chat by id
    pub fn get_chat(&self, chat_id: &str) -> Result<Chat> {
        let chats: Vec<Chat> = self.read_json(CHATS_KEY)?.unwrap_or_default();
        chats
            .into_iter()
            .find(|c| c.id == chat_id)
            .ok_or_else(|| ChatForgeError::NotFound(format!("chat {}", chat_id)).into())
    }

    /// Create a new chat with a fresh id
    ///
    /// Defaults the display name to "New Chat", or "AI Assistant" when
    /// the AI flag is set.
    pub fn create_chat(&self, draft: ChatDraft) -> Result<Chat> {
        let now = Utc::now();
        let chat = Chat {
            id: Uuid::new_v4().to_string(),
            name: draft.name.unwrap_or_else(|| {
                if draft.is_ai {
                    "AI Assistant".to_string()
                } else {
                    "New Chat".to_string()
                }
            }),
            is_ai: draft.is_ai,
            participants: draft.participants,
            created_at: now,
            updated_at: now,
            last_message: None,
            last_message_at: None,
            unread_count: 0,
            settings: ChatSettings::default(),
            seq_counter: 0,
        };

        let result = self.db.transaction(|tx| {
            let mut chats = tx_read_chats(tx)?;
            chats.push(chat.clone());
            tx_write_json(tx, CHATS_KEY, &chats)?;
            Ok(())
        });
        commit(result)?;

        tracing::info!("Created chat {} ({})", chat.id, chat.name);
        Ok(chat)
    }

    /// Merge a patch into an existing chat and stamp its update time
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the chat does not exist.
    pub fn update_chat(&self, chat_id: &str, patch: ChatPatch) -> Result<Chat> {
        let now = Utc::now();
        let result = self.db.transaction(|tx| {
            let mut chats = tx_read_chats(tx)?;
            let chat = chats
                .iter_mut()
                .find(|c| c.id == chat_id)
                .ok_or_else(|| abort_not_found("chat", chat_id))?;

            if let Some(name) = &patch.name {
                chat.name = name.clone();
            }
            if let Some(participants) = &patch.participants {
                chat.participants = participants.clone();
            }
            if let Some(unread) = patch.unread_count {
                chat.unread_count = unread;
            }
            if let Some(settings) = &patch.settings {
                chat.settings = settings.clone();
            }
            chat.updated_at = now;

            let updated = chat.clone();
            tx_write_json(tx, CHATS_KEY, &chats)?;
            Ok(updated)
        });
        commit(result)
    }

    /// Delete a chat and all of its messages
    ///
    /// Idempotent: deleting an absent chat is not an error.
    pub fn delete_chat(&self, chat_id: &str) -> Result<()> {
        let key = messages_key(chat_id);
        let result = self.db.transaction(|tx| {
            let mut chats = tx_read_chats(tx)?;
            chats.retain(|c| c.id != chat_id);
            tx_write_json(tx, CHATS_KEY, &chats)?;
            tx.remove(key.as_bytes())?;
            Ok(())
        });
        commit(result)?;
        tracing::info!("Deleted chat {}", chat_id);
        Ok(())
    }

    /// Messages of one chat, ascending by timestamp
    ///
    /// Ties are broken by insertion order. An absent chat yields an
    /// empty list.
    pub fn list_messages(&self, chat_id: &str) -> Result<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .read_json(messages_key(chat_id).as_bytes())?
            .unwrap_or_default();
        messages.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.seq.cmp(&b.seq)));
        Ok(messages)
    }

    /// Append a message to a chat
    ///
    /// Assigns a fresh id and timestamp, and updates the owning chat's
    /// last-message fields in the same transaction. The unread counter
    /// is never touched here.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the chat does not exist.
    pub fn append_message(&self, chat_id: &str, draft: MessageDraft) -> Result<Message> {
        let message_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let key = messages_key(chat_id);

        let result = self.db.transaction(|tx| {
            let mut chats = tx_read_chats(tx)?;
            let chat = chats
                .iter_mut()
                .find(|c| c.id == chat_id)
                .ok_or_else(|| abort_not_found("chat", chat_id))?;

            let message = Message {
                id: message_id.clone(),
                chat_id: chat_id.to_string(),
                sender: draft.sender.clone(),
                sender_name: draft.sender_name.clone(),
                body: draft.body.clone(),
                timestamp: now,
                seq: chat.seq_counter,
                kind: draft.kind,
                status: draft.status,
                metadata: draft.metadata.clone(),
            };

            chat.seq_counter += 1;
            chat.last_message = Some(message.body.clone());
            chat.last_message_at = Some(now);
            chat.updated_at = now;

            let mut messages = tx_read_messages(tx, &key)?;
            messages.push(message.clone());

            tx_write_json(tx, key.as_bytes(), &messages)?;
            tx_write_json(tx, CHATS_KEY, &chats)?;
            Ok(message)
        });
        commit(result)
    }

    /// Move a message to a new delivery status
    ///
    /// Transitions are checked against the status state machine; an
    /// illegal move (e.g. failed to read) is rejected.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the chat or message is absent, or
    /// `InvalidStatusTransition` for an illegal move.
    pub fn update_message_status(
        &self,
        chat_id: &str,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<Message> {
        let key = messages_key(chat_id);
        let result = self.db.transaction(|tx| {
            let mut messages = tx_read_messages(tx, &key)?;
            let message = messages
                .iter_mut()
                .find(|m| m.id == message_id)
                .ok_or_else(|| abort_not_found("message", message_id))?;

            if !message.status.can_transition(status) {
                return Err(ConflictableTransactionError::Abort(
                    ChatForgeError::InvalidStatusTransition {
                        from: message.status.label().to_string(),
                        to: status.label().to_string(),
                    },
                ));
            }
            message.status = status;
            let updated = message.clone();
            tx_write_json(tx, key.as_bytes(), &messages)?;
            Ok(updated)
        });
        commit(result)
    }

    /// Delete all messages of a chat and reset its last-message fields
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the chat does not exist.
    pub fn clear_messages(&self, chat_id: &str) -> Result<()> {
        let now = Utc::now();
        let key = messages_key(chat_id);
        let result = self.db.transaction(|tx| {
            let mut chats = tx_read_chats(tx)?;
            let chat = chats
                .iter_mut()
                .find(|c| c.id == chat_id)
                .ok_or_else(|| abort_not_found("chat", chat_id))?;

            chat.last_message = None;
            chat.last_message_at = None;
            chat.updated_at = now;

            tx.remove(key.as_bytes())?;
            tx_write_json(tx, CHATS_KEY, &chats)?;
            Ok(())
        });
        commit(result)
    }

    /// Case-insensitive substring search over message bodies
    ///
    /// Scoped to one chat when `chat_id` is given, otherwise across all
    /// chats. Chats without matches are omitted from the result.
    pub fn search_messages(&self, query: &str, chat_id: Option<&str>) -> Result<Vec<SearchHit>> {
        let needle = query.to_lowercase();
        let chat_ids: Vec<String> = match chat_id {
            Some(id) => vec![id.to_string()],
            None => self.list_chats()?.into_iter().map(|c| c.id).collect(),
        };

        let mut hits = Vec::new();
        for id in chat_ids {
            let matches: Vec<Message> = self
                .list_messages(&id)?
                .into_iter()
                .filter(|m| m.body.to_lowercase().contains(&needle))
                .collect();
            if !matches.is_empty() {
                hits.push(SearchHit {
                    chat_id: id,
                    matches,
                });
            }
        }
        Ok(hits)
    }

    /// Delete messages older than `days` days, across all chats
    ///
    /// Removes messages with a timestamp strictly older than
    /// `now - days` and reports how many were deleted. Chat bookkeeping
    /// fields are left untouched; the next append refreshes them.
    pub fn cleanup_older_than(&self, days: i64) -> Result<CleanupReport> {
        let cutoff = Utc::now() - Duration::days(days);
        let chat_ids: Vec<String> = self.list_chats()?.into_iter().map(|c| c.id).collect();

        let mut removed = 0usize;
        for id in chat_ids {
            let key = messages_key(&id);
            let result = self.db.transaction(|tx| {
                let messages = tx_read_messages(tx, &key)?;
                let kept: Vec<Message> = messages
                    .iter()
                    .filter(|m| m.timestamp >= cutoff)
                    .cloned()
                    .collect();
                let dropped = messages.len() - kept.len();
                if dropped > 0 {
                    tx_write_json(tx, key.as_bytes(), &kept)?;
                }
                Ok(dropped)
            });
            removed += commit(result)?;
        }

        if removed > 0 {
            tracing::info!("Retention cleanup removed {} messages", removed);
        }
        Ok(CleanupReport { removed })
    }

    /// Aggregate message statistics
    ///
    /// For a single chat when `chat_id` is given, otherwise across all
    /// chats. Word counts split the body on whitespace.
    pub fn statistics(&self, chat_id: Option<&str>) -> Result<Stats> {
        let chat_ids: Vec<String> = match chat_id {
            Some(id) => {
                // Ensure the referenced chat exists before aggregating
                self.get_chat(id)?;
                vec![id.to_string()]
            }
            None => self.list_chats()?.into_iter().map(|c| c.id).collect(),
        };

        let mut stats = Stats::default();
        let mut total_words = 0usize;
        for id in chat_ids {
            for message in self.list_messages(&id)? {
                stats.total_messages += 1;
                total_words += message.word_count();
                if message.is_from_user() {
                    stats.user_messages += 1;
                } else if message.is_from_ai() {
                    stats.ai_messages += 1;
                } else {
                    stats.other_messages += 1;
                }
            }
        }
        if stats.total_messages > 0 {
            stats.average_words_per_message = total_words as f64 / stats.total_messages as f64;
        }
        Ok(stats)
    }

    /// Install a fully-formed chat and its messages in one transaction
    ///
    /// Used by bundle import (which mints ids before calling) and by
    /// tests that need crafted timestamps.
    pub(crate) fn install_chat(&self, chat: Chat, messages: Vec<Message>) -> Result<()> {
        let key = messages_key(&chat.id);
        let result = self.db.transaction(|tx| {
            let mut chats = tx_read_chats(tx)?;
            chats.retain(|c| c.id != chat.id);
            chats.push(chat.clone());
            tx_write_json(tx, CHATS_KEY, &chats)?;
            tx_write_json(tx, key.as_bytes(), &messages)?;
            Ok(())
        });
        commit(result)
    }

    /// Remove every chat and message record
    pub(crate) fn wipe_chats(&self) -> Result<()> {
        let chat_ids: Vec<String> = self.list_chats()?.into_iter().map(|c| c.id).collect();
        for id in chat_ids {
            self.delete_chat(&id)?;
        }
        Ok(())
    }
}

/// Read the chat list inside a transaction
fn tx_read_chats(
    tx: &TransactionalTree,
) -> ConflictableTransactionResult<Vec<Chat>, ChatForgeError> {
    match tx.get(CHATS_KEY)? {
        Some(raw) => serde_json::from_slice(&raw).map_err(|e| {
            ConflictableTransactionError::Abort(ChatForgeError::Storage(format!(
                "corrupt chat list: {}",
                e
            )))
        }),
        None => Ok(Vec::new()),
    }
}

/// Read one chat's message list inside a transaction
fn tx_read_messages(
    tx: &TransactionalTree,
    key: &str,
) -> ConflictableTransactionResult<Vec<Message>, ChatForgeError> {
    match tx.get(key.as_bytes())? {
        Some(raw) => serde_json::from_slice(&raw).map_err(|e| {
            ConflictableTransactionError::Abort(ChatForgeError::Storage(format!(
                "corrupt record {}: {}",
                key, e
            )))
        }),
        None => Ok(Vec::new()),
    }
}

/// Serialize and write a JSON record inside a transaction
fn tx_write_json<T: Serialize>(
    tx: &TransactionalTree,
    key: &[u8],
    value: &T,
) -> ConflictableTransactionResult<(), ChatForgeError> {
    let raw = serde_json::to_vec(value).map_err(|e| {
        ConflictableTransactionError::Abort(ChatForgeError::Storage(e.to_string()))
    })?;
    tx.insert(key, raw)?;
    Ok(())
}

/// Abort a transaction with a `NotFound` error
fn abort_not_found(kind: &str, id: &str) -> ConflictableTransactionError<ChatForgeError> {
    ConflictableTransactionError::Abort(ChatForgeError::NotFound(format!("{} {}", kind, id)))
}

/// Unwrap a transaction result into the crate's `Result`
fn commit<T>(result: TransactionResult<T, ChatForgeError>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(e)) => Err(e.into()),
        Err(TransactionError::Storage(e)) => Err(ChatForgeError::Storage(e.to_string()).into()),
    }
}
