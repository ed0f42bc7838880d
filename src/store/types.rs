//! Record types for the conversation store
//!
//! Defines the persisted `Chat` and `Message` records, the message
//! delivery-status state machine, and the small report/aggregate types
//! returned by store operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Sender identifier used for messages authored by the local user
pub const SENDER_USER: &str = "user";

/// Sender identifier used for messages authored by the AI backend
pub const SENDER_AI: &str = "ai";

/// Per-chat preference flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
    /// Whether notifications are enabled for this chat
    pub notifications: bool,
    /// Whether the chat is archived
    pub archived: bool,
    /// Whether the chat is pinned
    pub pinned: bool,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            notifications: true,
            archived: false,
            pinned: false,
        }
    }
}

/// A persisted chat record
///
/// The `last_message` / `last_message_at` fields are bookkeeping kept in
/// sync with message appends; `seq_counter` hands out the per-chat
/// insertion order used to break timestamp ties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    /// Unique identifier, generated at creation
    pub id: String,
    /// Display name
    pub name: String,
    /// Whether replies in this chat are generated by an AI backend
    pub is_ai: bool,
    /// Participant identifiers (excluding the local user)
    #[serde(default)]
    pub participants: Vec<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last mutation time (message append or settings change)
    pub updated_at: DateTime<Utc>,
    /// Body text of the most recent message, if any
    #[serde(default)]
    pub last_message: Option<String>,
    /// Timestamp of the most recent message, if any
    #[serde(default)]
    pub last_message_at: Option<DateTime<Utc>>,
    /// Unread counter; never bumped by the store itself
    #[serde(default)]
    pub unread_count: u32,
    /// Per-chat preferences
    #[serde(default)]
    pub settings: ChatSettings,
    /// Next insertion-order value for messages in this chat
    #[serde(default)]
    pub seq_counter: u64,
}

/// Fields a caller may supply when creating a chat
#[derive(Debug, Clone, Default)]
pub struct ChatDraft {
    /// Display name; defaults to "New Chat" ("AI Assistant" when `is_ai`)
    pub name: Option<String>,
    /// Whether the chat is AI-enabled
    pub is_ai: bool,
    /// Initial participant identifiers
    pub participants: Vec<String>,
}

/// Fields a caller may change on an existing chat
///
/// Unset fields are left untouched by `update_chat`.
#[derive(Debug, Clone, Default)]
pub struct ChatPatch {
    /// New display name
    pub name: Option<String>,
    /// New participant list
    pub participants: Option<Vec<String>>,
    /// New unread counter value
    pub unread_count: Option<u32>,
    /// New preference flags
    pub settings: Option<ChatSettings>,
}

/// Message type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    /// Ordinary conversation text
    Text,
    /// In-transcript notice (joins, renames, error banners)
    System,
}

impl Default for MessageKind {
    fn default() -> Self {
        Self::Text
    }
}

/// Message delivery status
///
/// Modeled as an explicit state machine rather than ad hoc strings so
/// that invalid moves (e.g. `Failed -> Read`) are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Optimistically persisted, delivery in flight
    Sending,
    /// Accepted by the transport
    Sent,
    /// Confirmed delivered to the recipient
    Delivered,
    /// Confirmed read by the recipient
    Read,
    /// Delivery failed; terminal
    Failed,
}

impl MessageStatus {
    /// Whether moving from `self` to `next` is a legal transition
    ///
    /// # Examples
    ///
    /// ```
    /// use chatforge::store::MessageStatus;
    ///
    /// assert!(MessageStatus::Sending.can_transition(MessageStatus::Sent));
    /// assert!(!MessageStatus::Failed.can_transition(MessageStatus::Read));
    /// ```
    pub fn can_transition(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Sending, Self::Sent)
                | (Self::Sending, Self::Failed)
                | (Self::Sent, Self::Delivered)
                | (Self::Sent, Self::Failed)
                | (Self::Delivered, Self::Read)
        )
    }

    /// Lowercase label matching the serialized form
    pub fn label(self) -> &'static str {
        match self {
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
            Self::Failed => "failed",
        }
    }
}

impl Default for MessageStatus {
    fn default() -> Self {
        Self::Sent
    }
}

/// A persisted message record
///
/// Immutable once created except for `status` and `metadata` updates.
/// Ordering within a chat is by `timestamp` ascending, ties broken by
/// the insertion counter `seq`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique identifier within the owning chat
    pub id: String,
    /// Owning chat id
    pub chat_id: String,
    /// Sender identifier: `"user"`, `"ai"`, or a participant id
    pub sender: String,
    /// Sender display name
    pub sender_name: String,
    /// Body text
    pub body: String,
    /// Creation time
    pub timestamp: DateTime<Utc>,
    /// Per-chat insertion order, assigned by the store
    #[serde(default)]
    pub seq: u64,
    /// Message type
    #[serde(default)]
    pub kind: MessageKind,
    /// Delivery status
    #[serde(default)]
    pub status: MessageStatus,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Message {
    /// Whether this message was authored by the AI backend
    pub fn is_from_ai(&self) -> bool {
        self.sender == SENDER_AI
    }

    /// Whether this message was authored by the local user
    pub fn is_from_user(&self) -> bool {
        self.sender == SENDER_USER
    }

    /// Number of whitespace-separated words in the body
    pub fn word_count(&self) -> usize {
        self.body.split_whitespace().count()
    }
}

/// Fields a caller supplies when appending a message
#[derive(Debug, Clone)]
pub struct MessageDraft {
    /// Sender identifier
    pub sender: String,
    /// Sender display name
    pub sender_name: String,
    /// Body text
    pub body: String,
    /// Message type; defaults to [`MessageKind::Text`]
    pub kind: MessageKind,
    /// Initial delivery status; defaults to [`MessageStatus::Sent`]
    pub status: MessageStatus,
    /// Free-form metadata
    pub metadata: HashMap<String, serde_json::Value>,
}

impl MessageDraft {
    /// Draft for a message authored by the local user
    pub fn from_user(body: impl Into<String>) -> Self {
        Self {
            sender: SENDER_USER.to_string(),
            sender_name: "You".to_string(),
            body: body.into(),
            kind: MessageKind::Text,
            status: MessageStatus::Sent,
            metadata: HashMap::new(),
        }
    }

    /// Draft for a message authored by the AI backend
    pub fn from_ai(body: impl Into<String>) -> Self {
        Self {
            sender: SENDER_AI.to_string(),
            sender_name: "AI Assistant".to_string(),
            body: body.into(),
            kind: MessageKind::Text,
            status: MessageStatus::Sent,
            metadata: HashMap::new(),
        }
    }

    /// Draft for an in-transcript system notice
    pub fn system_notice(body: impl Into<String>) -> Self {
        Self {
            sender: "system".to_string(),
            sender_name: "System".to_string(),
            body: body.into(),
            kind: MessageKind::System,
            status: MessageStatus::Sent,
            metadata: HashMap::new(),
        }
    }

    /// Override the message kind
    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    /// Override the initial delivery status
    pub fn with_status(mut self, status: MessageStatus) -> Self {
        self.status = status;
        self
    }
}

/// Aggregate message statistics for one chat or the whole store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    /// Total number of messages counted
    pub total_messages: usize,
    /// Messages sent by the local user
    pub user_messages: usize,
    /// Messages generated by the AI backend
    pub ai_messages: usize,
    /// Messages from any other sender
    pub other_messages: usize,
    /// Mean whitespace-separated word count per message
    pub average_words_per_message: f64,
}

/// Messages in one chat matching a search query
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Chat the matches belong to
    pub chat_id: String,
    /// Matching messages, in chat order
    pub matches: Vec<Message>,
}

/// Outcome of a retention cleanup pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    /// Number of messages deleted
    pub removed: usize,
}
