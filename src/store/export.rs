//! Versioned export/import bundles for the conversation store
//!
//! A bundle is a serializable snapshot of one chat (or all chats) and
//! its messages. Import checks the version field and always mints fresh
//! chat and message ids so imported data can never collide with
//! existing records.

use crate::error::{ChatForgeError, Result};
use crate::store::types::{Chat, Message};
use crate::store::ConversationStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bundle format version accepted by import
pub const BUNDLE_VERSION: &str = "1.0";

/// One chat and its messages inside a bulk bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatExport {
    /// The chat record
    pub chat: Chat,
    /// All of its messages
    pub messages: Vec<Message>,
}

/// A versioned snapshot of one or more chats
///
/// Serializes to the two wire shapes consumed by the UI layer:
/// `{chat, messages, exportDate, version}` for a single chat and
/// `{chats: [{chat, messages}], exportDate, version}` for a bulk export.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bundle {
    /// Single-chat snapshot
    Single {
        /// The exported chat
        chat: Chat,
        /// Its messages
        messages: Vec<Message>,
        /// When the export was taken
        #[serde(rename = "exportDate")]
        export_date: DateTime<Utc>,
        /// Format version
        version: String,
    },
    /// Multi-chat snapshot
    Bulk {
        /// All exported chats with their messages
        chats: Vec<ChatExport>,
        /// When the export was taken
        #[serde(rename = "exportDate")]
        export_date: DateTime<Utc>,
        /// Format version
        version: String,
    },
}

impl Bundle {
    /// The bundle's format version field
    pub fn version(&self) -> &str {
        match self {
            Self::Single { version, .. } | Self::Bulk { version, .. } => version,
        }
    }

    /// Number of chats contained in the bundle
    pub fn chat_count(&self) -> usize {
        match self {
            Self::Single { .. } => 1,
            Self::Bulk { chats, .. } => chats.len(),
        }
    }

    /// Parse a bundle from JSON
    ///
    /// # Errors
    ///
    /// Returns `Format` when the JSON does not match either bundle shape.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| ChatForgeError::Format(format!("malformed bundle: {}", e)).into())
    }

    /// Serialize the bundle to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self).map_err(ChatForgeError::Serialization)?)
    }

    /// The (chat, messages) pairs of the bundle, by reference
    fn entries(&self) -> Vec<(&Chat, &Vec<Message>)> {
        match self {
            Self::Single { chat, messages, .. } => vec![(chat, messages)],
            Self::Bulk { chats, .. } => {
                chats.iter().map(|e| (&e.chat, &e.messages)).collect()
            }
        }
    }
}

/// How imported chats interact with existing data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Keep existing chats; imported chats are added alongside them
    Merge,
    /// Delete all existing chats before importing
    Replace,
}

/// Outcome of a bundle import
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    /// Number of chats created by the import
    pub imported_chats: usize,
}

impl ConversationStore {
    /// Export one chat and its messages as a single-chat bundle
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the chat does not exist.
    pub fn export_chat(&self, chat_id: &str) -> Result<Bundle> {
        let chat = self.get_chat(chat_id)?;
        let messages = self.list_messages(chat_id)?;
        Ok(Bundle::Single {
            chat,
            messages,
            export_date: Utc::now(),
            version: BUNDLE_VERSION.to_string(),
        })
    }

    /// Export every chat as a bulk bundle
    pub fn export_all(&self) -> Result<Bundle> {
        let mut chats = Vec::new();
        for chat in self.list_chats()? {
            let messages = self.list_messages(&chat.id)?;
            chats.push(ChatExport { chat, messages });
        }
        Ok(Bundle::Bulk {
            chats,
            export_date: Utc::now(),
            version: BUNDLE_VERSION.to_string(),
        })
    }

    /// Import a bundle, minting fresh chat and message ids
    ///
    /// Ids from the bundle are never reused, so an import can never
    /// collide with existing records. Timestamps, senders, statuses and
    /// metadata are preserved as exported.
    ///
    /// # Errors
    ///
    /// Returns `Format` if the bundle version is not `"1.0"`.
    pub fn import_bundle(&self, bundle: &Bundle, mode: ImportMode) -> Result<ImportReport> {
        if bundle.version() != BUNDLE_VERSION {
            return Err(ChatForgeError::Format(format!(
                "unsupported bundle version {:?}, expected {:?}",
                bundle.version(),
                BUNDLE_VERSION
            ))
            .into());
        }

        if mode == ImportMode::Replace {
            self.wipe_chats()?;
        }

        let mut imported = 0usize;
        for (chat, messages) in bundle.entries() {
            let new_chat_id = Uuid::new_v4().to_string();
            let mut chat = chat.clone();
            chat.id = new_chat_id.clone();

            let messages: Vec<Message> = messages
                .iter()
                .map(|m| {
                    let mut m = m.clone();
                    m.id = Uuid::new_v4().to_string();
                    m.chat_id = new_chat_id.clone();
                    m
                })
                .collect();

            // Keep the insertion counter ahead of every imported message
            chat.seq_counter = messages.iter().map(|m| m.seq + 1).max().unwrap_or(0);

            self.install_chat(chat, messages)?;
            imported += 1;
        }

        tracing::info!("Imported {} chats from bundle", imported);
        Ok(ImportReport {
            imported_chats: imported,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::classify;
    use crate::store::tests::create_test_store;
    use crate::store::{ChatDraft, MessageDraft};
    use std::collections::HashSet;

    #[test]
    fn test_export_chat_missing_is_not_found() {
        let (store, _dir) = create_test_store();
        let err = store.export_chat("missing").unwrap_err();
        assert!(matches!(classify(&err), Some(ChatForgeError::NotFound(_))));
    }

    #[test]
    fn test_single_chat_bundle_json_shape() {
        let (store, _dir) = create_test_store();
        let chat = store.create_chat(ChatDraft::default()).expect("create");
        store
            .append_message(&chat.id, MessageDraft::from_user("hi"))
            .expect("append");

        let bundle = store.export_chat(&chat.id).expect("export");
        let json = bundle.to_json().expect("to_json");
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value.get("chat").is_some());
        assert!(value.get("messages").is_some());
        assert!(value.get("exportDate").is_some());
        assert_eq!(value["version"], "1.0");
    }

    #[test]
    fn test_bulk_bundle_json_shape() {
        let (store, _dir) = create_test_store();
        store.create_chat(ChatDraft::default()).expect("create");
        store.create_chat(ChatDraft::default()).expect("create");

        let bundle = store.export_all().expect("export");
        assert_eq!(bundle.chat_count(), 2);
        let value: serde_json::Value =
            serde_json::from_str(&bundle.to_json().unwrap()).unwrap();
        assert_eq!(value["chats"].as_array().unwrap().len(), 2);
        assert_eq!(value["version"], "1.0");
    }

    #[test]
    fn test_bundle_roundtrips_through_json() {
        let (store, _dir) = create_test_store();
        let chat = store.create_chat(ChatDraft::default()).expect("create");
        store
            .append_message(&chat.id, MessageDraft::from_user("hello"))
            .expect("append");

        let bundle = store.export_chat(&chat.id).expect("export");
        let parsed = Bundle::from_json(&bundle.to_json().unwrap()).expect("parse");
        assert_eq!(parsed.version(), "1.0");
        assert_eq!(parsed.chat_count(), 1);
    }

    #[test]
    fn test_from_json_rejects_malformed_bundle() {
        let err = Bundle::from_json("{\"not\": \"a bundle\"}").unwrap_err();
        assert!(matches!(classify(&err), Some(ChatForgeError::Format(_))));
    }

    #[test]
    fn test_import_round_trips_counts_and_bodies_with_fresh_ids() {
        let (store, _dir) = create_test_store();
        let chat = store.create_chat(ChatDraft::default()).expect("create");
        store
            .append_message(&chat.id, MessageDraft::from_user("one"))
            .expect("append");
        store
            .append_message(&chat.id, MessageDraft::from_ai("two"))
            .expect("append");

        let bundle = store.export_all().expect("export");
        let report = store
            .import_bundle(&bundle, ImportMode::Merge)
            .expect("import");
        assert_eq!(report.imported_chats, 1);

        let chats = store.list_chats().expect("list");
        assert_eq!(chats.len(), 2);

        // Ids must be disjoint from the originals
        let ids: HashSet<&str> = chats.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), 2);
        let imported = chats.iter().find(|c| c.id != chat.id).expect("imported");

        let original_messages = store.list_messages(&chat.id).expect("list original");
        let imported_messages = store.list_messages(&imported.id).expect("list imported");
        assert_eq!(imported_messages.len(), original_messages.len());
        for (orig, imp) in original_messages.iter().zip(imported_messages.iter()) {
            assert_eq!(orig.body, imp.body);
            assert_eq!(orig.sender, imp.sender);
            assert_eq!(orig.timestamp, imp.timestamp);
            assert_ne!(orig.id, imp.id);
            assert_eq!(imp.chat_id, imported.id);
        }
    }

    #[test]
    fn test_import_replace_mode_clears_existing_chats() {
        let (store, _dir) = create_test_store();
        let keep = store.create_chat(ChatDraft::default()).expect("create");
        store
            .append_message(&keep.id, MessageDraft::from_user("kept?"))
            .expect("append");
        let bundle = store.export_chat(&keep.id).expect("export");

        store.create_chat(ChatDraft::default()).expect("extra");
        let report = store
            .import_bundle(&bundle, ImportMode::Replace)
            .expect("import");
        assert_eq!(report.imported_chats, 1);

        let chats = store.list_chats().expect("list");
        assert_eq!(chats.len(), 1);
        assert_ne!(chats[0].id, keep.id);
        let messages = store.list_messages(&chats[0].id).expect("messages");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].body, "kept?");
    }

    #[test]
    fn test_import_rejects_unknown_version() {
        let (store, _dir) = create_test_store();
        let chat = store.create_chat(ChatDraft::default()).expect("create");
        let mut bundle = store.export_chat(&chat.id).expect("export");
        if let Bundle::Single { version, .. } = &mut bundle {
            *version = "2.0".to_string();
        }

        let err = store.import_bundle(&bundle, ImportMode::Merge).unwrap_err();
        assert!(matches!(classify(&err), Some(ChatForgeError::Format(_))));
        // Nothing imported
        assert_eq!(store.list_chats().expect("list").len(), 1);
    }

    #[test]
    fn test_import_keeps_seq_counter_ahead_of_messages() {
        let (store, _dir) = create_test_store();
        let chat = store.create_chat(ChatDraft::default()).expect("create");
        store
            .append_message(&chat.id, MessageDraft::from_user("a"))
            .expect("append");
        store
            .append_message(&chat.id, MessageDraft::from_user("b"))
            .expect("append");

        let bundle = store.export_chat(&chat.id).expect("export");
        store
            .import_bundle(&bundle, ImportMode::Merge)
            .expect("import");

        let imported = store
            .list_chats()
            .expect("list")
            .into_iter()
            .find(|c| c.id != chat.id)
            .expect("imported chat");

        // Appending after import must continue the insertion order
        let appended = store
            .append_message(&imported.id, MessageDraft::from_user("c"))
            .expect("append");
        assert_eq!(appended.seq, 2);
    }
}
