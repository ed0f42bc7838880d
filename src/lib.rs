//! ChatForge - conversation store and AI completion gateway library
//!
//! This library provides the core functionality for ChatForge: durable
//! chat and message storage, gateway configuration, AI backend adapters,
//! and the orchestration facade that ties them together.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `store`: chat and message persistence, search, statistics, export/import
//! - `settings`: gateway configuration with merge-on-save semantics
//! - `adapters`: wire-protocol adapters for the supported backend families
//! - `gateway`: completion gateway with context shaping and retry
//! - `facade`: the single entry point a front end talks to
//! - `error`: error types and result aliases
//! - `cli` / `repl`: command-line interface and interactive session
//!
//! # Example
//!
//! ```no_run
//! use chatforge::facade::ChatService;
//! use chatforge::store::ChatDraft;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let db = chatforge::store::open_default_db()?;
//!     let service = ChatService::new(db);
//!
//!     let chat = service.create_chat(ChatDraft { is_ai: true, ..Default::default() })?;
//!     let outcome = service.send_user_message(&chat.id, "Hello!").await?;
//!     println!("{:?}", outcome.ai_message);
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod cli;
pub mod error;
pub mod facade;
pub mod gateway;
pub mod repl;
pub mod settings;
pub mod store;

// Re-export commonly used types
pub use adapters::{BackendAdapter, CompletionRequest};
pub use error::{ChatForgeError, Result};
pub use facade::{ChatService, SendOutcome};
pub use gateway::{CompletionGateway, ConnectionReport};
pub use settings::{GatewayConfig, GatewayConfigPatch, SettingsStore};
pub use store::{Chat, ConversationStore, Message};
