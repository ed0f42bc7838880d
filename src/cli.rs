//! Command-line interface definition for ChatForge
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for chat management, messaging, search,
//! export/import, and gateway configuration.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// ChatForge - conversation store and AI completion gateway
///
/// Manage chats and their transcripts locally, and route AI chats
/// through a configured completion backend.
#[derive(Parser, Debug, Clone)]
#[command(name = "chatforge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the conversation database
    #[arg(long, env = "CHATFORGE_DB")]
    pub db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for ChatForge
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Manage chats
    Chat {
        /// Chat management subcommand
        #[command(subcommand)]
        command: ChatCommand,
    },

    /// Send a message into a chat
    Send {
        /// Chat identifier
        chat_id: String,

        /// Message text
        text: String,
    },

    /// Search message bodies
    Search {
        /// Substring to search for (case-insensitive)
        query: String,

        /// Restrict the search to one chat
        #[arg(short, long)]
        chat: Option<String>,
    },

    /// Show message statistics
    Stats {
        /// Restrict statistics to one chat
        #[arg(short, long)]
        chat: Option<String>,
    },

    /// Export chats to a bundle file
    Export {
        /// Export a single chat instead of all chats
        #[arg(short, long)]
        chat: Option<String>,

        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a bundle file
    Import {
        /// Bundle file to import
        file: PathBuf,

        /// Replace all existing chats instead of merging
        #[arg(long)]
        replace: bool,
    },

    /// Delete messages older than a retention window
    Cleanup {
        /// Retention window in days
        #[arg(long, default_value_t = 30)]
        days: i64,
    },

    /// Manage the gateway configuration
    Settings {
        /// Settings subcommand
        #[command(subcommand)]
        command: SettingsCommand,
    },

    /// Probe the configured backend
    Test,

    /// Summarize a chat through the backend
    Summarize {
        /// Chat identifier
        chat_id: String,
    },
}

/// Chat management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ChatCommand {
    /// List all chats, most recently active first
    List,

    /// Create a new chat
    New {
        /// Display name (defaults to "New Chat" / "AI Assistant")
        #[arg(short, long)]
        name: Option<String>,

        /// Create an AI-enabled chat
        #[arg(long)]
        ai: bool,
    },

    /// Delete a chat and its messages
    Delete {
        /// Chat identifier
        chat_id: String,
    },

    /// Delete all messages of a chat, keeping the chat itself
    Clear {
        /// Chat identifier
        chat_id: String,
    },

    /// Open an interactive session on a chat
    Open {
        /// Chat identifier
        chat_id: String,
    },
}

/// Gateway configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SettingsCommand {
    /// Show the current configuration
    Show,

    /// Change configuration fields; unset fields are left untouched
    Set {
        /// Backend endpoint URL; empty string unsets it
        #[arg(long)]
        endpoint: Option<String>,

        /// API credential; empty string clears it
        #[arg(long)]
        api_key: Option<String>,

        /// Model identifier
        #[arg(long)]
        model: Option<String>,

        /// Maximum output tokens (50-2000)
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Sampling temperature (0.0-1.0)
        #[arg(long)]
        temperature: Option<f32>,

        /// System prompt prepended to every completion
        #[arg(long)]
        system_prompt: Option<String>,
    },

    /// Reset the configuration to defaults
    Reset,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
