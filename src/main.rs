//! ChatForge - conversation store and AI completion gateway
//!
#![doc = "ChatForge - conversation store and AI completion gateway"]
#![doc = "Main entry point for the chatforge binary."]

use anyhow::Result;
use colored::Colorize;
use prettytable::{format, Table};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use chatforge::cli::{ChatCommand, Cli, Commands, SettingsCommand};
use chatforge::facade::ChatService;
use chatforge::repl;
use chatforge::settings::{GatewayConfig, GatewayConfigPatch};
use chatforge::store::{Bundle, ChatDraft, ImportMode};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose);

    let db = match &cli.db {
        Some(path) => chatforge::store::open_db_at(path.clone())?,
        None => chatforge::store::open_default_db()?,
    };
    let service = ChatService::new(db);

    match cli.command {
        Commands::Chat { command } => match command {
            ChatCommand::List => list_chats(&service),
            ChatCommand::New { name, ai } => {
                let chat = service.create_chat(ChatDraft {
                    name,
                    is_ai: ai,
                    ..Default::default()
                })?;
                println!("Created {} ({})", chat.name.bold(), chat.id.cyan());
                Ok(())
            }
            ChatCommand::Delete { chat_id } => {
                service.delete_chat(&chat_id).await?;
                println!("Deleted chat {}", chat_id.cyan());
                Ok(())
            }
            ChatCommand::Clear { chat_id } => {
                service.store().clear_messages(&chat_id)?;
                println!("Cleared messages of chat {}", chat_id.cyan());
                Ok(())
            }
            ChatCommand::Open { chat_id } => repl::run_session(&service, &chat_id).await,
        },
        Commands::Send { chat_id, text } => {
            let outcome = service.send_user_message(&chat_id, &text).await?;
            println!("{} {}", "you:".cyan(), outcome.user_message.body);
            if let Some(reply) = outcome.ai_message {
                println!("{} {}", format!("{}:", reply.sender_name).green(), reply.body);
            }
            if let Some(error) = outcome.ai_error {
                eprintln!("{} {:#}", "error:".red(), error);
            }
            Ok(())
        }
        Commands::Search { query, chat } => {
            let hits = service.store().search_messages(&query, chat.as_deref())?;
            if hits.is_empty() {
                println!("{}", "No matches.".yellow());
                return Ok(());
            }
            for hit in hits {
                println!("{} {}", "chat".bold(), hit.chat_id.cyan());
                for message in hit.matches {
                    println!(
                        "  {} {}: {}",
                        message.timestamp.format("%Y-%m-%d %H:%M").to_string().dimmed(),
                        message.sender_name,
                        message.body
                    );
                }
            }
            Ok(())
        }
        Commands::Stats { chat } => {
            let stats = service.store().statistics(chat.as_deref())?;
            println!("Total messages:    {}", stats.total_messages);
            println!("From you:          {}", stats.user_messages);
            println!("From AI:           {}", stats.ai_messages);
            println!("From others:       {}", stats.other_messages);
            println!(
                "Avg words/message: {:.1}",
                stats.average_words_per_message
            );
            Ok(())
        }
        Commands::Export { chat, output } => {
            let bundle = match chat {
                Some(id) => service.store().export_chat(&id)?,
                None => service.store().export_all()?,
            };
            let json = bundle.to_json()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!(
                        "Exported {} chats to {}",
                        bundle.chat_count(),
                        path.display()
                    );
                }
                None => println!("{}", json),
            }
            Ok(())
        }
        Commands::Import { file, replace } => {
            let raw = std::fs::read_to_string(&file)?;
            let bundle = Bundle::from_json(&raw)?;
            let mode = if replace {
                ImportMode::Replace
            } else {
                ImportMode::Merge
            };
            let report = service.store().import_bundle(&bundle, mode)?;
            println!("Imported {} chats", report.imported_chats);
            Ok(())
        }
        Commands::Cleanup { days } => {
            let report = service.store().cleanup_older_than(days)?;
            println!(
                "Removed {} messages older than {} days",
                report.removed, days
            );
            Ok(())
        }
        Commands::Settings { command } => match command {
            SettingsCommand::Show => {
                let config = service.settings().load()?;
                print_config(&config);
                Ok(())
            }
            SettingsCommand::Set {
                endpoint,
                api_key,
                model,
                max_tokens,
                temperature,
                system_prompt,
            } => {
                let config = service.settings().save(GatewayConfigPatch {
                    endpoint,
                    api_key,
                    model,
                    max_tokens,
                    temperature,
                    system_prompt,
                })?;
                println!("{}", "Saved.".green());
                print_config(&config);
                Ok(())
            }
            SettingsCommand::Reset => {
                service.settings().clear()?;
                println!("{}", "Configuration reset to defaults.".green());
                Ok(())
            }
        },
        Commands::Test => {
            let report = service.test_connection().await;
            if report.ok {
                println!(
                    "{} {}",
                    "Backend reachable:".green(),
                    report.response.unwrap_or_default()
                );
            } else {
                println!(
                    "{} {}",
                    "Backend unreachable:".red(),
                    report.error.unwrap_or_default()
                );
            }
            Ok(())
        }
        Commands::Summarize { chat_id } => {
            let summary = service.summarize_chat(&chat_id).await?;
            println!("{}", summary);
            Ok(())
        }
    }
}

/// Render the chat list as a table
fn list_chats(service: &ChatService) -> Result<()> {
    let chats = service.list_chats()?;
    if chats.is_empty() {
        println!("{}", "No chats yet. Create one with `chatforge chat new`.".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row![
        "ID".bold(),
        "Name".bold(),
        "AI".bold(),
        "Last message".bold(),
        "When".bold()
    ]);

    for chat in chats {
        let id_short = &chat.id[..8.min(chat.id.len())];
        let last = preview(chat.last_message.as_deref().unwrap_or("-"));
        let when = chat
            .last_message_at
            .unwrap_or(chat.created_at)
            .format("%Y-%m-%d %H:%M")
            .to_string();
        let ai = if chat.is_ai { "yes" } else { "" };
        table.add_row(prettytable::row![id_short.cyan(), chat.name, ai, last, when]);
    }

    table.printstd();
    println!();
    println!(
        "Use {} to start talking.",
        "chatforge chat open <ID>".cyan()
    );
    Ok(())
}

/// Shorten a last-message preview to at most 40 characters
///
/// Truncates on character boundaries, so multi-byte text never splits
/// mid-character.
fn preview(text: &str) -> String {
    if text.chars().count() > 40 {
        let head: String = text.chars().take(37).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Print the gateway configuration, masking the credential
fn print_config(config: &GatewayConfig) {
    let endpoint = if config.is_configured() {
        config.endpoint.as_str()
    } else {
        "(not set)"
    };
    let api_key = match &config.api_key {
        Some(_) => "(set)",
        None => "(none)",
    };
    println!("endpoint:      {}", endpoint);
    println!("api_key:       {}", api_key);
    println!("model:         {}", config.model);
    println!("max_tokens:    {}", config.max_tokens);
    println!("temperature:   {}", config.temperature);
    println!("system_prompt: {}", config.system_prompt);
}


/// Initialize tracing subscriber with environment filter
fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "chatforge=debug"
    } else {
        "chatforge=info"
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
