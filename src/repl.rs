//! Interactive chat session
//!
//! Runs a readline-based loop over one chat: each line is sent through
//! the orchestration facade, and replies (or the persisted apology) are
//! printed as they land in the transcript. Slash commands handle
//! everything that is not a message.

use crate::error::Result;
use crate::facade::ChatService;
use crate::store::Message;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

/// Slash commands recognized inside a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionCommand {
    /// Show the command list
    Help,
    /// Print the chat transcript so far
    History,
    /// Summarize the chat through the backend
    Summary,
    /// Probe the configured backend
    Test,
    /// Leave the session
    Exit,
    /// Not a command; treat the line as a message
    None,
}

/// Parse a slash command from an input line
fn parse_session_command(input: &str) -> SessionCommand {
    match input.to_lowercase().as_str() {
        "/help" | "/h" | "/?" => SessionCommand::Help,
        "/history" => SessionCommand::History,
        "/summary" => SessionCommand::Summary,
        "/test" => SessionCommand::Test,
        "/exit" | "/quit" | "/q" => SessionCommand::Exit,
        _ => SessionCommand::None,
    }
}

/// Run an interactive session over one chat
///
/// Returns when the user exits or the input stream closes. Ctrl-C and
/// Ctrl-D both end the session cleanly.
pub async fn run_session(service: &ChatService, chat_id: &str) -> Result<()> {
    let chat = service.store().get_chat(chat_id)?;
    let mut rl = DefaultEditor::new()?;

    print_banner(&chat.name, chat.is_ai);

    loop {
        match rl.readline(&format!("{} ", "you>".cyan())) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(trimmed)?;

                match parse_session_command(trimmed) {
                    SessionCommand::Help => {
                        print_help();
                        continue;
                    }
                    SessionCommand::History => {
                        for message in service.store().list_messages(chat_id)? {
                            print_message(&message);
                        }
                        continue;
                    }
                    SessionCommand::Summary => {
                        let summary = service.summarize_chat(chat_id).await?;
                        println!("{} {}", "summary:".purple(), summary);
                        continue;
                    }
                    SessionCommand::Test => {
                        let report = service.test_connection().await;
                        if report.ok {
                            println!(
                                "{} {}",
                                "backend ok:".green(),
                                report.response.unwrap_or_default()
                            );
                        } else {
                            println!(
                                "{} {}",
                                "backend unreachable:".red(),
                                report.error.unwrap_or_default()
                            );
                        }
                        continue;
                    }
                    SessionCommand::Exit => break,
                    SessionCommand::None => {}
                }

                let outcome = service.send_user_message(chat_id, trimmed).await?;
                if let Some(reply) = outcome.ai_message {
                    print_message(&reply);
                }
                if let Some(error) = outcome.ai_error {
                    println!("{} {:#}", "error:".red(), error);
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    println!("{}", "Session ended.".dimmed());
    Ok(())
}

fn print_banner(name: &str, is_ai: bool) {
    let kind = if is_ai { "AI chat" } else { "chat" };
    println!("{} {} ({})", "Opened".green(), name.bold(), kind);
    println!("{}", "Type a message, or /help for commands.".dimmed());
}

fn print_help() {
    println!("  /history   show the transcript");
    println!("  /summary   summarize the conversation");
    println!("  /test      probe the configured backend");
    println!("  /exit      leave the session");
}

fn print_message(message: &Message) {
    let label = if message.is_from_ai() {
        message.sender_name.green()
    } else if message.is_from_user() {
        message.sender_name.cyan()
    } else {
        message.sender_name.yellow()
    };
    println!(
        "{} {} {}",
        message.timestamp.format("%H:%M").to_string().dimmed(),
        format!("{}:", label),
        message.body
    );
}
