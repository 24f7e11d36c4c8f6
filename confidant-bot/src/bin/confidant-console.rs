//! Local console transport: chat with the agent over stdin/stdout.
//!
//! Configuration is read from the TOML file named by `CONFIDANT_CONFIG`
//! (defaults apply when unset). Lines starting with `/` are commands:
//!
//! - `/name <display name>`: change the name you chat as
//! - `/facts`: show what the agent remembers about you
//! - `/stats`: print counters in Prometheus text format
//! - `/quit`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use confidant_bot::{InboundEvent, TurnEngine};
use confidant_core::config::ConfidantConfig;
use confidant_core::directive::{sorted_facts, ReplySink};
use confidant_core::types::{ChatId, UserId};
use confidant_core::UserRecord;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "CONFIDANT_CONFIG";
const CONSOLE_USER: UserId = UserId(1);

/// One line of console input.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Empty,
    Quit,
    Rename(&'a str),
    RenameUsage,
    Facts,
    Stats,
    Say(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        let (cmd, rest) = line
            .split_once(char::is_whitespace)
            .map_or((line, ""), |(cmd, rest)| (cmd, rest.trim()));
        match cmd {
            "" => Self::Empty,
            "/quit" => Self::Quit,
            "/name" if rest.is_empty() => Self::RenameUsage,
            "/name" => Self::Rename(rest),
            "/facts" => Self::Facts,
            "/stats" => Self::Stats,
            _ => Self::Say(line),
        }
    }
}

/// Prints fired reminders to stdout.
struct StdoutSink;

#[async_trait]
impl ReplySink for StdoutSink {
    async fn deliver(&self, chat: ChatId, text: String) {
        let mut stdout = tokio::io::stdout();
        let line = format!("\n[{chat}] {text}\n> ");
        if let Err(err) = stdout.write_all(line.as_bytes()).await {
            tracing::warn!(error = %err, "Could not print reminder");
        }
        if let Err(err) = stdout.flush().await {
            tracing::warn!(error = %err, "Could not flush reminder");
        }
    }
}

fn load_config() -> Result<ConfidantConfig> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => {
            let path = PathBuf::from(path);
            ConfidantConfig::from_file(&path)
                .with_context(|| format!("failed to load {}", path.display()))
        }
        None => Ok(ConfidantConfig::default()),
    }
}

fn init_tracing(config: &ConfidantConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.general.json_logs {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

async fn print(text: &str) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(text.as_bytes()).await?;
    stdout.flush().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    init_tracing(&config);

    let engine = TurnEngine::from_config(&config).context("failed to start turn engine")?;
    let sink: Arc<dyn ReplySink> = Arc::new(StdoutSink);
    let mut display_name = std::env::var("USER").unwrap_or_else(|_| "friend".to_string());

    tracing::info!(
        backend = ?config.persistence.backend,
        provider = %config.llm.provider,
        "Console ready"
    );
    print("Type a message, or /quit.\n> ").await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Command::Empty => {}
            Command::Quit => break,
            Command::Rename(name) => {
                display_name = name.to_string();
                print(&format!("You are now {display_name}.\n")).await?;
            }
            Command::RenameUsage => print("Usage: /name <display name>\n").await?,
            Command::Facts => {
                let user: UserRecord = engine.store().load(CONSOLE_USER);
                let facts = sorted_facts(&user.facts);
                if facts.is_empty() {
                    print("Nothing remembered yet.\n").await?;
                }
                for (key, value) in facts {
                    print(&format!("  {key}: {value}\n")).await?;
                }
            }
            Command::Stats => {
                print(&engine.counters().snapshot().to_prometheus()).await?;
            }
            Command::Say(text) => {
                let event = InboundEvent::private(CONSOLE_USER, display_name.clone(), text);
                let outcome = engine.handle_message(&event, &sink).await;
                if let Some(reply) = outcome.visible_reply {
                    print(&format!("{reply}\n")).await?;
                }
                for reminder in &outcome.scheduled_reminders {
                    let due = reminder.handle.due_at.format("%H:%M");
                    print(&format!("(reminder set for {due})\n")).await?;
                }
            }
        }
        print("> ").await?;
    }

    if engine.scheduler().pending() > 0 {
        tracing::info!(pending = engine.scheduler().pending(), "Exiting with unfired reminders");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_are_recognised() {
        assert_eq!(Command::parse("   "), Command::Empty);
        assert_eq!(Command::parse("/quit"), Command::Quit);
        assert_eq!(Command::parse("/name  Alex Doe "), Command::Rename("Alex Doe"));
        assert_eq!(Command::parse("/facts"), Command::Facts);
        assert_eq!(Command::parse("/stats"), Command::Stats);
    }

    #[test]
    fn bare_name_command_asks_for_usage() {
        assert_eq!(Command::parse("/name"), Command::RenameUsage);
        assert_eq!(Command::parse("/name   "), Command::RenameUsage);
    }

    #[test]
    fn anything_else_is_chat() {
        assert_eq!(Command::parse(" hello there "), Command::Say("hello there"));
        assert_eq!(Command::parse("/unknown x"), Command::Say("/unknown x"));
    }
}
