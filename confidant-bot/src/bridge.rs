//! Bridge module: maps between core records and generation types.
//!
//! `confidant-core` knows records, `confidant-llm` knows prompts. Neither
//! depends on the other; this module is the only place both meet.

use confidant_core::config::LlmConfig;
use confidant_core::directive::sorted_facts;
use confidant_core::types::{HistoryEntry, Role};
use confidant_core::UserRecord;
use confidant_llm::{
    LlmClient, LlmProvider, OtherUser, PromptContext, PromptTemplates, Speaker, Turn,
};
use tracing::{info, warn};

use crate::error::{Result, TurnError};

/// Convert stored history into prompt turns.
#[must_use]
pub fn history_turns(history: &[HistoryEntry]) -> Vec<Turn> {
    history
        .iter()
        .map(|entry| {
            let speaker = match entry.role {
                Role::User => Speaker::User,
                Role::Assistant => Speaker::Assistant,
            };
            Turn::new(speaker, entry.content.clone())
        })
        .collect()
}

fn owned_facts(record: &UserRecord) -> Vec<(String, String)> {
    sorted_facts(&record.facts)
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Facts about a second user, labelled with their stored name.
#[must_use]
pub fn other_user(record: &UserRecord) -> OtherUser {
    OtherUser {
        name: record
            .username
            .clone()
            .unwrap_or_else(|| format!("user {}", record.id)),
        facts: owned_facts(record),
    }
}

/// Build the prompt context for one turn.
///
/// `prompt_history` bounds how many history entries are shown; the
/// message being answered is passed separately and is not yet in history.
#[must_use]
pub fn prompt_context(
    persona: &str,
    user: &UserRecord,
    display_name: &str,
    other: Option<&UserRecord>,
    message: &str,
    prompt_history: usize,
) -> PromptContext {
    PromptContext {
        system: persona.to_string(),
        display_name: display_name.to_string(),
        language: user.language.clone(),
        facts: owned_facts(user),
        history: history_turns(user.recent_history(prompt_history)),
        other: other.map(other_user),
        message: message.to_string(),
    }
}

/// Build an [`LlmClient`] from configuration.
///
/// The API key is read from the environment variable named by
/// `config.api_key_env`. A missing template file is an error; an unset
/// key only matters for the `openai` provider.
///
/// # Errors
/// [`TurnError::Generation`] for an unknown provider, a missing key or an
/// unreadable template file.
pub fn client_from_config(config: &LlmConfig) -> Result<LlmClient> {
    let api_key = std::env::var(&config.api_key_env).ok();
    let provider = LlmProvider::from_name(&config.provider, &config.base_url, api_key)?;
    if provider == LlmProvider::None {
        warn!("No LLM provider configured; every reply will be the fallback text");
    }

    let templates = match &config.prompt_file {
        Some(path) => PromptTemplates::from_file(path)?,
        None => PromptTemplates::builtin(),
    };
    if config.max_tokens == 0 {
        return Err(TurnError::Config("llm.max_tokens must be positive".into()));
    }

    info!(
        provider = %config.provider,
        model = %config.model,
        templates = %templates.version,
        "LLM client configured"
    );
    Ok(LlmClient::new(provider, config.model.clone(), config.max_retries)
        .with_sampling(config.max_tokens, config.temperature)
        .with_timeout(config.request_timeout_ms)
        .with_templates(templates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use confidant_core::config::RecordsConfig;
    use confidant_core::types::UserId;
    use confidant_core::Record;

    fn user(id: i64, name: Option<&str>) -> UserRecord {
        let mut record = UserRecord::new_default(UserId(id), &RecordsConfig::default());
        record.username = name.map(str::to_string);
        record
    }

    #[test]
    fn context_carries_sorted_facts_and_trimmed_history() {
        let mut alex = user(1, Some("Alex"));
        alex.merge_facts([
            ("pet".to_string(), "cat".to_string()),
            ("city".to_string(), "Porto".to_string()),
        ]);
        for i in 0..6 {
            alex.push_history(Role::User, format!("q{i}"), 15);
            alex.push_history(Role::Assistant, format!("a{i}"), 15);
        }

        let ctx = prompt_context("persona", &alex, "Alex", None, "hello", 4);
        assert_eq!(ctx.facts[0], ("city".to_string(), "Porto".to_string()));
        assert_eq!(ctx.history.len(), 4);
        assert_eq!(ctx.history[0], Turn::new(Speaker::User, "q4"));
        assert_eq!(ctx.history[3], Turn::new(Speaker::Assistant, "a5"));
        assert!(ctx.other.is_none());
        assert_eq!(ctx.language, "en");
    }

    #[test]
    fn other_user_falls_back_to_id_label() {
        let mut sam = user(2, None);
        sam.merge_facts([("food".to_string(), "ramen".to_string())]);
        let other = other_user(&sam);
        assert_eq!(other.name, "user 2");
        assert_eq!(other.facts, vec![("food".to_string(), "ramen".to_string())]);
    }

    #[test]
    fn none_provider_builds_unavailable_client() {
        let config = LlmConfig {
            provider: "none".into(),
            ..LlmConfig::default()
        };
        let client = client_from_config(&config).expect("client");
        assert!(!client.is_available());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let config = LlmConfig {
            provider: "carrier-pigeon".into(),
            ..LlmConfig::default()
        };
        assert!(matches!(client_from_config(&config), Err(TurnError::Generation(_))));
    }
}
