//! Prompt templates and the per-turn prompt context.
//!
//! The built-in templates can be replaced by a TOML file:
//!
//! ```toml
//! [prompt]
//! version = "2"
//! system = "..."
//! user = "..."
//! ```
//!
//! Placeholders are `{name}`; unknown placeholders are left as written so
//! literal JSON braces in the templates survive rendering.

use std::path::Path;

use serde::Deserialize;

use crate::error::LlmError;
use crate::types::{Speaker, Turn};

/// System prompt. Explains the directive grammar to the model.
pub const SYSTEM_TEMPLATE: &str = r#"{persona}

You are talking with {display_name}. Reply in the language with tag "{language}" unless they write in another one.

What you remember about {display_name}:
{facts}

MEMORY AND REMINDERS:
- When you learn something lasting about {display_name} (name, city, preferences, plans), add [UPDATE: {"key": "value"}] to your reply. Use short snake_case keys. Repeating a key replaces the old value.
- When {display_name} asks to be reminded of something, add [REMIND: {"minutes": <number>, "text": "<what to say>"}].
- These tags are removed before your reply is shown. Never mention them or explain them.
- Put the JSON on one line. Use double quotes.
- Mention remembered facts naturally. Do not list them."#;

/// User prompt: what others know, recent history, the new message.
pub const USER_TEMPLATE: &str = r"{other_section}Recent conversation:
{history}

{display_name}: {message}";

/// Facts about a second user, supplied for cross-user questions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OtherUser {
    /// Their display name.
    pub name: String,
    /// Their facts, sorted by key.
    pub facts: Vec<(String, String)>,
}

/// Everything the model sees for one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    /// Persona line opening the system prompt.
    pub system: String,
    /// Display name of the acting user.
    pub display_name: String,
    /// Locale tag of the acting user.
    pub language: String,
    /// Acting user's facts, sorted by key.
    pub facts: Vec<(String, String)>,
    /// Trimmed recent history, oldest first.
    pub history: Vec<Turn>,
    /// Another user named in the message, if any.
    pub other: Option<OtherUser>,
    /// The new message.
    pub message: String,
}

impl PromptContext {
    /// A context with no memory, for the given speaker and message.
    #[must_use]
    pub fn new(display_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            system: String::new(),
            display_name: display_name.into(),
            language: "en".to_string(),
            facts: Vec::new(),
            history: Vec::new(),
            other: None,
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TomlPromptFile {
    prompt: TomlPromptData,
}

#[derive(Debug, Deserialize)]
struct TomlPromptData {
    #[serde(default = "default_version")]
    version: String,
    system: String,
    user: String,
}

fn default_version() -> String {
    "1".to_string()
}

/// A system/user template pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    /// Template version, for logs.
    pub version: String,
    /// System prompt template.
    pub system: String,
    /// User prompt template.
    pub user: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptTemplates {
    /// The compiled-in templates.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            version: "builtin".into(),
            system: SYSTEM_TEMPLATE.into(),
            user: USER_TEMPLATE.into(),
        }
    }

    /// Load templates from a TOML file with a `[prompt]` table.
    ///
    /// # Errors
    /// [`LlmError::ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LlmError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| LlmError::ConfigError(format!("failed to read {}: {e}", path.display())))?;
        let parsed: TomlPromptFile = toml::from_str(&content)
            .map_err(|e| {
                LlmError::ConfigError(format!("failed to parse {}: {e}", path.display()))
            })?;
        Ok(Self {
            version: parsed.prompt.version,
            system: parsed.prompt.system,
            user: parsed.prompt.user,
        })
    }

    /// Render `(system, user)` prompts for `ctx`.
    #[must_use]
    pub fn render(&self, ctx: &PromptContext) -> (String, String) {
        let facts = format_facts(&ctx.facts);
        let history = format_history(&ctx.history, &ctx.display_name);
        let other_section = ctx.other.as_ref().map_or_else(String::new, |other| {
            format!(
                "What you remember about {} (another user):\n{}\n\n",
                other.name,
                format_facts(&other.facts)
            )
        });
        let vars = [
            ("persona", ctx.system.as_str()),
            ("display_name", ctx.display_name.as_str()),
            ("language", ctx.language.as_str()),
            ("facts", facts.as_str()),
            ("history", history.as_str()),
            ("other_section", other_section.as_str()),
            ("message", ctx.message.as_str()),
        ];
        (render_template(&self.system, &vars), render_template(&self.user, &vars))
    }
}

fn format_facts(facts: &[(String, String)]) -> String {
    if facts.is_empty() {
        return "- nothing yet".to_string();
    }
    facts
        .iter()
        .map(|(k, v)| format!("- {k}: {v}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_history(history: &[Turn], display_name: &str) -> String {
    if history.is_empty() {
        return "(this is the first message)".to_string();
    }
    history
        .iter()
        .map(|turn| {
            let who = match turn.speaker {
                Speaker::User => display_name,
                Speaker::Assistant => "You",
            };
            format!("{who}: {}", turn.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Template interpolation.
///
/// Replaces `{key}` with the matching value in a single pass, so values
/// containing braces are never re-expanded. Unknown keys stay verbatim.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let replaced = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (*value, close))
        });
        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_rendering_works() {
        let rendered = render_template("Hello {name}, you are a {role}.", &[("name", "Alex"), ("role", "friend")]);
        assert_eq!(rendered, "Hello Alex, you are a friend.");
    }

    #[test]
    fn template_keeps_unknown_placeholders_and_json() {
        let rendered = render_template(r#"{a} [UPDATE: {"key": "value"}] {missing}"#, &[("a", "x")]);
        assert_eq!(rendered, r#"x [UPDATE: {"key": "value"}] {missing}"#);
    }

    #[test]
    fn values_are_not_reexpanded() {
        let rendered = render_template("{a}{b}", &[("a", "{b}"), ("b", "!")]);
        assert_eq!(rendered, "{b}!");
    }

    #[test]
    fn builtin_render_includes_facts_history_and_other() {
        let mut ctx = PromptContext::new("Alex", "what does Sam like?");
        ctx.system = "You are Pip.".into();
        ctx.facts = vec![("city".into(), "Lisbon".into())];
        ctx.history = vec![Turn::new(Speaker::User, "hi"), Turn::new(Speaker::Assistant, "hello!")];
        ctx.other = Some(OtherUser {
            name: "Sam".into(),
            facts: vec![("food".into(), "ramen".into())],
        });

        let (system, user) = PromptTemplates::builtin().render(&ctx);
        assert!(system.starts_with("You are Pip."));
        assert!(system.contains("- city: Lisbon"));
        assert!(system.contains("[UPDATE: {\"key\": \"value\"}]"));
        assert!(system.contains("[REMIND: {\"minutes\""));
        assert!(user.contains("What you remember about Sam (another user):\n- food: ramen"));
        assert!(user.contains("Alex: hi\nYou: hello!"));
        assert!(user.ends_with("Alex: what does Sam like?"));
    }

    #[test]
    fn empty_memory_renders_placeholders() {
        let (system, user) = PromptTemplates::builtin().render(&PromptContext::new("Kim", "hey"));
        assert!(system.contains("- nothing yet"));
        assert!(user.starts_with("Recent conversation:\n(this is the first message)"));
    }

    #[test]
    fn templates_load_from_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prompt.toml");
        std::fs::write(
            &path,
            "[prompt]\nversion = \"2\"\nsystem = \"Be brief, {display_name}.\"\nuser = \"{message}\"\n",
        )
        .expect("write");

        let templates = PromptTemplates::from_file(&path).expect("load");
        assert_eq!(templates.version, "2");
        let (system, user) = templates.render(&PromptContext::new("Kim", "hey"));
        assert_eq!(system, "Be brief, Kim.");
        assert_eq!(user, "hey");
    }

    #[test]
    fn missing_template_file_is_config_error() {
        let err = PromptTemplates::from_file("/definitely/not/here.toml").expect_err("missing");
        assert!(matches!(err, LlmError::ConfigError(_)));
    }
}
