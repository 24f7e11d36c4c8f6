//! Configuration for the Confidant system.
//!
//! Maps directly to `confidant.toml`. Every field has a default, so an
//! empty file (or no file at all) yields a working configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level Confidant configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfidantConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Record defaults and rolling-buffer capacities.
    #[serde(default)]
    pub records: RecordsConfig,
    /// Persistence / storage settings.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Directive protocol settings.
    #[serde(default)]
    pub directives: DirectiveConfig,
    /// Generation collaborator settings.
    #[serde(default)]
    pub llm: LlmConfig,
}

impl ConfidantConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `ConfidantError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::ConfidantError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log filter directive: trace, debug, info, warn, error, or a full `EnvFilter` string.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text.
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// Record defaults and capacities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsConfig {
    /// Locale tag given to newly created user records.
    #[serde(default = "default_language")]
    pub default_language: String,
    /// Max history entries kept per user.
    #[serde(default = "default_15")]
    pub history_capacity: usize,
    /// Max recent messages kept per group.
    #[serde(default = "default_50")]
    pub group_message_capacity: usize,
    /// How many history entries are handed to the generator.
    #[serde(default = "default_10")]
    pub prompt_history: usize,
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            history_capacity: 15,
            group_message_capacity: 50,
            prompt_history: 10,
        }
    }
}

/// Which slot backend to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// SQLite database file.
    Sqlite,
    /// Process-local map; nothing survives a restart.
    Memory,
}

/// Persistence / storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Backend: "sqlite" or "memory".
    #[serde(default = "default_backend")]
    pub backend: BackendKind,
    /// Database file for the SQLite backend.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Number of rotating database backups to keep.
    #[serde(default = "default_3")]
    pub backup_count: u32,
    /// Detect slot corruption via checksums.
    #[serde(default = "default_true")]
    pub checksum_enabled: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Sqlite,
            path: default_db_path(),
            wal_mode: true,
            backup_count: 3,
            checksum_enabled: true,
        }
    }
}

/// Order in which embedded directives are processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOrder {
    /// Every UPDATE left-to-right, then every REMIND left-to-right.
    #[default]
    KindGrouped,
    /// Strict textual order, kinds interleaved.
    SourceOrder,
}

/// Directive protocol configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectiveConfig {
    /// Processing order for mixed directives.
    #[serde(default)]
    pub scan_order: ScanOrder,
    /// Delay used when a REMIND carries no usable `minutes`.
    #[serde(default = "default_1_u64")]
    pub default_reminder_minutes: u64,
    /// Upper bound on a reminder delay (one week by default).
    #[serde(default = "default_max_minutes")]
    pub max_reminder_minutes: u64,
    /// Text used when a REMIND carries no `text`.
    #[serde(default = "default_reminder_text")]
    pub reminder_placeholder: String,
    /// Prefix put in front of a fired reminder.
    #[serde(default = "default_reminder_prefix")]
    pub reminder_prefix: String,
}

impl Default for DirectiveConfig {
    fn default() -> Self {
        Self {
            scan_order: ScanOrder::KindGrouped,
            default_reminder_minutes: 1,
            max_reminder_minutes: 10_080,
            reminder_placeholder: default_reminder_text(),
            reminder_prefix: default_reminder_prefix(),
        }
    }
}

/// Generation collaborator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider: "ollama", "openai", "none".
    #[serde(default = "default_ollama")]
    pub provider: String,
    /// Base URL for the LLM API.
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key (OpenAI-compatible only).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Timeout for a single HTTP attempt in milliseconds.
    #[serde(default = "default_30000")]
    pub request_timeout_ms: u64,
    /// Bound on a whole generation call, retries included.
    #[serde(default = "default_90000")]
    pub generation_timeout_ms: u64,
    /// Retries before the fallback text is used.
    #[serde(default = "default_2")]
    pub max_retries: u32,
    /// Max tokens to generate per reply.
    #[serde(default = "default_512")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_0_7")]
    pub temperature: f32,
    /// Reply sent when generation fails or times out.
    #[serde(default = "default_fallback_text")]
    pub fallback_text: String,
    /// Persona line placed at the top of every system prompt.
    #[serde(default = "default_persona")]
    pub persona: String,
    /// Optional TOML file overriding the built-in prompt templates.
    #[serde(default)]
    pub prompt_file: Option<PathBuf>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_ollama(),
            base_url: default_ollama_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            request_timeout_ms: 30_000,
            generation_timeout_ms: 90_000,
            max_retries: 2,
            max_tokens: 512,
            temperature: 0.7,
            fallback_text: default_fallback_text(),
            persona: default_persona(),
            prompt_file: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_language() -> String { "en".to_string() }
fn default_backend() -> BackendKind { BackendKind::Sqlite }
fn default_db_path() -> PathBuf { PathBuf::from("confidant.db") }
fn default_reminder_text() -> String { "Reminder!".to_string() }
fn default_reminder_prefix() -> String { "⏰ ".to_string() }
fn default_ollama() -> String { "ollama".to_string() }
fn default_ollama_url() -> String { "http://localhost:11434".to_string() }
fn default_model() -> String { "llama3.1:8b".to_string() }
fn default_api_key_env() -> String { "CONFIDANT_API_KEY".to_string() }
fn default_fallback_text() -> String {
    "Sorry, I can't think straight right now. Please try again in a moment.".to_string()
}
fn default_persona() -> String {
    "You are a friendly assistant who remembers the people you talk to.".to_string()
}
fn default_0_7() -> f32 { 0.7 }
fn default_1_u64() -> u64 { 1 }
fn default_2() -> u32 { 2 }
fn default_3() -> u32 { 3 }
fn default_10() -> usize { 10 }
fn default_15() -> usize { 15 }
fn default_50() -> usize { 50 }
fn default_512() -> u32 { 512 }
fn default_max_minutes() -> u64 { 10_080 }
fn default_30000() -> u64 { 30_000 }
fn default_90000() -> u64 { 90_000 }
