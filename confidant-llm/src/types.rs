//! Core types for generation requests and responses.

use serde::{Deserialize, Serialize};

/// Who said a line of conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    /// The human.
    User,
    /// The agent.
    Assistant,
}

impl Speaker {
    /// Role name used by chat-completion APIs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One line of prior conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Speaker.
    pub speaker: Speaker,
    /// What was said.
    pub content: String,
}

impl Turn {
    /// Build a turn.
    #[must_use]
    pub fn new(speaker: Speaker, content: impl Into<String>) -> Self {
        Self {
            speaker,
            content: content.into(),
        }
    }
}

/// A fully rendered request to a provider.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    /// System prompt (persona, known facts, directive rules).
    pub system: String,
    /// User prompt (history and the new message).
    pub user: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f32,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
}

impl GenerationRequest {
    /// Create a request with conversational defaults.
    #[must_use]
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            max_tokens: 512,
            temperature: 0.7,
            timeout_ms: 30_000,
        }
    }

    /// Set the token limit.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// A provider's answer.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationResponse {
    /// The generated text, directives included.
    pub text: String,
    /// How many tokens were generated, if the provider says.
    pub tokens_generated: u32,
    /// Latency in milliseconds.
    pub latency_ms: u64,
    /// Which model answered.
    pub model: String,
}
