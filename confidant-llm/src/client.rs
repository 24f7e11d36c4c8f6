//! LLM Client: unified interface for Ollama and OpenAI-compatible backends.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::generator::Generator;
use crate::prompt::{PromptContext, PromptTemplates};
use crate::types::{GenerationRequest, GenerationResponse};

/// Provider backend for generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmProvider {
    /// Ollama running locally.
    Ollama {
        /// e.g. `http://localhost:11434`
        base_url: String,
    },
    /// OpenAI-compatible chat-completions API.
    OpenAiCompatible {
        /// e.g. `https://api.openai.com`
        base_url: String,
        /// Bearer token.
        api_key: String,
    },
    /// No LLM available: all calls fail, triggering the fallback reply.
    None,
}

impl LlmProvider {
    /// Resolve a provider by its configuration name.
    ///
    /// `api_key` is only consulted for `"openai"`.
    ///
    /// # Errors
    /// [`LlmError::ConfigError`] for an unknown name or a missing API key.
    pub fn from_name(
        name: &str,
        base_url: &str,
        api_key: Option<String>,
    ) -> Result<Self, LlmError> {
        let base_url = base_url.trim_end_matches('/').to_string();
        match name.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama { base_url }),
            "openai" | "openai_compatible" => {
                let api_key = api_key
                    .filter(|k| !k.trim().is_empty())
                    .ok_or_else(|| {
                        LlmError::ConfigError("openai provider needs an API key".into())
                    })?;
                Ok(Self::OpenAiCompatible { base_url, api_key })
            }
            "none" | "" => Ok(Self::None),
            other => Err(LlmError::ConfigError(format!("unknown provider '{other}'"))),
        }
    }
}

/// HTTP client that routes requests to the configured backend.
pub struct LlmClient {
    provider: LlmProvider,
    http: Client,
    model: String,
    max_retries: u32,
    max_tokens: u32,
    temperature: f32,
    timeout_ms: u64,
    templates: PromptTemplates,
}

impl LlmClient {
    /// Create a new client with built-in prompt templates.
    #[must_use]
    pub fn new(provider: LlmProvider, model: impl Into<String>, max_retries: u32) -> Self {
        Self {
            provider,
            http: Client::new(),
            model: model.into(),
            max_retries,
            max_tokens: 512,
            temperature: 0.7,
            timeout_ms: 30_000,
            templates: PromptTemplates::builtin(),
        }
    }

    /// Create a client with no backend (every call fails).
    #[must_use]
    pub fn none() -> Self {
        Self::new(LlmProvider::None, String::new(), 0)
    }

    /// Set sampling parameters used by [`Generator::generate`].
    #[must_use]
    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Set the per-attempt timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Replace the prompt templates.
    #[must_use]
    pub fn with_templates(mut self, templates: PromptTemplates) -> Self {
        self.templates = templates;
        self
    }

    /// Whether a backend is configured.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self.provider, LlmProvider::None)
    }

    /// The configured provider.
    #[must_use]
    pub fn provider(&self) -> &LlmProvider {
        &self.provider
    }

    /// Send a rendered request.
    ///
    /// # Errors
    /// [`LlmError::Unavailable`] with no provider, otherwise the error of
    /// the last attempt wrapped in [`LlmError::RetriesExhausted`].
    pub async fn complete(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, LlmError> {
        match &self.provider {
            LlmProvider::None => Err(LlmError::Unavailable("No LLM provider configured".into())),
            LlmProvider::Ollama { base_url } => {
                let url = format!("{base_url}/api/chat");
                let body = json!({
                    "model": self.model,
                    "messages": [
                        { "role": "system", "content": request.system },
                        { "role": "user", "content": request.user },
                    ],
                    "stream": false,
                    "options": {
                        "temperature": request.temperature,
                        "num_predict": request.max_tokens,
                    }
                });
                let start = Instant::now();
                let json = self
                    .post_with_retries("Ollama", &url, &body, None, request.timeout_ms)
                    .await?;
                Ok(GenerationResponse {
                    text: ollama_text(&json)?,
                    tokens_generated: token_count(&json["eval_count"]),
                    latency_ms: elapsed_ms(start),
                    model: self.model.clone(),
                })
            }
            LlmProvider::OpenAiCompatible { base_url, api_key } => {
                let url = format!("{base_url}/v1/chat/completions");
                let body = json!({
                    "model": self.model,
                    "messages": [
                        { "role": "system", "content": request.system },
                        { "role": "user", "content": request.user },
                    ],
                    "max_tokens": request.max_tokens,
                    "temperature": request.temperature,
                });
                let start = Instant::now();
                let json = self
                    .post_with_retries("OpenAI", &url, &body, Some(api_key), request.timeout_ms)
                    .await?;
                Ok(GenerationResponse {
                    text: openai_text(&json)?,
                    tokens_generated: token_count(&json["usage"]["completion_tokens"]),
                    latency_ms: elapsed_ms(start),
                    model: self.model.clone(),
                })
            }
        }
    }

    async fn post_with_retries(
        &self,
        backend: &str,
        url: &str,
        body: &Value,
        api_key: Option<&str>,
        timeout_ms: u64,
    ) -> Result<Value, LlmError> {
        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!(
                    backend,
                    attempt = attempt + 1,
                    of = self.max_retries + 1,
                    "Retrying LLM call"
                );
                tokio::time::sleep(Duration::from_millis(250 * u64::from(attempt))).await;
            }

            let mut builder = self
                .http
                .post(url)
                .json(body)
                .timeout(Duration::from_millis(timeout_ms));
            if let Some(key) = api_key {
                builder = builder.bearer_auth(key);
            }

            match builder.send().await {
                Ok(resp) if resp.status().is_success() => {
                    return resp.json().await.map_err(|e| LlmError::ParseError(e.to_string()));
                }
                Ok(resp) => {
                    let status = resp.status();
                    let detail = resp.text().await.unwrap_or_default();
                    last_error = format!("HTTP {status}: {detail}");
                    warn!(backend, %status, "LLM backend returned error");
                }
                Err(e) => {
                    last_error = e.to_string();
                    if e.is_timeout() {
                        warn!(backend, timeout_ms, "LLM request timed out");
                    } else {
                        warn!(backend, error = %last_error, "LLM request failed");
                    }
                }
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error,
        })
    }
}

#[async_trait]
impl Generator for LlmClient {
    async fn generate(&self, context: &PromptContext) -> Result<String, LlmError> {
        let (system, user) = self.templates.render(context);
        let request = GenerationRequest::new(system, user)
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature)
            .with_timeout(self.timeout_ms);
        let response = self.complete(&request).await?;
        debug!(
            model = %response.model,
            tokens = response.tokens_generated,
            latency_ms = response.latency_ms,
            "Reply generated"
        );
        if response.text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(response.text)
    }
}

/// Reply text from an Ollama `/api/chat` (or legacy `/api/generate`) body.
fn ollama_text(json: &Value) -> Result<String, LlmError> {
    json["message"]["content"]
        .as_str()
        .or_else(|| json["response"].as_str())
        .map(str::to_string)
        .ok_or_else(|| LlmError::ParseError(format!("no reply text in Ollama response: {json}")))
}

/// Reply text from an OpenAI chat-completions body.
fn openai_text(json: &Value) -> Result<String, LlmError> {
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| LlmError::ParseError(format!("no reply text in completion: {json}")))
}

fn token_count(value: &Value) -> u32 {
    value.as_u64().and_then(|n| u32::try_from(n).ok()).unwrap_or(0)
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
