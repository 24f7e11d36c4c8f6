//! Turn engine errors.

use confidant_core::ConfidantError;
use confidant_llm::LlmError;
use thiserror::Error;

/// Errors raised while building the engine or generating a reply.
///
/// None of these reach the chat: a failed generation becomes the fallback
/// reply, and storage problems are handled inside the record store.
#[derive(Debug, Error)]
pub enum TurnError {
    /// Record store could not be opened.
    #[error("storage error: {0}")]
    Storage(#[from] ConfidantError),

    /// Generator failed.
    #[error("generation failed: {0}")]
    Generation(#[from] LlmError),

    /// Generator did not answer in time.
    #[error("generation timed out after {0}ms")]
    GenerationTimeout(u64),

    /// Invalid engine configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, TurnError>;
