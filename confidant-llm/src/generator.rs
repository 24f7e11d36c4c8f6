//! The generation seam used by the turn engine.

use async_trait::async_trait;

use crate::error::LlmError;
use crate::prompt::PromptContext;

/// Produces the agent's raw reply for one turn.
///
/// The returned text may contain directives. Callers must treat any error
/// as "generation unavailable" and substitute their fallback reply.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a reply for `context`.
    async fn generate(&self, context: &PromptContext) -> Result<String, LlmError>;
}
