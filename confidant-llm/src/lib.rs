//! # confidant-llm: Generation Collaborator
//!
//! Produces the agent's free-text reply for one turn. The reply may carry
//! `[UPDATE: {...}]` and `[REMIND: {...}]` directives; interpreting them is
//! `confidant-core`'s job, this crate only asks the model to emit them.
//!
//! Backends:
//!   - **Ollama** (local, default)
//!   - **OpenAI-compatible API**
//!   - **None** (every call fails, so the caller's fallback text is used)
//!
//! The [`Generator`] trait is the seam the turn engine depends on; tests
//! substitute scripted generators for [`LlmClient`].

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod error;
pub mod generator;
pub mod prompt;
pub mod types;

pub use client::{LlmClient, LlmProvider};
pub use error::LlmError;
pub use generator::Generator;
pub use prompt::{OtherUser, PromptContext, PromptTemplates};
pub use types::{GenerationRequest, GenerationResponse, Speaker, Turn};
