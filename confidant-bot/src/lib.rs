//! # confidant-bot: Turn Engine
//!
//! Wires `confidant-core` (records, directives, reminders) and
//! `confidant-llm` (reply generation) to a chat transport. A transport
//! turns its updates into [`InboundEvent`]s, calls
//! [`TurnEngine::handle_message`], sends the visible reply if there is one,
//! and implements [`ReplySink`](confidant_core::directive::ReplySink) so
//! fired reminders can reach the chat later.
//!
//! ```text
//!  transport ──InboundEvent──▶ TurnEngine ──PromptContext──▶ Generator
//!      ▲                          │  ▲                           │
//!      │                          │  └──────── raw reply ────────┘
//!      │                          ▼
//!      │                  DirectiveApplier ──▶ Scheduler ──▶ ReplySink
//!      └──── visible reply ───────┘
//! ```
//!
//! ## Modules
//!
//! - `events`: inbound event shape
//! - `bridge`: record ↔ prompt-context mapping, client construction
//! - `engine`: the per-turn pipeline and group lifecycle hooks

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod engine;
pub mod error;
pub mod events;

pub use engine::{TurnEngine, TurnOutcome};
pub use error::TurnError;
pub use events::{ChatKind, InboundEvent};
