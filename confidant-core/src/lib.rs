//! # Confidant Core Library
//!
//! Durable conversational state for a chat agent, and the directive
//! protocol the agent uses to mutate that state from inside its replies.
//!
//! - [`record`]: [`UserRecord`] and [`GroupRecord`], the two persisted kinds
//! - [`rolling`]: fixed-capacity append-and-evict buffers
//! - [`store`]: [`RecordStore`], get-or-default / put over a [`SlotBackend`]
//! - [`name_index`]: lookup of a user record by display name
//! - [`locks`]: per-record single-writer locks
//! - [`directive`]: `[UPDATE: {...}]` / `[REMIND: {...}]` parsing and application
//! - [`scheduler`]: one-shot deferred actions
//!
//! ## Failure Contract
//!
//! Nothing in this crate is allowed to take the process down. A corrupt
//! slot becomes a default record plus a quarantined backup, a failed save
//! is logged and counted, and a malformed directive is dropped on its own.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod directive;
pub mod error;
pub mod locks;
pub mod metrics;
pub mod name_index;
pub mod persistence;
pub mod record;
pub mod rolling;
pub mod scheduler;
pub mod store;
pub mod types;

pub use config::ConfidantConfig;
pub use error::ConfidantError;
pub use persistence::{MemorySlots, SlotBackend, SqliteSlots};
pub use record::{GroupRecord, Record, RecordKind, UserRecord};
pub use store::{LoadState, RecordStore};
pub use types::*;
