//! Error types for the Confidant core library.

use thiserror::Error;

use crate::record::RecordKind;

/// Top-level error type for all Confidant core operations.
#[derive(Error, Debug)]
pub enum ConfidantError {
    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A persisted slot exists but cannot be decoded into a record.
    #[error("Corrupt {kind} slot {id}: {reason}")]
    CorruptSlot {
        /// Which record namespace the slot belongs to.
        kind: RecordKind,
        /// The record identifier of the slot.
        id: String,
        /// Decoder message.
        reason: String,
    },

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, ConfidantError>;
