//! Record definitions and the [`Record`] trait the store is generic over.
//!
//! Two record kinds are persisted, each in its own namespace:
//!
//! | Kind  | Key       | Rolling field     | Capacity (default) |
//! |-------|-----------|-------------------|--------------------|
//! | user  | `UserId`  | `history`         | 15                 |
//! | group | `ChatId`  | `recent_messages` | 50                 |

pub mod group;
pub mod user;

pub use group::GroupRecord;
pub use user::UserRecord;

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::RecordsConfig;

/// The namespace a record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// Per-user conversational state.
    User,
    /// Per-group message log.
    Group,
}

impl RecordKind {
    /// Slot namespace holding live records of this kind.
    #[must_use]
    pub fn namespace(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
        }
    }

    /// Slot namespace holding quarantined (unreadable) records of this kind.
    #[must_use]
    pub fn backup_namespace(self) -> &'static str {
        match self {
            Self::User => "user_backup",
            Self::Group => "group_backup",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.namespace())
    }
}

/// A persisted record addressed by exactly one identifier.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Identifier type; its `Display` form is the slot key.
    type Id: Copy + Eq + std::hash::Hash + fmt::Display + FromStr + Send + Sync + 'static;

    /// Namespace this record is stored in.
    const KIND: RecordKind;

    /// The record's own identifier.
    fn id(&self) -> Self::Id;

    /// A freshly constructed record, as returned for never-seen ids.
    fn new_default(id: Self::Id, config: &RecordsConfig) -> Self;
}
