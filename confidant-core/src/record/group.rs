//! Per-group message log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Record, RecordKind};
use crate::config::RecordsConfig;
use crate::rolling;
use crate::types::{ChatId, GroupMessage};

/// Durable state for one group chat the agent has been added to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRecord {
    /// Primary key.
    pub id: ChatId,
    /// Group display name, set when the agent joins.
    #[serde(default)]
    pub title: String,
    /// Advisory member count; not maintained by the core.
    #[serde(default)]
    pub members_count: u32,
    /// Chronological message log, oldest first.
    #[serde(default)]
    pub recent_messages: Vec<GroupMessage>,
    /// When the agent joined.
    #[serde(default = "Utc::now")]
    pub added_at: DateTime<Utc>,
}

impl GroupRecord {
    /// Append an observed message, evicting the oldest beyond `capacity`.
    pub fn push_message(&mut self, message: GroupMessage, capacity: usize) {
        rolling::push_bounded(&mut self.recent_messages, message, capacity);
    }
}

impl Record for GroupRecord {
    type Id = ChatId;

    const KIND: RecordKind = RecordKind::Group;

    fn id(&self) -> ChatId {
        self.id
    }

    fn new_default(id: ChatId, _config: &RecordsConfig) -> Self {
        Self {
            id,
            title: String::new(),
            members_count: 0,
            recent_messages: Vec::new(),
            added_at: Utc::now(),
        }
    }
}
