//! Per-user conversational state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Record, RecordKind};
use crate::config::RecordsConfig;
use crate::rolling;
use crate::types::{HistoryEntry, Role, UserId};

/// Durable state for one user.
///
/// Created with defaults on first lookup, mutated on every turn (username
/// sync, fact merge, history append) and never deleted by this crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Primary key.
    pub id: UserId,
    /// Display name; mutable and not unique across records.
    #[serde(default)]
    pub username: Option<String>,
    /// Locale tag.
    #[serde(default = "default_language")]
    pub language: String,
    /// Facts the agent has learned, keyed by fact name. Never auto-pruned.
    #[serde(default)]
    pub facts: HashMap<String, String>,
    /// Chronological conversation history, oldest first.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    /// Most recent activity.
    #[serde(default = "Utc::now")]
    pub last_interaction: DateTime<Utc>,
}

fn default_language() -> String {
    RecordsConfig::default().default_language
}

impl UserRecord {
    /// Merge `updates` into the fact map: new keys are added, existing keys
    /// overwritten, nothing is removed. Returns how many keys changed.
    pub fn merge_facts<I>(&mut self, updates: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut changed = 0;
        for (key, value) in updates {
            if self.facts.get(&key) != Some(&value) {
                self.facts.insert(key, value);
                changed += 1;
            }
        }
        changed
    }

    /// Append a history entry, evicting the oldest beyond `capacity`.
    pub fn push_history(&mut self, role: Role, content: impl Into<String>, capacity: usize) {
        rolling::push_bounded(&mut self.history, HistoryEntry::now(role, content), capacity);
    }

    /// Record the transport's current display name. Returns `true` if it changed.
    pub fn sync_username(&mut self, display_name: Option<&str>) -> bool {
        let incoming = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        if incoming.is_none() || incoming == self.username {
            return false;
        }
        self.username = incoming;
        true
    }

    /// Mark the record as active now.
    pub fn touch(&mut self) {
        self.last_interaction = Utc::now();
    }

    /// The last `n` history entries, oldest first.
    #[must_use]
    pub fn recent_history(&self, n: usize) -> &[HistoryEntry] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }
}

impl Record for UserRecord {
    type Id = UserId;

    const KIND: RecordKind = RecordKind::User;

    fn id(&self) -> UserId {
        self.id
    }

    fn new_default(id: UserId, config: &RecordsConfig) -> Self {
        Self {
            id,
            username: None,
            language: config.default_language.clone(),
            facts: HashMap::new(),
            history: Vec::new(),
            last_interaction: Utc::now(),
        }
    }
}
