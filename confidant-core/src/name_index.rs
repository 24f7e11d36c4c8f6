//! Lookup of a user record by display name.
//!
//! Display names are neither unique nor stable, so there is no secondary
//! key to maintain: every lookup scans all user records through
//! [`RecordStore::list_all`]. That is O(n) per call, fine for the few
//! thousand users one agent deployment talks to.
//!
//! When two records share a name the first one the backend enumerates
//! wins. Backends do not promise an order, so callers must not rely on
//! which one that is.

use crate::record::UserRecord;
use crate::store::RecordStore;
use crate::types::UserId;

/// Mention marker stripped from the front of a query.
pub const MENTION_MARKER: char = '@';

/// Normalize a name for comparison: trim, drop one leading `@`, case-fold.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    let trimmed = name.trim();
    trimmed
        .strip_prefix(MENTION_MARKER)
        .unwrap_or(trimmed)
        .trim()
        .to_lowercase()
}

/// Find the first user record whose display name matches `name`.
///
/// `"Alex"`, `"@Alex"` and `"alex"` are the same query. An empty query
/// matches nothing.
#[must_use]
pub fn find_by_name(store: &RecordStore, name: &str) -> Option<UserRecord> {
    let wanted = normalize_name(name);
    if wanted.is_empty() {
        return None;
    }
    store.list_all::<UserRecord>().into_iter().find(|record| {
        record
            .username
            .as_deref()
            .is_some_and(|stored| normalize_name(stored) == wanted)
    })
}

/// [`find_by_name`], ignoring the record of `asker`.
///
/// Used for cross-user questions, where a user naming themselves should
/// not resolve to their own record.
#[must_use]
pub fn find_other_by_name(store: &RecordStore, name: &str, asker: UserId) -> Option<UserRecord> {
    let wanted = normalize_name(name);
    if wanted.is_empty() {
        return None;
    }
    store.list_all::<UserRecord>().into_iter().find(|record| {
        record.id != asker
            && record
                .username
                .as_deref()
                .is_some_and(|stored| normalize_name(stored) == wanted)
    })
}

/// Every `@mention` in `text`, in order, without the marker.
///
/// A mention is the marker followed by letters, digits or `_`.
#[must_use]
pub fn mentions(text: &str) -> Vec<&str> {
    let mut found = Vec::new();
    for (start, _) in text.match_indices(MENTION_MARKER) {
        // Skip e-mail style `user@host`.
        let preceded_by_word = text[..start]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '_');
        if preceded_by_word {
            continue;
        }
        let rest = &text[start + MENTION_MARKER.len_utf8()..];
        let end = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if end > 0 {
            found.push(&rest[..end]);
        }
    }
    found
}
