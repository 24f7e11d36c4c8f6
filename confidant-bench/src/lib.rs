//! Fixtures shared by the Confidant benchmarks.

use confidant_core::config::RecordsConfig;
use confidant_core::types::{Role, UserId};
use confidant_core::{Record, RecordStore, UserRecord};

/// A user with `facts` facts and a full history.
#[must_use]
pub fn populated_user(id: i64, facts: usize) -> UserRecord {
    let config = RecordsConfig::default();
    let mut user = UserRecord::new_default(UserId(id), &config);
    user.username = Some(format!("user_{id}"));
    user.merge_facts((0..facts).map(|i| (format!("fact_{i}"), format!("value number {i}"))));
    for i in 0..config.history_capacity {
        let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
        user.push_history(
            role,
            format!("message {i} with a little bit of text in it"),
            config.history_capacity,
        );
    }
    user
}

/// An in-memory store holding `users` populated users.
#[must_use]
pub fn populated_store(users: i64) -> RecordStore {
    let store = RecordStore::in_memory();
    for id in 1..=users {
        store.save(&populated_user(id, 8));
    }
    store
}

/// A reply with prose between `n` UPDATE and REMIND directives.
#[must_use]
pub fn reply_with_directives(n: usize) -> String {
    let mut text = String::from("Sure thing.");
    for i in 0..n {
        if i % 2 == 0 {
            text.push_str(&format!(r#" Noted [UPDATE: {{"key_{i}": "value {i}", "n": {i}}}]"#));
        } else {
            text.push_str(&format!(r#" and [REMIND: {{"minutes": {i}, "text": "ping {i}"}}]"#));
        }
    }
    text.push_str(" Talk soon!");
    text
}
