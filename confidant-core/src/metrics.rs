//! Runtime counters.
//!
//! Every failure the system swallows (corrupt slots, failed saves, dropped
//! directives, generation fallbacks) is also counted here, so silence on
//! the chat side never means silence on the operator side.
//!
//! Lock-free `AtomicU64` counters, incremented in the hot path and read on
//! export.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters for store, directive and turn events.
#[derive(Debug)]
pub struct ConfidantCounters {
    /// Records served from a persisted slot.
    pub records_loaded: AtomicU64,
    /// Default records handed out for never-seen ids.
    pub records_created: AtomicU64,
    /// Loads that fell back to an unsaved default after a backend error.
    pub read_failures: AtomicU64,
    /// Successful saves.
    pub saves_completed: AtomicU64,
    /// Saves that failed and were swallowed.
    pub save_failures: AtomicU64,
    /// Unreadable slots moved to a backup namespace.
    pub corrupt_slots_recovered: AtomicU64,
    /// Directives applied.
    pub directives_applied: AtomicU64,
    /// Directives dropped as malformed.
    pub directives_dropped: AtomicU64,
    /// Reminders scheduled.
    pub reminders_scheduled: AtomicU64,
    /// Reminders that fired.
    pub reminders_fired: AtomicU64,
    /// Turns answered with the fallback text.
    pub generation_fallbacks: AtomicU64,
}

impl ConfidantCounters {
    /// Create a new set of zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records_loaded: AtomicU64::new(0),
            records_created: AtomicU64::new(0),
            read_failures: AtomicU64::new(0),
            saves_completed: AtomicU64::new(0),
            save_failures: AtomicU64::new(0),
            corrupt_slots_recovered: AtomicU64::new(0),
            directives_applied: AtomicU64::new(0),
            directives_dropped: AtomicU64::new(0),
            reminders_scheduled: AtomicU64::new(0),
            reminders_fired: AtomicU64::new(0),
            generation_fallbacks: AtomicU64::new(0),
        }
    }

    /// Increment one counter by one.
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot all counters for export.
    #[must_use]
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            records_loaded: self.records_loaded.load(Ordering::Relaxed),
            records_created: self.records_created.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            saves_completed: self.saves_completed.load(Ordering::Relaxed),
            save_failures: self.save_failures.load(Ordering::Relaxed),
            corrupt_slots_recovered: self.corrupt_slots_recovered.load(Ordering::Relaxed),
            directives_applied: self.directives_applied.load(Ordering::Relaxed),
            directives_dropped: self.directives_dropped.load(Ordering::Relaxed),
            reminders_scheduled: self.reminders_scheduled.load(Ordering::Relaxed),
            reminders_fired: self.reminders_fired.load(Ordering::Relaxed),
            generation_fallbacks: self.generation_fallbacks.load(Ordering::Relaxed),
        }
    }
}

impl Default for ConfidantCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// A snapshot of counter values at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Records served from a persisted slot.
    pub records_loaded: u64,
    /// Default records handed out.
    pub records_created: u64,
    /// Failed loads.
    pub read_failures: u64,
    /// Successful saves.
    pub saves_completed: u64,
    /// Swallowed save failures.
    pub save_failures: u64,
    /// Quarantined slots.
    pub corrupt_slots_recovered: u64,
    /// Applied directives.
    pub directives_applied: u64,
    /// Dropped directives.
    pub directives_dropped: u64,
    /// Scheduled reminders.
    pub reminders_scheduled: u64,
    /// Fired reminders.
    pub reminders_fired: u64,
    /// Fallback replies.
    pub generation_fallbacks: u64,
}

impl CounterSnapshot {
    /// Format as Prometheus-compatible text.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let rows: [(&str, &str, u64); 11] = [
            ("records_loaded", "Records loaded from a slot", self.records_loaded),
            ("records_created", "Default records handed out", self.records_created),
            ("read_failures", "Record loads that hit a backend error", self.read_failures),
            ("saves_completed", "Record saves completed", self.saves_completed),
            ("save_failures", "Record saves that failed", self.save_failures),
            (
                "corrupt_slots_recovered",
                "Unreadable slots quarantined",
                self.corrupt_slots_recovered,
            ),
            ("directives_applied", "Directives applied", self.directives_applied),
            ("directives_dropped", "Malformed directives dropped", self.directives_dropped),
            ("reminders_scheduled", "Reminders scheduled", self.reminders_scheduled),
            ("reminders_fired", "Reminders delivered", self.reminders_fired),
            (
                "generation_fallbacks",
                "Turns answered with fallback text",
                self.generation_fallbacks,
            ),
        ];

        let mut out = String::new();
        for (name, help, value) in rows {
            out.push_str(&format!(
                "# HELP confidant_{name}_total {help}\n\
                 # TYPE confidant_{name}_total counter\n\
                 confidant_{name}_total {value}\n"
            ));
        }
        out
    }
}
