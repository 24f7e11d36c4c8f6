//! The directive protocol.
//!
//! The generator embeds machine-readable commands in its free-text reply:
//!
//! ```text
//! Nice to meet you! [UPDATE: {"name": "Alex"}] I'll ping you. [REMIND: {"minutes": 5, "text": "Stretch!"}]
//! ```
//!
//! - `[UPDATE: {...}]`: a flat object merged into the user's facts.
//! - `[REMIND: {"minutes": n, "text": "..."}]`: a one-shot reminder.
//!
//! Every directive is located, removed from the visible text and processed
//! independently. A malformed one is dropped on its own: it never blocks
//! its siblings and never reaches the chat. Drops are reported through a
//! `warn!` event on target `confidant::directive` and in
//! [`DirectiveOutcome::failures`].
//!
//! Parsing ([`parse_reply`]) is pure; [`DirectiveApplier::apply`] performs
//! the side effects (fact merge on the passed record, reminder scheduling).
//! Neither persists anything.

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::{DirectiveConfig, ScanOrder};
use crate::metrics::ConfidantCounters;
use crate::record::UserRecord;
use crate::scheduler::{ScheduledHandle, Scheduler};
use crate::types::ChatId;

static OPENER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(UPDATE|REMIND):").expect("directive opener pattern is valid"));

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Directive tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DirectiveKind {
    /// `[UPDATE: {...}]`
    Update,
    /// `[REMIND: {...}]`
    Remind,
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Update => write!(f, "UPDATE"),
            Self::Remind => write!(f, "REMIND"),
        }
    }
}

/// A directive located in the text, payload not yet interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDirective<'a> {
    /// Tag.
    pub kind: DirectiveKind,
    /// Byte range of the whole `[TAG: ...]` in the source text.
    pub span: Range<usize>,
    /// The payload between the tag and the closing bracket, trimmed.
    pub payload: &'a str,
}

/// A reminder request.
#[derive(Debug, Clone, PartialEq)]
pub struct Reminder {
    /// Delay in minutes (fractions allowed).
    pub minutes: f64,
    /// Message to deliver.
    pub text: String,
}

impl Reminder {
    /// Delay as a [`Duration`].
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.minutes * 60.0).unwrap_or(Duration::ZERO)
    }
}

/// A successfully interpreted directive.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Facts to merge, in payload order.
    Update(Vec<(String, String)>),
    /// Reminder to schedule.
    Remind(Reminder),
}

/// A directive that was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveFailure {
    /// Tag of the dropped directive.
    pub kind: DirectiveKind,
    /// Its raw payload.
    pub payload: String,
    /// Why it was dropped.
    pub reason: String,
}

/// Result of the pure parsing step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedReply {
    /// Visible text with every directive removed.
    pub text: String,
    /// Interpreted directives, in processing order.
    pub directives: Vec<Directive>,
    /// Dropped directives, in processing order.
    pub failures: Vec<DirectiveFailure>,
}

/// A reminder that has been handed to the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledReminder {
    /// What was requested.
    pub reminder: Reminder,
    /// Scheduler receipt.
    pub handle: ScheduledHandle,
}

/// Everything [`DirectiveApplier::apply`] did.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DirectiveOutcome {
    /// Visible reply; empty means nothing should be sent.
    pub text: String,
    /// Fact keys that were added or changed.
    pub facts_changed: usize,
    /// Reminders scheduled.
    pub reminders: Vec<ScheduledReminder>,
    /// Dropped directives.
    pub failures: Vec<DirectiveFailure>,
}

impl DirectiveOutcome {
    /// The reply to send, or `None` if stripping left nothing.
    #[must_use]
    pub fn visible_text(&self) -> Option<&str> {
        (!self.text.is_empty()).then_some(self.text.as_str())
    }
}

/// Side channel used by fired reminders to reach the chat.
#[async_trait]
pub trait ReplySink: Send + Sync {
    /// Deliver `text` to `chat`. Delivery failures are the sink's to log.
    async fn deliver(&self, chat: ChatId, text: String);
}

// ---------------------------------------------------------------------------
// Scanning
// ---------------------------------------------------------------------------

/// Locate every directive in `text`, in textual order.
///
/// A payload that parses as JSON ends where the parser stops, so brackets
/// inside strings and arrays are safe. Otherwise the directive runs to the
/// first `]` before the next tag and is treated as malformed.
/// A tag with no closing bracket at all is left in the text.
#[must_use]
pub fn scan(text: &str) -> Vec<RawDirective<'_>> {
    let openers: Vec<(usize, usize, DirectiveKind)> = OPENER
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let kind = match caps.get(1)?.as_str() {
                "UPDATE" => DirectiveKind::Update,
                _ => DirectiveKind::Remind,
            };
            Some((whole.start(), whole.end(), kind))
        })
        .collect();

    let mut found = Vec::with_capacity(openers.len());
    let mut consumed = 0;
    for (i, &(start, body_start, kind)) in openers.iter().enumerate() {
        // Tag text quoted inside an earlier payload.
        if start < consumed {
            continue;
        }
        let boundary = openers.get(i + 1).map_or(text.len(), |next| next.0);
        let Some((payload, end)) = locate_payload(text, body_start, boundary) else {
            continue;
        };
        found.push(RawDirective {
            kind,
            span: start..end,
            payload: text[payload].trim(),
        });
        consumed = end;
    }
    found
}

/// Payload range and end-of-directive offset for a tag whose body starts
/// at `body_start`.
fn locate_payload(
    text: &str,
    body_start: usize,
    boundary: usize,
) -> Option<(Range<usize>, usize)> {
    let body = &text[body_start..];
    let json_start = body_start + (body.len() - body.trim_start().len());

    let mut stream = serde_json::Deserializer::from_str(&text[json_start..])
        .into_iter::<serde::de::IgnoredAny>();
    if let Some(Ok(_)) = stream.next() {
        let json_end = json_start + stream.byte_offset();
        let rest = &text[json_end..];
        let gap = rest.len() - rest.trim_start().len();
        if rest[gap..].starts_with(']') {
            return Some((json_start..json_end, json_end + gap + 1));
        }
    }

    let close = body_start + text[body_start..boundary].find(']')?;
    Some((json_start.min(close)..close, close + 1))
}

/// Remove `spans` (sorted, non-overlapping) from `text` and trim the result.
///
/// Directives separated only by whitespace go as one block together with
/// that whitespace; whitespace around a block is kept.
#[must_use]
pub fn strip(text: &str, spans: &[Range<usize>]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    let mut i = 0;
    while i < spans.len() {
        let start = spans[i].start;
        let mut end = spans[i].end;
        while let Some(next) = spans.get(i + 1) {
            if text[end..next.start].chars().all(char::is_whitespace) {
                end = next.end;
                i += 1;
            } else {
                break;
            }
        }
        out.push_str(&text[cursor..start]);
        cursor = end;
        i += 1;
    }
    out.push_str(&text[cursor..]);
    out.trim().to_string()
}

// ---------------------------------------------------------------------------
// Payload interpretation
// ---------------------------------------------------------------------------

fn parse_object(payload: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(payload) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, got {}", json_type(&other))),
        Err(e) => Err(e.to_string()),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Interpret an UPDATE payload as fact key/value pairs.
///
/// Strings are kept as-is, numbers and booleans stringified, `null`
/// entries ignored, nested values stored as compact JSON.
///
/// # Errors
/// A message describing why the payload is not a JSON object.
pub fn parse_update(payload: &str) -> Result<Vec<(String, String)>, String> {
    let map = parse_object(payload)?;
    Ok(map
        .into_iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::Null => return None,
                Value::String(s) => s,
                other => other.to_string(),
            };
            Some((key, value))
        })
        .collect())
}

/// Interpret a REMIND payload.
///
/// `minutes` may be a number or a numeric string; missing, non-positive
/// or unparsable values fall back to the configured default, and the
/// result is capped at the configured maximum. A missing or blank `text`
/// becomes the configured placeholder.
///
/// # Errors
/// A message describing why the payload is not a JSON object.
pub fn parse_remind(payload: &str, config: &DirectiveConfig) -> Result<Reminder, String> {
    let map = parse_object(payload)?;

    let requested = match map.get("minutes") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    #[allow(clippy::cast_precision_loss)]
    let minutes = requested
        .filter(|m| m.is_finite() && *m > 0.0)
        .unwrap_or(config.default_reminder_minutes as f64)
        .min(config.max_reminder_minutes as f64);

    let text = map
        .get("text")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map_or_else(|| config.reminder_placeholder.clone(), str::to_string);

    Ok(Reminder { minutes, text })
}

/// Locate, interpret and strip every directive in `generated`.
#[must_use]
pub fn parse_reply(generated: &str, config: &DirectiveConfig) -> ParsedReply {
    let mut raw = scan(generated);
    let spans: Vec<Range<usize>> = raw.iter().map(|d| d.span.clone()).collect();
    let text = strip(generated, &spans);

    if config.scan_order == ScanOrder::KindGrouped {
        raw.sort_by_key(|d| d.kind);
    }

    let mut directives = Vec::with_capacity(raw.len());
    let mut failures = Vec::new();
    for d in raw {
        let parsed = match d.kind {
            DirectiveKind::Update => parse_update(d.payload).map(Directive::Update),
            DirectiveKind::Remind => parse_remind(d.payload, config).map(Directive::Remind),
        };
        match parsed {
            Ok(directive) => directives.push(directive),
            Err(reason) => {
                warn!(
                    target: "confidant::directive",
                    directive = %d.kind,
                    reason = %reason,
                    payload = %d.payload,
                    "Dropped malformed directive"
                );
                failures.push(DirectiveFailure {
                    kind: d.kind,
                    payload: d.payload.to_string(),
                    reason,
                });
            }
        }
    }

    ParsedReply {
        text,
        directives,
        failures,
    }
}

// ---------------------------------------------------------------------------
// Application
// ---------------------------------------------------------------------------

/// Applies parsed directives to a user record and the scheduler.
#[derive(Debug, Clone)]
pub struct DirectiveApplier {
    config: DirectiveConfig,
    counters: Arc<ConfidantCounters>,
}

impl DirectiveApplier {
    /// Create an applier reporting into `counters`.
    #[must_use]
    pub fn new(config: DirectiveConfig, counters: Arc<ConfidantCounters>) -> Self {
        Self { config, counters }
    }

    /// Directive settings in use.
    #[must_use]
    pub fn config(&self) -> &DirectiveConfig {
        &self.config
    }

    /// Parse `generated`, merge UPDATE facts into `record`, schedule every
    /// REMIND to be delivered to `chat` through `reply`, and return the
    /// cleaned text.
    ///
    /// The caller persists `record`.
    pub fn apply(
        &self,
        generated: &str,
        record: &mut UserRecord,
        scheduler: &Scheduler,
        reply: &Arc<dyn ReplySink>,
        chat: ChatId,
    ) -> DirectiveOutcome {
        let parsed = parse_reply(generated, &self.config);
        let mut outcome = DirectiveOutcome {
            text: parsed.text,
            failures: parsed.failures,
            ..DirectiveOutcome::default()
        };
        for _ in &outcome.failures {
            ConfidantCounters::bump(&self.counters.directives_dropped);
        }

        for directive in parsed.directives {
            ConfidantCounters::bump(&self.counters.directives_applied);
            match directive {
                Directive::Update(facts) => {
                    let changed = record.merge_facts(facts);
                    debug!(user = %record.id, changed, "Facts updated");
                    outcome.facts_changed += changed;
                }
                Directive::Remind(reminder) => {
                    let handle = self.schedule_reminder(&reminder, scheduler, reply, chat);
                    outcome.reminders.push(ScheduledReminder { reminder, handle });
                }
            }
        }
        outcome
    }

    fn schedule_reminder(
        &self,
        reminder: &Reminder,
        scheduler: &Scheduler,
        reply: &Arc<dyn ReplySink>,
        chat: ChatId,
    ) -> ScheduledHandle {
        let sink = Arc::clone(reply);
        let counters = Arc::clone(&self.counters);
        let message = format!("{}{}", self.config.reminder_prefix, reminder.text);
        ConfidantCounters::bump(&self.counters.reminders_scheduled);

        scheduler.schedule(reminder.delay(), move || async move {
            sink.deliver(chat, message).await;
            ConfidantCounters::bump(&counters.reminders_fired);
        })
    }
}

/// Facts sorted by key, for prompts and logs.
#[must_use]
pub fn sorted_facts(facts: &HashMap<String, String>) -> Vec<(&str, &str)> {
    let mut list: Vec<(&str, &str)> = facts.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
    list.sort_unstable();
    list
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecordsConfig;
    use crate::record::Record;
    use crate::types::UserId;
    use parking_lot::Mutex;

    const MIXED_REPLY: &str = r#"Got it. [UPDATE: {"mood":"happy"}] [REMIND: {"minutes": 5, "text": "Stretch!"}] See you soon."#;

    fn config() -> DirectiveConfig {
        DirectiveConfig::default()
    }

    #[derive(Default)]
    struct CollectingSink {
        sent: Mutex<Vec<(ChatId, String)>>,
    }

    #[async_trait]
    impl ReplySink for CollectingSink {
        async fn deliver(&self, chat: ChatId, text: String) {
            self.sent.lock().push((chat, text));
        }
    }

    #[test]
    fn mixed_reply_is_cleaned_and_interpreted() {
        let parsed = parse_reply(MIXED_REPLY, &config());
        assert_eq!(parsed.text, "Got it.  See you soon.");
        assert_eq!(
            parsed.directives,
            vec![
                Directive::Update(vec![("mood".to_string(), "happy".to_string())]),
                Directive::Remind(Reminder {
                    minutes: 5.0,
                    text: "Stretch!".to_string()
                }),
            ]
        );
        assert!(parsed.failures.is_empty());
    }

    #[test]
    fn bad_json_is_stripped_and_reported() {
        let parsed = parse_reply("Sure! [UPDATE: {bad json}]", &config());
        assert_eq!(parsed.text, "Sure!");
        assert!(parsed.directives.is_empty());
        assert_eq!(parsed.failures.len(), 1);
        assert_eq!(parsed.failures[0].kind, DirectiveKind::Update);
        assert_eq!(parsed.failures[0].payload, "{bad json}");
    }

    #[test]
    fn malformed_directive_does_not_block_siblings() {
        let text = r#"[UPDATE: {"a": 1] ok [UPDATE: {"b": "2"}]"#;
        let parsed = parse_reply(text, &config());
        assert_eq!(parsed.text, "ok");
        assert_eq!(parsed.failures.len(), 1);
        assert_eq!(
            parsed.directives,
            vec![Directive::Update(vec![("b".to_string(), "2".to_string())])]
        );
    }

    #[test]
    fn brackets_inside_strings_do_not_end_the_payload() {
        let text = r#"Noted [UPDATE: {"quote": "arrays look like [1, 2]"}] done"#;
        let parsed = parse_reply(text, &config());
        assert_eq!(parsed.text, "Noted  done");
        assert_eq!(
            parsed.directives,
            vec![Directive::Update(vec![(
                "quote".to_string(),
                "arrays look like [1, 2]".to_string()
            )])]
        );
    }

    #[test]
    fn unterminated_tag_stays_visible() {
        let parsed = parse_reply("Look: [UPDATE: {\"a\": 1}", &config());
        assert_eq!(parsed.text, "Look: [UPDATE: {\"a\": 1}");
        assert!(parsed.directives.is_empty());
        assert!(parsed.failures.is_empty());
    }

    #[test]
    fn directive_only_reply_is_empty() {
        let parsed = parse_reply("  [UPDATE: {\"x\": \"y\"}]\n", &config());
        assert!(parsed.text.is_empty());
    }

    #[test]
    fn kind_grouped_processes_updates_first() {
        let text = r#"[REMIND: {"minutes": 2}] [UPDATE: {"a": "1"}] [REMIND: {"minutes": 3}]"#;
        let kinds: Vec<_> = parse_reply(text, &config())
            .directives
            .into_iter()
            .map(|d| match d {
                Directive::Update(_) => "U",
                Directive::Remind(_) => "R",
            })
            .collect();
        assert_eq!(kinds, vec!["U", "R", "R"]);
    }

    #[test]
    fn source_order_interleaves() {
        let cfg = DirectiveConfig {
            scan_order: ScanOrder::SourceOrder,
            ..config()
        };
        let text = r#"[REMIND: {"minutes": 2}] [UPDATE: {"a": "1"}] [REMIND: {"minutes": 3}]"#;
        let minutes: Vec<f64> = parse_reply(text, &cfg)
            .directives
            .into_iter()
            .map(|d| match d {
                Directive::Update(_) => 0.0,
                Directive::Remind(r) => r.minutes,
            })
            .collect();
        assert_eq!(minutes, vec![2.0, 0.0, 3.0]);
    }

    #[test]
    fn remind_defaults_and_coercion() {
        let cfg = config();
        assert_eq!(
            parse_remind("{}", &cfg).expect("object"),
            Reminder {
                minutes: 1.0,
                text: "Reminder!".to_string()
            }
        );
        let minutes = |payload: &str| parse_remind(payload, &cfg).expect("object").minutes;
        assert!((minutes(r#"{"minutes": "10"}"#) - 10.0).abs() < f64::EPSILON);
        assert!((minutes(r#"{"minutes": -4}"#) - 1.0).abs() < f64::EPSILON);
        assert!((minutes(r#"{"minutes": "soon"}"#) - 1.0).abs() < f64::EPSILON);
        let capped = parse_remind(r#"{"minutes": 1e9}"#, &cfg).expect("object");
        assert!((capped.minutes - 10_080.0).abs() < f64::EPSILON);
        assert!(parse_remind("[1, 2]", &cfg).is_err());
    }

    #[test]
    fn update_value_coercion() {
        let facts = parse_update(r#"{"age": 30, "vegan": true, "pet": null, "kids": ["a"]}"#)
            .expect("object");
        let map: HashMap<_, _> = facts.into_iter().collect();
        assert_eq!(map["age"], "30");
        assert_eq!(map["vegan"], "true");
        assert_eq!(map["kids"], r#"["a"]"#);
        assert!(!map.contains_key("pet"));
        assert!(parse_update("\"just a string\"").is_err());
    }

    #[test]
    fn reminder_delay_converts_minutes() {
        let r = Reminder {
            minutes: 0.5,
            text: String::new(),
        };
        assert_eq!(r.delay(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn apply_merges_facts_and_schedules_reminders() {
        let counters = Arc::new(ConfidantCounters::new());
        let applier = DirectiveApplier::new(config(), Arc::clone(&counters));
        let scheduler = Scheduler::new();
        let sink = Arc::new(CollectingSink::default());
        let reply: Arc<dyn ReplySink> = sink.clone();
        let mut user = UserRecord::new_default(UserId(1), &RecordsConfig::default());

        let outcome = applier.apply(
            MIXED_REPLY,
            &mut user,
            &scheduler,
            &reply,
            ChatId(77),
        );

        assert_eq!(outcome.visible_text(), Some("Got it.  See you soon."));
        assert_eq!(user.facts["mood"], "happy");
        assert_eq!(outcome.facts_changed, 1);
        assert_eq!(outcome.reminders.len(), 1);
        assert_eq!(outcome.reminders[0].handle.delay, Duration::from_secs(300));
        assert_eq!(outcome.reminders[0].reminder.text, "Stretch!");

        tokio::time::sleep(Duration::from_secs(301)).await;
        tokio::task::yield_now().await;
        assert_eq!(
            sink.sent.lock().clone(),
            vec![(ChatId(77), "⏰ Stretch!".to_string())]
        );
        let snap = counters.snapshot();
        assert_eq!(snap.directives_applied, 2);
        assert_eq!(snap.reminders_fired, 1);
    }

    #[tokio::test]
    async fn apply_overwrites_existing_facts() {
        let applier = DirectiveApplier::new(config(), Arc::new(ConfidantCounters::new()));
        let scheduler = Scheduler::new();
        let reply: Arc<dyn ReplySink> = Arc::new(CollectingSink::default());
        let mut user = UserRecord::new_default(UserId(1), &RecordsConfig::default());

        applier.apply(r#"[UPDATE: {"name": "Alex"}]"#, &mut user, &scheduler, &reply, ChatId(1));
        assert_eq!(user.facts.len(), 1);
        assert_eq!(user.facts["name"], "Alex");

        let outcome = applier.apply(
            r#"[UPDATE: {"name": "Sam"}]"#,
            &mut user,
            &scheduler,
            &reply,
            ChatId(1),
        );
        assert_eq!(user.facts.len(), 1);
        assert_eq!(user.facts["name"], "Sam");
        assert!(outcome.visible_text().is_none());
    }

    #[tokio::test]
    async fn malformed_apply_leaves_facts_untouched() {
        let counters = Arc::new(ConfidantCounters::new());
        let applier = DirectiveApplier::new(config(), Arc::clone(&counters));
        let scheduler = Scheduler::new();
        let reply: Arc<dyn ReplySink> = Arc::new(CollectingSink::default());
        let mut user = UserRecord::new_default(UserId(1), &RecordsConfig::default());

        let outcome = applier.apply(
            "Hmm [UPDATE: {bad json}] ok",
            &mut user,
            &scheduler,
            &reply,
            ChatId(1),
        );
        assert_eq!(outcome.text, "Hmm  ok");
        assert!(user.facts.is_empty());
        assert_eq!(counters.snapshot().directives_dropped, 1);
        assert_eq!(scheduler.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_reminders_are_dropped_and_siblings_still_apply() {
        let counters = Arc::new(ConfidantCounters::new());
        let applier = DirectiveApplier::new(config(), Arc::clone(&counters));
        let scheduler = Scheduler::new();
        let reply: Arc<dyn ReplySink> = Arc::new(CollectingSink::default());
        let mut user = UserRecord::new_default(UserId(1), &RecordsConfig::default());

        let outcome = applier.apply(
            r#"On it. [REMIND: {oops}] [REMIND: [1]] [UPDATE: {"city": "Oslo"}] [REMIND: {"minutes": 2, "text": "Tea"}] Bye."#,
            &mut user,
            &scheduler,
            &reply,
            ChatId(1),
        );

        assert_eq!(outcome.text, "On it.  Bye.");
        assert_eq!(outcome.failures.len(), 2);
        assert!(outcome.failures.iter().all(|f| f.kind == DirectiveKind::Remind));
        assert_eq!(outcome.failures[1].payload, "[1]");
        assert_eq!(user.facts["city"], "Oslo");
        assert_eq!(outcome.reminders.len(), 1);
        assert_eq!(outcome.reminders[0].reminder.text, "Tea");
        assert_eq!(scheduler.pending(), 1);

        let snap = counters.snapshot();
        assert_eq!(snap.directives_dropped, 2);
        assert_eq!(snap.directives_applied, 2);
    }

    #[test]
    fn sorted_facts_are_ordered_by_key() {
        let mut facts = HashMap::new();
        facts.insert("b".to_string(), "2".to_string());
        facts.insert("a".to_string(), "1".to_string());
        assert_eq!(sorted_facts(&facts), vec![("a", "1"), ("b", "2")]);
    }
}
