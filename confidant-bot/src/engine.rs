//! The per-turn pipeline.
//!
//! ```text
//! group log ─▶ lock user ─▶ get_or_create ─▶ sync name ─▶ resolve @mention
//!     ─▶ generate (bounded) ─▶ apply directives ─▶ append history ─▶ save
//! ```
//!
//! The acting user's record lock is held from load to save, so a second
//! message from the same user waits instead of overwriting this turn's
//! changes. Locks are taken one at a time and never nested.
//!
//! A record whose slot could not be read is never saved. The turn still
//! gets an answer, but nothing it changed is persisted.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use confidant_core::config::{ConfidantConfig, DirectiveConfig, LlmConfig};
use confidant_core::directive::{DirectiveApplier, DirectiveFailure, ReplySink, ScheduledReminder};
use confidant_core::metrics::ConfidantCounters;
use confidant_core::name_index;
use confidant_core::scheduler::Scheduler;
use confidant_core::types::{ChatId, GroupMessage, Role, UserId};
use confidant_core::{GroupRecord, LoadState, RecordStore, UserRecord};
use confidant_llm::Generator;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::bridge;
use crate::error::{Result, TurnError};
use crate::events::{ChatKind, InboundEvent};

/// What a turn produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnOutcome {
    /// Text to send, or `None` to stay silent.
    pub visible_reply: Option<String>,
    /// Reminders registered during this turn.
    pub scheduled_reminders: Vec<ScheduledReminder>,
    /// Directives dropped during this turn.
    pub dropped_directives: Vec<DirectiveFailure>,
    /// Whether the fallback text replaced a failed generation.
    pub used_fallback: bool,
}

impl TurnOutcome {
    fn silent() -> Self {
        Self::default()
    }
}

/// Processes inbound events against the record store and a generator.
pub struct TurnEngine {
    store: RecordStore,
    generator: Arc<dyn Generator>,
    applier: DirectiveApplier,
    scheduler: Scheduler,
    llm: LlmConfig,
}

impl TurnEngine {
    /// Assemble an engine from parts.
    #[must_use]
    pub fn new(
        store: RecordStore,
        generator: Arc<dyn Generator>,
        directives: DirectiveConfig,
        llm: LlmConfig,
    ) -> Self {
        let applier = DirectiveApplier::new(directives, Arc::clone(store.counters()));
        Self {
            store,
            generator,
            applier,
            scheduler: Scheduler::new(),
            llm,
        }
    }

    /// Open the configured store and LLM client.
    ///
    /// # Errors
    /// [`TurnError::Storage`] if the database cannot be opened, or the
    /// errors of [`bridge::client_from_config`].
    pub fn from_config(config: &ConfidantConfig) -> Result<Self> {
        let store = RecordStore::open(config)?;
        let client = bridge::client_from_config(&config.llm)?;
        Ok(Self::new(
            store,
            Arc::new(client),
            config.directives.clone(),
            config.llm.clone(),
        ))
    }

    /// The record store.
    #[must_use]
    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    /// The reminder scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Shared counters.
    #[must_use]
    pub fn counters(&self) -> &Arc<ConfidantCounters> {
        self.store.counters()
    }

    /// Handle one inbound message.
    ///
    /// Group messages are always logged. A reply is produced for private
    /// messages and for group messages addressed to the agent. Reminders
    /// scheduled by the reply are delivered later through `reply`.
    pub async fn handle_message(
        &self,
        event: &InboundEvent,
        reply: &Arc<dyn ReplySink>,
    ) -> TurnOutcome {
        let span = info_span!(
            "turn",
            chat = %event.chat_id,
            user = %event.sender_id,
            kind = ?event.chat_kind
        );
        async {
            if event.chat_kind == ChatKind::Group {
                self.on_group_message(event).await;
            }
            if !event.wants_reply() {
                return TurnOutcome::silent();
            }
            self.reply_turn(event, reply).await
        }
        .instrument(span)
        .await
    }

    /// Log a group message to the group's record and sync the sender's
    /// display name onto their user record.
    pub async fn on_group_message(&self, event: &InboundEvent) {
        let sender = event
            .display_name()
            .map_or_else(|| event.sender_id.to_string(), str::to_string);
        let capacity = self.store.config().group_message_capacity;
        let message = GroupMessage::now(sender, event.text.clone());
        self.store
            .update::<GroupRecord, _>(event.chat_id, |group| group.push_message(message, capacity))
            .await;

        if let Some(name) = event.display_name() {
            let _guard = self.store.locks().lock::<UserRecord>(event.sender_id).await;
            let (mut user, state) = self.store.get_or_create::<UserRecord>(event.sender_id);
            if state.can_save() && (user.sync_username(Some(name)) || state.is_created()) {
                self.store.save(&user);
            }
        }
    }

    async fn reply_turn(&self, event: &InboundEvent, reply: &Arc<dyn ReplySink>) -> TurnOutcome {
        let _guard = self.store.locks().lock::<UserRecord>(event.sender_id).await;
        let (mut user, state) = self.store.get_or_create::<UserRecord>(event.sender_id);
        match state {
            LoadState::Created => info!("New user"),
            LoadState::ReadFailed => warn!("User record unreadable, this turn will not be saved"),
            LoadState::Found => {}
        }
        if user.sync_username(event.display_name()) {
            debug!(username = ?user.username, "Display name updated");
        }

        let other = self.resolve_mention(&event.text, event.sender_id);
        let display_name = user
            .username
            .clone()
            .unwrap_or_else(|| event.sender_id.to_string());
        let context = bridge::prompt_context(
            &self.llm.persona,
            &user,
            &display_name,
            other.as_ref(),
            &event.text,
            self.store.config().prompt_history,
        );

        let mut outcome = TurnOutcome::default();
        let visible = match self.generate(&context).await {
            Ok(generated) => {
                let applied = self.applier.apply(
                    &generated,
                    &mut user,
                    &self.scheduler,
                    reply,
                    event.chat_id,
                );
                outcome.scheduled_reminders = applied.reminders;
                outcome.dropped_directives = applied.failures;
                applied.text
            }
            Err(err) => {
                ConfidantCounters::bump(&self.counters().generation_fallbacks);
                warn!(error = %err, "Generation failed, sending fallback reply");
                outcome.used_fallback = true;
                self.llm.fallback_text.clone()
            }
        };

        let capacity = self.store.config().history_capacity;
        user.push_history(Role::User, event.text.clone(), capacity);
        if !visible.is_empty() {
            user.push_history(Role::Assistant, visible.clone(), capacity);
        }
        user.touch();
        if state.can_save() {
            self.store.save(&user);
        }

        outcome.visible_reply = (!visible.is_empty()).then_some(visible);
        outcome
    }

    /// Generate under the configured overall timeout.
    async fn generate(&self, context: &confidant_llm::PromptContext) -> Result<String> {
        let limit = self.llm.generation_timeout_ms;
        let generation = self.generator.generate(context);
        match tokio::time::timeout(Duration::from_millis(limit), generation).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(TurnError::GenerationTimeout(limit)),
        }
    }

    /// First `@mention` naming a user other than `asker`.
    fn resolve_mention(&self, text: &str, asker: UserId) -> Option<UserRecord> {
        let found = name_index::mentions(text)
            .into_iter()
            .find_map(|name| name_index::find_other_by_name(&self.store, name, asker));
        if let Some(other) = &found {
            debug!(other = %other.id, "Mention resolved");
        }
        found
    }

    /// The agent was added to a group: create or refresh its record.
    pub async fn on_agent_added(&self, chat_id: ChatId, title: &str) -> GroupRecord {
        let title = title.trim().to_string();
        let group = self
            .store
            .update::<GroupRecord, _>(chat_id, |group| {
                group.title = title;
                group.added_at = Utc::now();
            })
            .await;
        info!(chat = %chat_id, title = %group.title, "Added to group");
        group
    }

    /// The agent was removed from a group. The record is kept; the returned
    /// text is a notice for the operator.
    pub fn on_agent_removed(&self, chat_id: ChatId) -> String {
        let title = match self.store.fetch::<GroupRecord>(chat_id) {
            Ok(Some(group)) if !group.title.is_empty() => group.title,
            Ok(_) => String::from("an unknown group"),
            Err(err) => {
                warn!(chat = %chat_id, error = %err, "Could not read group record");
                String::from("an unknown group")
            }
        };
        info!(chat = %chat_id, title = %title, "Removed from group");
        format!("Removed from {title} ({chat_id}). Its history is kept.")
    }
}
