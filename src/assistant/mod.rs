//! The conversational layer.
//!
//! [`Assistant::handle`] takes one utterance through the whole turn: it
//! resolves a pending confirmation or asks the LLM for an action, applies the
//! action to the store, records the conversation turn, and runs cleanup so
//! the contextual view is fresh for the next turn. Speaking and printing the
//! reply is left to the caller.

mod pending;
pub mod render;

pub use pending::{PendingAction, is_affirmative};

use crate::intent::{Intent, ParsedAction, parse_action};
use crate::llm::{LlmProvider, build_system_prompt, build_user_prompt};
use crate::models::time::{format_spoken, format_timestamp};
use crate::models::{ClearScope, NewRecord, RecordKind, RecordPayload, RecordUpdate};
use crate::services::MemoryStore;
use crate::storage::MemoryBackend;
use crate::{Error, Result};
use chrono::{NaiveDateTime, TimeDelta};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Asked when a requested time has already passed.
pub const PAST_DUE_PROMPT: &str =
    "I notice this time has already passed. Would you like me to set this for tomorrow instead?";

/// Spoken when the LLM call fails.
pub const PROVIDER_FAILURE: &str =
    "I'm sorry, I'm having trouble reaching my language service right now. Please try again.";

/// Spoken when the LLM reply cannot be turned into an action.
pub const NOT_UNDERSTOOD: &str = "I'm sorry, I didn't quite understand that. Could you rephrase?";

/// Spoken when a pending action is declined.
pub const CANCELLED: &str = "Okay, I won't make any changes.";

/// Number of recent facts, events, and conversation turns sent to the LLM.
const PROMPT_HISTORY: usize = 5;

/// A notification to show alongside a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Short title.
    pub title: String,
    /// Body text.
    pub message: String,
}

impl Notification {
    fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
        }
    }
}

/// The outcome of one turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// What to say.
    pub text: String,
    /// Protocol name of the action taken, if any.
    pub action: Option<String>,
    /// Notification to raise, if any.
    pub notification: Option<Notification>,
    /// Whether the assistant is now waiting for a yes or no.
    pub awaiting_confirmation: bool,
    record_turn: bool,
}

impl Reply {
    fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            action: None,
            notification: None,
            awaiting_confirmation: false,
            record_turn: true,
        }
    }

    fn with_action(mut self, action: &str) -> Self {
        self.action = Some(action.to_string());
        self
    }

    fn with_notification(mut self, title: &str, message: impl Into<String>) -> Self {
        self.notification = Some(Notification::new(title, message));
        self
    }

    const fn awaiting(mut self) -> Self {
        self.awaiting_confirmation = true;
        self
    }
}

/// Drives conversation turns against a memory store.
pub struct Assistant {
    llm: Arc<dyn LlmProvider>,
    timezone: String,
    pending: Option<PendingAction>,
}

impl Assistant {
    /// Creates an assistant using the local UTC offset as its timezone.
    #[must_use]
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            llm,
            timezone: chrono::Local::now().offset().to_string(),
            pending: None,
        }
    }

    /// Sets the timezone named in the system prompt.
    #[must_use]
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    /// The action waiting for confirmation, if any.
    #[must_use]
    pub const fn pending(&self) -> Option<&PendingAction> {
        self.pending.as_ref()
    }

    /// Handles one utterance as of `now`.
    ///
    /// Provider failures never fail the turn; they become an apology in the
    /// reply. Storage failures do.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank utterance and
    /// [`Error::Storage`] if the store cannot be written.
    #[instrument(name = "murmur.assistant.turn", skip(self, store, utterance))]
    pub fn handle<B: MemoryBackend>(
        &mut self,
        store: &mut MemoryStore<B>,
        utterance: &str,
        now: NaiveDateTime,
    ) -> Result<Reply> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Err(Error::InvalidInput("utterance is empty".to_string()));
        }

        let reply = match self.pending.take() {
            Some(pending) => Self::resolve_pending(store, pending, utterance)?,
            None => self.interpret(store, utterance, now)?,
        };

        if reply.record_turn {
            store.add(NewRecord::conversation(
                utterance,
                Some(reply.text.clone()),
                reply.action.clone(),
                now,
            ))?;
        }
        store.cleanup(now)?;

        info!(
            action = reply.action.as_deref().unwrap_or("none"),
            awaiting = reply.awaiting_confirmation,
            "Handled utterance"
        );
        Ok(reply)
    }

    fn interpret<B: MemoryBackend>(
        &mut self,
        store: &mut MemoryStore<B>,
        utterance: &str,
        now: NaiveDateTime,
    ) -> Result<Reply> {
        let system = build_system_prompt(now, &self.timezone);
        let user = build_user_prompt(&prompt_context(store, utterance, now), utterance);

        let raw = match self.llm.complete_with_system(&system, &user) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, provider = self.llm.name(), "LLM request failed");
                return Ok(Reply::new(PROVIDER_FAILURE));
            },
        };

        match parse_action(&raw, now) {
            Ok(parsed) => self.execute(store, parsed, now),
            Err(e) => {
                warn!(error = %e, "Could not use LLM reply");
                Ok(Reply::new(NOT_UNDERSTOOD))
            },
        }
    }

    fn execute<B: MemoryBackend>(
        &mut self,
        store: &mut MemoryStore<B>,
        parsed: ParsedAction,
        now: NaiveDateTime,
    ) -> Result<Reply> {
        let action = parsed.intent.action_name();
        let reply = match parsed.intent {
            Intent::SetReminder {
                kind,
                text,
                due_at,
                needs_confirmation,
                confirmation_message,
            } => {
                let record = match kind {
                    RecordKind::Event => NewRecord::event(text, due_at, now),
                    _ => NewRecord::reminder(text, due_at, now),
                };
                if due_at <= now {
                    self.pending = Some(PendingAction::AddRecord(postpone_one_day(record)));
                    Reply::new(PAST_DUE_PROMPT).awaiting()
                } else if needs_confirmation {
                    self.pending = Some(PendingAction::AddRecord(record));
                    Reply::new(confirmation_message.unwrap_or_else(|| {
                        "Would you like me to set this reminder?".to_string()
                    }))
                    .awaiting()
                } else {
                    add_scheduled(store, record)?
                }
            },
            Intent::ReadBackReminders => {
                let text = render::read_back(&store.pending_reminders());
                Reply::new(text.clone()).with_notification("Active Reminders", text)
            },
            Intent::QuerySchedule => Reply::new(render::schedule_summary(&store.weekly_view(now))),
            Intent::ClearReminders => self.request_clear(store, ClearScope::Reminders)?,
            Intent::ClearAllMemory => self.request_clear(store, ClearScope::All)?,
            Intent::RememberFact { content, category } => {
                let record = NewRecord::fact(content.clone(), category, now);
                if store.find_duplicate(&record).is_some() {
                    Reply::new(format!("I already know that {content}."))
                } else {
                    store.add(record)?;
                    Reply::new(format!("I've noted that {content}"))
                        .with_notification("Memory Updated", format!("Remembered: {content}"))
                }
            },
            Intent::UpdateRecord {
                target,
                new_time,
                new_text,
            } => update_scheduled(store, &target, new_time, new_text, now)?,
            Intent::QueryMemory { response } => {
                Reply::new(format!("Based on my records, {response}"))
                    .with_notification("Memory Query", response)
            },
            Intent::GeneralQuery { response } => Reply::new(response),
        };
        Ok(reply.with_action(action))
    }

    fn request_clear<B: MemoryBackend>(
        &mut self,
        store: &mut MemoryStore<B>,
        scope: ClearScope,
    ) -> Result<Reply> {
        match store.clear(scope, false) {
            Ok(_) => Ok(Reply::new(match scope {
                ClearScope::Reminders => "You don't have any reminders to clear.",
                ClearScope::All => "Your memory is already empty.",
            })),
            Err(Error::ConfirmationRequired { scope, affected }) => {
                self.pending = Some(PendingAction::Clear(scope));
                let prompt = match scope {
                    ClearScope::Reminders => {
                        let (noun, pronoun) = if affected == 1 {
                            ("reminder", "it")
                        } else {
                            ("reminders", "them")
                        };
                        format!("I found {affected} {noun}. Would you like me to clear {pronoun}?")
                    },
                    ClearScope::All => format!(
                        "I found {affected} items in your memory. Would you like me to clear \
                         everything? This will remove all reminders, events, facts, and \
                         conversation history."
                    ),
                };
                Ok(Reply::new(prompt).awaiting())
            },
            Err(e) => Err(e),
        }
    }

    fn resolve_pending<B: MemoryBackend>(
        store: &mut MemoryStore<B>,
        pending: PendingAction,
        utterance: &str,
    ) -> Result<Reply> {
        let action = pending.action_name();
        if !is_affirmative(utterance) {
            info!(action, "Pending action declined");
            return Ok(Reply::new(CANCELLED).with_action("cancel"));
        }

        let reply = match pending {
            PendingAction::AddRecord(record) => add_scheduled(store, record)?,
            PendingAction::Clear(scope) => {
                let outcome = store.clear(scope, true)?;
                info!(removed = outcome.removed(), "{}", outcome.summary());
                match scope {
                    ClearScope::Reminders => Reply::new("I've cleared all your reminders.")
                        .with_notification("Reminders Cleared", outcome.summary()),
                    ClearScope::All => {
                        let mut reply =
                            Reply::new("I've cleared all your memories. We're starting fresh.")
                                .with_notification("Memory Cleared", outcome.summary());
                        reply.record_turn = false;
                        reply
                    },
                }
            },
        };
        Ok(reply.with_action(action))
    }
}

fn postpone_one_day(mut record: NewRecord) -> NewRecord {
    match &mut record.payload {
        RecordPayload::Reminder { due_at, .. } => *due_at += TimeDelta::days(1),
        RecordPayload::Event { scheduled_at, .. } => *scheduled_at += TimeDelta::days(1),
        RecordPayload::Fact { .. } | RecordPayload::Conversation { .. } => {},
    }
    record
}

fn add_scheduled<B: MemoryBackend>(store: &mut MemoryStore<B>, record: NewRecord) -> Result<Reply> {
    let kind = record.kind();
    if store.find_duplicate(&record).is_some() {
        let text = match kind {
            RecordKind::Event => {
                "I notice you already have this event scheduled. Would you like me to update it instead?"
            },
            _ => "I notice you already have this reminder set. Would you like me to update it instead?",
        };
        return Ok(Reply::new(text));
    }

    let text = record.text().trim().to_string();
    let when = match &record.payload {
        RecordPayload::Reminder { due_at, .. } => format_spoken(*due_at),
        RecordPayload::Event { scheduled_at, .. } => format_spoken(*scheduled_at),
        RecordPayload::Fact { .. } | RecordPayload::Conversation { .. } => String::new(),
    };
    store.add(record)?;

    let spoken = match kind {
        RecordKind::Event => format!("I've added the event: {text} for {when}"),
        _ => format!("I've set a reminder for {text} at {when}"),
    };
    Ok(Reply::new(spoken).with_notification("Memory Updated", format!("Added {kind}: {text}")))
}

fn update_scheduled<B: MemoryBackend>(
    store: &mut MemoryStore<B>,
    target: &str,
    new_time: Option<NaiveDateTime>,
    new_text: Option<String>,
    now: NaiveDateTime,
) -> Result<Reply> {
    let Some(found) = store.find_scheduled(target) else {
        return Ok(Reply::new(format!(
            "I couldn't find a reminder or event matching \"{target}\"."
        )));
    };
    let id = found.id().clone();
    let text = new_text.clone().unwrap_or_else(|| found.text().to_string());
    let when = new_time.or_else(|| found.scheduled_at());

    let mut update = RecordUpdate::new();
    if let Some(new_text) = new_text {
        update = update.with_text(new_text);
    }
    if let Some(new_time) = new_time {
        update = update.with_scheduled_at(new_time);
    }
    store.update_at(&id, &update, now)?;

    let spoken = when.map_or_else(
        || format!("I've updated it to {text}"),
        |at| format!("I've updated it: {text} at {}", format_spoken(at)),
    );
    Ok(Reply::new(spoken))
}

/// Builds the JSON context document sent with each utterance.
fn prompt_context<B: MemoryBackend>(
    store: &MemoryStore<B>,
    utterance: &str,
    now: NaiveDateTime,
) -> String {
    let memory = store.memory();
    let tail = |len: usize| len.saturating_sub(PROMPT_HISTORY);

    let relevant: Vec<serde_json::Value> = store
        .query_relevant(utterance, store.config().retention.context_window(), now)
        .ranked()
        .iter()
        .map(|m| {
            json!({
                "kind": m.record.kind().as_str(),
                "text": m.record.text(),
                "created_at": format_timestamp(m.record.created_at()),
                "score": m.score,
            })
        })
        .collect();

    let context = json!({
        "current_time": format_timestamp(now),
        "long_term": {
            "reminders": store.pending_reminders(),
            "facts": &memory.facts[tail(memory.facts.len())..],
            "events": &memory.events[tail(memory.events.len())..],
            "conversations": &memory.conversations[tail(memory.conversations.len())..],
        },
        "contextual": store.context(),
        "relevant": relevant,
    });
    serde_json::to_string_pretty(&context).unwrap_or_else(|_| context.to_string())
}
