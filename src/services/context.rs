//! Contextual memory.
//!
//! A bounded, time-windowed view derived from long-term memory. It is never
//! persisted; the store rebuilds it after every mutation and cleanup.

use crate::gc::RetentionConfig;
use crate::models::{ConversationTurn, Event, Fact, Reminder};
use crate::relevance::RelevanceScorer;
use crate::storage::LongTermMemory;
use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;
use std::cmp::Ordering;

/// How far ahead an event counts as upcoming.
pub const UPCOMING_EVENT_HOURS: i64 = 24;

/// How many recent conversation turns steer fact relevance.
pub const TOPIC_CONVERSATIONS: usize = 5;

/// The recent slice of memory used to ground the assistant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextualMemory {
    /// Conversation turns inside the context window, oldest first.
    pub recent_conversations: Vec<ConversationTurn>,
    /// Facts related to the most recent conversation turns.
    pub relevant_facts: Vec<Fact>,
    /// Events in the next 24 hours, soonest first.
    pub upcoming_events: Vec<Event>,
    /// Pending reminders, soonest first.
    pub active_reminders: Vec<Reminder>,
    /// When the view was built.
    #[serde(skip)]
    pub built_at: Option<NaiveDateTime>,
}

impl ContextualMemory {
    /// Builds the view from long-term memory as of `now`.
    #[must_use]
    pub fn build(
        memory: &LongTermMemory,
        now: NaiveDateTime,
        config: &RetentionConfig,
        scorer: &dyn RelevanceScorer,
    ) -> Self {
        let window_start = now
            .checked_sub_signed(config.context_window())
            .unwrap_or(NaiveDateTime::MIN);

        let mut recent_conversations: Vec<ConversationTurn> = memory
            .conversations
            .iter()
            .filter(|c| c.created_at >= window_start)
            .cloned()
            .collect();
        recent_conversations.sort_by_key(|c| c.created_at);
        let excess = recent_conversations
            .len()
            .saturating_sub(config.max_context_conversations);
        recent_conversations.drain(..excess);

        let horizon = now
            .checked_add_signed(TimeDelta::hours(UPCOMING_EVENT_HOURS))
            .unwrap_or(NaiveDateTime::MAX);
        let mut upcoming_events: Vec<Event> = memory
            .events
            .iter()
            .filter(|e| e.scheduled_at >= now && e.scheduled_at < horizon)
            .cloned()
            .collect();
        upcoming_events.sort_by_key(|e| e.scheduled_at);

        let mut active_reminders: Vec<Reminder> = memory
            .reminders
            .iter()
            .filter(|r| r.is_pending())
            .cloned()
            .collect();
        active_reminders.sort_by_key(|r| r.due_at);

        let topic = recent_conversations
            .iter()
            .rev()
            .take(TOPIC_CONVERSATIONS)
            .map(|c| c.utterance.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let relevant_facts = relevant_facts(memory, &topic, scorer, config.max_relevant_facts);

        Self {
            recent_conversations,
            relevant_facts,
            upcoming_events,
            active_reminders,
            built_at: Some(now),
        }
    }

    /// Total number of entries in the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recent_conversations.len()
            + self.relevant_facts.len()
            + self.upcoming_events.len()
            + self.active_reminders.len()
    }

    /// Returns true if the view holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn relevant_facts(
    memory: &LongTermMemory,
    topic: &str,
    scorer: &dyn RelevanceScorer,
    limit: usize,
) -> Vec<Fact> {
    if topic.trim().is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(f32, &Fact)> = memory
        .facts
        .iter()
        .map(|f| (scorer.score(topic, &f.content), f))
        .filter(|(score, _)| *score > 0.0)
        .collect();
    // Stable: equal scores keep store order.
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.into_iter().take(limit).map(|(_, f)| f.clone()).collect()
}
