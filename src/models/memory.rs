//! Record types and identifiers.

use super::{RecordKind, ReminderStatus};
use super::time::{option_timestamp, timestamp};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a record ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random ID (UUID v4, simple hex form).
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first eight characters, enough to address a record by voice or CLI.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A timed reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    /// Unique identifier.
    pub id: RecordId,
    /// What to remind the user about.
    pub text: String,
    /// When the reminder is due.
    #[serde(with = "timestamp")]
    pub due_at: NaiveDateTime,
    /// Pending or completed.
    #[serde(default)]
    pub status: ReminderStatus,
    /// Creation time.
    #[serde(with = "timestamp")]
    pub created_at: NaiveDateTime,
    /// When the reminder was completed.
    #[serde(
        default,
        with = "option_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub completed_at: Option<NaiveDateTime>,
}

impl Reminder {
    /// Returns true while the reminder has not been completed.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == ReminderStatus::Pending
    }

    /// Marks the reminder completed at `at`. Completing twice keeps the first time.
    pub fn complete(&mut self, at: NaiveDateTime) {
        if self.is_pending() {
            self.status = ReminderStatus::Completed;
            self.completed_at = Some(at);
        }
    }
}

/// A scheduled event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier.
    pub id: RecordId,
    /// Event title.
    pub title: String,
    /// When the event takes place.
    #[serde(with = "timestamp")]
    pub scheduled_at: NaiveDateTime,
    /// Creation time.
    #[serde(with = "timestamp")]
    pub created_at: NaiveDateTime,
}

/// A statement about the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    /// Unique identifier.
    pub id: RecordId,
    /// The fact itself.
    pub content: String,
    /// Optional category ("personal", "preference", "habit", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Creation time.
    #[serde(with = "timestamp")]
    pub created_at: NaiveDateTime,
}

/// One exchange between the user and the assistant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// Unique identifier.
    pub id: RecordId,
    /// What the user said.
    pub utterance: String,
    /// What the assistant answered, if anything.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// The intent action the utterance resolved to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Creation time.
    #[serde(with = "timestamp")]
    pub created_at: NaiveDateTime,
}

/// Kind-specific content of a record being added.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordPayload {
    /// A reminder.
    Reminder {
        /// What to remind about.
        text: String,
        /// Due time.
        due_at: NaiveDateTime,
    },
    /// An event.
    Event {
        /// Event title.
        title: String,
        /// Scheduled time.
        scheduled_at: NaiveDateTime,
    },
    /// A fact.
    Fact {
        /// Fact content.
        content: String,
        /// Optional category.
        category: Option<String>,
    },
    /// A conversation turn.
    Conversation {
        /// User utterance.
        utterance: String,
        /// Assistant response.
        response: Option<String>,
        /// Resolved action.
        action: Option<String>,
    },
}

/// A record to be added to the store.
///
/// The identifier is optional; the store assigns one when absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    /// Caller-supplied identifier.
    pub id: Option<RecordId>,
    /// Creation time (required).
    pub created_at: NaiveDateTime,
    /// Kind-specific content.
    pub payload: RecordPayload,
}

impl NewRecord {
    /// A new pending reminder.
    #[must_use]
    pub fn reminder(
        text: impl Into<String>,
        due_at: NaiveDateTime,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: None,
            created_at,
            payload: RecordPayload::Reminder {
                text: text.into(),
                due_at,
            },
        }
    }

    /// A new event.
    #[must_use]
    pub fn event(
        title: impl Into<String>,
        scheduled_at: NaiveDateTime,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: None,
            created_at,
            payload: RecordPayload::Event {
                title: title.into(),
                scheduled_at,
            },
        }
    }

    /// A new fact.
    #[must_use]
    pub fn fact(
        content: impl Into<String>,
        category: Option<String>,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: None,
            created_at,
            payload: RecordPayload::Fact {
                content: content.into(),
                category,
            },
        }
    }

    /// A new conversation turn.
    #[must_use]
    pub fn conversation(
        utterance: impl Into<String>,
        response: Option<String>,
        action: Option<String>,
        created_at: NaiveDateTime,
    ) -> Self {
        Self {
            id: None,
            created_at,
            payload: RecordPayload::Conversation {
                utterance: utterance.into(),
                response,
                action,
            },
        }
    }

    /// Sets an explicit identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<RecordId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Returns the kind of record this will become.
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        match self.payload {
            RecordPayload::Reminder { .. } => RecordKind::Reminder,
            RecordPayload::Event { .. } => RecordKind::Event,
            RecordPayload::Fact { .. } => RecordKind::Fact,
            RecordPayload::Conversation { .. } => RecordKind::Conversation,
        }
    }

    /// Returns the primary text of the record.
    #[must_use]
    pub fn text(&self) -> &str {
        match &self.payload {
            RecordPayload::Reminder { text, .. } => text,
            RecordPayload::Event { title, .. } => title,
            RecordPayload::Fact { content, .. } => content,
            RecordPayload::Conversation { utterance, .. } => utterance,
        }
    }
}

/// A borrowed view of any stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordRef<'a> {
    /// A reminder.
    Reminder(&'a Reminder),
    /// An event.
    Event(&'a Event),
    /// A fact.
    Fact(&'a Fact),
    /// A conversation turn.
    Conversation(&'a ConversationTurn),
}

impl<'a> RecordRef<'a> {
    /// Returns the record identifier.
    #[must_use]
    pub const fn id(&self) -> &'a RecordId {
        match self {
            Self::Reminder(r) => &r.id,
            Self::Event(e) => &e.id,
            Self::Fact(f) => &f.id,
            Self::Conversation(c) => &c.id,
        }
    }

    /// Returns the record kind.
    #[must_use]
    pub const fn kind(&self) -> RecordKind {
        match self {
            Self::Reminder(_) => RecordKind::Reminder,
            Self::Event(_) => RecordKind::Event,
            Self::Fact(_) => RecordKind::Fact,
            Self::Conversation(_) => RecordKind::Conversation,
        }
    }

    /// Returns the primary text of the record.
    #[must_use]
    pub fn text(&self) -> &'a str {
        match self {
            Self::Reminder(r) => &r.text,
            Self::Event(e) => &e.title,
            Self::Fact(f) => &f.content,
            Self::Conversation(c) => &c.utterance,
        }
    }

    /// Returns the creation time.
    #[must_use]
    pub const fn created_at(&self) -> NaiveDateTime {
        match self {
            Self::Reminder(r) => r.created_at,
            Self::Event(e) => e.created_at,
            Self::Fact(f) => f.created_at,
            Self::Conversation(c) => c.created_at,
        }
    }

    /// Returns the scheduled time for reminders and events.
    #[must_use]
    pub const fn scheduled_at(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Reminder(r) => Some(r.due_at),
            Self::Event(e) => Some(e.scheduled_at),
            Self::Fact(_) | Self::Conversation(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_generated_ids_are_unique_hex() {
        let a = RecordId::generate();
        let b = RecordId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a.short().len(), 8);
    }

    #[test]
    fn test_reminder_complete_keeps_first_time() {
        let mut reminder = Reminder {
            id: RecordId::new("r1"),
            text: "call mom".to_string(),
            due_at: at(2, 14),
            status: ReminderStatus::Pending,
            created_at: at(1, 9),
            completed_at: None,
        };
        reminder.complete(at(2, 15));
        reminder.complete(at(3, 8));
        assert_eq!(reminder.status, ReminderStatus::Completed);
        assert_eq!(reminder.completed_at, Some(at(2, 15)));
    }

    #[test]
    fn test_reminder_serializes_readable_timestamps() {
        let reminder = Reminder {
            id: RecordId::new("r1"),
            text: "call mom".to_string(),
            due_at: at(2, 14),
            status: ReminderStatus::Pending,
            created_at: at(1, 9),
            completed_at: None,
        };
        let json = serde_json::to_value(&reminder).unwrap();
        assert_eq!(json["due_at"], "2024-01-02 14:00:00");
        assert_eq!(json["status"], "pending");
        assert!(json.get("completed_at").is_none());
    }

    #[test]
    fn test_new_record_kind_and_text() {
        let record = NewRecord::fact("likes tea", Some("preference".into()), at(1, 9));
        assert_eq!(record.kind(), RecordKind::Fact);
        assert_eq!(record.text(), "likes tea");
        assert!(record.id.is_none());
        assert_eq!(record.with_id("f1").id, Some(RecordId::new("f1")));
    }
}
