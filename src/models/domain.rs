//! Record kinds, reminder status, and clear scopes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four kinds of record held in long-term memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    /// A timed reminder that can be completed.
    Reminder,
    /// A scheduled event.
    Event,
    /// A free-text statement about the user.
    Fact,
    /// One utterance/response exchange.
    Conversation,
}

impl RecordKind {
    /// Returns all record kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Reminder, Self::Event, Self::Fact, Self::Conversation]
    }

    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reminder => "reminder",
            Self::Event => "event",
            Self::Fact => "fact",
            Self::Conversation => "conversation",
        }
    }

    /// Returns true if records of this kind carry a scheduled time.
    #[must_use]
    pub const fn is_scheduled(&self) -> bool {
        matches!(self, Self::Reminder | Self::Event)
    }

    /// Parses a kind from a string (singular or plural, case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "reminder" | "reminders" => Some(Self::Reminder),
            "event" | "events" => Some(Self::Event),
            "fact" | "facts" => Some(Self::Fact),
            "conversation" | "conversations" => Some(Self::Conversation),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    /// Not yet fulfilled.
    #[default]
    #[serde(alias = "active")]
    Pending,
    /// Fulfilled, either explicitly or because its due time passed.
    Completed,
}

impl ReminderStatus {
    /// Returns the status as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    /// Parses a status, accepting the legacy `active` spelling.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" | "active" => Some(Self::Pending),
            "completed" | "complete" | "done" => Some(Self::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a destructive clear removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearScope {
    /// Every reminder, pending or completed.
    Reminders,
    /// Every record of every kind.
    All,
}

impl ClearScope {
    /// Returns the scope as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reminders => "reminders",
            Self::All => "all",
        }
    }

    /// Returns true if the scope covers records of `kind`.
    #[must_use]
    pub const fn covers(&self, kind: RecordKind) -> bool {
        match self {
            Self::Reminders => matches!(kind, RecordKind::Reminder),
            Self::All => true,
        }
    }

    /// Parses a scope from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "reminders" | "reminder" => Some(Self::Reminders),
            "all" | "everything" => Some(Self::All),
            _ => None,
        }
    }
}

impl fmt::Display for ClearScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
