//! The persisted memory document.

use crate::models::{
    ConversationTurn, Event, Fact, RecordId, RecordKind, RecordRef, Reminder,
};
use serde::{Deserialize, Serialize};

/// Current on-disk layout version.
pub const DOCUMENT_VERSION: u32 = 1;

/// Everything murmur remembers, as written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryDocument {
    /// Layout version.
    pub version: u32,
    /// Long-term records.
    #[serde(default)]
    pub long_term: LongTermMemory,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self {
            version: DOCUMENT_VERSION,
            long_term: LongTermMemory::default(),
        }
    }
}

impl MemoryDocument {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Long-term records, one list per kind, each in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LongTermMemory {
    /// Reminders.
    #[serde(default)]
    pub reminders: Vec<Reminder>,
    /// Events.
    #[serde(default)]
    pub events: Vec<Event>,
    /// Facts.
    #[serde(default)]
    pub facts: Vec<Fact>,
    /// Conversation turns.
    #[serde(default)]
    pub conversations: Vec<ConversationTurn>,
}

impl LongTermMemory {
    /// Total number of records across all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reminders.len() + self.events.len() + self.facts.len() + self.conversations.len()
    }

    /// Returns true if no records are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of records of one kind.
    #[must_use]
    pub fn count(&self, kind: RecordKind) -> usize {
        match kind {
            RecordKind::Reminder => self.reminders.len(),
            RecordKind::Event => self.events.len(),
            RecordKind::Fact => self.facts.len(),
            RecordKind::Conversation => self.conversations.len(),
        }
    }

    /// Removes every record of one kind, returning how many were removed.
    pub fn clear_kind(&mut self, kind: RecordKind) -> usize {
        let removed = self.count(kind);
        match kind {
            RecordKind::Reminder => self.reminders.clear(),
            RecordKind::Event => self.events.clear(),
            RecordKind::Fact => self.facts.clear(),
            RecordKind::Conversation => self.conversations.clear(),
        }
        removed
    }

    /// Iterates over every record, grouped by kind.
    pub fn records(&self) -> impl Iterator<Item = RecordRef<'_>> + '_ {
        self.reminders
            .iter()
            .map(RecordRef::Reminder)
            .chain(self.events.iter().map(RecordRef::Event))
            .chain(self.facts.iter().map(RecordRef::Fact))
            .chain(self.conversations.iter().map(RecordRef::Conversation))
    }

    /// Looks up a record by identifier.
    #[must_use]
    pub fn find(&self, id: &RecordId) -> Option<RecordRef<'_>> {
        self.records().find(|r| r.id() == id)
    }

    /// Returns true if any record carries `id`.
    #[must_use]
    pub fn contains(&self, id: &RecordId) -> bool {
        self.find(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReminderStatus;
    use chrono::NaiveDate;

    fn sample() -> LongTermMemory {
        let at = NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        LongTermMemory {
            reminders: vec![Reminder {
                id: RecordId::new("r1"),
                text: "call mom".to_string(),
                due_at: at,
                status: ReminderStatus::Pending,
                created_at: at,
                completed_at: None,
            }],
            events: vec![],
            facts: vec![Fact {
                id: RecordId::new("f1"),
                content: "likes tea".to_string(),
                category: None,
                created_at: at,
            }],
            conversations: vec![],
        }
    }

    #[test]
    fn test_find_and_count() {
        let memory = sample();
        assert_eq!(memory.len(), 2);
        assert_eq!(memory.count(RecordKind::Fact), 1);
        assert_eq!(
            memory.find(&RecordId::new("f1")).map(|r| r.kind()),
            Some(RecordKind::Fact)
        );
        assert!(!memory.contains(&RecordId::new("missing")));
    }

    #[test]
    fn test_clear_kind() {
        let mut memory = sample();
        assert_eq!(memory.clear_kind(RecordKind::Reminder), 1);
        assert_eq!(memory.len(), 1);
        assert_eq!(memory.clear_kind(RecordKind::Reminder), 0);
    }

    #[test]
    fn test_document_layout() {
        let doc = MemoryDocument {
            version: DOCUMENT_VERSION,
            long_term: sample(),
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["version"], 1);
        assert_eq!(json["long_term"]["reminders"][0]["text"], "call mom");
        assert!(json["long_term"]["events"].as_array().unwrap().is_empty());
    }
}
