//! Decoding of current and legacy memory file layouts.
//!
//! Three layouts are recognised:
//!
//! | Layout | Detection | Record fields |
//! |--------|-----------|---------------|
//! | Current | top-level `version` | see [`MemoryDocument`] |
//! | Nested | top-level `long_term` (with optional `contextual`) | `message`, `datetime`, `description`, `timestamp` |
//! | Flat | top-level `reminders`, `events`, `facts` or `conversations` | same as nested |
//!
//! An object matching none of these is refused so an unrelated JSON file is
//! never mistaken for an empty memory and overwritten.
//!
//! Legacy records have no identifiers; one is generated for each. A legacy
//! record whose timestamps cannot be parsed is skipped with a warning rather
//! than failing the whole load. [`super::JsonFileBackend`] keeps a copy of
//! the legacy file, so skipped records are not lost. The `contextual` section and `preferences`
//! map of older files are derived data and are dropped.

use super::{DOCUMENT_VERSION, LongTermMemory, MemoryDocument};
use crate::models::time::parse_timestamp;
use crate::models::{ConversationTurn, Event, Fact, RecordId, Reminder, ReminderStatus};
use crate::{Error, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Record lists a flat legacy file may hold.
const FLAT_KEYS: &[&str] = &["reminders", "events", "facts", "conversations"];

/// Which layout a file was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// The versioned layout.
    Current,
    /// `{"long_term": {...}, "contextual": {...}}`.
    Nested,
    /// `{"reminders": [...], "facts": [...], ...}`.
    Flat,
}

impl Layout {
    /// Returns true for layouts that need rewriting on next save.
    #[must_use]
    pub const fn is_legacy(self) -> bool {
        !matches!(self, Self::Current)
    }
}

/// Decodes a memory file's contents in any recognised layout.
///
/// # Errors
///
/// Returns [`Error::Storage`] if the text is not JSON, is not an object, is
/// an object in no recognised layout, or a current-layout document fails to
/// deserialize.
pub fn decode(raw: &str) -> Result<(MemoryDocument, Layout)> {
    let value: Value =
        serde_json::from_str(raw).map_err(|e| Error::storage("parse_memory_file", e))?;
    let Value::Object(map) = value else {
        return Err(Error::storage(
            "parse_memory_file",
            "top-level value is not an object",
        ));
    };

    if map.contains_key("version") {
        let document: MemoryDocument = serde_json::from_value(Value::Object(map))
            .map_err(|e| Error::storage("deserialize_memory", e))?;
        if document.version > DOCUMENT_VERSION {
            tracing::warn!(
                version = document.version,
                supported = DOCUMENT_VERSION,
                "Memory file was written by a newer version"
            );
        }
        return Ok((document, Layout::Current));
    }

    let mut map = map;
    let (section, layout) = match map.remove("long_term") {
        Some(Value::Object(long_term)) => (long_term, Layout::Nested),
        Some(_) => {
            return Err(Error::storage(
                "parse_memory_file",
                "`long_term` is not an object",
            ));
        },
        None if map.is_empty() || FLAT_KEYS.iter().any(|k| map.contains_key(*k)) => {
            (map, Layout::Flat)
        },
        None => {
            return Err(Error::storage(
                "parse_memory_file",
                "unrecognised memory layout",
            ));
        },
    };

    let long_term = LongTermMemory {
        reminders: convert_all::<LegacyReminder, _>(&section, "reminders"),
        events: convert_all::<LegacyEvent, _>(&section, "events"),
        facts: convert_all::<LegacyFact, _>(&section, "facts"),
        conversations: convert_all::<LegacyConversation, _>(&section, "conversations"),
    };

    tracing::info!(
        layout = ?layout,
        records = long_term.len(),
        "Imported legacy memory layout"
    );

    Ok((
        MemoryDocument {
            version: DOCUMENT_VERSION,
            long_term,
        },
        layout,
    ))
}

/// A legacy record that can be upgraded to a current record.
trait Upgrade {
    type Output;

    fn upgrade(self) -> Option<Self::Output>;
}

fn convert_all<L, T>(section: &serde_json::Map<String, Value>, key: &str) -> Vec<T>
where
    L: DeserializeOwned + Upgrade<Output = T>,
{
    let Some(Value::Array(items)) = section.get(key) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let upgraded = serde_json::from_value::<L>(item.clone())
                .ok()
                .and_then(Upgrade::upgrade);
            if upgraded.is_none() {
                tracing::warn!(kind = key, record = %item, "Skipping unreadable legacy record");
            }
            upgraded
        })
        .collect()
}

fn legacy_id(id: Option<String>) -> RecordId {
    id.filter(|s| !s.trim().is_empty())
        .map_or_else(RecordId::generate, RecordId::new)
}

#[derive(Deserialize)]
struct LegacyReminder {
    id: Option<String>,
    #[serde(alias = "message")]
    text: String,
    #[serde(alias = "datetime")]
    due_at: String,
    status: Option<String>,
    created_at: Option<String>,
    completed_at: Option<String>,
}

impl Upgrade for LegacyReminder {
    type Output = Reminder;

    fn upgrade(self) -> Option<Reminder> {
        let due_at = parse_timestamp(&self.due_at)?;
        let status = self
            .status
            .as_deref()
            .and_then(ReminderStatus::parse)
            .unwrap_or_default();
        let completed_at = self.completed_at.as_deref().and_then(parse_timestamp);
        Some(Reminder {
            id: legacy_id(self.id),
            text: self.text,
            due_at,
            status,
            created_at: self
                .created_at
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or(due_at),
            completed_at: match status {
                ReminderStatus::Completed => completed_at.or(Some(due_at)),
                ReminderStatus::Pending => None,
            },
        })
    }
}

#[derive(Deserialize)]
struct LegacyEvent {
    id: Option<String>,
    #[serde(alias = "description")]
    title: String,
    #[serde(alias = "datetime")]
    scheduled_at: String,
    created_at: Option<String>,
}

impl Upgrade for LegacyEvent {
    type Output = Event;

    fn upgrade(self) -> Option<Event> {
        let scheduled_at = parse_timestamp(&self.scheduled_at)?;
        Some(Event {
            id: legacy_id(self.id),
            title: self.title,
            scheduled_at,
            created_at: self
                .created_at
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or(scheduled_at),
        })
    }
}

#[derive(Deserialize)]
struct LegacyFact {
    id: Option<String>,
    content: String,
    category: Option<String>,
    #[serde(alias = "timestamp")]
    created_at: String,
}

impl Upgrade for LegacyFact {
    type Output = Fact;

    fn upgrade(self) -> Option<Fact> {
        Some(Fact {
            id: legacy_id(self.id),
            content: self.content,
            category: self.category,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

#[derive(Deserialize)]
struct LegacyConversation {
    id: Option<String>,
    #[serde(alias = "text")]
    utterance: String,
    response: Option<String>,
    action: Option<String>,
    #[serde(alias = "timestamp")]
    created_at: String,
}

impl Upgrade for LegacyConversation {
    type Output = ConversationTurn;

    fn upgrade(self) -> Option<ConversationTurn> {
        Some(ConversationTurn {
            id: legacy_id(self.id),
            utterance: self.utterance,
            response: self.response,
            action: self.action,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}
