//! LLM action envelopes.

use super::time_phrase::parse_time_phrase;
use crate::llm::extract_json_from_response;
use crate::models::RecordKind;
use crate::models::time::parse_timestamp;
use crate::{Error, Result};
use chrono::NaiveDateTime;
use serde::Deserialize;

/// Raw action object returned by the model.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionEnvelope {
    /// Action name, e.g. `set_reminder`.
    pub action: String,
    /// Natural-language message for the user.
    #[serde(default)]
    pub message: String,
    /// Action payload.
    #[serde(default)]
    pub data: Option<ActionData>,
    /// Whether the model wants the user to confirm first.
    #[serde(default)]
    pub needs_confirmation: Option<bool>,
    /// Question to ask when confirmation is needed.
    #[serde(default)]
    pub confirmation_message: Option<String>,
}

/// Union of every action's payload fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ActionData {
    /// Reminder or event text.
    pub message: Option<String>,
    /// Due time, `YYYY-MM-DD HH:MM:SS` or a time phrase.
    pub suggested_time: Option<String>,
    /// `reminder` or `event`.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    /// Per-record confirmation flag.
    pub needs_confirmation: Option<bool>,
    /// Per-record confirmation question.
    pub confirmation_message: Option<String>,
    /// Fact content.
    pub content: Option<String>,
    /// Fact category.
    pub category: Option<String>,
    /// Answer text for queries.
    pub response: Option<String>,
    /// Text of the record to update.
    pub target: Option<String>,
    /// New time for the record to update.
    pub new_time: Option<String>,
    /// New text for the record to update.
    pub new_text: Option<String>,
}

/// A typed user intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Create a reminder or an event.
    SetReminder {
        /// [`RecordKind::Reminder`] or [`RecordKind::Event`].
        kind: RecordKind,
        /// What to be reminded of.
        text: String,
        /// When.
        due_at: NaiveDateTime,
        /// Ask before storing.
        needs_confirmation: bool,
        /// Question to ask when confirming.
        confirmation_message: Option<String>,
    },
    /// Read pending reminders aloud.
    ReadBackReminders,
    /// Describe the coming week.
    QuerySchedule,
    /// Clear reminders (confirmation required).
    ClearReminders,
    /// Clear everything (confirmation required).
    ClearAllMemory,
    /// Store a fact about the user.
    RememberFact {
        /// The fact.
        content: String,
        /// Optional category such as `preference`.
        category: Option<String>,
    },
    /// Move or rename an existing reminder or event.
    UpdateRecord {
        /// Text identifying the record.
        target: String,
        /// New time.
        new_time: Option<NaiveDateTime>,
        /// New text.
        new_text: Option<String>,
    },
    /// Answer from memory.
    QueryMemory {
        /// The answer.
        response: String,
    },
    /// Anything else.
    GeneralQuery {
        /// The answer.
        response: String,
    },
}

impl Intent {
    /// Returns the protocol name of the action.
    #[must_use]
    pub const fn action_name(&self) -> &'static str {
        match self {
            Self::SetReminder { .. } => "set_reminder",
            Self::ReadBackReminders => "read_back_reminders",
            Self::QuerySchedule => "query_schedule",
            Self::ClearReminders => "clear_reminders",
            Self::ClearAllMemory => "clear_all_memory",
            Self::RememberFact { .. } => "remember_fact",
            Self::UpdateRecord { .. } => "update_record",
            Self::QueryMemory { .. } => "query_memory",
            Self::GeneralQuery { .. } => "general_query",
        }
    }
}

/// A parsed model reply: the intent plus the model's own message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAction {
    /// The typed intent.
    pub intent: Intent,
    /// The model's message for the user.
    pub message: String,
}

/// Resolves a timestamp or time phrase produced by the model.
fn resolve_time(raw: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    parse_timestamp(raw).or_else(|| parse_time_phrase(raw, now))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ActionEnvelope {
    /// Parses an envelope out of a raw model reply.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] when the reply holds no valid action object.
    pub fn from_response(response: &str) -> Result<Self> {
        let json = extract_json_from_response(response);
        let envelope: Self = serde_json::from_str(json)
            .map_err(|e| Error::provider("llm", format!("invalid action JSON: {e}")))?;
        if envelope.action.trim().is_empty() {
            return Err(Error::provider("llm", "reply has no action"));
        }
        Ok(envelope)
    }

    /// Converts the envelope into a typed intent, resolving times against `now`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for unknown actions, missing required
    /// fields, or times that cannot be understood.
    pub fn into_action(self, now: NaiveDateTime) -> Result<ParsedAction> {
        let data = self.data.unwrap_or_default();
        let message = self.message.trim().to_string();

        let intent = match self.action.trim() {
            "set_reminder" => {
                let text = non_empty(data.message)
                    .ok_or_else(|| Error::InvalidInput("reminder has no text".to_string()))?;
                let raw_time = non_empty(data.suggested_time)
                    .ok_or_else(|| Error::InvalidInput("reminder has no time".to_string()))?;
                let due_at = resolve_time(&raw_time, now).ok_or_else(|| {
                    Error::InvalidInput(format!("could not understand the time '{raw_time}'"))
                })?;
                let kind = match data.kind.as_deref().map(str::trim) {
                    Some(k) if k.eq_ignore_ascii_case("event") => RecordKind::Event,
                    _ => RecordKind::Reminder,
                };
                Intent::SetReminder {
                    kind,
                    text,
                    due_at,
                    needs_confirmation: data
                        .needs_confirmation
                        .or(self.needs_confirmation)
                        .unwrap_or(false),
                    confirmation_message: non_empty(data.confirmation_message)
                        .or_else(|| non_empty(self.confirmation_message)),
                }
            },
            "read_back_reminders" => Intent::ReadBackReminders,
            "query_schedule" => Intent::QuerySchedule,
            "clear_reminders" => Intent::ClearReminders,
            "clear_all_memory" => Intent::ClearAllMemory,
            "remember_fact" => Intent::RememberFact {
                content: non_empty(data.content)
                    .ok_or_else(|| Error::InvalidInput("fact has no content".to_string()))?,
                category: non_empty(data.category),
            },
            "update_record" => {
                let target = non_empty(data.target)
                    .ok_or_else(|| Error::InvalidInput("update has no target".to_string()))?;
                let new_time = match non_empty(data.new_time) {
                    Some(raw) => Some(resolve_time(&raw, now).ok_or_else(|| {
                        Error::InvalidInput(format!("could not understand the time '{raw}'"))
                    })?),
                    None => None,
                };
                let new_text = non_empty(data.new_text);
                if new_time.is_none() && new_text.is_none() {
                    return Err(Error::InvalidInput("update changes nothing".to_string()));
                }
                Intent::UpdateRecord {
                    target,
                    new_time,
                    new_text,
                }
            },
            "query_memory" => Intent::QueryMemory {
                response: non_empty(data.response).unwrap_or_else(|| message.clone()),
            },
            "general_query" => Intent::GeneralQuery {
                response: non_empty(data.response).unwrap_or_else(|| message.clone()),
            },
            other => return Err(Error::InvalidInput(format!("unknown action '{other}'"))),
        };

        Ok(ParsedAction { intent, message })
    }
}

/// Parses a raw model reply into a typed action.
///
/// # Errors
///
/// Returns [`Error::Provider`] for malformed replies and
/// [`Error::InvalidInput`] for replies that do not describe a usable action.
pub fn parse_action(response: &str, now: NaiveDateTime) -> Result<ParsedAction> {
    ActionEnvelope::from_response(response)?.into_action(now)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        parse_timestamp("2024-01-01 09:00:00").unwrap()
    }

    #[test]
    fn test_set_reminder() {
        let reply = r#"{
            "action": "set_reminder",
            "message": "I'll remind you to call mom tomorrow at 2 PM",
            "data": {"message": "call mom", "suggested_time": "2024-01-02 14:00:00", "type": "reminder"}
        }"#;
        let parsed = parse_action(reply, now()).unwrap();
        assert_eq!(
            parsed.intent,
            Intent::SetReminder {
                kind: RecordKind::Reminder,
                text: "call mom".to_string(),
                due_at: parse_timestamp("2024-01-02 14:00:00").unwrap(),
                needs_confirmation: false,
                confirmation_message: None,
            }
        );
        assert!(parsed.message.starts_with("I'll remind you"));
    }

    #[test]
    fn test_set_event_with_phrase_time_in_fence() {
        let reply = "```json\n{\"action\": \"set_reminder\", \"message\": \"ok\", \"data\": {\"message\": \"dentist\", \"suggested_time\": \"on friday at 9am\", \"type\": \"Event\"}}\n```";
        let parsed = parse_action(reply, now()).unwrap();
        let Intent::SetReminder { kind, due_at, .. } = parsed.intent else {
            panic!("expected set_reminder");
        };
        assert_eq!(kind, RecordKind::Event);
        assert_eq!(due_at, parse_timestamp("2024-01-05 09:00:00").unwrap());
    }

    #[test]
    fn test_set_reminder_bad_time() {
        let reply = r#"{"action": "set_reminder", "data": {"message": "x", "suggested_time": "someday"}}"#;
        assert!(matches!(parse_action(reply, now()), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_simple_actions() {
        for (name, expected) in [
            ("read_back_reminders", Intent::ReadBackReminders),
            ("query_schedule", Intent::QuerySchedule),
            ("clear_reminders", Intent::ClearReminders),
            ("clear_all_memory", Intent::ClearAllMemory),
        ] {
            let reply = format!(r#"{{"action": "{name}", "message": "m", "needs_confirmation": true}}"#);
            let parsed = parse_action(&reply, now()).unwrap();
            assert_eq!(parsed.intent, expected);
            assert_eq!(parsed.intent.action_name(), name);
        }
    }

    #[test]
    fn test_remember_fact() {
        let reply = r#"{"action": "remember_fact", "message": "Noted", "data": {"content": "I like green tea", "category": "preference"}}"#;
        let parsed = parse_action(reply, now()).unwrap();
        assert_eq!(
            parsed.intent,
            Intent::RememberFact {
                content: "I like green tea".to_string(),
                category: Some("preference".to_string()),
            }
        );
    }

    #[test]
    fn test_update_record() {
        let reply = r#"{"action": "update_record", "data": {"target": "call mom", "new_time": "tomorrow at 5 pm"}}"#;
        let parsed = parse_action(reply, now()).unwrap();
        assert_eq!(
            parsed.intent,
            Intent::UpdateRecord {
                target: "call mom".to_string(),
                new_time: parse_timestamp("2024-01-02 17:00:00"),
                new_text: None,
            }
        );

        let empty = r#"{"action": "update_record", "data": {"target": "call mom"}}"#;
        assert!(parse_action(empty, now()).is_err());
    }

    #[test]
    fn test_queries_fall_back_to_message() {
        let reply = r#"{"action": "general_query", "message": "Hello there"}"#;
        let parsed = parse_action(reply, now()).unwrap();
        assert_eq!(
            parsed.intent,
            Intent::GeneralQuery {
                response: "Hello there".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_replies() {
        assert!(matches!(
            parse_action("I don't know", now()),
            Err(Error::Provider { .. })
        ));
        assert!(matches!(
            parse_action(r#"{"message": "no action"}"#, now()),
            Err(Error::Provider { .. })
        ));
        assert!(matches!(
            parse_action(r#"{"action": "dance"}"#, now()),
            Err(Error::InvalidInput(_))
        ));
    }
}
