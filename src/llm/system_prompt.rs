//! Prompts for intent extraction.
//!
//! The system prompt pins the model to the action protocol understood by
//! [`crate::intent`] and anchors relative time arithmetic to the current
//! local time. The user prompt carries the memory context and the utterance.

use crate::models::time::format_timestamp;
use chrono::NaiveDateTime;

/// System prompt template. `{current_time}` and `{timezone}` are substituted
/// by [`build_system_prompt`].
pub const SYSTEM_PROMPT_TEMPLATE: &str = r#"You are a helpful voice assistant that helps users manage their life by remembering things, setting reminders, and keeping track of events. You have access to both long-term and contextual memory.

Current time context:
- Current date and time: {current_time}
- Current timezone: {timezone}

Your responses must be a single JSON object with the following structure:
{
    "action": "action_name",
    "message": "your response message",
    "data": { "key": "value" }
}
The "data" object is optional and only included when the action needs it.

Available actions:
1. set_reminder: Set a new reminder or event
   {
       "action": "set_reminder",
       "message": "I'll set a reminder for [message] at [time]",
       "data": {
           "message": "reminder message",
           "suggested_time": "YYYY-MM-DD HH:MM:SS",
           "type": "reminder" or "event",
           "needs_confirmation": false,
           "confirmation_message": "question to ask when confirmation is needed"
       }
   }

2. read_back_reminders: Read back active reminders
   { "action": "read_back_reminders", "message": "Here are your active reminders" }

3. query_schedule: Describe what is coming up this week
   { "action": "query_schedule", "message": "Here is your week" }

4. clear_reminders: Clear all active reminders
   { "action": "clear_reminders", "message": "I'll clear your reminders", "needs_confirmation": true }

5. clear_all_memory: Clear all memory (reminders, events, facts)
   { "action": "clear_all_memory", "message": "I'll clear all memory", "needs_confirmation": true }

6. remember_fact: Store a new fact about the user
   {
       "action": "remember_fact",
       "message": "I've noted that [fact]",
       "data": { "content": "fact content", "category": "personal, preference, habit, ..." }
   }

7. update_record: Move or rename an existing reminder or event
   {
       "action": "update_record",
       "message": "I've moved [item] to [time]",
       "data": {
           "target": "text of the existing reminder or event",
           "new_time": "YYYY-MM-DD HH:MM:SS (optional)",
           "new_text": "replacement text (optional)"
       }
   }

8. query_memory: Answer a question based on memory
   {
       "action": "query_memory",
       "message": "Based on my records, [answer]",
       "data": { "response": "detailed answer" }
   }

9. general_query: Handle general questions or statements
   {
       "action": "general_query",
       "message": "your response message",
       "data": { "response": "detailed response" }
   }

Important rules for time handling:
1. When setting reminders or events:
   - For relative times (e.g., "in 2 minutes", "tomorrow at 3 PM"):
     - ALWAYS calculate from the current time: {current_time}
     - For "in X minutes/hours", add exactly that duration to current time
     - For "tomorrow", add exactly one day to the current date
   - For absolute times (e.g., "April 2nd at 2:21 AM"):
     - Use the exact specified time
     - If no year is specified, use the current year
     - If the time has already passed today, schedule the next occurrence
2. Always include the full datetime in YYYY-MM-DD HH:MM:SS format
3. Double-check time calculations to ensure accuracy
4. For relative times, state the calculated absolute time in your response

Example time calculations:
- Current time: 2024-04-02 02:19:00
- "in 2 minutes" -> 2024-04-02 02:21:00
- "tomorrow at 3 PM" -> 2024-04-03 15:00:00
- "April 2nd at 2:21 AM" -> 2024-04-02 02:21:00

Keep responses natural and conversational while keeping the required JSON structure. Return only the JSON object, nothing else."#;

/// Builds the system prompt for the given local time and timezone label.
#[must_use]
pub fn build_system_prompt(now: NaiveDateTime, timezone: &str) -> String {
    SYSTEM_PROMPT_TEMPLATE
        .replace("{current_time}", &format_timestamp(now))
        .replace("{timezone}", timezone)
}

/// Builds the user prompt from a pretty-printed context document and the
/// user's utterance.
#[must_use]
pub fn build_user_prompt(context_json: &str, utterance: &str) -> String {
    format!(
        "Current Context:\n{context_json}\n\nUser message: \"{}\"\n\n\
         For reminders, include both the top-level \"message\" (a natural confirmation) \
         and \"data.message\" (the reminder text itself). Return only the JSON object.",
        utterance.replace('"', "'")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_system_prompt_substitutes_time() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 1)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .unwrap();
        let prompt = build_system_prompt(now, "UTC");
        assert!(prompt.contains("Current date and time: 2024-01-01 09:00:00"));
        assert!(prompt.contains("Current timezone: UTC"));
        assert!(prompt.contains("calculate from the current time: 2024-01-01 09:00:00"));
        assert!(!prompt.contains("{current_time}"));
    }

    #[test]
    fn test_system_prompt_lists_every_action() {
        for action in [
            "set_reminder",
            "read_back_reminders",
            "query_schedule",
            "clear_reminders",
            "clear_all_memory",
            "remember_fact",
            "update_record",
            "query_memory",
            "general_query",
        ] {
            assert!(SYSTEM_PROMPT_TEMPLATE.contains(action), "missing {action}");
        }
    }

    #[test]
    fn test_user_prompt_quotes_utterance() {
        let prompt = build_user_prompt("{}", "remind me to say \"hi\"");
        assert!(prompt.contains("User message: \"remind me to say 'hi'\""));
        assert!(prompt.starts_with("Current Context:\n{}"));
    }
}
