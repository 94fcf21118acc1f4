//! Spoken replies and terminal displays.
//!
//! Everything here is a pure function of memory and the current time, so the
//! run loop and the CLI print or speak the same text.

use crate::models::time::{format_calendar, format_spoken, format_timestamp};
use crate::models::{RecordKind, Reminder};
use crate::services::{ContextualMemory, WeeklyView};
use crate::storage::LongTermMemory;
use chrono::{NaiveDateTime, TimeDelta};
use std::fmt::Write as _;

/// Summary used when memory holds nothing worth mentioning.
pub const NO_MEMORIES: &str = "No active memories";

/// How far ahead the proactive turn looks, in seconds.
pub const PROACTIVE_HORIZON_SECS: i64 = 3600;

/// Entries shown per section of the intent display.
const DISPLAY_LIMIT: usize = 3;

/// Characters of text shown per intent display entry.
const DISPLAY_WIDTH: usize = 30;

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let cut: String = text.chars().take(width).collect();
    format!("{cut}...")
}

/// One-sentence summary of active memory, e.g.
/// `You have 2 active reminders and You have 1 upcoming event`.
///
/// Returns [`NO_MEMORIES`] when there is nothing to report.
#[must_use]
pub fn memory_summary(memory: &LongTermMemory, now: NaiveDateTime) -> String {
    let mut parts = Vec::new();

    let active = memory.reminders.iter().filter(|r| r.is_pending()).count();
    if active > 0 {
        parts.push(format!("You have {}", plural(active, "active reminder")));
    }

    let recent_facts = memory.facts.len().min(DISPLAY_LIMIT);
    if recent_facts > 0 {
        parts.push(format!("You've shared {}", plural(recent_facts, "recent fact")));
    }

    let upcoming = memory.events.iter().filter(|e| e.scheduled_at > now).count();
    if upcoming > 0 {
        parts.push(format!("You have {}", plural(upcoming, "upcoming event")));
    }

    if parts.is_empty() {
        NO_MEMORIES.to_string()
    } else {
        parts.join(" and ")
    }
}

/// Spoken list of pending reminders, soonest first.
#[must_use]
pub fn read_back(reminders: &[&Reminder]) -> String {
    if reminders.is_empty() {
        return "You don't have any active reminders at the moment.".to_string();
    }
    let items: Vec<String> = reminders
        .iter()
        .map(|r| format!("{} at {}", r.text, format_spoken(r.due_at)))
        .collect();
    format!("Here are your active reminders: {}", items.join("; "))
}

/// Spoken description of the coming week.
#[must_use]
pub fn schedule_summary(view: &WeeklyView) -> String {
    if view.items.is_empty() {
        return "You have nothing scheduled for the coming week.".to_string();
    }
    let items: Vec<String> = view
        .items
        .iter()
        .map(|item| format!("{} on {}", item.text, format_calendar(item.scheduled_at)))
        .collect();
    format!(
        "This week you have {}: {}",
        plural(view.items.len(), "item"),
        items.join("; ")
    )
}

/// What the assistant says when it takes the initiative after a quiet spell.
///
/// Reminders due within the hour come first, then events within the hour,
/// then a general memory summary.
#[must_use]
pub fn proactive_message(memory: &LongTermMemory, now: NaiveDateTime) -> String {
    let horizon = now + TimeDelta::seconds(PROACTIVE_HORIZON_SECS);
    let soon = |at: NaiveDateTime| at > now && at <= horizon;

    let mut reminders: Vec<&Reminder> = memory
        .reminders
        .iter()
        .filter(|r| r.is_pending() && soon(r.due_at))
        .collect();
    reminders.sort_by_key(|r| r.due_at);
    if !reminders.is_empty() {
        let text: Vec<String> = reminders
            .iter()
            .map(|r| format!("{} at {}", r.text, format_spoken(r.due_at)))
            .collect();
        return format!("I wanted to remind you about {}", text.join(" and "));
    }

    let mut events: Vec<_> = memory
        .events
        .iter()
        .filter(|e| soon(e.scheduled_at))
        .collect();
    events.sort_by_key(|e| e.scheduled_at);
    if !events.is_empty() {
        let text: Vec<String> = events
            .iter()
            .map(|e| format!("{} at {}", e.title, format_spoken(e.scheduled_at)))
            .collect();
        return format!("You have upcoming events: {}", text.join(" and "));
    }

    let summary = memory_summary(memory, now);
    if summary == NO_MEMORIES {
        "I'm here if you need anything. How can I assist you?".to_string()
    } else {
        format!("{summary}. Is there anything you need help with?")
    }
}

/// The intent display: current time, upcoming reminders, recent facts and
/// events.
#[must_use]
pub fn intent_display(memory: &LongTermMemory, now: NaiveDateTime) -> String {
    let mut out = String::from("=== Intent Display ===\n");
    let _ = writeln!(out, "Current time: {}", format_timestamp(now));

    let mut upcoming: Vec<&Reminder> = memory
        .reminders
        .iter()
        .filter(|r| r.is_pending() && r.due_at > now)
        .collect();
    upcoming.sort_by_key(|r| r.due_at);
    if !upcoming.is_empty() {
        out.push_str("\nUpcoming Reminders:\n");
        for r in upcoming.iter().take(DISPLAY_LIMIT) {
            let _ = writeln!(
                out,
                "- {} ({})",
                truncate(&r.text, DISPLAY_WIDTH),
                format_timestamp(r.due_at)
            );
        }
        if upcoming.len() > DISPLAY_LIMIT {
            let _ = writeln!(out, "... and {} more", upcoming.len() - DISPLAY_LIMIT);
        }
    }

    let facts = &memory.facts[memory.facts.len().saturating_sub(DISPLAY_LIMIT)..];
    if !facts.is_empty() {
        out.push_str("\nRecent Facts:\n");
        for f in facts {
            let _ = writeln!(out, "- {}", truncate(&f.content, DISPLAY_WIDTH));
        }
    }

    let events = &memory.events[memory.events.len().saturating_sub(DISPLAY_LIMIT)..];
    if !events.is_empty() {
        out.push_str("\nRecent Events:\n");
        for e in events {
            let _ = writeln!(
                out,
                "- {} ({})",
                truncate(&e.title, DISPLAY_WIDTH),
                format_timestamp(e.scheduled_at)
            );
        }
    }

    out.push_str("\n=== End Display ===");
    out
}

/// The weekly calendar.
#[must_use]
pub fn weekly_calendar(view: &WeeklyView) -> String {
    let mut out = String::from("=== Weekly Calendar ===\n");
    let _ = writeln!(out, "Current time: {}", format_timestamp(view.start));
    let _ = writeln!(out, "Through: {}", format_spoken(view.end));
    out.push_str("\nUpcoming events and reminders:\n");

    if view.items.is_empty() {
        out.push_str("No events or reminders scheduled for this week.\n");
    }
    for item in &view.items {
        let label = match item.kind {
            RecordKind::Event => "Event",
            _ => "Reminder",
        };
        let _ = writeln!(
            out,
            "• {}: {label}: {}",
            format_calendar(item.scheduled_at),
            item.text
        );
    }

    if !view.completed_reminders.is_empty() {
        out.push_str("\nCompleted reminders from the past week:\n");
        for r in &view.completed_reminders {
            if let Some(done) = r.completed_at {
                let _ = writeln!(out, "• {}: {}", format_calendar(done), r.text);
            }
        }
    }

    out.push_str("\n=== End Calendar ===");
    out
}

/// The relevant-memories display of the contextual view.
#[must_use]
pub fn relevant_memories(context: &ContextualMemory) -> String {
    let mut out = String::from("=== Relevant Memories ===\n");

    if !context.relevant_facts.is_empty() {
        out.push_str("\nRelated Facts:\n");
        for f in &context.relevant_facts {
            let _ = writeln!(out, "• {}", f.content);
        }
    }
    if !context.upcoming_events.is_empty() {
        out.push_str("\nUpcoming Events (Next 24 Hours):\n");
        for e in &context.upcoming_events {
            let _ = writeln!(out, "• {}: {}", format_spoken(e.scheduled_at), e.title);
        }
    }
    if !context.active_reminders.is_empty() {
        out.push_str("\nActive Reminders:\n");
        for r in &context.active_reminders {
            let _ = writeln!(out, "• {}: {}", format_spoken(r.due_at), r.text);
        }
    }

    out.push_str("\n=== End Memories ===");
    out
}
