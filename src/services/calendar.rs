//! The weekly calendar view.

use crate::models::{RecordId, RecordKind, Reminder};
use crate::storage::LongTermMemory;
use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;

/// Length of the calendar window in days.
pub const WEEK_DAYS: i64 = 7;

/// An event or pending reminder placed on the calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledItem {
    /// Record identifier.
    pub id: RecordId,
    /// [`RecordKind::Event`] or [`RecordKind::Reminder`].
    pub kind: RecordKind,
    /// Event title or reminder text.
    pub text: String,
    /// When it happens.
    #[serde(with = "crate::models::time::timestamp")]
    pub scheduled_at: NaiveDateTime,
}

/// What the coming week holds.
///
/// `items` covers `[start, end)` in ascending time order (events before
/// reminders at the same instant); `completed_reminders` lists reminders
/// completed in the week before `start`, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeeklyView {
    /// Window start (the reference time).
    #[serde(with = "crate::models::time::timestamp")]
    pub start: NaiveDateTime,
    /// Window end, exclusive.
    #[serde(with = "crate::models::time::timestamp")]
    pub end: NaiveDateTime,
    /// Scheduled events and pending reminders.
    pub items: Vec<ScheduledItem>,
    /// Recently completed reminders.
    pub completed_reminders: Vec<Reminder>,
}

impl WeeklyView {
    /// Builds the view for the week starting at `now`.
    #[must_use]
    pub fn build(memory: &LongTermMemory, now: NaiveDateTime) -> Self {
        let week = TimeDelta::days(WEEK_DAYS);
        let end = now.checked_add_signed(week).unwrap_or(NaiveDateTime::MAX);
        let in_window = |at: NaiveDateTime| at >= now && at < end;

        let events = memory
            .events
            .iter()
            .filter(|e| in_window(e.scheduled_at))
            .map(|e| ScheduledItem {
                id: e.id.clone(),
                kind: RecordKind::Event,
                text: e.title.clone(),
                scheduled_at: e.scheduled_at,
            });
        let reminders = memory
            .reminders
            .iter()
            .filter(|r| r.is_pending() && in_window(r.due_at))
            .map(|r| ScheduledItem {
                id: r.id.clone(),
                kind: RecordKind::Reminder,
                text: r.text.clone(),
                scheduled_at: r.due_at,
            });

        let mut items: Vec<ScheduledItem> = events.chain(reminders).collect();
        items.sort_by_key(|item| item.scheduled_at);

        let completed_since = now.checked_sub_signed(week).unwrap_or(NaiveDateTime::MIN);
        let mut completed_reminders: Vec<Reminder> = memory
            .reminders
            .iter()
            .filter(|r| {
                r.completed_at
                    .is_some_and(|done| done >= completed_since && done < now)
            })
            .cloned()
            .collect();
        completed_reminders.sort_by_key(|r| r.completed_at);

        Self {
            start: now,
            end,
            items,
            completed_reminders,
        }
    }

    /// Returns true if nothing is scheduled or recently completed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.completed_reminders.is_empty()
    }

    /// Number of scheduled items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::time::parse_timestamp;
    use crate::models::{Event, ReminderStatus};

    fn at(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    fn reminder(id: &str, due: &str, status: ReminderStatus, done: Option<&str>) -> Reminder {
        Reminder {
            id: RecordId::new(id),
            text: id.to_string(),
            due_at: at(due),
            status,
            created_at: at("2023-12-20 00:00:00"),
            completed_at: done.map(at),
        }
    }

    fn event(id: &str, scheduled: &str) -> Event {
        Event {
            id: RecordId::new(id),
            title: id.to_string(),
            scheduled_at: at(scheduled),
            created_at: at("2023-12-20 00:00:00"),
        }
    }

    #[test]
    fn test_window_bounds_and_order() {
        let now = at("2024-01-01 09:00:00");
        let memory = LongTermMemory {
            reminders: vec![
                reminder("r-late", "2024-01-05 10:00:00", ReminderStatus::Pending, None),
                reminder("r-edge", "2024-01-08 09:00:00", ReminderStatus::Pending, None),
                reminder("r-now", "2024-01-01 09:00:00", ReminderStatus::Pending, None),
                reminder("r-done", "2024-01-03 09:00:00", ReminderStatus::Completed, Some("2023-12-31 12:00:00")),
                reminder("r-old-done", "2023-12-01 09:00:00", ReminderStatus::Completed, Some("2023-12-01 09:00:00")),
            ],
            events: vec![
                event("e-past", "2023-12-31 09:00:00"),
                event("e-mid", "2024-01-03 18:00:00"),
                event("e-same", "2024-01-05 10:00:00"),
            ],
            ..LongTermMemory::default()
        };

        let view = WeeklyView::build(&memory, now);
        let ids: Vec<&str> = view.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["r-now", "e-mid", "e-same", "r-late"]);
        assert_eq!(view.end, at("2024-01-08 09:00:00"));

        let done: Vec<&str> = view.completed_reminders.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(done, vec!["r-done"]);
        assert_eq!(view.len(), 4);
        assert!(!view.is_empty());
    }

    #[test]
    fn test_empty_week() {
        let view = WeeklyView::build(&LongTermMemory::default(), at("2024-01-01 09:00:00"));
        assert!(view.is_empty());
    }
}
