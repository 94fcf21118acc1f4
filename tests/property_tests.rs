//! Property-based tests for the memory store.
//!
//! Uses proptest to verify invariants across random inputs:
//! - Cleanup removes exactly the records older than the retention horizon
//! - Clearing reminders never touches other kinds
//! - An unconfirmed clear of everything deletes nothing
//! - Updates to unknown identifiers never change memory
//! - The weekly view only holds items inside its seven-day window

// Property tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{NaiveDateTime, TimeDelta};
use murmur::models::time::parse_timestamp;
use murmur::storage::InMemoryBackend;
use murmur::{ClearScope, MemoryStore, NewRecord, RecordId, RecordUpdate, StoreConfig};
use proptest::prelude::*;

fn base() -> NaiveDateTime {
    parse_timestamp("2024-01-01 09:00:00").unwrap()
}

fn store() -> MemoryStore<InMemoryBackend> {
    MemoryStore::open_at(InMemoryBackend::new(), StoreConfig::default(), base()).unwrap()
}

/// Ages in minutes, up to roughly two years.
fn ages() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(0i64..(2 * 365 * 24 * 60), 0..20)
}

proptest! {
    /// Property: cleanup keeps a record iff it is no older than 365 days.
    #[test]
    fn prop_cleanup_respects_horizon(ages in ages()) {
        let now = base() + TimeDelta::days(800);
        let mut store = store();
        for (i, age) in ages.iter().enumerate() {
            let created = now - TimeDelta::minutes(*age);
            store
                .add(NewRecord::conversation(format!("turn {i}"), None, None, created))
                .unwrap();
        }

        let horizon = TimeDelta::days(365);
        let expected = ages
            .iter()
            .filter(|age| TimeDelta::minutes(**age) <= horizon)
            .count();

        let result = store.cleanup(now).unwrap();
        prop_assert_eq!(store.memory().conversations.len(), expected);
        prop_assert_eq!(result.records_removed(), ages.len() - expected);

        // A second pass removes nothing.
        let again = store.cleanup(now).unwrap();
        prop_assert!(!again.has_changes());
    }

    /// Property: clearing reminders leaves facts and events in place.
    #[test]
    fn prop_clear_reminders_only_touches_reminders(
        reminders in 0usize..8,
        facts in 0usize..8,
        events in 0usize..8,
    ) {
        let now = base();
        let mut store = store();
        for i in 0..reminders {
            store
                .add(NewRecord::reminder(format!("reminder {i}"), now + TimeDelta::hours(1), now))
                .unwrap();
        }
        for i in 0..facts {
            store.add(NewRecord::fact(format!("fact {i}"), None, now)).unwrap();
        }
        for i in 0..events {
            store
                .add(NewRecord::event(format!("event {i}"), now + TimeDelta::hours(2), now))
                .unwrap();
        }

        prop_assert_eq!(store.clear_count(ClearScope::Reminders), reminders);
        let outcome = store.clear(ClearScope::Reminders, true).unwrap();
        prop_assert_eq!(outcome.removed(), reminders);
        prop_assert!(store.memory().reminders.is_empty());
        prop_assert_eq!(store.memory().facts.len(), facts);
        prop_assert_eq!(store.memory().events.len(), events);
    }

    /// Property: clearing everything without confirmation keeps every record
    /// and never writes.
    #[test]
    fn prop_unconfirmed_clear_all_keeps_everything(
        reminders in 0usize..6,
        facts in 0usize..6,
        turns in 0usize..6,
    ) {
        let now = base();
        let backend = InMemoryBackend::new();
        let mut store =
            MemoryStore::open_at(backend.clone(), StoreConfig::default(), now).unwrap();
        for i in 0..reminders {
            store
                .add(NewRecord::reminder(format!("reminder {i}"), now + TimeDelta::hours(1), now))
                .unwrap();
        }
        for i in 0..facts {
            store.add(NewRecord::fact(format!("fact {i}"), None, now)).unwrap();
        }
        for i in 0..turns {
            store
                .add(NewRecord::conversation(format!("turn {i}"), None, None, now))
                .unwrap();
        }
        let total = reminders + facts + turns;
        let before = store.memory().clone();
        let saves = backend.save_count();
        let saved = backend.snapshot();

        let result = store.clear(ClearScope::All, false);
        if total == 0 {
            prop_assert!(result.unwrap().is_empty());
        } else {
            let is_confirmation_required = matches!(
                result,
                Err(murmur::Error::ConfirmationRequired { scope: ClearScope::All, affected })
                    if affected == total
            );
            prop_assert!(is_confirmation_required);
        }
        prop_assert_eq!(store.memory(), &before);
        prop_assert_eq!(backend.save_count(), saves);
        prop_assert_eq!(backend.snapshot(), saved);
    }

    /// Property: updating an unknown identifier fails and changes nothing.
    #[test]
    fn prop_update_unknown_id_changes_nothing(
        id in "[a-z0-9-]{1,24}",
        text in "[a-z ]{1,30}",
    ) {
        let now = base();
        let mut store = store();
        store.add(NewRecord::fact("I like green tea", None, now).with_id("known")).unwrap();
        prop_assume!(id != "known");

        let before = store.memory().clone();
        let result = store.update(&RecordId::new(id), &RecordUpdate::new().with_text(text));
        prop_assert!(matches!(result, Err(murmur::Error::NotFound(_))));
        prop_assert_eq!(store.memory(), &before);
    }

    /// Property: weekly view items fall in `[now, now + 7 days)` and are sorted.
    #[test]
    fn prop_weekly_view_window(offsets in prop::collection::vec(-3i64 * 24..14 * 24, 0..20)) {
        let now = base();
        let mut store = store();
        for (i, hours) in offsets.iter().enumerate() {
            store
                .add(NewRecord::event(format!("event {i}"), now + TimeDelta::hours(*hours), now))
                .unwrap();
        }

        let week = store.weekly_view(now);
        let expected = offsets.iter().filter(|h| (0..7 * 24).contains(*h)).count();
        prop_assert_eq!(week.items.len(), expected);
        for item in &week.items {
            prop_assert!(item.scheduled_at >= now);
            prop_assert!(item.scheduled_at < now + TimeDelta::days(7));
        }
        prop_assert!(week.items.windows(2).all(|w| w[0].scheduled_at <= w[1].scheduled_at));
    }
}
