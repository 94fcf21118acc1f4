//! Background reminder checks.
//!
//! [`ReminderScheduler::tick`] is the synchronous unit of work: it completes
//! overdue reminders, picks out reminders coming due within the lead time,
//! and flushes the store when write-back persistence is in use.
//! [`run_scheduler`] drives it from a tokio interval until shutdown.

use super::memory_store::MemoryStore;
use crate::config::SchedulerConfig;
use crate::models::time::{format_spoken, local_now};
use crate::models::{RecordId, Reminder};
use crate::speech::Notifier;
use crate::storage::MemoryBackend;
use crate::Result;
use chrono::NaiveDateTime;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, instrument, warn};

/// Notification title for reminders that just came due.
pub const DUE_TITLE: &str = "Reminder";

/// Notification title for reminders coming up soon.
pub const UPCOMING_TITLE: &str = "Upcoming Reminder";

/// What a single scheduler tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Reminders that passed their due time and were completed.
    pub completed: Vec<Reminder>,
    /// Reminders due within the lead time, announced for the first time.
    pub due_soon: Vec<Reminder>,
    /// Whether pending changes were flushed.
    pub flushed: bool,
}

impl TickReport {
    /// Returns true if the tick changed or announced nothing.
    #[must_use]
    pub fn is_quiet(&self) -> bool {
        self.completed.is_empty() && self.due_soon.is_empty() && !self.flushed
    }

    /// Notifications to deliver, as `(title, message)` pairs.
    #[must_use]
    pub fn notifications(&self) -> Vec<(&'static str, String)> {
        let due = self
            .completed
            .iter()
            .map(|r| (DUE_TITLE, r.text.clone()));
        let soon = self.due_soon.iter().map(|r| {
            (
                UPCOMING_TITLE,
                format!("{} at {}", r.text, format_spoken(r.due_at)),
            )
        });
        due.chain(soon).collect()
    }
}

/// Tracks which reminders have been announced between ticks.
#[derive(Debug, Clone)]
pub struct ReminderScheduler {
    config: SchedulerConfig,
    announced: HashSet<RecordId>,
    last_flush: Option<NaiveDateTime>,
}

impl ReminderScheduler {
    /// Creates a scheduler.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            announced: HashSet::new(),
            last_flush: None,
        }
    }

    /// The scheduler configuration.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Interval between ticks.
    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.config.check_interval_secs.max(1))
    }

    /// Runs one check as of `now`.
    ///
    /// A reminder is announced as due soon at most once. Reminders that are
    /// no longer pending are forgotten so the set stays bounded.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] if completing overdue reminders or
    /// flushing fails.
    #[instrument(name = "murmur.scheduler.tick", skip(self, store))]
    pub fn tick<B: MemoryBackend>(
        &mut self,
        store: &mut MemoryStore<B>,
        now: NaiveDateTime,
    ) -> Result<TickReport> {
        let completed = store.complete_overdue(now)?;

        let lead = self.config.notify_lead();
        let horizon = now.checked_add_signed(lead).unwrap_or(NaiveDateTime::MAX);
        let pending = store.pending_reminders();
        let due_soon: Vec<Reminder> = pending
            .iter()
            .filter(|r| r.due_at > now && r.due_at <= horizon)
            .filter(|r| !self.announced.contains(&r.id))
            .map(|r| (*r).clone())
            .collect();

        let still_pending: HashSet<&RecordId> = pending.iter().map(|r| &r.id).collect();
        self.announced.retain(|id| still_pending.contains(id));
        self.announced.extend(due_soon.iter().map(|r| r.id.clone()));

        let flushed = self.flush_if_due(store, now)?;

        let report = TickReport {
            completed,
            due_soon,
            flushed,
        };
        if report.is_quiet() {
            debug!("Scheduler tick: nothing to do");
        } else {
            info!(
                completed = report.completed.len(),
                due_soon = report.due_soon.len(),
                flushed = report.flushed,
                "Scheduler tick"
            );
        }
        metrics::counter!("murmur_scheduler_ticks_total").increment(1);
        Ok(report)
    }

    fn flush_if_due<B: MemoryBackend>(
        &mut self,
        store: &mut MemoryStore<B>,
        now: NaiveDateTime,
    ) -> Result<bool> {
        if !store.is_dirty() {
            return Ok(false);
        }
        let interval = self.config.flush_interval();
        let due = self
            .last_flush
            .is_none_or(|last| now.signed_duration_since(last) >= interval);
        if !due {
            return Ok(false);
        }
        let flushed = store.flush()?;
        self.last_flush = Some(now);
        Ok(flushed)
    }
}

/// Runs the scheduler until `shutdown` flips to `true` or its sender drops.
///
/// Tick failures are logged and retried on the next interval. Notifications
/// are delivered on the blocking pool after the store lock is released;
/// failures are logged and otherwise ignored.
pub async fn run_scheduler<B>(
    store: Arc<Mutex<MemoryStore<B>>>,
    notifier: Arc<dyn Notifier>,
    config: SchedulerConfig,
    mut shutdown: watch::Receiver<bool>,
) where
    B: MemoryBackend + 'static,
{
    let mut scheduler = ReminderScheduler::new(config);
    let mut interval = tokio::time::interval(scheduler.check_interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    info!(
        interval_secs = scheduler.check_interval().as_secs(),
        "Reminder scheduler started"
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {},
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            },
        }

        let report = {
            let mut guard = store.lock().await;
            scheduler.tick(&mut *guard, local_now())
        };

        match report {
            Ok(report) => {
                let notifications = report.notifications();
                if notifications.is_empty() {
                    continue;
                }
                let notifier = Arc::clone(&notifier);
                let delivery = tokio::task::spawn_blocking(move || {
                    deliver(notifier.as_ref(), &notifications);
                });
                if let Err(e) = delivery.await {
                    warn!(error = %e, "Notification delivery task failed");
                }
            },
            Err(e) => {
                warn!(error = %e, "Scheduler tick failed");
                metrics::counter!("murmur_scheduler_errors_total").increment(1);
            },
        }
    }

    info!("Reminder scheduler stopped");
}

fn deliver(notifier: &dyn Notifier, notifications: &[(&'static str, String)]) {
    for (title, message) in notifications {
        if let Err(e) = notifier.notify(title, message) {
            warn!(error = %e, title, "Failed to deliver notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewRecord;
    use crate::models::time::parse_timestamp;
    use crate::services::StoreConfig;
    use crate::storage::InMemoryBackend;

    fn at(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    fn store_with(
        backend: &InMemoryBackend,
        write_through: bool,
        reminders: &[(&str, &str)],
    ) -> MemoryStore<InMemoryBackend> {
        let mut store = MemoryStore::open_at(
            backend.clone(),
            StoreConfig::default().with_write_through(write_through),
            at("2024-01-01 09:00:00"),
        )
        .unwrap();
        for (text, due) in reminders {
            store
                .add(NewRecord::reminder(*text, at(due), at("2024-01-01 08:00:00")))
                .unwrap();
        }
        store
    }

    #[test]
    fn test_tick_completes_and_announces_once() {
        let backend = InMemoryBackend::new();
        let mut store = store_with(
            &backend,
            true,
            &[
                ("stretch", "2024-01-01 08:59:00"),
                ("call mom", "2024-01-01 09:04:00"),
                ("dentist", "2024-01-01 11:00:00"),
            ],
        );
        let mut scheduler = ReminderScheduler::new(SchedulerConfig::default());

        let report = scheduler.tick(&mut store, at("2024-01-01 09:00:00")).unwrap();
        assert_eq!(report.completed.len(), 1);
        assert_eq!(report.completed[0].text, "stretch");
        assert_eq!(report.due_soon.len(), 1);
        assert_eq!(report.due_soon[0].text, "call mom");

        let notes = report.notifications();
        assert_eq!(notes[0], (DUE_TITLE, "stretch".to_string()));
        assert_eq!(notes[1].0, UPCOMING_TITLE);
        assert!(notes[1].1.starts_with("call mom at January 01"));

        let again = scheduler.tick(&mut store, at("2024-01-01 09:00:30")).unwrap();
        assert!(again.is_quiet());

        let later = scheduler.tick(&mut store, at("2024-01-01 09:05:00")).unwrap();
        assert_eq!(later.completed.len(), 1);
        assert!(later.due_soon.is_empty());
    }

    #[test]
    fn test_tick_flushes_write_back_store() {
        let backend = InMemoryBackend::new();
        let mut store = store_with(&backend, false, &[("water plants", "2024-01-02 09:00:00")]);
        assert!(store.is_dirty());

        let mut scheduler = ReminderScheduler::new(SchedulerConfig::default());
        let report = scheduler.tick(&mut store, at("2024-01-01 09:00:00")).unwrap();
        assert!(report.flushed);
        assert_eq!(backend.save_count(), 1);
        assert!(!store.is_dirty());
    }

    #[tokio::test]
    async fn test_run_scheduler_stops_on_shutdown() {
        let backend = InMemoryBackend::new();
        let store = Arc::new(Mutex::new(store_with(&backend, true, &[])));
        let notifier: Arc<dyn Notifier> = Arc::new(crate::speech::ConsoleNotifier::new());
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(run_scheduler(
            Arc::clone(&store),
            notifier,
            SchedulerConfig::default(),
            rx,
        ));
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_tick_with_unbounded_lead_and_flush() {
        let backend = InMemoryBackend::new();
        let mut store = store_with(&backend, false, &[("renew passport", "2030-06-01 09:00:00")]);
        let mut scheduler = ReminderScheduler::new(SchedulerConfig {
            notify_lead_secs: u64::MAX,
            flush_interval_secs: u64::MAX,
            ..SchedulerConfig::default()
        });

        let first = scheduler.tick(&mut store, at("2024-01-01 09:00:00")).unwrap();
        assert_eq!(first.due_soon.len(), 1);
        assert!(first.flushed);

        store
            .add(NewRecord::fact("I like tea", None, at("2024-01-01 09:00:00")))
            .unwrap();
        let second = scheduler.tick(&mut store, at("2024-01-01 09:01:00")).unwrap();
        assert!(!second.flushed);
        assert!(store.is_dirty());
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: std::sync::Mutex<Vec<(String, String)>>,
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, title: &str, message: &str) -> Result<()> {
            self.sent
                .lock()
                .unwrap()
                .push((title.to_string(), message.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_run_scheduler_delivers_due_reminders() {
        let backend = InMemoryBackend::new();
        let store = Arc::new(Mutex::new(store_with(
            &backend,
            true,
            &[("stretch", "2024-01-01 08:59:00")],
        )));
        let recorder = Arc::new(RecordingNotifier::default());
        let notifier: Arc<dyn Notifier> = Arc::clone(&recorder) as Arc<dyn Notifier>;
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(run_scheduler(
            Arc::clone(&store),
            notifier,
            SchedulerConfig::default(),
            rx,
        ));
        tokio::time::timeout(Duration::from_secs(5), async {
            while recorder.sent.lock().unwrap().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        tx.send(true).unwrap();
        handle.await.unwrap();

        let sent = recorder.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![(DUE_TITLE.to_string(), "stretch".to_string())]);
        assert!(!store.lock().await.memory().reminders[0].is_pending());
    }
}
