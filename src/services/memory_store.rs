//! The memory store.
//!
//! [`MemoryStore`] owns the working copy of the memory document and is the
//! only code that mutates it. Every mutation is validated before it touches
//! the document, then committed: with write-through enabled the document is
//! saved immediately and a failed save restores the previous state; without
//! it the store is marked dirty and [`MemoryStore::flush`] saves later.

use super::calendar::WeeklyView;
use super::context::ContextualMemory;
use super::query::RelevantQuery;
use crate::config::MurmurConfig;
use crate::gc::{RetentionConfig, RetentionGarbageCollector, RetentionGcResult, fact_key};
use crate::models::time::local_now;
use crate::models::{
    ClearScope, ConversationTurn, Event, Fact, NewRecord, RecordId, RecordKind, RecordPayload,
    RecordRef, RecordUpdate, Reminder, ReminderStatus,
};
use crate::relevance::{RelevanceScorer, ScorerKind};
use crate::storage::{LongTermMemory, MemoryBackend, MemoryDocument};
use crate::{Error, Result};
use chrono::{NaiveDateTime, TimeDelta};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

#[inline]
fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[inline]
fn u64_to_f64(value: u64) -> f64 {
    let capped = u32::try_from(value).unwrap_or(u32::MAX);
    f64::from(capped)
}

fn record_operation(operation: &'static str, start: Instant, ok: bool) {
    let status = if ok { "success" } else { "error" };
    metrics::counter!(
        "murmur_store_operations_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!("murmur_store_operation_duration_ms", "operation" => operation)
        .record(u64_to_f64(duration_to_millis(start.elapsed())));
}

/// Store settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Retention horizon and contextual window.
    pub retention: RetentionConfig,
    /// Scorer used by relevance queries and the contextual view.
    pub scorer: ScorerKind,
    /// Default number of relevance matches.
    pub relevance_limit: usize,
    /// Save after every mutation.
    pub write_through: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retention: RetentionConfig::default(),
            scorer: ScorerKind::default(),
            relevance_limit: 10,
            write_through: true,
        }
    }
}

impl StoreConfig {
    /// Derives store settings from the application configuration.
    #[must_use]
    pub fn from_config(config: &MurmurConfig) -> Self {
        Self {
            retention: config.retention.clone(),
            scorer: config.relevance.scorer,
            relevance_limit: config.relevance.limit,
            write_through: config.write_through,
        }
    }

    /// Sets the retention configuration.
    #[must_use]
    pub fn with_retention(mut self, retention: RetentionConfig) -> Self {
        self.retention = retention;
        self
    }

    /// Sets the relevance scorer.
    #[must_use]
    pub const fn with_scorer(mut self, scorer: ScorerKind) -> Self {
        self.scorer = scorer;
        self
    }

    /// Sets the default relevance limit.
    #[must_use]
    pub const fn with_relevance_limit(mut self, limit: usize) -> Self {
        self.relevance_limit = limit;
        self
    }

    /// Sets write-through persistence.
    #[must_use]
    pub const fn with_write_through(mut self, write_through: bool) -> Self {
        self.write_through = write_through;
        self
    }
}

/// Result of a confirmed (or empty) clear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClearOutcome {
    /// The scope that was cleared.
    pub scope: ClearScope,
    /// Records removed, by kind.
    pub by_kind: BTreeMap<String, usize>,
}

impl ClearOutcome {
    /// Total records removed.
    #[must_use]
    pub fn removed(&self) -> usize {
        self.by_kind.values().sum()
    }

    /// Returns true if nothing was removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed() == 0
    }

    /// Returns a human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return format!("Nothing to clear ({})", self.scope);
        }
        let parts: Vec<String> = self
            .by_kind
            .iter()
            .filter(|(_, n)| **n > 0)
            .map(|(kind, n)| format!("{kind}: {n}"))
            .collect();
        format!("Cleared {} records ({})", self.removed(), parts.join(", "))
    }
}

/// Durable access to reminders, events, facts, and conversation turns.
pub struct MemoryStore<B: MemoryBackend> {
    backend: B,
    config: StoreConfig,
    document: MemoryDocument,
    context: ContextualMemory,
    scorer: Box<dyn RelevanceScorer>,
    gc: RetentionGarbageCollector,
    dirty: bool,
    closed: bool,
}

impl<B: MemoryBackend> MemoryStore<B> {
    /// Opens the store, loading the backend's document.
    ///
    /// A failed load is retried once before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if both load attempts fail.
    pub fn open(backend: B, config: StoreConfig) -> Result<Self> {
        Self::open_at(backend, config, local_now())
    }

    /// Opens the store, building the contextual view as of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if both load attempts fail.
    #[instrument(name = "murmur.store.open", skip(backend, config), fields(backend = %backend.describe()))]
    pub fn open_at(backend: B, config: StoreConfig, now: NaiveDateTime) -> Result<Self> {
        let start = Instant::now();
        let loaded = backend.load().or_else(|first| {
            warn!(error = %first, "Loading memory failed, retrying once");
            metrics::counter!("murmur_store_load_retries_total").increment(1);
            backend.load()
        });
        record_operation("open", start, loaded.is_ok());
        let document = loaded?.unwrap_or_default();

        let scorer = config.scorer.build();
        let gc = RetentionGarbageCollector::new(config.retention.clone());
        let context =
            ContextualMemory::build(&document.long_term, now, &config.retention, scorer.as_ref());

        info!(
            records = document.long_term.len(),
            reminders = document.long_term.reminders.len(),
            facts = document.long_term.facts.len(),
            "Opened memory store"
        );

        Ok(Self {
            backend,
            config,
            document,
            context,
            scorer,
            gc,
            dirty: false,
            closed: false,
        })
    }

    /// The store configuration.
    #[must_use]
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Long-term memory as currently held.
    #[must_use]
    pub const fn memory(&self) -> &LongTermMemory {
        &self.document.long_term
    }

    /// The contextual view as of the last rebuild.
    #[must_use]
    pub const fn context(&self) -> &ContextualMemory {
        &self.context
    }

    /// Returns true if changes are waiting for [`flush`](Self::flush).
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Looks up a record by identifier.
    #[must_use]
    pub fn get(&self, id: &RecordId) -> Option<RecordRef<'_>> {
        self.document.long_term.find(id)
    }

    /// Pending reminders, soonest first.
    #[must_use]
    pub fn pending_reminders(&self) -> Vec<&Reminder> {
        let mut pending: Vec<&Reminder> = self
            .document
            .long_term
            .reminders
            .iter()
            .filter(|r| r.is_pending())
            .collect();
        pending.sort_by_key(|r| r.due_at);
        pending
    }

    /// Adds a record, assigning an identifier when none is given.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for empty text or a duplicate
    /// identifier, and [`Error::Storage`] if a write-through save fails (the
    /// record is not kept).
    #[instrument(name = "murmur.store.add", skip(self, record), fields(kind = %record.kind()))]
    pub fn add(&mut self, record: NewRecord) -> Result<RecordId> {
        let start = Instant::now();
        let result = self.add_inner(record);
        record_operation("add", start, result.is_ok());
        result
    }

    fn add_inner(&mut self, record: NewRecord) -> Result<RecordId> {
        if record.text().trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "{} text cannot be empty",
                record.kind()
            )));
        }

        let id = match record.id {
            Some(id) if id.as_str().trim().is_empty() => {
                return Err(Error::InvalidInput("record id cannot be empty".to_string()));
            },
            Some(id) if self.document.long_term.contains(&id) => {
                return Err(Error::InvalidInput(format!("duplicate record id: {id}")));
            },
            Some(id) => id,
            None => RecordId::generate(),
        };

        let snapshot = self.document.long_term.clone();
        let created_at = record.created_at;
        let memory = &mut self.document.long_term;

        match record.payload {
            RecordPayload::Reminder { text, due_at } => memory.reminders.push(Reminder {
                id: id.clone(),
                text: text.trim().to_string(),
                due_at,
                status: ReminderStatus::Pending,
                created_at,
                completed_at: None,
            }),
            RecordPayload::Event {
                title,
                scheduled_at,
            } => memory.events.push(Event {
                id: id.clone(),
                title: title.trim().to_string(),
                scheduled_at,
                created_at,
            }),
            RecordPayload::Fact { content, category } => memory.facts.push(Fact {
                id: id.clone(),
                content: content.trim().to_string(),
                category: category.filter(|c| !c.trim().is_empty()),
                created_at,
            }),
            RecordPayload::Conversation {
                utterance,
                response,
                action,
            } => memory.conversations.push(ConversationTurn {
                id: id.clone(),
                utterance: utterance.trim().to_string(),
                response,
                action,
                created_at,
            }),
        }

        self.commit(snapshot, created_at)?;
        debug!(id = %id, "Added record");
        Ok(id)
    }

    /// Updates a record as of the current local time.
    ///
    /// # Errors
    ///
    /// See [`update_at`](Self::update_at).
    pub fn update(&mut self, id: &RecordId, update: &RecordUpdate) -> Result<()> {
        self.update_at(id, update, local_now())
    }

    /// Updates a record. Completion timestamps use `now`.
    ///
    /// Validation happens before anything changes, so a rejected update
    /// leaves the store untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no record has `id`,
    /// [`Error::InvalidInput`] if a field does not apply to the record kind,
    /// and [`Error::Storage`] if a write-through save fails (the update is
    /// rolled back).
    #[instrument(name = "murmur.store.update", skip(self, id, update), fields(id = %id))]
    pub fn update_at(
        &mut self,
        id: &RecordId,
        update: &RecordUpdate,
        now: NaiveDateTime,
    ) -> Result<()> {
        let start = Instant::now();
        let result = self.update_inner(id, update, now);
        record_operation("update", start, result.is_ok());
        result
    }

    fn update_inner(
        &mut self,
        id: &RecordId,
        update: &RecordUpdate,
        now: NaiveDateTime,
    ) -> Result<()> {
        let kind = self
            .get(id)
            .map(|r| r.kind())
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        update.validate_for(kind)?;

        let snapshot = self.document.long_term.clone();
        let memory = &mut self.document.long_term;
        match kind {
            RecordKind::Reminder => {
                if let Some(r) = memory.reminders.iter_mut().find(|r| &r.id == id) {
                    update.apply_to_reminder(r, now);
                }
            },
            RecordKind::Event => {
                if let Some(e) = memory.events.iter_mut().find(|e| &e.id == id) {
                    update.apply_to_event(e);
                }
            },
            RecordKind::Fact => {
                if let Some(f) = memory.facts.iter_mut().find(|f| &f.id == id) {
                    update.apply_to_fact(f);
                }
            },
            RecordKind::Conversation => {},
        }

        self.commit(snapshot, now)
    }

    /// Marks a reminder completed at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no record has `id` and
    /// [`Error::InvalidInput`] if it is not a reminder.
    pub fn complete(&mut self, id: &RecordId, now: NaiveDateTime) -> Result<()> {
        self.update_at(
            id,
            &RecordUpdate::new().with_status(ReminderStatus::Completed),
            now,
        )
    }

    /// Number of records a clear of `scope` would remove.
    #[must_use]
    pub fn clear_count(&self, scope: ClearScope) -> usize {
        RecordKind::all()
            .iter()
            .filter(|kind| scope.covers(**kind))
            .map(|kind| self.document.long_term.count(*kind))
            .sum()
    }

    /// Clears every record in `scope`.
    ///
    /// Without `confirmed`, nothing is deleted: the call fails with
    /// [`Error::ConfirmationRequired`] carrying the number of records that
    /// would go. If nothing would be removed the call succeeds with an empty
    /// outcome whether or not it was confirmed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfirmationRequired`] as described above and
    /// [`Error::Storage`] if a write-through save fails (nothing is removed).
    #[instrument(name = "murmur.store.clear", skip(self))]
    pub fn clear(&mut self, scope: ClearScope, confirmed: bool) -> Result<ClearOutcome> {
        let start = Instant::now();
        let affected = self.clear_count(scope);

        if affected == 0 {
            record_operation("clear", start, true);
            return Ok(ClearOutcome {
                scope,
                by_kind: BTreeMap::new(),
            });
        }
        if !confirmed {
            record_operation("clear", start, false);
            return Err(Error::ConfirmationRequired { scope, affected });
        }

        let snapshot = self.document.long_term.clone();
        let mut by_kind = BTreeMap::new();
        for kind in RecordKind::all().iter().filter(|k| scope.covers(**k)) {
            let removed = self.document.long_term.clear_kind(*kind);
            if removed > 0 {
                by_kind.insert(kind.as_str().to_string(), removed);
            }
        }

        let now = self.context.built_at.unwrap_or_else(local_now);
        let result = self.commit(snapshot, now);
        record_operation("clear", start, result.is_ok());
        result?;

        let outcome = ClearOutcome { scope, by_kind };
        info!(removed = outcome.removed(), "{}", outcome.summary());
        Ok(outcome)
    }

    /// Applies the retention policy as of `now` and rebuilds the contextual
    /// view. Running it twice in a row changes nothing the second time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if a write-through save fails (nothing is
    /// removed).
    #[instrument(name = "murmur.store.cleanup", skip(self))]
    pub fn cleanup(&mut self, now: NaiveDateTime) -> Result<RetentionGcResult> {
        let start = Instant::now();
        let snapshot = self.document.long_term.clone();
        let result = self.gc.collect(&mut self.document.long_term, now, false);

        let committed = if result.has_changes() {
            self.commit(snapshot, now)
        } else {
            self.rebuild_context(now);
            Ok(())
        };
        record_operation("cleanup", start, committed.is_ok());
        committed?;
        Ok(result)
    }

    /// Reports what [`cleanup`](Self::cleanup) would remove, without removing it.
    #[must_use]
    pub fn preview_cleanup(&self, now: NaiveDateTime) -> RetentionGcResult {
        let mut scratch = self.document.long_term.clone();
        self.gc.collect(&mut scratch, now, true)
    }

    /// Marks every pending reminder due at or before `now` as completed and
    /// returns the reminders that changed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if a write-through save fails (nothing
    /// changes).
    #[instrument(name = "murmur.store.complete_overdue", skip(self))]
    pub fn complete_overdue(&mut self, now: NaiveDateTime) -> Result<Vec<Reminder>> {
        let overdue = self
            .document
            .long_term
            .reminders
            .iter()
            .any(|r| r.is_pending() && r.due_at <= now);
        if !overdue {
            return Ok(Vec::new());
        }

        let snapshot = self.document.long_term.clone();
        let mut completed = Vec::new();
        for reminder in &mut self.document.long_term.reminders {
            if reminder.is_pending() && reminder.due_at <= now {
                reminder.complete(now);
                completed.push(reminder.clone());
            }
        }

        self.commit(snapshot, now)?;
        info!(count = completed.len(), "Completed overdue reminders");
        Ok(completed)
    }

    /// Starts a relevance query for `topic` over records created within
    /// `window` before `now`.
    #[must_use]
    pub fn query_relevant(
        &self,
        topic: &str,
        window: TimeDelta,
        now: NaiveDateTime,
    ) -> RelevantQuery<'_> {
        metrics::counter!("murmur_store_queries_total").increment(1);
        RelevantQuery::new(
            &self.document.long_term,
            self.scorer.as_ref(),
            topic,
            now.checked_sub_signed(window).unwrap_or(NaiveDateTime::MIN),
            self.config.relevance_limit,
        )
    }

    /// Events and pending reminders in `[now, now + 7d)`, plus reminders
    /// completed in the previous week.
    #[must_use]
    pub fn weekly_view(&self, now: NaiveDateTime) -> WeeklyView {
        WeeklyView::build(&self.document.long_term, now)
    }

    /// Finds a stored record equivalent to `record`, used to avoid repeats.
    ///
    /// Reminders match a pending reminder with the same text
    /// (case-insensitive) and due time, events the same title and time, and
    /// facts the same normalized content. Conversation turns never match.
    #[must_use]
    pub fn find_duplicate(&self, record: &NewRecord) -> Option<RecordId> {
        let memory = &self.document.long_term;
        let same = |a: &str, b: &str| a.trim().eq_ignore_ascii_case(b.trim());

        match &record.payload {
            RecordPayload::Reminder { text, due_at } => memory
                .reminders
                .iter()
                .find(|r| r.is_pending() && r.due_at == *due_at && same(&r.text, text))
                .map(|r| r.id.clone()),
            RecordPayload::Event {
                title,
                scheduled_at,
            } => memory
                .events
                .iter()
                .find(|e| e.scheduled_at == *scheduled_at && same(&e.title, title))
                .map(|e| e.id.clone()),
            RecordPayload::Fact { content, .. } => {
                let key = fact_key(content);
                memory
                    .facts
                    .iter()
                    .find(|f| fact_key(&f.content) == key)
                    .map(|f| f.id.clone())
            },
            RecordPayload::Conversation { .. } => None,
        }
    }

    /// Finds the pending reminder or event best matching `target`.
    ///
    /// An exact (case-insensitive) text match wins; otherwise the first
    /// record whose text contains the target, soonest first.
    #[must_use]
    pub fn find_scheduled(&self, target: &str) -> Option<RecordRef<'_>> {
        let target = target.trim().to_lowercase();
        if target.is_empty() {
            return None;
        }

        let memory = &self.document.long_term;
        let mut candidates: Vec<RecordRef<'_>> = memory
            .reminders
            .iter()
            .filter(|r| r.is_pending())
            .map(RecordRef::Reminder)
            .chain(memory.events.iter().map(RecordRef::Event))
            .collect();
        candidates.sort_by_key(RecordRef::scheduled_at);

        candidates
            .iter()
            .find(|r| r.text().to_lowercase() == target)
            .or_else(|| {
                candidates
                    .iter()
                    .find(|r| r.text().to_lowercase().contains(&target))
            })
            .copied()
    }

    /// Rebuilds the contextual view as of `now`.
    pub fn refresh_context(&mut self, now: NaiveDateTime) {
        self.rebuild_context(now);
    }

    /// Saves pending changes, if any. Returns whether anything was written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the save fails; the store stays dirty.
    pub fn flush(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Saves the document unconditionally.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the save fails.
    #[instrument(name = "murmur.store.save", skip(self), fields(records = self.document.long_term.len()))]
    pub fn save(&mut self) -> Result<()> {
        let start = Instant::now();
        let result = self.backend.save(&self.document);
        record_operation("save", start, result.is_ok());
        result?;
        self.dirty = false;
        Ok(())
    }

    /// Flushes and closes the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the final flush fails.
    pub fn close(mut self) -> Result<()> {
        let result = self.flush().map(|_| ());
        self.closed = true;
        result
    }

    fn commit(&mut self, snapshot: LongTermMemory, now: NaiveDateTime) -> Result<()> {
        if self.config.write_through {
            if let Err(e) = self.save() {
                warn!(error = %e, "Save failed, rolling back");
                self.document.long_term = snapshot;
                return Err(e);
            }
        } else {
            self.dirty = true;
        }
        self.rebuild_context(now);
        Ok(())
    }

    fn rebuild_context(&mut self, now: NaiveDateTime) {
        self.context = ContextualMemory::build(
            &self.document.long_term,
            now,
            &self.config.retention,
            self.scorer.as_ref(),
        );
    }
}

impl<B: MemoryBackend> Drop for MemoryStore<B> {
    fn drop(&mut self) {
        if self.closed || !self.dirty {
            return;
        }
        if let Err(e) = self.backend.save(&self.document) {
            warn!(error = %e, "Failed to flush memory store on drop");
        }
    }
}
