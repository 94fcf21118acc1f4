//! Retention policy garbage collector.
//!
//! Removes long-term records whose age (`now - created_at`) exceeds the
//! retention horizon, and collapses duplicate facts.
//!
//! # Configuration
//!
//! Retention can be configured via:
//! - Environment variable: `MURMUR_RETENTION_DAYS` (default: 365)
//! - Environment variable: `MURMUR_CONTEXT_DAYS` (default: 7)
//! - Per-kind overrides: `MURMUR_RETENTION_<KIND>_DAYS`, e.g. `MURMUR_RETENTION_CONVERSATION_DAYS`
//! - Config file: `[retention] long_term_days = 365`
//!
//! # Example
//!
//! ```rust,ignore
//! use murmur::gc::{RetentionConfig, RetentionGarbageCollector};
//!
//! let gc = RetentionGarbageCollector::new(RetentionConfig::new().with_env_overrides());
//!
//! // Dry run to see what would be removed
//! let preview = gc.collect(&mut document.long_term, now, true);
//! println!("{}", preview.summary());
//!
//! let result = gc.collect(&mut document.long_term, now, false);
//! ```

use crate::models::{Fact, RecordKind};
use crate::storage::LongTermMemory;
use chrono::{NaiveDateTime, TimeDelta};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

/// Environment variable for the long-term retention period in days.
pub const RETENTION_DAYS_ENV: &str = "MURMUR_RETENTION_DAYS";

/// Environment variable for the contextual window in days.
pub const CONTEXT_DAYS_ENV: &str = "MURMUR_CONTEXT_DAYS";

/// Default long-term retention period in days (1 year).
pub const DEFAULT_RETENTION_DAYS: u32 = 365;

/// Default contextual window in days.
pub const DEFAULT_CONTEXT_DAYS: u32 = 7;

/// Default number of conversation turns kept in the contextual view.
pub const DEFAULT_MAX_CONTEXT_CONVERSATIONS: usize = 50;

/// Default number of facts kept in the contextual view.
pub const DEFAULT_MAX_RELEVANT_FACTS: usize = 10;

#[inline]
fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[inline]
fn usize_to_f64(value: usize) -> f64 {
    let capped = u32::try_from(value).unwrap_or(u32::MAX);
    f64::from(capped)
}

#[inline]
fn u64_to_f64(value: u64) -> f64 {
    let capped = u32::try_from(value).unwrap_or(u32::MAX);
    f64::from(capped)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Retention and contextual window configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetentionConfig {
    /// Long-term retention period in days.
    pub long_term_days: u32,

    /// Per-kind retention overrides.
    ///
    /// Kinds not in this map use `long_term_days`.
    pub kind_days: HashMap<RecordKind, u32>,

    /// Contextual window in days.
    pub context_days: u32,

    /// Maximum conversation turns in the contextual view.
    pub max_context_conversations: usize,

    /// Maximum facts in the contextual view.
    pub max_relevant_facts: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            long_term_days: DEFAULT_RETENTION_DAYS,
            kind_days: HashMap::new(),
            context_days: DEFAULT_CONTEXT_DAYS,
            max_context_conversations: DEFAULT_MAX_CONTEXT_CONVERSATIONS,
            max_relevant_facts: DEFAULT_MAX_RELEVANT_FACTS,
        }
    }
}

impl RetentionConfig {
    /// Creates a retention config with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies environment overrides on top of this config.
    ///
    /// Reads:
    /// - `MURMUR_RETENTION_DAYS`: Long-term retention period
    /// - `MURMUR_CONTEXT_DAYS`: Contextual window
    /// - `MURMUR_RETENTION_<KIND>_DAYS`: Per-kind overrides
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(days) = env_parse(RETENTION_DAYS_ENV) {
            self.long_term_days = days;
        }
        if let Some(days) = env_parse(CONTEXT_DAYS_ENV) {
            self.context_days = days;
        }
        for kind in RecordKind::all().iter().copied() {
            let key = format!("MURMUR_RETENTION_{}_DAYS", kind.as_str().to_uppercase());
            if let Some(days) = env_parse(&key) {
                self.kind_days.insert(kind, days);
            }
        }
        self
    }

    /// Sets the long-term retention period.
    #[must_use]
    pub const fn with_long_term_days(mut self, days: u32) -> Self {
        self.long_term_days = days;
        self
    }

    /// Sets the contextual window.
    #[must_use]
    pub const fn with_context_days(mut self, days: u32) -> Self {
        self.context_days = days;
        self
    }

    /// Sets a per-kind retention override.
    #[must_use]
    pub fn with_kind_days(mut self, kind: RecordKind, days: u32) -> Self {
        self.kind_days.insert(kind, days);
        self
    }

    /// Sets the contextual view limits.
    #[must_use]
    pub const fn with_context_limits(mut self, conversations: usize, facts: usize) -> Self {
        self.max_context_conversations = conversations;
        self.max_relevant_facts = facts;
        self
    }

    /// Gets the effective retention period for a record kind.
    #[must_use]
    pub fn effective_days(&self, kind: RecordKind) -> u32 {
        self.kind_days
            .get(&kind)
            .copied()
            .unwrap_or(self.long_term_days)
    }

    /// Retention horizon for a record kind.
    #[must_use]
    pub fn horizon(&self, kind: RecordKind) -> TimeDelta {
        TimeDelta::days(i64::from(self.effective_days(kind)))
    }

    /// Contextual window as a duration.
    #[must_use]
    pub fn context_window(&self) -> TimeDelta {
        TimeDelta::days(i64::from(self.context_days))
    }

    /// Returns true if a record of `kind` created at `created_at` is past its horizon.
    #[must_use]
    pub fn is_expired(&self, kind: RecordKind, created_at: NaiveDateTime, now: NaiveDateTime) -> bool {
        now.signed_duration_since(created_at) > self.horizon(kind)
    }
}

/// Result of a retention garbage collection run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionGcResult {
    /// Total number of records checked.
    pub records_checked: usize,

    /// Number of records removed (or that would be) for age.
    pub records_expired: usize,

    /// Number of duplicate facts removed (or that would be).
    pub duplicate_facts: usize,

    /// Breakdown of expired records by kind.
    pub by_kind: BTreeMap<String, usize>,

    /// Whether this was a dry run (no changes made).
    pub dry_run: bool,

    /// Duration of the run in milliseconds.
    pub duration_ms: u64,
}

impl RetentionGcResult {
    /// Total records removed for any reason.
    #[must_use]
    pub const fn records_removed(&self) -> usize {
        self.records_expired + self.duplicate_facts
    }

    /// Returns `true` if anything was removed.
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.records_removed() > 0
    }

    /// Returns a human-readable summary of the run.
    #[must_use]
    pub fn summary(&self) -> String {
        if !self.has_changes() {
            return format!(
                "No expired records found ({} records checked in {}ms)",
                self.records_checked, self.duration_ms
            );
        }

        let action = if self.dry_run { "would remove" } else { "removed" };
        let mut parts: Vec<String> = self
            .by_kind
            .iter()
            .map(|(kind, count)| format!("{kind}: {count}"))
            .collect();
        if self.duplicate_facts > 0 {
            parts.push(format!("duplicate facts: {}", self.duplicate_facts));
        }

        format!(
            "{} {} records ({}) - checked {} in {}ms",
            action,
            self.records_removed(),
            parts.join(", "),
            self.records_checked,
            self.duration_ms
        )
    }
}

/// Garbage collector enforcing the retention policy on long-term memory.
#[derive(Debug, Clone, Default)]
pub struct RetentionGarbageCollector {
    /// Retention policy configuration.
    config: RetentionConfig,
}

impl RetentionGarbageCollector {
    /// Creates a new retention garbage collector.
    #[must_use]
    pub const fn new(config: RetentionConfig) -> Self {
        Self { config }
    }

    /// Removes expired records and duplicate facts from `memory`.
    ///
    /// With `dry_run` the counts are computed on a scratch copy and `memory`
    /// is left untouched. Running twice with the same `now` removes nothing
    /// the second time.
    #[instrument(
        name = "murmur.gc.retention",
        skip(self, memory),
        fields(
            component = "gc",
            operation = "retention",
            dry_run = dry_run,
            long_term_days = self.config.long_term_days
        )
    )]
    pub fn collect(
        &self,
        memory: &mut LongTermMemory,
        now: NaiveDateTime,
        dry_run: bool,
    ) -> RetentionGcResult {
        let start = Instant::now();
        let mut result = RetentionGcResult {
            dry_run,
            records_checked: memory.len(),
            ..Default::default()
        };

        let mut scratch;
        let target = if dry_run {
            scratch = memory.clone();
            &mut scratch
        } else {
            memory
        };

        let config = &self.config;
        let mut expired = |kind: RecordKind, removed: usize| {
            if removed > 0 {
                debug!(kind = kind.as_str(), removed, "Expired records");
                result.by_kind.insert(kind.as_str().to_string(), removed);
                result.records_expired += removed;
            }
        };

        let before = target.reminders.len();
        target
            .reminders
            .retain(|r| !config.is_expired(RecordKind::Reminder, r.created_at, now));
        expired(RecordKind::Reminder, before - target.reminders.len());

        let before = target.events.len();
        target
            .events
            .retain(|e| !config.is_expired(RecordKind::Event, e.created_at, now));
        expired(RecordKind::Event, before - target.events.len());

        let before = target.facts.len();
        target
            .facts
            .retain(|f| !config.is_expired(RecordKind::Fact, f.created_at, now));
        expired(RecordKind::Fact, before - target.facts.len());

        let before = target.conversations.len();
        target
            .conversations
            .retain(|c| !config.is_expired(RecordKind::Conversation, c.created_at, now));
        expired(RecordKind::Conversation, before - target.conversations.len());

        result.duplicate_facts = dedupe_facts(&mut target.facts);
        result.duration_ms = duration_to_millis(start.elapsed());

        metrics::counter!(
            "murmur_gc_retention_runs_total",
            "dry_run" => dry_run.to_string()
        )
        .increment(1);
        metrics::gauge!("murmur_gc_retention_removed").set(usize_to_f64(result.records_removed()));
        metrics::histogram!("murmur_gc_retention_duration_ms").record(u64_to_f64(result.duration_ms));

        info!(
            records_checked = result.records_checked,
            records_expired = result.records_expired,
            duplicate_facts = result.duplicate_facts,
            duration_ms = result.duration_ms,
            dry_run,
            "Retention GC completed"
        );

        result
    }

    /// Returns the current retention configuration.
    #[must_use]
    pub const fn config(&self) -> &RetentionConfig {
        &self.config
    }
}

/// Normalized key used to detect duplicate facts.
#[must_use]
pub fn fact_key(content: &str) -> String {
    content.trim().to_lowercase()
}

/// Drops facts whose normalized content repeats, keeping the oldest of each.
///
/// Surviving facts keep their relative order. Returns how many were dropped.
fn dedupe_facts(facts: &mut Vec<Fact>) -> usize {
    let mut oldest: HashMap<String, usize> = HashMap::new();
    for (idx, fact) in facts.iter().enumerate() {
        oldest
            .entry(fact_key(&fact.content))
            .and_modify(|kept| {
                if fact.created_at < facts[*kept].created_at {
                    *kept = idx;
                }
            })
            .or_insert(idx);
    }

    let before = facts.len();
    let mut idx = 0;
    facts.retain(|fact| {
        let keep = oldest.get(&fact_key(&fact.content)) == Some(&idx);
        idx += 1;
        keep
    });
    before - facts.len()
}
