//! Relevance queries over long-term memory.

use crate::models::RecordRef;
use crate::relevance::RelevanceScorer;
use crate::storage::LongTermMemory;
use chrono::NaiveDateTime;
use std::cmp::Ordering;

/// A record that matched a relevance query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevantMatch<'a> {
    /// The matching record.
    pub record: RecordRef<'a>,
    /// Relevance score in `(0.0, 1.0]`.
    pub score: f32,
}

/// A lazy, restartable relevance query.
///
/// Nothing is scored until the query is iterated, and every call to
/// [`iter`](Self::iter) starts over. Iteration walks each record kind from
/// newest to oldest (reminders, events, facts, then conversations), skips
/// records created before the window start or scoring zero, and stops after
/// `limit` matches. Use [`ranked`](Self::ranked) for the best-scoring
/// matches overall.
pub struct RelevantQuery<'a> {
    memory: &'a LongTermMemory,
    scorer: &'a dyn RelevanceScorer,
    topic: String,
    since: NaiveDateTime,
    limit: usize,
}

impl<'a> RelevantQuery<'a> {
    pub(crate) fn new(
        memory: &'a LongTermMemory,
        scorer: &'a dyn RelevanceScorer,
        topic: impl Into<String>,
        since: NaiveDateTime,
        limit: usize,
    ) -> Self {
        Self {
            memory,
            scorer,
            topic: topic.into(),
            since,
            limit,
        }
    }

    /// Maximum number of matches yielded.
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Iterates over matches, newest first within each kind.
    pub fn iter(&self) -> impl Iterator<Item = RelevantMatch<'a>> + '_ {
        let memory = self.memory;
        let candidates = memory
            .reminders
            .iter()
            .rev()
            .map(RecordRef::Reminder)
            .chain(memory.events.iter().rev().map(RecordRef::Event))
            .chain(memory.facts.iter().rev().map(RecordRef::Fact))
            .chain(memory.conversations.iter().rev().map(RecordRef::Conversation));

        candidates
            .filter(move |record| record.created_at() >= self.since)
            .filter_map(move |record| {
                let score = self.scorer.score(&self.topic, record.text());
                (score > 0.0).then_some(RelevantMatch { record, score })
            })
            .take(self.limit)
    }

    /// Returns up to `limit` matches, best score first, newer records
    /// breaking ties.
    #[must_use]
    pub fn ranked(&self) -> Vec<RelevantMatch<'a>> {
        let mut matches: Vec<RelevantMatch<'a>> = self
            .iter_unbounded()
            .collect();
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.record.created_at().cmp(&a.record.created_at()))
        });
        matches.truncate(self.limit);
        matches
    }

    /// Number of matches [`iter`](Self::iter) yields.
    #[must_use]
    pub fn count(&self) -> usize {
        self.iter().count()
    }

    /// Returns true if nothing matches.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    fn iter_unbounded(&self) -> impl Iterator<Item = RelevantMatch<'a>> + '_ {
        self.memory
            .records()
            .filter(move |record| record.created_at() >= self.since)
            .filter_map(move |record| {
                let score = self.scorer.score(&self.topic, record.text());
                (score > 0.0).then_some(RelevantMatch { record, score })
            })
    }
}

impl<'q, 'a> IntoIterator for &'q RelevantQuery<'a> {
    type Item = RelevantMatch<'a>;
    type IntoIter = Box<dyn Iterator<Item = RelevantMatch<'a>> + 'q>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::time::parse_timestamp;
    use crate::models::{Fact, RecordId, Reminder, ReminderStatus};
    use crate::relevance::KeywordScorer;

    fn at(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    fn fact(id: &str, content: &str, created: &str) -> Fact {
        Fact {
            id: RecordId::new(id),
            content: content.to_string(),
            category: None,
            created_at: at(created),
        }
    }

    fn memory() -> LongTermMemory {
        LongTermMemory {
            reminders: vec![Reminder {
                id: RecordId::new("r1"),
                text: "call mom".to_string(),
                due_at: at("2024-01-02 14:00:00"),
                status: ReminderStatus::Pending,
                created_at: at("2024-01-01 09:00:00"),
                completed_at: None,
            }],
            facts: vec![
                fact("f1", "Mom's birthday is in May", "2023-06-01 10:00:00"),
                fact("f2", "Mom likes tulips", "2023-12-30 10:00:00"),
                fact("f3", "I like green tea", "2023-12-31 10:00:00"),
            ],
            ..LongTermMemory::default()
        }
    }

    #[test]
    fn test_window_and_score_filter() {
        let memory = memory();
        let scorer = KeywordScorer::new();
        let query = RelevantQuery::new(&memory, &scorer, "call mom", at("2023-12-01 00:00:00"), 10);

        let ids: Vec<&str> = query.iter().map(|m| m.record.id().as_str()).collect();
        assert_eq!(ids, vec!["r1", "f2"]);
    }

    #[test]
    fn test_restartable_and_limited() {
        let memory = memory();
        let scorer = KeywordScorer::new();
        let query = RelevantQuery::new(&memory, &scorer, "mom", at("2023-01-01 00:00:00"), 2);

        let first: Vec<_> = query.iter().collect();
        let second: Vec<_> = (&query).into_iter().collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
        assert_eq!(query.count(), 2);
        assert!(!query.is_empty());
    }

    #[test]
    fn test_ranked_prefers_higher_score() {
        let memory = memory();
        let scorer = KeywordScorer::new();
        let query = RelevantQuery::new(&memory, &scorer, "call mom", at("2023-01-01 00:00:00"), 2);

        let ranked = query.ranked();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].record.id().as_str(), "r1");
        assert!((ranked[0].score - 1.0).abs() < f32::EPSILON);
        // Ties on score go to the newer fact.
        assert_eq!(ranked[1].record.id().as_str(), "f2");
    }

    #[test]
    fn test_no_matches() {
        let memory = memory();
        let scorer = KeywordScorer::new();
        let query = RelevantQuery::new(&memory, &scorer, "dentist", at("2023-01-01 00:00:00"), 10);
        assert!(query.is_empty());
        assert!(query.ranked().is_empty());
    }
}
