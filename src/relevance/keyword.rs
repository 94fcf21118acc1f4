//! Keyword overlap scoring.

use super::{RelevanceScorer, significant_words};

/// Scores by the share of the topic's significant words found in the text.
///
/// "call mom" against "Mom's birthday is in May" scores 0.5: one of the two
/// topic words matches. Words match when equal or when one is a prefix of the
/// other and the shorter is at least four characters ("birth" / "birthday").
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordScorer;

impl KeywordScorer {
    /// Creates a keyword scorer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

const MIN_PREFIX_MATCH: usize = 4;

fn words_match(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    short.len() >= MIN_PREFIX_MATCH && long.starts_with(short)
}

impl RelevanceScorer for KeywordScorer {
    fn name(&self) -> &'static str {
        "keyword"
    }

    #[allow(clippy::cast_precision_loss)]
    fn score(&self, topic: &str, text: &str) -> f32 {
        let topic_words = significant_words(topic);
        if topic_words.is_empty() {
            return 0.0;
        }
        let text_words = significant_words(text);

        let matched = topic_words
            .iter()
            .filter(|t| text_words.iter().any(|w| words_match(t, w)))
            .count();

        matched as f32 / topic_words.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_overlap() {
        let scorer = KeywordScorer::new();
        let score = scorer.score("call mom", "Mom's birthday is in May");
        assert!((score - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_full_and_no_overlap() {
        let scorer = KeywordScorer::new();
        assert!((scorer.score("dentist", "Dentist appointment") - 1.0).abs() < f32::EPSILON);
        assert!(scorer.score("dentist", "water the plants").abs() < f32::EPSILON);
    }

    #[test]
    fn test_prefix_match() {
        let scorer = KeywordScorer::new();
        assert!(scorer.score("birth", "birthday party") > 0.0);
        assert!(scorer.score("car", "cardamom tea").abs() < f32::EPSILON);
    }

    #[test]
    fn test_stop_word_only_topic_scores_zero() {
        let scorer = KeywordScorer::new();
        assert!(scorer.score("what is the", "the cat is on the mat").abs() < f32::EPSILON);
    }
}
