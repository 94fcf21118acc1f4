//! Substring scoring.

use super::RelevanceScorer;

/// Scores by the share of topic words that occur anywhere inside the text.
///
/// Matching is case-insensitive and purely textual: every whitespace-separated
/// topic word counts, including short ones, so "a" matches most texts.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringScorer;

impl SubstringScorer {
    /// Creates a substring scorer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl RelevanceScorer for SubstringScorer {
    fn name(&self) -> &'static str {
        "substring"
    }

    #[allow(clippy::cast_precision_loss)]
    fn score(&self, topic: &str, text: &str) -> f32 {
        let text = text.to_lowercase();
        let words: Vec<String> = topic.split_whitespace().map(str::to_lowercase).collect();
        if words.is_empty() {
            return 0.0;
        }

        let matched = words.iter().filter(|w| text.contains(w.as_str())).count();
        matched as f32 / words.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substring_inside_words() {
        let scorer = SubstringScorer::new();
        assert!((scorer.score("tea", "I like green teas") - 1.0).abs() < f32::EPSILON);
        assert!((scorer.score("Tea coffee", "tea time") - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_empty_topic() {
        assert!(SubstringScorer::new().score("   ", "anything").abs() < f32::EPSILON);
    }
}
