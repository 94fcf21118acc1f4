//! Topic relevance scoring.
//!
//! A [`RelevanceScorer`] rates how related a piece of record text is to a
//! topic. Scores are in `0.0..=1.0`; zero means unrelated and such records
//! are never returned by relevance queries.
//!
//! | Scorer | Matching |
//! |--------|----------|
//! | [`KeywordScorer`] | Overlap of significant words (stop words and short words removed) |
//! | [`SubstringScorer`] | Any topic word appearing anywhere in the text |

mod keyword;
mod substring;

pub use keyword::KeywordScorer;
pub use substring::SubstringScorer;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

/// Minimum length of a significant word.
pub const MIN_TOPIC_WORD_LENGTH: usize = 3;

/// Scores how relevant a text is to a topic.
pub trait RelevanceScorer: Send + Sync {
    /// Scorer name, for logs.
    fn name(&self) -> &'static str;

    /// Returns a score in `0.0..=1.0`.
    fn score(&self, topic: &str, text: &str) -> f32;
}

/// Available scorer implementations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorerKind {
    /// [`KeywordScorer`].
    #[default]
    Keyword,
    /// [`SubstringScorer`].
    Substring,
}

impl ScorerKind {
    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Substring => "substring",
        }
    }

    /// Parses a scorer kind from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "keyword" | "keywords" => Some(Self::Keyword),
            "substring" => Some(Self::Substring),
            _ => None,
        }
    }

    /// Builds the scorer.
    #[must_use]
    pub fn build(self) -> Box<dyn RelevanceScorer> {
        match self {
            Self::Keyword => Box::new(KeywordScorer::new()),
            Self::Substring => Box::new(SubstringScorer::new()),
        }
    }
}

impl fmt::Display for ScorerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Common words ignored when extracting topics.
pub static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "the", "and", "but", "for", "with", "from", "was", "are", "were", "been", "have", "has",
        "had", "does", "did", "will", "would", "could", "should", "may", "might", "must", "shall",
        "can", "need", "you", "she", "they", "him", "her", "them", "your", "his", "its", "our",
        "their", "this", "that", "these", "those", "what", "which", "who", "whom", "how", "when",
        "where", "why", "all", "each", "every", "both", "few", "more", "most", "other", "some",
        "such", "not", "only", "own", "same", "than", "too", "very", "just", "also", "now",
        "then", "there", "here", "into", "about", "please", "remind", "remember", "tell", "know",
        "want", "like", "get", "got", "let", "set", "today", "tomorrow", "tonight",
    ]
    .into_iter()
    .collect()
});

/// Splits text into lowercase significant words.
///
/// Words shorter than [`MIN_TOPIC_WORD_LENGTH`], stop words, and pure numbers
/// are dropped; duplicates are removed, first occurrence wins. Possessive
/// `'s` and a trailing plural `s` are stripped so "reminders" matches
/// "reminder" and "mom's" matches "mom".
#[must_use]
pub fn significant_words(text: &str) -> Vec<String> {
    let mut words: Vec<String> = Vec::new();

    for word in text.split(|c: char| c.is_whitespace() || c == ',' || c == ';' || c == ':') {
        let cleaned = word
            .trim_matches(|c: char| !c.is_alphanumeric() && c != '-' && c != '_')
            .to_lowercase();
        let cleaned = cleaned
            .strip_suffix("'s")
            .or_else(|| cleaned.strip_suffix("\u{2019}s"))
            .unwrap_or(&cleaned);

        if cleaned.chars().count() < MIN_TOPIC_WORD_LENGTH
            || STOP_WORDS.contains(cleaned)
            || cleaned.chars().all(char::is_numeric)
        {
            continue;
        }

        let stemmed = singular(cleaned);
        if !words.iter().any(|w| w == stemmed) {
            words.push(stemmed.to_string());
        }
    }

    words
}

fn singular(word: &str) -> &str {
    match word.strip_suffix('s') {
        Some(stem) if stem.len() >= MIN_TOPIC_WORD_LENGTH && !stem.ends_with('s') => stem,
        _ => word,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_significant_words_filters_noise() {
        let words = significant_words("Remind me to call Mom at 5, and water the plants!");
        assert_eq!(words, vec!["call", "mom", "water", "plant"]);
    }

    #[test]
    fn test_significant_words_dedupes_plurals() {
        assert_eq!(significant_words("reminders reminder"), vec!["reminder"]);
        assert_eq!(significant_words("glass"), vec!["glass"]);
        assert_eq!(significant_words("Mom's"), vec!["mom"]);
    }

    #[test]
    fn test_significant_words_drops_numbers() {
        assert!(significant_words("2024 1234").is_empty());
    }

    #[test]
    fn test_scorer_kind_parse_and_build() {
        assert_eq!(ScorerKind::parse("Keyword"), Some(ScorerKind::Keyword));
        assert_eq!(ScorerKind::parse("substring"), Some(ScorerKind::Substring));
        assert_eq!(ScorerKind::parse("vector"), None);
        assert_eq!(ScorerKind::Substring.build().name(), "substring");
        assert_eq!(ScorerKind::default().build().name(), "keyword");
    }
}
