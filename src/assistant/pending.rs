//! Actions waiting for the user's confirmation.

use crate::models::{ClearScope, NewRecord};

/// Words that confirm a pending action.
const AFFIRMATIVES: &[&str] = &["yes", "yeah", "yep", "sure", "confirm", "ok", "okay"];

/// Something the assistant asked about and will do only on a "yes".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingAction {
    /// Store a reminder or event.
    AddRecord(NewRecord),
    /// Delete everything in a scope.
    Clear(ClearScope),
}

impl PendingAction {
    /// Protocol name of the action being confirmed.
    #[must_use]
    pub const fn action_name(&self) -> &'static str {
        match self {
            Self::AddRecord(_) => "set_reminder",
            Self::Clear(ClearScope::Reminders) => "clear_reminders",
            Self::Clear(ClearScope::All) => "clear_all_memory",
        }
    }
}

/// Returns true if the utterance agrees to the pending action.
///
/// Matching is per word, so "yesterday" does not count.
#[must_use]
pub fn is_affirmative(utterance: &str) -> bool {
    utterance
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .map(str::to_lowercase)
        .any(|word| AFFIRMATIVES.contains(&word.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("yes" => true)]
    #[test_case("Yes, please." => true)]
    #[test_case("yeah go ahead" => true)]
    #[test_case("OK" => true)]
    #[test_case("no" => false)]
    #[test_case("what happened yesterday" => false)]
    #[test_case("" => false)]
    fn test_is_affirmative(utterance: &str) -> bool {
        is_affirmative(utterance)
    }

    #[test]
    fn test_action_name() {
        assert_eq!(PendingAction::Clear(ClearScope::All).action_name(), "clear_all_memory");
    }
}
