//! Field-level updates to stored records.

use super::{Event, Fact, RecordKind, Reminder, ReminderStatus};
use crate::{Error, Result};
use chrono::NaiveDateTime;

/// A set of field changes for one record.
///
/// Only the fields that apply to the target record's kind may be set:
///
/// | Field | Reminder | Event | Fact | Conversation |
/// |-------|----------|-------|------|--------------|
/// | `text` | yes | yes (title) | yes | no |
/// | `scheduled_at` | yes (due time) | yes | no | no |
/// | `status` | yes | no | no | no |
/// | `category` | no | no | yes | no |
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordUpdate {
    /// New text, title, or content.
    pub text: Option<String>,
    /// New due or scheduled time.
    pub scheduled_at: Option<NaiveDateTime>,
    /// New reminder status.
    pub status: Option<ReminderStatus>,
    /// New fact category.
    pub category: Option<String>,
}

impl RecordUpdate {
    /// Creates an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the text.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Sets the scheduled time.
    #[must_use]
    pub const fn with_scheduled_at(mut self, at: NaiveDateTime) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    /// Sets the reminder status.
    #[must_use]
    pub const fn with_status(mut self, status: ReminderStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Sets the fact category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Returns true if no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.scheduled_at.is_none()
            && self.status.is_none()
            && self.category.is_none()
    }

    /// Checks that every set field applies to `kind` and that text is not blank.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] naming the first offending field.
    pub fn validate_for(&self, kind: RecordKind) -> Result<()> {
        if self.is_empty() {
            return Err(Error::InvalidInput("update has no fields set".to_string()));
        }
        if self.text.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(Error::InvalidInput("text cannot be empty".to_string()));
        }

        let reject = |field: &str| {
            Err(Error::InvalidInput(format!(
                "field '{field}' does not apply to a {kind}"
            )))
        };

        match kind {
            RecordKind::Reminder if self.category.is_some() => reject("category"),
            RecordKind::Event if self.status.is_some() => reject("status"),
            RecordKind::Event if self.category.is_some() => reject("category"),
            RecordKind::Fact if self.scheduled_at.is_some() => reject("scheduled_at"),
            RecordKind::Fact if self.status.is_some() => reject("status"),
            RecordKind::Conversation => reject("any"),
            _ => Ok(()),
        }
    }

    /// Applies the update to a reminder. Completion is stamped with `now`.
    pub(crate) fn apply_to_reminder(&self, reminder: &mut Reminder, now: NaiveDateTime) {
        if let Some(text) = &self.text {
            reminder.text = text.trim().to_string();
        }
        if let Some(at) = self.scheduled_at {
            reminder.due_at = at;
        }
        match self.status {
            Some(ReminderStatus::Completed) => reminder.complete(now),
            Some(ReminderStatus::Pending) => {
                reminder.status = ReminderStatus::Pending;
                reminder.completed_at = None;
            },
            None => {},
        }
    }

    /// Applies the update to an event.
    pub(crate) fn apply_to_event(&self, event: &mut Event) {
        if let Some(text) = &self.text {
            event.title = text.trim().to_string();
        }
        if let Some(at) = self.scheduled_at {
            event.scheduled_at = at;
        }
    }

    /// Applies the update to a fact.
    pub(crate) fn apply_to_fact(&self, fact: &mut Fact) {
        if let Some(text) = &self.text {
            fact.content = text.trim().to_string();
        }
        if let Some(category) = &self.category {
            fact.category = Some(category.clone());
        }
    }
}
