//! Console notifications.

use super::Notifier;
use crate::Result;

/// Prefix printed before every notification line.
pub const NOTIFICATION_PREFIX: &str = "[NOTIFICATION]";

/// Prints notifications as `[NOTIFICATION] title: message`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    /// Creates a console notifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Formats a notification line.
    #[must_use]
    pub fn format(title: &str, message: &str) -> String {
        format!("{NOTIFICATION_PREFIX} {title}: {message}")
    }
}

impl Notifier for ConsoleNotifier {
    #[allow(clippy::print_stdout)]
    fn notify(&self, title: &str, message: &str) -> Result<()> {
        println!("{}", Self::format(title, message));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        assert_eq!(
            ConsoleNotifier::format("Reminder", "call mom"),
            "[NOTIFICATION] Reminder: call mom"
        );
        assert!(ConsoleNotifier::new().notify("a", "b").is_ok());
    }
}
