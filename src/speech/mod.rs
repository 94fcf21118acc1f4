//! Speech and notification seams.
//!
//! Murmur never touches audio itself. Recognition, synthesis, and desktop
//! notifications are external collaborators reached through the traits
//! here; the terminal implementations let the assistant run without any of
//! them.

mod notify;
mod synthesis;
mod transcriber;

pub use notify::{ConsoleNotifier, NOTIFICATION_PREFIX};
pub use synthesis::{CommandSynthesizer, ConsoleSynthesizer, FallbackSynthesizer};
pub use transcriber::LineTranscriber;

use crate::Result;
use crate::config::SpeechConfig;
use std::time::Duration;

/// Turns speech into text.
pub trait SpeechToText: Send {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// Waits up to `timeout` for one utterance.
    ///
    /// Returns `Ok(None)` when nothing was said in time.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Provider`] if recognition fails.
    fn listen(&mut self, timeout: Duration) -> Result<Option<String>>;

    /// Returns `true` once no further input can arrive.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Speaks text aloud.
pub trait SpeechSynthesizer: Send + Sync {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// Speaks `text`, returning once playback finished.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Provider`] if synthesis or playback fails.
    fn speak(&self, text: &str) -> Result<()>;
}

/// Shows out-of-band notifications.
pub trait Notifier: Send + Sync {
    /// Shows a notification.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Provider`] if the notification cannot be shown.
    fn notify(&self, title: &str, message: &str) -> Result<()>;
}

/// Builds the synthesizer described by the `[speech]` section.
///
/// With a command configured, speech goes to that command and falls back to
/// the console; otherwise it is printed.
#[must_use]
pub fn build_synthesizer(config: &SpeechConfig) -> Box<dyn SpeechSynthesizer> {
    match &config.command {
        Some(command) => Box::new(FallbackSynthesizer::new(
            Box::new(CommandSynthesizer::new(command).with_args(config.args.clone())),
            Box::new(ConsoleSynthesizer::new()),
        )),
        None => Box::new(ConsoleSynthesizer::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_synthesizer() {
        let console = build_synthesizer(&SpeechConfig::default());
        assert_eq!(console.name(), "console");

        let config = SpeechConfig {
            command: Some("say".to_string()),
            args: vec!["-v".to_string(), "Alex".to_string()],
            listen_timeout_secs: 5,
        };
        assert_eq!(build_synthesizer(&config).name(), "fallback");
    }
}
