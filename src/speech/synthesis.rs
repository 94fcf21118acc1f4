//! Speech synthesizers.

use super::SpeechSynthesizer;
use crate::{Error, Result};
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// Speaks by running an external command with the text as its last argument,
/// e.g. `say -v Alex <text>`.
#[derive(Debug, Clone)]
pub struct CommandSynthesizer {
    program: String,
    args: Vec<String>,
}

impl CommandSynthesizer {
    /// Creates a synthesizer for `program`.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Sets arguments placed before the text.
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }
}

impl SpeechSynthesizer for CommandSynthesizer {
    fn name(&self) -> &'static str {
        "command"
    }

    fn speak(&self, text: &str) -> Result<()> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .status()
            .map_err(|e| Error::provider(&self.program, e))?;

        if !status.success() {
            return Err(Error::provider(
                &self.program,
                format!("exited with {status}"),
            ));
        }
        debug!(program = %self.program, chars = text.len(), "Spoke text");
        Ok(())
    }
}

/// Prints what would be spoken.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSynthesizer;

impl ConsoleSynthesizer {
    /// Creates a console synthesizer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SpeechSynthesizer for ConsoleSynthesizer {
    fn name(&self) -> &'static str {
        "console"
    }

    #[allow(clippy::print_stdout)]
    fn speak(&self, text: &str) -> Result<()> {
        println!("Assistant: {text}");
        Ok(())
    }
}

/// Tries a primary synthesizer, then a secondary one.
///
/// Never fails: when both paths fail the errors are logged and the text is
/// dropped.
pub struct FallbackSynthesizer {
    primary: Box<dyn SpeechSynthesizer>,
    secondary: Box<dyn SpeechSynthesizer>,
}

impl FallbackSynthesizer {
    /// Creates a fallback chain.
    #[must_use]
    pub fn new(primary: Box<dyn SpeechSynthesizer>, secondary: Box<dyn SpeechSynthesizer>) -> Self {
        Self { primary, secondary }
    }
}

impl SpeechSynthesizer for FallbackSynthesizer {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn speak(&self, text: &str) -> Result<()> {
        let Err(primary_err) = self.primary.speak(text) else {
            return Ok(());
        };
        warn!(provider = self.primary.name(), error = %primary_err, "Speech failed, using fallback");
        metrics::counter!("murmur_speech_fallback_total").increment(1);

        if let Err(e) = self.secondary.speak(text) {
            warn!(provider = self.secondary.name(), error = %e, text, "Fallback speech failed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Recording {
        fail: bool,
        spoken: Arc<Mutex<Vec<String>>>,
    }

    impl SpeechSynthesizer for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn speak(&self, text: &str) -> Result<()> {
            if self.fail {
                return Err(Error::provider("recording", "no audio device"));
            }
            self.spoken.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn recording(fail: bool) -> (Box<dyn SpeechSynthesizer>, Arc<Mutex<Vec<String>>>) {
        let spoken = Arc::new(Mutex::new(Vec::new()));
        (
            Box::new(Recording {
                fail,
                spoken: Arc::clone(&spoken),
            }),
            spoken,
        )
    }

    #[test]
    fn test_fallback_uses_secondary_on_failure() {
        let (primary, primary_log) = recording(true);
        let (secondary, secondary_log) = recording(false);
        let synth = FallbackSynthesizer::new(primary, secondary);

        synth.speak("hello").unwrap();
        assert!(primary_log.lock().unwrap().is_empty());
        assert_eq!(*secondary_log.lock().unwrap(), vec!["hello".to_string()]);
    }

    #[test]
    fn test_fallback_prefers_primary() {
        let (primary, primary_log) = recording(false);
        let (secondary, secondary_log) = recording(false);
        FallbackSynthesizer::new(primary, secondary).speak("hi").unwrap();
        assert_eq!(primary_log.lock().unwrap().len(), 1);
        assert!(secondary_log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_fallback_never_fails() {
        let (primary, _) = recording(true);
        let (secondary, _) = recording(true);
        assert!(FallbackSynthesizer::new(primary, secondary).speak("hi").is_ok());
    }

    #[test]
    fn test_missing_command_is_provider_error() {
        let synth = CommandSynthesizer::new("murmur-no-such-tts-binary");
        assert!(matches!(synth.speak("hi"), Err(Error::Provider { .. })));
    }
}
