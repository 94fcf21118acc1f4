//! Typed-input transcriber.

use super::SpeechToText;
use crate::Result;
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;
use tracing::debug;

/// Reads one line per utterance from a reader, standing in for a microphone.
///
/// Lines are read on a background thread so `listen` can give up after its
/// timeout without losing input that arrives later. Blank lines count as
/// silence.
pub struct LineTranscriber {
    lines: Receiver<String>,
    closed: bool,
}

impl LineTranscriber {
    /// Creates a transcriber over any line reader.
    #[must_use]
    pub fn new<R>(reader: R) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        });
        Self {
            lines: rx,
            closed: false,
        }
    }

    /// Creates a transcriber over standard input.
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(std::io::BufReader::new(std::io::stdin()))
    }
}

impl SpeechToText for LineTranscriber {
    fn name(&self) -> &'static str {
        "line"
    }

    fn listen(&mut self, timeout: Duration) -> Result<Option<String>> {
        if self.closed {
            return Ok(None);
        }

        match self.lines.recv_timeout(timeout) {
            Ok(line) => {
                let line = line.trim().to_string();
                Ok((!line.is_empty()).then_some(line))
            },
            Err(RecvTimeoutError::Timeout) => {
                debug!("No speech detected");
                Ok(None)
            },
            Err(RecvTimeoutError::Disconnected) => {
                self.closed = true;
                Ok(None)
            },
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_lines_then_closes() {
        let mut stt = LineTranscriber::new(Cursor::new("remind me\n\n  hello  \n"));
        let timeout = Duration::from_secs(2);

        assert_eq!(stt.listen(timeout).unwrap().as_deref(), Some("remind me"));
        assert_eq!(stt.listen(timeout).unwrap(), None);
        assert_eq!(stt.listen(timeout).unwrap().as_deref(), Some("hello"));
        assert!(!stt.is_closed());

        assert_eq!(stt.listen(timeout).unwrap(), None);
        assert!(stt.is_closed());
    }

    struct SlowReader;

    impl std::io::Read for SlowReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            std::thread::sleep(Duration::from_millis(300));
            Ok(0)
        }
    }

    #[test]
    fn test_timeout_without_input() {
        let mut stt = LineTranscriber::new(std::io::BufReader::new(SlowReader));
        assert_eq!(stt.listen(Duration::from_millis(20)).unwrap(), None);
        assert!(!stt.is_closed());

        assert_eq!(stt.listen(Duration::from_secs(5)).unwrap(), None);
        assert!(stt.is_closed());
    }
}
