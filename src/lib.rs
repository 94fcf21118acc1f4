//! # Murmur
//!
//! A voice-driven personal assistant with a persistent, self-pruning memory.
//!
//! Murmur keeps reminders, events, facts about the user, and recent
//! conversation turns in a single human-readable JSON file. The
//! [`MemoryStore`] owns that file: it appends and updates records, clears
//! them behind a confirmation step, prunes anything older than the retention
//! horizon, and answers relevance queries used to build LLM context.
//!
//! Speech recognition, speech synthesis, and intent extraction are reached
//! through the traits in [`speech`] and [`llm`]; the [`assistant`] module
//! glues them to the store.
//!
//! ## Example
//!
//! ```rust,ignore
//! use murmur::storage::JsonFileBackend;
//! use murmur::{MemoryStore, NewRecord, StoreConfig};
//!
//! let backend = JsonFileBackend::new("memory.json");
//! let mut store = MemoryStore::open(backend, StoreConfig::default())?;
//! let id = store.add(NewRecord::reminder("call mom", due_at, now))?;
//! let week = store.weekly_view(now);
//! store.close()?;
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod assistant;
pub mod config;
pub mod gc;
pub mod intent;
pub mod llm;
pub mod models;
pub mod observability;
pub mod relevance;
pub mod services;
pub mod speech;
pub mod storage;

// Re-exports for convenience
pub use config::MurmurConfig;
pub use models::{
    ClearScope, ConversationTurn, Event, Fact, NewRecord, RecordId, RecordKind, RecordRef,
    RecordUpdate, Reminder, ReminderStatus,
};
pub use services::{MemoryStore, StoreConfig};

/// Error type for murmur operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Empty record text, unparseable time phrase, update field not applicable to the record kind |
/// | `Storage` | The memory file cannot be read, parsed, or written |
/// | `NotFound` | Update or completion targets an identifier that does not exist |
/// | `ConfirmationRequired` | A destructive clear was attempted without confirmation |
/// | `Provider` | An LLM, speech, or synthesis call failed or timed out |
/// | `OperationFailed` | Configuration or logging initialization fails |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Reading or writing the memory file failed.
    ///
    /// Raised when:
    /// - The memory file cannot be opened, read, or renamed into place
    /// - The file contents are not valid JSON in any known layout
    /// - The file exceeds the maximum accepted size
    #[error("storage operation '{operation}' failed: {cause}")]
    Storage {
        /// The storage operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The targeted record does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// A destructive operation needs explicit confirmation.
    ///
    /// The store is left untouched. Callers route this back to the user,
    /// then retry with `confirmed = true`.
    #[error("confirmation required to clear {scope} ({affected} records affected)")]
    ConfirmationRequired {
        /// The scope that would have been cleared.
        scope: ClearScope,
        /// How many records the clear would remove.
        affected: usize,
    },

    /// An external provider (LLM, speech-to-text, synthesis) failed.
    #[error("provider '{provider}' failed: {cause}")]
    Provider {
        /// Provider name.
        provider: String,
        /// The underlying cause.
        cause: String,
    },

    /// An operation failed.
    ///
    /// Raised when:
    /// - The configuration file cannot be read or parsed
    /// - Logging has already been initialized
    /// - The log file cannot be opened
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Builds a storage error from an operation name and cause.
    pub fn storage(operation: impl Into<String>, cause: impl ToString) -> Self {
        Self::Storage {
            operation: operation.into(),
            cause: cause.to_string(),
        }
    }

    /// Builds a provider error from a provider name and cause.
    pub fn provider(provider: impl Into<String>, cause: impl ToString) -> Self {
        Self::Provider {
            provider: provider.into(),
            cause: cause.to_string(),
        }
    }

    /// Returns `true` for errors caused by the memory file.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage { .. })
    }
}

/// Result type alias for murmur operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("empty reminder".to_string());
        assert_eq!(err.to_string(), "invalid input: empty reminder");

        let err = Error::storage("write_memory_file", "disk full");
        assert_eq!(
            err.to_string(),
            "storage operation 'write_memory_file' failed: disk full"
        );
        assert!(err.is_storage());

        let err = Error::ConfirmationRequired {
            scope: ClearScope::All,
            affected: 4,
        };
        assert_eq!(
            err.to_string(),
            "confirmation required to clear all (4 records affected)"
        );

        let err = Error::provider("together", "timed out");
        assert_eq!(err.to_string(), "provider 'together' failed: timed out");
        assert!(!err.is_storage());
    }
}
