//! Storage backend trait.

use super::MemoryDocument;
use crate::Result;

/// Trait for memory storage backends.
///
/// Backends are the authoritative copy of the memory document. They load and
/// save it whole; the store keeps the working copy.
pub trait MemoryBackend: Send {
    /// Loads the stored document.
    ///
    /// Returns `Ok(None)` when nothing has been stored yet.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] if the stored data cannot be read or parsed.
    fn load(&self) -> Result<Option<MemoryDocument>>;

    /// Replaces the stored document.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] if the document cannot be written.
    fn save(&self, document: &MemoryDocument) -> Result<()>;

    /// Short human-readable description, used in logs.
    fn describe(&self) -> String;
}
