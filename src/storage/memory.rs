//! In-memory storage backend.
//!
//! Holds the document in process memory. Failure switches let tests exercise
//! the store's retry and rollback paths.

use super::{MemoryBackend, MemoryDocument};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// In-memory storage backend.
///
/// Clones share the same underlying document, so a test can keep a handle
/// after moving one into a store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    document: Mutex<Option<MemoryDocument>>,
    failing_loads: AtomicUsize,
    fail_saves: AtomicBool,
    loads: AtomicUsize,
    saves: AtomicUsize,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-populated with a document.
    #[must_use]
    pub fn with_document(document: MemoryDocument) -> Self {
        let backend = Self::default();
        *backend.lock() = Some(document);
        backend
    }

    /// Makes the next `count` loads fail.
    pub fn fail_next_loads(&self, count: usize) {
        self.inner.failing_loads.store(count, Ordering::SeqCst);
    }

    /// Makes every save fail until switched off.
    pub fn set_fail_saves(&self, fail: bool) {
        self.inner.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Returns a copy of the stored document.
    #[must_use]
    pub fn snapshot(&self) -> Option<MemoryDocument> {
        self.lock().clone()
    }

    /// Number of load attempts so far.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.inner.loads.load(Ordering::SeqCst)
    }

    /// Number of successful saves so far.
    #[must_use]
    pub fn save_count(&self) -> usize {
        self.inner.saves.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<MemoryDocument>> {
        self.inner
            .document
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl MemoryBackend for InMemoryBackend {
    fn load(&self) -> Result<Option<MemoryDocument>> {
        self.inner.loads.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .inner
            .failing_loads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(Error::storage("load_memory", "injected load failure"));
        }
        Ok(self.lock().clone())
    }

    fn save(&self, document: &MemoryDocument) -> Result<()> {
        if self.inner.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::storage("save_memory", "injected save failure"));
        }
        *self.lock() = Some(document.clone());
        self.inner.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_backend_loads_none() {
        let backend = InMemoryBackend::new();
        assert!(backend.load().unwrap().is_none());
        assert_eq!(backend.load_count(), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let backend = InMemoryBackend::new();
        let handle = backend.clone();
        backend.save(&MemoryDocument::new()).unwrap();
        assert_eq!(handle.snapshot(), Some(MemoryDocument::new()));
        assert_eq!(handle.save_count(), 1);
    }

    #[test]
    fn test_injected_failures() {
        let backend = InMemoryBackend::with_document(MemoryDocument::new());
        backend.fail_next_loads(1);
        assert!(backend.load().is_err());
        assert!(backend.load().unwrap().is_some());

        backend.set_fail_saves(true);
        assert!(backend.save(&MemoryDocument::new()).is_err());
        assert_eq!(backend.save_count(), 0);
    }
}
