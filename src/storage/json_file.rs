//! JSON file storage backend.
//!
//! Stores the whole memory document as one pretty-printed JSON file so it can
//! be read and edited by hand.
//!
//! # Safety of writes
//!
//! Saves go to a sibling `*.json.tmp` file which is then renamed over the
//! target, so a crash mid-write leaves the previous file intact.
//!
//! A file in a legacy layout is copied to `*.json.bak` when it is loaded,
//! before any save can rewrite it. An existing backup is never replaced.
//!
//! # Limits
//!
//! Files larger than [`MAX_FILE_SIZE`] are refused on load to avoid reading
//! an arbitrarily large file into memory.

use super::legacy::{self, Layout};
use super::{MemoryBackend, MemoryDocument};
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Default memory file name inside a data directory.
pub const DEFAULT_FILE_NAME: &str = "memory.json";

/// Maximum accepted memory file size (16MB).
pub const MAX_FILE_SIZE: u64 = 16 * 1024 * 1024;

/// JSON file storage backend.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    /// Path of the memory file.
    path: PathBuf,
}

impl JsonFileBackend {
    /// Creates a backend for the given file path.
    ///
    /// Nothing is touched on disk until the first load or save.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a backend for `memory.json` inside `dir`, creating the directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the directory cannot be created.
    pub fn in_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| Error::storage("create_data_dir", e))?;
        Ok(Self::new(dir.join(DEFAULT_FILE_NAME)))
    }

    /// Returns the memory file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and decodes the file, reporting which layout it used.
    ///
    /// Returns `Ok(None)` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file is too large, unreadable, or not
    /// a recognised layout.
    pub fn load_with_layout(&self) -> Result<Option<(MemoryDocument, Layout)>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let metadata =
            fs::metadata(&self.path).map_err(|e| Error::storage("read_file_metadata", e))?;
        if metadata.len() > MAX_FILE_SIZE {
            return Err(Error::storage(
                "read_memory_file",
                format!(
                    "{} exceeds maximum size of {MAX_FILE_SIZE} bytes",
                    self.path.display()
                ),
            ));
        }

        let raw =
            fs::read_to_string(&self.path).map_err(|e| Error::storage("read_memory_file", e))?;
        if raw.trim().is_empty() {
            tracing::warn!(path = %self.path.display(), "Memory file is empty, starting fresh");
            return Ok(Some((MemoryDocument::new(), Layout::Current)));
        }

        let (document, layout) = legacy::decode(&raw)?;
        if layout.is_legacy() {
            self.back_up(&raw)?;
        }
        Ok(Some((document, layout)))
    }

    /// Returns the path legacy files are copied to.
    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        self.sibling("bak")
    }

    fn back_up(&self, raw: &str) -> Result<()> {
        let backup = self.backup_path();
        if backup.exists() {
            return Ok(());
        }
        fs::write(&backup, raw).map_err(|e| Error::storage("write_backup_file", e))?;
        tracing::info!(
            path = %self.path.display(),
            backup = %backup.display(),
            "Backed up legacy memory file"
        );
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        self.sibling("tmp")
    }

    fn sibling(&self, extension: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".");
        name.push(extension);
        self.path.with_file_name(name)
    }
}

impl MemoryBackend for JsonFileBackend {
    fn load(&self) -> Result<Option<MemoryDocument>> {
        Ok(self.load_with_layout()?.map(|(document, _)| document))
    }

    fn save(&self, document: &MemoryDocument) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::storage("create_data_dir", e))?;
        }

        let json = serde_json::to_string_pretty(document)
            .map_err(|e| Error::storage("serialize_memory", e))?;

        let temp = self.temp_path();
        fs::write(&temp, json).map_err(|e| Error::storage("write_memory_file", e))?;
        fs::rename(&temp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp);
            Error::storage("rename_memory_file", e)
        })?;

        tracing::debug!(
            path = %self.path.display(),
            records = document.long_term.len(),
            "Saved memory file"
        );
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json file {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Fact, RecordId};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn document_with_fact(content: &str) -> MemoryDocument {
        let mut doc = MemoryDocument::new();
        doc.long_term.facts.push(Fact {
            id: RecordId::new("f1"),
            content: content.to_string(),
            category: None,
            created_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(9, 0, 0)
                .unwrap(),
        });
        doc
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::new(dir.path().join("memory.json"));
        assert!(backend.load().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::in_dir(dir.path()).unwrap();

        let doc = document_with_fact("likes tea");
        backend.save(&doc).unwrap();

        assert_eq!(backend.load().unwrap(), Some(doc));
        assert!(!backend.temp_path().exists());
    }

    #[test]
    fn test_save_overwrites() {
        let dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::in_dir(dir.path()).unwrap();

        backend.save(&document_with_fact("first")).unwrap();
        backend.save(&document_with_fact("second")).unwrap();

        let loaded = backend.load().unwrap().unwrap();
        assert_eq!(loaded.long_term.facts[0].content, "second");
    }

    #[test]
    fn test_file_is_pretty_printed() {
        let dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::in_dir(dir.path()).unwrap();
        backend.save(&document_with_fact("likes tea")).unwrap();

        let raw = fs::read_to_string(backend.path()).unwrap();
        assert!(raw.contains("\n  \"long_term\""));
        assert!(raw.contains("\"created_at\": \"2024-01-01 09:00:00\""));
    }

    #[test]
    fn test_in_dir_creates_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let backend = JsonFileBackend::in_dir(&nested).unwrap();
        assert!(nested.exists());
        assert_eq!(backend.path(), nested.join(DEFAULT_FILE_NAME));
    }

    #[test]
    fn test_empty_file_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::in_dir(dir.path()).unwrap();
        fs::write(backend.path(), "  \n").unwrap();
        assert_eq!(backend.load().unwrap(), Some(MemoryDocument::new()));
    }

    #[test]
    fn test_corrupt_file_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::in_dir(dir.path()).unwrap();
        fs::write(backend.path(), "{ not json").unwrap();
        assert!(backend.load().unwrap_err().is_storage());
    }

    #[test]
    fn test_legacy_layout_reports_layout() {
        let dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::in_dir(dir.path()).unwrap();
        fs::write(
            backend.path(),
            r#"{"reminders": [], "facts": [{"content": "x", "timestamp": "2024-01-01 09:00:00"}]}"#,
        )
        .unwrap();

        let (doc, layout) = backend.load_with_layout().unwrap().unwrap();
        assert_eq!(layout, Layout::Flat);
        assert_eq!(doc.long_term.facts.len(), 1);
    }

    #[test]
    fn test_legacy_file_is_backed_up_before_rewrite() {
        let dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::in_dir(dir.path()).unwrap();
        let raw = r#"{"reminders": [{"message": "dentist", "datetime": "someday"}], "notes": ["keep me"]}"#;
        fs::write(backend.path(), raw).unwrap();

        let doc = backend.load().unwrap().unwrap();
        assert!(doc.long_term.reminders.is_empty());
        backend.save(&doc).unwrap();

        assert_eq!(fs::read_to_string(backend.backup_path()).unwrap(), raw);
        assert!(!fs::read_to_string(backend.path()).unwrap().contains("keep me"));

        backend.load().unwrap();
        assert_eq!(fs::read_to_string(backend.backup_path()).unwrap(), raw);
    }

    #[test]
    fn test_current_layout_is_not_backed_up() {
        let dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::in_dir(dir.path()).unwrap();
        backend.save(&document_with_fact("likes tea")).unwrap();
        backend.load().unwrap();
        assert!(!backend.backup_path().exists());
    }

    #[test]
    fn test_unrecognised_file_is_refused_and_left_alone() {
        let dir = TempDir::new().unwrap();
        let backend = JsonFileBackend::in_dir(dir.path()).unwrap();
        let raw = r#"{"notes": ["keep me"]}"#;
        fs::write(backend.path(), raw).unwrap();

        assert!(backend.load().unwrap_err().is_storage());
        assert_eq!(fs::read_to_string(backend.path()).unwrap(), raw);
    }
}
