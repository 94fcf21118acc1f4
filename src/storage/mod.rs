//! Storage layer.
//!
//! The whole memory lives in one [`MemoryDocument`]. Backends load and save
//! that document as a unit:
//! - [`JsonFileBackend`]: pretty-printed `memory.json`, written via a temp file and rename
//! - [`InMemoryBackend`]: process-local, used by tests and dry runs

mod document;
pub mod json_file;
pub mod legacy;
pub mod memory;
pub mod traits;

pub use document::{DOCUMENT_VERSION, LongTermMemory, MemoryDocument};
pub use json_file::JsonFileBackend;
pub use memory::InMemoryBackend;
pub use traits::MemoryBackend;
