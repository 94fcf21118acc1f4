//! Command handlers module.
//!
//! This module organizes the CLI command implementations into separate files:
//! - `memory.rs`: Offline store commands (remind, event, fact, list, week,
//!   update, complete, clear, cleanup, query, context, import)
//! - `assistant.rs`: LLM-backed commands (ask, run)

mod assistant;
mod memory;

pub use assistant::{cmd_ask, cmd_run};
pub use memory::{
    cmd_clear, cmd_cleanup, cmd_complete, cmd_context, cmd_event, cmd_fact, cmd_import, cmd_list,
    cmd_query, cmd_remind, cmd_update, cmd_week,
};

use chrono::NaiveDateTime;
use murmur::intent::parse_time_phrase;
use murmur::models::time::parse_timestamp;
use murmur::storage::JsonFileBackend;
use murmur::{MemoryStore, MurmurConfig, RecordId, StoreConfig};
use std::error::Error;

/// Opens the configured JSON store.
pub(crate) fn open_store(
    config: &MurmurConfig,
) -> Result<MemoryStore<JsonFileBackend>, Box<dyn Error>> {
    open_store_with(config, StoreConfig::from_config(config))
}

/// Opens the configured JSON store with explicit store settings.
pub(crate) fn open_store_with(
    config: &MurmurConfig,
    store_config: StoreConfig,
) -> Result<MemoryStore<JsonFileBackend>, Box<dyn Error>> {
    let backend = JsonFileBackend::in_dir(&config.data_dir)?;
    tracing::debug!(path = %backend.path().display(), "Opening memory file");
    Ok(MemoryStore::open(backend, store_config)?)
}

/// Parses a timestamp or natural time phrase.
pub(crate) fn parse_time(raw: &str, now: NaiveDateTime) -> Result<NaiveDateTime, Box<dyn Error>> {
    parse_timestamp(raw)
        .or_else(|| parse_time_phrase(raw, now))
        .ok_or_else(|| format!("could not understand the time '{raw}'").into())
}

/// Resolves a full identifier or a unique identifier prefix.
pub(crate) fn resolve_id(
    store: &MemoryStore<JsonFileBackend>,
    raw: &str,
) -> Result<RecordId, Box<dyn Error>> {
    let raw = raw.trim();
    let exact = RecordId::new(raw);
    if store.get(&exact).is_some() {
        return Ok(exact);
    }
    if raw.is_empty() {
        return Err("record id cannot be empty".into());
    }

    let matches: Vec<&RecordId> = store
        .memory()
        .records()
        .map(|r| r.id())
        .filter(|id| id.as_str().starts_with(raw))
        .collect();
    match matches.as_slice() {
        [id] => Ok((*id).clone()),
        [] => Err(murmur::Error::NotFound(raw.to_string()).into()),
        _ => Err(format!("id prefix '{raw}' matches {} records", matches.len()).into()),
    }
}
