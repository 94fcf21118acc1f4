//! Data models for murmur.
//!
//! This module contains the record types held in long-term memory and the
//! small enums used to address and mutate them.

mod domain;
mod memory;
pub mod time;
mod update;

pub use domain::{ClearScope, RecordKind, ReminderStatus};
pub use memory::{
    ConversationTurn, Event, Fact, NewRecord, RecordId, RecordPayload, RecordRef, Reminder,
};
pub use update::RecordUpdate;
