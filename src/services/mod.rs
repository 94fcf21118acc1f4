//! Business logic services.
//!
//! The memory store owns long-term memory; the other services are views and
//! background work built on top of it.

mod calendar;
mod context;
mod memory_store;
mod query;
mod scheduler;

pub use calendar::{ScheduledItem, WEEK_DAYS, WeeklyView};
pub use context::{ContextualMemory, TOPIC_CONVERSATIONS, UPCOMING_EVENT_HOURS};
pub use memory_store::{ClearOutcome, MemoryStore, StoreConfig};
pub use query::{RelevantMatch, RelevantQuery};
pub use scheduler::{DUE_TITLE, ReminderScheduler, TickReport, UPCOMING_TITLE, run_scheduler};
