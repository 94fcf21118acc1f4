//! Intent extraction.
//!
//! The hosted model answers every utterance with one JSON action object
//! (`{action, message, data?, needs_confirmation?, confirmation_message?}`).
//! This module turns that object into a typed [`Intent`], resolving any time
//! it mentions with the offline [`time_phrase`] parser as a fallback.

mod action;
pub mod time_phrase;

pub use action::{ActionData, ActionEnvelope, Intent, ParsedAction, parse_action};
pub use time_phrase::{parse_time_phrase, split_time_phrase};
