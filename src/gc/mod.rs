//! Garbage collection module.
//!
//! Enforces the retention policy on long-term memory: records older than the
//! retention horizon are removed and repeated facts are collapsed to the
//! oldest copy.
//!
//! # Example
//!
//! ```rust,ignore
//! use murmur::gc::{RetentionConfig, RetentionGarbageCollector};
//!
//! // Load retention config from environment (default: 365 days)
//! let gc = RetentionGarbageCollector::new(RetentionConfig::new().with_env_overrides());
//!
//! let result = gc.collect(&mut document.long_term, now, false);
//! println!("{}", result.summary());
//! ```
//!
//! The [`MemoryStore`](crate::MemoryStore) runs the collector from its
//! `cleanup` operation; the assistant calls that after every handled action.

mod retention;

pub use retention::{
    CONTEXT_DAYS_ENV, DEFAULT_CONTEXT_DAYS, DEFAULT_MAX_CONTEXT_CONVERSATIONS,
    DEFAULT_MAX_RELEVANT_FACTS, DEFAULT_RETENTION_DAYS, RETENTION_DAYS_ENV, RetentionConfig,
    RetentionGarbageCollector, RetentionGcResult, fact_key,
};
