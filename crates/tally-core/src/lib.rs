//! # tally-core
//!
//! Foundation crate for the Tally entitlement engine.
//! Defines record types, plan/quota tables, errors, config, and time
//! helpers. The engine crate depends on this; nothing here performs I/O
//! beyond reading config.

pub mod config;
pub mod errors;
pub mod plans;
pub mod records;
pub mod time;
pub mod tracing;

// Re-export the most commonly used types at the crate root.
pub use config::SubscriptionConfig;
pub use errors::{StoreError, VerifyError};
pub use records::{EntitlementRecord, RecordStore, SubscriptionStatus};
