//! Error types for the entitlement engine, one enum per layer.
//!
//! These never cross the manager's public surface — every public
//! operation converts them to boolean/absent results and logs the
//! cause.

pub mod store_error;
pub mod verify_error;

pub use store_error::StoreError;
pub use verify_error::VerifyError;
