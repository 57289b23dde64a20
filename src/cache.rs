//! Per-call-site response cache with lazy expiry.

pub mod entry;
pub mod store;
