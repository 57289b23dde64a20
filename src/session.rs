//! Credential lifecycle: token storage, token decoding, and the session state machine.

pub mod manager;
pub mod storage;
pub mod token;
