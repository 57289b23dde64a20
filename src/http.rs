//! HTTP collaborator: request/response interceptors, status mapping, and retry scheduling.

pub mod client;
pub mod retry;
pub mod status;
