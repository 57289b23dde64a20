//! Request execution engine: call sites and their debounced, paginated, and infinite variants.

pub mod call_site;
pub mod debounce;
pub mod infinite;
pub mod options;
pub mod pagination;
pub mod state;
