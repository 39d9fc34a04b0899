//! Request handler module
//!
//! `router` turns HTTP requests into verb calls and responses; `verbs` holds the
//! item semantics for GET, POST, PATCH and DELETE.

pub mod router;
pub mod verbs;

// Re-export main entry point
pub use router::handle_request;
