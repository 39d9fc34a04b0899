//! fsapi: a JSON/HTTP API over one directory subtree.
//!
//! Items are addressed by logical paths under the configured mount prefix.
//! `GET` inspects, lists or downloads, `POST` creates, `PATCH` renames or
//! replaces content, and `DELETE` removes.

pub mod config;
pub mod error;
pub mod fs;
pub mod handler;
pub mod http;
pub mod logger;
pub mod server;
