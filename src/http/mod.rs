//! HTTP protocol layer module
//!
//! Request body parsing, query flags, MIME inference and response builders,
//! kept apart from the item semantics in `handler`.

pub mod form;
pub mod mime;
pub mod query;
pub mod response;

// Re-export commonly used types
pub use form::{Attachment, Content, FieldValue, FormData};
pub use query::QueryFlags;
pub use response::{
    build_404_response, build_405_response, build_413_response, build_500_response,
    build_file_response, build_health_response, build_json_response, build_null_response,
    build_options_response, build_text_response, ResponseBody,
};
