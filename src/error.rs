//! Error types for the filesystem API
//!
//! Every verb handler returns `Result<_, FsApiError>`; the router turns the error into a response.

use thiserror::Error;

/// Failures a request can end in
#[derive(Debug, Error)]
pub enum FsApiError {
    /// No entry at the target path, or a directory where a file was expected
    #[error("item not found")]
    NotFound,

    /// Create target already exists
    #[error("Item Exists")]
    ItemExists,

    /// Request body or path could not be understood
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Request body exceeds `http.max_body_size`
    #[error("payload too large")]
    PayloadTooLarge,

    /// Underlying filesystem failure
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

impl FsApiError {
    /// HTTP status the router answers with
    ///
    /// `NotFound` keeps a 200 status with a `null` body so existing clients
    /// can tell "absent" apart by the body alone.
    pub const fn status(&self) -> u16 {
        match self {
            Self::NotFound => 200,
            Self::ItemExists | Self::BadRequest(_) => 400,
            Self::PayloadTooLarge => 413,
            Self::Io(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, FsApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(FsApiError::NotFound.status(), 200);
        assert_eq!(FsApiError::ItemExists.status(), 400);
        assert_eq!(FsApiError::BadRequest("x".into()).status(), 400);
        assert_eq!(FsApiError::PayloadTooLarge.status(), 413);
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(FsApiError::from(io).status(), 500);
    }

    #[test]
    fn test_item_exists_message() {
        assert_eq!(FsApiError::ItemExists.to_string(), "Item Exists");
    }
}
