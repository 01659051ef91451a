//! Error types for shellcache.
//!
//! All fallible operations in the core return [`Result<T>`].

use thiserror::Error;

/// Result type alias for shellcache operations
pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request to {url} failed with status {status}")]
    BadStatus { url: String, status: u16 },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Resource table not found in script: {0}")]
    ScriptParse(String),

    #[error("Activation failed, caches were reset: {0}")]
    Activation(#[source] Box<CacheError>),
}

/// Maximum length for URLs and bodies embedded in error messages
const MAX_ERROR_DETAIL_LENGTH: usize = 200;

impl CacheError {
    /// Truncate a detail string to avoid logging excessive data
    fn truncate_detail(detail: &str) -> String {
        if detail.len() <= MAX_ERROR_DETAIL_LENGTH {
            detail.to_string()
        } else {
            let mut end = MAX_ERROR_DETAIL_LENGTH;
            while !detail.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &detail[..end], detail.len())
        }
    }

    pub fn bad_status(url: &str, status: u16) -> Self {
        CacheError::BadStatus {
            url: Self::truncate_detail(url),
            status,
        }
    }

    /// True when the error came from the network rather than from storage.
    pub fn is_network(&self) -> bool {
        matches!(self, CacheError::Network(_) | CacheError::BadStatus { .. })
    }
}

impl From<reqwest::Error> for CacheError {
    fn from(err: reqwest::Error) -> Self {
        CacheError::Network(err.to_string())
    }
}
