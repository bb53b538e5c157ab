//! Error types for rssagg.

use thiserror::Error;

/// Common error type for rssagg.
#[derive(Error, Debug)]
pub enum AggError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant. Duplicate post
    /// URLs never surface here; the post store reports them as
    /// [`InsertOutcome::Duplicate`](crate::feed::InsertOutcome::Duplicate).
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network failure while fetching a feed (connect, timeout, status, size).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The fetched document could not be turned into entries.
    #[error("feed parse error: {0}")]
    FeedParse(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for AggError {
    fn from(e: sqlx::Error) -> Self {
        AggError::Database(e.to_string())
    }
}

/// Result type alias for rssagg operations.
pub type Result<T> = std::result::Result<T, AggError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_display() {
        let err = AggError::Http("HTTP status 503 Service Unavailable".to_string());
        assert_eq!(
            err.to_string(),
            "HTTP error: HTTP status 503 Service Unavailable"
        );
    }

    #[test]
    fn test_feed_parse_error_display() {
        let err = AggError::FeedParse("unexpected end of document".to_string());
        assert_eq!(err.to_string(), "feed parse error: unexpected end of document");
    }

    #[test]
    fn test_not_found_error_display() {
        let err = AggError::NotFound("feed".to_string());
        assert_eq!(err.to_string(), "feed not found");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AggError = io_err.into();
        assert!(matches!(err, AggError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_sqlx_error_conversion() {
        let err: AggError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AggError::Database(_)));
    }
}
