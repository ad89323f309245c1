//! Error types for the scan pipeline
//!
//! Only conditions that stop a scan are errors. A low-confidence parse or a
//! "no match" decision are ordinary outcomes carried in `ScanResult`.

use thiserror::Error;

/// Result type for scan operations
pub type Result<T> = std::result::Result<T, ScanError>;

/// Failure reported by a vision model client
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VisionError {
    #[error("vision call timed out")]
    Timeout,

    #[error("vision service unavailable: {0}")]
    Unavailable(String),

    #[error("vision service quota exceeded")]
    QuotaExceeded,
}

/// Failure reported by a card database client
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error("card search timed out")]
    Timeout,

    #[error("card search unavailable: {0}")]
    Unavailable(String),
}

/// Errors that abort a scan
#[derive(Error, Debug)]
pub enum ScanError {
    /// Undecodable or zero-sized image. Never retried.
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Vision service still failing after the retry budget was spent
    #[error("Vision service error: {0}")]
    VisionService(#[from] VisionError),

    /// Every search level failed and nothing was found
    #[error("Card search unavailable: {0}")]
    SearchUnavailable(#[from] SearchError),

    /// Caller cancelled the scan
    #[error("Scan cancelled")]
    Cancelled,

    /// Invalid scan configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<cardscan_common::Error> for ScanError {
    fn from(err: cardscan_common::Error) -> Self {
        ScanError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_errors_convert() {
        let err: ScanError = VisionError::QuotaExceeded.into();
        assert!(matches!(err, ScanError::VisionService(VisionError::QuotaExceeded)));

        let err: ScanError = SearchError::Timeout.into();
        assert_eq!(err.to_string(), "Card search unavailable: card search timed out");
    }

    #[test]
    fn test_common_error_maps_to_config() {
        let err: ScanError = cardscan_common::Error::Config("bad".into()).into();
        assert!(matches!(err, ScanError::Config(_)));
    }
}
