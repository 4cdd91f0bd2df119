//! Record store error taxonomy.
//!
//! Every remote failure lands in exactly one variant so callers that only
//! see a collapsed `bool` can still log the cause. A missing record is not
//! an error: lookups return `Ok(None)`.

use thiserror::Error;

/// Failures talking to the question record store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store could not be reached (DNS, connect, transport)
    #[error("Store unreachable: {0}")]
    Unreachable(String),

    /// Store call exceeded its time budget
    #[error("Store call timed out: {0}")]
    Timeout(String),

    /// Store answered with a non-success status
    #[error("Store returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response payload could not be decoded
    #[error("Malformed store response: {0}")]
    Malformed(String),

    /// Caller supplied an argument the store must never see
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Store client could not be constructed
    #[error("Store configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Build a status error, truncating long bodies
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        let mut body = body.into();
        if body.len() > 512 {
            let mut cut = 512;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Self::Status { status, body }
    }

    /// Stable label for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unreachable(_) => "unreachable",
            Self::Timeout(_) => "timeout",
            Self::Status { .. } => "status",
            Self::Malformed(_) => "malformed",
            Self::InvalidInput(_) => "invalid_input",
            Self::Config(_) => "config",
        }
    }

    /// Returns true if the same call could succeed later
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unreachable(_) | Self::Timeout(_) => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Timeout("10s".into()).is_transient());
        assert!(StoreError::Unreachable("refused".into()).is_transient());
        assert!(StoreError::status(503, "busy").is_transient());
        assert!(StoreError::status(429, "slow down").is_transient());
        assert!(!StoreError::status(404, "no table").is_transient());
        assert!(!StoreError::Malformed("eof".into()).is_transient());
    }

    #[test]
    fn test_status_body_truncated() {
        let err = StoreError::status(500, "é".repeat(400));
        match err {
            StoreError::Status { body, .. } => assert!(body.len() <= 512),
            other => panic!("unexpected {other:?}"),
        }
    }
}
