//! Error types for probes.

use thiserror::Error;

use crate::data::ErrorCategory;

/// Errors that can occur while polling a data source.
///
/// Every variant is recovered inside the worker that produced it; none of
/// them stop the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    /// Timeout waiting for a response or a subprocess.
    #[error("Request timed out")]
    Timeout,

    /// Connection failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// HTTP request failed for another reason.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The endpoint answered with a non-success status.
    #[error("HTTP {0}")]
    Status(u16),

    /// The response could not be understood.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// A subprocess exited unsuccessfully.
    #[error("Command failed: {0}")]
    Command(String),

    /// The tool or runtime needed for the check is not available.
    #[error("Unavailable: {0}")]
    Unavailable(String),
}

impl ProbeError {
    /// The alert category this failure raises, if any.
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            ProbeError::Timeout => Some(ErrorCategory::Timeout),
            ProbeError::Status(429) => Some(ErrorCategory::RateLimit),
            ProbeError::Status(401) | ProbeError::Status(403) => Some(ErrorCategory::AuthFailure),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProbeError::Timeout
        } else if err.is_connect() {
            ProbeError::Connection(err.to_string())
        } else if err.is_decode() {
            ProbeError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            ProbeError::Status(status.as_u16())
        } else {
            ProbeError::Http(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        assert_eq!(ProbeError::Timeout.category(), Some(ErrorCategory::Timeout));
        assert_eq!(ProbeError::Status(429).category(), Some(ErrorCategory::RateLimit));
        assert_eq!(ProbeError::Status(401).category(), Some(ErrorCategory::AuthFailure));
        assert_eq!(ProbeError::Status(403).category(), Some(ErrorCategory::AuthFailure));
        assert_eq!(ProbeError::Status(500).category(), None);
        assert_eq!(ProbeError::Connection("refused".into()).category(), None);
    }

    #[test]
    fn display() {
        assert_eq!(ProbeError::Status(503).to_string(), "HTTP 503");
        assert_eq!(ProbeError::Timeout.to_string(), "Request timed out");
    }
}
