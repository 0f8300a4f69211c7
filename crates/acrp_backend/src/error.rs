//! Error types for provisioning backends.

use thiserror::Error;

/// Result type alias for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Output fragments (lowercased) that mark a failure as transient.
const TRANSIENT_MARKERS: &[&str] = &[
    "statuscode=429",
    "toomanyrequests",
    "too many requests",
    "throttl",
    "rate limit",
    "ratelimit",
    "retryableerror",
    "timeout",
    "timed out",
    "connection reset",
    "econnreset",
    "tls handshake",
    "statuscode=502",
    "statuscode=503",
    "statuscode=504",
    "serviceunavailable",
    "error installing provider",
];

/// Errors returned by a provisioning backend.
///
/// Transient errors may be retried; everything else is permanent.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Transient backend error: {0}")]
    Transient(String),

    #[error("Permanent backend error: {0}")]
    Permanent(String),

    #[error("Backend tool not available: {0}")]
    NotAvailable(String),

    #[error("No recorded state for {0}")]
    UnknownHandle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BackendError {
    /// Classify a failed command's output.
    pub fn from_output(operation: &str, output: &str) -> Self {
        let message = format!("{} failed: {}", operation, output.trim());
        if is_transient_output(output) {
            BackendError::Transient(message)
        } else {
            BackendError::Permanent(message)
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transient(_))
    }
}

/// Whether command output describes a transient failure.
pub fn is_transient_output(output: &str) -> bool {
    let lowered = output.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| lowered.contains(marker))
}
