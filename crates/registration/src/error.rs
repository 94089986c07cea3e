//! Registration error types.

use thiserror::Error;

/// Failure of a single call to a downstream endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownstreamError {
    /// The request never produced a response.
    #[error("{endpoint}: transport error: {reason}")]
    Transport { endpoint: String, reason: String },

    /// The transport gave up waiting for a response.
    #[error("{endpoint}: request timed out")]
    Timeout { endpoint: String },

    /// The endpoint answered with a failing status code.
    #[error("{endpoint}: returned status {status}")]
    Status { endpoint: String, status: u16 },

    /// The notify deadline elapsed before the endpoint call finished.
    #[error("{endpoint}: deadline of {deadline_ms} ms exceeded")]
    DeadlineExceeded { endpoint: String, deadline_ms: u64 },
}

/// Why a registration did not commit.
///
/// Callers never see this type directly; it is rendered into the failure
/// message of the result envelope and into logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// The email is already registered.
    #[error("Email {0} already exists.")]
    Validation(String),

    /// The store or audit write failed; nothing was sent downstream.
    #[error("{0}")]
    Persistence(String),

    /// At least one endpoint failed after retries; the registration was rolled back.
    #[error("{0}")]
    Downstream(String),

    /// An undo step failed. Reported alongside the downstream failure.
    #[error("Compensation failed: {0}")]
    Compensation(String),
}
