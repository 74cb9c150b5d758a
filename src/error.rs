//! Error types for the Tollgate crate.

use thiserror::Error;

/// Errors raised when constructing a limiter.
///
/// Validation happens up front so a half-configured limiter never exists.
/// Per-request failure modes (an unresolvable caller identity, missing
/// middleware wiring, a panicking diagnostics callback) are recovered
/// inside the enforcement layer and never surface as errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The maximum event count must be strictly positive.
    #[error("max_events must be positive")]
    InvalidMaxEvents,

    /// The window duration must be strictly positive.
    #[error("window must be a positive duration")]
    InvalidWindow,
}

/// Result type alias for Tollgate operations.
pub type Result<T> = std::result::Result<T, Error>;
