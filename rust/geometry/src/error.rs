use thiserror::Error;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during geometry processing.
///
/// Degenerate geometry is recoverable by policy: callers skip the
/// offending element and continue, so this surface stays small.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Degenerate ring: {0}")]
    DegenerateRing(String),

    #[error("Boolean operation failed: {0}")]
    BooleanError(String),
}
