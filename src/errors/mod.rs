//! Centralized error handling for the curator pipeline.
//!
//! Errors are layered the same way the pipeline is: [`SourceError`] covers
//! fetching and parsing playlist sources, [`ProbeError`] covers stream
//! probing, and [`AppError`] is the top-level type surfaced out of `main`.
//!
//! Cancellation is modelled as an error variant so it can flow through `?`,
//! but it is not a failure condition: callers check
//! [`ProbeError::is_cancelled`] and neither retry nor log it as an error.

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for source fetch/parse Results
pub type SourceResult<T> = Result<T, SourceError>;

/// Convenience type alias for probe Results
pub type ProbeResult<T> = Result<T, ProbeError>;
