//! Error type definitions for the curator pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration loading or validation errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Source fetch/parse errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Stream probing errors
    #[error("Probe error: {0}")]
    Probe(#[from] ProbeError),

    /// Output write failures are fatal to the whole run
    #[error("Failed to write output {}: {source}", .path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Errors raised while loading or parsing a playlist source
#[derive(Error, Debug)]
pub enum SourceError {
    /// The first content line of an extended playlist did not declare the
    /// EPG attribute header. Fatal to that source only.
    #[error("Invalid playlist header: {line}")]
    InvalidHeader { line: String },

    /// Non-2xx response while fetching a source
    #[error("Request failed with status {status}: {url}")]
    Http { status: u16, url: String },

    /// Transport-level fetch failures
    #[error("Fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    /// Local file read failures
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The fetch was interrupted by shutdown
    #[error("Fetch cancelled")]
    Cancelled,
}

impl SourceError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Errors raised by the probe primitives
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Transport-level request failures
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-2xx response status
    #[error("Request failed with status {status}")]
    Status { status: u16 },

    /// A throughput sample observed no bytes or no elapsed time; treated as
    /// a measurement error, never as a pass.
    #[error("Empty throughput sample")]
    EmptySample,

    /// An HLS playlist contained no media segment URIs
    #[error("No media segments found in playlist: {url}")]
    NoSegments { url: String },

    /// Variant playlist indirection exceeded the recursion bound
    #[error("Playlist nesting exceeds maximum depth {max}")]
    PlaylistTooDeep { max: usize },

    /// The probed URL could not be parsed
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Failure loading a playlist document during HLS resolution
    #[error("Playlist load failed: {message}")]
    PlaylistLoad { message: String },

    /// The probe was interrupted by shutdown. Never retried, never counted
    /// as a failure.
    #[error("Probe cancelled")]
    Cancelled,
}

impl ProbeError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<SourceError> for ProbeError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Cancelled => ProbeError::Cancelled,
            SourceError::Http { status, .. } => ProbeError::Status { status },
            SourceError::Fetch(e) => ProbeError::Request(e),
            other => ProbeError::PlaylistLoad {
                message: other.to_string(),
            },
        }
    }
}
