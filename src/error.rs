//! Errors raised inside the tracing layer.
//!
//! None of these cross the tracing boundary: construction failures degrade
//! the affected backend to inert behavior and export failures are logged by
//! the worker that hit them. Only the traced operation's own errors are ever
//! visible to callers.

use std::sync::PoisonError;
use thiserror::Error;

/// Result type for fallible operations inside the tracing layer.
pub type TraceResult<T> = Result<T, TraceError>;

/// Errors that can occur while constructing a backend or exporting spans.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TraceError {
    /// The configured exporter endpoint could not be used.
    #[error("invalid exporter endpoint {endpoint}: {reason}")]
    InvalidEndpoint {
        /// The endpoint as configured.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A batch could not be delivered to its destination.
    #[error("export failed: {0}")]
    ExportFailed(String),

    /// Serializing a span or segment for the wire failed.
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// Socket setup or send failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Other types of failures not covered by the variants above.
    #[error("{0}")]
    Internal(String),
}

impl<T> From<PoisonError<T>> for TraceError {
    fn from(err: PoisonError<T>) -> Self {
        TraceError::Internal(err.to_string())
    }
}
