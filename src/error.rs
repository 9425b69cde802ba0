//! Transform error types
//!
//! Defines every error condition the call-transform engine can raise:
//! configuration errors detected when a pipeline is built, insufficient-data
//! errors for calls that cannot produce a partial result, and errors raised
//! by the raw-sample source, which are passed through unchanged.

use crate::sample::ValueKind;
use thiserror::Error;

/// Boxed error type produced by external sample sources
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while building or advancing a transform pipeline
#[derive(Error, Debug)]
pub enum TransformError {
    /// The call name is not one the engine implements
    #[error("Unknown call: {0}")]
    UnknownCall(String),

    /// A literal argument has the wrong shape or value
    #[error("Invalid argument for {call}: {reason}")]
    InvalidArgument { call: String, reason: String },

    /// The call cannot consume samples of this kind
    #[error("{call} does not support {kind} input")]
    UnsupportedKind { call: String, kind: ValueKind },

    /// The stream handed to the engine does not match the declared kind
    #[error("Kind mismatch: options declare {declared}, stream yields {actual}")]
    KindMismatch {
        declared: ValueKind,
        actual: ValueKind,
    },

    /// Not enough history to produce any output at all
    #[error("Insufficient data for {call}: {reason}")]
    InsufficientData { call: String, reason: String },

    /// A duration literal could not be parsed
    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    /// Invalid time range or grouping interval
    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    /// Error raised by the raw-sample source, displayed verbatim
    #[error(transparent)]
    Source(BoxError),
}

impl TransformError {
    /// Wrap an error raised by a sample source
    pub fn from_source(err: impl Into<BoxError>) -> Self {
        TransformError::Source(err.into())
    }

    /// Shorthand for an invalid-argument error
    pub fn invalid_argument(call: &str, reason: impl Into<String>) -> Self {
        TransformError::InvalidArgument {
            call: call.to_string(),
            reason: reason.into(),
        }
    }

    /// Shorthand for an insufficient-data error
    pub fn insufficient_data(call: &str, reason: impl Into<String>) -> Self {
        TransformError::InsufficientData {
            call: call.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether this error was detected while building the pipeline,
    /// before any sample was consumed
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            TransformError::UnknownCall(_)
                | TransformError::InvalidArgument { .. }
                | TransformError::UnsupportedKind { .. }
                | TransformError::KindMismatch { .. }
                | TransformError::InvalidDuration(_)
                | TransformError::InvalidTimeRange(_)
        )
    }
}

/// Result type for transform operations
pub type TransformResult<T> = Result<T, TransformError>;
