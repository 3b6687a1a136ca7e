//! Error types for the dispatch layer.
//!
//! Only precondition violations and configuration problems are returned as
//! `Err`. Failures that happen to an admitted request (the resource erroring,
//! an admission timeout, a closed gate) are carried inside the request's
//! [`Outcome`](crate::dispatch::Outcome) so that sibling requests in a burst
//! are never aborted by one bad slot.

use std::time::Duration;
use serde::Serialize;

/// A tensor whose dimensions do not match the mounted model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("flattened input must be length {expected} (got {got})")]
    FlatLength { expected: usize, got: usize },

    #[error("image must be {height}x{width} (h×w), got {got_height} rows")]
    RowCount { width: usize, height: usize, got_height: usize },

    #[error("row {row} must have {width} values (got {got})")]
    RowWidth { row: usize, width: usize, got: usize },

    #[error("tensor is {got_width}x{got_height} but the mounted model expects {width}x{height}")]
    Mismatch { width: usize, height: usize, got_width: usize, got_height: usize },
}

/// A failure raised by the exclusive resource while serving one request.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ResourceError {
    #[error("backend error: {0}")]
    Backend(String),

    #[error("resource produced an empty output vector")]
    EmptyOutput,

    #[error("resource produced {got} outputs, expected {expected}")]
    OutputLength { expected: usize, got: usize },

    #[error("resource panicked: {0}")]
    Panicked(String),

    #[error("dispatch task was cancelled before completion")]
    Cancelled,
}

/// Why a request never reached the resource.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AdmissionError {
    #[error("no admission permit within {waited:?}")]
    TimedOut {
        #[serde(rename = "waited_ms", serialize_with = "crate::time::serialize_millis")]
        waited: Duration,
    },

    #[error("admission gate is closed")]
    Closed,
}

/// Errors returned synchronously by dispatcher entry points.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error("n must be 1..{max} (got {n})")]
    InvalidBurstSize { n: usize, max: usize },

    #[error("batch must contain at least one tensor")]
    EmptyBatch,

    #[error("batch item {index}: {source}")]
    BatchItem { index: usize, source: ShapeError },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetricsError {
    #[error("cannot summarize an empty sample set")]
    NoSamples,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be at least 1")]
    Zero { field: &'static str },

    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session {0} has already been stopped")]
    Stopped(uuid::Uuid),
}
