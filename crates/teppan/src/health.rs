//! Read-only snapshots for health and configuration reporting.

use std::time::Duration;
use chrono::{DateTime, Utc};
use serde::Serialize;
use crate::resource::ExecutionPath;
use crate::time::serialize_secs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    /// Shutdown has begun; no new requests are admitted
    Closed,
}

/// Point-in-time health of a dispatcher.
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: HealthStatus,

    #[serde(rename = "uptime_s", serialize_with = "serialize_secs")]
    pub uptime: Duration,

    /// Requests holding an admission permit when the snapshot was taken
    pub inflight: usize,

    pub peak_inflight: usize,

    pub capacity: usize,

    pub execution_path: ExecutionPath,
}

/// Static facts about the mounted model and dispatcher limits.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    /// `[width, height]`
    pub input: [usize; 2],

    pub classes: usize,

    pub execution_path: ExecutionPath,

    pub capacity: usize,

    pub max_burst: usize,

    pub started_at: DateTime<Utc>,
}
