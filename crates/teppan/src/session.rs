//! # Sessions
//!
//! A session is the caller's running log of dispatch results between an
//! explicit start and stop. The dispatcher never creates or owns one; it only
//! produces the [`DispatchResult`]s that get recorded. Sessions serialize to
//! JSON so whoever owns persistence can store them as-is.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use crate::burst::BurstJob;
use crate::dispatch::DispatchResult;
use crate::error::{MetricsError, SessionError};
use crate::metrics::{LatencySamples, LatencySummary};
use crate::time::millis;

/// Where a recorded result came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordSource {
    Single,
    Burst { job_id: Uuid, slot: usize },
}

/// The flattened, persistence-friendly form of one [`DispatchResult`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRecord {
    pub request_id: Uuid,
    pub source: RecordSource,
    pub succeeded: bool,
    pub top_index: Option<usize>,
    pub top_score: Option<f32>,
    pub queued_ms: f64,
    pub latency_ms: f64,
    pub inflight: usize,
    pub when: DateTime<Utc>,
}

impl SessionRecord {
    pub fn from_result(result: &DispatchResult, source: RecordSource) -> Self {
        Self {
            request_id: result.request_id(),
            source,
            succeeded: result.is_success(),
            top_index: result.top_index(),
            top_score: result.top_score(),
            queued_ms: millis(result.queue_delay()),
            latency_ms: millis(result.service_time()),
            inflight: result.inflight(),
            when: result.completed_at(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEntry {
    Started { at: DateTime<Utc> },
    Record(SessionRecord),
    Stopped { at: DateTime<Utc> },
}

/// An append-only record sequence bounded by start and stop markers.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    id: Uuid,
    label: String,
    entries: Vec<SessionEntry>,
}

impl Session {
    /// Opens a session; the first entry is the start marker.
    pub fn start(label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            entries: vec![SessionEntry::Started { at: Utc::now() }],
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn entries(&self) -> &[SessionEntry] {
        &self.entries
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.entries.last(), Some(SessionEntry::Stopped { .. }))
    }

    pub fn record(&mut self, result: &DispatchResult) -> Result<(), SessionError> {
        self.push(SessionRecord::from_result(result, RecordSource::Single))
    }

    /// Records every slot of a burst, in slot order.
    pub fn record_burst(&mut self, job: &BurstJob) -> Result<(), SessionError> {
        self.ensure_open()?;
        for (slot, result) in job.results().iter().enumerate() {
            let source = RecordSource::Burst { job_id: job.job_id(), slot };
            self.entries.push(SessionEntry::Record(SessionRecord::from_result(result, source)));
        }
        Ok(())
    }

    /// Appends the stop marker. A session stops once.
    pub fn stop(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.entries.push(SessionEntry::Stopped { at: Utc::now() });
        Ok(())
    }

    pub fn records(&self) -> impl Iterator<Item = &SessionRecord> {
        self.entries.iter().filter_map(|entry| match entry {
            SessionEntry::Record(record) => Some(record),
            _ => None,
        })
    }

    /// Service latency of every successful record.
    pub fn latency_samples(&self) -> LatencySamples {
        self.records()
            .filter(|record| record.succeeded)
            .map(|record| record.latency_ms)
            .collect::<Vec<_>>()
            .into()
    }

    pub fn summary(&self) -> Result<LatencySummary, MetricsError> {
        self.latency_samples().summarize()
    }

    fn push(&mut self, record: SessionRecord) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.entries.push(SessionEntry::Record(record));
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.is_stopped() {
            Err(SessionError::Stopped(self.id))
        } else {
            Ok(())
        }
    }
}
