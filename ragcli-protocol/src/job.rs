//! Long-running job progress model
//!
//! Streamed responses for long-running operations carry point-in-time
//! [`JobSnapshot`] payloads. Snapshots are immutable once emitted; progress
//! is reported by emitting a new, later snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a long-running backend job.
///
/// Status only moves forward through `queued -> running -> terminal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether no further snapshots will be emitted for this job.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Running => 1,
            Self::Succeeded | Self::Failed | Self::Cancelled => 2,
        }
    }

    /// Whether a snapshot with status `next` may follow one with `self`.
    ///
    /// Repeating the same non-terminal status is allowed (progress updates
    /// within a phase); moving backward or past a terminal status is not.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        !self.is_terminal() && self.rank() <= next.rank()
    }
}

/// What to trigger a reindex as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionTrigger {
    #[default]
    Manual,
    Scheduled,
}

/// Effective result of a terminal snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Failed,
    Cancelled,
}

/// One point-in-time progress report for a long-running backend operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_alias: Option<String>,
    pub status: JobStatus,
    pub stage: String,
    pub percent_complete: Option<f64>,
    #[serde(default)]
    pub documents_processed: u64,
    pub requested_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub trigger: IngestionTrigger,
}

impl JobSnapshot {
    /// Effective outcome of a terminal snapshot; `None` while the job is
    /// still in flight.
    ///
    /// A non-empty `error_message` on a terminal snapshot counts as failure
    /// even when the status reports success: the two signals are conflated
    /// at the source, and the error wins.
    pub fn outcome(&self) -> Option<JobOutcome> {
        if !self.status.is_terminal() {
            return None;
        }

        if self
            .error_message
            .as_deref()
            .is_some_and(|msg| !msg.trim().is_empty())
        {
            return Some(JobOutcome::Failed);
        }

        Some(match self.status {
            JobStatus::Succeeded => JobOutcome::Succeeded,
            JobStatus::Cancelled => JobOutcome::Cancelled,
            _ => JobOutcome::Failed,
        })
    }
}

/// Wire envelope for snapshot payloads: `{"job": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub job: JobSnapshot,
}
