//! Trace types: one record per query attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::window::TimeRange;

// ---------------------------------------------------------------------------
// AttemptSpan: one row per submit/poll/fetch/close attempt
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptSpan {
    /// Unique span identifier.
    pub span_id: Uuid,

    /// The decomposition run this attempt belongs to.
    pub run_id: Uuid,

    /// Range the attempt queried.
    pub time_range: TimeRange,

    /// Recursion depth of the owning node (root = 0).
    pub depth: u32,

    /// 1-based attempt number; retries increment it.
    pub attempt: u32,

    /// Final lifecycle state reached.
    pub status: AttemptStatus,

    /// Rows fetched (0 unless the fetch succeeded).
    pub rows: usize,

    /// Remote result identifier, once submitted.
    pub result_id: Option<String>,

    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,

    /// Error message if the attempt failed.
    pub error: Option<String>,
}

impl AttemptSpan {
    pub fn start(run_id: Uuid, time_range: TimeRange, depth: u32, attempt: u32) -> Self {
        Self {
            span_id: Uuid::new_v4(),
            run_id,
            time_range,
            depth,
            attempt,
            status: AttemptStatus::Pending,
            rows: 0,
            result_id: None,
            started_at: Utc::now(),
            completed_at: None,
            error: None,
        }
    }

    pub fn finish(&mut self, status: AttemptStatus, error: Option<String>) {
        self.status = status;
        self.error = error;
        self.completed_at = Some(Utc::now());
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|done| (done - self.started_at).num_milliseconds())
    }
}

// ---------------------------------------------------------------------------
// Attempt lifecycle
// ---------------------------------------------------------------------------

/// `Pending → Submitted → Polling → {Complete, TimedOut, Failed} → Closed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Pending,
    Submitted,
    Polling,
    Complete,
    TimedOut,
    Failed,
    Closed,
}

impl AttemptStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AttemptStatus::Complete
                | AttemptStatus::TimedOut
                | AttemptStatus::Failed
                | AttemptStatus::Closed
        )
    }
}
