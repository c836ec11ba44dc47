//! Execution records — one row per concrete run attempt of a schedule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One run attempt of a schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    /// Unique execution ID.
    pub id: String,
    /// Owning schedule.
    pub schedule_id: String,
    /// Owning organization (copied from the schedule).
    pub organization_id: String,
    /// Monotonically increasing per schedule; unique within it.
    pub execution_number: i64,
    /// Current lifecycle status.
    pub status: ExecutionStatus,
    /// Thread id copied from the schedule at creation time.
    pub thread_id: String,
    /// User-facing progress object attached when the run starts.
    pub progress_id: Option<String>,
    /// When the run was due to happen.
    pub scheduled_at: DateTime<Utc>,
    /// When the dispatcher actually started it.
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Wall-clock duration (completed − started), milliseconds.
    pub duration_ms: Option<i64>,
    /// Retries consumed by this execution. Starts at 0, never reset.
    pub retry_attempt: u32,
    /// Retry budget copied from the schedule's policy at creation.
    pub max_retries: u32,
    /// When the retry sweep should pick this row up again.
    pub next_retry_at: Option<DateTime<Utc>>,
    /// Short human-readable outcome.
    pub result_summary: Option<String>,
    /// Structured outputs produced by the run.
    pub outputs: Vec<ExecutionOutput>,
    /// Structured error recorded on failure.
    pub error: Option<ExecutionError>,
    pub created_at: DateTime<Utc>,
}

/// Execution lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Created, not yet started.
    Pending,
    /// Dispatched and in flight.
    Running,
    /// Finished successfully. Terminal.
    Succeeded,
    /// Finished with a non-retryable (or exhausted) error. Terminal.
    Failed,
    /// Abandoned by the caller. Terminal.
    Cancelled,
    /// Deliberately not run. Terminal.
    Skipped,
    /// Failed but scheduled for another attempt; the retry sweep
    /// revisits rows in this state.
    Retrying,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Succeeded => "succeeded",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Cancelled => "cancelled",
            ExecutionStatus::Skipped => "skipped",
            ExecutionStatus::Retrying => "retrying",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ExecutionStatus::Pending),
            "running" => Some(ExecutionStatus::Running),
            "succeeded" => Some(ExecutionStatus::Succeeded),
            "failed" => Some(ExecutionStatus::Failed),
            "cancelled" => Some(ExecutionStatus::Cancelled),
            "skipped" => Some(ExecutionStatus::Skipped),
            "retrying" => Some(ExecutionStatus::Retrying),
            _ => None,
        }
    }

    /// Terminal states admit no further transitions. `Retrying` is
    /// deliberately non-terminal so the retry sweep finds it.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Succeeded
                | ExecutionStatus::Failed
                | ExecutionStatus::Cancelled
                | ExecutionStatus::Skipped
        )
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error recorded on a failed or retrying execution. Persisted as
/// row data, never raised — the history doubles as the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionError {
    /// Machine-readable error code ("timeout", "rate_limited", ...).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Whether the orchestrator may retry this class of error.
    pub retryable: bool,
}

/// One structured output item produced by a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionOutput {
    /// Output label ("report", "chart", ...).
    pub name: String,
    /// MIME type hint, when known.
    pub content_type: Option<String>,
    /// Inline content or a reference the UI can resolve.
    pub content: String,
}
