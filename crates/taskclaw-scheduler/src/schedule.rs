//! Schedule definitions — the data model for recurring and one-shot agent tasks.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted schedule: one recurring or one-time agent task definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    /// Unique schedule ID.
    pub id: String,
    /// Owning organization.
    pub organization_id: String,
    /// Owning user within the organization.
    pub user_id: String,
    /// Which agent runs this schedule.
    pub agent_id: String,
    /// Human-readable name.
    pub name: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Prompt text sent to the agent on each run.
    pub prompt: String,
    /// When/how the schedule triggers.
    pub kind: ScheduleKind,
    /// IANA timezone the trigger times are interpreted in.
    pub timezone: String,
    /// Current lifecycle status.
    pub status: ScheduleStatus,
    /// Total runs recorded (success + failure).
    pub run_count: u32,
    /// Successful runs recorded.
    pub success_count: u32,
    /// Failed runs recorded. Monotonic, never reset.
    pub failure_count: u32,
    /// Failed runs since the last success. Reset to 0 on any success.
    pub consecutive_failures: u32,
    /// Next dispatch instant. Non-null only while the schedule can still run.
    pub next_run_at: Option<DateTime<Utc>>,
    /// Last dispatch instant.
    pub last_run_at: Option<DateTime<Utc>>,
    /// When the schedule was paused.
    pub paused_at: Option<DateTime<Utc>>,
    /// Conversation thread allocated at creation. Copied into every
    /// execution; external subsystems use it to group run history.
    pub thread_id: String,
    /// Retry parameters applied to this schedule's executions.
    pub retry_policy: Option<RetryPolicy>,
    /// Where/when to notify the user about run outcomes.
    pub notifications: Option<NotificationSettings>,
    /// Files/variables frozen at creation time.
    pub context_snapshot: Option<ContextSnapshot>,
    /// Concrete task parameters resolved at creation time.
    pub execution_plan: Option<ExecutionPlan>,
    /// Proposal this schedule originated from, if any.
    pub proposal_id: Option<String>,
    /// Whether the schedule came from an agent proposal.
    pub from_proposal: bool,
    /// Validity window start.
    pub valid_from: Option<DateTime<Utc>>,
    /// Validity window end.
    pub valid_until: Option<DateTime<Utc>>,
    /// Soft-delete marker. Set rows are hidden from normal queries.
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// When/how a schedule triggers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScheduleKind {
    /// Run on a cron expression (parsed and evaluated by the caller).
    Cron { expression: String },
    /// Run every N units.
    Interval { every: u32, unit: IntervalUnit },
    /// Run once at a specific instant.
    Once { at: DateTime<Utc> },
}

impl ScheduleKind {
    /// Discriminant stored alongside the JSON payload for filtering.
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleKind::Cron { .. } => "cron",
            ScheduleKind::Interval { .. } => "interval",
            ScheduleKind::Once { .. } => "once",
        }
    }
}

/// Unit for interval schedules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntervalUnit {
    Minutes,
    Hours,
    Days,
}

/// Schedule lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    /// Proposed by an agent, waiting for user approval.
    PendingApproval,
    /// Eligible for due-selection.
    Active,
    /// Suspended by the user; resumable.
    Paused,
    /// Finished (one-time schedule ran successfully). Terminal.
    Completed,
    /// Switched off by the user; re-enableable.
    Disabled,
    /// Automatically failed after too many consecutive failures. Terminal.
    Failed,
    /// Validity window ended. Terminal.
    Expired,
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::PendingApproval => "pending_approval",
            ScheduleStatus::Active => "active",
            ScheduleStatus::Paused => "paused",
            ScheduleStatus::Completed => "completed",
            ScheduleStatus::Disabled => "disabled",
            ScheduleStatus::Failed => "failed",
            ScheduleStatus::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending_approval" => Some(ScheduleStatus::PendingApproval),
            "active" => Some(ScheduleStatus::Active),
            "paused" => Some(ScheduleStatus::Paused),
            "completed" => Some(ScheduleStatus::Completed),
            "disabled" => Some(ScheduleStatus::Disabled),
            "failed" => Some(ScheduleStatus::Failed),
            "expired" => Some(ScheduleStatus::Expired),
            _ => None,
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScheduleStatus::Completed | ScheduleStatus::Failed | ScheduleStatus::Expired
        )
    }

    /// States counted against the owner's plan quota. Pausing, disabling, or
    /// failing a schedule does not free a seat; only completing or expiring
    /// (or deleting) does.
    pub fn counts_against_quota(&self) -> bool {
        !matches!(self, ScheduleStatus::Completed | ScheduleStatus::Expired)
    }
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retry parameters stored on a schedule. The retry *decision* is the
/// orchestrator's; these are the numbers it decides with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Retries allowed per execution.
    pub max_retries: u32,
    /// Base delay before the first retry (milliseconds).
    pub retry_delay_ms: u64,
    /// Multiplier applied per further attempt.
    pub backoff_multiplier: f64,
    /// Cap on any computed delay (milliseconds).
    pub max_retry_delay_ms: u64,
}

impl RetryPolicy {
    /// Exponential backoff delay for the given attempt (0-based), capped at
    /// `max_retry_delay_ms`.
    pub fn backoff_delay_ms(&self, attempt: u32) -> u64 {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt as i32);
        let delay = (self.retry_delay_ms as f64 * factor) as u64;
        delay.min(self.max_retry_delay_ms)
    }
}

/// Notification preferences for run outcomes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationSettings {
    #[serde(default)]
    pub on_success: bool,
    #[serde(default = "default_true")]
    pub on_failure: bool,
    /// Delivery channel hint ("telegram:chat_id", "email:addr", ...).
    pub channel: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Files and variables frozen when the schedule was created.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContextSnapshot {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
}

/// Concrete parameters the agent run is invoked with.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExecutionPlan {
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

/// Caller-facing creation request. The store allocates id, thread id, and
/// timestamps, and picks the initial status.
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub organization_id: String,
    pub user_id: String,
    pub agent_id: String,
    pub name: String,
    pub description: Option<String>,
    pub prompt: String,
    pub kind: ScheduleKind,
    pub timezone: String,
    /// Computed by the caller (cron evaluation happens outside this crate).
    pub next_run_at: Option<DateTime<Utc>>,
    pub retry_policy: Option<RetryPolicy>,
    pub notifications: Option<NotificationSettings>,
    pub context_snapshot: Option<ContextSnapshot>,
    pub execution_plan: Option<ExecutionPlan>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

impl Schedule {
    /// Build a user-created schedule. Starts `active` with a fresh thread id.
    pub fn new(req: NewSchedule) -> Self {
        Self::build(req, ScheduleStatus::Active, None)
    }

    /// Build a schedule from an agent proposal. Starts `pending_approval`
    /// with no next run until approved.
    pub fn from_proposal(req: NewSchedule, proposal_id: &str) -> Self {
        let mut schedule = Self::build(req, ScheduleStatus::PendingApproval, Some(proposal_id.to_string()));
        schedule.next_run_at = None;
        schedule
    }

    fn build(req: NewSchedule, status: ScheduleStatus, proposal_id: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            organization_id: req.organization_id,
            user_id: req.user_id,
            agent_id: req.agent_id,
            name: req.name,
            description: req.description,
            prompt: req.prompt,
            kind: req.kind,
            timezone: req.timezone,
            status,
            run_count: 0,
            success_count: 0,
            failure_count: 0,
            consecutive_failures: 0,
            next_run_at: req.next_run_at,
            last_run_at: None,
            paused_at: None,
            // Allocated exactly once; every execution copies it.
            thread_id: uuid::Uuid::new_v4().to_string(),
            retry_policy: req.retry_policy,
            notifications: req.notifications,
            context_snapshot: req.context_snapshot,
            execution_plan: req.execution_plan,
            from_proposal: proposal_id.is_some(),
            proposal_id,
            valid_from: req.valid_from,
            valid_until: req.valid_until,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request() -> NewSchedule {
        NewSchedule {
            organization_id: "org-1".into(),
            user_id: "user-1".into(),
            agent_id: "agent-1".into(),
            name: "daily digest".into(),
            description: None,
            prompt: "Summarize yesterday's inbox".into(),
            kind: ScheduleKind::Cron { expression: "0 8 * * *".into() },
            timezone: "UTC".into(),
            next_run_at: Some(Utc::now()),
            retry_policy: None,
            notifications: None,
            context_snapshot: None,
            execution_plan: None,
            valid_from: None,
            valid_until: None,
        }
    }

    #[test]
    fn test_new_schedule_is_active() {
        let schedule = Schedule::new(make_request());
        assert_eq!(schedule.status, ScheduleStatus::Active);
        assert!(!schedule.from_proposal);
        assert!(schedule.next_run_at.is_some());
        assert!(!schedule.thread_id.is_empty());
    }

    #[test]
    fn test_proposal_schedule_awaits_approval() {
        let schedule = Schedule::from_proposal(make_request(), "prop-7");
        assert_eq!(schedule.status, ScheduleStatus::PendingApproval);
        assert!(schedule.from_proposal);
        assert_eq!(schedule.proposal_id.as_deref(), Some("prop-7"));
        // No next run until approved, even if the request carried one.
        assert!(schedule.next_run_at.is_none());
    }

    #[test]
    fn test_thread_ids_are_unique() {
        let a = Schedule::new(make_request());
        let b = Schedule::new(make_request());
        assert_ne!(a.thread_id, b.thread_id);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ScheduleStatus::PendingApproval,
            ScheduleStatus::Active,
            ScheduleStatus::Paused,
            ScheduleStatus::Completed,
            ScheduleStatus::Disabled,
            ScheduleStatus::Failed,
            ScheduleStatus::Expired,
        ] {
            assert_eq!(ScheduleStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ScheduleStatus::parse("bogus"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(ScheduleStatus::Completed.is_terminal());
        assert!(ScheduleStatus::Failed.is_terminal());
        assert!(ScheduleStatus::Expired.is_terminal());
        assert!(!ScheduleStatus::Paused.is_terminal());
        assert!(!ScheduleStatus::Disabled.is_terminal());
        assert!(!ScheduleStatus::PendingApproval.is_terminal());
    }

    #[test]
    fn test_quota_accounting() {
        // Paused and failed schedules still hold a seat
        assert!(ScheduleStatus::Paused.counts_against_quota());
        assert!(ScheduleStatus::Failed.counts_against_quota());
        assert!(ScheduleStatus::Disabled.counts_against_quota());
        // Completed/expired free the seat
        assert!(!ScheduleStatus::Completed.counts_against_quota());
        assert!(!ScheduleStatus::Expired.counts_against_quota());
    }

    #[test]
    fn test_backoff_delay_grows_and_caps() {
        let policy = RetryPolicy {
            max_retries: 5,
            retry_delay_ms: 1_000,
            backoff_multiplier: 2.0,
            max_retry_delay_ms: 5_000,
        };
        assert_eq!(policy.backoff_delay_ms(0), 1_000);
        assert_eq!(policy.backoff_delay_ms(1), 2_000);
        assert_eq!(policy.backoff_delay_ms(2), 4_000);
        // Capped from here on
        assert_eq!(policy.backoff_delay_ms(3), 5_000);
        assert_eq!(policy.backoff_delay_ms(10), 5_000);
    }

    #[test]
    fn test_kind_serialization() {
        let kind = ScheduleKind::Interval { every: 30, unit: IntervalUnit::Minutes };
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("\"interval\""));
        let parsed: ScheduleKind = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, kind);
        assert_eq!(kind.as_str(), "interval");
    }
}
