//! # TaskClaw Scheduler
//!
//! Persistence and state machine for recurring/one-shot agent task
//! schedules and their per-run execution history.
//!
//! ## Design Principles
//! - SQLite persistence (WAL) — survives restarts, supports concurrent access
//! - Closed status enums — invalid transitions are unrepresentable, and the
//!   SQL guards make them no-ops instead of partial writes
//! - Explicit transactions around every read-modify-write sequence
//! - No polling loop here — the orchestrator owns dispatch and drives this
//!   crate's operations
//!
//! ## Architecture
//! ```text
//! Orchestrator (external)
//!   ├── get_due_schedules(cutoff)        → dispatch queue
//!   ├── create_execution / start / succeed / fail / cancel / skip
//!   ├── record_success / record_failure  → failure guard, auto-disable
//!   └── get_retryable_executions(now)    → retry sweep queue
//!
//! API/UI (external)
//!   ├── create / approve / pause / resume / update / delete
//!   ├── list_schedules, list_executions, get_latest_execution
//!   └── count_for_user / get_stats      → tier quota
//! ```
//!
//! Every schedule owns a thread id, allocated once at creation and copied
//! into each execution; the conversation subsystem joins on it to render a
//! schedule's run history.

pub mod execution;
pub mod persistence;
pub mod schedule;

pub use execution::{Execution, ExecutionError, ExecutionOutput, ExecutionStatus};
pub use persistence::{
    AgentCount, ExecutionFilter, ScheduleFilter, ScheduleStats, ScheduleUpdate, SchedulerDb,
    StatusCount,
};
pub use schedule::{
    ContextSnapshot, ExecutionPlan, IntervalUnit, NewSchedule, NotificationSettings, RetryPolicy,
    Schedule, ScheduleKind, ScheduleStatus,
};
