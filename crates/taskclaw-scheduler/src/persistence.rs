//! SQLite-backed persistence for schedules and their execution history.
//! One connection, WAL mode, explicit transactions around every
//! read-modify-write sequence.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, params, types::Type};
use serde::Serialize;
use taskclaw_core::error::{Result, TaskClawError};

use crate::execution::{Execution, ExecutionError, ExecutionOutput, ExecutionStatus};
use crate::schedule::{
    NewSchedule, NotificationSettings, RetryPolicy, Schedule, ScheduleKind, ScheduleStatus,
};

/// SQLite-backed store for schedules and executions.
pub struct SchedulerDb {
    conn: Connection,
}

/// Filters for schedule listings. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct ScheduleFilter {
    pub user_id: Option<String>,
    pub status: Option<ScheduleStatus>,
    pub agent_id: Option<String>,
    /// Include soft-deleted rows.
    pub include_deleted: bool,
}

/// Filters for execution listings.
#[derive(Debug, Clone, Default)]
pub struct ExecutionFilter {
    pub status: Option<ExecutionStatus>,
    pub limit: Option<u32>,
}

/// Mutable schedule fields. Set fields are written, unset fields are kept.
#[derive(Debug, Clone, Default)]
pub struct ScheduleUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub prompt: Option<String>,
    pub kind: Option<ScheduleKind>,
    pub timezone: Option<String>,
    /// Applied only while the schedule is active.
    pub next_run_at: Option<DateTime<Utc>>,
    pub retry_policy: Option<RetryPolicy>,
    pub notifications: Option<NotificationSettings>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
}

/// Per-user schedule statistics.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleStats {
    /// All non-deleted schedules.
    pub total: u32,
    /// Schedules holding a plan seat (everything but completed/expired).
    pub counted_against_quota: u32,
    pub by_status: Vec<StatusCount>,
    pub by_agent: Vec<AgentCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub status: ScheduleStatus,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentCount {
    pub agent_id: String,
    pub count: u32,
}

/// Shared SELECT column list for schedule queries — single source of truth.
const SCHEDULE_SELECT: &str = "SELECT id,organization_id,user_id,agent_id,name,description,prompt,kind,kind_data,timezone,status,run_count,success_count,failure_count,consecutive_failures,next_run_at,last_run_at,paused_at,thread_id,retry_policy,notifications,context_snapshot,execution_plan,proposal_id,from_proposal,valid_from,valid_until,deleted_at,created_at,updated_at FROM schedules";

/// Shared SELECT column list for execution queries.
const EXECUTION_SELECT: &str = "SELECT id,schedule_id,organization_id,execution_number,status,thread_id,progress_id,scheduled_at,started_at,completed_at,duration_ms,retry_attempt,max_retries,next_retry_at,result_summary,result_outputs,error_code,error_message,error_retryable,created_at FROM executions";

/// Schedule states with no further transitions.
const TERMINAL_SCHEDULE_STATES: &str = "('completed','failed','expired')";

fn parse_ts(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_ts_opt(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_ts(idx, s)).transpose()
}

fn parse_json<T: serde::de::DeserializeOwned>(
    idx: usize,
    raw: Option<String>,
) -> rusqlite::Result<Option<T>> {
    raw.map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn to_json_opt<T: Serialize>(value: &Option<T>, what: &str) -> Result<Option<String>> {
    value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| TaskClawError::Store(format!("Serialize {what}: {e}")))
}

/// Map a database row to a Schedule struct.
fn row_to_schedule(row: &rusqlite::Row) -> rusqlite::Result<Schedule> {
    let kind_data: String = row.get(8)?;
    let kind: ScheduleKind = serde_json::from_str(&kind_data)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;
    let status_raw: String = row.get(10)?;
    let status = ScheduleStatus::parse(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            10,
            Type::Text,
            format!("unknown schedule status '{status_raw}'").into(),
        )
    })?;

    Ok(Schedule {
        id: row.get(0)?,
        organization_id: row.get(1)?,
        user_id: row.get(2)?,
        agent_id: row.get(3)?,
        name: row.get(4)?,
        description: row.get(5)?,
        prompt: row.get(6)?,
        kind,
        timezone: row.get(9)?,
        status,
        run_count: row.get(11)?,
        success_count: row.get(12)?,
        failure_count: row.get(13)?,
        consecutive_failures: row.get(14)?,
        next_run_at: parse_ts_opt(15, row.get(15)?)?,
        last_run_at: parse_ts_opt(16, row.get(16)?)?,
        paused_at: parse_ts_opt(17, row.get(17)?)?,
        thread_id: row.get(18)?,
        retry_policy: parse_json(19, row.get(19)?)?,
        notifications: parse_json(20, row.get(20)?)?,
        context_snapshot: parse_json(21, row.get(21)?)?,
        execution_plan: parse_json(22, row.get(22)?)?,
        proposal_id: row.get(23)?,
        from_proposal: row.get::<_, i32>(24)? != 0,
        valid_from: parse_ts_opt(25, row.get(25)?)?,
        valid_until: parse_ts_opt(26, row.get(26)?)?,
        deleted_at: parse_ts_opt(27, row.get(27)?)?,
        created_at: parse_ts(28, row.get(28)?)?,
        updated_at: parse_ts(29, row.get(29)?)?,
    })
}

/// Map a database row to an Execution struct.
fn row_to_execution(row: &rusqlite::Row) -> rusqlite::Result<Execution> {
    let status_raw: String = row.get(4)?;
    let status = ExecutionStatus::parse(&status_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Text,
            format!("unknown execution status '{status_raw}'").into(),
        )
    })?;
    let outputs_raw: String = row.get(15)?;
    let outputs: Vec<ExecutionOutput> = serde_json::from_str(&outputs_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(15, Type::Text, Box::new(e)))?;

    let error_code: Option<String> = row.get(16)?;
    let error = match error_code {
        Some(code) => Some(ExecutionError {
            code,
            message: row.get::<_, Option<String>>(17)?.unwrap_or_default(),
            retryable: row.get::<_, Option<i32>>(18)?.unwrap_or(0) != 0,
        }),
        None => None,
    };

    Ok(Execution {
        id: row.get(0)?,
        schedule_id: row.get(1)?,
        organization_id: row.get(2)?,
        execution_number: row.get(3)?,
        status,
        thread_id: row.get(5)?,
        progress_id: row.get(6)?,
        scheduled_at: parse_ts(7, row.get(7)?)?,
        started_at: parse_ts_opt(8, row.get(8)?)?,
        completed_at: parse_ts_opt(9, row.get(9)?)?,
        duration_ms: row.get(10)?,
        retry_attempt: row.get(11)?,
        max_retries: row.get(12)?,
        next_retry_at: parse_ts_opt(13, row.get(13)?)?,
        result_summary: row.get(14)?,
        outputs,
        error,
        created_at: parse_ts(19, row.get(19)?)?,
    })
}

impl SchedulerDb {
    /// Open or create the scheduler database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .map_err(|e| TaskClawError::Store(format!("DB open: {e}")))?;

        // WAL allows concurrent readers/writers and prevents "database is locked"
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .map_err(|e| TaskClawError::Store(format!("DB pragma: {e}")))?;

        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open the store at the configured default location.
    pub fn open_default() -> Result<Self> {
        let config = taskclaw_core::TaskClawConfig::load()?;
        Self::open(Path::new(&config.scheduler.db_path))
    }

    /// Run schema migrations.
    fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
            -- Recurring/one-shot agent task definitions
            CREATE TABLE IF NOT EXISTS schedules (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                agent_id TEXT NOT NULL,
                name TEXT NOT NULL,
                description TEXT,
                prompt TEXT NOT NULL,
                kind TEXT NOT NULL,              -- 'cron', 'interval', 'once'
                kind_data TEXT NOT NULL,         -- JSON payload for the kind
                timezone TEXT NOT NULL DEFAULT 'UTC',
                status TEXT NOT NULL DEFAULT 'active',
                run_count INTEGER NOT NULL DEFAULT 0,
                success_count INTEGER NOT NULL DEFAULT 0,
                failure_count INTEGER NOT NULL DEFAULT 0,
                consecutive_failures INTEGER NOT NULL DEFAULT 0,
                next_run_at TEXT,
                last_run_at TEXT,
                paused_at TEXT,
                thread_id TEXT NOT NULL,
                retry_policy TEXT,               -- JSON
                notifications TEXT,              -- JSON
                context_snapshot TEXT,           -- JSON
                execution_plan TEXT,             -- JSON
                proposal_id TEXT,
                from_proposal INTEGER NOT NULL DEFAULT 0,
                valid_from TEXT,
                valid_until TEXT,
                deleted_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_schedules_due
                ON schedules (status, next_run_at);
            CREATE INDEX IF NOT EXISTS idx_schedules_owner
                ON schedules (organization_id, user_id);

            -- One row per concrete run attempt
            CREATE TABLE IF NOT EXISTS executions (
                id TEXT PRIMARY KEY,
                schedule_id TEXT NOT NULL,
                organization_id TEXT NOT NULL,
                execution_number INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                thread_id TEXT NOT NULL,
                progress_id TEXT,
                scheduled_at TEXT NOT NULL,
                started_at TEXT,
                completed_at TEXT,
                duration_ms INTEGER,
                retry_attempt INTEGER NOT NULL DEFAULT 0,
                max_retries INTEGER NOT NULL DEFAULT 0,
                next_retry_at TEXT,
                result_summary TEXT,
                result_outputs TEXT NOT NULL DEFAULT '[]',  -- JSON array
                error_code TEXT,
                error_message TEXT,
                error_retryable INTEGER,
                created_at TEXT NOT NULL,
                UNIQUE (schedule_id, execution_number)
            );

            CREATE INDEX IF NOT EXISTS idx_executions_retry
                ON executions (status, next_retry_at);
         ",
            )
            .map_err(|e| TaskClawError::Store(format!("Migration: {e}")))?;
        Ok(())
    }

    // ─── Schedule Store ──────────────────────────────────────

    /// Create a user-authored schedule. Starts `active`.
    pub fn create_schedule(&self, req: NewSchedule) -> Result<Schedule> {
        Self::validate_request(&req)?;
        let schedule = Schedule::new(req);
        self.insert_schedule(&schedule)?;
        tracing::info!("📅 Schedule created: '{}' ({})", schedule.name, schedule.id);
        Ok(schedule)
    }

    /// Create a schedule from an agent proposal. Starts `pending_approval`
    /// with no next run until approved.
    pub fn create_from_proposal(&self, req: NewSchedule, proposal_id: &str) -> Result<Schedule> {
        Self::validate_request(&req)?;
        let schedule = Schedule::from_proposal(req, proposal_id);
        self.insert_schedule(&schedule)?;
        tracing::info!(
            "📋 Schedule proposed: '{}' ({}) awaiting approval",
            schedule.name,
            schedule.id
        );
        Ok(schedule)
    }

    fn validate_request(req: &NewSchedule) -> Result<()> {
        if req.name.trim().is_empty() {
            return Err(TaskClawError::InvalidField("schedule name must not be empty".into()));
        }
        if req.prompt.trim().is_empty() {
            return Err(TaskClawError::InvalidField("schedule prompt must not be empty".into()));
        }
        Ok(())
    }

    fn insert_schedule(&self, s: &Schedule) -> Result<()> {
        let kind_data = serde_json::to_string(&s.kind)
            .map_err(|e| TaskClawError::Store(format!("Serialize kind: {e}")))?;
        self.conn
            .execute(
                "INSERT INTO schedules
                 (id, organization_id, user_id, agent_id, name, description, prompt,
                  kind, kind_data, timezone, status,
                  run_count, success_count, failure_count, consecutive_failures,
                  next_run_at, last_run_at, paused_at, thread_id,
                  retry_policy, notifications, context_snapshot, execution_plan,
                  proposal_id, from_proposal, valid_from, valid_until,
                  deleted_at, created_at, updated_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,
                         ?20,?21,?22,?23,?24,?25,?26,?27,?28,?29,?30)",
                params![
                    s.id,
                    s.organization_id,
                    s.user_id,
                    s.agent_id,
                    s.name,
                    s.description,
                    s.prompt,
                    s.kind.as_str(),
                    kind_data,
                    s.timezone,
                    s.status.as_str(),
                    s.run_count,
                    s.success_count,
                    s.failure_count,
                    s.consecutive_failures,
                    s.next_run_at.map(|t| t.to_rfc3339()),
                    s.last_run_at.map(|t| t.to_rfc3339()),
                    s.paused_at.map(|t| t.to_rfc3339()),
                    s.thread_id,
                    to_json_opt(&s.retry_policy, "retry policy")?,
                    to_json_opt(&s.notifications, "notifications")?,
                    to_json_opt(&s.context_snapshot, "context snapshot")?,
                    to_json_opt(&s.execution_plan, "execution plan")?,
                    s.proposal_id,
                    s.from_proposal as i32,
                    s.valid_from.map(|t| t.to_rfc3339()),
                    s.valid_until.map(|t| t.to_rfc3339()),
                    s.deleted_at.map(|t| t.to_rfc3339()),
                    s.created_at.to_rfc3339(),
                    s.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| TaskClawError::Store(format!("Insert schedule: {e}")))?;
        Ok(())
    }

    /// Get a schedule by ID within an organization. Soft-deleted rows are
    /// invisible here; use [`Self::get_schedule_include_deleted`] for those.
    pub fn get_schedule(&self, id: &str, organization_id: &str) -> Result<Option<Schedule>> {
        self.query_schedule(
            &format!("{SCHEDULE_SELECT} WHERE id=?1 AND organization_id=?2 AND deleted_at IS NULL"),
            params![id, organization_id],
        )
    }

    /// Get a schedule regardless of its soft-delete marker.
    pub fn get_schedule_include_deleted(
        &self,
        id: &str,
        organization_id: &str,
    ) -> Result<Option<Schedule>> {
        self.query_schedule(
            &format!("{SCHEDULE_SELECT} WHERE id=?1 AND organization_id=?2"),
            params![id, organization_id],
        )
    }

    fn query_schedule(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Option<Schedule>> {
        match self.conn.query_row(sql, params, row_to_schedule) {
            Ok(s) => Ok(Some(s)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(TaskClawError::Store(format!("Get schedule: {e}"))),
        }
    }

    /// List an organization's schedules, newest first.
    pub fn list_schedules(
        &self,
        organization_id: &str,
        filter: &ScheduleFilter,
    ) -> Result<Vec<Schedule>> {
        let sql = format!(
            "{SCHEDULE_SELECT}
             WHERE organization_id = ?1
               AND (?2 IS NULL OR user_id = ?2)
               AND (?3 IS NULL OR status = ?3)
               AND (?4 IS NULL OR agent_id = ?4)
               AND (?5 = 1 OR deleted_at IS NULL)
             ORDER BY created_at DESC"
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| TaskClawError::Store(format!("Prepare: {e}")))?;
        let rows = stmt
            .query_map(
                params![
                    organization_id,
                    filter.user_id,
                    filter.status.map(|s| s.as_str()),
                    filter.agent_id,
                    filter.include_deleted as i32,
                ],
                row_to_schedule,
            )
            .map_err(|e| TaskClawError::Store(format!("Query: {e}")))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| TaskClawError::Store(format!("Read schedule row: {e}")))?;
        Ok(rows)
    }

    /// Approve a proposed schedule: `pending_approval → active`.
    /// The caller supplies the computed first run instant.
    pub fn approve(
        &self,
        id: &str,
        organization_id: &str,
        next_run_at: DateTime<Utc>,
    ) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE schedules SET status='active', next_run_at=?3, updated_at=?4
                 WHERE id=?1 AND organization_id=?2 AND status='pending_approval'
                   AND deleted_at IS NULL",
                params![id, organization_id, next_run_at.to_rfc3339(), Utc::now().to_rfc3339()],
            )
            .map_err(|e| TaskClawError::Store(format!("Approve schedule: {e}")))?;
        Ok(rows == 1)
    }

    /// Pause an active schedule. `next_run_at` is left as-is (informational);
    /// paused rows are excluded from due-selection regardless.
    pub fn pause(&self, id: &str, organization_id: &str) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let rows = self
            .conn
            .execute(
                "UPDATE schedules SET status='paused', paused_at=?3, updated_at=?3
                 WHERE id=?1 AND organization_id=?2 AND status='active' AND deleted_at IS NULL",
                params![id, organization_id, now],
            )
            .map_err(|e| TaskClawError::Store(format!("Pause schedule: {e}")))?;
        Ok(rows == 1)
    }

    /// Resume a paused schedule: clears `paused_at`, resets the consecutive
    /// failure streak, and takes a fresh caller-computed `next_run_at`.
    pub fn resume(
        &self,
        id: &str,
        organization_id: &str,
        next_run_at: DateTime<Utc>,
    ) -> Result<bool> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| TaskClawError::Store(format!("Begin resume: {e}")))?;
        let rows = tx
            .execute(
                "UPDATE schedules
                 SET status='active', paused_at=NULL, consecutive_failures=0,
                     next_run_at=?3, updated_at=?4
                 WHERE id=?1 AND organization_id=?2 AND status='paused' AND deleted_at IS NULL",
                params![id, organization_id, next_run_at.to_rfc3339(), Utc::now().to_rfc3339()],
            )
            .map_err(|e| TaskClawError::Store(format!("Resume schedule: {e}")))?;
        tx.commit()
            .map_err(|e| TaskClawError::Store(format!("Commit resume: {e}")))?;
        Ok(rows == 1)
    }

    /// Mark a schedule completed (one-time schedule ran successfully).
    /// Any non-terminal state is accepted; `next_run_at` is forced to null.
    pub fn mark_completed(&self, id: &str, organization_id: &str) -> Result<bool> {
        self.finish_schedule(id, organization_id, ScheduleStatus::Completed)
    }

    /// Mark a schedule expired (validity window ended).
    pub fn mark_expired(&self, id: &str, organization_id: &str) -> Result<bool> {
        self.finish_schedule(id, organization_id, ScheduleStatus::Expired)
    }

    fn finish_schedule(
        &self,
        id: &str,
        organization_id: &str,
        status: ScheduleStatus,
    ) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                &format!(
                    "UPDATE schedules SET status=?3, next_run_at=NULL, updated_at=?4
                     WHERE id=?1 AND organization_id=?2
                       AND status NOT IN {TERMINAL_SCHEDULE_STATES} AND deleted_at IS NULL"
                ),
                params![id, organization_id, status.as_str(), Utc::now().to_rfc3339()],
            )
            .map_err(|e| TaskClawError::Store(format!("Finish schedule: {e}")))?;
        Ok(rows == 1)
    }

    /// Switch a schedule off (`active`/`paused → disabled`) or back on
    /// (`disabled → active`, with a fresh caller-computed `next_run_at`).
    pub fn set_enabled(
        &self,
        id: &str,
        organization_id: &str,
        enabled: bool,
        next_run_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let rows = if enabled {
            self.conn
                .execute(
                    "UPDATE schedules SET status='active', next_run_at=?3, updated_at=?4
                     WHERE id=?1 AND organization_id=?2 AND status='disabled'
                       AND deleted_at IS NULL",
                    params![id, organization_id, next_run_at.map(|t| t.to_rfc3339()), now],
                )
                .map_err(|e| TaskClawError::Store(format!("Enable schedule: {e}")))?
        } else {
            self.conn
                .execute(
                    "UPDATE schedules SET status='disabled', next_run_at=NULL, paused_at=NULL,
                            updated_at=?3
                     WHERE id=?1 AND organization_id=?2 AND status IN ('active','paused')
                       AND deleted_at IS NULL",
                    params![id, organization_id, now],
                )
                .map_err(|e| TaskClawError::Store(format!("Disable schedule: {e}")))?
        };
        Ok(rows == 1)
    }

    /// Update mutable schedule fields. Returns the updated row, or `None`
    /// when the schedule cannot be resolved (nothing is written then).
    pub fn update_schedule(
        &self,
        id: &str,
        organization_id: &str,
        update: ScheduleUpdate,
    ) -> Result<Option<Schedule>> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| TaskClawError::Store(format!("Begin update: {e}")))?;

        let sql = format!(
            "{SCHEDULE_SELECT} WHERE id=?1 AND organization_id=?2 AND deleted_at IS NULL"
        );
        let mut schedule = match tx.query_row(&sql, params![id, organization_id], row_to_schedule) {
            Ok(s) => s,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(TaskClawError::Store(format!("Get schedule: {e}"))),
        };

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(TaskClawError::InvalidField("schedule name must not be empty".into()));
            }
            schedule.name = name;
        }
        if let Some(description) = update.description {
            schedule.description = Some(description);
        }
        if let Some(prompt) = update.prompt {
            if prompt.trim().is_empty() {
                return Err(TaskClawError::InvalidField("schedule prompt must not be empty".into()));
            }
            schedule.prompt = prompt;
        }
        if let Some(kind) = update.kind {
            schedule.kind = kind;
        }
        if let Some(timezone) = update.timezone {
            schedule.timezone = timezone;
        }
        // next_run_at is meaningful only while the schedule is active
        if let Some(next_run_at) = update.next_run_at
            && schedule.status == ScheduleStatus::Active
        {
            schedule.next_run_at = Some(next_run_at);
        }
        if let Some(retry_policy) = update.retry_policy {
            schedule.retry_policy = Some(retry_policy);
        }
        if let Some(notifications) = update.notifications {
            schedule.notifications = Some(notifications);
        }
        if let Some(valid_from) = update.valid_from {
            schedule.valid_from = Some(valid_from);
        }
        if let Some(valid_until) = update.valid_until {
            schedule.valid_until = Some(valid_until);
        }
        schedule.updated_at = Utc::now();

        let kind_data = serde_json::to_string(&schedule.kind)
            .map_err(|e| TaskClawError::Store(format!("Serialize kind: {e}")))?;
        tx.execute(
            "UPDATE schedules
             SET name=?3, description=?4, prompt=?5, kind=?6, kind_data=?7, timezone=?8,
                 next_run_at=?9, retry_policy=?10, notifications=?11,
                 valid_from=?12, valid_until=?13, updated_at=?14
             WHERE id=?1 AND organization_id=?2",
            params![
                id,
                organization_id,
                schedule.name,
                schedule.description,
                schedule.prompt,
                schedule.kind.as_str(),
                kind_data,
                schedule.timezone,
                schedule.next_run_at.map(|t| t.to_rfc3339()),
                to_json_opt(&schedule.retry_policy, "retry policy")?,
                to_json_opt(&schedule.notifications, "notifications")?,
                schedule.valid_from.map(|t| t.to_rfc3339()),
                schedule.valid_until.map(|t| t.to_rfc3339()),
                schedule.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| TaskClawError::Store(format!("Update schedule: {e}")))?;
        tx.commit()
            .map_err(|e| TaskClawError::Store(format!("Commit update: {e}")))?;
        Ok(Some(schedule))
    }

    /// Set the next dispatch instant of an active schedule.
    pub fn update_next_run(
        &self,
        id: &str,
        organization_id: &str,
        next_run_at: DateTime<Utc>,
    ) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE schedules SET next_run_at=?3, updated_at=?4
                 WHERE id=?1 AND organization_id=?2 AND status='active' AND deleted_at IS NULL",
                params![id, organization_id, next_run_at.to_rfc3339(), Utc::now().to_rfc3339()],
            )
            .map_err(|e| TaskClawError::Store(format!("Update next run: {e}")))?;
        Ok(rows == 1)
    }

    /// Soft-delete: hide the schedule from all normal queries. Reversible
    /// only by clearing the marker directly.
    pub fn soft_delete(&self, id: &str, organization_id: &str) -> Result<bool> {
        let now = Utc::now().to_rfc3339();
        let rows = self
            .conn
            .execute(
                "UPDATE schedules SET deleted_at=?3, updated_at=?3
                 WHERE id=?1 AND organization_id=?2 AND deleted_at IS NULL",
                params![id, organization_id, now],
            )
            .map_err(|e| TaskClawError::Store(format!("Soft delete: {e}")))?;
        Ok(rows == 1)
    }

    /// Hard-delete: remove the schedule and all its executions. Irreversible.
    pub fn hard_delete(&self, id: &str, organization_id: &str) -> Result<bool> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| TaskClawError::Store(format!("Begin delete: {e}")))?;
        tx.execute(
            "DELETE FROM executions WHERE schedule_id=?1 AND organization_id=?2",
            params![id, organization_id],
        )
        .map_err(|e| TaskClawError::Store(format!("Delete executions: {e}")))?;
        let rows = tx
            .execute(
                "DELETE FROM schedules WHERE id=?1 AND organization_id=?2",
                params![id, organization_id],
            )
            .map_err(|e| TaskClawError::Store(format!("Delete schedule: {e}")))?;
        tx.commit()
            .map_err(|e| TaskClawError::Store(format!("Commit delete: {e}")))?;
        if rows == 1 {
            tracing::info!("🗑️ Schedule hard-deleted: {id}");
        }
        Ok(rows == 1)
    }

    // ─── Due-Schedule Selection ──────────────────────────────

    /// All dispatchable schedules at `cutoff`, earliest-due first. Pure
    /// read — no claiming. With concurrent pollers dispatch is
    /// at-least-once unless the caller claims rows itself.
    pub fn get_due_schedules(
        &self,
        cutoff: DateTime<Utc>,
        limit: Option<u32>,
    ) -> Result<Vec<Schedule>> {
        let sql = format!(
            "{SCHEDULE_SELECT}
             WHERE status='active' AND deleted_at IS NULL
               AND next_run_at IS NOT NULL AND next_run_at <= ?1
             ORDER BY next_run_at ASC
             LIMIT ?2"
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| TaskClawError::Store(format!("Prepare: {e}")))?;
        let rows = stmt
            .query_map(
                params![cutoff.to_rfc3339(), limit.map(|l| l as i64).unwrap_or(-1)],
                row_to_schedule,
            )
            .map_err(|e| TaskClawError::Store(format!("Query: {e}")))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| TaskClawError::Store(format!("Read schedule row: {e}")))?;
        Ok(rows)
    }

    // ─── Failure Guard ───────────────────────────────────────

    /// Record a successful run: bump run/success counters, stamp
    /// `last_run_at`, and reset the consecutive failure streak to 0.
    /// Success is a full trust reset, never a decrement.
    pub fn record_success(&self, id: &str, organization_id: &str) -> Result<bool> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| TaskClawError::Store(format!("Begin record success: {e}")))?;
        let now = Utc::now().to_rfc3339();
        let rows = tx
            .execute(
                "UPDATE schedules
                 SET run_count=run_count+1, success_count=success_count+1,
                     consecutive_failures=0, last_run_at=?3, updated_at=?3
                 WHERE id=?1 AND organization_id=?2 AND deleted_at IS NULL",
                params![id, organization_id, now],
            )
            .map_err(|e| TaskClawError::Store(format!("Record success: {e}")))?;
        tx.commit()
            .map_err(|e| TaskClawError::Store(format!("Commit record success: {e}")))?;
        Ok(rows == 1)
    }

    /// Record a failed run: bump run/failure/consecutive counters, stamp
    /// `last_run_at`, then compare the streak to the threshold. At or above
    /// it the schedule is flipped to `failed` and its next run cleared.
    /// Returns `Some(marked_as_failed)`, or `None` when the schedule cannot
    /// be resolved. The whole sequence runs in one transaction.
    pub fn record_failure(
        &self,
        id: &str,
        organization_id: &str,
        max_consecutive_failures: u32,
    ) -> Result<Option<bool>> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| TaskClawError::Store(format!("Begin record failure: {e}")))?;
        let now = Utc::now().to_rfc3339();
        let rows = tx
            .execute(
                "UPDATE schedules
                 SET run_count=run_count+1, failure_count=failure_count+1,
                     consecutive_failures=consecutive_failures+1, last_run_at=?3, updated_at=?3
                 WHERE id=?1 AND organization_id=?2 AND deleted_at IS NULL",
                params![id, organization_id, now],
            )
            .map_err(|e| TaskClawError::Store(format!("Record failure: {e}")))?;
        if rows == 0 {
            return Ok(None);
        }

        let failures: u32 = tx
            .query_row(
                "SELECT consecutive_failures FROM schedules WHERE id=?1 AND organization_id=?2",
                params![id, organization_id],
                |row| row.get(0),
            )
            .map_err(|e| TaskClawError::Store(format!("Read failure streak: {e}")))?;

        let marked = failures >= max_consecutive_failures;
        if marked {
            tx.execute(
                &format!(
                    "UPDATE schedules SET status='failed', next_run_at=NULL, updated_at=?3
                     WHERE id=?1 AND organization_id=?2
                       AND status NOT IN {TERMINAL_SCHEDULE_STATES}"
                ),
                params![id, organization_id, now],
            )
            .map_err(|e| TaskClawError::Store(format!("Mark schedule failed: {e}")))?;
            tracing::warn!(
                "⛔ Schedule {id} hit {failures} consecutive failures (threshold {max_consecutive_failures}) — marked failed"
            );
        }
        tx.commit()
            .map_err(|e| TaskClawError::Store(format!("Commit record failure: {e}")))?;
        Ok(Some(marked))
    }

    // ─── Tier Quota ──────────────────────────────────────────

    /// Schedules charged against the user's plan: everything not
    /// completed/expired/deleted. Paused and failed rows still hold a seat.
    pub fn count_for_user(&self, organization_id: &str, user_id: &str) -> Result<u32> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM schedules
                 WHERE organization_id=?1 AND user_id=?2 AND deleted_at IS NULL
                   AND status NOT IN ('completed','expired')",
                params![organization_id, user_id],
                |row| row.get(0),
            )
            .map_err(|e| TaskClawError::Store(format!("Count for user: {e}")))
    }

    /// Per-user breakdown by status and by agent.
    pub fn get_stats(&self, organization_id: &str, user_id: &str) -> Result<ScheduleStats> {
        let total: u32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM schedules
                 WHERE organization_id=?1 AND user_id=?2 AND deleted_at IS NULL",
                params![organization_id, user_id],
                |row| row.get(0),
            )
            .map_err(|e| TaskClawError::Store(format!("Stats total: {e}")))?;
        let counted = self.count_for_user(organization_id, user_id)?;

        let mut stmt = self
            .conn
            .prepare(
                "SELECT status, COUNT(*) FROM schedules
                 WHERE organization_id=?1 AND user_id=?2 AND deleted_at IS NULL
                 GROUP BY status ORDER BY status",
            )
            .map_err(|e| TaskClawError::Store(format!("Prepare: {e}")))?;
        let by_status = stmt
            .query_map(params![organization_id, user_id], |row| {
                let raw: String = row.get(0)?;
                let status = ScheduleStatus::parse(&raw).ok_or_else(|| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        Type::Text,
                        format!("unknown schedule status '{raw}'").into(),
                    )
                })?;
                Ok(StatusCount { status, count: row.get(1)? })
            })
            .map_err(|e| TaskClawError::Store(format!("Query: {e}")))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| TaskClawError::Store(format!("Read stats row: {e}")))?;

        let mut stmt = self
            .conn
            .prepare(
                "SELECT agent_id, COUNT(*) FROM schedules
                 WHERE organization_id=?1 AND user_id=?2 AND deleted_at IS NULL
                 GROUP BY agent_id ORDER BY agent_id",
            )
            .map_err(|e| TaskClawError::Store(format!("Prepare: {e}")))?;
        let by_agent = stmt
            .query_map(params![organization_id, user_id], |row| {
                Ok(AgentCount { agent_id: row.get(0)?, count: row.get(1)? })
            })
            .map_err(|e| TaskClawError::Store(format!("Query: {e}")))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| TaskClawError::Store(format!("Read stats row: {e}")))?;

        Ok(ScheduleStats { total, counted_against_quota: counted, by_status, by_agent })
    }

    // ─── Execution Tracker ───────────────────────────────────

    /// Create a `pending` execution with a caller-supplied number. The
    /// schedule's thread id and retry budget are copied at this instant.
    /// Returns `None` when the schedule cannot be resolved; a number
    /// collision surfaces as a store error.
    pub fn create_execution(
        &self,
        schedule_id: &str,
        organization_id: &str,
        scheduled_at: DateTime<Utc>,
        execution_number: i64,
    ) -> Result<Option<Execution>> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| TaskClawError::Store(format!("Begin create execution: {e}")))?;
        let created =
            Self::insert_execution(&tx, schedule_id, organization_id, scheduled_at, execution_number)?;
        tx.commit()
            .map_err(|e| TaskClawError::Store(format!("Commit create execution: {e}")))?;
        Ok(created)
    }

    /// Create a `pending` execution with the next free number, assigned
    /// atomically inside the transaction. Safe against concurrent creators
    /// together with the schema's uniqueness constraint.
    pub fn create_next_execution(
        &self,
        schedule_id: &str,
        organization_id: &str,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Option<Execution>> {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| TaskClawError::Store(format!("Begin create execution: {e}")))?;
        let number: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(execution_number), 0) + 1 FROM executions
                 WHERE schedule_id=?1",
                params![schedule_id],
                |row| row.get(0),
            )
            .map_err(|e| TaskClawError::Store(format!("Next execution number: {e}")))?;
        let created =
            Self::insert_execution(&tx, schedule_id, organization_id, scheduled_at, number)?;
        tx.commit()
            .map_err(|e| TaskClawError::Store(format!("Commit create execution: {e}")))?;
        Ok(created)
    }

    fn insert_execution(
        tx: &rusqlite::Transaction,
        schedule_id: &str,
        organization_id: &str,
        scheduled_at: DateTime<Utc>,
        execution_number: i64,
    ) -> Result<Option<Execution>> {
        // Copy thread id and retry budget from the owning schedule
        let schedule_row = tx.query_row(
            "SELECT thread_id, retry_policy FROM schedules
             WHERE id=?1 AND organization_id=?2 AND deleted_at IS NULL",
            params![schedule_id, organization_id],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?)),
        );
        let (thread_id, retry_policy_raw) = match schedule_row {
            Ok(pair) => pair,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(TaskClawError::Store(format!("Get schedule: {e}"))),
        };
        let max_retries = match retry_policy_raw {
            Some(raw) => serde_json::from_str::<RetryPolicy>(&raw)
                .map_err(|e| TaskClawError::Store(format!("Parse retry policy: {e}")))?
                .max_retries,
            None => 0,
        };

        let execution = Execution {
            id: uuid::Uuid::new_v4().to_string(),
            schedule_id: schedule_id.to_string(),
            organization_id: organization_id.to_string(),
            execution_number,
            status: ExecutionStatus::Pending,
            thread_id,
            progress_id: None,
            scheduled_at,
            started_at: None,
            completed_at: None,
            duration_ms: None,
            retry_attempt: 0,
            max_retries,
            next_retry_at: None,
            result_summary: None,
            outputs: Vec::new(),
            error: None,
            created_at: Utc::now(),
        };
        tx.execute(
            "INSERT INTO executions
             (id, schedule_id, organization_id, execution_number, status, thread_id,
              progress_id, scheduled_at, started_at, completed_at, duration_ms,
              retry_attempt, max_retries, next_retry_at, result_summary, result_outputs,
              error_code, error_message, error_retryable, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,NULL,NULL,NULL,?9,?10,NULL,NULL,'[]',
                     NULL,NULL,NULL,?11)",
            params![
                execution.id,
                execution.schedule_id,
                execution.organization_id,
                execution.execution_number,
                execution.status.as_str(),
                execution.thread_id,
                execution.progress_id,
                execution.scheduled_at.to_rfc3339(),
                execution.retry_attempt,
                execution.max_retries,
                execution.created_at.to_rfc3339(),
            ],
        )
        .map_err(|e| TaskClawError::Store(format!("Insert execution: {e}")))?;
        Ok(Some(execution))
    }

    /// Get an execution by ID within an organization.
    pub fn get_execution(&self, id: &str, organization_id: &str) -> Result<Option<Execution>> {
        match self.conn.query_row(
            &format!("{EXECUTION_SELECT} WHERE id=?1 AND organization_id=?2"),
            params![id, organization_id],
            row_to_execution,
        ) {
            Ok(e) => Ok(Some(e)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(TaskClawError::Store(format!("Get execution: {e}"))),
        }
    }

    /// List a schedule's executions, most recent first.
    pub fn list_executions(
        &self,
        schedule_id: &str,
        organization_id: &str,
        filter: &ExecutionFilter,
    ) -> Result<Vec<Execution>> {
        let sql = format!(
            "{EXECUTION_SELECT}
             WHERE schedule_id = ?1 AND organization_id = ?2
               AND (?3 IS NULL OR status = ?3)
             ORDER BY execution_number DESC
             LIMIT ?4"
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| TaskClawError::Store(format!("Prepare: {e}")))?;
        let rows = stmt
            .query_map(
                params![
                    schedule_id,
                    organization_id,
                    filter.status.map(|s| s.as_str()),
                    filter.limit.map(|l| l as i64).unwrap_or(-1),
                ],
                row_to_execution,
            )
            .map_err(|e| TaskClawError::Store(format!("Query: {e}")))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| TaskClawError::Store(format!("Read execution row: {e}")))?;
        Ok(rows)
    }

    /// The most recent execution of a schedule (highest number).
    pub fn get_latest_execution(
        &self,
        schedule_id: &str,
        organization_id: &str,
    ) -> Result<Option<Execution>> {
        match self.conn.query_row(
            &format!(
                "{EXECUTION_SELECT} WHERE schedule_id=?1 AND organization_id=?2
                 ORDER BY execution_number DESC LIMIT 1"
            ),
            params![schedule_id, organization_id],
            row_to_execution,
        ) {
            Ok(e) => Ok(Some(e)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(TaskClawError::Store(format!("Get latest execution: {e}"))),
        }
    }

    /// Start a pending or retrying execution: records `started_at` and
    /// attaches the progress object driving the user-facing view.
    pub fn start_execution(
        &self,
        id: &str,
        organization_id: &str,
        progress_id: Option<&str>,
    ) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE executions
                 SET status='running', started_at=?3, progress_id=COALESCE(?4, progress_id)
                 WHERE id=?1 AND organization_id=?2 AND status IN ('pending','retrying')",
                params![id, organization_id, Utc::now().to_rfc3339(), progress_id],
            )
            .map_err(|e| TaskClawError::Store(format!("Start execution: {e}")))?;
        Ok(rows == 1)
    }

    /// Finish a running execution successfully, recording its duration and
    /// whatever the run produced.
    pub fn succeed_execution(
        &self,
        id: &str,
        organization_id: &str,
        summary: Option<&str>,
        outputs: &[ExecutionOutput],
    ) -> Result<bool> {
        let outputs_json = serde_json::to_string(outputs)
            .map_err(|e| TaskClawError::Store(format!("Serialize outputs: {e}")))?;
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| TaskClawError::Store(format!("Begin succeed: {e}")))?;

        let started_at = match Self::running_started_at(&tx, id, organization_id)? {
            Some(v) => v,
            None => return Ok(false),
        };
        let now = Utc::now();
        let duration_ms = started_at.map(|s| (now - s).num_milliseconds().max(0));

        tx.execute(
            "UPDATE executions
             SET status='succeeded', completed_at=?3, duration_ms=?4,
                 result_summary=?5, result_outputs=?6
             WHERE id=?1 AND organization_id=?2",
            params![id, organization_id, now.to_rfc3339(), duration_ms, summary, outputs_json],
        )
        .map_err(|e| TaskClawError::Store(format!("Succeed execution: {e}")))?;
        tx.commit()
            .map_err(|e| TaskClawError::Store(format!("Commit succeed: {e}")))?;
        Ok(true)
    }

    /// Finish a running execution with an error. With `will_retry` the row
    /// moves to `retrying` (non-terminal, picked up by the retry sweep at
    /// `next_retry_at`) and the attempt counter is bumped by exactly one;
    /// without it the row is terminally `failed`. The error is recorded on
    /// both branches.
    pub fn fail_execution(
        &self,
        id: &str,
        organization_id: &str,
        error: &ExecutionError,
        will_retry: bool,
        next_retry_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        if will_retry && next_retry_at.is_none() {
            return Err(TaskClawError::InvalidField(
                "next_retry_at is required when will_retry is set".into(),
            ));
        }
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| TaskClawError::Store(format!("Begin fail: {e}")))?;

        let started_at = match Self::running_started_at(&tx, id, organization_id)? {
            Some(v) => v,
            None => return Ok(false),
        };
        let now = Utc::now();

        if will_retry {
            tx.execute(
                "UPDATE executions
                 SET status='retrying', retry_attempt=retry_attempt+1, next_retry_at=?3,
                     error_code=?4, error_message=?5, error_retryable=?6
                 WHERE id=?1 AND organization_id=?2",
                params![
                    id,
                    organization_id,
                    next_retry_at.map(|t| t.to_rfc3339()),
                    error.code,
                    error.message,
                    error.retryable as i32,
                ],
            )
            .map_err(|e| TaskClawError::Store(format!("Fail execution: {e}")))?;
        } else {
            let duration_ms = started_at.map(|s| (now - s).num_milliseconds().max(0));
            tx.execute(
                "UPDATE executions
                 SET status='failed', completed_at=?3, duration_ms=?4, next_retry_at=NULL,
                     error_code=?5, error_message=?6, error_retryable=?7
                 WHERE id=?1 AND organization_id=?2",
                params![
                    id,
                    organization_id,
                    now.to_rfc3339(),
                    duration_ms,
                    error.code,
                    error.message,
                    error.retryable as i32,
                ],
            )
            .map_err(|e| TaskClawError::Store(format!("Fail execution: {e}")))?;
        }
        tx.commit()
            .map_err(|e| TaskClawError::Store(format!("Commit fail: {e}")))?;
        Ok(true)
    }

    /// `started_at` of a running execution, or `None` when the row is not
    /// resolvable in that state (no partial writes happen then).
    fn running_started_at(
        tx: &rusqlite::Transaction,
        id: &str,
        organization_id: &str,
    ) -> Result<Option<Option<DateTime<Utc>>>> {
        match tx.query_row(
            "SELECT started_at FROM executions
             WHERE id=?1 AND organization_id=?2 AND status='running'",
            params![id, organization_id],
            |row| row.get::<_, Option<String>>(0),
        ) {
            Ok(raw) => Ok(Some(parse_ts_opt(0, raw).map_err(|e| {
                TaskClawError::Store(format!("Parse started_at: {e}"))
            })?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(TaskClawError::Store(format!("Get execution: {e}"))),
        }
    }

    /// Cancel a non-terminal execution. Only marks the record — stopping
    /// in-flight work is the dispatcher's job.
    pub fn cancel_execution(&self, id: &str, organization_id: &str) -> Result<bool> {
        self.close_execution(id, organization_id, ExecutionStatus::Cancelled)
    }

    /// Skip a non-terminal execution (deliberately not run).
    pub fn skip_execution(&self, id: &str, organization_id: &str) -> Result<bool> {
        self.close_execution(id, organization_id, ExecutionStatus::Skipped)
    }

    fn close_execution(
        &self,
        id: &str,
        organization_id: &str,
        status: ExecutionStatus,
    ) -> Result<bool> {
        let rows = self
            .conn
            .execute(
                "UPDATE executions SET status=?3, completed_at=?4
                 WHERE id=?1 AND organization_id=?2 AND status IN ('pending','running','retrying')",
                params![id, organization_id, status.as_str(), Utc::now().to_rfc3339()],
            )
            .map_err(|e| TaskClawError::Store(format!("Close execution: {e}")))?;
        Ok(rows == 1)
    }

    // ─── Retry Sweep ─────────────────────────────────────────

    /// Executions ready for another attempt: `retrying` with a due
    /// `next_retry_at`, earliest first. The retry sweep's work queue.
    pub fn get_retryable_executions(
        &self,
        now: DateTime<Utc>,
        limit: Option<u32>,
    ) -> Result<Vec<Execution>> {
        let sql = format!(
            "{EXECUTION_SELECT}
             WHERE status='retrying' AND next_retry_at IS NOT NULL AND next_retry_at <= ?1
             ORDER BY next_retry_at ASC
             LIMIT ?2"
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| TaskClawError::Store(format!("Prepare: {e}")))?;
        let rows = stmt
            .query_map(
                params![now.to_rfc3339(), limit.map(|l| l as i64).unwrap_or(-1)],
                row_to_execution,
            )
            .map_err(|e| TaskClawError::Store(format!("Query: {e}")))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| TaskClawError::Store(format!("Read execution row: {e}")))?;
        Ok(rows)
    }
}
