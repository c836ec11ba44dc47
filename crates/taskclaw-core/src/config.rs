//! TaskClaw configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskClawConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub plans: PlansConfig,
}

impl Default for TaskClawConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            plans: PlansConfig::default(),
        }
    }
}

impl TaskClawConfig {
    /// Load config from the default path (~/.taskclaw/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::TaskClawError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| crate::error::TaskClawError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::TaskClawError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the TaskClaw home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".taskclaw")
    }

    /// Quota limits for a plan name, falling back to the free plan.
    pub fn limits_for(&self, plan: &str) -> &PlanLimits {
        match plan {
            "pro" => &self.plans.pro,
            "team" => &self.plans.team,
            _ => &self.plans.free,
        }
    }
}

/// Scheduler behavior knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Database path (defaults to ~/.taskclaw/scheduler.db).
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Consecutive failures before a schedule is automatically failed.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    /// Default retry budget for a single execution.
    #[serde(default = "default_max_retries")]
    pub default_max_retries: u32,
    /// Base delay before the first retry (milliseconds).
    #[serde(default = "default_retry_delay_ms")]
    pub default_retry_delay_ms: u64,
    /// Multiplier applied to the delay on each further retry.
    #[serde(default = "default_backoff_multiplier")]
    pub default_backoff_multiplier: f64,
    /// Upper bound on any computed retry delay (milliseconds).
    #[serde(default = "default_max_retry_delay_ms")]
    pub default_max_retry_delay_ms: u64,
}

fn default_db_path() -> String {
    TaskClawConfig::home_dir()
        .join("scheduler.db")
        .to_string_lossy()
        .into_owned()
}
fn default_max_consecutive_failures() -> u32 { 3 }
fn default_max_retries() -> u32 { 3 }
fn default_retry_delay_ms() -> u64 { 60_000 }
fn default_backoff_multiplier() -> f64 { 2.0 }
fn default_max_retry_delay_ms() -> u64 { 3_600_000 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            max_consecutive_failures: default_max_consecutive_failures(),
            default_max_retries: default_max_retries(),
            default_retry_delay_ms: default_retry_delay_ms(),
            default_backoff_multiplier: default_backoff_multiplier(),
            default_max_retry_delay_ms: default_max_retry_delay_ms(),
        }
    }
}

/// Per-plan quota limits. The comparison against a user's active-seat count
/// is done by the caller; this is just the configured threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlansConfig {
    #[serde(default = "default_free_limits")]
    pub free: PlanLimits,
    #[serde(default = "default_pro_limits")]
    pub pro: PlanLimits,
    #[serde(default = "default_team_limits")]
    pub team: PlanLimits,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanLimits {
    /// Maximum schedules counted against the plan (completed/expired excluded).
    pub max_active_schedules: u32,
}

fn default_free_limits() -> PlanLimits {
    PlanLimits { max_active_schedules: 3 }
}
fn default_pro_limits() -> PlanLimits {
    PlanLimits { max_active_schedules: 25 }
}
fn default_team_limits() -> PlanLimits {
    PlanLimits { max_active_schedules: 100 }
}

impl Default for PlansConfig {
    fn default() -> Self {
        Self {
            free: default_free_limits(),
            pro: default_pro_limits(),
            team: default_team_limits(),
        }
    }
}
