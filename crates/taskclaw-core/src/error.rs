//! Common error type for all TaskClaw crates.

use thiserror::Error;

/// Workspace-wide result alias.
pub type Result<T> = std::result::Result<T, TaskClawError>;

/// Errors surfaced by TaskClaw components.
#[derive(Error, Debug)]
pub enum TaskClawError {
    /// Configuration loading/parsing problems.
    #[error("config error: {0}")]
    Config(String),

    /// Persistence layer problems (open, migrate, query).
    #[error("store error: {0}")]
    Store(String),

    /// A caller-supplied value failed validation at the storage boundary.
    #[error("invalid field: {0}")]
    InvalidField(String),

    /// Filesystem problems (config save, database directory creation).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
