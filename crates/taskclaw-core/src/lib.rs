//! # TaskClaw Core
//!
//! Shared foundation for the TaskClaw workspace: configuration loading and
//! the common error type. Everything else (scheduling, persistence) builds
//! on top of this crate.

pub mod config;
pub mod error;

pub use config::TaskClawConfig;
pub use error::{Result, TaskClawError};
