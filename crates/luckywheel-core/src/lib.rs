//! # luckywheel-core
//!
//! Core logic for Luckywheel - shared between the CLI and client shells.
//!
//! This crate provides:
//! - Database operations (`db` module)
//! - The daily spin quota tracker and its reset timer (`services::quota`)
//! - Unified error handling (`error` module)

pub mod db;
pub mod error;
pub mod services;

// Re-exports for convenience
pub use db::Database;
pub use error::{Error, Result};

// Re-export commonly used types from services
pub use services::{
    spawn_reset_checker, Clock, DailyQuotaTracker, MemoryStorage, OutcomeSource, QuotaError,
    QuotaStatus, QuotaStorage, ResetCheckConfig, ResetCheckHandle, SqliteStorage, SystemClock,
    TrackerConfig, UsageRecord, UseReceipt,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version
pub fn version() -> &'static str {
    VERSION
}
