//! CLI commands module
//!
//! Contains all CLI command implementations.

pub mod admin;
pub mod spin;
pub mod status;
pub mod watch;

use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use luckywheel_core::DailyQuotaTracker;

use crate::output::Printer;

/// Tracker type used by the CLI: outcomes are prize names
pub type SpinTracker = DailyQuotaTracker<String>;

/// Shared context for all commands
pub struct Context {
    pub tracker: Arc<SpinTracker>,
    pub out: Printer,
    /// Storage backend in use ("sqlite" or "memory")
    pub backend: &'static str,
}

/// Render a record timestamp in local time
pub fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}
