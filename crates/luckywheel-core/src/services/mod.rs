//! Services module

pub mod quota;

pub use quota::{
    spawn_reset_checker, Clock, DailyQuotaTracker, MemoryStorage, OutcomeSource, QuotaError,
    QuotaStatus, QuotaStorage, ResetCheckConfig, ResetCheckHandle, SqliteStorage, SystemClock,
    TrackerConfig, UsageRecord, UseReceipt,
};
