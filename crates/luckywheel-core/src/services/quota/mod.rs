//! Daily quota module
//!
//! Per-day usage quota ("spins left today") with a bounded history of what
//! each use yielded, kept in durable key/value storage and reset lazily when
//! the local calendar date changes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ DailyQuotaTracker                                       │
//! │   - attempt_use() / attempt_use_with()                  │
//! │   - check_and_apply_daily_reset()                       │
//! │   - reset_quota() / clear_history()                     │
//! │   - remaining() / history() / status()                  │
//! └─────────────────────────────────────────────────────────┘
//!      │                 │                   ▲
//!      ▼                 ▼                   │
//! ┌──────────────┐ ┌──────────┐     ┌─────────────────────┐
//! │trait         │ │trait     │     │ ResetCheckHandle    │
//! │QuotaStorage  │ │Clock     │     │ (periodic check)    │
//! └──────────────┘ └──────────┘     └─────────────────────┘
//!     │      │
//!     ▼      ▼
//! ┌──────┐ ┌──────┐
//! │SQLite│ │Memory│
//! └──────┘ └──────┘
//! ```
//!
//! What a use yields is decided by the caller, optionally through an
//! [`OutcomeSource`]; the tracker only records it.
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use luckywheel_core::services::quota::{
//!     spawn_reset_checker, DailyQuotaTracker, ResetCheckConfig, SqliteStorage, SystemClock,
//!     TrackerConfig,
//! };
//!
//! let storage = Arc::new(SqliteStorage::new(db.pool.clone()));
//! let tracker: Arc<DailyQuotaTracker<String>> = Arc::new(
//!     DailyQuotaTracker::load(TrackerConfig::default(), storage, Arc::new(SystemClock)).await,
//! );
//!
//! let checker = spawn_reset_checker(Arc::clone(&tracker), ResetCheckConfig::default());
//!
//! match tracker.attempt_use("10% voucher".to_string()).await {
//!     Ok(receipt) => println!("{} spins left", receipt.remaining),
//!     Err(e) => println!("{}", e),
//! }
//!
//! checker.shutdown().await;
//! ```

pub mod clock;
pub mod memory;
pub mod provider;
pub mod store;
pub mod timer;
pub mod tracker;
pub mod types;

// Re-export main types
pub use types::{
    QuotaState,
    QuotaStatus,
    StorageKeys,
    StoredQuotaState,
    TrackerConfig,
    UsageRecord,
    UseReceipt,
    DEFAULT_DAILY_ALLOWANCE,
    DEFAULT_HISTORY_LIMIT,
    LAST_RESET_DATE_KEY,
    QUOTA_STATE_KEY,
};

// Re-export capability traits and errors
pub use provider::{OutcomeSource, QuotaError, QuotaStorage, StorageError};

// Re-export storage backends
pub use memory::MemoryStorage;
pub use store::{SqliteStorage, StoredEntry};

// Re-export clocks
pub use clock::{next_local_midnight, Clock, ManualClock, SystemClock};

// Re-export tracker
pub use tracker::{DailyQuotaTracker, Outcome};

// Re-export timer types
pub use timer::{
    spawn_reset_checker,
    ResetCheckConfig,
    ResetCheckHandle,
    ResetCheckState,
    ResetCheckStatus,
    SharedCheckState,
    DEFAULT_INTERVAL_SECS,
    MIN_INTERVAL_SECS,
};
