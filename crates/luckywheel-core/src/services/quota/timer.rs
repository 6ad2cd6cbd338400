//! Daily reset timer
//!
//! Background task that periodically asks a tracker to apply the daily
//! reset. The check is lazy: the process does not have to be running at
//! midnight, the first tick after the date changes does the work.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │              ResetCheckHandle                 │
//! │  ┌────────────┐  ┌────────────┐  ┌─────────┐  │
//! │  │ Config     │  │ Timer Loop │  │ Status  │  │
//! │  │ - interval │  │ - tick()   │  │ - runs  │  │
//! │  │ - enabled  │  │ - check()  │  │ - resets│  │
//! │  └────────────┘  └────────────┘  └─────────┘  │
//! └───────────────────────────────────────────────┘
//!                        │
//!                        ▼
//!               ┌──────────────────┐
//!               │ DailyQuotaTracker│
//!               └──────────────────┘
//! ```
//!
//! # Features
//!
//! - Configurable check interval (minimum 1 second, default 60 seconds)
//! - Graceful shutdown via a oneshot signal, sent at most once
//! - Dropping the handle aborts the task, so the timer never outlives it

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::tracker::{DailyQuotaTracker, Outcome};

// ============================================================================
// Constants
// ============================================================================

/// Minimum check interval in seconds
pub const MIN_INTERVAL_SECS: u64 = 1;

/// Default check interval in seconds
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the reset checker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetCheckConfig {
    /// Whether the checker runs at all
    pub enabled: bool,
    /// Seconds between checks (minimum 1)
    pub interval_secs: u64,
}

impl Default for ResetCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: DEFAULT_INTERVAL_SECS,
        }
    }
}

impl ResetCheckConfig {
    /// Create a new configuration with the specified interval
    pub fn with_interval(interval_secs: u64) -> Self {
        Self {
            interval_secs: interval_secs.max(MIN_INTERVAL_SECS),
            ..Default::default()
        }
    }

    /// Validate and normalize the configuration
    pub fn validate(&self) -> Self {
        Self {
            enabled: self.enabled,
            interval_secs: self.interval_secs.max(MIN_INTERVAL_SECS),
        }
    }
}

// ============================================================================
// Status
// ============================================================================

/// Status of the reset checker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetCheckStatus {
    /// Whether the task is running
    pub is_running: bool,
    /// Whether a check is in progress
    pub is_checking: bool,
    /// Checks completed since start
    pub checks_run: u64,
    /// Checks that actually reset the quota
    pub resets_applied: u64,
    /// Last check timestamp (RFC 3339, tracker clock)
    pub last_check_at: Option<String>,
}

/// Internal state for the checker task
#[derive(Debug, Default)]
pub struct ResetCheckState {
    pub config: ResetCheckConfig,
    pub status: ResetCheckStatus,
}

impl ResetCheckState {
    pub fn new(config: ResetCheckConfig) -> Self {
        Self {
            config: config.validate(),
            status: ResetCheckStatus::default(),
        }
    }

    pub fn start(&mut self) {
        self.status.is_running = true;
    }

    pub fn stop(&mut self) {
        self.status.is_running = false;
        self.status.is_checking = false;
    }

    pub fn begin_check(&mut self) {
        self.status.is_checking = true;
    }

    pub fn complete_check(&mut self, reset_applied: bool, at: String) {
        self.status.is_checking = false;
        self.status.checks_run += 1;
        if reset_applied {
            self.status.resets_applied += 1;
        }
        self.status.last_check_at = Some(at);
    }
}

/// Shared state wrapper for thread-safe access
pub type SharedCheckState = Arc<RwLock<ResetCheckState>>;

// ============================================================================
// Task Handle
// ============================================================================

/// Owner of a running reset checker
///
/// `shutdown` stops the task and waits for it. Dropping the handle without
/// calling `shutdown` aborts the task instead.
pub struct ResetCheckHandle {
    config: ResetCheckConfig,
    state: SharedCheckState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl ResetCheckHandle {
    pub async fn status(&self) -> ResetCheckStatus {
        self.state.read().await.status.clone()
    }

    /// Validated configuration the checker runs with
    pub fn config(&self) -> &ResetCheckConfig {
        &self.config
    }

    /// Stop the checker and wait for the task to exit
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                log::warn!("[quota:timer] Reset checker ended abnormally: {}", e);
            }
        }

        self.state.write().await.stop();
        log::info!("[quota:timer] Reset checker shut down");
    }
}

impl Drop for ResetCheckHandle {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            log::debug!("[quota:timer] Handle dropped, aborting reset checker");
            join.abort();
        }
    }
}

/// Start the periodic reset check for `tracker`
///
/// Must be called from within a tokio runtime. The first check runs one
/// interval after start; `DailyQuotaTracker::load` already checked once.
pub fn spawn_reset_checker<O: Outcome>(
    tracker: Arc<DailyQuotaTracker<O>>,
    config: ResetCheckConfig,
) -> ResetCheckHandle {
    let mut initial = ResetCheckState::new(config);
    if !initial.config.enabled {
        log::info!("[quota:timer] Reset checker disabled");
        return ResetCheckHandle {
            config: initial.config.clone(),
            state: Arc::new(RwLock::new(initial)),
            shutdown_tx: None,
            join: None,
        };
    }

    let config = initial.config.clone();
    let interval = Duration::from_secs(config.interval_secs);
    initial.start();
    let state = Arc::new(RwLock::new(initial));
    let (tx, mut rx) = oneshot::channel::<()>();

    let task_state = Arc::clone(&state);
    let join = tokio::spawn(async move {
        log::info!(
            "[quota:timer] Reset checker started ({}s interval)",
            interval.as_secs()
        );

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = &mut rx => {
                    log::info!("[quota:timer] Received shutdown signal");
                    break;
                }
            }

            task_state.write().await.begin_check();
            let reset = tracker.check_and_apply_daily_reset().await;
            let at = tracker.now().to_rfc3339();
            task_state.write().await.complete_check(reset, at);

            if reset {
                log::info!("[quota:timer] Daily reset applied");
            }
        }

        task_state.write().await.stop();
        log::info!("[quota:timer] Reset checker exited");
    });

    ResetCheckHandle {
        config,
        state,
        shutdown_tx: Some(tx),
        join: Some(join),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::quota::clock::ManualClock;
    use crate::services::quota::memory::MemoryStorage;
    use crate::services::quota::types::TrackerConfig;
    use chrono::NaiveDate;

    // =========================================================================
    // Configuration Tests
    // =========================================================================

    #[test]
    fn test_default_config() {
        let config = ResetCheckConfig::default();
        assert!(config.enabled);
        assert_eq!(config.interval_secs, DEFAULT_INTERVAL_SECS);
    }

    #[test]
    fn test_config_enforces_minimum_interval() {
        assert_eq!(ResetCheckConfig::with_interval(0).interval_secs, MIN_INTERVAL_SECS);
        let config = ResetCheckConfig {
            enabled: false,
            interval_secs: 0,
        };
        let validated = config.validate();
        assert!(!validated.enabled);
        assert_eq!(validated.interval_secs, MIN_INTERVAL_SECS);
    }

    // =========================================================================
    // State Tests
    // =========================================================================

    #[test]
    fn test_state_counts_checks_and_resets() {
        let mut state = ResetCheckState::new(ResetCheckConfig::default());
        state.start();
        state.begin_check();
        assert!(state.status.is_checking);

        state.complete_check(false, "t1".to_string());
        state.complete_check(true, "t2".to_string());
        assert!(!state.status.is_checking);
        assert_eq!(state.status.checks_run, 2);
        assert_eq!(state.status.resets_applied, 1);
        assert_eq!(state.status.last_check_at.as_deref(), Some("t2"));

        state.stop();
        assert!(!state.status.is_running);
    }

    // =========================================================================
    // Task Tests
    // =========================================================================

    async fn tracker_at(clock: Arc<ManualClock>) -> Arc<DailyQuotaTracker<String>> {
        let storage = Arc::new(MemoryStorage::new());
        Arc::new(DailyQuotaTracker::load(TrackerConfig::default(), storage, clock).await)
    }

    fn late_evening() -> Arc<ManualClock> {
        let day = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        Arc::new(ManualClock::at(day, 23, 58, 2).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_checker_applies_reset_after_midnight() {
        let clock = late_evening();
        let tracker = tracker_at(clock.clone()).await;
        tracker.attempt_use("lamp".to_string()).await.unwrap();

        let handle = spawn_reset_checker(Arc::clone(&tracker), ResetCheckConfig::default());

        // Before midnight: ticks run, nothing resets
        tokio::time::sleep(Duration::from_secs(61)).await;
        let status = handle.status().await;
        assert!(status.is_running);
        assert_eq!(status.checks_run, 1);
        assert_eq!(status.resets_applied, 0);
        assert_eq!(tracker.remaining().await, 9);

        clock.advance(chrono::Duration::minutes(3));
        tokio::time::sleep(Duration::from_secs(60)).await;

        let status = handle.status().await;
        assert_eq!(status.checks_run, 2);
        assert_eq!(status.resets_applied, 1);
        assert_eq!(tracker.remaining().await, 10);
        assert!(tracker.history().await.is_empty());

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_reports_config_while_checking() {
        let tracker = tracker_at(late_evening()).await;
        let handle = spawn_reset_checker(Arc::clone(&tracker), ResetCheckConfig::with_interval(0));

        let busy = handle.state.write().await;
        assert_eq!(handle.config().interval_secs, MIN_INTERVAL_SECS);
        assert!(handle.config().enabled);
        drop(busy);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_task() {
        let tracker = tracker_at(late_evening()).await;
        let handle = spawn_reset_checker(Arc::clone(&tracker), ResetCheckConfig::with_interval(5));
        let state = Arc::clone(&handle.state);

        handle.shutdown().await;

        assert!(!state.read().await.status.is_running);
        // The task released its tracker reference
        assert_eq!(Arc::strong_count(&tracker), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_aborts_task() {
        let tracker = tracker_at(late_evening()).await;
        let handle = spawn_reset_checker(Arc::clone(&tracker), ResetCheckConfig::default());
        assert_eq!(Arc::strong_count(&tracker), 2);

        drop(handle);
        for _ in 0..10 {
            if Arc::strong_count(&tracker) == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(Arc::strong_count(&tracker), 1);
    }

    #[tokio::test]
    async fn test_disabled_checker_does_not_spawn() {
        let tracker = tracker_at(late_evening()).await;
        let config = ResetCheckConfig {
            enabled: false,
            interval_secs: 60,
        };
        let handle = spawn_reset_checker(Arc::clone(&tracker), config);

        assert!(!handle.status().await.is_running);
        assert!(!handle.config().enabled);
        assert_eq!(Arc::strong_count(&tracker), 1);
        handle.shutdown().await;
    }
}
