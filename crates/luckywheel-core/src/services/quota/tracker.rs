//! Daily quota tracker
//!
//! Owns the remaining-uses counter, the bounded usage history and the daily
//! reset rule, and keeps them in a [`QuotaStorage`] across restarts.
//!
//! # Consistency
//!
//! Every mutation builds the next state from a copy, writes it to storage,
//! and only then replaces the in-memory state. All of this happens under one
//! async mutex, so mutations never interleave and a cancelled call leaves the
//! previous state in place.
//!
//! A failed write does not fail the operation: the tracker keeps going in
//! memory-only mode and tries to write again on the next mutation.
//!
//! If the store could not be read at load, the in-memory state is only a
//! placeholder. Each mutation first tries the read again; once it succeeds
//! the stored state becomes authoritative and the uses made in the meantime
//! are replayed on top of it, so the placeholder never overwrites a saved
//! record.
//!
//! Two trackers pointed at the same keys (another process, another window)
//! are not coordinated. The last write wins and concurrent updates can be
//! lost.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, SubsecRound};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;

use super::clock::{next_local_midnight, Clock};
use super::provider::{OutcomeSource, QuotaError, QuotaStorage};
use super::types::{
    parse_reset_date, QuotaState, QuotaStatus, StorageKeys, StoredQuotaState, TrackerConfig,
    UsageRecord, UseReceipt,
};

/// Payload types the tracker can record
pub trait Outcome: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Outcome for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Releases the single-flight flag when dropped
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Per-day usage quota with bounded history and durable state
pub struct DailyQuotaTracker<O: Outcome> {
    config: TrackerConfig,
    keys: StorageKeys,
    storage: Arc<dyn QuotaStorage>,
    clock: Arc<dyn Clock>,
    state: Mutex<QuotaState<O>>,
    in_flight: AtomicBool,
    persistent: AtomicBool,
    /// False until the stored state has been read (or found absent)
    synced: AtomicBool,
}

impl<O: Outcome> DailyQuotaTracker<O> {
    /// Load the tracker from storage and apply any pending daily reset
    ///
    /// Never fails: missing state starts fresh, corrupt state is discarded,
    /// and an unreachable store puts the tracker in memory-only mode.
    pub async fn load(
        config: TrackerConfig,
        storage: Arc<dyn QuotaStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config = config.validate();
        let keys = config.storage_keys();
        let today = clock.today();

        let loaded = read_state::<O>(storage.as_ref(), &keys, config.history_limit).await;
        let (state, needs_write, synced) = match loaded {
            Ok(Some(state)) => {
                log::debug!(
                    "[quota:tracker] Loaded state from {}: {} remaining, {} records, last reset {}",
                    storage.backend_name(),
                    state.remaining,
                    state.history.len(),
                    state.last_reset_date
                );
                (state, false, true)
            }
            Ok(None) => {
                log::info!("[quota:tracker] No stored state, starting with {} uses", config.daily_allowance);
                (QuotaState::initial(config.daily_allowance, today), true, true)
            }
            Err(QuotaError::CorruptState(reason)) => {
                log::warn!("[quota:tracker] Discarding corrupt stored state: {}", reason);
                for key in [&keys.state, &keys.last_reset_date] {
                    if let Err(e) = storage.remove(key).await {
                        log::warn!("[quota:tracker] Failed to remove corrupt key {}: {}", key, e);
                    }
                }
                (QuotaState::initial(config.daily_allowance, today), true, true)
            }
            Err(e) => {
                log::warn!("[quota:tracker] {}; running in memory-only mode", e);
                (QuotaState::initial(config.daily_allowance, today), false, false)
            }
        };

        let tracker = Self {
            config,
            keys,
            storage,
            clock,
            state: Mutex::new(state),
            in_flight: AtomicBool::new(false),
            persistent: AtomicBool::new(synced),
            synced: AtomicBool::new(synced),
        };

        if needs_write {
            let guard = tracker.state.lock().await;
            tracker.persist(&guard).await;
        }

        tracker.check_and_apply_daily_reset().await;
        tracker
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Restore the daily allowance if the local date moved since the last reset
    ///
    /// Returns `true` when a reset was applied. Calling it again on the same
    /// day is a no-op.
    pub async fn check_and_apply_daily_reset(&self) -> bool {
        let mut guard = self.state.lock().await;
        self.sync_with_storage(&mut guard).await;
        self.roll_over(&mut guard).await
    }

    /// Record one use with a caller-determined outcome
    ///
    /// # Errors
    /// - `QuotaExhausted` if no uses are left today
    /// - `AlreadyInProgress` if another use is still being recorded
    ///
    /// Neither error changes the state.
    pub async fn attempt_use(&self, outcome: O) -> Result<UseReceipt<O>, QuotaError> {
        self.record_use(move || outcome).await
    }

    /// Record one use, asking `source` for the outcome once quota is confirmed
    ///
    /// The source is not consulted when the attempt is rejected.
    pub async fn attempt_use_with(
        &self,
        source: &dyn OutcomeSource<O>,
    ) -> Result<UseReceipt<O>, QuotaError> {
        self.record_use(|| source.determine_outcome()).await
    }

    /// Manually refill the quota to `new_allowance`
    ///
    /// Moves the reset date to today and keeps the history.
    pub async fn reset_quota(&self, new_allowance: u32) -> u32 {
        let mut guard = self.state.lock().await;
        self.sync_with_storage(&mut guard).await;
        let mut next = guard.clone();
        next.remaining = new_allowance;
        next.last_reset_date = self.clock.today();

        self.persist(&next).await;
        *guard = next;

        log::info!("[quota:tracker] Quota manually reset to {}", new_allowance);
        new_allowance
    }

    /// Manual refill to the configured daily allowance
    pub async fn reset_quota_default(&self) -> u32 {
        self.reset_quota(self.config.daily_allowance).await
    }

    /// Drop all usage records, keeping the counter and reset date
    ///
    /// Returns how many records were removed.
    pub async fn clear_history(&self) -> usize {
        let mut guard = self.state.lock().await;
        self.sync_with_storage(&mut guard).await;
        let cleared = guard.history.len();
        let mut next = guard.clone();
        next.history.clear();

        self.persist(&next).await;
        *guard = next;

        log::info!("[quota:tracker] Cleared {} history records", cleared);
        cleared
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn remaining(&self) -> u32 {
        self.state.lock().await.remaining
    }

    /// Usage records, most recent first
    pub async fn history(&self) -> Vec<UsageRecord<O>> {
        self.state.lock().await.history.iter().cloned().collect()
    }

    pub async fn last_reset_date(&self) -> NaiveDate {
        self.state.lock().await.last_reset_date
    }

    /// Copy of the whole in-memory state
    pub async fn snapshot(&self) -> QuotaState<O> {
        self.state.lock().await.clone()
    }

    pub async fn status(&self) -> QuotaStatus {
        let state = self.state.lock().await;
        let now = self.clock.now();
        let today = now.date_naive();
        let used_today = state
            .history
            .iter()
            .filter(|r| r.timestamp.with_timezone(now.offset()).date_naive() == today)
            .count();

        QuotaStatus {
            remaining: state.remaining,
            daily_allowance: self.config.daily_allowance,
            used_today,
            history_len: state.history.len(),
            last_reset_date: state.last_reset_date,
            next_reset_at: next_local_midnight(now),
            persistent: self.is_persistent(),
        }
    }

    /// False while the last write to storage failed
    pub fn is_persistent(&self) -> bool {
        self.persistent.load(Ordering::Acquire)
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Current instant according to the tracker's clock
    pub fn now(&self) -> DateTime<FixedOffset> {
        self.clock.now()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn begin_use(&self) -> Result<InFlight<'_>, QuotaError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| InFlight(&self.in_flight))
            .map_err(|_| QuotaError::AlreadyInProgress)
    }

    async fn record_use<F>(&self, outcome: F) -> Result<UseReceipt<O>, QuotaError>
    where
        F: FnOnce() -> O + Send,
    {
        let _flight = self.begin_use()?;
        let mut guard = self.state.lock().await;
        self.sync_with_storage(&mut guard).await;

        // Lazy reset, in case the periodic check has not run yet today
        self.roll_over(&mut guard).await;

        if guard.remaining == 0 {
            log::debug!("[quota:tracker] Use rejected, quota exhausted");
            return Err(QuotaError::QuotaExhausted);
        }

        let record = UsageRecord {
            outcome: outcome(),
            // Stored with millisecond precision
            timestamp: self.clock.now_utc().trunc_subsecs(3),
        };

        let mut next = guard.clone();
        next.remaining -= 1;
        next.push_record(record.clone(), self.config.history_limit);

        self.persist(&next).await;
        *guard = next;

        log::debug!("[quota:tracker] Use recorded, {} remaining", guard.remaining);
        Ok(UseReceipt {
            remaining: guard.remaining,
            record,
        })
    }

    /// Retry the initial read after a failed load
    ///
    /// On success the stored state replaces the placeholder and the result
    /// is written back. Records made since load are replayed onto it when
    /// both describe the same reset day; if the stored day differs, the
    /// placeholder already is today's state and is kept.
    async fn sync_with_storage(&self, state: &mut QuotaState<O>) {
        if self.synced.load(Ordering::Acquire) {
            return;
        }

        let stored =
            match read_state::<O>(self.storage.as_ref(), &self.keys, self.config.history_limit).await {
                Ok(stored) => stored,
                Err(QuotaError::CorruptState(reason)) => {
                    log::warn!("[quota:tracker] Stored state unusable, keeping current: {}", reason);
                    None
                }
                Err(e) => {
                    log::debug!("[quota:tracker] Stored state still unreadable: {}", e);
                    return;
                }
            };
        self.synced.store(true, Ordering::Release);

        let Some(mut merged) = stored else {
            log::info!("[quota:tracker] Storage reachable, nothing stored yet");
            self.persist(state).await;
            return;
        };

        if merged.last_reset_date != state.last_reset_date {
            log::info!(
                "[quota:tracker] Stored state is from {}, keeping state for {}",
                merged.last_reset_date,
                state.last_reset_date
            );
            self.persist(state).await;
            return;
        }

        let replayed = state.history.len();
        for record in state.history.iter().rev() {
            merged.remaining = merged.remaining.saturating_sub(1);
            merged.push_record(record.clone(), self.config.history_limit);
        }

        log::info!(
            "[quota:tracker] Adopted stored state ({} remaining) and replayed {} unsaved uses",
            merged.remaining,
            replayed
        );
        self.persist(&merged).await;
        *state = merged;
    }

    async fn roll_over(&self, state: &mut QuotaState<O>) -> bool {
        let today = self.clock.today();
        if state.last_reset_date == today {
            return false;
        }

        log::info!(
            "[quota:tracker] Day changed ({} -> {}), restoring {} uses",
            state.last_reset_date,
            today,
            self.config.daily_allowance
        );

        let next = QuotaState::initial(self.config.daily_allowance, today);
        self.persist(&next).await;
        *state = next;
        true
    }

    async fn persist(&self, state: &QuotaState<O>) {
        let entries = match state.to_entries(&self.keys) {
            Ok(entries) => entries,
            Err(e) => {
                log::error!("[quota:tracker] Failed to serialize state: {}", e);
                self.persistent.store(false, Ordering::Release);
                return;
            }
        };

        match self.storage.set_many(&entries).await {
            Ok(()) => {
                if !self.persistent.swap(true, Ordering::AcqRel) {
                    log::info!(
                        "[quota:tracker] {} storage reachable again, state persisted",
                        self.storage.backend_name()
                    );
                }
            }
            Err(e) => {
                let err = QuotaError::from(e);
                if self.persistent.swap(false, Ordering::AcqRel) {
                    log::warn!("[quota:tracker] {}; continuing in memory-only mode", err);
                } else {
                    log::debug!("[quota:tracker] Write retry failed: {}", err);
                }
            }
        }
    }
}

/// Read and decode the stored state
///
/// `Ok(None)` means there is nothing usable to resume from: no document, or
/// a document without a readable reset date.
async fn read_state<O: Outcome>(
    storage: &dyn QuotaStorage,
    keys: &StorageKeys,
    history_limit: usize,
) -> Result<Option<QuotaState<O>>, QuotaError> {
    let raw = match storage.get(&keys.state).await? {
        Some(raw) => raw,
        None => return Ok(None),
    };

    let stored: StoredQuotaState<O> = serde_json::from_str(&raw)?;

    let last_reset_date = match storage.get(&keys.last_reset_date).await? {
        Some(s) => match parse_reset_date(&s) {
            Some(date) => date,
            None => {
                log::warn!("[quota:tracker] Unreadable reset date '{}', treating state as stale", s);
                return Ok(None);
            }
        },
        None => {
            log::warn!("[quota:tracker] Stored state has no reset date, treating it as stale");
            return Ok(None);
        }
    };

    let mut history = stored.history;
    history.truncate(history_limit);

    Ok(Some(QuotaState {
        remaining: stored.remaining,
        history,
        last_reset_date,
    }))
}

// ============================================================================
// Tests
// ============================================================================
