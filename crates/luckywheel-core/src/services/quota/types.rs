//! Daily quota types
//!
//! The persisted aggregate, its records, configuration and the views
//! handed back to callers.

use std::collections::VecDeque;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Uses restored by each automatic daily reset
pub const DEFAULT_DAILY_ALLOWANCE: u32 = 10;

/// Maximum number of usage records kept
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Storage key of the serialized remaining count and history
pub const QUOTA_STATE_KEY: &str = "quota_state";

/// Storage key of the ISO date of the last reset
pub const LAST_RESET_DATE_KEY: &str = "last_reset_date";

/// Format of the stored reset date
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for a daily quota tracker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Uses restored at each automatic reset
    pub daily_allowance: u32,
    /// Maximum history length (minimum 1)
    pub history_limit: usize,
    /// Namespace for the storage keys, one per device/session
    pub profile: Option<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            daily_allowance: DEFAULT_DAILY_ALLOWANCE,
            history_limit: DEFAULT_HISTORY_LIMIT,
            profile: None,
        }
    }
}

impl TrackerConfig {
    /// Create a configuration with the given daily allowance
    pub fn with_allowance(daily_allowance: u32) -> Self {
        Self {
            daily_allowance,
            ..Default::default()
        }
    }

    /// Validate and normalize the configuration
    pub fn validate(&self) -> Self {
        let profile = self
            .profile
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Self {
            daily_allowance: self.daily_allowance,
            history_limit: self.history_limit.max(1),
            profile,
        }
    }

    /// Storage keys for this configuration's profile
    pub fn storage_keys(&self) -> StorageKeys {
        match &self.profile {
            Some(profile) => StorageKeys {
                state: format!("{}:{}", profile, QUOTA_STATE_KEY),
                last_reset_date: format!("{}:{}", profile, LAST_RESET_DATE_KEY),
            },
            None => StorageKeys {
                state: QUOTA_STATE_KEY.to_string(),
                last_reset_date: LAST_RESET_DATE_KEY.to_string(),
            },
        }
    }
}

/// Resolved storage keys for one tracker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub state: String,
    pub last_reset_date: String,
}

// ============================================================================
// Records & State
// ============================================================================

/// One recorded use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecord<O> {
    /// Caller-supplied payload (e.g. the prize a spin landed on)
    pub outcome: O,
    /// When the use was recorded, stored as epoch milliseconds
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

/// JSON document stored under [`QUOTA_STATE_KEY`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredQuotaState<O> {
    pub remaining: u32,
    #[serde(default = "VecDeque::new")]
    pub history: VecDeque<UsageRecord<O>>,
}

/// In-memory quota aggregate
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaState<O> {
    /// Uses left today
    pub remaining: u32,
    /// Most recent first
    pub history: VecDeque<UsageRecord<O>>,
    /// Local date of the last reset
    pub last_reset_date: NaiveDate,
}

impl<O> QuotaState<O> {
    /// Fresh state for `today`
    pub fn initial(daily_allowance: u32, today: NaiveDate) -> Self {
        Self {
            remaining: daily_allowance,
            history: VecDeque::new(),
            last_reset_date: today,
        }
    }

    /// Record a use at the front and evict the oldest beyond `limit`
    pub fn push_record(&mut self, record: UsageRecord<O>, limit: usize) {
        self.history.push_front(record);
        self.history.truncate(limit);
    }
}

impl<O: Serialize> QuotaState<O> {
    /// Encode into the `(key, value)` pairs written to storage
    pub fn to_entries(&self, keys: &StorageKeys) -> Result<Vec<(String, String)>, serde_json::Error> {
        #[derive(Serialize)]
        struct Borrowed<'a, O> {
            remaining: u32,
            history: &'a VecDeque<UsageRecord<O>>,
        }

        let state = serde_json::to_string(&Borrowed {
            remaining: self.remaining,
            history: &self.history,
        })?;

        Ok(vec![
            (keys.state.clone(), state),
            (
                keys.last_reset_date.clone(),
                self.last_reset_date.format(DATE_FORMAT).to_string(),
            ),
        ])
    }
}

/// Parse a stored reset date
pub fn parse_reset_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).ok()
}

// ============================================================================
// Views
// ============================================================================

/// Result of a successful use
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UseReceipt<O> {
    /// Uses left after this one
    pub remaining: u32,
    /// The record just added to the head of the history
    pub record: UsageRecord<O>,
}

/// Snapshot of the tracker for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaStatus {
    pub remaining: u32,
    pub daily_allowance: u32,
    /// Records made since the last reset date began
    pub used_today: usize,
    pub history_len: usize,
    pub last_reset_date: NaiveDate,
    /// Next local midnight, when the automatic reset becomes due
    pub next_reset_at: DateTime<FixedOffset>,
    /// False while the tracker runs in memory-only mode
    pub persistent: bool,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(outcome: &str, millis: i64) -> UsageRecord<String> {
        UsageRecord {
            outcome: outcome.to_string(),
            timestamp: Utc.timestamp_millis_opt(millis).unwrap(),
        }
    }

    #[test]
    fn test_default_config() {
        let config = TrackerConfig::default();
        assert_eq!(config.daily_allowance, DEFAULT_DAILY_ALLOWANCE);
        assert_eq!(config.history_limit, DEFAULT_HISTORY_LIMIT);
        assert!(config.profile.is_none());
    }

    #[test]
    fn test_config_validate() {
        let config = TrackerConfig {
            daily_allowance: 3,
            history_limit: 0,
            profile: Some("   ".to_string()),
        };

        let validated = config.validate();
        assert_eq!(validated.daily_allowance, 3);
        assert_eq!(validated.history_limit, 1);
        assert!(validated.profile.is_none());
    }

    #[test]
    fn test_storage_keys_with_profile() {
        let config = TrackerConfig {
            profile: Some("device-7".to_string()),
            ..Default::default()
        };
        let keys = config.storage_keys();
        assert_eq!(keys.state, "device-7:quota_state");
        assert_eq!(keys.last_reset_date, "device-7:last_reset_date");

        let plain = TrackerConfig::default().storage_keys();
        assert_eq!(plain.state, "quota_state");
        assert_eq!(plain.last_reset_date, "last_reset_date");
    }

    #[test]
    fn test_push_record_evicts_oldest() {
        let today = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let mut state = QuotaState::initial(10, today);
        for i in 0..5 {
            state.push_record(record(&format!("p{}", i), i), 3);
        }
        let outcomes: Vec<_> = state.history.iter().map(|r| r.outcome.as_str()).collect();
        assert_eq!(outcomes, vec!["p4", "p3", "p2"]);
    }

    #[test]
    fn test_stored_state_wire_format() {
        let today = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let mut state = QuotaState::initial(4, today);
        state.push_record(record("voucher", 1_777_000_000_123), 50);

        let entries = state.to_entries(&TrackerConfig::default().storage_keys()).unwrap();
        assert_eq!(entries[0].0, "quota_state");
        assert_eq!(
            entries[0].1,
            r#"{"remaining":4,"history":[{"outcome":"voucher","timestamp":1777000000123}]}"#
        );
        assert_eq!(entries[1], ("last_reset_date".to_string(), "2026-05-01".to_string()));
    }

    #[test]
    fn test_stored_state_history_defaults_to_empty() {
        let stored: StoredQuotaState<String> = serde_json::from_str(r#"{"remaining":2}"#).unwrap();
        assert_eq!(stored.remaining, 2);
        assert!(stored.history.is_empty());
    }

    #[test]
    fn test_negative_remaining_is_rejected() {
        let parsed = serde_json::from_str::<StoredQuotaState<String>>(r#"{"remaining":-1,"history":[]}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_parse_reset_date() {
        assert_eq!(
            parse_reset_date("2026-02-04"),
            NaiveDate::from_ymd_opt(2026, 2, 4)
        );
        assert_eq!(parse_reset_date(" 2026-02-04\n"), NaiveDate::from_ymd_opt(2026, 2, 4));
        assert!(parse_reset_date("Wed Feb 04 2026").is_none());
        assert!(parse_reset_date("").is_none());
    }
}
