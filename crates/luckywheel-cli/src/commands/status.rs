//! Status and history commands

use anyhow::Result;
use luckywheel_core::QuotaStatus;
use serde::Serialize;
use tabled::Tabled;

use super::{local_time, Context};

/// Status row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct StatusRow {
    #[tabled(rename = "Spins Left")]
    pub remaining: u32,
    #[tabled(rename = "Daily")]
    pub daily_allowance: u32,
    #[tabled(rename = "Used Today")]
    pub used_today: usize,
    #[tabled(rename = "History")]
    pub history_len: usize,
    #[tabled(rename = "Last Reset")]
    pub last_reset_date: String,
    #[tabled(rename = "Next Reset")]
    pub next_reset_at: String,
    #[tabled(rename = "Storage")]
    pub storage: String,
}

impl StatusRow {
    pub fn new(status: QuotaStatus, backend: &str) -> Self {
        let storage = if status.persistent {
            backend.to_string()
        } else {
            format!("{} (unavailable, memory only)", backend)
        };

        Self {
            remaining: status.remaining,
            daily_allowance: status.daily_allowance,
            used_today: status.used_today,
            history_len: status.history_len,
            last_reset_date: status.last_reset_date.to_string(),
            next_reset_at: status.next_reset_at.format("%Y-%m-%d %H:%M").to_string(),
            storage,
        }
    }
}

/// History row for table display
#[derive(Debug, Serialize, Tabled)]
pub struct HistoryRow {
    #[tabled(rename = "#")]
    pub index: usize,
    #[tabled(rename = "Prize")]
    pub prize: String,
    #[tabled(rename = "Time")]
    pub time: String,
    #[tabled(skip)]
    pub timestamp_ms: i64,
}

pub async fn show_status(ctx: &Context) -> Result<()> {
    let status = ctx.tracker.status().await;
    ctx.out.single(&StatusRow::new(status, ctx.backend))
}

pub async fn show_history(ctx: &Context, limit: usize) -> Result<()> {
    let rows: Vec<HistoryRow> = ctx
        .tracker
        .history()
        .await
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, record)| HistoryRow {
            index: i + 1,
            time: local_time(record.timestamp),
            timestamp_ms: record.timestamp.timestamp_millis(),
            prize: record.outcome,
        })
        .collect();

    ctx.out.list(&rows, "No spins recorded.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, NaiveDate, TimeZone};

    fn status(persistent: bool) -> QuotaStatus {
        let offset = FixedOffset::east_opt(3600).unwrap();
        QuotaStatus {
            remaining: 4,
            daily_allowance: 10,
            used_today: 6,
            history_len: 6,
            last_reset_date: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
            next_reset_at: offset.with_ymd_and_hms(2026, 6, 2, 0, 0, 0).unwrap(),
            persistent,
        }
    }

    #[test]
    fn test_status_row() {
        let row = StatusRow::new(status(true), "sqlite");
        assert_eq!(row.remaining, 4);
        assert_eq!(row.last_reset_date, "2026-06-01");
        assert_eq!(row.next_reset_at, "2026-06-02 00:00");
        assert_eq!(row.storage, "sqlite");
    }

    #[test]
    fn test_status_row_memory_only() {
        let row = StatusRow::new(status(false), "sqlite");
        assert!(row.storage.contains("memory only"));
    }
}
