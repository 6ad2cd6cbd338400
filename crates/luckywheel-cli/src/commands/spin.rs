//! Spin command
//!
//! Uses one spin. The prize is either given explicitly or drawn from a
//! weighted prize table; the tracker only records it.

use anyhow::{anyhow, bail, Result};
use clap::Args;
use luckywheel_core::{OutcomeSource, QuotaError};
use rand::distributions::{Distribution, WeightedIndex};
use serde::Serialize;
use tabled::Tabled;

use super::{local_time, Context};

/// Prize table used when none is configured
pub const DEFAULT_PRIZES: &str =
    "Better luck next time:40,5% voucher:30,Free shipping:20,10% voucher:9,Mystery gift:1";

#[derive(Args)]
pub struct SpinArgs {
    /// Record this prize instead of drawing one
    #[arg(short, long)]
    pub prize: Option<String>,

    /// Prize table as NAME or NAME:WEIGHT entries [default: built-in table]
    #[arg(long, env = "LUCKYWHEEL_PRIZES", value_delimiter = ',')]
    pub prizes: Vec<String>,
}

/// Result row for a successful spin
#[derive(Debug, Serialize, Tabled)]
pub struct SpinRow {
    #[tabled(rename = "Prize")]
    pub prize: String,
    #[tabled(rename = "Spins Left")]
    pub remaining: u32,
    #[tabled(rename = "At")]
    pub at: String,
}

/// Weighted prize table
#[derive(Debug)]
pub struct PrizeTable {
    names: Vec<String>,
    weights: WeightedIndex<u32>,
}

impl PrizeTable {
    /// Parse `NAME` / `NAME:WEIGHT` entries; a missing weight counts as 1
    pub fn parse(entries: &[String]) -> Result<Self> {
        let mut names = Vec::new();
        let mut weights = Vec::new();

        for entry in entries.iter().map(|e| e.trim()).filter(|e| !e.is_empty()) {
            let (name, weight) = match entry.rsplit_once(':') {
                Some((name, weight)) => match weight.trim().parse::<u32>() {
                    Ok(weight) => (name.trim(), weight),
                    Err(_) => (entry, 1),
                },
                None => (entry, 1),
            };
            if name.is_empty() {
                bail!("Prize entry '{}' has no name", entry);
            }
            names.push(name.to_string());
            weights.push(weight);
        }

        if names.is_empty() {
            bail!("Prize table is empty");
        }

        let weights =
            WeightedIndex::new(&weights).map_err(|e| anyhow!("Invalid prize weights: {}", e))?;
        Ok(Self { names, weights })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

fn default_prizes() -> Vec<String> {
    DEFAULT_PRIZES.split(',').map(str::to_string).collect()
}

impl OutcomeSource<String> for PrizeTable {
    fn determine_outcome(&self) -> String {
        let index = self.weights.sample(&mut rand::thread_rng());
        self.names[index].clone()
    }
}

pub async fn execute(ctx: &Context, args: SpinArgs) -> Result<()> {
    let result = match args.prize {
        Some(prize) => ctx.tracker.attempt_use(prize).await,
        None => {
            let table = if args.prizes.is_empty() {
                PrizeTable::parse(&default_prizes())?
            } else {
                PrizeTable::parse(&args.prizes)?
            };
            log::debug!("Drawing from {} prizes", table.names().len());
            ctx.tracker.attempt_use_with(&table).await
        }
    };

    match result {
        Ok(receipt) => {
            if !ctx.tracker.is_persistent() {
                ctx.out.warn("Storage unavailable: this spin is not saved");
            }
            ctx.out.single(&SpinRow {
                prize: receipt.record.outcome,
                remaining: receipt.remaining,
                at: local_time(receipt.record.timestamp),
            })?;
            ctx.out.success(&format!("{} spins left today", receipt.remaining));
            Ok(())
        }
        Err(QuotaError::QuotaExhausted) => {
            let status = ctx.tracker.status().await;
            bail!(
                "No spins left today. Next reset at {}",
                status.next_reset_at.format("%Y-%m-%d %H:%M")
            )
        }
        Err(QuotaError::AlreadyInProgress) => bail!("A spin is already in progress, try again"),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_default_prizes() {
        let table = PrizeTable::parse(&default_prizes()).unwrap();
        assert_eq!(table.names().len(), 5);
        assert_eq!(table.names()[0], "Better luck next time");
    }

    #[test]
    fn test_parse_without_weights() {
        let table = PrizeTable::parse(&entries(&["Mug", " Hat ", ""])).unwrap();
        assert_eq!(table.names(), &["Mug".to_string(), "Hat".to_string()]);
    }

    #[test]
    fn test_non_numeric_suffix_is_part_of_name() {
        let table = PrizeTable::parse(&entries(&["Ticket: VIP"])).unwrap();
        assert_eq!(table.names(), &["Ticket: VIP".to_string()]);
    }

    #[test]
    fn test_single_weighted_prize_always_drawn() {
        let table = PrizeTable::parse(&entries(&["Nothing:0", "Jackpot:5"])).unwrap();
        for _ in 0..20 {
            assert_eq!(table.determine_outcome(), "Jackpot");
        }
    }

    #[test]
    fn test_invalid_tables() {
        assert!(PrizeTable::parse(&entries(&[])).is_err());
        assert!(PrizeTable::parse(&entries(&["A:0", "B:0"])).is_err());
        assert!(PrizeTable::parse(&entries(&[":3"])).is_err());
    }
}
