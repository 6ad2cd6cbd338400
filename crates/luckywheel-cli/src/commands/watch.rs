//! Watch command
//!
//! Keeps the process alive with the periodic reset check running, so a
//! midnight rollover is applied without any spin happening.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use luckywheel_core::{spawn_reset_checker, ResetCheckConfig};
use serde::Serialize;
use tabled::Tabled;

use super::Context;

#[derive(Args)]
pub struct WatchArgs {
    /// Seconds between reset checks
    #[arg(short, long, env = "LUCKYWHEEL_CHECK_INTERVAL", default_value = "60")]
    pub interval: u64,

    /// Stop after this many seconds instead of waiting for Ctrl+C
    #[arg(long)]
    pub for_secs: Option<u64>,
}

/// Summary printed when watching stops
#[derive(Debug, Serialize, Tabled)]
pub struct WatchRow {
    #[tabled(rename = "Checks")]
    pub checks_run: u64,
    #[tabled(rename = "Resets")]
    pub resets_applied: u64,
    #[tabled(rename = "Last Check")]
    pub last_check_at: String,
    #[tabled(rename = "Spins Left")]
    pub remaining: u32,
}

pub async fn execute(ctx: &Context, args: WatchArgs) -> Result<()> {
    let config = ResetCheckConfig::with_interval(args.interval);
    let handle = spawn_reset_checker(Arc::clone(&ctx.tracker), config);
    let interval = handle.config().interval_secs;

    ctx.out.info(&format!(
        "Watching for daily reset every {}s (Ctrl+C to stop)",
        interval
    ));

    let deadline = async {
        match args.for_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = deadline => {
            log::debug!("Watch duration elapsed");
        }
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => log::info!("Received Ctrl+C, stopping"),
                Err(e) => log::warn!("Failed to listen for Ctrl+C: {}", e),
            }
        }
    }

    let status = handle.status().await;
    handle.shutdown().await;

    ctx.out.single(&WatchRow {
        checks_run: status.checks_run,
        resets_applied: status.resets_applied,
        last_check_at: status.last_check_at.unwrap_or_else(|| "-".to_string()),
        remaining: ctx.tracker.remaining().await,
    })
}
