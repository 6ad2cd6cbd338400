//! Manual refill and history cleanup

use anyhow::Result;

use super::status::show_status;
use super::Context;

pub async fn refill(ctx: &Context, allowance: Option<u32>) -> Result<()> {
    let remaining = match allowance {
        Some(n) => ctx.tracker.reset_quota(n).await,
        None => ctx.tracker.reset_quota_default().await,
    };

    ctx.out.success(&format!("Quota refilled to {} spins", remaining));
    show_status(ctx).await
}

pub async fn clear_history(ctx: &Context) -> Result<()> {
    let cleared = ctx.tracker.clear_history().await;
    ctx.out.success(&format!("Cleared {} history records", cleared));
    show_status(ctx).await
}
