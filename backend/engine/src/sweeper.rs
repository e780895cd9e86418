//! Long-running background task that re-derives challenge statuses from
//! their time windows.
//!
//! Transitions applied on each pass:
//!
//! * `upcoming -> active` once the window has opened;
//! * `active -> completed` at window close when anyone finished;
//! * `active -> expired` at window close otherwise.
//!
//! `completed` and `expired` are terminal; the sweeper never touches them.

use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::changes::{ChangeHub, Collection};
use crate::errors::Result;

/// Spawn-friendly sweep loop; runs until the process exits.
pub async fn run(pool: SqlitePool, hub: ChangeHub, interval_secs: u64) {
    info!("Challenge window sweeper starting (every {interval_secs}s)");
    loop {
        if let Err(e) = sweep_once(&pool, &hub).await {
            error!("Challenge sweep failed: {e}");
        }
        tokio::time::sleep(Duration::from_secs(interval_secs)).await;
    }
}

/// Apply one round of window transitions. Returns how many rows changed.
pub async fn sweep_once(pool: &SqlitePool, hub: &ChangeHub) -> Result<u64> {
    let now = Utc::now();

    let opened = sqlx::query(
        "UPDATE challenges SET status = 'active'
         WHERE status = 'upcoming' AND window_start <= ?1",
    )
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    let completed = sqlx::query(
        "UPDATE challenges SET status = 'completed'
         WHERE status = 'active' AND window_end <= ?1 AND total_completions > 0",
    )
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    let expired = sqlx::query(
        "UPDATE challenges SET status = 'expired'
         WHERE status = 'active' AND window_end <= ?1",
    )
    .bind(now)
    .execute(pool)
    .await?
    .rows_affected();

    let changed = opened + completed + expired;
    if changed > 0 {
        hub.publish(Collection::Challenges, "window-sweep", None);
        info!("Sweep: {opened} opened, {completed} completed, {expired} expired");
    }
    Ok(changed)
}
