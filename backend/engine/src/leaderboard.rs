//! Leaderboard — a ranked view over challenge progress.
//!
//! Recomputed from stored progress rows on every call; no mutable rank
//! field exists anywhere, so the ranking is consistent after any write.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::errors::Result;

/// One ranked row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based rank, assigned in order.
    pub rank: usize,
    pub user_id: String,
    pub current: i64,
    pub started_at: Option<DateTime<Utc>>,
}

/// The top `k` participants of one challenge, best first.
///
/// Ordering: progress descending, then earlier starter first, then user id
/// for a fully deterministic tie-break.
pub async fn top_n(
    pool: &SqlitePool,
    challenge_id: &str,
    k: usize,
) -> Result<Vec<LeaderboardEntry>> {
    let rows: Vec<(String, i64, Option<DateTime<Utc>>)> = sqlx::query_as(
        "SELECT user_id, current, started_at
         FROM challenge_progress
         WHERE challenge_id = ?1
         ORDER BY current DESC, started_at ASC, user_id ASC
         LIMIT ?2",
    )
    .bind(challenge_id)
    .bind(k as i64)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(i, (user_id, current, started_at))| LeaderboardEntry {
            rank: i + 1,
            user_id,
            current,
            started_at,
        })
        .collect())
}
