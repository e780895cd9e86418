//! Challenge progress engine.
//!
//! Per-challenge, per-user counters with crossing-triggered reward issuance.
//!
//! ## Crossing detection
//!
//! The increment is a single `UPDATE ... RETURNING current`, so the old
//! value is `new - delta` and the crossing test compares old and new — never
//! a re-check of stored state afterwards. Retried advances that have already
//! crossed therefore cannot re-trigger the completion effects; the
//! `completed_at IS NULL` guard arbitrates the one write that counts.
//!
//! ## Clamp policy
//!
//! The stored `current` may exceed the target and is kept that way for
//! audit. Display clamping happens in [`ActiveChallenge`], nowhere else.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use donor_core::types::{
    Challenge, ChallengeProgress, ChallengeStatus, ChallengeType,
};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

use crate::changes::{ChangeHub, Collection};
use crate::errors::{EngineError, Result};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ChallengeRow {
    pub id: String,
    pub kind: String,
    pub target: i64,
    pub reward_points: i64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub status: String,
    pub total_participants: i64,
    pub total_completions: i64,
}

pub fn lift_challenge(row: ChallengeRow) -> Result<Challenge> {
    Ok(Challenge {
        id: row.id,
        kind: ChallengeType::parse(&row.kind)?,
        target: row.target,
        reward_points: row.reward_points,
        window_start: row.window_start,
        window_end: row.window_end,
        status: ChallengeStatus::parse(&row.status)?,
        total_participants: row.total_participants,
        total_completions: row.total_completions,
    })
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ProgressRow {
    challenge_id: String,
    user_id: String,
    current: i64,
    started: bool,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl ProgressRow {
    fn lift(self, referred: BTreeSet<String>) -> ChallengeProgress {
        ChallengeProgress {
            challenge_id: self.challenge_id,
            user_id: self.user_id,
            current: self.current,
            started: self.started,
            started_at: self.started_at,
            completed_at: self.completed_at,
            referred_user_ids: referred,
        }
    }
}

/// Outcome of one `advance` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdvanceOutcome {
    /// Stored (unclamped) progress after the increment.
    pub current: i64,
    /// Whether this call was the crossing event.
    pub crossed: bool,
    /// Reward credited to the user's balance, non-zero only on crossing.
    pub reward_points: i64,
}

/// Advance one user's progress on one challenge by `delta` units.
///
/// The first advance creates the progress row and counts a participant.
/// A crossing (`old < target <= new`) sets `completed_at`, bumps the
/// challenge's completion counter once, and credits the reward to the
/// user's redeemable balance, all in the same transaction.
pub async fn advance(
    pool: &SqlitePool,
    hub: &ChangeHub,
    challenge_id: &str,
    user_id: &str,
    delta: i64,
) -> Result<AdvanceOutcome> {
    if delta < 0 {
        return Err(EngineError::Validation(
            "advance delta must be non-negative".into(),
        ));
    }
    let now = Utc::now();
    let mut tx = pool.begin().await?;

    let challenge = sqlx::query_as::<_, ChallengeRow>("SELECT * FROM challenges WHERE id = ?1")
        .bind(challenge_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(EngineError::NotFound)?;
    let status = ChallengeStatus::parse(&challenge.status)?;
    if status != ChallengeStatus::Active {
        return Err(EngineError::Validation(format!(
            "challenge {} is {}, not active",
            challenge.id,
            status.as_str()
        )));
    }

    if delta == 0 {
        // Guards above still apply; progress is monotone, a zero delta
        // cannot cross, so there is nothing to write.
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT current FROM challenge_progress WHERE challenge_id = ?1 AND user_id = ?2",
        )
        .bind(challenge_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        return Ok(AdvanceOutcome {
            current: row.map(|(v,)| v).unwrap_or(0),
            crossed: false,
            reward_points: 0,
        });
    }

    // First advance inserts the row; INSERT OR IGNORE arbitrates concurrent
    // first advances so the participant counter moves exactly once.
    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO challenge_progress
             (challenge_id, user_id, current, started, started_at)
         VALUES (?1, ?2, ?3, 1, ?4)",
    )
    .bind(challenge_id)
    .bind(user_id)
    .bind(delta)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    let new_current = if inserted == 1 {
        sqlx::query("UPDATE challenges SET total_participants = total_participants + 1 WHERE id = ?1")
            .bind(challenge_id)
            .execute(&mut *tx)
            .await?;
        delta
    } else {
        let (current,): (i64,) = sqlx::query_as(
            "UPDATE challenge_progress SET current = current + ?1
             WHERE challenge_id = ?2 AND user_id = ?3
             RETURNING current",
        )
        .bind(delta)
        .bind(challenge_id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
        current
    };
    let old_current = new_current - delta;

    let mut crossed = false;
    let mut reward = 0;
    if old_current < challenge.target && new_current >= challenge.target {
        // Crossing event. The NULL guard makes the completion effects fire
        // at most once even if two advances race across the target.
        let marked = sqlx::query(
            "UPDATE challenge_progress SET completed_at = ?1
             WHERE challenge_id = ?2 AND user_id = ?3 AND completed_at IS NULL",
        )
        .bind(now)
        .bind(challenge_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if marked == 1 {
            crossed = true;
            reward = challenge.reward_points;
            sqlx::query(
                "UPDATE challenges SET total_completions = total_completions + 1 WHERE id = ?1",
            )
            .bind(challenge_id)
            .execute(&mut *tx)
            .await?;
            sqlx::query(
                "UPDATE users SET total_points = total_points + ?1,
                                  challenges_completed = challenges_completed + 1
                 WHERE id = ?2",
            )
            .bind(reward)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;

    hub.publish(Collection::Challenges, challenge_id, Some(user_id));
    if crossed {
        hub.publish(Collection::Users, user_id, Some(user_id));
        info!(
            "Challenge {challenge_id} completed by {user_id} at {new_current}/{} (+{reward} points)",
            challenge.target
        );
    }

    Ok(AdvanceOutcome {
        current: new_current,
        crossed,
        reward_points: reward,
    })
}

/// Credit a referral: a new user signed up naming `referrer_id`.
///
/// Deduplicates on the referred user, so repeated signup events for the same
/// person advance the referrer at most once per challenge.
pub async fn record_referral(
    pool: &SqlitePool,
    hub: &ChangeHub,
    challenge_id: &str,
    referrer_id: &str,
    new_user_id: &str,
) -> Result<AdvanceOutcome> {
    let row = sqlx::query_as::<_, ChallengeRow>("SELECT * FROM challenges WHERE id = ?1")
        .bind(challenge_id)
        .fetch_optional(pool)
        .await?
        .ok_or(EngineError::NotFound)?;
    if ChallengeType::parse(&row.kind)? != ChallengeType::Referral {
        return Err(EngineError::Validation(format!(
            "challenge {} is not a referral challenge",
            row.id
        )));
    }

    let credited = sqlx::query(
        "INSERT OR IGNORE INTO referral_credits (challenge_id, user_id, referred_user_id)
         VALUES (?1, ?2, ?3)",
    )
    .bind(challenge_id)
    .bind(referrer_id)
    .bind(new_user_id)
    .execute(pool)
    .await?
    .rows_affected();

    if credited == 0 {
        // Already counted; report current progress without advancing.
        let current = current_progress(pool, challenge_id, referrer_id).await?;
        return Ok(AdvanceOutcome {
            current,
            crossed: false,
            reward_points: 0,
        });
    }

    advance(pool, hub, challenge_id, referrer_id, 1).await
}

async fn current_progress(pool: &SqlitePool, challenge_id: &str, user_id: &str) -> Result<i64> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT current FROM challenge_progress WHERE challenge_id = ?1 AND user_id = ?2",
    )
    .bind(challenge_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(v,)| v).unwrap_or(0))
}

// ─────────────────────────────────────────────────────────
// Reads
// ─────────────────────────────────────────────────────────

/// An active challenge joined with one user's progress, shaped for the UI.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveChallenge {
    pub challenge: Challenge,
    pub progress: Option<ChallengeProgress>,
    /// Progress clamped at the target for display.
    pub display_current: i64,
}

/// All currently-active challenges with the caller's progress attached.
pub async fn get_active_challenges(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<ActiveChallenge>> {
    let rows = sqlx::query_as::<_, ChallengeRow>(
        "SELECT * FROM challenges WHERE status = 'active' ORDER BY window_end ASC, id ASC",
    )
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let challenge = lift_challenge(row)?;
        let progress = fetch_progress(pool, &challenge.id, user_id).await?;
        let display_current = progress
            .as_ref()
            .map(|p| p.display_current(challenge.target))
            .unwrap_or(0);
        out.push(ActiveChallenge {
            challenge,
            progress,
            display_current,
        });
    }
    Ok(out)
}

/// One user's progress row for one challenge, with the referral dedupe set.
pub async fn fetch_progress(
    pool: &SqlitePool,
    challenge_id: &str,
    user_id: &str,
) -> Result<Option<ChallengeProgress>> {
    let row = sqlx::query_as::<_, ProgressRow>(
        "SELECT challenge_id, user_id, current, started, started_at, completed_at
         FROM challenge_progress WHERE challenge_id = ?1 AND user_id = ?2",
    )
    .bind(challenge_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    let Some(row) = row else {
        return Ok(None);
    };

    let referred: Vec<(String,)> = sqlx::query_as(
        "SELECT referred_user_id FROM referral_credits
         WHERE challenge_id = ?1 AND user_id = ?2",
    )
    .bind(challenge_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(Some(
        row.lift(referred.into_iter().map(|(id,)| id).collect()),
    ))
}
