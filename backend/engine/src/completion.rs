//! Completion workflow.
//!
//! Orchestrates a donation event's `pending -> completed` transition:
//! authorize, idempotency-check, score, persist atomically, fan out to the
//! challenge engine, conditionally fulfil the related emergency.
//!
//! ## Failure semantics
//!
//! The guards fail fast with no partial writes. The status flip, award, and
//! emergency bump commit in one transaction; after that commit the event is
//! completed no matter what else happens. Challenge fan-out is best effort:
//! a failed `advance` is logged and retried on a background task, and never
//! rolls the completion back.

use chrono::Utc;
use donor_core::predicates::eligibility;
use donor_core::scoring::{score, Score, ScoreInput};
use donor_core::types::{ChallengeType, DonationStatus};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

use crate::challenges::{self, ChallengeRow};
use crate::changes::{ChangeHub, Collection};
use crate::config::Config;
use crate::db;
use crate::errors::{EngineError, Result};

/// Result of a successful completion, returned to the UI layer.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionReceipt {
    pub event_id: String,
    pub points_awarded: i64,
    pub points_breakdown: BTreeMap<String, i64>,
}

/// Complete a donation event and award impact points exactly once.
pub async fn complete(
    pool: &SqlitePool,
    hub: &ChangeHub,
    config: &Config,
    event_id: &str,
    requester_id: &str,
) -> Result<CompletionReceipt> {
    // Guards: load, authorize, idempotency.
    let row = db::fetch_event(pool, event_id)
        .await?
        .ok_or(EngineError::NotFound)?;
    if row.user_id != requester_id {
        return Err(EngineError::Unauthorized);
    }
    match DonationStatus::parse(&row.status)? {
        DonationStatus::Pending => {}
        DonationStatus::Completed => return Err(EngineError::AlreadyCompleted),
        DonationStatus::Cancelled => {
            return Err(EngineError::Validation(
                "cancelled events cannot be completed".into(),
            ))
        }
    }

    let event = db::lift_event(row)?;

    let now = Utc::now();
    let mut tx = pool.begin().await?;

    // The status flip re-checks `pending` in the same statement as the
    // write, so a concurrent completion loses the swap instead of awarding
    // twice.
    let flipped = sqlx::query(
        "UPDATE donation_events
         SET status = 'completed', completed_at = ?1
         WHERE id = ?2 AND status = 'pending'",
    )
    .bind(now)
    .bind(event_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();
    if flipped == 0 {
        return Err(EngineError::Conflict);
    }

    // Read the donation count after the flip: the write above holds the
    // database's write lock, so concurrent completions by the same user
    // serialize here and the first-donation bonus lands exactly once.
    let account: Option<(i64,)> =
        sqlx::query_as("SELECT total_donations FROM users WHERE id = ?1")
            .bind(requester_id)
            .fetch_optional(&mut *tx)
            .await?;
    let (total_donations,) = account.ok_or(EngineError::NotFound)?;
    let input = ScoreInput::from_details(&event.details, total_donations == 0);
    let Score { total, breakdown } = score(&input);
    let breakdown_json = serde_json::to_string(&breakdown)
        .map_err(|e| EngineError::Validation(format!("breakdown serialization: {e}")))?;

    sqlx::query(
        "UPDATE donation_events SET points_awarded = ?1, points_breakdown = ?2 WHERE id = ?3",
    )
    .bind(total)
    .bind(&breakdown_json)
    .bind(event_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE users SET total_donations = total_donations + 1,
                          impact_points = impact_points + ?1
         WHERE id = ?2",
    )
    .bind(total)
    .bind(requester_id)
    .execute(&mut *tx)
    .await?;

    // Emergency bookkeeping rides in the same transaction: count the
    // responder, fulfil when enough have completed, otherwise just touch
    // updated_at.
    let mut fulfilled_emergency = None;
    if let Some(emergency_id) = emergency_id_of(&event.details) {
        sqlx::query(
            "UPDATE emergencies SET responders_count = responders_count + 1, updated_at = ?1
             WHERE id = ?2",
        )
        .bind(now)
        .bind(emergency_id)
        .execute(&mut *tx)
        .await?;
        let closed = sqlx::query(
            "UPDATE emergencies SET status = 'fulfilled'
             WHERE id = ?1 AND status = 'open' AND responders_count >= units_needed",
        )
        .bind(emergency_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if closed == 1 {
            fulfilled_emergency = Some(emergency_id.to_string());
        }
    }

    tx.commit().await?;

    hub.publish(Collection::DonationEvents, event_id, Some(requester_id));
    hub.publish(Collection::Users, requester_id, Some(requester_id));
    if let Some(emergency_id) = emergency_id_of(&event.details) {
        hub.publish(Collection::Emergencies, emergency_id, None);
    }
    if let Some(id) = fulfilled_emergency {
        info!("Emergency {id} fulfilled");
    }
    info!("Event {event_id} completed by {requester_id}: +{total} impact points");

    fan_out(pool, hub, config, requester_id, &input).await;

    Ok(CompletionReceipt {
        event_id: event_id.to_string(),
        points_awarded: total,
        points_breakdown: breakdown,
    })
}

fn emergency_id_of(details: &donor_core::types::DonationDetails) -> Option<&str> {
    match details {
        donor_core::types::DonationDetails::EmergencyResponse { emergency_id, .. } => {
            Some(emergency_id)
        }
        _ => None,
    }
}

/// Advance every active challenge whose predicate matches the completed
/// event. Failures never propagate to the caller: each failed advance is
/// retried on a detached task with bounded attempts.
async fn fan_out(
    pool: &SqlitePool,
    hub: &ChangeHub,
    config: &Config,
    user_id: &str,
    input: &ScoreInput,
) {
    let rows = match sqlx::query_as::<_, ChallengeRow>(
        "SELECT * FROM challenges WHERE status = 'active'",
    )
    .fetch_all(pool)
    .await
    {
        Ok(rows) => rows,
        Err(e) => {
            // Completion is already committed; losing this round of fan-out
            // is the documented best-effort trade.
            warn!("Could not list active challenges for fan-out: {e}");
            return;
        }
    };

    for row in rows {
        let Ok(kind) = ChallengeType::parse(&row.kind) else {
            warn!("Skipping challenge {} with unknown kind {}", row.id, row.kind);
            continue;
        };
        if !eligibility(kind)(input) {
            continue;
        }
        if let Err(e) = challenges::advance(pool, hub, &row.id, user_id, 1).await {
            warn!("Challenge fan-out to {} failed, scheduling retry: {e}", row.id);
            spawn_fanout_retry(
                pool.clone(),
                hub.clone(),
                row.id,
                user_id.to_string(),
                config.fanout_retry_attempts,
            );
        }
    }
}

/// Retry one failed advance in the background with doubling backoff.
///
/// Completion has already committed by the time this runs; retries only
/// chase the best-effort challenge progress.
fn spawn_fanout_retry(
    pool: SqlitePool,
    hub: ChangeHub,
    challenge_id: String,
    user_id: String,
    attempts: u32,
) {
    tokio::spawn(async move {
        let mut delay = Duration::from_millis(200);
        for attempt in 1..=attempts {
            tokio::time::sleep(delay).await;
            match challenges::advance(&pool, &hub, &challenge_id, &user_id, 1).await {
                Ok(_) => return,
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!("Fan-out retry {attempt} for {challenge_id} failed: {e}");
                    delay *= 2;
                }
                Err(e) => {
                    warn!("Giving up fan-out to {challenge_id} for {user_id}: {e}");
                    return;
                }
            }
        }
    });
}

/// Revert a completed event to pending and claw back its award.
///
/// Permitted only by the owner and only while the event is completed.
/// Challenge progress already advanced by the completion stays advanced;
/// progress is a one-way ratchet.
pub async fn undo(
    pool: &SqlitePool,
    hub: &ChangeHub,
    event_id: &str,
    requester_id: &str,
) -> Result<()> {
    let row = db::fetch_event(pool, event_id)
        .await?
        .ok_or(EngineError::NotFound)?;
    if row.user_id != requester_id {
        return Err(EngineError::Unauthorized);
    }
    if DonationStatus::parse(&row.status)? != DonationStatus::Completed {
        return Err(EngineError::Validation(
            "only completed events can be undone".into(),
        ));
    }
    let awarded = row.points_awarded.unwrap_or(0);

    let mut tx = pool.begin().await?;
    let reverted = sqlx::query(
        "UPDATE donation_events
         SET status = 'pending', completed_at = NULL,
             points_awarded = NULL, points_breakdown = NULL
         WHERE id = ?1 AND status = 'completed'",
    )
    .bind(event_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();
    if reverted == 0 {
        return Err(EngineError::Conflict);
    }

    sqlx::query(
        "UPDATE users SET total_donations = total_donations - 1,
                          impact_points = impact_points - ?1
         WHERE id = ?2",
    )
    .bind(awarded)
    .bind(requester_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    hub.publish(Collection::DonationEvents, event_id, Some(requester_id));
    hub.publish(Collection::Users, requester_id, Some(requester_id));
    info!("Event {event_id} completion undone by {requester_id} (-{awarded} points)");
    Ok(())
}
