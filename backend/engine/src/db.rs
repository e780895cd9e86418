//! Database layer — pool setup, migrations, row types, and shared queries.
//!
//! Service modules own their mutation SQL; this module holds the plumbing
//! they share: the pool, the flat row shapes as stored, the lift into the
//! typed domain model, and the bounded retry wrapper for transient store
//! errors and optimistic-concurrency conflicts.

use std::time::Duration;

use chrono::{DateTime, Utc};
use donor_core::types::{
    DonationDetails, DonationEvent, DonationStatus, Emergency, EmergencyStatus, UserPointsAccount,
};
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::{info, warn};

use crate::errors::Result;

const RETRY_ATTEMPTS: u32 = 3;
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

/// Run `op` up to three times, backing off between attempts.
///
/// Only errors flagged retryable (transient store failures and
/// compare-and-swap conflicts) are retried; guard failures propagate on the
/// first attempt. The whole operation is re-executed, not just the final
/// write, so a conflicted caller re-reads before re-deciding.
pub async fn with_retry<T, F, Fut>(op_name: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < RETRY_ATTEMPTS => {
                warn!("{op_name} attempt {attempt} failed (will retry): {e}");
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

// ─────────────────────────────────────────────────────────
// Row shapes
// ─────────────────────────────────────────────────────────

/// A donation event exactly as stored: one flat row, kind-specific columns
/// nullable. [`lift_event`] turns it into the typed [`DonationEvent`].
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DonationEventRow {
    pub id: String,
    pub user_id: String,
    pub kind: String,
    pub status: String,
    pub blood_type: Option<String>,
    pub drive_id: Option<String>,
    pub emergency_id: Option<String>,
    pub urgency: Option<String>,
    pub distance_km: Option<f64>,
    pub response_time_minutes: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub points_awarded: Option<i64>,
    pub points_breakdown: Option<String>,
}

/// Lift a flat row into the tagged domain model, surfacing malformed rows
/// as validation errors instead of panics.
pub fn lift_event(row: DonationEventRow) -> Result<DonationEvent> {
    let details = DonationDetails::from_parts(
        &row.kind,
        row.blood_type,
        row.drive_id,
        row.emergency_id,
        row.urgency,
        row.distance_km,
        row.response_time_minutes,
    )?;
    let points_breakdown = match row.points_breakdown {
        Some(raw) => Some(
            serde_json::from_str(&raw)
                .map_err(|e| crate::EngineError::Validation(format!("bad breakdown json: {e}")))?,
        ),
        None => None,
    };
    Ok(DonationEvent {
        id: row.id,
        user_id: row.user_id,
        details,
        status: DonationStatus::parse(&row.status)?,
        created_at: row.created_at,
        scheduled_at: row.scheduled_at,
        completed_at: row.completed_at,
        points_awarded: row.points_awarded,
        points_breakdown,
    })
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct UserRow {
    id: String,
    total_donations: i64,
    impact_points: i64,
    total_points: i64,
    challenges_completed: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct EmergencyRow {
    id: String,
    blood_type: String,
    units_needed: i64,
    responders_count: i64,
    status: String,
    updated_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────
// Shared reads
// ─────────────────────────────────────────────────────────

/// Fetch one donation event row, if present.
pub async fn fetch_event(pool: &SqlitePool, event_id: &str) -> Result<Option<DonationEventRow>> {
    let row = sqlx::query_as::<_, DonationEventRow>(
        "SELECT * FROM donation_events WHERE id = ?1",
    )
    .bind(event_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Fetch a user's points account, if the user exists.
pub async fn fetch_user(pool: &SqlitePool, user_id: &str) -> Result<Option<UserPointsAccount>> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, total_donations, impact_points, total_points, challenges_completed
         FROM users WHERE id = ?1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| UserPointsAccount {
        user_id: r.id,
        total_donations: r.total_donations,
        impact_points: r.impact_points,
        total_points: r.total_points,
        challenges_completed: r.challenges_completed,
    }))
}

/// Fetch an emergency record, if present.
pub async fn fetch_emergency(pool: &SqlitePool, emergency_id: &str) -> Result<Option<Emergency>> {
    let row = sqlx::query_as::<_, EmergencyRow>(
        "SELECT id, blood_type, units_needed, responders_count, status, updated_at
         FROM emergencies WHERE id = ?1",
    )
    .bind(emergency_id)
    .fetch_optional(pool)
    .await?;
    row.map(|r| {
        Ok(Emergency {
            id: r.id,
            blood_type: r.blood_type,
            units_needed: r.units_needed,
            responders_count: r.responders_count,
            status: EmergencyStatus::parse(&r.status)?,
            updated_at: r.updated_at,
        })
    })
    .transpose()
}

/// Fetch one user's events for a set of kinds, newest first, capped.
pub async fn events_for_kinds(
    pool: &SqlitePool,
    user_id: &str,
    kinds: &[&str],
    limit: usize,
) -> Result<Vec<DonationEvent>> {
    // Kind lists are static partition definitions, never user input.
    let placeholders = (0..kinds.len())
        .map(|i| format!("?{}", i + 2))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT * FROM donation_events
         WHERE user_id = ?1 AND kind IN ({placeholders})
         ORDER BY created_at DESC, id ASC
         LIMIT {limit}"
    );
    let mut query = sqlx::query_as::<_, DonationEventRow>(&sql).bind(user_id);
    for kind in kinds {
        query = query.bind(*kind);
    }
    let rows = query.fetch_all(pool).await?;
    rows.into_iter().map(lift_event).collect()
}
