//! Shared fixtures for the integration suites.

#![allow(dead_code)]

use chrono::{Duration, Utc};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

/// In-memory database with migrations applied.
///
/// A single pooled connection keeps the in-memory database alive and shared
/// across every query in a test; operations from concurrent tasks serialize
/// on acquire, which is exactly the document-store model under test.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("run migrations");
    pool
}

pub async fn seed_user(pool: &SqlitePool, user_id: &str, total_points: i64) {
    sqlx::query("INSERT INTO users (id, total_points) VALUES (?1, ?2)")
        .bind(user_id)
        .bind(total_points)
        .execute(pool)
        .await
        .expect("seed user");
}

pub async fn seed_appointment(pool: &SqlitePool, event_id: &str, user_id: &str) {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO donation_events (id, user_id, kind, status, blood_type, created_at, scheduled_at)
         VALUES (?1, ?2, 'appointment', 'pending', 'O+', ?3, ?4)",
    )
    .bind(event_id)
    .bind(user_id)
    .bind(now)
    .bind(now + Duration::days(1))
    .execute(pool)
    .await
    .expect("seed appointment");
}

#[allow(clippy::too_many_arguments)]
pub async fn seed_emergency_response(
    pool: &SqlitePool,
    event_id: &str,
    user_id: &str,
    emergency_id: &str,
    urgency: &str,
    blood_type: &str,
    distance_km: f64,
    response_time_minutes: i64,
) {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO donation_events
             (id, user_id, kind, status, blood_type, emergency_id, urgency,
              distance_km, response_time_minutes, created_at, scheduled_at)
         VALUES (?1, ?2, 'emergency_response', 'pending', ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
    )
    .bind(event_id)
    .bind(user_id)
    .bind(blood_type)
    .bind(emergency_id)
    .bind(urgency)
    .bind(distance_km)
    .bind(response_time_minutes)
    .bind(now)
    .execute(pool)
    .await
    .expect("seed emergency response");
}

pub async fn seed_emergency(pool: &SqlitePool, emergency_id: &str, units_needed: i64) {
    sqlx::query(
        "INSERT INTO emergencies (id, blood_type, units_needed, updated_at)
         VALUES (?1, 'O-', ?2, ?3)",
    )
    .bind(emergency_id)
    .bind(units_needed)
    .bind(Utc::now())
    .execute(pool)
    .await
    .expect("seed emergency");
}

pub async fn seed_active_challenge(
    pool: &SqlitePool,
    challenge_id: &str,
    kind: &str,
    target: i64,
    reward_points: i64,
) {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO challenges (id, kind, target, reward_points, window_start, window_end, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'active')",
    )
    .bind(challenge_id)
    .bind(kind)
    .bind(target)
    .bind(reward_points)
    .bind(now - Duration::days(1))
    .bind(now + Duration::days(7))
    .execute(pool)
    .await
    .expect("seed challenge");
}

pub async fn fetch_user_totals(pool: &SqlitePool, user_id: &str) -> (i64, i64, i64, i64) {
    sqlx::query_as(
        "SELECT total_donations, impact_points, total_points, challenges_completed
         FROM users WHERE id = ?1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("fetch user totals")
}

pub async fn fetch_challenge_counters(pool: &SqlitePool, challenge_id: &str) -> (i64, i64) {
    sqlx::query_as(
        "SELECT total_participants, total_completions FROM challenges WHERE id = ?1",
    )
    .bind(challenge_id)
    .fetch_one(pool)
    .await
    .expect("fetch challenge counters")
}

/// Default config for tests; never read from the environment.
pub fn test_config() -> engine::config::Config {
    engine::config::Config {
        database_url: "sqlite::memory:".to_string(),
        api_port: 0,
        sweep_interval_secs: 60,
        max_feed_results: 50,
        voucher_ttl_days: 90,
        fanout_retry_attempts: 3,
    }
}
