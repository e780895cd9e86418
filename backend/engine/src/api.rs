//! Axum REST API handlers.
//!
//! Thin pass-through to the service modules: handlers parse the request,
//! call the operation (retry-wrapped where concurrency conflicts are
//! expected), and map [`EngineError`] kinds onto status codes. No rendering
//! and no error prose beyond the kind and message.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::changes::ChangeHub;
use crate::completion;
use crate::config::Config;
use crate::db;
use crate::errors::EngineError;
use crate::{challenges, feed, leaderboard, vouchers};

#[derive(Clone)]
pub struct ApiState {
    pub pool: SqlitePool,
    pub hub: ChangeHub,
    pub config: Config,
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RequesterBody {
    pub requester_id: String,
}

#[derive(Deserialize)]
pub struct RedeemBody {
    pub requester_id: String,
    pub reward_id: String,
    pub point_cost: i64,
}

#[derive(Deserialize)]
pub struct ConsumeBody {
    pub requester_id: String,
    pub purpose: String,
}

#[derive(Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default = "default_k")]
    pub k: usize,
}

fn default_k() -> usize {
    10
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub kind: &'static str,
    pub error: String,
}

fn error_response(e: &EngineError) -> (StatusCode, Json<ErrorResponse>) {
    let (status, kind) = match e {
        EngineError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
        EngineError::Unauthorized => (StatusCode::FORBIDDEN, "unauthorized"),
        EngineError::AlreadyCompleted => (StatusCode::CONFLICT, "already_completed"),
        EngineError::AlreadyUsed => (StatusCode::CONFLICT, "already_used"),
        EngineError::Expired => (StatusCode::GONE, "expired"),
        EngineError::InsufficientPoints => (StatusCode::PAYMENT_REQUIRED, "insufficient_points"),
        EngineError::Validation(_) | EngineError::Domain(_) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "validation")
        }
        EngineError::Conflict => (StatusCode::CONFLICT, "conflict"),
        EngineError::Database(_) | EngineError::Migrate(_) | EngineError::Config(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal")
        }
    };
    (
        status,
        Json(ErrorResponse {
            kind,
            error: e.to_string(),
        }),
    )
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /donations/{id}/complete`
pub async fn complete_donation(
    State(state): State<Arc<ApiState>>,
    Path(event_id): Path<String>,
    Json(body): Json<RequesterBody>,
) -> impl IntoResponse {
    let result = db::with_retry("complete_donation", || {
        completion::complete(
            &state.pool,
            &state.hub,
            &state.config,
            &event_id,
            &body.requester_id,
        )
    })
    .await;
    match result {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// `POST /donations/{id}/undo`
pub async fn undo_completion(
    State(state): State<Arc<ApiState>>,
    Path(event_id): Path<String>,
    Json(body): Json<RequesterBody>,
) -> impl IntoResponse {
    let result = db::with_retry("undo_completion", || {
        completion::undo(&state.pool, &state.hub, &event_id, &body.requester_id)
    })
    .await;
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// `GET /users/{id}`
pub async fn get_user_account(
    State(state): State<Arc<ApiState>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match db::fetch_user(&state.pool, &user_id).await {
        Ok(Some(account)) => (StatusCode::OK, Json(account)).into_response(),
        Ok(None) => error_response(&EngineError::NotFound).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// `GET /users/{id}/challenges`
pub async fn get_active_challenges(
    State(state): State<Arc<ApiState>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match challenges::get_active_challenges(&state.pool, &user_id).await {
        Ok(list) => (StatusCode::OK, Json(list)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// `GET /challenges/{id}/leaderboard?k=10`
pub async fn get_leaderboard(
    State(state): State<Arc<ApiState>>,
    Path(challenge_id): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> impl IntoResponse {
    match leaderboard::top_n(&state.pool, &challenge_id, query.k).await {
        Ok(entries) => (StatusCode::OK, Json(entries)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// `POST /rewards/redeem`
pub async fn redeem_reward(
    State(state): State<Arc<ApiState>>,
    Json(body): Json<RedeemBody>,
) -> impl IntoResponse {
    let expires_at = if state.config.voucher_ttl_days > 0 {
        Some(Utc::now() + Duration::days(state.config.voucher_ttl_days))
    } else {
        None
    };
    let result = db::with_retry("redeem_reward", || {
        vouchers::redeem(
            &state.pool,
            &state.hub,
            &body.requester_id,
            &body.reward_id,
            body.point_cost,
            expires_at,
        )
    })
    .await;
    match result {
        Ok(voucher) => (StatusCode::CREATED, Json(voucher)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// `POST /vouchers/{id}/consume`
pub async fn consume_voucher(
    State(state): State<Arc<ApiState>>,
    Path(voucher_id): Path<String>,
    Json(body): Json<ConsumeBody>,
) -> impl IntoResponse {
    let result = vouchers::consume(
        &state.pool,
        &state.hub,
        &voucher_id,
        &body.requester_id,
        &body.purpose,
    )
    .await;
    match result {
        Ok(voucher) => (StatusCode::OK, Json(voucher)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// `GET /users/{id}/history?limit=50`
///
/// One-shot merged feed; live consumers use the in-process
/// [`feed::subscribe_user_history`] instead.
pub async fn get_user_history(
    State(state): State<Arc<ApiState>>,
    Path(user_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let limit = query
        .limit
        .unwrap_or(state.config.max_feed_results)
        .min(state.config.max_feed_results);
    match feed::current_history(&state.pool, &user_id, limit).await {
        Ok(events) => (StatusCode::OK, Json(events)).into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}
