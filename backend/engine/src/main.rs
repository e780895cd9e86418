//! Donor Engagement Engine — entry point.
//!
//! Runs the challenge window sweeper as a background task and exposes the
//! donation pipeline (completion, challenges, leaderboard, vouchers,
//! history) as a small Axum REST API for the UI layer.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use engine::api::{self, ApiState};
use engine::changes::ChangeHub;
use engine::config::Config;
use engine::{db, sweeper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    // Load config from environment.
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    // Change fan-out shared by the services and the feed subscriptions.
    let hub = ChangeHub::new();

    // ─── Background sweeper ───────────────────────────────
    tokio::spawn(sweeper::run(
        pool.clone(),
        hub.clone(),
        config.sweep_interval_secs,
    ));

    // ─── REST API ─────────────────────────────────────────
    let api_state = Arc::new(ApiState {
        pool,
        hub,
        config: config.clone(),
    });

    let app = Router::new()
        .route("/health", get(api::health))
        .route("/donations/:id/complete", post(api::complete_donation))
        .route("/donations/:id/undo", post(api::undo_completion))
        .route("/users/:id", get(api::get_user_account))
        .route("/users/:id/challenges", get(api::get_active_challenges))
        .route("/users/:id/history", get(api::get_user_history))
        .route("/challenges/:id/leaderboard", get(api::get_leaderboard))
        .route("/rewards/redeem", post(api::redeem_reward))
        .route("/vouchers/:id/consume", post(api::consume_voucher))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(api_state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
