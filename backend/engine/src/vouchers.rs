//! Reward voucher ledger.
//!
//! Points-for-reward exchange with single-use consumption.
//!
//! Both mutations are compare-and-swap updates: the debit checks the balance
//! in the same statement that subtracts it, and consumption checks
//! `status = 'active'` in the same statement that writes `status = 'used'`.
//! Two concurrent consumes of one voucher therefore end as exactly one
//! success and one `AlreadyUsed`.

use chrono::{DateTime, Utc};
use donor_core::types::{RewardVoucher, VoucherStatus};
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::changes::{ChangeHub, Collection};
use crate::errors::{EngineError, Result};

#[derive(Debug, Clone, sqlx::FromRow)]
struct VoucherRow {
    id: String,
    user_id: String,
    reward_id: String,
    code: String,
    status: String,
    issued_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    used_at: Option<DateTime<Utc>>,
    used_for: Option<String>,
}

impl VoucherRow {
    fn lift(self) -> Result<RewardVoucher> {
        Ok(RewardVoucher {
            id: self.id,
            user_id: self.user_id,
            reward_id: self.reward_id,
            code: self.code,
            status: VoucherStatus::parse(&self.status)?,
            issued_at: self.issued_at,
            expires_at: self.expires_at,
            used_at: self.used_at,
            used_for: self.used_for,
        })
    }
}

/// Exchange points for a reward voucher.
///
/// The debit is one conditional update; a balance below `point_cost` leaves
/// zero rows affected and nothing written.
pub async fn redeem(
    pool: &SqlitePool,
    hub: &ChangeHub,
    user_id: &str,
    reward_id: &str,
    point_cost: i64,
    expires_at: Option<DateTime<Utc>>,
) -> Result<RewardVoucher> {
    if point_cost < 0 {
        return Err(EngineError::Validation("point cost must be non-negative".into()));
    }

    let mut tx = pool.begin().await?;

    let debited = sqlx::query(
        "UPDATE users SET total_points = total_points - ?1
         WHERE id = ?2 AND total_points >= ?1",
    )
    .bind(point_cost)
    .bind(user_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();
    if debited == 0 {
        // Classify on the same connection; the transaction rolls back on
        // return.
        let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM users WHERE id = ?1")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        return match exists {
            Some(_) => Err(EngineError::InsufficientPoints),
            None => Err(EngineError::NotFound),
        };
    }

    let voucher = RewardVoucher {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        reward_id: reward_id.to_string(),
        code: generate_code(),
        status: VoucherStatus::Active,
        issued_at: Utc::now(),
        expires_at,
        used_at: None,
        used_for: None,
    };
    sqlx::query(
        "INSERT INTO reward_vouchers (id, user_id, reward_id, code, status, issued_at, expires_at)
         VALUES (?1, ?2, ?3, ?4, 'active', ?5, ?6)",
    )
    .bind(&voucher.id)
    .bind(&voucher.user_id)
    .bind(&voucher.reward_id)
    .bind(&voucher.code)
    .bind(voucher.issued_at)
    .bind(voucher.expires_at)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    hub.publish(Collection::RewardVouchers, &voucher.id, Some(user_id));
    hub.publish(Collection::Users, user_id, Some(user_id));
    info!("User {user_id} redeemed reward {reward_id} for {point_cost} points");
    Ok(voucher)
}

/// Consume a voucher, transitioning it `active -> used` exactly once.
pub async fn consume(
    pool: &SqlitePool,
    hub: &ChangeHub,
    voucher_id: &str,
    consumer_id: &str,
    purpose: &str,
) -> Result<RewardVoucher> {
    let now = Utc::now();

    // Materialize lazy expiry first so the swap below cannot consume a
    // voucher that outlived its window.
    sqlx::query(
        "UPDATE reward_vouchers SET status = 'expired'
         WHERE id = ?1 AND status = 'active'
           AND expires_at IS NOT NULL AND expires_at <= ?2",
    )
    .bind(voucher_id)
    .bind(now)
    .execute(pool)
    .await?;

    let swapped = sqlx::query(
        "UPDATE reward_vouchers SET status = 'used', used_at = ?1, used_for = ?2
         WHERE id = ?3 AND user_id = ?4 AND status = 'active'",
    )
    .bind(now)
    .bind(purpose)
    .bind(voucher_id)
    .bind(consumer_id)
    .execute(pool)
    .await?
    .rows_affected();

    if swapped == 0 {
        // Re-read to report which guard lost.
        let row = fetch_voucher_row(pool, voucher_id)
            .await?
            .ok_or(EngineError::NotFound)?;
        if row.user_id != consumer_id {
            return Err(EngineError::Unauthorized);
        }
        return match VoucherStatus::parse(&row.status)? {
            VoucherStatus::Used => Err(EngineError::AlreadyUsed),
            VoucherStatus::Expired => Err(EngineError::Expired),
            VoucherStatus::Active => Err(EngineError::Conflict),
        };
    }

    hub.publish(Collection::RewardVouchers, voucher_id, Some(consumer_id));
    info!("Voucher {voucher_id} consumed by {consumer_id} for {purpose}");

    let row = fetch_voucher_row(pool, voucher_id)
        .await?
        .ok_or(EngineError::NotFound)?;
    row.lift()
}

/// Fetch a voucher by id, holder-checked.
pub async fn get_voucher(
    pool: &SqlitePool,
    voucher_id: &str,
    requester_id: &str,
) -> Result<RewardVoucher> {
    let row = fetch_voucher_row(pool, voucher_id)
        .await?
        .ok_or(EngineError::NotFound)?;
    if row.user_id != requester_id {
        return Err(EngineError::Unauthorized);
    }
    row.lift()
}

async fn fetch_voucher_row(pool: &SqlitePool, voucher_id: &str) -> Result<Option<VoucherRow>> {
    let row = sqlx::query_as::<_, VoucherRow>("SELECT * FROM reward_vouchers WHERE id = ?1")
        .bind(voucher_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Human-enterable redemption code, e.g. `GIFT-5A3F9C2D`.
fn generate_code() -> String {
    let raw = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("GIFT-{}", &raw[..8])
}
