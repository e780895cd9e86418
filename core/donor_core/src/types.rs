//! # Types
//!
//! Shared data structures used across the donation pipeline.
//!
//! ## Design decisions
//!
//! ### Kind-specific fields as a tagged union
//!
//! A donation event carries different required fields depending on its kind
//! (an emergency response has an urgency and a related emergency; an
//! appointment does not). Rather than one loosely-typed record full of
//! options, [`DonationDetails`] is a discriminated union so the per-kind
//! required fields are enforced by the compiler. The storage layer keeps a
//! flat row and lifts it through [`DonationDetails::from_parts`], which is
//! where malformed rows surface as [`DomainError::Validation`].
//!
//! ### Status as a finite-state machine
//!
//! [`DonationStatus`] enforces a forward-only lifecycle:
//!
//! ```text
//! Pending ──► Completed
//!     └─────► Cancelled
//! ```
//!
//! Terminal states admit no further transitions, with one deliberate
//! exception: `undo` reverses Completed ──► Pending for the owner, clearing
//! the award. [`DonationStatus::can_transition`] encodes exactly this.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced by the pure domain layer.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

// ─────────────────────────────────────────────────────────
// Donation events
// ─────────────────────────────────────────────────────────

/// Lifecycle status of a donation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DonationStatus {
    /// Scheduled, not yet carried out.
    Pending,
    /// Carried out; points awarded exactly once.
    Completed,
    /// Withdrawn before completion.
    Cancelled,
}

impl DonationStatus {
    /// Short identifier string suitable for storage in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse the stored identifier back into a status.
    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(DomainError::Validation(format!(
                "unknown donation status: {other}"
            ))),
        }
    }

    /// Whether `from -> to` is a permitted lifecycle transition.
    ///
    /// `Completed -> Pending` is the owner-only `undo` reversal; everything
    /// else out of a terminal state is rejected.
    pub fn can_transition(from: Self, to: Self) -> bool {
        matches!(
            (from, to),
            (Self::Pending, Self::Completed)
                | (Self::Pending, Self::Cancelled)
                | (Self::Completed, Self::Pending)
        )
    }
}

/// Urgency attached to an emergency blood request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(DomainError::Validation(format!("unknown urgency: {other}"))),
        }
    }
}

/// Kind-specific payload of a donation event.
///
/// The discriminant doubles as the partition key for history feeds:
/// appointments and drive registrations share the scheduled partition,
/// emergency responses have their own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DonationDetails {
    /// A booked donation appointment at a fixed site.
    Appointment { blood_type: Option<String> },
    /// Registration for a community blood drive.
    DriveRegistration {
        drive_id: String,
        blood_type: Option<String>,
    },
    /// A response to an active emergency request.
    EmergencyResponse {
        emergency_id: String,
        urgency: Urgency,
        blood_type: Option<String>,
        distance_km: Option<f64>,
        response_time_minutes: Option<i64>,
    },
}

impl DonationDetails {
    /// Lift a flat storage row into the tagged union, enforcing the fields
    /// each kind requires.
    pub fn from_parts(
        kind: &str,
        blood_type: Option<String>,
        drive_id: Option<String>,
        emergency_id: Option<String>,
        urgency: Option<String>,
        distance_km: Option<f64>,
        response_time_minutes: Option<i64>,
    ) -> Result<Self, DomainError> {
        match kind {
            "appointment" => Ok(Self::Appointment { blood_type }),
            "drive_registration" => Ok(Self::DriveRegistration {
                drive_id: drive_id.ok_or_else(|| {
                    DomainError::Validation("drive_registration missing drive_id".into())
                })?,
                blood_type,
            }),
            "emergency_response" => Ok(Self::EmergencyResponse {
                emergency_id: emergency_id.ok_or_else(|| {
                    DomainError::Validation("emergency_response missing emergency_id".into())
                })?,
                urgency: Urgency::parse(&urgency.ok_or_else(|| {
                    DomainError::Validation("emergency_response missing urgency".into())
                })?)?,
                blood_type,
                distance_km,
                response_time_minutes,
            }),
            other => Err(DomainError::Validation(format!(
                "unknown donation kind: {other}"
            ))),
        }
    }

    /// Storage identifier for the kind discriminant.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Appointment { .. } => "appointment",
            Self::DriveRegistration { .. } => "drive_registration",
            Self::EmergencyResponse { .. } => "emergency_response",
        }
    }

    pub fn is_emergency(&self) -> bool {
        matches!(self, Self::EmergencyResponse { .. })
    }

    pub fn blood_type(&self) -> Option<&str> {
        match self {
            Self::Appointment { blood_type }
            | Self::DriveRegistration { blood_type, .. }
            | Self::EmergencyResponse { blood_type, .. } => blood_type.as_deref(),
        }
    }

    pub fn urgency(&self) -> Option<Urgency> {
        match self {
            Self::EmergencyResponse { urgency, .. } => Some(*urgency),
            _ => None,
        }
    }

    pub fn distance_km(&self) -> Option<f64> {
        match self {
            Self::EmergencyResponse { distance_km, .. } => *distance_km,
            _ => None,
        }
    }

    pub fn response_time_minutes(&self) -> Option<i64> {
        match self {
            Self::EmergencyResponse {
                response_time_minutes,
                ..
            } => *response_time_minutes,
            _ => None,
        }
    }
}

/// A schedulable donation act and its award, the unit record of the event
/// ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationEvent {
    /// Unique identifier.
    pub id: String,
    /// Owning donor; the only identity permitted to complete or undo.
    pub user_id: String,
    /// Kind-specific payload.
    #[serde(flatten)]
    pub details: DonationDetails,
    /// Current lifecycle status.
    pub status: DonationStatus,
    pub created_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
    /// Set when the event transitions to `Completed`; cleared by `undo`.
    pub completed_at: Option<DateTime<Utc>>,
    /// Impact points credited for this event. Set at most once.
    pub points_awarded: Option<i64>,
    /// Itemized score components, kept for auditability.
    pub points_breakdown: Option<serde_json::Value>,
}

// ─────────────────────────────────────────────────────────
// Challenges
// ─────────────────────────────────────────────────────────

/// Challenge families, each with its own eligibility predicate
/// (see [`crate::predicates`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
    Streak,
    CommunityGoal,
    Referral,
    SpeedBonus,
    DistanceBonus,
    EmergencyHero,
}

impl ChallengeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Streak => "streak",
            Self::CommunityGoal => "community_goal",
            Self::Referral => "referral",
            Self::SpeedBonus => "speed_bonus",
            Self::DistanceBonus => "distance_bonus",
            Self::EmergencyHero => "emergency_hero",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "streak" => Ok(Self::Streak),
            "community_goal" => Ok(Self::CommunityGoal),
            "referral" => Ok(Self::Referral),
            "speed_bonus" => Ok(Self::SpeedBonus),
            "distance_bonus" => Ok(Self::DistanceBonus),
            "emergency_hero" => Ok(Self::EmergencyHero),
            other => Err(DomainError::Validation(format!(
                "unknown challenge type: {other}"
            ))),
        }
    }
}

/// Lifecycle of a time-boxed challenge, derived from its window plus the
/// community-goal completion trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Upcoming,
    Active,
    Completed,
    Expired,
}

impl ChallengeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "upcoming" => Ok(Self::Upcoming),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "expired" => Ok(Self::Expired),
            other => Err(DomainError::Validation(format!(
                "unknown challenge status: {other}"
            ))),
        }
    }
}

/// A time-boxed goal with a numeric target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub kind: ChallengeType,
    /// Progress units required to complete. Always positive.
    pub target: i64,
    /// Points credited to a user's redeemable balance on crossing.
    pub reward_points: i64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub status: ChallengeStatus,
    /// Distinct users holding a progress row.
    pub total_participants: i64,
    /// Users whose progress has crossed the target. Never exceeds
    /// `total_participants`.
    pub total_completions: i64,
}

/// Per-user progress toward one challenge, keyed by `(challenge_id, user_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeProgress {
    pub challenge_id: String,
    pub user_id: String,
    /// Raw accumulated units. Monotone while the challenge is active; may
    /// exceed the target, which the stored value keeps for audit.
    pub current: i64,
    pub started: bool,
    pub started_at: Option<DateTime<Utc>>,
    /// Set exactly once, the first instant `current >= target`.
    pub completed_at: Option<DateTime<Utc>>,
    /// Referral challenges only: users already counted, to deduplicate.
    pub referred_user_ids: BTreeSet<String>,
}

impl ChallengeProgress {
    /// Progress value for display, clamped at the target. The stored
    /// `current` is intentionally left unclamped.
    pub fn display_current(&self, target: i64) -> i64 {
        self.current.min(target)
    }
}

// ─────────────────────────────────────────────────────────
// Reward vouchers
// ─────────────────────────────────────────────────────────

/// Voucher lifecycle. `Used` and `Expired` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoucherStatus {
    Active,
    Used,
    Expired,
}

impl VoucherStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Used => "used",
            Self::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "active" => Ok(Self::Active),
            "used" => Ok(Self::Used),
            "expired" => Ok(Self::Expired),
            other => Err(DomainError::Validation(format!(
                "unknown voucher status: {other}"
            ))),
        }
    }
}

/// A single-use token bought with points, held until consumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardVoucher {
    pub id: String,
    pub user_id: String,
    pub reward_id: String,
    /// Redemption code shown to the holder.
    pub code: String,
    pub status: VoucherStatus,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub used_at: Option<DateTime<Utc>>,
    pub used_for: Option<String>,
}

// ─────────────────────────────────────────────────────────
// Users & emergencies
// ─────────────────────────────────────────────────────────

/// The points aggregate on the user record. Created externally at
/// registration; mutated here only through atomic increments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPointsAccount {
    pub user_id: String,
    pub total_donations: i64,
    /// Lifetime impact score.
    pub impact_points: i64,
    /// Redeemable balance, debited by the voucher ledger.
    pub total_points: i64,
    pub challenges_completed: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmergencyStatus {
    Open,
    Fulfilled,
}

impl EmergencyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Fulfilled => "fulfilled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "open" => Ok(Self::Open),
            "fulfilled" => Ok(Self::Fulfilled),
            other => Err(DomainError::Validation(format!(
                "unknown emergency status: {other}"
            ))),
        }
    }
}

/// An active blood request that completed responses count toward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emergency {
    pub id: String,
    pub blood_type: String,
    pub units_needed: i64,
    pub responders_count: i64,
    pub status: EmergencyStatus,
    pub updated_at: DateTime<Utc>,
}
