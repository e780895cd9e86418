//! # Challenge eligibility predicates
//!
//! One pure predicate per [`ChallengeType`], kept in a single static table
//! so a new challenge family is an additive change here, not a conditional
//! scattered across the completion path.
//!
//! Referral is the deliberate outlier: it is advanced by a "new user signed
//! up with referrer X" event, never by donation completion, so its predicate
//! is constantly false on this path.

use crate::scoring::ScoreInput;
use crate::types::ChallengeType;

/// Response time at or under which a completion counts toward speed-bonus
/// challenges.
pub const SPEED_BONUS_MINUTES: i64 = 15;

/// Distance at or beyond which a completion counts toward distance-bonus
/// challenges.
pub const DISTANCE_BONUS_KM: f64 = 20.0;

/// A challenge eligibility predicate over a completed event's attributes.
pub type Predicate = fn(&ScoreInput) -> bool;

fn always(_: &ScoreInput) -> bool {
    true
}

fn never(_: &ScoreInput) -> bool {
    false
}

fn fast_response(input: &ScoreInput) -> bool {
    input
        .response_time_minutes
        .is_some_and(|m| m <= SPEED_BONUS_MINUTES)
}

fn long_distance(input: &ScoreInput) -> bool {
    input.distance_km.is_some_and(|km| km >= DISTANCE_BONUS_KM)
}

fn emergency(input: &ScoreInput) -> bool {
    input.is_emergency
}

/// The predicate deciding whether a completed donation event counts toward
/// challenges of the given type.
pub fn eligibility(kind: ChallengeType) -> Predicate {
    match kind {
        ChallengeType::Streak => always,
        ChallengeType::CommunityGoal => always,
        ChallengeType::Referral => never,
        ChallengeType::SpeedBonus => fast_response,
        ChallengeType::DistanceBonus => long_distance,
        ChallengeType::EmergencyHero => emergency,
    }
}
