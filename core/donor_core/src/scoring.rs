//! # Impact scoring
//!
//! Converts the attributes of a completed donation event into a point total
//! plus an itemized breakdown.
//!
//! ## Determinism
//!
//! [`score`] is a pure function: no clock reads, no randomness, no store
//! access. Whether this is the user's first completed donation is decided by
//! the caller and passed in as a flag, precisely so the function stays
//! referentially transparent and replayable for audit.
//!
//! ## Fixed scale
//!
//! | Component      | Rule                                        |
//! |----------------|---------------------------------------------|
//! | base           | 50, always                                  |
//! | urgency        | critical +40, high +25, medium +10, low +0  |
//! | rarity         | +30 when the blood type is in the rare set  |
//! | distance       | +1 per km beyond 10, capped at +50          |
//! | speed          | +30 at ≤15 min, +15 at ≤30 min              |
//! | first_donation | +50 for the user's first completed event    |

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::{DonationDetails, Urgency};

const BASE_POINTS: i64 = 50;
const URGENCY_CRITICAL_BONUS: i64 = 40;
const URGENCY_HIGH_BONUS: i64 = 25;
const URGENCY_MEDIUM_BONUS: i64 = 10;
const RARITY_BONUS: i64 = 30;
const DISTANCE_FREE_KM: f64 = 10.0;
const DISTANCE_CAP: i64 = 50;
const FAST_RESPONSE_MINUTES: i64 = 15;
const FAST_RESPONSE_BONUS: i64 = 30;
const PROMPT_RESPONSE_MINUTES: i64 = 30;
const PROMPT_RESPONSE_BONUS: i64 = 15;
const FIRST_DONATION_BONUS: i64 = 50;

/// Blood types scarce enough to earn the rarity bonus.
const RARE_BLOOD_TYPES: [&str; 4] = ["O-", "AB-", "B-", "A-"];

/// Attributes of a completed event that feed the score.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoreInput {
    pub urgency: Option<Urgency>,
    pub blood_type: Option<String>,
    pub distance_km: Option<f64>,
    pub response_time_minutes: Option<i64>,
    pub is_emergency: bool,
    /// Caller-checked: is this the user's first completed event?
    pub first_donation: bool,
}

impl ScoreInput {
    /// Build the scoring input from an event's details plus the
    /// caller-checked first-donation flag.
    pub fn from_details(details: &DonationDetails, first_donation: bool) -> Self {
        Self {
            urgency: details.urgency(),
            blood_type: details.blood_type().map(str::to_owned),
            distance_km: details.distance_km(),
            response_time_minutes: details.response_time_minutes(),
            is_emergency: details.is_emergency(),
            first_donation,
        }
    }
}

/// A computed award: the total plus each named component that contributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub total: i64,
    /// Component name → points. Zero-valued components are omitted, except
    /// `base` which is always present.
    pub breakdown: BTreeMap<String, i64>,
}

/// Whether a blood type earns the rarity bonus.
pub fn is_rare_blood_type(blood_type: &str) -> bool {
    RARE_BLOOD_TYPES.contains(&blood_type)
}

/// Score a completed donation event.
///
/// Calling twice with identical input yields identical output.
pub fn score(input: &ScoreInput) -> Score {
    let mut breakdown = BTreeMap::new();
    breakdown.insert("base".to_string(), BASE_POINTS);

    if let Some(urgency) = input.urgency {
        let bonus = match urgency {
            Urgency::Critical => URGENCY_CRITICAL_BONUS,
            Urgency::High => URGENCY_HIGH_BONUS,
            Urgency::Medium => URGENCY_MEDIUM_BONUS,
            Urgency::Low => 0,
        };
        if bonus > 0 {
            breakdown.insert("urgency".to_string(), bonus);
        }
    }

    if let Some(blood_type) = input.blood_type.as_deref() {
        if is_rare_blood_type(blood_type) {
            breakdown.insert("rarity".to_string(), RARITY_BONUS);
        }
    }

    if let Some(distance_km) = input.distance_km {
        let beyond = (distance_km - DISTANCE_FREE_KM).floor() as i64;
        let bonus = beyond.clamp(0, DISTANCE_CAP);
        if bonus > 0 {
            breakdown.insert("distance".to_string(), bonus);
        }
    }

    if let Some(minutes) = input.response_time_minutes {
        let bonus = if minutes <= FAST_RESPONSE_MINUTES {
            FAST_RESPONSE_BONUS
        } else if minutes <= PROMPT_RESPONSE_MINUTES {
            PROMPT_RESPONSE_BONUS
        } else {
            0
        };
        if bonus > 0 {
            breakdown.insert("speed".to_string(), bonus);
        }
    }

    if input.first_donation {
        breakdown.insert("first_donation".to_string(), FIRST_DONATION_BONUS);
    }

    let total = breakdown.values().sum();
    Score { total, breakdown }
}
