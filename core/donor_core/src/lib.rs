//! # Donor Engagement Core
//!
//! This is the pure domain crate of the donor engagement platform. It covers
//! the pieces of the pipeline that must hold regardless of which store or
//! framework runs them:
//!
//! | Concern              | Module         |
//! |----------------------|----------------|
//! | Event & record model | [`types`]      |
//! | Impact scoring       | [`scoring`]    |
//! | Challenge eligibility| [`predicates`] |
//!
//! ## Architecture
//!
//! Nothing in this crate performs I/O, reads a clock, or touches an async
//! runtime. Persistence, subscriptions, and the completion workflow live in
//! the `engine` backend crate; this crate only defines what a donation event
//! *is*, what it is *worth*, and which challenges it *counts toward*.

pub mod predicates;
pub mod scoring;
pub mod types;

#[cfg(test)]
mod invariants;
#[cfg(test)]
mod test_predicates;
#[cfg(test)]
mod test_scoring;
#[cfg(test)]
mod test_types;

pub use predicates::eligibility;
pub use scoring::{score, Score, ScoreInput};
pub use types::{
    Challenge, ChallengeProgress, ChallengeStatus, ChallengeType, DomainError, DonationDetails,
    DonationEvent, DonationStatus, Emergency, EmergencyStatus, RewardVoucher, Urgency,
    UserPointsAccount, VoucherStatus,
};

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, types::DomainError>;
