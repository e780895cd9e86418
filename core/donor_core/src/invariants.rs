#![allow(dead_code)]

//! Invariant assertion helpers shared by the test modules.

use crate::types::{Challenge, ChallengeProgress, DonationEvent, DonationStatus, RewardVoucher, VoucherStatus};

/// INV-1: a completed event carries an award and a completion timestamp; a
/// non-completed event carries neither.
pub fn assert_award_matches_status(event: &DonationEvent) {
    if event.status == DonationStatus::Completed {
        assert!(
            event.points_awarded.is_some() && event.completed_at.is_some(),
            "INV-1 violated: completed event {} has no award",
            event.id
        );
    } else {
        assert!(
            event.points_awarded.is_none() && event.completed_at.is_none(),
            "INV-1 violated: event {} in status {:?} carries an award",
            event.id,
            event.status
        );
    }
}

/// INV-2: challenge target must always be positive, reward non-negative.
pub fn assert_challenge_well_formed(challenge: &Challenge) {
    assert!(
        challenge.target > 0,
        "INV-2 violated: challenge {} has non-positive target ({})",
        challenge.id,
        challenge.target
    );
    assert!(
        challenge.reward_points >= 0,
        "INV-2 violated: challenge {} has negative reward",
        challenge.id
    );
}

/// INV-3: completions never exceed participants.
pub fn assert_completion_bound(challenge: &Challenge) {
    assert!(
        challenge.total_completions <= challenge.total_participants,
        "INV-3 violated: challenge {} has {} completions but {} participants",
        challenge.id,
        challenge.total_completions,
        challenge.total_participants
    );
}

/// INV-4: progress is monotonically non-decreasing.
pub fn assert_progress_monotonic(before: &ChallengeProgress, after: &ChallengeProgress) {
    assert!(
        after.current >= before.current,
        "INV-4 violated: progress for ({}, {}) decreased from {} to {}",
        before.challenge_id,
        before.user_id,
        before.current,
        after.current
    );
}

/// INV-5: `completed_at` appears exactly when `current` has reached the
/// target, and never disappears afterwards.
pub fn assert_crossing_consistent(progress: &ChallengeProgress, target: i64) {
    if progress.current >= target {
        assert!(
            progress.completed_at.is_some(),
            "INV-5 violated: progress at {}/{target} with no completed_at",
            progress.current
        );
    } else {
        assert!(
            progress.completed_at.is_none(),
            "INV-5 violated: progress at {}/{target} already marked complete",
            progress.current
        );
    }
}

/// INV-6: a used voucher records when and what for.
pub fn assert_used_voucher_audited(voucher: &RewardVoucher) {
    if voucher.status == VoucherStatus::Used {
        assert!(
            voucher.used_at.is_some() && voucher.used_for.is_some(),
            "INV-6 violated: used voucher {} has no usage record",
            voucher.id
        );
    }
}

/// INV-7: donation status transition validity (forward-only plus the
/// owner `undo` reversal).
pub fn assert_valid_status_transition(from: DonationStatus, to: DonationStatus) {
    assert!(
        DonationStatus::can_transition(from, to),
        "INV-7 violated: invalid status transition from {:?} to {:?}",
        from,
        to
    );
}
