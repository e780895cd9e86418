use crate::predicates::eligibility;
use crate::scoring::ScoreInput;
use crate::types::{ChallengeType, Urgency};

fn emergency_input() -> ScoreInput {
    ScoreInput {
        urgency: Some(Urgency::High),
        blood_type: Some("A+".to_string()),
        distance_km: Some(22.0),
        response_time_minutes: Some(14),
        is_emergency: true,
        first_donation: false,
    }
}

#[test]
fn test_streak_and_community_goal_always_eligible() {
    let bare = ScoreInput::default();
    assert!(eligibility(ChallengeType::Streak)(&bare));
    assert!(eligibility(ChallengeType::CommunityGoal)(&bare));
}

#[test]
fn test_referral_never_matches_donation_completion() {
    assert!(!eligibility(ChallengeType::Referral)(&emergency_input()));
}

#[test]
fn test_speed_bonus_cutoff_at_15_minutes() {
    let predicate = eligibility(ChallengeType::SpeedBonus);

    let mut input = emergency_input();
    input.response_time_minutes = Some(15);
    assert!(predicate(&input));

    input.response_time_minutes = Some(16);
    assert!(!predicate(&input));

    input.response_time_minutes = None;
    assert!(!predicate(&input));
}

#[test]
fn test_distance_bonus_cutoff_at_20_km() {
    let predicate = eligibility(ChallengeType::DistanceBonus);

    let mut input = emergency_input();
    input.distance_km = Some(20.0);
    assert!(predicate(&input));

    input.distance_km = Some(19.9);
    assert!(!predicate(&input));
}

#[test]
fn test_emergency_hero_requires_emergency_response() {
    let predicate = eligibility(ChallengeType::EmergencyHero);
    assert!(predicate(&emergency_input()));
    assert!(!predicate(&ScoreInput::default()));
}
