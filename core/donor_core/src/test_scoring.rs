use crate::scoring::{is_rare_blood_type, score, Score, ScoreInput};
use crate::types::Urgency;

fn emergency_input() -> ScoreInput {
    ScoreInput {
        urgency: Some(Urgency::Critical),
        blood_type: Some("O-".to_string()),
        distance_km: Some(25.0),
        response_time_minutes: Some(12),
        is_emergency: true,
        first_donation: true,
    }
}

#[test]
fn test_full_emergency_scenario_scores_215() {
    let Score { total, breakdown } = score(&emergency_input());

    assert_eq!(total, 215);
    assert_eq!(breakdown.get("base"), Some(&50));
    assert_eq!(breakdown.get("urgency"), Some(&40));
    assert_eq!(breakdown.get("rarity"), Some(&30));
    assert_eq!(breakdown.get("distance"), Some(&15));
    assert_eq!(breakdown.get("speed"), Some(&30));
    assert_eq!(breakdown.get("first_donation"), Some(&50));
}

#[test]
fn test_score_is_deterministic() {
    let input = emergency_input();
    assert_eq!(score(&input), score(&input));
}

#[test]
fn test_bare_appointment_scores_base_only() {
    let result = score(&ScoreInput::default());
    assert_eq!(result.total, 50);
    assert_eq!(result.breakdown.len(), 1);
    assert_eq!(result.breakdown.get("base"), Some(&50));
}

#[test]
fn test_total_equals_sum_of_breakdown() {
    let result = score(&emergency_input());
    assert_eq!(result.total, result.breakdown.values().sum::<i64>());
}

#[test]
fn test_urgency_ladder() {
    let bonus = |urgency| {
        let result = score(&ScoreInput {
            urgency: Some(urgency),
            ..ScoreInput::default()
        });
        result.breakdown.get("urgency").copied().unwrap_or(0)
    };
    assert_eq!(bonus(Urgency::Critical), 40);
    assert_eq!(bonus(Urgency::High), 25);
    assert_eq!(bonus(Urgency::Medium), 10);
    assert_eq!(bonus(Urgency::Low), 0);
}

#[test]
fn test_distance_bonus_caps_at_50() {
    let result = score(&ScoreInput {
        distance_km: Some(500.0),
        ..ScoreInput::default()
    });
    assert_eq!(result.breakdown.get("distance"), Some(&50));
}

#[test]
fn test_distance_within_free_radius_earns_nothing() {
    let result = score(&ScoreInput {
        distance_km: Some(9.5),
        ..ScoreInput::default()
    });
    assert!(!result.breakdown.contains_key("distance"));
}

#[test]
fn test_speed_tiers() {
    let bonus = |minutes| {
        let result = score(&ScoreInput {
            response_time_minutes: Some(minutes),
            ..ScoreInput::default()
        });
        result.breakdown.get("speed").copied().unwrap_or(0)
    };
    assert_eq!(bonus(15), 30);
    assert_eq!(bonus(16), 15);
    assert_eq!(bonus(30), 15);
    assert_eq!(bonus(31), 0);
}

#[test]
fn test_rare_blood_type_set() {
    assert!(is_rare_blood_type("O-"));
    assert!(is_rare_blood_type("AB-"));
    assert!(!is_rare_blood_type("O+"));
    assert!(!is_rare_blood_type("AB+"));
}
