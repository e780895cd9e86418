//! Stream aggregator tests: merge determinism and live subscription
//! lifecycle.

mod common;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use donor_core::types::{DonationDetails, DonationEvent, DonationStatus};
use engine::changes::{ChangeHub, Collection};
use engine::feed::{self, Partition};
use engine::completion;

use common::*;

fn event_at(id: &str, user_id: &str, created_at_secs: i64) -> DonationEvent {
    let t = Utc.timestamp_opt(created_at_secs, 0).unwrap();
    DonationEvent {
        id: id.to_string(),
        user_id: user_id.to_string(),
        details: DonationDetails::Appointment { blood_type: None },
        status: DonationStatus::Pending,
        created_at: t,
        scheduled_at: t,
        completed_at: None,
        points_awarded: None,
        points_breakdown: None,
    }
}

/// Poll until `check` passes or the deadline hits.
async fn wait_until<F: Fn() -> bool>(what: &str, check: F) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

// ─────────────────────────────────────────────────────────
// Merge
// ─────────────────────────────────────────────────────────

#[test]
fn merge_orders_across_partitions_newest_first() {
    let mut snapshots = HashMap::new();
    snapshots.insert(
        Partition::Scheduled,
        vec![event_at("1", "u", 10), event_at("3", "u", 30)],
    );
    snapshots.insert(Partition::Emergency, vec![event_at("2", "u", 20)]);

    let merged = feed::merge_snapshots(&snapshots, 10);
    let ids: Vec<&str> = merged.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["3", "2", "1"]);
}

#[test]
fn merge_caps_at_max_results() {
    let mut snapshots = HashMap::new();
    snapshots.insert(
        Partition::Scheduled,
        (0i64..8).map(|i| event_at(&format!("s{i}"), "u", 100 + i)).collect(),
    );
    snapshots.insert(
        Partition::Emergency,
        (0i64..8).map(|i| event_at(&format!("e{i}"), "u", 200 + i)).collect(),
    );

    let merged = feed::merge_snapshots(&snapshots, 5);
    assert_eq!(merged.len(), 5);
    // The emergency partition is uniformly newer, so it fills the cap.
    assert!(merged.iter().all(|e| e.id.starts_with('e')));
}

#[test]
fn merge_breaks_created_at_ties_by_ascending_id() {
    let mut snapshots = HashMap::new();
    snapshots.insert(
        Partition::Scheduled,
        vec![event_at("b", "u", 50), event_at("a", "u", 50)],
    );
    snapshots.insert(Partition::Emergency, vec![event_at("c", "u", 50)]);

    let merged = feed::merge_snapshots(&snapshots, 10);
    let ids: Vec<&str> = merged.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
}

// ─────────────────────────────────────────────────────────
// Live subscription
// ─────────────────────────────────────────────────────────

#[tokio::test]
async fn subscription_fires_initially_and_on_relevant_changes() {
    let pool = test_pool().await;
    let hub = ChangeHub::new();
    seed_user(&pool, "donor", 0).await;
    seed_appointment(&pool, "ev-1", "donor").await;

    let feeds: Arc<Mutex<Vec<Vec<String>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&feeds);
    let subscription = feed::subscribe_user_history(
        &pool,
        &hub,
        "donor",
        10,
        Arc::new(move |events| {
            let ids = events.into_iter().map(|e| e.id).collect();
            sink.lock().unwrap().push(ids);
        }),
    )
    .await
    .expect("subscribe");

    // Initial merge delivered synchronously.
    assert_eq!(feeds.lock().unwrap().first(), Some(&vec!["ev-1".to_string()]));

    // A change in the emergency partition re-merges across both.
    seed_emergency_response(&pool, "ev-2", "donor", "em-1", "high", "O+", 3.0, 10).await;
    hub.publish(Collection::DonationEvents, "ev-2", Some("donor"));
    wait_until("merged feed with ev-2", || {
        feeds
            .lock()
            .unwrap()
            .last()
            .is_some_and(|ids| ids.contains(&"ev-2".to_string()) && ids.len() == 2)
    })
    .await;

    // Changes for other users or collections are ignored.
    let before = feeds.lock().unwrap().len();
    hub.publish(Collection::DonationEvents, "ev-x", Some("someone-else"));
    hub.publish(Collection::Users, "donor", Some("donor"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(feeds.lock().unwrap().len(), before);

    subscription.dispose();
}

#[tokio::test]
async fn completion_drives_the_feed_through_the_change_hub() {
    let pool = test_pool().await;
    let hub = ChangeHub::new();
    let config = test_config();
    seed_user(&pool, "donor", 0).await;
    seed_appointment(&pool, "ev-1", "donor").await;

    let feeds: Arc<Mutex<Vec<Vec<DonationEvent>>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&feeds);
    let subscription = feed::subscribe_user_history(
        &pool,
        &hub,
        "donor",
        10,
        Arc::new(move |events| sink.lock().unwrap().push(events)),
    )
    .await
    .expect("subscribe");

    completion::complete(&pool, &hub, &config, "ev-1", "donor")
        .await
        .expect("complete");

    wait_until("feed showing the completed event", || {
        feeds.lock().unwrap().last().is_some_and(|events| {
            events
                .first()
                .is_some_and(|e| e.status == DonationStatus::Completed)
        })
    })
    .await;

    subscription.dispose();
}

#[tokio::test]
async fn disposal_is_idempotent_and_stops_delivery() {
    let pool = test_pool().await;
    let hub = ChangeHub::new();
    seed_user(&pool, "donor", 0).await;

    let feeds: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&feeds);
    let subscription = feed::subscribe_user_history(
        &pool,
        &hub,
        "donor",
        10,
        Arc::new(move |events| sink.lock().unwrap().push(events.len())),
    )
    .await
    .expect("subscribe");

    subscription.dispose();
    subscription.dispose();
    assert!(subscription.is_disposed());

    // Give the partition tasks time to observe cancellation, then verify
    // further changes deliver nothing.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let before = feeds.lock().unwrap().len();
    seed_appointment(&pool, "ev-9", "donor").await;
    hub.publish(Collection::DonationEvents, "ev-9", Some("donor"));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(feeds.lock().unwrap().len(), before);
}

#[tokio::test]
async fn one_shot_history_matches_the_subscription_merge() {
    let pool = test_pool().await;
    let hub = ChangeHub::new();
    seed_user(&pool, "donor", 0).await;
    seed_appointment(&pool, "ev-1", "donor").await;
    seed_emergency_response(&pool, "ev-2", "donor", "em-1", "low", "O+", 1.0, 60).await;
    // Another user's events never leak into the feed.
    seed_user(&pool, "other", 0).await;
    seed_appointment(&pool, "ev-3", "other").await;

    let history = feed::current_history(&pool, "donor", 10).await.expect("history");
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|e| e.user_id == "donor"));

    let capped = feed::current_history(&pool, "donor", 1).await.expect("capped");
    assert_eq!(capped.len(), 1);
}
