//! Stream aggregator — one consistent history feed per user.
//!
//! Donation events live in two independently-updating partitions (scheduled
//! acts vs emergency responses). A live subscription keeps a snapshot per
//! partition and, on every partition change, re-reads that partition,
//! re-merges all cached snapshots, and re-sorts by `(created_at desc,
//! id asc)`. No ordering is assumed across partitions.
//!
//! A failing partition read keeps its stale snapshot and the feed keeps
//! serving from the rest: partial availability wins over consistency here.
//!
//! The returned [`FeedSubscription`] cancels every partition listener
//! through one shared token; disposal is idempotent.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use donor_core::types::DonationEvent;
use sqlx::SqlitePool;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::changes::{ChangeHub, Collection};
use crate::db;
use crate::errors::Result;

/// The event-ledger partitions a user feed merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Partition {
    /// Appointments and drive registrations.
    Scheduled,
    /// Emergency responses.
    Emergency,
}

impl Partition {
    pub const ALL: [Partition; 2] = [Partition::Scheduled, Partition::Emergency];

    fn kinds(self) -> &'static [&'static str] {
        match self {
            Self::Scheduled => &["appointment", "drive_registration"],
            Self::Emergency => &["emergency_response"],
        }
    }

    fn contains_kind(self, kind: &str) -> bool {
        self.kinds().contains(&kind)
    }
}

/// Callback invoked with the merged feed on every re-merge.
pub type FeedCallback = Arc<dyn Fn(Vec<DonationEvent>) + Send + Sync>;

/// Handle to a live history subscription. Dropping it does NOT tear the
/// subscription down; call [`FeedSubscription::dispose`].
#[derive(Debug, Clone)]
pub struct FeedSubscription {
    token: CancellationToken,
}

impl FeedSubscription {
    /// Tear down every underlying partition listener. Safe to call more
    /// than once.
    pub fn dispose(&self) {
        self.token.cancel();
    }

    pub fn is_disposed(&self) -> bool {
        self.token.is_cancelled()
    }
}

type Snapshots = Arc<Mutex<HashMap<Partition, Vec<DonationEvent>>>>;

/// Merge the cached partition snapshots into one feed, newest first,
/// tie-broken by ascending id, capped at `max_results`.
pub fn merge_snapshots(
    snapshots: &HashMap<Partition, Vec<DonationEvent>>,
    max_results: usize,
) -> Vec<DonationEvent> {
    let mut merged: Vec<DonationEvent> = snapshots.values().flatten().cloned().collect();
    merged.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    merged.truncate(max_results);
    merged
}

/// One-shot merged history read, the pull counterpart of the subscription.
pub async fn current_history(
    pool: &SqlitePool,
    user_id: &str,
    max_results: usize,
) -> Result<Vec<DonationEvent>> {
    let mut snapshots = HashMap::new();
    for partition in Partition::ALL {
        let events = db::events_for_kinds(pool, user_id, partition.kinds(), max_results).await?;
        snapshots.insert(partition, events);
    }
    Ok(merge_snapshots(&snapshots, max_results))
}

/// Subscribe to a user's merged donation history.
///
/// The callback fires once with the initial merge, then on every relevant
/// store change. It must tolerate being called at high frequency.
pub async fn subscribe_user_history(
    pool: &SqlitePool,
    hub: &ChangeHub,
    user_id: &str,
    max_results: usize,
    callback: FeedCallback,
) -> Result<FeedSubscription> {
    let snapshots: Snapshots = Arc::new(Mutex::new(HashMap::new()));
    let token = CancellationToken::new();

    // Initial snapshot of every partition, then a single first merge.
    for partition in Partition::ALL {
        let events = db::events_for_kinds(pool, user_id, partition.kinds(), max_results).await?;
        snapshots
            .lock()
            .expect("feed snapshot lock poisoned")
            .insert(partition, events);
    }
    let initial = {
        let guard = snapshots.lock().expect("feed snapshot lock poisoned");
        merge_snapshots(&guard, max_results)
    };
    callback(initial);

    for partition in Partition::ALL {
        let mut rx = hub.subscribe();
        let pool = pool.clone();
        let user_id = user_id.to_string();
        let snapshots = Arc::clone(&snapshots);
        let callback = Arc::clone(&callback);
        let token = token.clone();

        tokio::spawn(async move {
            loop {
                let refresh = tokio::select! {
                    _ = token.cancelled() => return,
                    event = rx.recv() => match event {
                        Ok(change) => {
                            change.collection == Collection::DonationEvents
                                && change.user_id.as_deref() == Some(user_id.as_str())
                                && partition_of_change(&pool, &change.id, partition).await
                        }
                        // Fell behind the ring buffer: the snapshot may be
                        // stale, re-read unconditionally.
                        Err(RecvError::Lagged(_)) => true,
                        Err(RecvError::Closed) => return,
                    },
                };
                if !refresh {
                    continue;
                }

                match db::events_for_kinds(&pool, &user_id, partition.kinds(), max_results).await {
                    Ok(events) => {
                        let merged = {
                            let mut guard =
                                snapshots.lock().expect("feed snapshot lock poisoned");
                            guard.insert(partition, events);
                            merge_snapshots(&guard, max_results)
                        };
                        callback(merged);
                    }
                    Err(e) => {
                        // Keep serving the stale snapshot from this
                        // partition; the others stay live.
                        warn!("Feed partition {partition:?} refresh failed for {user_id}: {e}");
                    }
                }
            }
        });
    }

    Ok(FeedSubscription { token })
}

/// Whether a changed donation event belongs to `partition`. Unknown rows
/// (deleted or unreadable) refresh anyway rather than risk a stale feed.
async fn partition_of_change(pool: &SqlitePool, event_id: &str, partition: Partition) -> bool {
    match db::fetch_event(pool, event_id).await {
        Ok(Some(row)) => partition.contains_kind(&row.kind),
        Ok(None) => true,
        Err(_) => true,
    }
}
