//! Push-based change notification.
//!
//! Every committed mutation publishes a [`ChangeEvent`] on a process-wide
//! broadcast channel; listeners (the stream aggregator, tests, future
//! notification plumbing) filter by collection and user. Publishing never
//! blocks and never fails: a channel with no live receivers simply drops the
//! event, and a slow receiver observes a lag and re-reads from the store.

use tokio::sync::broadcast;

/// Capacity of the broadcast ring. Receivers that fall further behind than
/// this see `RecvError::Lagged` and must re-read their snapshot.
const CHANNEL_CAPACITY: usize = 256;

/// The stored collections whose mutations are announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    DonationEvents,
    Challenges,
    RewardVouchers,
    Users,
    Emergencies,
}

/// A single committed mutation.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub collection: Collection,
    /// Primary key of the mutated row.
    pub id: String,
    /// Owning user, when the collection has one.
    pub user_id: Option<String>,
}

/// Process-wide change fan-out hub. Cheap to clone; all clones share one
/// channel.
#[derive(Debug, Clone)]
pub struct ChangeHub {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    /// Announce a committed mutation. Safe to call with no listeners.
    pub fn publish(&self, collection: Collection, id: &str, user_id: Option<&str>) {
        let _ = self.tx.send(ChangeEvent {
            collection,
            id: id.to_string(),
            user_id: user_id.map(str::to_owned),
        });
    }

    /// Register a new listener. The receiver only sees events published
    /// after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}
