//! In-process change feed.
//!
//! Every service mutation publishes a [`ChangeEvent`] describing which table
//! changed. Consumers either subscribe to the raw [`ChangeFeed`] or register
//! callbacks against a named resource on an [`InvalidationRegistry`].

use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Tables whose changes are announced on the feed.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Table {
    Buildings,
    Rooms,
    RoomAvailability,
    RoomReservations,
    FacultyRequests,
    Profiles,
    Announcements,
    Accounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A single row-level change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub record_id: Option<Uuid>,
    pub at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(table: Table, kind: ChangeKind, record_id: Option<Uuid>) -> Self {
        Self {
            table,
            kind,
            record_id,
            at: Utc::now(),
        }
    }
}

/// Broadcast channel carrying [`ChangeEvent`]s to every subscriber.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event and returns how many subscribers received it.
    /// Publishing with nobody listening is not an error.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        debug!(table = %event.table, kind = %event.kind, record_id = ?event.record_id, "change published");
        self.sender.send(event).unwrap_or(0)
    }

    pub fn notify(&self, table: Table, kind: ChangeKind, record_id: Uuid) -> usize {
        self.publish(ChangeEvent::new(table, kind, Some(record_id)))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

pub type InvalidationCallback = Arc<dyn Fn(ChangeEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// Callbacks keyed by the resource they invalidate.
#[derive(Default, Clone)]
pub struct InvalidationRegistry {
    handlers: Vec<(Table, InvalidationCallback)>,
}

impl std::fmt::Debug for InvalidationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvalidationRegistry")
            .field(
                "resources",
                &self.handlers.iter().map(|(t, _)| *t).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl InvalidationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` to run for every change to `resource`.
    pub fn on<F, Fut>(&mut self, resource: Table, callback: F) -> &mut Self
    where
        F: Fn(ChangeEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let callback: InvalidationCallback = Arc::new(move |event| Box::pin(callback(event)));
        self.handlers.push((resource, callback));
        self
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Runs every callback registered for the event's table. Returns the
    /// number of callbacks invoked.
    pub async fn dispatch(&self, event: &ChangeEvent) -> usize {
        let pending: Vec<_> = self
            .handlers
            .iter()
            .filter(|(table, _)| *table == event.table)
            .map(|(_, callback)| callback(event.clone()))
            .collect();
        let invoked = pending.len();
        join_all(pending).await;
        invoked
    }

    /// Drives callbacks from a feed subscription until the feed closes.
    pub async fn run(self, mut rx: broadcast::Receiver<ChangeEvent>) {
        info!(resources = self.handlers.len(), "Starting invalidation loop");

        loop {
            match rx.recv().await {
                Ok(event) => {
                    self.dispatch(&event).await;
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Invalidation loop lagged behind the change feed");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }

        warn!("Invalidation loop has ended");
    }

    pub fn spawn(self, feed: &ChangeFeed) -> JoinHandle<()> {
        let rx = feed.subscribe();
        tokio::spawn(self.run(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn callbacks_only_fire_for_their_resource() {
        let rooms = Arc::new(AtomicUsize::new(0));
        let reservations = Arc::new(AtomicUsize::new(0));

        let mut registry = InvalidationRegistry::new();
        {
            let rooms = rooms.clone();
            registry.on(Table::Rooms, move |_| {
                let rooms = rooms.clone();
                async move {
                    rooms.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
        {
            let reservations = reservations.clone();
            registry.on(Table::RoomReservations, move |_| {
                let reservations = reservations.clone();
                async move {
                    reservations.fetch_add(1, Ordering::SeqCst);
                }
            });
        }

        let event = ChangeEvent::new(Table::Rooms, ChangeKind::Update, Some(Uuid::new_v4()));
        assert_eq!(registry.dispatch(&event).await, 1);
        let event = ChangeEvent::new(Table::Announcements, ChangeKind::Insert, None);
        assert_eq!(registry.dispatch(&event).await, 0);

        assert_eq!(rooms.load(Ordering::SeqCst), 1);
        assert_eq!(reservations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn run_drains_feed_until_closed() {
        let feed = ChangeFeed::new(16);
        let seen = Arc::new(AtomicUsize::new(0));
        let mut registry = InvalidationRegistry::new();
        {
            let seen = seen.clone();
            registry.on(Table::RoomAvailability, move |event| {
                let seen = seen.clone();
                async move {
                    assert_eq!(event.kind, ChangeKind::Insert);
                    seen.fetch_add(1, Ordering::SeqCst);
                }
            });
        }

        let handle = registry.spawn(&feed);
        feed.notify(Table::RoomAvailability, ChangeKind::Insert, Uuid::new_v4());
        feed.notify(Table::RoomAvailability, ChangeKind::Insert, Uuid::new_v4());
        drop(feed);

        handle.await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn publish_without_subscribers_is_harmless() {
        let feed = ChangeFeed::new(4);
        assert_eq!(feed.notify(Table::Rooms, ChangeKind::Delete, Uuid::new_v4()), 0);
        assert_eq!(Table::RoomReservations.to_string(), "room_reservations");
    }
}
