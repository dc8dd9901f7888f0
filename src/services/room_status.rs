//! Room-status reconciliation.
//!
//! Read side: a strict precedence chain turns a room row and its availability
//! log into one `(status, is_available)` pair. Write side: status changes are
//! permission checked, applied optimistically to the in-memory [`RoomBoard`],
//! persisted, logged best-effort and followed by a debounced refetch.

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use dashmap::DashMap;
use metrics::counter;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::occupancy;
use super::refresh::{FetchOutcome, RefreshCoordinator};
use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entities::{room, room_availability, room_reservation, RoomStatus};
use crate::errors::ServiceError;
use crate::events::{ChangeFeed, ChangeKind, Table};

/// Resolves the displayed state of a room. First matching rule wins:
/// explicit room status, latest log status, latest log availability flag,
/// then available.
pub fn reconcile_status(
    room: &room::Model,
    latest_log: Option<&room_availability::Model>,
) -> (RoomStatus, bool) {
    let status = room
        .explicit_status()
        .or_else(|| latest_log.and_then(|entry| entry.explicit_status()))
        .or_else(|| {
            latest_log
                .and_then(|entry| entry.is_available)
                .map(RoomStatus::from_availability)
        })
        .unwrap_or(RoomStatus::Available);

    (status, status.is_available())
}

/// Most recent log entry per room, by `created_at`, independent of input order.
pub fn latest_entries(
    log: &[room_availability::Model],
) -> HashMap<Uuid, &room_availability::Model> {
    let mut latest: HashMap<Uuid, &room_availability::Model> = HashMap::new();
    for entry in log {
        latest
            .entry(entry.room_id)
            .and_modify(|current| {
                if entry.created_at > current.created_at {
                    *current = entry;
                }
            })
            .or_insert(entry);
    }
    latest
}

/// Reconciled room as shown to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RoomView {
    pub id: Uuid,
    pub name: String,
    pub room_type: String,
    pub capacity: i32,
    pub floor: i32,
    pub building_id: Uuid,
    pub status: RoomStatus,
    pub is_available: bool,
    /// Derived occupant: active reservation holder, else the assigned name
    pub current_occupant: Option<String>,
    /// Occupant name stored on the room row
    #[serde(skip)]
    pub assigned_occupant: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl RoomView {
    pub fn reconcile(room: &room::Model, latest_log: Option<&room_availability::Model>) -> Self {
        let (status, is_available) = reconcile_status(room, latest_log);
        Self {
            id: room.id,
            name: room.name.clone(),
            room_type: room.room_type.clone(),
            capacity: room.capacity,
            floor: room.floor,
            building_id: room.building_id,
            status,
            is_available,
            current_occupant: room.current_occupant.clone(),
            assigned_occupant: room.current_occupant.clone(),
            updated_at: room.updated_at,
        }
    }
}

/// Reconciles every room against its latest log entry, preserving room order.
pub fn reconcile_rooms(
    rooms: &[room::Model],
    log: &[room_availability::Model],
) -> Vec<RoomView> {
    let latest = latest_entries(log);
    rooms
        .iter()
        .map(|room| RoomView::reconcile(room, latest.get(&room.id).copied()))
        .collect()
}

/// Loads rooms, the availability log and today's reservations, and produces
/// the reconciled board contents as of `now`.
pub async fn load_room_views(
    db: &DbPool,
    now: NaiveDateTime,
) -> Result<Vec<RoomView>, ServiceError> {
    let rooms = room::Entity::find()
        .order_by_asc(room::Column::Name)
        .all(db)
        .await
        .map_err(ServiceError::db_error)?;
    let log = room_availability::Entity::find()
        .all(db)
        .await
        .map_err(ServiceError::db_error)?;
    let todays = room_reservation::Entity::find()
        .filter(room_reservation::Column::Date.eq(now.date()))
        .all(db)
        .await
        .map_err(ServiceError::db_error)?;

    let mut views = reconcile_rooms(&rooms, &log);
    for view in views.iter_mut() {
        view.current_occupant = occupancy::current_occupant(
            view.id,
            &todays,
            view.is_available,
            view.assigned_occupant.as_deref(),
            now,
        );
    }
    Ok(views)
}

/// In-memory, re-derivable cache of reconciled rooms.
#[derive(Debug, Clone, Default)]
pub struct RoomBoard {
    rooms: Arc<RwLock<Vec<RoomView>>>,
}

impl RoomBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn replace(&self, views: Vec<RoomView>) {
        *self.rooms.write().await = views;
    }

    pub async fn snapshot(&self) -> Vec<RoomView> {
        self.rooms.read().await.clone()
    }

    pub async fn get(&self, room_id: Uuid) -> Option<RoomView> {
        self.rooms
            .read()
            .await
            .iter()
            .find(|view| view.id == room_id)
            .cloned()
    }

    /// Optimistically applies a status change. Returns false if the room is
    /// not on the board.
    pub async fn apply_status(
        &self,
        room_id: Uuid,
        status: RoomStatus,
        occupant: Option<String>,
    ) -> bool {
        let mut rooms = self.rooms.write().await;
        match rooms.iter_mut().find(|view| view.id == room_id) {
            Some(view) => {
                view.status = status;
                view.is_available = status.is_available();
                view.assigned_occupant = occupant.clone();
                view.current_occupant = occupant;
                view.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Overwrites derived occupants; returns how many changed.
    pub async fn set_occupants(&self, occupants: &HashMap<Uuid, Option<String>>) -> usize {
        let mut changed = 0;
        let mut rooms = self.rooms.write().await;
        for view in rooms.iter_mut() {
            if let Some(occupant) = occupants.get(&view.id) {
                if view.current_occupant != *occupant {
                    view.current_occupant = occupant.clone();
                    changed += 1;
                }
            }
        }
        changed
    }
}

/// Per-room in-flight write flags.
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    rooms: Arc<DashMap<Uuid, ()>>,
}

/// Releases the room's in-flight flag on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    rooms: Arc<DashMap<Uuid, ()>>,
    room_id: Uuid,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.rooms.remove(&self.room_id);
    }
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the room as being written; `None` if a write is already running.
    pub fn try_acquire(&self, room_id: Uuid) -> Option<InFlightGuard> {
        match self.rooms.entry(room_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => None,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                Some(InFlightGuard {
                    rooms: self.rooms.clone(),
                    room_id,
                })
            }
        }
    }

    pub fn is_in_flight(&self, room_id: Uuid) -> bool {
        self.rooms.contains_key(&room_id)
    }
}

/// Outcome of a status write.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    Applied(RoomView),
    /// A write for the same room was already in flight; nothing changed.
    Dropped,
}

pub struct RoomStatusService {
    db_pool: Arc<DbPool>,
    feed: ChangeFeed,
    board: RoomBoard,
    in_flight: InFlightRegistry,
    refresh: RefreshCoordinator,
}

impl RoomStatusService {
    pub fn new(db_pool: Arc<DbPool>, feed: ChangeFeed, refetch_debounce: Duration) -> Self {
        let board = RoomBoard::new();
        let refresh = {
            let db = db_pool.clone();
            let board = board.clone();
            RefreshCoordinator::new("rooms", refetch_debounce, move || {
                let db = db.clone();
                let board = board.clone();
                async move {
                    let views = load_room_views(&db, Local::now().naive_local()).await?;
                    debug!(rooms = views.len(), "room board refreshed");
                    board.replace(views).await;
                    Ok(())
                }
            })
        };

        Self {
            db_pool,
            feed,
            board,
            in_flight: InFlightRegistry::new(),
            refresh,
        }
    }

    pub fn board(&self) -> &RoomBoard {
        &self.board
    }

    pub fn refresh(&self) -> &RefreshCoordinator {
        &self.refresh
    }

    pub fn in_flight(&self) -> &InFlightRegistry {
        &self.in_flight
    }

    /// Reconciled room list. Goes through the refresh coordinator so that
    /// concurrent callers share one fetch; a caller that finds a fetch in
    /// flight is served the current board.
    #[instrument(skip(self))]
    pub async fn list_rooms(&self) -> Result<Vec<RoomView>, ServiceError> {
        let outcome = self.refresh.fetch().await?;
        if outcome == FetchOutcome::Skipped {
            debug!("room fetch in flight, serving cached board");
        }
        Ok(self.board.snapshot().await)
    }

    pub async fn get_room(&self, room_id: Uuid) -> Result<RoomView, ServiceError> {
        self.get_room_at(room_id, Local::now().naive_local()).await
    }

    /// A single reconciled room with its occupant derived as of `now`.
    #[instrument(skip(self))]
    pub async fn get_room_at(
        &self,
        room_id: Uuid,
        now: NaiveDateTime,
    ) -> Result<RoomView, ServiceError> {
        let db = self.db_pool.as_ref();
        let room = room::Entity::find_by_id(room_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Room", room_id))?;
        let latest = room_availability::Entity::find()
            .filter(room_availability::Column::RoomId.eq(room_id))
            .order_by_desc(room_availability::Column::CreatedAt)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        let todays = room_reservation::Entity::find()
            .filter(room_reservation::Column::RoomId.eq(room_id))
            .filter(room_reservation::Column::Date.eq(now.date()))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut view = RoomView::reconcile(&room, latest.as_ref());
        view.current_occupant = occupancy::current_occupant(
            room_id,
            &todays,
            view.is_available,
            view.assigned_occupant.as_deref(),
            now,
        );
        Ok(view)
    }

    /// Changes a room's status on behalf of `actor`.
    ///
    /// A second call for a room whose write is still running returns
    /// [`StatusChange::Dropped`] without touching anything. Students may not
    /// change status at all, and rooms under maintenance can only be changed
    /// by a superadmin.
    #[instrument(skip(self, actor), fields(actor_id = %actor.user_id, role = %actor.role))]
    pub async fn change_status(
        &self,
        actor: &AuthUser,
        room_id: Uuid,
        new_status: RoomStatus,
        occupant: Option<String>,
    ) -> Result<StatusChange, ServiceError> {
        actor.require_faculty()?;

        let Some(_guard) = self.in_flight.try_acquire(room_id) else {
            warn!(room_id = %room_id, "status write already in flight for room, dropping request");
            counter!("campusdesk.room_status.dropped", 1);
            return Ok(StatusChange::Dropped);
        };

        let db = self.db_pool.as_ref();
        let room = room::Entity::find_by_id(room_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Room", room_id))?;

        if room.explicit_status() == Some(RoomStatus::Maintenance) && !actor.is_superadmin() {
            warn!(room_id = %room_id, "non-superadmin attempted to change a room under maintenance");
            return Err(ServiceError::Forbidden(
                "only a superadmin can change a room under maintenance".to_string(),
            ));
        }

        let occupant = match new_status {
            RoomStatus::Occupied => occupant.filter(|name| !name.trim().is_empty()),
            _ => None,
        };

        self.board
            .apply_status(room_id, new_status, occupant.clone())
            .await;

        let mut active: room::ActiveModel = room.into();
        active.status = Set(Some(new_status.as_str().to_string()));
        active.is_available = Set(new_status.is_available());
        active.current_occupant = Set(occupant);
        active.updated_at = Set(Utc::now());

        let updated = match active.update(db).await {
            Ok(updated) => updated,
            Err(e) => {
                // Roll the optimistic board state back to the store's view
                self.refresh.request_refetch().await;
                return Err(ServiceError::db_error(e));
            }
        };

        let log_entry = room_availability::ActiveModel {
            id: Set(Uuid::new_v4()),
            room_id: Set(room_id),
            is_available: Set(Some(new_status.is_available())),
            status: Set(Some(new_status.as_str().to_string())),
            created_at: Set(Utc::now()),
            created_by: Set(Some(actor.user_id)),
        };
        match log_entry.insert(db).await {
            Ok(entry) => {
                self.feed
                    .notify(Table::RoomAvailability, ChangeKind::Insert, entry.id);
            }
            Err(e) => {
                warn!(room_id = %room_id, error = %e, "failed to append availability log entry");
            }
        }

        self.feed.notify(Table::Rooms, ChangeKind::Update, room_id);
        self.refresh.request_refetch().await;
        counter!("campusdesk.room_status.applied", 1);
        info!(room_id = %room_id, status = %new_status, "room status changed");

        Ok(StatusChange::Applied(RoomView::reconcile(&updated, None)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn room(status: Option<&str>, is_available: bool) -> room::Model {
        room::Model {
            id: Uuid::new_v4(),
            name: "Lab 101".into(),
            room_type: "lab".into(),
            capacity: 30,
            floor: 1,
            building_id: Uuid::new_v4(),
            is_available,
            status: status.map(str::to_string),
            current_occupant: None,
            updated_at: Utc::now(),
        }
    }

    fn entry(
        room_id: Uuid,
        minute: u32,
        status: Option<&str>,
        is_available: Option<bool>,
    ) -> room_availability::Model {
        room_availability::Model {
            id: Uuid::new_v4(),
            room_id,
            is_available,
            status: status.map(str::to_string),
            created_at: Utc.with_ymd_and_hms(2024, 9, 2, 8, minute, 0).unwrap(),
            created_by: None,
        }
    }

    #[test]
    fn explicit_room_status_beats_the_log() {
        let r = room(Some("maintenance"), true);
        let log = entry(r.id, 5, Some("available"), Some(true));
        assert_eq!(
            reconcile_status(&r, Some(&log)),
            (RoomStatus::Maintenance, false)
        );
    }

    #[test]
    fn log_status_used_when_room_has_none() {
        let r = room(None, true);
        let log = entry(r.id, 5, Some("occupied"), Some(true));
        assert_eq!(reconcile_status(&r, Some(&log)), (RoomStatus::Occupied, false));
    }

    #[test]
    fn log_flag_used_when_log_has_no_status() {
        let r = room(None, true);
        let log = entry(r.id, 5, None, Some(false));
        assert_eq!(reconcile_status(&r, Some(&log)), (RoomStatus::Occupied, false));
    }

    #[test]
    fn defaults_to_available() {
        let r = room(None, false);
        assert_eq!(reconcile_status(&r, None), (RoomStatus::Available, true));
        let empty = entry(r.id, 5, None, None);
        assert_eq!(reconcile_status(&r, Some(&empty)), (RoomStatus::Available, true));
    }

    #[test]
    fn unknown_status_text_falls_through() {
        let r = room(Some("closed"), true);
        let log = entry(r.id, 5, Some("occupied"), None);
        assert_eq!(reconcile_status(&r, Some(&log)).0, RoomStatus::Occupied);
    }

    #[test]
    fn newest_log_entry_wins_regardless_of_order() {
        let r = room(None, true);
        let newer = entry(r.id, 30, Some("available"), Some(true));
        let older = entry(r.id, 10, Some("occupied"), Some(false));

        let views = reconcile_rooms(&[r.clone()], &[newer.clone(), older.clone()]);
        assert_eq!(views[0].status, RoomStatus::Available);
        let views = reconcile_rooms(&[r], &[older, newer]);
        assert_eq!(views[0].status, RoomStatus::Available);
    }

    #[test]
    fn in_flight_guard_is_per_room_and_released_on_drop() {
        let registry = InFlightRegistry::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let guard = registry.try_acquire(a).unwrap();
        assert!(registry.try_acquire(a).is_none());
        assert!(registry.try_acquire(b).is_some());

        drop(guard);
        assert!(!registry.is_in_flight(a));
        assert!(registry.try_acquire(a).is_some());
    }

    #[tokio::test]
    async fn board_applies_optimistic_status() {
        let r = room(Some("available"), true);
        let board = RoomBoard::new();
        board.replace(reconcile_rooms(&[r.clone()], &[])).await;

        assert!(
            board
                .apply_status(r.id, RoomStatus::Occupied, Some("Dr. Chen".into()))
                .await
        );
        let view = board.get(r.id).await.unwrap();
        assert_eq!(view.status, RoomStatus::Occupied);
        assert!(!view.is_available);
        assert_eq!(view.current_occupant.as_deref(), Some("Dr. Chen"));
        assert!(!board.apply_status(Uuid::new_v4(), RoomStatus::Available, None).await);
    }
}
