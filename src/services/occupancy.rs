//! Who currently holds a room.

use chrono::{Local, NaiveDateTime};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::reservations::ReservationService;
use super::room_status::RoomBoard;
use crate::db::DbPool;
use crate::entities::room_reservation;
use crate::errors::ServiceError;
use crate::events::{InvalidationRegistry, Table};

/// A reservation is active while `now` falls inside its window on its date
/// and it has not been completed.
pub fn is_active(reservation: &room_reservation::Model, now: NaiveDateTime) -> bool {
    !reservation.is_completed()
        && reservation.date == now.date()
        && reservation.start_time <= now.time()
        && now.time() < reservation.end_time
}

/// Occupant of `room_id` at `now`: the faculty name on the active
/// reservation, else `fallback` when the room is flagged unavailable.
pub fn current_occupant(
    room_id: Uuid,
    reservations: &[room_reservation::Model],
    room_is_available: bool,
    fallback: Option<&str>,
    now: NaiveDateTime,
) -> Option<String> {
    reservations
        .iter()
        .find(|r| r.room_id == room_id && is_active(r, now))
        .map(|r| r.faculty_name.clone())
        .or_else(|| {
            if room_is_available {
                None
            } else {
                fallback.map(str::to_string)
            }
        })
}

/// Re-derives occupants for every room on the board on a fixed interval and
/// whenever reservations, availability or rooms change.
pub struct OccupancyMonitor {
    db_pool: Arc<DbPool>,
    board: RoomBoard,
    reservations: Arc<ReservationService>,
    interval: Duration,
}

impl OccupancyMonitor {
    pub fn new(
        db_pool: Arc<DbPool>,
        board: RoomBoard,
        reservations: Arc<ReservationService>,
        interval: Duration,
    ) -> Self {
        Self {
            db_pool,
            board,
            reservations,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Recomputes occupants as of `now`. Returns how many rooms changed.
    #[instrument(skip(self))]
    pub async fn tick_at(&self, now: NaiveDateTime) -> Result<usize, ServiceError> {
        self.reservations.complete_elapsed(now).await?;

        let todays = room_reservation::Entity::find()
            .filter(room_reservation::Column::Date.eq(now.date()))
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let occupants: HashMap<Uuid, Option<String>> = self
            .board
            .snapshot()
            .await
            .iter()
            .map(|view| {
                (
                    view.id,
                    current_occupant(
                        view.id,
                        &todays,
                        view.is_available,
                        view.assigned_occupant.as_deref(),
                        now,
                    ),
                )
            })
            .collect();

        let changed = self.board.set_occupants(&occupants).await;
        debug!(rooms = occupants.len(), changed, "occupancy recomputed");
        Ok(changed)
    }

    pub async fn tick(&self) {
        if let Err(e) = self.tick_at(Local::now().naive_local()).await {
            warn!(error = %e, "occupancy check failed");
        }
    }

    /// Registers change-driven rechecks.
    pub fn register(self: &Arc<Self>, registry: &mut InvalidationRegistry) {
        for table in [Table::RoomReservations, Table::RoomAvailability, Table::Rooms] {
            let monitor = self.clone();
            registry.on(table, move |_| {
                let monitor = monitor.clone();
                async move { monitor.tick().await }
            });
        }
    }

    /// Spawns the polling loop.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(interval_secs = self.interval.as_secs(), "Starting occupancy monitor");
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        })
    }
}
