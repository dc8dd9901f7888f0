//! Room reservations: listing, upcoming filtering, booking, cancellation and
//! reminder timers.

use chrono::{Duration as ChronoDuration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use dashmap::DashMap;
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entities::{room, room_reservation, ReservationStatus};
use crate::errors::ServiceError;
use crate::events::{ChangeFeed, ChangeKind, Table};

pub fn minutes_since_midnight(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Keeps reservations worth displaying as upcoming at `now`: not completed,
/// not dated before today, and for today not already ended. Input order is
/// preserved.
pub fn filter_upcoming(
    reservations: Vec<room_reservation::Model>,
    now: NaiveDateTime,
) -> Vec<room_reservation::Model> {
    let today = now.date();
    let now_minutes = minutes_since_midnight(now.time());

    reservations
        .into_iter()
        .filter(|r| !r.is_completed())
        .filter(|r| r.date >= today)
        .filter(|r| r.date > today || minutes_since_midnight(r.end_time) > now_minutes)
        .collect()
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "room_id": "7d9f3c1e-2b4a-4e8f-9a61-0c5d2e7b8f10",
    "date": "2024-09-02",
    "start_time": "09:00:00",
    "end_time": "10:30:00",
    "purpose": "CS101 lecture"
}))]
pub struct CreateReservationRequest {
    pub room_id: Uuid,
    pub date: NaiveDate,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "10:30:00")]
    pub end_time: NaiveTime,
    #[validate(length(min = 1, max = 500))]
    pub purpose: String,
}

fn overlaps(a_start: NaiveTime, a_end: NaiveTime, b_start: NaiveTime, b_end: NaiveTime) -> bool {
    a_start < b_end && b_start < a_end
}

pub struct ReservationService {
    db_pool: Arc<DbPool>,
    feed: ChangeFeed,
}

impl ReservationService {
    pub fn new(db_pool: Arc<DbPool>, feed: ChangeFeed) -> Self {
        Self { db_pool, feed }
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<room_reservation::Model, ServiceError> {
        room_reservation::Entity::find_by_id(id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Reservation", id))
    }

    /// All reservations for a room in (date, start) order.
    #[instrument(skip(self))]
    pub async fn list_for_room(
        &self,
        room_id: Uuid,
    ) -> Result<Vec<room_reservation::Model>, ServiceError> {
        room_reservation::Entity::find()
            .filter(room_reservation::Column::RoomId.eq(room_id))
            .order_by_asc(room_reservation::Column::Date)
            .order_by_asc(room_reservation::Column::StartTime)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    pub async fn upcoming_for_room(
        &self,
        room_id: Uuid,
        now: NaiveDateTime,
    ) -> Result<Vec<room_reservation::Model>, ServiceError> {
        let all = self.list_for_room(room_id).await?;
        Ok(filter_upcoming(all, now))
    }

    #[instrument(skip(self))]
    pub async fn list_for_faculty(
        &self,
        faculty_id: Uuid,
    ) -> Result<Vec<room_reservation::Model>, ServiceError> {
        room_reservation::Entity::find()
            .filter(room_reservation::Column::FacultyId.eq(faculty_id))
            .order_by_asc(room_reservation::Column::Date)
            .order_by_asc(room_reservation::Column::StartTime)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Books a room for `actor`.
    #[instrument(skip(self, actor, input), fields(actor_id = %actor.user_id, room_id = %input.room_id))]
    pub async fn create(
        &self,
        actor: &AuthUser,
        input: CreateReservationRequest,
        now: NaiveDateTime,
    ) -> Result<room_reservation::Model, ServiceError> {
        if !actor.role.can_book() {
            return Err(ServiceError::Forbidden(
                "only faculty and administrators can reserve rooms".to_string(),
            ));
        }
        input.validate()?;
        if input.purpose.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "purpose must not be blank".to_string(),
            ));
        }
        if input.end_time <= input.start_time {
            return Err(ServiceError::ValidationError(
                "end_time must be after start_time".to_string(),
            ));
        }
        if input.date < now.date() {
            return Err(ServiceError::ValidationError(
                "cannot reserve a room for a past date".to_string(),
            ));
        }

        let db = self.db_pool.as_ref();
        room::Entity::find_by_id(input.room_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Room", input.room_id))?;

        let same_day = room_reservation::Entity::find()
            .filter(room_reservation::Column::RoomId.eq(input.room_id))
            .filter(room_reservation::Column::Date.eq(input.date))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;
        if let Some(clash) = same_day.iter().find(|existing| {
            !existing.is_completed()
                && overlaps(
                    input.start_time,
                    input.end_time,
                    existing.start_time,
                    existing.end_time,
                )
        }) {
            return Err(ServiceError::Conflict(format!(
                "room is already reserved from {} to {}",
                clash.start_time.format("%H:%M"),
                clash.end_time.format("%H:%M")
            )));
        }

        let reservation = room_reservation::ActiveModel {
            id: Set(Uuid::new_v4()),
            room_id: Set(input.room_id),
            faculty_id: Set(actor.user_id),
            faculty_name: Set(actor.display_name()),
            date: Set(input.date),
            start_time: Set(input.start_time),
            end_time: Set(input.end_time),
            purpose: Set(input.purpose.trim().to_string()),
            status: Set(ReservationStatus::Scheduled.as_str().to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        self.feed
            .notify(Table::RoomReservations, ChangeKind::Insert, reservation.id);
        counter!("campusdesk.reservations.created", 1);
        info!(reservation_id = %reservation.id, date = %reservation.date, "reservation created");

        Ok(reservation)
    }

    /// Deletes a reservation; only its owner may cancel it.
    #[instrument(skip(self, actor), fields(actor_id = %actor.user_id))]
    pub async fn cancel(&self, actor: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
        let reservation = self.get(id).await?;
        if reservation.faculty_id != actor.user_id {
            return Err(ServiceError::Forbidden(
                "only the owner can cancel a reservation".to_string(),
            ));
        }

        reservation
            .delete(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        self.feed
            .notify(Table::RoomReservations, ChangeKind::Delete, id);
        info!(reservation_id = %id, "reservation cancelled");
        Ok(())
    }

    /// Marks every reservation whose window ended by `now` as completed.
    #[instrument(skip(self))]
    pub async fn complete_elapsed(&self, now: NaiveDateTime) -> Result<u64, ServiceError> {
        let ended = Condition::any()
            .add(room_reservation::Column::Date.lt(now.date()))
            .add(
                Condition::all()
                    .add(room_reservation::Column::Date.eq(now.date()))
                    .add(room_reservation::Column::EndTime.lte(now.time())),
            );

        let result = room_reservation::Entity::update_many()
            .col_expr(
                room_reservation::Column::Status,
                Expr::value(ReservationStatus::Completed.as_str()),
            )
            .filter(room_reservation::Column::Status.ne(ReservationStatus::Completed.as_str()))
            .filter(ended)
            .exec(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        if result.rows_affected > 0 {
            debug!(count = result.rows_affected, "reservations completed");
            self.feed.publish(crate::events::ChangeEvent::new(
                Table::RoomReservations,
                ChangeKind::Update,
                None,
            ));
        }
        Ok(result.rows_affected)
    }
}

/// Delivered when a reservation is about to start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reminder {
    pub reservation_id: Uuid,
    pub room_id: Uuid,
    pub faculty_id: Uuid,
    pub faculty_name: String,
    pub purpose: String,
    pub starts_at: NaiveDateTime,
}

impl From<&room_reservation::Model> for Reminder {
    fn from(r: &room_reservation::Model) -> Self {
        Self {
            reservation_id: r.id,
            room_id: r.room_id,
            faculty_id: r.faculty_id,
            faculty_name: r.faculty_name.clone(),
            purpose: r.purpose.clone(),
            starts_at: r.date.and_time(r.start_time),
        }
    }
}

/// One-shot reminder timers. A timer, once set, is never cancelled: if the
/// reservation is edited or cancelled afterwards the reminder still fires
/// with the data captured at scheduling time.
#[derive(Clone)]
pub struct ReminderScheduler {
    lead: ChronoDuration,
    sink: mpsc::Sender<Reminder>,
    /// Armed reservations keyed by id, with their start time for pruning.
    scheduled: Arc<DashMap<Uuid, NaiveDateTime>>,
}

impl std::fmt::Debug for ReminderScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReminderScheduler")
            .field("lead", &self.lead)
            .field("scheduled", &self.scheduled.len())
            .finish()
    }
}

impl ReminderScheduler {
    pub fn new(lead: ChronoDuration, sink: mpsc::Sender<Reminder>) -> Self {
        Self {
            lead,
            sink,
            scheduled: Arc::new(DashMap::new()),
        }
    }

    pub fn is_scheduled(&self, reservation_id: Uuid) -> bool {
        self.scheduled.contains_key(&reservation_id)
    }

    /// Sets a timer for each reservation that has not started yet and has no
    /// timer already. Returns how many timers were set.
    ///
    /// Entries whose start time has passed are pruned first; a started
    /// reservation is never armed again, so its entry is no longer needed.
    pub fn schedule_for(&self, reservations: &[room_reservation::Model], now: NaiveDateTime) -> usize {
        self.scheduled.retain(|_, starts_at| *starts_at > now);

        let mut set = 0;
        for reservation in reservations {
            if reservation.is_completed() {
                continue;
            }
            let starts_at = reservation.date.and_time(reservation.start_time);
            if starts_at <= now {
                continue;
            }
            if self.scheduled.insert(reservation.id, starts_at).is_some() {
                continue;
            }

            let delay = (starts_at - self.lead - now)
                .to_std()
                .unwrap_or(std::time::Duration::ZERO);
            let reminder = Reminder::from(reservation);
            let sink = self.sink.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let reservation_id = reminder.reservation_id;
                if sink.send(reminder).await.is_err() {
                    warn!(reservation_id = %reservation_id, "reminder sink closed");
                }
            });
            set += 1;
        }
        set
    }
}

/// Logs reminders as they arrive.
pub async fn deliver_reminders(mut rx: mpsc::Receiver<Reminder>) {
    while let Some(reminder) = rx.recv().await {
        info!(
            reservation_id = %reminder.reservation_id,
            room_id = %reminder.room_id,
            faculty = %reminder.faculty_name,
            starts_at = %reminder.starts_at,
            "upcoming reservation reminder"
        );
    }
}
