pub mod announcements;
pub mod buildings;
pub mod faculty;
pub mod health;
pub mod reservations;
pub mod rooms;
pub mod users;

use chrono::{Local, NaiveDateTime};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::{ChangeFeed, InvalidationRegistry, Table};
use crate::services::{
    announcements::AnnouncementService,
    buildings::BuildingService,
    faculty::FacultyService,
    occupancy::OccupancyMonitor,
    reservations::{Reminder, ReminderScheduler, ReservationService},
    room_status::RoomStatusService,
    users::UserAdminService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub room_status: Arc<RoomStatusService>,
    pub occupancy: Arc<OccupancyMonitor>,
    pub reservations: Arc<ReservationService>,
    pub reminders: ReminderScheduler,
    pub buildings: Arc<BuildingService>,
    pub faculty: Arc<FacultyService>,
    pub users: Arc<UserAdminService>,
    pub announcements: Arc<AnnouncementService>,
}

impl AppServices {
    pub fn new(
        db_pool: Arc<DbPool>,
        feed: ChangeFeed,
        config: &AppConfig,
        reminder_sink: mpsc::Sender<Reminder>,
    ) -> Self {
        let room_status = Arc::new(RoomStatusService::new(
            db_pool.clone(),
            feed.clone(),
            config.refetch_debounce(),
        ));
        let reservations = Arc::new(ReservationService::new(db_pool.clone(), feed.clone()));
        let occupancy = Arc::new(OccupancyMonitor::new(
            db_pool.clone(),
            room_status.board().clone(),
            reservations.clone(),
            config.occupancy_poll_interval(),
        ));

        Self {
            room_status,
            occupancy,
            reservations,
            reminders: ReminderScheduler::new(config.reminder_lead(), reminder_sink),
            buildings: Arc::new(BuildingService::new(db_pool.clone(), feed.clone())),
            faculty: Arc::new(FacultyService::new(db_pool.clone(), feed.clone())),
            users: Arc::new(UserAdminService::new(
                db_pool.clone(),
                feed.clone(),
                config.institutional_domain.clone(),
            )),
            announcements: Arc::new(AnnouncementService::new(db_pool, feed)),
        }
    }

    /// Change-driven invalidation: room data changes schedule a debounced
    /// board refetch, and reservation/availability/room changes recheck
    /// occupancy.
    pub fn invalidation_registry(&self) -> InvalidationRegistry {
        let mut registry = InvalidationRegistry::new();
        for table in [Table::Rooms, Table::RoomAvailability] {
            let room_status = self.room_status.clone();
            registry.on(table, move |_| {
                let room_status = room_status.clone();
                async move { room_status.refresh().request_refetch().await }
            });
        }
        self.occupancy.register(&mut registry);
        registry
    }
}

/// Campus wall-clock time used for date/time window checks.
pub(crate) fn wall_clock_now() -> NaiveDateTime {
    Local::now().naive_local()
}
