//! Domain services.

// Room state
pub mod occupancy;
pub mod refresh;
pub mod room_status;

// Bookings
pub mod reservations;

// People
pub mod faculty;
pub mod users;

// Catalogue and notices
pub mod announcements;
pub mod buildings;
