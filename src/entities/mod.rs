//! sea-orm entities for the campus tables.
//!
//! `rooms`, `room_availability`, `room_reservations`, `faculty_requests`,
//! `profiles` and `announcements` mirror the hosted schema; `buildings` and
//! `accounts` back the building CRUD and the delete-user function.

pub mod account;
pub mod announcement;
pub mod building;
pub mod faculty_request;
pub mod profile;
pub mod room;
pub mod room_availability;
pub mod room_reservation;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Displayed state of a room
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RoomStatus {
    Available,
    Occupied,
    Maintenance,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Available => "available",
            RoomStatus::Occupied => "occupied",
            RoomStatus::Maintenance => "maintenance",
        }
    }

    /// Lenient parse used when reading stored rows; unknown text is treated as absent
    pub fn parse(value: &str) -> Option<Self> {
        value.trim().to_ascii_lowercase().parse().ok()
    }

    pub fn is_available(&self) -> bool {
        matches!(self, RoomStatus::Available)
    }

    pub fn from_availability(is_available: bool) -> Self {
        if is_available {
            RoomStatus::Available
        } else {
            RoomStatus::Occupied
        }
    }
}

/// Lifecycle of a room reservation
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReservationStatus {
    Scheduled,
    Completed,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Scheduled => "scheduled",
            ReservationStatus::Completed => "completed",
        }
    }
}

/// Decision state of a faculty access request
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}
