use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::RoomStatus;

/// Authoritative room record. `status` is nullable: rows created before
/// status tracking carry only `is_available`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rooms")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub room_type: String,
    pub capacity: i32,
    pub floor: i32,
    pub building_id: Uuid,
    pub is_available: bool,
    pub status: Option<String>,
    pub current_occupant: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Explicit status on the row, if it holds a recognised value
    pub fn explicit_status(&self) -> Option<RoomStatus> {
        self.status.as_deref().and_then(RoomStatus::parse)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::building::Entity",
        from = "Column::BuildingId",
        to = "super::building::Column::Id"
    )]
    Building,
    #[sea_orm(has_many = "super::room_availability::Entity")]
    Availability,
    #[sea_orm(has_many = "super::room_reservation::Entity")]
    Reservations,
}

impl Related<super::building::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Building.def()
    }
}

impl Related<super::room_availability::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Availability.def()
    }
}

impl Related<super::room_reservation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reservations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
