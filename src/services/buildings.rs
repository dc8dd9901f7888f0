//! Building and room catalogue maintenance.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entities::{building, room, RoomStatus};
use crate::errors::ServiceError;
use crate::events::{ChangeFeed, ChangeKind, Table};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "name": "Science Hall",
    "code": "SCI",
    "description": "Labs and lecture theatres"
}))]
pub struct BuildingInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1, max = 16))]
    pub code: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "name": "SCI-204",
    "room_type": "lecture",
    "capacity": 60,
    "floor": 2,
    "building_id": "3f0c1b2a-8e7d-4c6b-9a5f-1e2d3c4b5a69"
}))]
pub struct RoomInput {
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(length(min = 1, max = 60))]
    pub room_type: String,
    #[validate(range(min = 0, max = 5000))]
    pub capacity: i32,
    pub floor: i32,
    pub building_id: Uuid,
    /// Initial status on create; rooms start available when omitted.
    /// Updates reject it.
    pub status: Option<RoomStatus>,
}

pub struct BuildingService {
    db_pool: Arc<DbPool>,
    feed: ChangeFeed,
}

impl BuildingService {
    pub fn new(db_pool: Arc<DbPool>, feed: ChangeFeed) -> Self {
        Self { db_pool, feed }
    }

    #[instrument(skip(self))]
    pub async fn list_buildings(&self) -> Result<Vec<building::Model>, ServiceError> {
        building::Entity::find()
            .order_by_asc(building::Column::Name)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    async fn find_building(&self, id: Uuid) -> Result<building::Model, ServiceError> {
        building::Entity::find_by_id(id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Building", id))
    }

    async fn ensure_code_free(&self, code: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = building::Entity::find().filter(building::Column::Code.eq(code));
        if let Some(id) = except {
            query = query.filter(building::Column::Id.ne(id));
        }
        let taken = query
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        match taken {
            Some(_) => Err(ServiceError::Conflict(format!(
                "building code {} is already in use",
                code
            ))),
            None => Ok(()),
        }
    }

    #[instrument(skip(self, actor, input), fields(actor_id = %actor.user_id))]
    pub async fn create_building(
        &self,
        actor: &AuthUser,
        input: BuildingInput,
    ) -> Result<building::Model, ServiceError> {
        actor.require_admin()?;
        input.validate()?;
        let code = input.code.trim().to_ascii_uppercase();
        self.ensure_code_free(&code, None).await?;

        let created = building::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            code: Set(code),
            description: Set(input.description),
            created_at: Set(Utc::now()),
        }
        .insert(self.db_pool.as_ref())
        .await
        .map_err(ServiceError::db_error)?;

        self.feed
            .notify(Table::Buildings, ChangeKind::Insert, created.id);
        info!(building_id = %created.id, code = %created.code, "building created");
        Ok(created)
    }

    #[instrument(skip(self, actor, input), fields(actor_id = %actor.user_id))]
    pub async fn update_building(
        &self,
        actor: &AuthUser,
        id: Uuid,
        input: BuildingInput,
    ) -> Result<building::Model, ServiceError> {
        actor.require_admin()?;
        input.validate()?;
        let existing = self.find_building(id).await?;
        let code = input.code.trim().to_ascii_uppercase();
        self.ensure_code_free(&code, Some(id)).await?;

        let mut active: building::ActiveModel = existing.into();
        active.name = Set(input.name.trim().to_string());
        active.code = Set(code);
        active.description = Set(input.description);
        let updated = active
            .update(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        self.feed.notify(Table::Buildings, ChangeKind::Update, id);
        Ok(updated)
    }

    /// Buildings that still have rooms cannot be deleted.
    #[instrument(skip(self, actor), fields(actor_id = %actor.user_id))]
    pub async fn delete_building(&self, actor: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
        actor.require_admin()?;
        let existing = self.find_building(id).await?;

        let rooms = room::Entity::find()
            .filter(room::Column::BuildingId.eq(id))
            .count(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        if rooms > 0 {
            return Err(ServiceError::Conflict(format!(
                "building still has {} room(s)",
                rooms
            )));
        }

        existing
            .delete(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        self.feed.notify(Table::Buildings, ChangeKind::Delete, id);
        info!(building_id = %id, "building deleted");
        Ok(())
    }

    #[instrument(skip(self, actor, input), fields(actor_id = %actor.user_id))]
    pub async fn create_room(
        &self,
        actor: &AuthUser,
        input: RoomInput,
    ) -> Result<room::Model, ServiceError> {
        actor.require_admin()?;
        input.validate()?;
        self.find_building(input.building_id).await?;

        let status = input.status.unwrap_or(RoomStatus::Available);
        let created = room::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.trim().to_string()),
            room_type: Set(input.room_type.trim().to_string()),
            capacity: Set(input.capacity),
            floor: Set(input.floor),
            building_id: Set(input.building_id),
            is_available: Set(status.is_available()),
            status: Set(Some(status.as_str().to_string())),
            current_occupant: Set(None),
            updated_at: Set(Utc::now()),
        }
        .insert(self.db_pool.as_ref())
        .await
        .map_err(ServiceError::db_error)?;

        self.feed.notify(Table::Rooms, ChangeKind::Insert, created.id);
        info!(room_id = %created.id, building_id = %created.building_id, "room created");
        Ok(created)
    }

    /// Updates descriptive fields. Status changes go through the room status
    /// service so that they are permission checked and logged.
    #[instrument(skip(self, actor, input), fields(actor_id = %actor.user_id))]
    pub async fn update_room(
        &self,
        actor: &AuthUser,
        id: Uuid,
        input: RoomInput,
    ) -> Result<room::Model, ServiceError> {
        actor.require_admin()?;
        input.validate()?;
        if input.status.is_some() {
            return Err(ServiceError::ValidationError(
                "status cannot be set here; use PUT /rooms/{id}/status".to_string(),
            ));
        }
        let existing = room::Entity::find_by_id(id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Room", id))?;
        if existing.building_id != input.building_id {
            self.find_building(input.building_id).await?;
        }

        let mut active: room::ActiveModel = existing.into();
        active.name = Set(input.name.trim().to_string());
        active.room_type = Set(input.room_type.trim().to_string());
        active.capacity = Set(input.capacity);
        active.floor = Set(input.floor);
        active.building_id = Set(input.building_id);
        active.updated_at = Set(Utc::now());
        let updated = active
            .update(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        self.feed.notify(Table::Rooms, ChangeKind::Update, id);
        Ok(updated)
    }

    /// Deleting a room cascades to its availability log and reservations.
    #[instrument(skip(self, actor), fields(actor_id = %actor.user_id))]
    pub async fn delete_room(&self, actor: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
        actor.require_admin()?;
        let result = room::Entity::delete_by_id(id)
            .exec(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Room", id));
        }

        self.feed.notify(Table::Rooms, ChangeKind::Delete, id);
        info!(room_id = %id, "room deleted");
        Ok(())
    }
}
