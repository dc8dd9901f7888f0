use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, ModelTrait, QueryOrder, Set};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::entities::announcement;
use crate::errors::ServiceError;
use crate::events::{ChangeFeed, ChangeKind, Table};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "title": "Library wing closed Friday",
    "body": "Rooms L101 to L120 are unavailable for maintenance."
}))]
pub struct CreateAnnouncementRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub body: String,
}

pub struct AnnouncementService {
    db_pool: Arc<DbPool>,
    feed: ChangeFeed,
}

impl AnnouncementService {
    pub fn new(db_pool: Arc<DbPool>, feed: ChangeFeed) -> Self {
        Self { db_pool, feed }
    }

    /// Newest first
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<announcement::Model>, ServiceError> {
        announcement::Entity::find()
            .order_by_desc(announcement::Column::CreatedAt)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self, actor, input), fields(actor_id = %actor.user_id))]
    pub async fn create(
        &self,
        actor: &AuthUser,
        input: CreateAnnouncementRequest,
    ) -> Result<announcement::Model, ServiceError> {
        actor.require_admin()?;
        input.validate()?;

        let created = announcement::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(input.title.trim().to_string()),
            body: Set(input.body),
            created_by: Set(actor.user_id),
            created_at: Set(Utc::now()),
        }
        .insert(self.db_pool.as_ref())
        .await
        .map_err(ServiceError::db_error)?;

        self.feed
            .notify(Table::Announcements, ChangeKind::Insert, created.id);
        info!(announcement_id = %created.id, "announcement published");
        Ok(created)
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.user_id))]
    pub async fn delete(&self, actor: &AuthUser, id: Uuid) -> Result<(), ServiceError> {
        actor.require_admin()?;
        let existing = announcement::Entity::find_by_id(id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Announcement", id))?;
        existing
            .delete(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        self.feed
            .notify(Table::Announcements, ChangeKind::Delete, id);
        Ok(())
    }
}
