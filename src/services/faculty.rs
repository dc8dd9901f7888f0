//! Faculty access requests and their approval.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::auth::{AuthUser, Role};
use crate::db::DbPool;
use crate::entities::{faculty_request, profile, ApprovalStatus};
use crate::errors::ServiceError;
use crate::events::{ChangeFeed, ChangeKind, Table};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[schema(example = json!({ "department": "Computer Science" }))]
pub struct SubmitFacultyRequest {
    #[validate(length(min = 1, max = 120))]
    pub department: String,
}

pub struct FacultyService {
    db_pool: Arc<DbPool>,
    feed: ChangeFeed,
}

impl FacultyService {
    pub fn new(db_pool: Arc<DbPool>, feed: ChangeFeed) -> Self {
        Self { db_pool, feed }
    }

    /// Opens a pending request for `user`. One open request per user.
    #[instrument(skip(self, user, input), fields(user_id = %user.user_id))]
    pub async fn submit(
        &self,
        user: &AuthUser,
        input: SubmitFacultyRequest,
    ) -> Result<faculty_request::Model, ServiceError> {
        input.validate()?;
        if user.role != Role::Student {
            return Err(ServiceError::InvalidOperation(format!(
                "user already has the {} role",
                user.role
            )));
        }

        let db = self.db_pool.as_ref();
        let open = faculty_request::Entity::find()
            .filter(faculty_request::Column::UserId.eq(user.user_id))
            .filter(faculty_request::Column::Status.eq(ApprovalStatus::Pending.as_str()))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if open.is_some() {
            return Err(ServiceError::Conflict(
                "a faculty request is already pending for this user".to_string(),
            ));
        }

        let profile = profile::Entity::find_by_id(user.user_id)
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        let name = profile
            .as_ref()
            .map(|p| p.full_name.clone())
            .unwrap_or_else(|| user.display_name());
        let email = profile
            .as_ref()
            .map(|p| p.email.clone())
            .or_else(|| user.email.clone())
            .unwrap_or_default();

        let request = faculty_request::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.user_id),
            name: Set(name),
            email: Set(email),
            department: Set(input.department.trim().to_string()),
            status: Set(ApprovalStatus::Pending.as_str().to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;

        self.feed
            .notify(Table::FacultyRequests, ChangeKind::Insert, request.id);
        info!(request_id = %request.id, "faculty request submitted");
        Ok(request)
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        status: Option<ApprovalStatus>,
    ) -> Result<Vec<faculty_request::Model>, ServiceError> {
        let mut query =
            faculty_request::Entity::find().order_by_desc(faculty_request::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(faculty_request::Column::Status.eq(status.as_str()));
        }
        query
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Approves a pending request and promotes the requester to faculty.
    pub async fn approve(
        &self,
        actor: &AuthUser,
        id: Uuid,
    ) -> Result<faculty_request::Model, ServiceError> {
        self.decide(actor, id, ApprovalStatus::Approved).await
    }

    pub async fn reject(
        &self,
        actor: &AuthUser,
        id: Uuid,
    ) -> Result<faculty_request::Model, ServiceError> {
        self.decide(actor, id, ApprovalStatus::Rejected).await
    }

    #[instrument(skip(self, actor), fields(actor_id = %actor.user_id))]
    async fn decide(
        &self,
        actor: &AuthUser,
        id: Uuid,
        decision: ApprovalStatus,
    ) -> Result<faculty_request::Model, ServiceError> {
        actor.require_admin()?;

        let txn = self
            .db_pool
            .begin()
            .await
            .map_err(ServiceError::db_error)?;

        let request = faculty_request::Entity::find_by_id(id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Faculty request", id))?;
        if request.status != ApprovalStatus::Pending.as_str() {
            return Err(ServiceError::InvalidOperation(format!(
                "faculty request is already {}",
                request.status
            )));
        }

        let user_id = request.user_id;
        let mut active: faculty_request::ActiveModel = request.clone().into();
        active.status = Set(decision.as_str().to_string());
        let updated = active.update(&txn).await.map_err(ServiceError::db_error)?;

        let mut profile_changed = false;
        if decision == ApprovalStatus::Approved {
            match profile::Entity::find_by_id(user_id)
                .one(&txn)
                .await
                .map_err(ServiceError::db_error)?
            {
                Some(existing) if Role::from_db(&existing.role) == Role::Student => {
                    let mut active: profile::ActiveModel = existing.into();
                    active.role = Set(Role::Faculty.as_str().to_string());
                    active.department = Set(Some(request.department.clone()));
                    active.update(&txn).await.map_err(ServiceError::db_error)?;
                    profile_changed = true;
                }
                Some(_) => {}
                None => {
                    profile::ActiveModel {
                        id: Set(user_id),
                        full_name: Set(request.name.clone()),
                        email: Set(request.email.clone()),
                        role: Set(Role::Faculty.as_str().to_string()),
                        department: Set(Some(request.department.clone())),
                        created_at: Set(Utc::now()),
                    }
                    .insert(&txn)
                    .await
                    .map_err(ServiceError::db_error)?;
                    profile_changed = true;
                }
            }
        }

        txn.commit().await.map_err(ServiceError::db_error)?;

        self.feed
            .notify(Table::FacultyRequests, ChangeKind::Update, id);
        if profile_changed {
            self.feed.notify(Table::Profiles, ChangeKind::Update, user_id);
        }
        info!(request_id = %id, decision = %decision, "faculty request decided");
        Ok(updated)
    }
}
