//! User rights administration.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{AuthUser, Role};
use crate::db::DbPool;
use crate::entities::{account, faculty_request, profile, room_reservation};
use crate::errors::ServiceError;
use crate::events::{ChangeFeed, ChangeKind, Table};

/// Result of the delete-user function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "success": true,
    "deleted": false,
    "preserved": true,
    "message": "Institutional account preserved; role downgraded to student"
}))]
pub struct DeleteUserOutcome {
    pub success: bool,
    /// Account and related rows were removed
    pub deleted: bool,
    /// Account was kept and demoted instead
    pub preserved: bool,
    pub message: String,
}

pub struct UserAdminService {
    db_pool: Arc<DbPool>,
    feed: ChangeFeed,
    institutional_domain: String,
}

impl UserAdminService {
    pub fn new(db_pool: Arc<DbPool>, feed: ChangeFeed, institutional_domain: String) -> Self {
        Self {
            db_pool,
            feed,
            institutional_domain,
        }
    }

    #[instrument(skip(self))]
    pub async fn list_profiles(
        &self,
        role: Option<Role>,
    ) -> Result<Vec<profile::Model>, ServiceError> {
        let mut query = profile::Entity::find().order_by_asc(profile::Column::FullName);
        if let Some(role) = role {
            query = query.filter(profile::Column::Role.eq(role.as_str()));
        }
        query
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn get_profile(&self, user_id: Uuid) -> Result<profile::Model, ServiceError> {
        profile::Entity::find_by_id(user_id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Profile", user_id))
    }

    /// Admins may move users between student and faculty; granting or
    /// revoking admin or superadmin takes a superadmin.
    #[instrument(skip(self, actor), fields(actor_id = %actor.user_id))]
    pub async fn set_role(
        &self,
        actor: &AuthUser,
        user_id: Uuid,
        role: Role,
    ) -> Result<profile::Model, ServiceError> {
        actor.require_admin()?;
        let current = self.get_profile(user_id).await?;
        let current_role = Role::from_db(&current.role);

        if (role.is_admin() || current_role.is_admin()) && !actor.is_superadmin() {
            return Err(ServiceError::Forbidden(
                "only a superadmin can grant or revoke administrator roles".to_string(),
            ));
        }
        if current_role == role {
            return Ok(current);
        }

        let mut active: profile::ActiveModel = current.into();
        active.role = Set(role.as_str().to_string());
        let updated = active
            .update(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        self.feed.notify(Table::Profiles, ChangeKind::Update, user_id);
        info!(user_id = %user_id, from = %current_role, to = %role, "user role changed");
        Ok(updated)
    }

    /// Removes a user. Institutional Google accounts are never deleted; they
    /// are demoted to student instead. Any other account loses its faculty
    /// requests, profile and reservations, then the account itself.
    #[instrument(skip(self, actor), fields(actor_id = %actor.user_id))]
    pub async fn delete_user(
        &self,
        actor: &AuthUser,
        user_id: Uuid,
    ) -> Result<DeleteUserOutcome, ServiceError> {
        actor.require_admin()?;

        let txn = self
            .db_pool
            .begin()
            .await
            .map_err(ServiceError::db_error)?;

        let account = account::Entity::find_by_id(user_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("User", user_id))?;
        let profile = profile::Entity::find_by_id(user_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        if let Some(profile) = &profile {
            if Role::from_db(&profile.role).is_admin() && !actor.is_superadmin() {
                return Err(ServiceError::Forbidden(
                    "only a superadmin can remove an administrator".to_string(),
                ));
            }
        }

        if account.is_institutional(&self.institutional_domain) {
            if let Some(profile) = profile {
                let mut active: profile::ActiveModel = profile.into();
                active.role = Set(Role::Student.as_str().to_string());
                active.update(&txn).await.map_err(ServiceError::db_error)?;
            }
            txn.commit().await.map_err(ServiceError::db_error)?;

            self.feed.notify(Table::Profiles, ChangeKind::Update, user_id);
            info!(user_id = %user_id, "institutional account preserved and demoted");
            return Ok(DeleteUserOutcome {
                success: true,
                deleted: false,
                preserved: true,
                message: "Institutional account preserved; role downgraded to student".to_string(),
            });
        }

        let requests = faculty_request::Entity::delete_many()
            .filter(faculty_request::Column::UserId.eq(user_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        profile::Entity::delete_by_id(user_id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        let reservations = room_reservation::Entity::delete_many()
            .filter(room_reservation::Column::FacultyId.eq(user_id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        account::Entity::delete_by_id(user_id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        for table in [
            Table::FacultyRequests,
            Table::Profiles,
            Table::RoomReservations,
            Table::Accounts,
        ] {
            self.feed.notify(table, ChangeKind::Delete, user_id);
        }
        info!(
            user_id = %user_id,
            faculty_requests = requests.rows_affected,
            reservations = reservations.rows_affected,
            "user deleted"
        );

        Ok(DeleteUserOutcome {
            success: true,
            deleted: true,
            preserved: false,
            message: "User and related records deleted".to_string(),
        })
    }
}
