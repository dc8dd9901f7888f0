use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    auth::{AuthUser, Role},
    entities::profile,
    services::users::DeleteUserOutcome,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    pub role: Option<Role>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({ "role": "faculty" }))]
pub struct UpdateRoleRequest {
    pub role: Role,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileSummary {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub department: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<profile::Model> for ProfileSummary {
    fn from(model: profile::Model) -> Self {
        Self {
            id: model.id,
            full_name: model.full_name,
            email: model.email,
            role: Role::from_db(&model.role),
            department: model.department,
            created_at: model.created_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Profiles listed", body = ApiResponse<Vec<ProfileSummary>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<UserListQuery>,
) -> ApiResult<Vec<ProfileSummary>> {
    user.require_admin()?;
    let profiles = state.services.users.list_profiles(query.role).await?;
    Ok(Json(ApiResponse::success(
        profiles.into_iter().map(ProfileSummary::from).collect(),
    )))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/:id/role",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = ApiResponse<ProfileSummary>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "Profile not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoleRequest>,
) -> ApiResult<ProfileSummary> {
    let updated = state
        .services
        .users
        .set_role(&user, id, payload.role)
        .await?;
    Ok(Json(ApiResponse::success(ProfileSummary::from(updated))))
}

/// Deletes a user, or demotes them when the account is an institutional
/// Google sign-in.
#[utoipa::path(
    delete,
    path = "/api/v1/users/:id",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted or preserved", body = ApiResponse<DeleteUserOutcome>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<DeleteUserOutcome> {
    let outcome = state.services.users.delete_user(&user, id).await?;
    Ok(Json(ApiResponse::success(outcome)))
}
