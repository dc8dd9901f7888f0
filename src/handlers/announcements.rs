use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AuthUser, entities::announcement,
    services::announcements::CreateAnnouncementRequest, ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct AnnouncementSummary {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<announcement::Model> for AnnouncementSummary {
    fn from(model: announcement::Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            body: model.body,
            created_by: model.created_by,
            created_at: model.created_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/announcements",
    responses(
        (status = 200, description = "Announcements, newest first", body = ApiResponse<Vec<AnnouncementSummary>>)
    ),
    security(("bearer_auth" = [])),
    tag = "announcements"
)]
pub async fn list_announcements(
    State(state): State<AppState>,
    _user: AuthUser,
) -> ApiResult<Vec<AnnouncementSummary>> {
    let items = state.services.announcements.list().await?;
    Ok(Json(ApiResponse::success(
        items.into_iter().map(AnnouncementSummary::from).collect(),
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/announcements",
    request_body = CreateAnnouncementRequest,
    responses(
        (status = 200, description = "Announcement published", body = ApiResponse<AnnouncementSummary>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "announcements"
)]
pub async fn create_announcement(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateAnnouncementRequest>,
) -> ApiResult<AnnouncementSummary> {
    let created = state.services.announcements.create(&user, payload).await?;
    Ok(Json(ApiResponse::success(AnnouncementSummary::from(created))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/announcements/:id",
    params(("id" = Uuid, Path, description = "Announcement ID")),
    responses(
        (status = 200, description = "Announcement deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Announcement not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "announcements"
)]
pub async fn delete_announcement(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.services.announcements.delete(&user, id).await?;
    Ok(Json(ApiResponse::success(json!({ "deleted": true, "id": id }))))
}
