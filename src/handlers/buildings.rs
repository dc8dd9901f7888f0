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
    auth::AuthUser, entities::building, services::buildings::BuildingInput, ApiResponse,
    ApiResult, AppState,
};

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "3f0c1b2a-8e7d-4c6b-9a5f-1e2d3c4b5a69",
    "name": "Science Hall",
    "code": "SCI",
    "description": "Labs and lecture theatres",
    "created_at": "2024-09-02T08:00:00Z"
}))]
pub struct BuildingSummary {
    pub id: Uuid,
    pub name: String,
    /// Short unique code
    pub code: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<building::Model> for BuildingSummary {
    fn from(model: building::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            code: model.code,
            description: model.description,
            created_at: model.created_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/buildings",
    responses(
        (status = 200, description = "Buildings listed", body = ApiResponse<Vec<BuildingSummary>>)
    ),
    security(("bearer_auth" = [])),
    tag = "buildings"
)]
pub async fn list_buildings(
    State(state): State<AppState>,
    _user: AuthUser,
) -> ApiResult<Vec<BuildingSummary>> {
    let buildings = state.services.buildings.list_buildings().await?;
    Ok(Json(ApiResponse::success(
        buildings.into_iter().map(BuildingSummary::from).collect(),
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/buildings",
    request_body = BuildingInput,
    responses(
        (status = 200, description = "Building created", body = ApiResponse<BuildingSummary>),
        (status = 409, description = "Code already in use", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "buildings"
)]
pub async fn create_building(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<BuildingInput>,
) -> ApiResult<BuildingSummary> {
    let created = state
        .services
        .buildings
        .create_building(&user, payload)
        .await?;
    Ok(Json(ApiResponse::success(BuildingSummary::from(created))))
}

#[utoipa::path(
    put,
    path = "/api/v1/buildings/:id",
    params(("id" = Uuid, Path, description = "Building ID")),
    request_body = BuildingInput,
    responses(
        (status = 200, description = "Building updated", body = ApiResponse<BuildingSummary>),
        (status = 404, description = "Building not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "buildings"
)]
pub async fn update_building(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<BuildingInput>,
) -> ApiResult<BuildingSummary> {
    let updated = state
        .services
        .buildings
        .update_building(&user, id, payload)
        .await?;
    Ok(Json(ApiResponse::success(BuildingSummary::from(updated))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/buildings/:id",
    params(("id" = Uuid, Path, description = "Building ID")),
    responses(
        (status = 200, description = "Building deleted", body = ApiResponse<serde_json::Value>),
        (status = 409, description = "Building still has rooms", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "buildings"
)]
pub async fn delete_building(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.services.buildings.delete_building(&user, id).await?;
    Ok(Json(ApiResponse::success(json!({ "deleted": true, "id": id }))))
}
