use axum::{
    extract::{Path, Query, State},
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::{faculty_request, ApprovalStatus},
    services::faculty::SubmitFacultyRequest,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FacultyRequestQuery {
    /// pending, approved or rejected
    pub status: Option<ApprovalStatus>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FacultyRequestSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub department: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<faculty_request::Model> for FacultyRequestSummary {
    fn from(model: faculty_request::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            name: model.name,
            email: model.email,
            department: model.department,
            status: model.status,
            created_at: model.created_at,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/faculty-requests",
    params(FacultyRequestQuery),
    responses(
        (status = 200, description = "Faculty requests listed", body = ApiResponse<Vec<FacultyRequestSummary>>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "faculty"
)]
pub async fn list_requests(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<FacultyRequestQuery>,
) -> ApiResult<Vec<FacultyRequestSummary>> {
    user.require_admin()?;
    let requests = state.services.faculty.list(query.status).await?;
    Ok(Json(ApiResponse::success(
        requests.into_iter().map(FacultyRequestSummary::from).collect(),
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/faculty-requests",
    request_body = SubmitFacultyRequest,
    responses(
        (status = 200, description = "Request submitted", body = ApiResponse<FacultyRequestSummary>),
        (status = 409, description = "A request is already pending", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "faculty"
)]
pub async fn submit_request(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<SubmitFacultyRequest>,
) -> ApiResult<FacultyRequestSummary> {
    let request = state.services.faculty.submit(&user, payload).await?;
    Ok(Json(ApiResponse::success(FacultyRequestSummary::from(request))))
}

#[utoipa::path(
    post,
    path = "/api/v1/faculty-requests/:id/approve",
    params(("id" = Uuid, Path, description = "Faculty request ID")),
    responses(
        (status = 200, description = "Request approved", body = ApiResponse<FacultyRequestSummary>),
        (status = 400, description = "Request already decided", body = crate::errors::ErrorResponse),
        (status = 404, description = "Request not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "faculty"
)]
pub async fn approve_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<FacultyRequestSummary> {
    let request = state.services.faculty.approve(&user, id).await?;
    Ok(Json(ApiResponse::success(FacultyRequestSummary::from(request))))
}

#[utoipa::path(
    post,
    path = "/api/v1/faculty-requests/:id/reject",
    params(("id" = Uuid, Path, description = "Faculty request ID")),
    responses(
        (status = 200, description = "Request rejected", body = ApiResponse<FacultyRequestSummary>),
        (status = 400, description = "Request already decided", body = crate::errors::ErrorResponse),
        (status = 404, description = "Request not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "faculty"
)]
pub async fn reject_request(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<FacultyRequestSummary> {
    let request = state.services.faculty.reject(&user, id).await?;
    Ok(Json(ApiResponse::success(FacultyRequestSummary::from(request))))
}
