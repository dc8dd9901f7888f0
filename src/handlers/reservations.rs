use axum::{
    extract::{Path, State},
    response::Json,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use super::wall_clock_now;
use crate::{
    auth::AuthUser, entities::room_reservation, services::reservations::CreateReservationRequest,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "0b6e2f4a-1c3d-4e5f-8a9b-7c6d5e4f3a21",
    "room_id": "7d9f3c1e-2b4a-4e8f-9a61-0c5d2e7b8f10",
    "faculty_id": "5a4b3c2d-1e0f-4a9b-8c7d-6e5f4a3b2c1d",
    "faculty_name": "Dr. Chen",
    "date": "2024-09-02",
    "start_time": "09:00:00",
    "end_time": "10:30:00",
    "purpose": "CS101 lecture",
    "status": "scheduled",
    "created_at": "2024-08-30T14:12:00Z"
}))]
pub struct ReservationSummary {
    pub id: Uuid,
    pub room_id: Uuid,
    pub faculty_id: Uuid,
    pub faculty_name: String,
    pub date: NaiveDate,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "10:30:00")]
    pub end_time: NaiveTime,
    pub purpose: String,
    /// scheduled or completed
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<room_reservation::Model> for ReservationSummary {
    fn from(model: room_reservation::Model) -> Self {
        Self {
            id: model.id,
            room_id: model.room_id,
            faculty_id: model.faculty_id,
            faculty_name: model.faculty_name,
            date: model.date,
            start_time: model.start_time,
            end_time: model.end_time,
            purpose: model.purpose,
            status: model.status,
            created_at: model.created_at,
        }
    }
}

/// The caller's own reservations. Fetching the list also arms reminder
/// timers for bookings that have not started yet.
#[utoipa::path(
    get,
    path = "/api/v1/reservations",
    responses(
        (status = 200, description = "Caller's reservations", body = ApiResponse<Vec<ReservationSummary>>)
    ),
    security(("bearer_auth" = [])),
    tag = "reservations"
)]
pub async fn list_my_reservations(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Vec<ReservationSummary>> {
    let reservations = state
        .services
        .reservations
        .list_for_faculty(user.user_id)
        .await?;

    let armed = state
        .services
        .reminders
        .schedule_for(&reservations, wall_clock_now());
    debug!(user_id = %user.user_id, armed, "reminder timers set");

    Ok(Json(ApiResponse::success(
        reservations.into_iter().map(ReservationSummary::from).collect(),
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/reservations",
    request_body = CreateReservationRequest,
    responses(
        (status = 200, description = "Reservation created", body = ApiResponse<ReservationSummary>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Role cannot book rooms", body = crate::errors::ErrorResponse),
        (status = 409, description = "Overlaps an existing reservation", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "reservations"
)]
pub async fn create_reservation(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateReservationRequest>,
) -> ApiResult<ReservationSummary> {
    let created = state
        .services
        .reservations
        .create(&user, payload, wall_clock_now())
        .await?;
    Ok(Json(ApiResponse::success(ReservationSummary::from(created))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/reservations/:id",
    params(("id" = Uuid, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation cancelled", body = ApiResponse<serde_json::Value>),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Reservation not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "reservations"
)]
pub async fn cancel_reservation(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.services.reservations.cancel(&user, id).await?;
    Ok(Json(ApiResponse::success(json!({ "cancelled": true, "id": id }))))
}
