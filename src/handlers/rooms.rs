use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use super::reservations::ReservationSummary;
use super::wall_clock_now;
use crate::{
    auth::AuthUser,
    entities::RoomStatus,
    errors::ServiceError,
    services::{
        buildings::RoomInput,
        room_status::{RoomView, StatusChange},
    },
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({ "status": "occupied", "occupant": "Dr. Chen" }))]
pub struct UpdateRoomStatusRequest {
    pub status: RoomStatus,
    /// Name recorded as the occupant when marking a room occupied
    pub occupant: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoomOccupant {
    pub room_id: Uuid,
    pub occupant: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/rooms",
    responses(
        (status = 200, description = "Reconciled rooms", body = ApiResponse<Vec<RoomView>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "rooms"
)]
pub async fn list_rooms(
    State(state): State<AppState>,
    _user: AuthUser,
) -> ApiResult<Vec<RoomView>> {
    let rooms = state.services.room_status.list_rooms().await?;
    Ok(Json(ApiResponse::success(rooms)))
}

#[utoipa::path(
    get,
    path = "/api/v1/rooms/:id",
    params(("id" = Uuid, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Room fetched", body = ApiResponse<RoomView>),
        (status = 404, description = "Room not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "rooms"
)]
pub async fn get_room(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<RoomView> {
    let room = state.services.room_status.get_room(id).await?;
    Ok(Json(ApiResponse::success(room)))
}

#[utoipa::path(
    post,
    path = "/api/v1/rooms",
    request_body = RoomInput,
    responses(
        (status = 200, description = "Room created", body = ApiResponse<RoomView>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "rooms"
)]
pub async fn create_room(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<RoomInput>,
) -> ApiResult<RoomView> {
    let created = state.services.buildings.create_room(&user, payload).await?;
    Ok(Json(ApiResponse::success(RoomView::reconcile(&created, None))))
}

#[utoipa::path(
    put,
    path = "/api/v1/rooms/:id",
    params(("id" = Uuid, Path, description = "Room ID")),
    request_body = RoomInput,
    responses(
        (status = 200, description = "Room updated", body = ApiResponse<RoomView>),
        (status = 400, description = "Payload carries a status", body = crate::errors::ErrorResponse),
        (status = 404, description = "Room not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "rooms"
)]
pub async fn update_room(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RoomInput>,
) -> ApiResult<RoomView> {
    state
        .services
        .buildings
        .update_room(&user, id, payload)
        .await?;
    let room = state.services.room_status.get_room(id).await?;
    Ok(Json(ApiResponse::success(room)))
}

#[utoipa::path(
    delete,
    path = "/api/v1/rooms/:id",
    params(("id" = Uuid, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Room deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Room not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "rooms"
)]
pub async fn delete_room(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.services.buildings.delete_room(&user, id).await?;
    Ok(Json(ApiResponse::success(json!({ "deleted": true, "id": id }))))
}

/// Changes the status of a room. A concurrent write to the same room is
/// dropped and reported as a conflict.
#[utoipa::path(
    put,
    path = "/api/v1/rooms/:id/status",
    params(("id" = Uuid, Path, description = "Room ID")),
    request_body = UpdateRoomStatusRequest,
    responses(
        (status = 200, description = "Status applied", body = ApiResponse<RoomView>),
        (status = 403, description = "Caller is a student, or the room is under maintenance", body = crate::errors::ErrorResponse),
        (status = 404, description = "Room not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Another write for this room is in flight", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "rooms"
)]
pub async fn update_room_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateRoomStatusRequest>,
) -> ApiResult<RoomView> {
    match state
        .services
        .room_status
        .change_status(&user, id, payload.status, payload.occupant)
        .await?
    {
        StatusChange::Applied(room) => Ok(Json(ApiResponse::success(room))),
        StatusChange::Dropped => Err(ServiceError::ConcurrentModification(id)),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/rooms/:id/reservations",
    params(("id" = Uuid, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Upcoming reservations for the room", body = ApiResponse<Vec<ReservationSummary>>)
    ),
    security(("bearer_auth" = [])),
    tag = "rooms"
)]
pub async fn upcoming_reservations(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<ReservationSummary>> {
    let upcoming = state
        .services
        .reservations
        .upcoming_for_room(id, wall_clock_now())
        .await?;
    Ok(Json(ApiResponse::success(
        upcoming.into_iter().map(ReservationSummary::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/rooms/:id/occupant",
    params(("id" = Uuid, Path, description = "Room ID")),
    responses(
        (status = 200, description = "Current occupant", body = ApiResponse<RoomOccupant>),
        (status = 404, description = "Room not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "rooms"
)]
pub async fn room_occupant(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<RoomOccupant> {
    let room = state
        .services
        .room_status
        .get_room_at(id, wall_clock_now())
        .await?;
    Ok(Json(ApiResponse::success(RoomOccupant {
        room_id: id,
        occupant: room.current_occupant,
    })))
}
