//! CampusDesk API Library
//!
//! Room booking and facility management backend: reconciled room status,
//! reservations, faculty approvals and user rights.
#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::FromRef,
    middleware,
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::ToSchema;

use crate::auth::{AuthService, RoleResolver};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::ChangeFeed;
use crate::services::reservations::Reminder;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub feed: ChangeFeed,
    pub auth: Arc<AuthService>,
    pub roles: RoleResolver,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires services over `db`. The returned receiver yields reservation
    /// reminders as their timers fire.
    pub fn new(db: Arc<DbPool>, config: AppConfig) -> (Self, mpsc::Receiver<Reminder>) {
        let feed = ChangeFeed::new(config.change_feed_capacity);
        let (reminder_tx, reminder_rx) = mpsc::channel(256);
        let services =
            handlers::AppServices::new(db.clone(), feed.clone(), &config, reminder_tx);
        let auth = Arc::new(AuthService::new(config.jwt_secret.clone()));
        let roles = RoleResolver::new(db.clone());

        (
            Self {
                db,
                config: Arc::new(config),
                feed,
                auth,
                roles,
                services,
            },
            reminder_rx,
        )
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

impl FromRef<AppState> for RoleResolver {
    fn from_ref(state: &AppState) -> Self {
        state.roles.clone()
    }
}

#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            meta: Some(ResponseMeta::capture()),
        }
    }
}


pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

pub fn api_v1_routes() -> Router<AppState> {
    let rooms = Router::new()
        .route(
            "/rooms",
            get(handlers::rooms::list_rooms).post(handlers::rooms::create_room),
        )
        .route(
            "/rooms/:id",
            get(handlers::rooms::get_room)
                .put(handlers::rooms::update_room)
                .delete(handlers::rooms::delete_room),
        )
        .route("/rooms/:id/status", put(handlers::rooms::update_room_status))
        .route(
            "/rooms/:id/reservations",
            get(handlers::rooms::upcoming_reservations),
        )
        .route("/rooms/:id/occupant", get(handlers::rooms::room_occupant));

    let buildings = Router::new()
        .route(
            "/buildings",
            get(handlers::buildings::list_buildings).post(handlers::buildings::create_building),
        )
        .route(
            "/buildings/:id",
            put(handlers::buildings::update_building).delete(handlers::buildings::delete_building),
        );

    let reservations = Router::new()
        .route(
            "/reservations",
            get(handlers::reservations::list_my_reservations)
                .post(handlers::reservations::create_reservation),
        )
        .route(
            "/reservations/:id",
            delete(handlers::reservations::cancel_reservation),
        );

    let faculty = Router::new()
        .route(
            "/faculty-requests",
            get(handlers::faculty::list_requests).post(handlers::faculty::submit_request),
        )
        .route(
            "/faculty-requests/:id/approve",
            post(handlers::faculty::approve_request),
        )
        .route(
            "/faculty-requests/:id/reject",
            post(handlers::faculty::reject_request),
        );

    let users = Router::new()
        .route("/users", get(handlers::users::list_users))
        .route("/users/:id", delete(handlers::users::delete_user))
        .route("/users/:id/role", put(handlers::users::update_role));

    let announcements = Router::new()
        .route(
            "/announcements",
            get(handlers::announcements::list_announcements)
                .post(handlers::announcements::create_announcement),
        )
        .route(
            "/announcements/:id",
            delete(handlers::announcements::delete_announcement),
        );

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(rooms)
        .merge(buildings)
        .merge(reservations)
        .merge(faculty)
        .merge(users)
        .merge(announcements)
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<http::HeaderValue> = config
        .cors_origins()
        .iter()
        .filter_map(|origin| http::HeaderValue::from_str(origin).ok())
        .collect();

    if origins.is_empty() {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Full HTTP application: v1 API, OpenAPI document and middleware stack.
pub fn app_router(state: AppState) -> Router {
    Router::<AppState>::new()
        .route("/", get(|| async { "campusdesk-api up" }))
        .nest("/api/v1", api_v1_routes())
        .merge(openapi::swagger_ui())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(cors_layer(&state.config))
        // Ensure every request carries a request id for traceability
        .layer(middleware::from_fn(crate::tracing::request_id_middleware))
        .with_state(state)
}

pub mod prelude {
    pub use crate::auth::{AuthUser, Role};
    pub use crate::db::DbPool;
    pub use crate::entities::{ApprovalStatus, ReservationStatus, RoomStatus};
    pub use crate::errors::ServiceError;
    pub use crate::events::{ChangeEvent, ChangeFeed, ChangeKind, InvalidationRegistry, Table};
    pub use crate::services::room_status::{RoomView, StatusChange};
    pub use crate::{ApiResponse, ApiResult, AppState};
}
