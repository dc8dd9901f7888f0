use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "CampusDesk API",
        version = "0.1.0",
        description = r#"
# CampusDesk Room Booking API

Backend for campus room booking and facility management.

## Features

- **Rooms**: reconciled room status, occupancy and upcoming reservations
- **Reservations**: booking and cancellation for faculty members
- **Faculty approvals**: request and decide faculty access
- **User rights**: role management and account removal
- **Announcements**: campus-wide notices

## Authentication

Every endpoint except health requires a JWT issued by the campus identity
provider:

```
Authorization: Bearer <your-jwt-token>
```

## Error Handling

Failures return a consistent body:

```json
{
  "error": "Forbidden",
  "message": "Forbidden: only a superadmin can change a room under maintenance",
  "timestamp": "2024-01-01T00:00:00Z"
}
```
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "rooms", description = "Room status, occupancy and catalogue"),
        (name = "buildings", description = "Building catalogue"),
        (name = "reservations", description = "Room reservations"),
        (name = "faculty", description = "Faculty access requests"),
        (name = "users", description = "User rights administration"),
        (name = "announcements", description = "Campus announcements"),
        (name = "health", description = "Health check endpoints")
    ),
    paths(
        // Rooms
        crate::handlers::rooms::list_rooms,
        crate::handlers::rooms::get_room,
        crate::handlers::rooms::create_room,
        crate::handlers::rooms::update_room,
        crate::handlers::rooms::delete_room,
        crate::handlers::rooms::update_room_status,
        crate::handlers::rooms::upcoming_reservations,
        crate::handlers::rooms::room_occupant,

        // Buildings
        crate::handlers::buildings::list_buildings,
        crate::handlers::buildings::create_building,
        crate::handlers::buildings::update_building,
        crate::handlers::buildings::delete_building,

        // Reservations
        crate::handlers::reservations::list_my_reservations,
        crate::handlers::reservations::create_reservation,
        crate::handlers::reservations::cancel_reservation,

        // Faculty requests
        crate::handlers::faculty::list_requests,
        crate::handlers::faculty::submit_request,
        crate::handlers::faculty::approve_request,
        crate::handlers::faculty::reject_request,

        // Users
        crate::handlers::users::list_users,
        crate::handlers::users::update_role,
        crate::handlers::users::delete_user,

        // Announcements
        crate::handlers::announcements::list_announcements,
        crate::handlers::announcements::create_announcement,
        crate::handlers::announcements::delete_announcement,

        // Health
        crate::handlers::health::health_check,
    ),
    components(
        schemas(
            crate::ApiResponse<serde_json::Value>,
            crate::entities::RoomStatus,
            crate::entities::ReservationStatus,
            crate::entities::ApprovalStatus,
            crate::auth::Role,
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
