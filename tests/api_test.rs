mod common;

use axum::http::{Method, StatusCode};
use campusdesk_api::tracing::REQUEST_ID_HEADER;
use chrono::{Datelike, Local};
use campusdesk_api::auth::Role;
use common::{admin, faculty, json_body, student, superadmin, TestApp};
use serde_json::json;
use uuid::Uuid;

#[tokio::test]
async fn health_is_public_and_reports_database() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "up");
    assert_eq!(body["database"], "up");
}

#[tokio::test]
async fn api_requires_a_valid_bearer_token() {
    let app = TestApp::new().await;

    let missing = app.request(Method::GET, "/api/v1/rooms", None, None).await;
    assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

    let garbage = app
        .request(Method::GET, "/api/v1/rooms", None, Some("not-a-jwt"))
        .await;
    assert_eq!(garbage.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(garbage).await;
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn request_id_is_echoed() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/v1/health", None, None).await;
    assert!(response.headers().get(REQUEST_ID_HEADER).is_some());
}

#[tokio::test]
async fn admin_builds_out_a_building_and_lists_rooms() {
    let app = TestApp::new().await;
    let admin = admin();

    let response = app
        .request_as(
            &admin,
            Method::POST,
            "/api/v1/buildings",
            Some(json!({ "name": "Science Hall", "code": "sci" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["code"], "SCI");
    let building_id = body["data"]["id"].as_str().unwrap().to_string();

    let duplicate = app
        .request_as(
            &admin,
            Method::POST,
            "/api/v1/buildings",
            Some(json!({ "name": "Other", "code": "SCI" })),
        )
        .await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let response = app
        .request_as(
            &admin,
            Method::POST,
            "/api/v1/rooms",
            Some(json!({
                "name": "SCI-204",
                "room_type": "lecture",
                "capacity": 60,
                "floor": 2,
                "building_id": building_id,
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request_as(&student(), Method::GET, "/api/v1/rooms", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let rooms = body["data"].as_array().unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0]["name"], "SCI-204");
    assert_eq!(rooms[0]["status"], "available");
    assert_eq!(rooms[0]["is_available"], true);

    let blocked = app
        .request_as(
            &admin,
            Method::DELETE,
            &format!("/api/v1/buildings/{}", building_id),
            None,
        )
        .await;
    assert_eq!(blocked.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn students_cannot_manage_buildings() {
    let app = TestApp::new().await;
    let response = app
        .request_as(
            &student(),
            Method::POST,
            "/api/v1/buildings",
            Some(json!({ "name": "Nope", "code": "NO" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn concurrent_status_write_is_reported_as_conflict() {
    let app = TestApp::new().await;
    let building = app.seed_building("ENG").await;
    let room = app.seed_room(building.id, "ENG-1", Some("available")).await;

    let _guard = app
        .state
        .services
        .room_status
        .in_flight()
        .try_acquire(room.id)
        .unwrap();

    let response = app
        .request_as(
            &admin(),
            Method::PUT,
            &format!("/api/v1/rooms/{}/status", room.id),
            Some(json!({ "status": "occupied" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn maintenance_lock_is_enforced_over_http() {
    let app = TestApp::new().await;
    let building = app.seed_building("ENG").await;
    let room = app.seed_room(building.id, "ENG-2", Some("maintenance")).await;
    let uri = format!("/api/v1/rooms/{}/status", room.id);

    let response = app
        .request_as(&admin(), Method::PUT, &uri, Some(json!({ "status": "available" })))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request_as(
            &superadmin(),
            Method::PUT,
            &uri,
            Some(json!({ "status": "available" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["status"], "available");
}

#[tokio::test]
async fn booking_flow_arms_reminders() {
    let app = TestApp::new().await;
    let building = app.seed_building("LIB").await;
    let room = app.seed_room(building.id, "LIB-3", None).await;
    let booker = faculty("Dr. Curie");
    let next_year = Local::now().year() + 1;

    let response = app
        .request_as(
            &booker,
            Method::POST,
            "/api/v1/reservations",
            Some(json!({
                "room_id": room.id,
                "date": format!("{}-06-01", next_year),
                "start_time": "09:00:00",
                "end_time": "10:00:00",
                "purpose": "Office hours",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["faculty_name"], "Dr. Curie");
    let reservation_id: Uuid = body["data"]["id"].as_str().unwrap().parse().unwrap();

    let response = app
        .request_as(&booker, Method::GET, "/api/v1/reservations", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert!(app.state.services.reminders.is_scheduled(reservation_id));

    let response = app
        .request_as(
            &faculty("Dr. Other"),
            Method::DELETE,
            &format!("/api/v1/reservations/{}", reservation_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request_as(
            &booker,
            Method::DELETE,
            &format!("/api/v1/reservations/{}", reservation_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn students_are_refused_bookings() {
    let app = TestApp::new().await;
    let building = app.seed_building("LIB").await;
    let room = app.seed_room(building.id, "LIB-4", None).await;

    let response = app
        .request_as(
            &student(),
            Method::POST,
            "/api/v1/reservations",
            Some(json!({
                "room_id": room.id,
                "date": "2099-01-01",
                "start_time": "09:00:00",
                "end_time": "10:00:00",
                "purpose": "Study group",
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_room_is_not_found() {
    let app = TestApp::new().await;
    let response = app
        .request_as(
            &student(),
            Method::GET,
            &format!("/api/v1/rooms/{}", Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Not Found");
}

#[tokio::test]
async fn announcements_are_admin_authored() {
    let app = TestApp::new().await;
    let payload = json!({ "title": "Closure", "body": "Library closed Friday" });

    let refused = app
        .request_as(&faculty("Dr. X"), Method::POST, "/api/v1/announcements", Some(payload.clone()))
        .await;
    assert_eq!(refused.status(), StatusCode::FORBIDDEN);

    let created = app
        .request_as(&admin(), Method::POST, "/api/v1/announcements", Some(payload))
        .await;
    assert_eq!(created.status(), StatusCode::OK);

    let listed = app
        .request_as(&student(), Method::GET, "/api/v1/announcements", None)
        .await;
    let body = json_body(listed).await;
    assert_eq!(body["data"][0]["title"], "Closure");
}

#[tokio::test]
async fn demoted_admin_loses_admin_routes_despite_old_token() {
    let app = TestApp::new().await;
    // Token still claims admin; only the stored profile changes
    let ex_admin = app.seed_user("former@gmail.com", "email", Role::Admin).await;
    let target = app.seed_user("bystander@gmail.com", "email", Role::Student).await;

    let before = app
        .request_as(&ex_admin, Method::GET, "/api/v1/users", None)
        .await;
    assert_eq!(before.status(), StatusCode::OK);

    let demoted = app
        .request_as(
            &superadmin(),
            Method::PUT,
            &format!("/api/v1/users/{}/role", ex_admin.user_id),
            Some(json!({ "role": "student" })),
        )
        .await;
    assert_eq!(demoted.status(), StatusCode::OK);

    let listing = app
        .request_as(&ex_admin, Method::GET, "/api/v1/users", None)
        .await;
    assert_eq!(listing.status(), StatusCode::FORBIDDEN);

    let delete = app
        .request_as(
            &ex_admin,
            Method::DELETE,
            &format!("/api/v1/users/{}", target.user_id),
            None,
        )
        .await;
    assert_eq!(delete.status(), StatusCode::FORBIDDEN);

    let profile = app
        .state
        .services
        .users
        .get_profile(target.user_id)
        .await
        .expect("target survives");
    assert_eq!(profile.role, "student");
}

#[tokio::test]
async fn approved_faculty_can_book_with_their_student_token() {
    let app = TestApp::new().await;
    let building = app.seed_building("BIO").await;
    let room = app.seed_room(building.id, "BIO-101", None).await;
    let applicant = app
        .seed_user("lecturer@campus.edu", "google", Role::Student)
        .await;
    let booking = json!({
        "room_id": room.id,
        "date": format!("{}-03-10", Local::now().year() + 1),
        "start_time": "13:00:00",
        "end_time": "14:00:00",
        "purpose": "Lab induction",
    });

    let refused = app
        .request_as(&applicant, Method::POST, "/api/v1/reservations", Some(booking.clone()))
        .await;
    assert_eq!(refused.status(), StatusCode::FORBIDDEN);

    let submitted = app
        .request_as(
            &applicant,
            Method::POST,
            "/api/v1/faculty-requests",
            Some(json!({ "department": "Biology" })),
        )
        .await;
    assert_eq!(submitted.status(), StatusCode::OK);
    let body = json_body(submitted).await;
    let request_id = body["data"]["id"].as_str().unwrap().to_string();

    let approved = app
        .request_as(
            &admin(),
            Method::POST,
            &format!("/api/v1/faculty-requests/{}/approve", request_id),
            None,
        )
        .await;
    assert_eq!(approved.status(), StatusCode::OK);

    // Same token as before, still carrying the student claim
    let booked = app
        .request_as(&applicant, Method::POST, "/api/v1/reservations", Some(booking))
        .await;
    assert_eq!(booked.status(), StatusCode::OK);
    let body = json_body(booked).await;
    assert_eq!(body["data"]["faculty_id"], applicant.user_id.to_string());
}

#[tokio::test]
async fn room_status_cannot_be_smuggled_through_room_update() {
    let app = TestApp::new().await;
    let building = app.seed_building("GYM").await;
    let court = app.seed_room(building.id, "Court", Some("available")).await;
    let uri = format!("/api/v1/rooms/{}", court.id);
    let mut payload = json!({
        "name": "Court A",
        "room_type": "sports",
        "capacity": 40,
        "floor": 0,
        "building_id": building.id,
        "status": "maintenance",
    });

    let rejected = app
        .request_as(&admin(), Method::PUT, &uri, Some(payload.clone()))
        .await;
    assert_eq!(rejected.status(), StatusCode::BAD_REQUEST);

    payload.as_object_mut().unwrap().remove("status");
    let renamed = app
        .request_as(&admin(), Method::PUT, &uri, Some(payload))
        .await;
    assert_eq!(renamed.status(), StatusCode::OK);

    let response = app.request_as(&admin(), Method::GET, &uri, None).await;
    let body = json_body(response).await;
    assert_eq!(body["data"]["name"], "Court A");
    assert_eq!(body["data"]["status"], "available");
}

#[tokio::test]
async fn students_cannot_change_room_status_over_http() {
    let app = TestApp::new().await;
    let building = app.seed_building("GYM").await;
    let pool = app.seed_room(building.id, "Pool", Some("available")).await;
    let uri = format!("/api/v1/rooms/{}/status", pool.id);

    let response = app
        .request_as(&student(), Method::PUT, &uri, Some(json!({ "status": "occupied" })))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request_as(&faculty("Coach"), Method::PUT, &uri, Some(json!({ "status": "occupied" })))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}
