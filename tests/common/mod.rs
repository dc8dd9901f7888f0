#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    Router,
};
use campusdesk_api::{
    app_router,
    auth::{AuthUser, Role},
    config::AppConfig,
    db,
    entities::{account, building, profile, room, room_availability, room_reservation},
    services::reservations::Reminder,
    AppState,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const INSTITUTIONAL_DOMAIN: &str = "campus.edu";

/// Application state backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub reminders: mpsc::Receiver<Reminder>,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        // A single connection keeps the in-memory database alive for the whole test
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;
        cfg.refetch_debounce_ms = 10;
        cfg.institutional_domain = INSTITUTIONAL_DOMAIN.to_string();

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (state, reminders) = AppState::new(Arc::new(pool), cfg);
        let router = app_router(state.clone());

        Self {
            router,
            state,
            reminders,
        }
    }

    pub fn db(&self) -> &db::DbPool {
        self.state.db.as_ref()
    }

    pub fn token_for(&self, user: &AuthUser) -> String {
        self.state
            .auth
            .issue_token(user, chrono::Duration::hours(1))
            .expect("issue test token")
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Authenticated request as `user`.
    pub async fn request_as(
        &self,
        user: &AuthUser,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let token = self.token_for(user);
        self.request(method, uri, body, Some(&token)).await
    }

    pub async fn seed_building(&self, code: &str) -> building::Model {
        building::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(format!("Building {}", code)),
            code: Set(code.to_string()),
            description: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed building")
    }

    pub async fn seed_room(
        &self,
        building_id: Uuid,
        name: &str,
        status: Option<&str>,
    ) -> room::Model {
        room::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            room_type: Set("classroom".to_string()),
            capacity: Set(40),
            floor: Set(2),
            building_id: Set(building_id),
            is_available: Set(status.map_or(true, |s| s == "available")),
            status: Set(status.map(str::to_string)),
            current_occupant: Set(None),
            updated_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed room")
    }

    pub async fn seed_log_entry(
        &self,
        room_id: Uuid,
        status: Option<&str>,
        is_available: Option<bool>,
    ) -> room_availability::Model {
        room_availability::ActiveModel {
            id: Set(Uuid::new_v4()),
            room_id: Set(room_id),
            is_available: Set(is_available),
            status: Set(status.map(str::to_string)),
            created_at: Set(Utc::now()),
            created_by: Set(None),
        }
        .insert(self.db())
        .await
        .expect("seed availability log entry")
    }

    /// Creates an account and matching profile.
    pub async fn seed_user(&self, email: &str, provider: &str, role: Role) -> AuthUser {
        let id = Uuid::new_v4();
        account::ActiveModel {
            id: Set(id),
            email: Set(email.to_string()),
            auth_provider: Set(provider.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed account");

        let name = email.split('@').next().unwrap_or(email).to_string();
        profile::ActiveModel {
            id: Set(id),
            full_name: Set(name.clone()),
            email: Set(email.to_string()),
            role: Set(role.as_str().to_string()),
            department: Set(None),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed profile");

        AuthUser::new(id, role).with_name(name).with_email(email)
    }

    pub async fn seed_reservation(
        &self,
        room_id: Uuid,
        owner: &AuthUser,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        status: &str,
    ) -> room_reservation::Model {
        room_reservation::ActiveModel {
            id: Set(Uuid::new_v4()),
            room_id: Set(room_id),
            faculty_id: Set(owner.user_id),
            faculty_name: Set(owner.display_name()),
            date: Set(date),
            start_time: Set(start),
            end_time: Set(end),
            purpose: Set("Lecture".to_string()),
            status: Set(status.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(self.db())
        .await
        .expect("seed reservation")
    }
}

pub fn admin() -> AuthUser {
    AuthUser::new(Uuid::new_v4(), Role::Admin).with_name("Ada Admin")
}

pub fn superadmin() -> AuthUser {
    AuthUser::new(Uuid::new_v4(), Role::Superadmin).with_name("Sam Super")
}

pub fn faculty(name: &str) -> AuthUser {
    AuthUser::new(Uuid::new_v4(), Role::Faculty).with_name(name)
}

pub fn student() -> AuthUser {
    AuthUser::new(Uuid::new_v4(), Role::Student).with_name("Stu Dent")
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).expect("valid time")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is json")
}
