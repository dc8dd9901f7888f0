/*!
 * # Authentication and Authorization Module
 *
 * Tokens are issued by the external identity provider; this service only
 * verifies them. A verified token yields an [`AuthUser`] carrying one of the
 * four campus roles, and the role helpers below are the only place privilege
 * tiers are compared.
 *
 * The role in the token is only a hint: the stored profile is authoritative,
 * so promotions and demotions take effect on the next request without a new
 * token. [`RoleResolver`] applies the profile role during extraction.
 */

use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::profile;
use crate::errors::ServiceError;

/// Privilege tiers, lowest first.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Student,
    Faculty,
    Admin,
    Superadmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }

    /// Unknown role strings are treated as the least privileged tier.
    pub fn from_db(value: &str) -> Self {
        value.trim().to_ascii_lowercase().parse().unwrap_or(Role::Student)
    }

    pub fn is_superadmin(&self) -> bool {
        matches!(self, Role::Superadmin)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin | Role::Superadmin)
    }

    pub fn can_book(&self) -> bool {
        matches!(self, Role::Faculty | Role::Admin | Role::Superadmin)
    }
}

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,           // Subject (user ID)
    pub name: Option<String>,  // Display name
    pub email: Option<String>, // User's email
    pub role: Role,
    pub iat: i64, // Issued at time
    pub exp: i64, // Expiration time
}

/// Authenticated user data extracted from the JWT token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Role,
}

impl AuthUser {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self {
            user_id,
            name: None,
            email: None,
            role,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn is_superadmin(&self) -> bool {
        self.role.is_superadmin()
    }

    /// Name shown on reservations; falls back to the email, then the id.
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .or_else(|| self.email.clone())
            .unwrap_or_else(|| self.user_id.to_string())
    }

    /// Faculty and above.
    pub fn require_faculty(&self) -> Result<(), ServiceError> {
        if self.role == Role::Student {
            Err(ServiceError::Forbidden(
                "faculty privileges required".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    pub fn require_admin(&self) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(
                "administrator privileges required".to_string(),
            ))
        }
    }
}

impl TryFrom<Claims> for AuthUser {
    type Error = AuthError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(Self {
            user_id,
            name: claims.name,
            email: claims.email,
            role: claims.role,
        })
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenCreation(msg) => ServiceError::InternalError(msg),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct AuthService {
    jwt_secret: String,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService").finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
        }
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        Ok(claims)
    }

    /// Signs a token for `user`. Production tokens come from the identity
    /// provider; this exists for local tooling and tests.
    pub fn issue_token(&self, user: &AuthUser, ttl: ChronoDuration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.user_id.to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Replaces the token's role with the one stored on the user's profile.
#[derive(Clone)]
pub struct RoleResolver {
    db_pool: Arc<DbPool>,
}

impl std::fmt::Debug for RoleResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleResolver").finish_non_exhaustive()
    }
}

impl RoleResolver {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Users without a profile keep the role from their token.
    pub async fn resolve(&self, mut user: AuthUser) -> Result<AuthUser, ServiceError> {
        let stored = profile::Entity::find_by_id(user.user_id)
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        if let Some(profile) = stored {
            let role = Role::from_db(&profile.role);
            if role != user.role {
                debug!(user_id = %user.user_id, token_role = %user.role, role = %role, "token role superseded by profile");
            }
            user.role = role;
            if user.name.is_none() {
                user.name = Some(profile.full_name);
            }
            if user.email.is_none() {
                user.email = Some(profile.email);
            }
        }
        Ok(user)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<AuthService>: FromRef<S>,
    RoleResolver: FromRef<S>,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth_service = Arc::<AuthService>::from_ref(state);
        let token = bearer_token(parts).ok_or(AuthError::MissingToken)?;
        let claims = auth_service.validate_token(token)?;
        let user = AuthUser::try_from(claims)?;
        let user = RoleResolver::from_ref(state).resolve(user).await?;
        debug!(user_id = %user.user_id, role = %user.role, "authenticated request");
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const SECRET: &str = "test-secret-that-is-at-least-32-characters-long";

    #[test]
    fn role_ordering_and_helpers() {
        assert!(Role::Superadmin > Role::Admin);
        assert!(Role::Admin > Role::Faculty);
        assert!(Role::Faculty > Role::Student);
        assert!(Role::Admin.is_admin());
        assert!(!Role::Admin.is_superadmin());
        assert!(!Role::Student.can_book());
        assert_eq!(Role::from_db("SuperAdmin"), Role::Superadmin);
        assert_eq!(Role::from_db("janitor"), Role::Student);
    }

    #[test]
    fn issued_token_round_trips_through_validation() {
        let service = AuthService::new(SECRET);
        let user = AuthUser::new(Uuid::new_v4(), Role::Faculty).with_name("Dr. Rivera");
        let token = service.issue_token(&user, ChronoDuration::minutes(5)).unwrap();

        let claims = service.validate_token(&token).unwrap();
        let decoded = AuthUser::try_from(claims).unwrap();
        assert_eq!(decoded.user_id, user.user_id);
        assert_eq!(decoded.role, Role::Faculty);
        assert_eq!(decoded.display_name(), "Dr. Rivera");
    }

    #[test]
    fn expired_and_foreign_tokens_are_rejected() {
        let service = AuthService::new(SECRET);
        let user = AuthUser::new(Uuid::new_v4(), Role::Student);
        let expired = service
            .issue_token(&user, ChronoDuration::minutes(-10))
            .unwrap();
        assert_matches!(service.validate_token(&expired), Err(AuthError::TokenExpired));

        let other = AuthService::new("another-secret-that-is-also-32-characters");
        let token = other.issue_token(&user, ChronoDuration::minutes(5)).unwrap();
        assert_matches!(service.validate_token(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn non_admin_is_forbidden() {
        let user = AuthUser::new(Uuid::new_v4(), Role::Faculty);
        assert_matches!(user.require_admin(), Err(ServiceError::Forbidden(_)));
        assert!(AuthUser::new(Uuid::new_v4(), Role::Admin).require_admin().is_ok());
    }

    #[test]
    fn students_fail_the_faculty_gate() {
        let student = AuthUser::new(Uuid::new_v4(), Role::Student);
        assert_matches!(student.require_faculty(), Err(ServiceError::Forbidden(_)));
        for role in [Role::Faculty, Role::Admin, Role::Superadmin] {
            assert!(AuthUser::new(Uuid::new_v4(), role).require_faculty().is_ok());
        }
    }
}
