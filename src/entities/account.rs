use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sign-in provider recorded for an account
pub const PROVIDER_GOOGLE: &str = "google";
pub const PROVIDER_EMAIL: &str = "email";

/// Identity record owned by the external auth provider
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub email: String,
    pub auth_provider: String,
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// Google sign-in on the institution's own domain
    pub fn is_institutional(&self, institutional_domain: &str) -> bool {
        let domain_matches = self
            .email
            .rsplit_once('@')
            .map(|(_, domain)| domain.eq_ignore_ascii_case(institutional_domain))
            .unwrap_or(false);
        self.auth_provider.eq_ignore_ascii_case(PROVIDER_GOOGLE) && domain_matches
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
