use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::backend::BackendError;

/// Authenticated identity as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    /// Absent until the user follows the verification link.
    pub email_confirmed_at: Option<DateTime<Utc>>,
}

impl Principal {
    pub fn new(id: Uuid, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            email_confirmed_at: None,
        }
    }

    pub fn verified_at(mut self, at: DateTime<Utc>) -> Self {
        self.email_confirmed_at = Some(at);
        self
    }

    pub fn is_verified(&self) -> bool {
        self.email_confirmed_at.is_some()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbAuthUser {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub email_confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbAuthUser> for Principal {
    type Error = BackendError;

    fn try_from(value: DbAuthUser) -> Result<Self, Self::Error> {
        Ok(Principal {
            id: crate::db::parse_id(&value.id)?,
            email: value.email,
            email_confirmed_at: value.email_confirmed_at,
        })
    }
}
