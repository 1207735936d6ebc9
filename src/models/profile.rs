use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::backend::BackendError;

/// Application role. Unknown values are kept verbatim so new roles added on the
/// data side do not break profile loading.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Admin,
    Member,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::Admin => "admin",
            Role::Member => "member",
            Role::Other(value) => value,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        match value.as_str() {
            "admin" => Role::Admin,
            "member" => Role::Member,
            _ => Role::Other(value),
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Role::from(value.to_string())
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account status; an open set on the data side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AccountStatus {
    Active,
    Suspended,
    PendingVerification,
    Other(String),
}

impl AccountStatus {
    pub fn as_str(&self) -> &str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Suspended => "suspended",
            AccountStatus::PendingVerification => "pending_verification",
            AccountStatus::Other(value) => value,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, AccountStatus::Active)
    }
}

impl From<String> for AccountStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "active" => AccountStatus::Active,
            "suspended" => AccountStatus::Suspended,
            "pending_verification" => AccountStatus::PendingVerification,
            _ => AccountStatus::Other(value),
        }
    }
}

impl From<&str> for AccountStatus {
    fn from(value: &str) -> Self {
        AccountStatus::from(value.to_string())
    }
}

impl From<AccountStatus> for String {
    fn from(value: AccountStatus) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application-level record attached 1:1 to a principal through `auth_user_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Profile {
    pub id: Uuid,
    pub auth_user_id: Uuid,
    #[schema(value_type = String, example = "member")]
    pub role: Role,
    #[schema(value_type = String, example = "active")]
    pub status: AccountStatus,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct DbProfile {
    pub id: String,
    pub auth_user_id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<DbProfile> for Profile {
    type Error = BackendError;

    fn try_from(value: DbProfile) -> Result<Self, Self::Error> {
        Ok(Profile {
            id: crate::db::parse_id(&value.id)?,
            auth_user_id: crate::db::parse_id(&value.auth_user_id)?,
            role: Role::from(value.role),
            status: AccountStatus::from(value.status),
            name: value.name,
            email: value.email,
            phone: value.phone,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserAction {
    Suspend,
    Activate,
    Delete,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UserActionRequest {
    pub action: UserAction,
}
