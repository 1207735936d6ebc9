use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::backend::BackendError;

/// Audit log row joined with the owner's profile, as listed in the back-office.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LogRecord {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    #[schema(example = "login_succeeded")]
    pub event_type: String,
    pub description: String,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbLogRecord {
    pub id: String,
    pub user_id: Option<String>,
    pub event_type: String,
    pub description: String,
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbLogRecord> for LogRecord {
    type Error = BackendError;

    fn try_from(value: DbLogRecord) -> Result<Self, Self::Error> {
        Ok(LogRecord {
            id: crate::db::parse_id(&value.id)?,
            user_id: value.user_id.as_deref().map(crate::db::parse_id).transpose()?,
            event_type: value.event_type,
            description: value.description,
            user_email: value.user_email,
            user_name: value.user_name,
            created_at: value.created_at,
        })
    }
}
