use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::backend::BackendError;

pub const VOLUNTEERING: &str = "volunteering";

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContactMessage {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbContactMessage {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbContactMessage> for ContactMessage {
    type Error = BackendError;

    fn try_from(value: DbContactMessage) -> Result<Self, Self::Error> {
        Ok(ContactMessage {
            id: crate::db::parse_id(&value.id)?,
            name: value.name,
            email: value.email,
            phone: value.phone,
            subject: value.subject,
            message: value.message,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VolunteerApplication {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub collaboration_type: String,
    pub area_of_interest: String,
    pub availability: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbVolunteerApplication {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub collaboration_type: String,
    pub area_of_interest: String,
    pub availability: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbVolunteerApplication> for VolunteerApplication {
    type Error = BackendError;

    fn try_from(value: DbVolunteerApplication) -> Result<Self, Self::Error> {
        Ok(VolunteerApplication {
            id: crate::db::parse_id(&value.id)?,
            name: value.name,
            email: value.email,
            phone: value.phone,
            collaboration_type: value.collaboration_type,
            area_of_interest: value.area_of_interest,
            availability: value.availability,
            message: value.message,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ContactRequest {
    #[schema(example = "Ada")]
    pub first_name: String,
    #[schema(example = "Lovelace")]
    pub last_name: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
    pub phone: Option<String>,
    #[schema(example = "Voluntariado")]
    pub subject: String,
    pub message: String,
    #[serde(default)]
    pub accepts_policy: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VolunteerRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    #[schema(example = "education")]
    pub area_of_interest: String,
    #[schema(example = "weekends")]
    pub availability: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Submissions {
    pub contacts: Vec<ContactMessage>,
    pub volunteers: Vec<VolunteerApplication>,
}

/// "Ada" + "Lovelace" -> "Ada Lovelace", tolerating an empty last name.
pub fn full_name(first: &str, last: &str) -> String {
    format!("{} {}", first.trim(), last.trim()).trim().to_string()
}
