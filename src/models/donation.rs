use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::backend::BackendError;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Donation {
    pub id: Uuid,
    /// Whole ARS units.
    pub amount: i64,
    pub donor_name: String,
    pub donor_email: String,
    pub donor_phone: Option<String>,
    pub payment_method: String,
    pub operation_number: String,
    pub profile_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbDonation {
    pub id: String,
    pub amount: i64,
    pub donor_name: String,
    pub donor_email: String,
    pub donor_phone: Option<String>,
    pub payment_method: String,
    pub operation_number: String,
    pub profile_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DbDonation> for Donation {
    type Error = BackendError;

    fn try_from(value: DbDonation) -> Result<Self, Self::Error> {
        let profile_id = value
            .profile_id
            .as_deref()
            .map(crate::db::parse_id)
            .transpose()?;

        Ok(Donation {
            id: crate::db::parse_id(&value.id)?,
            amount: value.amount,
            donor_name: value.donor_name,
            donor_email: value.donor_email,
            donor_phone: value.donor_phone,
            payment_method: value.payment_method,
            operation_number: value.operation_number,
            profile_id,
            created_at: value.created_at,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DonationRequest {
    #[schema(example = 2500)]
    pub amount: i64,
    #[schema(example = "Ada")]
    pub first_name: String,
    #[schema(example = "Lovelace")]
    pub last_name: String,
    #[schema(example = "ada@example.com")]
    pub email: String,
    pub phone: Option<String>,
    #[schema(example = "mercadopago")]
    pub payment_method: String,
    #[serde(default)]
    pub accepts_terms: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DonationReceipt {
    pub donation: Donation,
    /// Where the client navigates once the external payment completes.
    #[schema(example = "/donar/exito")]
    pub redirect: String,
    pub anonymous: bool,
}
