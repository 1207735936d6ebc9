//! Boundary to the hosted identity-and-data service.
//!
//! The access-control core only talks to these traits; `SqliteBackend` is the
//! implementation shipped with the portal.

use async_trait::async_trait;
use uuid::Uuid;

use crate::events::AuditEvent;
use crate::models::principal::Principal;
use crate::models::profile::Profile;

mod sqlite;

pub use sqlite::{NewContact, NewDonation, NewVolunteer, SqliteBackend, Totals};

#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    /// The query matched no row. Callers may treat this as transient.
    #[error("no matching row")]
    NotFound,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("email already registered")]
    EmailTaken,
    #[error("service error: {0}")]
    Service(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl BackendError {
    pub fn service(message: impl Into<String>) -> Self {
        Self::Service(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound)
    }
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Latest view of a principal, `None` when the account no longer exists.
    async fn get_user(&self, principal_id: Uuid) -> Result<Option<Principal>, BackendError>;

    async fn sign_up(&self, account: &NewAccount) -> Result<Principal, BackendError>;

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Principal, BackendError>;

    async fn sign_out(&self, principal_id: Uuid) -> Result<(), BackendError>;

    /// Starts password recovery. `NotFound` for unknown emails.
    async fn reset_password_for_email(&self, email: &str) -> Result<(), BackendError>;

    /// Redeems a recovery token delivered out of band. Single use.
    async fn verify_recovery(&self, token: &str) -> Result<Principal, BackendError>;

    async fn update_password(&self, principal_id: Uuid, password: &str) -> Result<(), BackendError>;
}

#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Exactly one profile for `auth_user_id`, or `BackendError::NotFound`.
    async fn select_profile(&self, auth_user_id: Uuid) -> Result<Profile, BackendError>;
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn insert_log(&self, event: &AuditEvent) -> Result<(), BackendError>;
}
