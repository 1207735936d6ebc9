use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use rand_core::OsRng;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::{AuditSink, BackendError, IdentityProvider, NewAccount, ProfileSource};
use crate::events::AuditEvent;
use crate::models::donation::{DbDonation, Donation};
use crate::models::log::{DbLogRecord, LogRecord};
use crate::models::principal::{DbAuthUser, Principal};
use crate::models::profile::{AccountStatus, DbProfile, Profile, Role};
use crate::models::submission::{
    ContactMessage, DbContactMessage, DbVolunteerApplication, VolunteerApplication,
};
use crate::utils::utc_now;

const AUTH_USER_COLUMNS: &str =
    "id, email, password_hash, full_name, email_confirmed_at, created_at, updated_at";
const PROFILE_COLUMNS: &str =
    "id, auth_user_id, name, email, phone, role, status, created_at, updated_at";
const DONATION_COLUMNS: &str =
    "id, amount, donor_name, donor_email, donor_phone, payment_method, operation_number, profile_id, created_at";

const RECOVERY_TTL_HOURS: i64 = 1;

/// SQLite-backed identity and data service.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    pool: SqlitePool,
}

#[derive(Debug, Clone)]
pub struct NewDonation {
    pub amount: i64,
    pub donor_name: String,
    pub donor_email: String,
    pub donor_phone: Option<String>,
    pub payment_method: String,
    pub operation_number: String,
    pub profile_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewContact {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct NewVolunteer {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub collaboration_type: String,
    pub area_of_interest: String,
    pub availability: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize, utoipa::ToSchema)]
pub struct Totals {
    pub users: i64,
    pub donations: i64,
    pub donated_amount: i64,
    pub contacts: i64,
    pub volunteers: i64,
}

impl SqliteBackend {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn auth_user_by_email(&self, email: &str) -> Result<Option<DbAuthUser>, BackendError> {
        let sql = format!("SELECT {AUTH_USER_COLUMNS} FROM auth_users WHERE email = ?");
        let row = sqlx::query_as::<_, DbAuthUser>(&sql)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    /// Marks the principal's email as verified and activates a profile that was
    /// waiting on verification.
    pub async fn confirm_email(&self, email: &str) -> Result<Principal, BackendError> {
        let user = self.auth_user_by_email(email).await?.ok_or(BackendError::NotFound)?;
        let now = utc_now();

        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE auth_users SET email_confirmed_at = COALESCE(email_confirmed_at, ?), updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(now)
            .bind(&user.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE profiles SET status = ?, updated_at = ? WHERE auth_user_id = ? AND status = ?")
            .bind(AccountStatus::Active.as_str())
            .bind(now)
            .bind(&user.id)
            .bind(AccountStatus::PendingVerification.as_str())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        let principal_id = crate::db::parse_id(&user.id)?;
        self.get_user(principal_id).await?.ok_or(BackendError::NotFound)
    }

    /// Newest unused recovery token for `email`; stands in for the emailed link.
    pub async fn pending_recovery_token(&self, email: &str) -> Result<String, BackendError> {
        let user = self.auth_user_by_email(email).await?.ok_or(BackendError::NotFound)?;
        let token: Option<String> = sqlx::query_scalar(
            "SELECT token FROM password_recoveries WHERE auth_user_id = ? AND used_at IS NULL AND expires_at > ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(&user.id)
        .bind(utc_now())
        .fetch_optional(&self.pool)
        .await?;
        token.ok_or(BackendError::NotFound)
    }

    pub async fn profile_by_id(&self, profile_id: Uuid) -> Result<Profile, BackendError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?");
        let row = sqlx::query_as::<_, DbProfile>(&sql)
            .bind(profile_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(BackendError::NotFound)?;
        row.try_into()
    }

    pub async fn profile_by_email(&self, email: &str) -> Result<Profile, BackendError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE email = ?");
        let row = sqlx::query_as::<_, DbProfile>(&sql)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await?
            .ok_or(BackendError::NotFound)?;
        row.try_into()
    }

    pub async fn list_profiles(&self) -> Result<Vec<Profile>, BackendError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, DbProfile>(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(Profile::try_from).collect()
    }

    pub async fn set_status(&self, profile_id: Uuid, status: &AccountStatus) -> Result<Profile, BackendError> {
        let result = sqlx::query("UPDATE profiles SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(utc_now())
            .bind(profile_id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(BackendError::NotFound);
        }
        self.profile_by_id(profile_id).await
    }

    pub async fn set_role(&self, profile_id: Uuid, role: &Role) -> Result<Profile, BackendError> {
        let result = sqlx::query("UPDATE profiles SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(utc_now())
            .bind(profile_id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(BackendError::NotFound);
        }
        self.profile_by_id(profile_id).await
    }

    pub async fn insert_donation(&self, donation: &NewDonation) -> Result<Donation, BackendError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO donations (id, amount, donor_name, donor_email, donor_phone, payment_method, operation_number, profile_id, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(donation.amount)
        .bind(&donation.donor_name)
        .bind(normalize_email(&donation.donor_email))
        .bind(&donation.donor_phone)
        .bind(&donation.payment_method)
        .bind(&donation.operation_number)
        .bind(donation.profile_id.map(|id| id.to_string()))
        .bind(utc_now())
        .execute(&self.pool)
        .await?;

        let sql = format!("SELECT {DONATION_COLUMNS} FROM donations WHERE id = ?");
        let row = sqlx::query_as::<_, DbDonation>(&sql)
            .bind(id.to_string())
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }

    pub async fn list_donations(&self) -> Result<Vec<Donation>, BackendError> {
        let sql = format!("SELECT {DONATION_COLUMNS} FROM donations ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, DbDonation>(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(Donation::try_from).collect()
    }

    pub async fn donations_for_profile(&self, profile_id: Uuid) -> Result<Vec<Donation>, BackendError> {
        let sql = format!("SELECT {DONATION_COLUMNS} FROM donations WHERE profile_id = ? ORDER BY created_at DESC");
        let rows = sqlx::query_as::<_, DbDonation>(&sql)
            .bind(profile_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Donation::try_from).collect()
    }

    pub async fn insert_contact(&self, contact: &NewContact) -> Result<ContactMessage, BackendError> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO contacts (id, name, email, phone, subject, message, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)")
            .bind(id.to_string())
            .bind(&contact.name)
            .bind(normalize_email(&contact.email))
            .bind(&contact.phone)
            .bind(&contact.subject)
            .bind(&contact.message)
            .bind(utc_now())
            .execute(&self.pool)
            .await?;

        let row = sqlx::query_as::<_, DbContactMessage>(
            "SELECT id, name, email, phone, subject, message, created_at FROM contacts WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    pub async fn list_contacts(&self) -> Result<Vec<ContactMessage>, BackendError> {
        let rows = sqlx::query_as::<_, DbContactMessage>(
            "SELECT id, name, email, phone, subject, message, created_at FROM contacts ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ContactMessage::try_from).collect()
    }

    pub async fn insert_volunteer(&self, volunteer: &NewVolunteer) -> Result<VolunteerApplication, BackendError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO volunteers (id, name, email, phone, collaboration_type, area_of_interest, availability, message, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&volunteer.name)
        .bind(normalize_email(&volunteer.email))
        .bind(&volunteer.phone)
        .bind(&volunteer.collaboration_type)
        .bind(&volunteer.area_of_interest)
        .bind(&volunteer.availability)
        .bind(&volunteer.message)
        .bind(utc_now())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, DbVolunteerApplication>(
            "SELECT id, name, email, phone, collaboration_type, area_of_interest, availability, message, created_at FROM volunteers WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    pub async fn list_volunteers(&self) -> Result<Vec<VolunteerApplication>, BackendError> {
        let rows = sqlx::query_as::<_, DbVolunteerApplication>(
            "SELECT id, name, email, phone, collaboration_type, area_of_interest, availability, message, created_at FROM volunteers ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(VolunteerApplication::try_from).collect()
    }

    /// Most recent audit entries, joined with the owner's profile when there is one.
    pub async fn recent_logs(&self, limit: i64) -> Result<Vec<LogRecord>, BackendError> {
        let rows = sqlx::query_as::<_, DbLogRecord>(
            "SELECT l.id, l.user_id, l.event_type, l.description, p.email AS user_email, p.name AS user_name, l.created_at \
             FROM logs l LEFT JOIN profiles p ON p.auth_user_id = l.user_id \
             ORDER BY l.created_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(LogRecord::try_from).collect()
    }

    pub async fn totals(&self) -> Result<Totals, BackendError> {
        let users: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM profiles").fetch_one(&self.pool).await?;
        let (donations, donated_amount): (i64, i64) =
            sqlx::query_as("SELECT COUNT(1), COALESCE(SUM(amount), 0) FROM donations")
                .fetch_one(&self.pool)
                .await?;
        let contacts: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM contacts").fetch_one(&self.pool).await?;
        let volunteers: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM volunteers").fetch_one(&self.pool).await?;

        Ok(Totals {
            users,
            donations,
            donated_amount,
            contacts,
            volunteers,
        })
    }
}

#[async_trait]
impl IdentityProvider for SqliteBackend {
    async fn get_user(&self, principal_id: Uuid) -> Result<Option<Principal>, BackendError> {
        let sql = format!("SELECT {AUTH_USER_COLUMNS} FROM auth_users WHERE id = ?");
        let row = sqlx::query_as::<_, DbAuthUser>(&sql)
            .bind(principal_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Principal::try_from).transpose()
    }

    async fn sign_up(&self, account: &NewAccount) -> Result<Principal, BackendError> {
        let email = normalize_email(&account.email);
        if self.auth_user_by_email(&email).await?.is_some() {
            return Err(BackendError::EmailTaken);
        }

        let password_hash = hash_password(&account.password)?;
        let now = utc_now();
        let principal_id = Uuid::new_v4();

        // Profile provisioning happens with the account, mirroring the hosted
        // service's new-user trigger.
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO auth_users (id, email, password_hash, full_name, email_confirmed_at, created_at, updated_at) VALUES (?, ?, ?, ?, NULL, ?, ?)",
        )
        .bind(principal_id.to_string())
        .bind(&email)
        .bind(password_hash)
        .bind(&account.full_name)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(email_taken_on_conflict)?;
        sqlx::query(
            "INSERT INTO profiles (id, auth_user_id, name, email, phone, role, status, created_at, updated_at) VALUES (?, ?, ?, ?, NULL, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(principal_id.to_string())
        .bind(&account.full_name)
        .bind(&email)
        .bind(Role::Member.as_str())
        .bind(AccountStatus::PendingVerification.as_str())
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(Principal::new(principal_id, email))
    }

    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Principal, BackendError> {
        let user = self
            .auth_user_by_email(email)
            .await?
            .ok_or(BackendError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(BackendError::InvalidCredentials);
        }

        user.try_into()
    }

    async fn sign_out(&self, principal_id: Uuid) -> Result<(), BackendError> {
        // Sessions are held by the caller; nothing to revoke server-side.
        tracing::debug!(principal_id = %principal_id, "sign out acknowledged");
        Ok(())
    }

    async fn reset_password_for_email(&self, email: &str) -> Result<(), BackendError> {
        let user = self.auth_user_by_email(email).await?.ok_or(BackendError::NotFound)?;
        let now = utc_now();

        sqlx::query("INSERT INTO password_recoveries (token, auth_user_id, expires_at, used_at, created_at) VALUES (?, ?, ?, NULL, ?)")
            .bind(Uuid::new_v4().simple().to_string())
            .bind(&user.id)
            .bind(now + chrono::Duration::hours(RECOVERY_TTL_HOURS))
            .bind(now)
            .execute(&self.pool)
            .await?;

        tracing::info!(principal_id = %user.id, "password recovery requested");
        Ok(())
    }

    async fn verify_recovery(&self, token: &str) -> Result<Principal, BackendError> {
        let now = utc_now();
        let auth_user_id: String = sqlx::query_scalar(
            "UPDATE password_recoveries SET used_at = ? WHERE token = ? AND used_at IS NULL AND expires_at > ? RETURNING auth_user_id",
        )
        .bind(now)
        .bind(token)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(BackendError::NotFound)?;

        let principal_id = crate::db::parse_id(&auth_user_id)?;
        self.get_user(principal_id).await?.ok_or(BackendError::NotFound)
    }

    async fn update_password(&self, principal_id: Uuid, password: &str) -> Result<(), BackendError> {
        let password_hash = hash_password(password)?;
        let result = sqlx::query("UPDATE auth_users SET password_hash = ?, updated_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(utc_now())
            .bind(principal_id.to_string())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(BackendError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileSource for SqliteBackend {
    async fn select_profile(&self, auth_user_id: Uuid) -> Result<Profile, BackendError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE auth_user_id = ?");
        let row = sqlx::query_as::<_, DbProfile>(&sql)
            .bind(auth_user_id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(BackendError::NotFound)?;
        row.try_into()
    }
}

#[async_trait]
impl AuditSink for SqliteBackend {
    async fn insert_log(&self, event: &AuditEvent) -> Result<(), BackendError> {
        sqlx::query("INSERT INTO logs (id, user_id, event_type, description, created_at) VALUES (?, ?, ?, ?, ?)")
            .bind(event.id.to_string())
            .bind(event.user_id.map(|id| id.to_string()))
            .bind(event.kind.as_str())
            .bind(&event.description)
            .bind(event.occurred_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> Result<String, BackendError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| BackendError::service(format!("failed to hash password: {err}")))
}

/// A concurrent sign-up can pass the existence check and still lose the race
/// on `auth_users.email`.
fn email_taken_on_conflict(err: sqlx::Error) -> BackendError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => BackendError::EmailTaken,
        _ => BackendError::Database(err),
    }
}

fn verify_password(password: &str, password_hash: &str) -> Result<bool, BackendError> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|err| BackendError::service(format!("invalid password hash: {err}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn backend() -> SqliteBackend {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::db::migrate(&pool).await.unwrap();
        SqliteBackend::new(pool)
    }

    fn account(email: &str) -> NewAccount {
        NewAccount {
            email: email.to_string(),
            password: "secret123".to_string(),
            full_name: "Ada Lovelace".to_string(),
        }
    }

    #[tokio::test]
    async fn sign_up_provisions_pending_member_profile() {
        let backend = backend().await;
        let principal = backend.sign_up(&account("Ada@Example.com")).await.unwrap();

        assert_eq!(principal.email, "ada@example.com");
        assert!(!principal.is_verified());

        let profile = backend.select_profile(principal.id).await.unwrap();
        assert_eq!(profile.auth_user_id, principal.id);
        assert_eq!(profile.role, Role::Member);
        assert_eq!(profile.status, AccountStatus::PendingVerification);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let backend = backend().await;
        backend.sign_up(&account("ada@example.com")).await.unwrap();
        let err = backend.sign_up(&account("ADA@example.com")).await.unwrap_err();
        assert!(matches!(err, BackendError::EmailTaken));
    }

    #[tokio::test]
    async fn racing_sign_ups_report_email_taken() {
        let backend = backend().await;
        let first = account("ada@example.com");
        let second = account("ada@example.com");
        let (a, b) = tokio::join!(backend.sign_up(&first), backend.sign_up(&second));

        let results = [a, b];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(BackendError::EmailTaken))));
    }

    #[tokio::test]
    async fn unique_violation_maps_to_email_taken() {
        let backend = backend().await;
        backend.sign_up(&account("ada@example.com")).await.unwrap();

        let err = sqlx::query(
            "INSERT INTO auth_users (id, email, password_hash, full_name, email_confirmed_at, created_at, updated_at) VALUES (?, ?, 'x', 'Ada', NULL, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind("ada@example.com")
        .bind(utc_now())
        .bind(utc_now())
        .execute(backend.pool())
        .await
        .unwrap_err();
        assert!(matches!(email_taken_on_conflict(err), BackendError::EmailTaken));
    }

    #[tokio::test]
    async fn sign_in_checks_password() {
        let backend = backend().await;
        let principal = backend.sign_up(&account("ada@example.com")).await.unwrap();

        let signed_in = backend.sign_in_with_password("ada@example.com", "secret123").await.unwrap();
        assert_eq!(signed_in.id, principal.id);

        let err = backend.sign_in_with_password("ada@example.com", "wrong-pass").await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidCredentials));
        let err = backend.sign_in_with_password("nobody@example.com", "secret123").await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidCredentials));
    }

    #[tokio::test]
    async fn recovery_tokens_are_single_use() {
        let backend = backend().await;
        let principal = backend.sign_up(&account("ada@example.com")).await.unwrap();

        backend.reset_password_for_email("ada@example.com").await.unwrap();
        let token = backend.pending_recovery_token("ada@example.com").await.unwrap();

        let recovered = backend.verify_recovery(&token).await.unwrap();
        assert_eq!(recovered.id, principal.id);
        assert!(backend.verify_recovery(&token).await.unwrap_err().is_not_found());

        backend.update_password(principal.id, "brand-new-pass").await.unwrap();
        backend.sign_in_with_password("ada@example.com", "brand-new-pass").await.unwrap();
    }

    #[tokio::test]
    async fn missing_profile_is_not_found_kind() {
        let backend = backend().await;
        let err = backend.select_profile(Uuid::new_v4()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn confirm_email_verifies_and_activates() {
        let backend = backend().await;
        let principal = backend.sign_up(&account("ada@example.com")).await.unwrap();

        let confirmed = backend.confirm_email("ada@example.com").await.unwrap();
        assert_eq!(confirmed.id, principal.id);
        assert!(confirmed.is_verified());
        let profile = backend.select_profile(principal.id).await.unwrap();
        assert_eq!(profile.status, AccountStatus::Active);
    }

    #[tokio::test]
    async fn confirm_email_keeps_suspension() {
        let backend = backend().await;
        let principal = backend.sign_up(&account("ada@example.com")).await.unwrap();
        let profile = backend.select_profile(principal.id).await.unwrap();
        backend.set_status(profile.id, &AccountStatus::Suspended).await.unwrap();

        backend.confirm_email("ada@example.com").await.unwrap();
        let profile = backend.select_profile(principal.id).await.unwrap();
        assert_eq!(profile.status, AccountStatus::Suspended);
    }

    #[tokio::test]
    async fn logs_join_owner_profile() {
        let backend = backend().await;
        let principal = backend.sign_up(&account("ada@example.com")).await.unwrap();

        backend
            .insert_log(&AuditEvent::new(EventKind::LoginSucceeded, Some(principal.id), "signed in"))
            .await
            .unwrap();
        backend
            .insert_log(&AuditEvent::new(EventKind::ContactSubmitted, None, "anonymous contact"))
            .await
            .unwrap();

        let logs = backend.recent_logs(100).await.unwrap();
        assert_eq!(logs.len(), 2);
        let owned = logs.iter().find(|l| l.event_type == "login_succeeded").unwrap();
        assert_eq!(owned.user_email.as_deref(), Some("ada@example.com"));
        let anonymous = logs.iter().find(|l| l.event_type == "contact_submitted").unwrap();
        assert!(anonymous.user_email.is_none());
    }

    #[tokio::test]
    async fn donations_link_to_profiles() {
        let backend = backend().await;
        let principal = backend.sign_up(&account("ada@example.com")).await.unwrap();
        let profile = backend.select_profile(principal.id).await.unwrap();

        let donation = NewDonation {
            amount: 2500,
            donor_name: "Ada Lovelace".to_string(),
            donor_email: "ada@example.com".to_string(),
            donor_phone: None,
            payment_method: "mercadopago".to_string(),
            operation_number: "MP-1".to_string(),
            profile_id: Some(profile.id),
        };
        backend.insert_donation(&donation).await.unwrap();
        backend
            .insert_donation(&NewDonation { profile_id: None, operation_number: "MP-2".to_string(), ..donation })
            .await
            .unwrap();

        assert_eq!(backend.donations_for_profile(profile.id).await.unwrap().len(), 1);
        let totals = backend.totals().await.unwrap();
        assert_eq!(totals.donations, 2);
        assert_eq!(totals.donated_amount, 5000);
        assert_eq!(totals.users, 1);
    }
}
