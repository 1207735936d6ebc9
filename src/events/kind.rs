use serde::{Deserialize, Serialize};

/// Audit event types written to the `logs` table.
/// Every fallible operation has a success and a failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SignupSucceeded,
    SignupFailed,
    LoginSucceeded,
    LoginFailed,
    LogoutSucceeded,
    LogoutFailed,
    PasswordUpdated,
    PasswordUpdateFailed,
    ProfileFetchFailed,
    ContactSubmitted,
    ContactFailed,
    VolunteerSubmitted,
    VolunteerFailed,
    DonationRecorded,
    AnonymousDonationRecorded,
    DonationFailed,
    UserStatusChanged,
    UserStatusChangeFailed,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SignupSucceeded => "signup_succeeded",
            EventKind::SignupFailed => "signup_failed",
            EventKind::LoginSucceeded => "login_succeeded",
            EventKind::LoginFailed => "login_failed",
            EventKind::LogoutSucceeded => "logout_succeeded",
            EventKind::LogoutFailed => "logout_failed",
            EventKind::PasswordUpdated => "password_updated",
            EventKind::PasswordUpdateFailed => "password_update_failed",
            EventKind::ProfileFetchFailed => "profile_fetch_failed",
            EventKind::ContactSubmitted => "contact_submitted",
            EventKind::ContactFailed => "contact_failed",
            EventKind::VolunteerSubmitted => "volunteer_submitted",
            EventKind::VolunteerFailed => "volunteer_failed",
            EventKind::DonationRecorded => "donation_recorded",
            EventKind::AnonymousDonationRecorded => "anonymous_donation_recorded",
            EventKind::DonationFailed => "donation_failed",
            EventKind::UserStatusChanged => "user_status_changed",
            EventKind::UserStatusChangeFailed => "user_status_change_failed",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            EventKind::SignupFailed
                | EventKind::LoginFailed
                | EventKind::LogoutFailed
                | EventKind::PasswordUpdateFailed
                | EventKind::ProfileFetchFailed
                | EventKind::ContactFailed
                | EventKind::VolunteerFailed
                | EventKind::DonationFailed
                | EventKind::UserStatusChangeFailed
        )
    }
}
