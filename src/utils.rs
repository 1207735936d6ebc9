use chrono::{DateTime, Utc};

use crate::errors::AppError;

pub const MIN_PASSWORD_LENGTH: usize = 6;

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

pub fn require_non_empty(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::bad_request(format!("{field} is required")));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    require_non_empty("email", email)?;
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AppError::bad_request("email is not valid")),
    }
}

/// Checks a new password and its confirmation before anything reaches the provider.
pub fn validate_new_password(password: &str, confirmation: &str) -> Result<(), AppError> {
    if password != confirmation {
        return Err(AppError::bad_request("passwords do not match"));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::bad_request(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_rules() {
        assert!(validate_new_password("secret", "secret").is_ok());
        assert!(validate_new_password("secret", "secreT").is_err());
        assert!(validate_new_password("abc", "abc").is_err());
    }

    #[test]
    fn email_rules() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("  ").is_err());
        assert!(validate_email("ada.example.com").is_err());
        assert!(validate_email("@example.com").is_err());
    }
}
