//! Per-session handle on the identity provider.
//!
//! Every successful auth operation is published as an `AuthStateChange` to the
//! handle's subscribers; the Session Store is one of them.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::backend::{BackendError, IdentityProvider, NewAccount};
use crate::events::{log_event, EventBus, EventKind};
use crate::models::principal::Principal;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventKind {
    InitialSession,
    SignedIn,
    SignedOut,
    PasswordRecovery,
    TokenRefreshed,
    UserUpdated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthStateChange {
    pub kind: AuthEventKind,
    pub principal: Option<Principal>,
}

impl AuthStateChange {
    pub fn new(kind: AuthEventKind, principal: Option<Principal>) -> Self {
        Self { kind, principal }
    }
}

/// Receiving end of `AuthClient::on_auth_state_change`. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<AuthStateChange>,
}

impl Subscription {
    /// Next change, or `None` once the client is gone.
    pub async fn recv(&mut self) -> Option<AuthStateChange> {
        loop {
            match self.rx.recv().await {
                Ok(change) => return Some(change),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "auth subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub fn unsubscribe(self) {}
}

#[derive(Clone)]
pub struct AuthClient {
    provider: Arc<dyn IdentityProvider>,
    events: EventBus,
    changes: broadcast::Sender<AuthStateChange>,
    current: Arc<Mutex<Option<Uuid>>>,
}

impl AuthClient {
    pub fn new(provider: Arc<dyn IdentityProvider>, events: EventBus) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            provider,
            events,
            changes,
            current: Arc::new(Mutex::new(None)),
        }
    }

    pub fn on_auth_state_change(&self) -> Subscription {
        Subscription {
            rx: self.changes.subscribe(),
        }
    }

    fn signed_in_as(&self) -> Option<Uuid> {
        *self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn remember(&self, principal_id: Option<Uuid>) {
        *self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = principal_id;
    }

    fn publish(&self, kind: AuthEventKind, principal: Option<Principal>) {
        // No subscriber is fine: nobody is tracking this session yet.
        let _ = self.changes.send(AuthStateChange::new(kind, principal));
    }

    /// Current principal as the provider sees it, `None` without a stored credential.
    pub async fn get_session(&self) -> Result<Option<Principal>, BackendError> {
        match self.signed_in_as() {
            Some(principal_id) => self.provider.get_user(principal_id).await,
            None => Ok(None),
        }
    }

    /// Creates an unverified account. No session is started.
    pub async fn sign_up(&self, account: &NewAccount) -> Result<Principal, BackendError> {
        match self.provider.sign_up(account).await {
            Ok(principal) => {
                log_event(
                    &self.events,
                    EventKind::SignupSucceeded,
                    Some(principal.id),
                    format!("User {} registered.", principal.email),
                );
                Ok(principal)
            }
            Err(err) => {
                log_event(
                    &self.events,
                    EventKind::SignupFailed,
                    None,
                    format!("Error registering {}: {}", account.email, err),
                );
                Err(err)
            }
        }
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Principal, BackendError> {
        match self.provider.sign_in_with_password(email, password).await {
            Ok(principal) => {
                self.remember(Some(principal.id));
                log_event(
                    &self.events,
                    EventKind::LoginSucceeded,
                    Some(principal.id),
                    format!("User {} signed in.", principal.email),
                );
                self.publish(AuthEventKind::SignedIn, Some(principal.clone()));
                Ok(principal)
            }
            Err(err) => {
                log_event(
                    &self.events,
                    EventKind::LoginFailed,
                    None,
                    format!("Login error for {email}: {err}"),
                );
                Err(err)
            }
        }
    }

    /// Signs out locally even when the provider call fails.
    pub async fn sign_out(&self) -> Result<(), BackendError> {
        let Some(principal_id) = self.signed_in_as() else {
            self.publish(AuthEventKind::SignedOut, None);
            return Ok(());
        };

        let result = self.provider.sign_out(principal_id).await;
        match &result {
            Ok(()) => log_event(
                &self.events,
                EventKind::LogoutSucceeded,
                Some(principal_id),
                format!("User {principal_id} signed out."),
            ),
            Err(err) => log_event(
                &self.events,
                EventKind::LogoutFailed,
                Some(principal_id),
                format!("Logout error for {principal_id}: {err}"),
            ),
        }

        self.remember(None);
        self.publish(AuthEventKind::SignedOut, None);
        result
    }

    /// Unknown emails are reported as success so accounts cannot be enumerated.
    pub async fn reset_password_for_email(&self, email: &str) -> Result<(), BackendError> {
        match self.provider.reset_password_for_email(email).await {
            Ok(()) | Err(BackendError::NotFound) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Completes a recovery link: the principal is signed in for the purpose of
    /// choosing a new password.
    pub async fn recover_session(&self, recovery_token: &str) -> Result<Principal, BackendError> {
        let principal = self.provider.verify_recovery(recovery_token).await?;
        self.remember(Some(principal.id));
        self.publish(AuthEventKind::PasswordRecovery, Some(principal.clone()));
        Ok(principal)
    }

    pub async fn update_password(&self, password: &str) -> Result<(), BackendError> {
        let principal_id = self.signed_in_as().ok_or(BackendError::InvalidCredentials)?;

        if let Err(err) = self.provider.update_password(principal_id, password).await {
            log_event(
                &self.events,
                EventKind::PasswordUpdateFailed,
                Some(principal_id),
                format!("Password update failed: {err}"),
            );
            return Err(err);
        }

        log_event(&self.events, EventKind::PasswordUpdated, Some(principal_id), "Password updated.");
        let principal = self.provider.get_user(principal_id).await?;
        self.publish(AuthEventKind::UserUpdated, principal);
        Ok(())
    }

    /// Re-reads the principal (e.g. after email verification) and announces it.
    pub async fn refresh_session(&self) -> Result<Option<Principal>, BackendError> {
        let Some(principal_id) = self.signed_in_as() else {
            return Ok(None);
        };

        let principal = self.provider.get_user(principal_id).await?;
        if principal.is_none() {
            self.remember(None);
            self.publish(AuthEventKind::SignedOut, None);
        } else {
            self.publish(AuthEventKind::TokenRefreshed, principal.clone());
        }
        Ok(principal)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Single-account identity provider for session tests.

    use async_trait::async_trait;

    use super::*;

    /// Knows one principal whose password is `secret123`.
    pub struct OneUser {
        pub principal: Principal,
    }

    #[async_trait]
    impl IdentityProvider for OneUser {
        async fn get_user(&self, principal_id: Uuid) -> Result<Option<Principal>, BackendError> {
            Ok((principal_id == self.principal.id).then(|| self.principal.clone()))
        }

        async fn sign_up(&self, _account: &NewAccount) -> Result<Principal, BackendError> {
            Err(BackendError::EmailTaken)
        }

        async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Principal, BackendError> {
            if email == self.principal.email && password == "secret123" {
                Ok(self.principal.clone())
            } else {
                Err(BackendError::InvalidCredentials)
            }
        }

        async fn sign_out(&self, _principal_id: Uuid) -> Result<(), BackendError> {
            Ok(())
        }

        async fn reset_password_for_email(&self, email: &str) -> Result<(), BackendError> {
            if email == self.principal.email {
                Ok(())
            } else {
                Err(BackendError::NotFound)
            }
        }

        async fn verify_recovery(&self, token: &str) -> Result<Principal, BackendError> {
            if token == "valid-token" {
                Ok(self.principal.clone())
            } else {
                Err(BackendError::NotFound)
            }
        }

        async fn update_password(&self, _principal_id: Uuid, _password: &str) -> Result<(), BackendError> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::OneUser;
    use super::*;
    use crate::events::init_event_bus;
    use chrono::Utc;

    fn client() -> (AuthClient, Principal) {
        let principal = Principal::new(Uuid::new_v4(), "ada@example.com").verified_at(Utc::now());
        let (bus, _rx) = init_event_bus();
        let provider = Arc::new(OneUser { principal: principal.clone() });
        (AuthClient::new(provider, bus), principal)
    }

    #[tokio::test]
    async fn sign_in_and_out_are_published() {
        let (client, principal) = client();
        let mut sub = client.on_auth_state_change();

        client.sign_in_with_password("ada@example.com", "secret123").await.unwrap();
        assert_eq!(client.get_session().await.unwrap(), Some(principal.clone()));
        client.sign_out().await.unwrap();
        assert_eq!(client.get_session().await.unwrap(), None);

        let first = sub.recv().await.unwrap();
        assert_eq!(first, AuthStateChange::new(AuthEventKind::SignedIn, Some(principal)));
        let second = sub.recv().await.unwrap();
        assert_eq!(second, AuthStateChange::new(AuthEventKind::SignedOut, None));
    }

    #[tokio::test]
    async fn failed_sign_in_publishes_nothing() {
        let (client, _principal) = client();
        let mut sub = client.on_auth_state_change();

        let err = client.sign_in_with_password("ada@example.com", "nope").await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidCredentials));

        drop(client);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn recovery_for_unknown_email_looks_successful() {
        let (client, _principal) = client();
        client.reset_password_for_email("ghost@example.com").await.unwrap();
    }

    #[tokio::test]
    async fn recovery_link_publishes_password_recovery() {
        let (client, _principal) = client();
        let mut sub = client.on_auth_state_change();

        assert!(client.recover_session("stale-token").await.is_err());
        client.recover_session("valid-token").await.unwrap();
        client.update_password("new-secret").await.unwrap();

        assert_eq!(sub.recv().await.unwrap().kind, AuthEventKind::PasswordRecovery);
        assert_eq!(sub.recv().await.unwrap().kind, AuthEventKind::UserUpdated);
    }

    #[tokio::test]
    async fn update_password_requires_a_session() {
        let (client, _principal) = client();
        let err = client.update_password("new-secret").await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidCredentials));
    }
}
