//! Profile Loader: resolves a principal to its profile row, riding out the
//! window in which the row has not been provisioned yet.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::backend::{BackendError, ProfileSource};
use crate::events::{log_event, EventBus, EventKind};
use crate::models::profile::Profile;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(2000);

/// Bounded retry for "profile row not found yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total lookups, including the first one. Never below 1.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

/// Terminal failures of a profile load.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    #[error("profile not found after {attempts} attempts")]
    Missing { attempts: u32 },
    #[error("profile lookup failed: {0}")]
    Lookup(String),
}

/// Where a profile load currently stands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Idle,
    Fetching { attempt: u32 },
    RetryScheduled { attempt: u32 },
    Resolved,
    Failed(ProfileError),
}

impl LoadState {
    pub fn is_failed(&self) -> bool {
        matches!(self, LoadState::Failed(_))
    }
}

#[derive(Clone)]
pub struct ProfileLoader {
    source: Arc<dyn ProfileSource>,
    events: EventBus,
    policy: RetryPolicy,
}

impl ProfileLoader {
    pub fn new(source: Arc<dyn ProfileSource>, events: EventBus, policy: RetryPolicy) -> Self {
        Self { source, events, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Runs the fetch/retry state machine to a terminal outcome, reporting every
    /// intermediate state through `on_state`.
    pub async fn load<F>(&self, principal_id: Uuid, mut on_state: F) -> Result<Profile, ProfileError>
    where
        F: FnMut(LoadState) + Send,
    {
        let mut attempt = 1;
        loop {
            on_state(LoadState::Fetching { attempt });

            match self.source.select_profile(principal_id).await {
                Ok(profile) => {
                    tracing::debug!(principal_id = %principal_id, attempt, "profile loaded");
                    return Ok(profile);
                }
                Err(BackendError::NotFound) if attempt < self.policy.max_attempts => {
                    tracing::warn!(
                        principal_id = %principal_id,
                        attempt,
                        delay_ms = self.policy.delay.as_millis() as u64,
                        "profile not found, retrying"
                    );
                    on_state(LoadState::RetryScheduled { attempt });
                    tokio::time::sleep(self.policy.delay).await;
                    attempt += 1;
                }
                Err(BackendError::NotFound) => {
                    let err = ProfileError::Missing { attempts: attempt };
                    self.report(principal_id, &err);
                    return Err(err);
                }
                Err(other) => {
                    let err = ProfileError::Lookup(other.to_string());
                    self.report(principal_id, &err);
                    return Err(err);
                }
            }
        }
    }

    fn report(&self, principal_id: Uuid, err: &ProfileError) {
        tracing::error!(principal_id = %principal_id, "Error fetching user profile: {}", err);
        log_event(
            &self.events,
            EventKind::ProfileFetchFailed,
            Some(principal_id),
            format!("Error fetching profile for {principal_id}: {err}"),
        );
    }
}
