use std::time::Duration;

use crate::errors::AppError;
use crate::session::loader::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
use crate::session::RetryPolicy;

const DEFAULT_PORT: u16 = 8000;

/// Upper bound for login to wait on the first profile resolution.
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(3);

/// How often expired client sessions are evicted.
pub const DEFAULT_SESSION_SWEEP: Duration = Duration::from_secs(60);

/// Runtime settings read from the environment (optionally via `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub profile_retry: RetryPolicy,
    pub settle_timeout: Duration,
    pub session_sweep_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            profile_retry: RetryPolicy::default(),
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
            session_sweep_interval: DEFAULT_SESSION_SWEEP,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let port = env_or("APP_PORT", DEFAULT_PORT)?;
        let max_attempts = env_or("PROFILE_RETRY_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS)?;
        let delay_ms = env_or("PROFILE_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY.as_millis() as u64)?;
        let sweep_secs = env_or("SESSION_SWEEP_SECS", DEFAULT_SESSION_SWEEP.as_secs())?;

        Ok(Self {
            port,
            profile_retry: RetryPolicy::new(max_attempts, Duration::from_millis(delay_ms)),
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
            // interval() panics on a zero period
            session_sweep_interval: Duration::from_secs(sweep_secs.max(1)),
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::configuration(format!("{key} must be a valid number"))),
        Err(_) => Ok(default),
    }
}
