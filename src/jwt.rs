use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::app::AppState;
use crate::errors::AppError;
use crate::session::ClientSession;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

impl JwtConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let exp_hours = std::env::var("JWT_EXP_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(24))
            .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a valid integer"))?;

        Ok(Self {
            secret: Arc::new(secret.into_bytes()),
            exp_hours,
        })
    }

    /// Expiry for a token issued now.
    pub fn session_expiry(&self) -> DateTime<Utc> {
        Utc::now() + Duration::hours(self.exp_hours)
    }

    /// Signs a token naming a client session, valid until `expires_at`.
    pub fn encode(&self, session_id: Uuid, expires_at: DateTime<Utc>) -> Result<String, AppError> {
        let now = Utc::now();

        let claims = Claims {
            sub: session_id,
            exp: expires_at.timestamp() as usize,
            iat: now.timestamp() as usize,
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::token(err.to_string()))
    }

    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| AppError::token(err.to_string()))
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    /// Client session id.
    pub sub: Uuid,
    pub exp: usize,
    pub iat: usize,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// The caller's client session, if the request carries a token for a live one.
///
/// No token means no session; a malformed or expired token is rejected.
pub struct MaybeSession(pub Option<ClientSession>);

#[async_trait]
impl FromRequestParts<AppState> for MaybeSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = bearer_token(parts) else {
            return Ok(MaybeSession(None));
        };

        let claims = state.jwt.decode(token)?;
        let session = state.sessions.get(claims.sub).await;
        if session.is_none() {
            tracing::debug!(session_id = %claims.sub, "token names an unknown session");
        }

        Ok(MaybeSession(session))
    }
}

/// A live client session; required.
pub struct SessionAuth(pub ClientSession);

#[async_trait]
impl FromRequestParts<AppState> for SessionAuth {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if bearer_token(parts).is_none() {
            return Err(AppError::unauthorized("Authorization header missing"));
        }

        let MaybeSession(session) = MaybeSession::from_request_parts(parts, state).await?;
        session
            .map(SessionAuth)
            .ok_or_else(|| AppError::unauthorized("session expired"))
    }
}
