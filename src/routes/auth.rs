use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::access::{landing_route, Route};
use crate::app::AppState;
use crate::backend::{BackendError, NewAccount};
use crate::errors::{AppError, AppResult};
use crate::jwt::{MaybeSession, SessionAuth};
use crate::models::auth::{
    AuthResponse, LoginRequest, MessageResponse, PasswordRecoveryRequest, RecoverRequest, RegisterRequest,
    RegisterResponse, UpdatePasswordRequest,
};
use crate::session::{ClientSession, SessionSnapshot, SessionView};
use crate::utils::{require_non_empty, validate_email, validate_new_password};

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, email verification pending", body = RegisterResponse),
        (status = 400, description = "Validation failed"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<RegisterResponse>)> {
    require_non_empty("full_name", &payload.full_name)?;
    validate_email(&payload.email)?;
    validate_new_password(&payload.password, &payload.confirm_password)?;

    let account = NewAccount {
        email: payload.email.trim().to_string(),
        password: payload.password,
        full_name: payload.full_name.trim().to_string(),
    };
    let principal = state.sessions.auth_client().sign_up(&account).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            principal,
            redirect: Route::VerifyEmail.path().to_string(),
        }),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    MaybeSession(existing): MaybeSession,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    require_non_empty("email", &payload.email)?;
    require_non_empty("password", &payload.password)?;

    let opened = existing.is_none();
    let session = match existing {
        Some(session) => session,
        None => state.sessions.open().await,
    };

    let since = session.store.snapshot().generation();
    match session.client.sign_in_with_password(&payload.email, &payload.password).await {
        Ok(principal) => issue(&state, &session, since, principal.id).await.map(Json),
        Err(err) => {
            if opened {
                state.sessions.close(session.id).await;
            }
            Err(err.into())
        }
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "Auth",
    responses((status = 200, description = "Session ended", body = MessageResponse))
)]
pub async fn logout(State(state): State<AppState>, SessionAuth(session): SessionAuth) -> AppResult<Json<MessageResponse>> {
    let result = session.client.sign_out().await;
    state.sessions.close(session.id).await;
    result?;

    Ok(Json(MessageResponse::new("Logged out")))
}

#[utoipa::path(
    post,
    path = "/auth/password-recovery",
    tag = "Auth",
    request_body = PasswordRecoveryRequest,
    responses((status = 200, description = "Recovery requested", body = MessageResponse))
)]
pub async fn request_password_recovery(
    State(state): State<AppState>,
    Json(payload): Json<PasswordRecoveryRequest>,
) -> AppResult<Json<MessageResponse>> {
    validate_email(&payload.email)?;
    state
        .sessions
        .auth_client()
        .reset_password_for_email(payload.email.trim())
        .await?;

    Ok(Json(MessageResponse::new(
        "If the email is registered, a recovery link has been sent.",
    )))
}

#[utoipa::path(
    post,
    path = "/auth/recover",
    tag = "Auth",
    request_body = RecoverRequest,
    responses(
        (status = 200, description = "Recovery session started", body = AuthResponse),
        (status = 400, description = "Invalid or expired recovery token")
    )
)]
pub async fn recover(State(state): State<AppState>, Json(payload): Json<RecoverRequest>) -> AppResult<Json<AuthResponse>> {
    require_non_empty("token", &payload.token)?;

    let session = state.sessions.open().await;
    let since = session.store.snapshot().generation();
    match session.client.recover_session(payload.token.trim()).await {
        Ok(principal) => issue(&state, &session, since, principal.id).await.map(Json),
        Err(err) => {
            state.sessions.close(session.id).await;
            match err {
                BackendError::NotFound => Err(AppError::bad_request("recovery link is invalid or has expired")),
                other => Err(other.into()),
            }
        }
    }
}

#[utoipa::path(
    put,
    path = "/auth/password",
    tag = "Auth",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password updated", body = MessageResponse),
        (status = 400, description = "Validation failed")
    )
)]
pub async fn update_password(
    SessionAuth(session): SessionAuth,
    Json(payload): Json<UpdatePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    validate_new_password(&payload.password, &payload.confirm_password)?;
    session.client.update_password(&payload.password).await?;

    Ok(Json(MessageResponse::new("Password updated")))
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "Auth",
    responses((status = 200, description = "Session re-read from the identity provider", body = SessionView))
)]
pub async fn refresh(State(state): State<AppState>, SessionAuth(session): SessionAuth) -> AppResult<Json<SessionView>> {
    let since = session.store.snapshot().generation();
    let principal = session.client.refresh_session().await?;
    let snapshot = match principal {
        Some(principal) => {
            session
                .store
                .settled_since(since, Some(principal.id), state.config.settle_timeout)
                .await
        }
        // Signed out before the refresh, or the account is gone.
        None => session.store.settled(None, state.config.settle_timeout).await,
    };

    Ok(Json(SessionView::from(&snapshot)))
}

#[utoipa::path(
    get,
    path = "/auth/session",
    tag = "Auth",
    responses((status = 200, description = "Current session snapshot", body = SessionView))
)]
pub async fn session(MaybeSession(session): MaybeSession) -> Json<SessionView> {
    let snapshot = match session {
        Some(session) => session.store.snapshot(),
        None => SessionSnapshot::settled(None, None),
    };
    Json(SessionView::from(&snapshot))
}

/// Waits for the profile of `principal_id` to resolve (bounded), then signs a
/// token for the session and picks the landing route. `since` is the store
/// generation observed before the auth call.
async fn issue(state: &AppState, session: &ClientSession, since: u64, principal_id: uuid::Uuid) -> AppResult<AuthResponse> {
    let snapshot = session
        .store
        .settled_since(since, Some(principal_id), state.config.settle_timeout)
        .await;
    if snapshot.loading {
        tracing::warn!(session_id = %session.id, "profile still loading after login");
    }

    let principal = snapshot
        .principal
        .clone()
        .ok_or_else(|| AppError::internal("session lost its principal during login"))?;
    let expires_at = state.jwt.session_expiry();
    let token = state.jwt.encode(session.id, expires_at)?;
    state.sessions.extend(session.id, expires_at).await;

    Ok(AuthResponse {
        token,
        principal,
        profile: snapshot.profile.clone(),
        redirect: landing_route(&snapshot).path().to_string(),
    })
}
