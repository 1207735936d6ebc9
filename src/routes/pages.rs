//! Auth pages that signed-in users are bounced away from.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::access::{auth_page_redirect, AuthPage};
use crate::jwt::MaybeSession;
use crate::session::SessionSnapshot;

#[utoipa::path(
    get,
    path = "/login",
    tag = "Pages",
    responses(
        (status = 200, description = "Render the login page"),
        (status = 303, description = "Already signed in; redirect to the landing route")
    )
)]
pub async fn login_page(MaybeSession(session): MaybeSession) -> Response {
    render(AuthPage::Login, "login", snapshot_of(session))
}

#[utoipa::path(
    get,
    path = "/registro",
    tag = "Pages",
    responses(
        (status = 200, description = "Render the registration page"),
        (status = 303, description = "Already signed in; redirect to the landing route")
    )
)]
pub async fn register_page(MaybeSession(session): MaybeSession) -> Response {
    render(AuthPage::Register, "register", snapshot_of(session))
}

#[utoipa::path(
    get,
    path = "/verificar-email",
    tag = "Pages",
    responses(
        (status = 200, description = "Render the verification notice"),
        (status = 303, description = "Email already verified; redirect to the landing route")
    )
)]
pub async fn verify_email_page(MaybeSession(session): MaybeSession) -> Response {
    render(AuthPage::VerifyEmail, "verify_email", snapshot_of(session))
}

fn snapshot_of(session: Option<crate::session::ClientSession>) -> SessionSnapshot {
    match session {
        Some(session) => session.store.snapshot(),
        None => SessionSnapshot::settled(None, None),
    }
}

fn render(page: AuthPage, name: &str, snapshot: SessionSnapshot) -> Response {
    match auth_page_redirect(page, &snapshot) {
        Some(route) => (
            StatusCode::SEE_OTHER,
            [(header::LOCATION, HeaderValue::from_static(route.path()))],
            Json(json!({ "redirect": route.path() })),
        )
            .into_response(),
        None => Json(json!({
            "page": name,
            "email": snapshot.principal.as_ref().map(|p| p.email.clone()),
        }))
        .into_response(),
    }
}
