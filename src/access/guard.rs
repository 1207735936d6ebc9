//! Route Guards: enforce a verdict for a protected area.
//!
//! `MemberArea` and `AdminArea` are extractors; a handler taking one of them
//! only runs when the verdict is `Allowed`. Every other verdict becomes a
//! `GuardRejection`: a loading response, or a redirect carrying at most one
//! notification describing the reason.

use axum::async_trait;
use axum::extract::{FromRequestParts, OriginalUri};
use axum::http::request::Parts;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use super::{decide, Area, Route, Verdict};
use crate::app::AppState;
use crate::errors::AppError;
use crate::jwt::MaybeSession;
use crate::session::{ClientSession, SessionSnapshot};

const RETRY_AFTER_SECS: &str = "1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Destructive,
}

/// User-facing message shown alongside a redirect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub duration_ms: u32,
}

impl Notification {
    fn new(title: &str, description: impl Into<String>, severity: Severity, duration_ms: u32) -> Self {
        Self {
            title: title.to_string(),
            description: description.into(),
            severity,
            duration_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome {
    Render,
    Wait,
    Redirect {
        to: Route,
        notification: Option<Notification>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guard {
    area: Area,
}

impl Guard {
    pub const fn member() -> Self {
        Self { area: Area::Member }
    }

    pub const fn admin() -> Self {
        Self { area: Area::Admin }
    }

    pub fn area(&self) -> Area {
        self.area
    }

    pub fn evaluate(&self, snapshot: &SessionSnapshot) -> GuardOutcome {
        let verdict = decide(snapshot, self.area);
        self.enforce(&verdict)
    }

    pub fn enforce(&self, verdict: &Verdict) -> GuardOutcome {
        let place = match self.area {
            Area::Member => "this page",
            Area::Admin => "the admin panel",
        };

        match verdict {
            Verdict::Allowed => GuardOutcome::Render,
            Verdict::Pending => GuardOutcome::Wait,
            Verdict::Unauthenticated => GuardOutcome::Redirect {
                to: Route::Login,
                notification: None,
            },
            Verdict::EmailUnverified => GuardOutcome::Redirect {
                to: Route::Home,
                notification: Some(Notification::new(
                    "Verify your email",
                    format!("Please verify your email address to access {place}. Check your inbox."),
                    Severity::Info,
                    8000,
                )),
            },
            Verdict::ProfileUnavailable => GuardOutcome::Redirect {
                to: Route::Login,
                notification: Some(Notification::new(
                    "Something went wrong",
                    "We could not load your profile. Please sign in again.",
                    Severity::Destructive,
                    8000,
                )),
            },
            Verdict::AccountInactive { status } => {
                let description = match self.area {
                    Area::Member => format!(
                        "Your account is currently {status}. Please contact support if you think this is a mistake."
                    ),
                    Area::Admin => format!("Your account is currently {status}. You cannot access the admin panel."),
                };
                GuardOutcome::Redirect {
                    to: Route::inactive_landing(),
                    notification: Some(Notification::new(
                        "Account inactive",
                        description,
                        Severity::Destructive,
                        8000,
                    )),
                }
            }
            Verdict::InsufficientRole => GuardOutcome::Redirect {
                to: Route::Panel,
                notification: Some(Notification::new(
                    "Access denied",
                    "You do not have permission to access this page.",
                    Severity::Destructive,
                    5000,
                )),
            },
        }
    }

    async fn check(&self, parts: &mut Parts, state: &AppState) -> Result<Granted, GuardRejection> {
        let MaybeSession(session) = MaybeSession::from_request_parts(parts, state)
            .await
            .map_err(GuardRejection::Error)?;

        let snapshot = match &session {
            Some(session) => session.store.snapshot(),
            None => SessionSnapshot::settled(None, None),
        };
        let verdict = decide(&snapshot, self.area);

        match (self.enforce(&verdict), session) {
            (GuardOutcome::Render, Some(session)) => Ok(Granted { session, snapshot }),
            (GuardOutcome::Render, None) => Err(GuardRejection::redirect(Route::Login, parts, None)),
            (GuardOutcome::Wait, _) => {
                tracing::debug!(area = ?self.area, "session still loading");
                Err(GuardRejection::Wait)
            }
            (GuardOutcome::Redirect { to, notification }, session) => {
                tracing::info!(
                    area = ?self.area,
                    verdict = ?verdict,
                    session_id = ?session.as_ref().map(|s| s.id),
                    route = to.path(),
                    "access denied"
                );
                Err(GuardRejection::redirect(to, parts, notification))
            }
        }
    }
}

struct Granted {
    session: ClientSession,
    snapshot: SessionSnapshot,
}

#[derive(Debug)]
pub enum GuardRejection {
    Wait,
    Redirect {
        to: Route,
        from: String,
        notification: Option<Notification>,
    },
    Error(AppError),
}

impl GuardRejection {
    fn redirect(to: Route, parts: &Parts, notification: Option<Notification>) -> Self {
        // Nested routers see a stripped uri.
        let from = match parts.extensions.get::<OriginalUri>() {
            Some(OriginalUri(uri)) => uri.path().to_string(),
            None => parts.uri.path().to_string(),
        };
        Self::Redirect { to, from, notification }
    }
}

impl IntoResponse for GuardRejection {
    fn into_response(self) -> Response {
        match self {
            GuardRejection::Wait => (
                StatusCode::ACCEPTED,
                [(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS))],
                Json(json!({ "state": "loading" })),
            )
                .into_response(),
            GuardRejection::Redirect { to, from, notification } => (
                StatusCode::SEE_OTHER,
                [(header::LOCATION, HeaderValue::from_static(to.path()))],
                Json(json!({
                    "redirect": to.path(),
                    "from": from,
                    "notification": notification,
                })),
            )
                .into_response(),
            GuardRejection::Error(err) => err.into_response(),
        }
    }
}

/// Caller allowed into the member area.
pub struct MemberArea {
    pub session: ClientSession,
    pub snapshot: SessionSnapshot,
}

#[async_trait]
impl FromRequestParts<AppState> for MemberArea {
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Granted { session, snapshot } = Guard::member().check(parts, state).await?;
        Ok(MemberArea { session, snapshot })
    }
}

/// Caller allowed into the back-office.
pub struct AdminArea {
    pub session: ClientSession,
    pub snapshot: SessionSnapshot,
}

#[async_trait]
impl FromRequestParts<AppState> for AdminArea {
    type Rejection = GuardRejection;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Granted { session, snapshot } = Guard::admin().check(parts, state).await?;
        Ok(AdminArea { session, snapshot })
    }
}
