//! Back-office. Every handler takes `AdminArea`, so the admin guard runs first.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::access::AdminArea;
use crate::app::AppState;
use crate::backend::Totals;
use crate::errors::{AppError, AppResult};
use crate::events::{log_event, EventKind};
use crate::models::donation::Donation;
use crate::models::log::LogRecord;
use crate::models::profile::{AccountStatus, Profile, UserAction, UserActionRequest};
use crate::models::submission::Submissions;

const LOG_LIMIT: i64 = 100;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Case-insensitive substring filter.
    pub q: Option<String>,
}

impl SearchQuery {
    fn needle(&self) -> Option<String> {
        self.q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
    }
}

fn matches_any(needle: &str, fields: &[&str]) -> bool {
    fields.iter().any(|field| field.to_lowercase().contains(needle))
}

#[utoipa::path(
    get,
    path = "/admin",
    tag = "Admin",
    responses((status = 200, description = "Back-office counters", body = Totals))
)]
pub async fn overview(State(state): State<AppState>, _admin: AdminArea) -> AppResult<Json<Totals>> {
    Ok(Json(state.backend.totals().await?))
}

#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "Admin",
    params(SearchQuery),
    responses((status = 200, description = "Profiles, newest first", body = [Profile]))
)]
pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminArea,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<Profile>>> {
    let mut profiles = state.backend.list_profiles().await?;
    if let Some(needle) = query.needle() {
        profiles.retain(|p| matches_any(&needle, &[&p.name, &p.email, p.role.as_str(), p.status.as_str()]));
    }
    Ok(Json(profiles))
}

#[utoipa::path(
    put,
    path = "/admin/users/{id}/status",
    tag = "Admin",
    params(("id" = Uuid, Path, description = "Profile id")),
    request_body = UserActionRequest,
    responses(
        (status = 200, description = "Status changed", body = Profile),
        (status = 404, description = "Profile not found"),
        (status = 501, description = "User deletion is not available")
    )
)]
pub async fn change_user_status(
    State(state): State<AppState>,
    admin: AdminArea,
    Path(profile_id): Path<Uuid>,
    Json(payload): Json<UserActionRequest>,
) -> AppResult<Json<Profile>> {
    let actor = admin.snapshot.principal_id();

    let status = match payload.action {
        UserAction::Suspend => AccountStatus::Suspended,
        UserAction::Activate => AccountStatus::Active,
        UserAction::Delete => {
            tracing::info!(profile_id = %profile_id, "user deletion requested but not available");
            return Err(AppError::not_implemented("user deletion"));
        }
    };

    match state.backend.set_status(profile_id, &status).await {
        Ok(profile) => {
            log_event(
                &state.events,
                EventKind::UserStatusChanged,
                actor,
                format!("Profile {} ({}) set to {}.", profile.id, profile.email, status),
            );
            let reloaded = state
                .sessions
                .reload_profiles(profile.auth_user_id, state.config.settle_timeout)
                .await;
            tracing::info!(profile_id = %profile.id, sessions = reloaded, "live sessions picked up status change");
            Ok(Json(profile))
        }
        Err(err) => {
            log_event(
                &state.events,
                EventKind::UserStatusChangeFailed,
                actor,
                format!("Could not set profile {profile_id} to {status}: {err}"),
            );
            Err(err.into())
        }
    }
}

#[utoipa::path(
    get,
    path = "/admin/donations",
    tag = "Admin",
    params(SearchQuery),
    responses((status = 200, description = "Donations, newest first", body = [Donation]))
)]
pub async fn list_donations(
    State(state): State<AppState>,
    _admin: AdminArea,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<Vec<Donation>>> {
    let mut donations = state.backend.list_donations().await?;
    if let Some(needle) = query.needle() {
        donations.retain(|d| matches_any(&needle, &[&d.donor_name, &d.donor_email, &d.operation_number]));
    }
    Ok(Json(donations))
}

#[utoipa::path(
    get,
    path = "/admin/submissions",
    tag = "Admin",
    responses((status = 200, description = "Contact messages and volunteer applications", body = Submissions))
)]
pub async fn list_submissions(State(state): State<AppState>, _admin: AdminArea) -> AppResult<Json<Submissions>> {
    let contacts = state.backend.list_contacts().await?;
    let volunteers = state.backend.list_volunteers().await?;
    Ok(Json(Submissions { contacts, volunteers }))
}

#[utoipa::path(
    get,
    path = "/admin/logs",
    tag = "Admin",
    responses((status = 200, description = "Latest audit entries", body = [LogRecord]))
)]
pub async fn list_logs(State(state): State<AppState>, _admin: AdminArea) -> AppResult<Json<Vec<LogRecord>>> {
    Ok(Json(state.backend.recent_logs(LOG_LIMIT).await?))
}
