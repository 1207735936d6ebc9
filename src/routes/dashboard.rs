use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::access::MemberArea;
use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::models::donation::Donation;
use crate::models::principal::Principal;
use crate::models::profile::Profile;

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub principal: Principal,
    pub profile: Option<Profile>,
    /// The member's own donations, newest first.
    pub donations: Vec<Donation>,
}

#[utoipa::path(
    get,
    path = "/panel",
    tag = "Dashboard",
    responses(
        (status = 200, description = "Member dashboard", body = DashboardResponse),
        (status = 202, description = "Session still loading"),
        (status = 303, description = "Access denied; redirect with notification")
    )
)]
pub async fn panel(State(state): State<AppState>, area: MemberArea) -> AppResult<Json<DashboardResponse>> {
    let MemberArea { snapshot, .. } = area;
    let principal = snapshot
        .principal
        .ok_or_else(|| AppError::internal("guarded session without principal"))?;

    let donations = match &snapshot.profile {
        Some(profile) => state.backend.donations_for_profile(profile.id).await?,
        None => Vec::new(),
    };

    Ok(Json(DashboardResponse {
        principal,
        profile: snapshot.profile,
        donations,
    }))
}
