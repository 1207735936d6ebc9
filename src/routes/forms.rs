//! Public forms. Signed-in callers are attributed in the audit log; donations
//! of signed-in members are also linked to their profile.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;

use crate::app::AppState;
use crate::backend::{NewContact, NewDonation, NewVolunteer};
use crate::errors::{AppError, AppResult};
use crate::events::{log_event, EventKind};
use crate::jwt::MaybeSession;
use crate::models::donation::{DonationReceipt, DonationRequest};
use crate::models::profile::Profile;
use crate::models::submission::{
    full_name, ContactMessage, ContactRequest, VolunteerApplication, VolunteerRequest, VOLUNTEERING,
};
use crate::session::SessionSnapshot;
use crate::utils::{require_non_empty, validate_email};

const DONATION_SUCCESS_PATH: &str = "/donar/exito";

fn caller(session: &MaybeSession) -> SessionSnapshot {
    match &session.0 {
        Some(session) => session.store.snapshot(),
        None => SessionSnapshot::settled(None, None),
    }
}

/// Only a signed-in member with a loaded profile owns a donation; anything
/// else is recorded and audited as anonymous.
fn donor_profile(snapshot: &SessionSnapshot) -> Option<&Profile> {
    snapshot.principal.as_ref().and(snapshot.profile.as_ref())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[utoipa::path(
    post,
    path = "/contacto",
    tag = "Forms",
    request_body = ContactRequest,
    responses(
        (status = 201, description = "Message stored", body = ContactMessage),
        (status = 400, description = "Privacy policy not accepted or missing fields")
    )
)]
pub async fn submit_contact(
    State(state): State<AppState>,
    session: MaybeSession,
    Json(payload): Json<ContactRequest>,
) -> AppResult<(StatusCode, Json<ContactMessage>)> {
    if !payload.accepts_policy {
        return Err(AppError::bad_request("the privacy policy must be accepted"));
    }
    require_non_empty("first_name", &payload.first_name)?;
    validate_email(&payload.email)?;
    require_non_empty("message", &payload.message)?;

    let user_id = caller(&session).principal_id();
    let contact = NewContact {
        name: full_name(&payload.first_name, &payload.last_name),
        email: payload.email.trim().to_string(),
        phone: non_blank(payload.phone),
        subject: payload.subject.trim().to_string(),
        message: payload.message,
    };

    match state.backend.insert_contact(&contact).await {
        Ok(message) => {
            log_event(
                &state.events,
                EventKind::ContactSubmitted,
                user_id,
                format!("Contact form sent by {}", contact.email),
            );
            Ok((StatusCode::CREATED, Json(message)))
        }
        Err(err) => {
            log_event(
                &state.events,
                EventKind::ContactFailed,
                user_id,
                format!("Error sending contact form for {}: {}", contact.email, err),
            );
            Err(err.into())
        }
    }
}

#[utoipa::path(
    post,
    path = "/colaborar",
    tag = "Forms",
    request_body = VolunteerRequest,
    responses(
        (status = 201, description = "Application stored", body = VolunteerApplication),
        (status = 400, description = "Missing fields")
    )
)]
pub async fn submit_volunteer(
    State(state): State<AppState>,
    session: MaybeSession,
    Json(payload): Json<VolunteerRequest>,
) -> AppResult<(StatusCode, Json<VolunteerApplication>)> {
    require_non_empty("first_name", &payload.first_name)?;
    require_non_empty("last_name", &payload.last_name)?;
    validate_email(&payload.email)?;
    require_non_empty("area_of_interest", &payload.area_of_interest)?;
    require_non_empty("availability", &payload.availability)?;

    let user_id = caller(&session).principal_id();
    let volunteer = NewVolunteer {
        name: full_name(&payload.first_name, &payload.last_name),
        email: payload.email.trim().to_string(),
        phone: non_blank(payload.phone),
        collaboration_type: VOLUNTEERING.to_string(),
        area_of_interest: payload.area_of_interest,
        availability: payload.availability,
        message: payload.message,
    };

    match state.backend.insert_volunteer(&volunteer).await {
        Ok(application) => {
            log_event(
                &state.events,
                EventKind::VolunteerSubmitted,
                user_id,
                format!("Volunteer application sent by {}", volunteer.email),
            );
            Ok((StatusCode::CREATED, Json(application)))
        }
        Err(err) => {
            log_event(
                &state.events,
                EventKind::VolunteerFailed,
                user_id,
                format!("Error sending volunteer application for {}: {}", volunteer.email, err),
            );
            Err(err.into())
        }
    }
}

#[utoipa::path(
    post,
    path = "/donar",
    tag = "Forms",
    request_body = DonationRequest,
    responses(
        (status = 201, description = "Donation recorded", body = DonationReceipt),
        (status = 400, description = "Terms not accepted or invalid amount")
    )
)]
pub async fn submit_donation(
    State(state): State<AppState>,
    session: MaybeSession,
    Json(payload): Json<DonationRequest>,
) -> AppResult<(StatusCode, Json<DonationReceipt>)> {
    if payload.amount <= 0 {
        return Err(AppError::bad_request("amount must be greater than zero"));
    }
    if !payload.accepts_terms {
        return Err(AppError::bad_request("the terms and conditions must be accepted"));
    }
    require_non_empty("first_name", &payload.first_name)?;
    validate_email(&payload.email)?;
    require_non_empty("payment_method", &payload.payment_method)?;

    let snapshot = caller(&session);
    let user_id = snapshot.principal_id();
    let profile = donor_profile(&snapshot);
    let anonymous = profile.is_none();

    // Payment happens at the external provider; the reference is local.
    let donation = NewDonation {
        amount: payload.amount,
        donor_name: full_name(&payload.first_name, &payload.last_name),
        donor_email: payload.email.trim().to_string(),
        donor_phone: non_blank(payload.phone),
        payment_method: payload.payment_method.trim().to_string(),
        operation_number: format!("MP-{}", Utc::now().timestamp_millis()),
        profile_id: profile.map(|p| p.id),
    };

    let recorded = match state.backend.insert_donation(&donation).await {
        Ok(recorded) => recorded,
        Err(err) => {
            tracing::error!("Error recording donation: {}", err);
            log_event(
                &state.events,
                EventKind::DonationFailed,
                user_id,
                format!("Error recording donation for {}: {}", donation.donor_email, err),
            );
            return Err(err.into());
        }
    };

    match profile {
        Some(profile) => log_event(
            &state.events,
            EventKind::DonationRecorded,
            user_id,
            format!("User {} donated ${}.", profile.email, recorded.amount),
        ),
        None => log_event(
            &state.events,
            EventKind::AnonymousDonationRecorded,
            None,
            format!("Anonymous donation of ${} by {}.", recorded.amount, recorded.donor_email),
        ),
    }

    Ok((
        StatusCode::CREATED,
        Json(DonationReceipt {
            anonymous,
            donation: recorded,
            redirect: DONATION_SUCCESS_PATH.to_string(),
        }),
    ))
}
