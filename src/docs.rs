use std::sync::Arc;

use axum::{routing::get, Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::server::Server;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::access::{Notification, Severity};
use crate::backend::Totals;
use crate::models;
use crate::routes::{admin, auth, dashboard, forms, health, pages};
use crate::session::SessionView;

#[derive(OpenApi)]
#[openapi(
	paths(
		health::health,
		auth::register,
		auth::login,
		auth::logout,
		auth::request_password_recovery,
		auth::recover,
		auth::update_password,
		auth::refresh,
		auth::session,
		pages::login_page,
		pages::register_page,
		pages::verify_email_page,
		dashboard::panel,
		admin::overview,
		admin::list_users,
		admin::change_user_status,
		admin::list_donations,
		admin::list_submissions,
		admin::list_logs,
		forms::submit_contact,
		forms::submit_volunteer,
		forms::submit_donation
	),
	components(
		schemas(
			health::HealthResponse,
			dashboard::DashboardResponse,
			models::auth::RegisterRequest,
			models::auth::RegisterResponse,
			models::auth::LoginRequest,
			models::auth::AuthResponse,
			models::auth::PasswordRecoveryRequest,
			models::auth::RecoverRequest,
			models::auth::UpdatePasswordRequest,
			models::auth::MessageResponse,
			models::principal::Principal,
			models::profile::Profile,
			models::profile::UserAction,
			models::profile::UserActionRequest,
			models::donation::Donation,
			models::donation::DonationRequest,
			models::donation::DonationReceipt,
			models::submission::ContactMessage,
			models::submission::ContactRequest,
			models::submission::VolunteerApplication,
			models::submission::VolunteerRequest,
			models::submission::Submissions,
			models::log::LogRecord,
			SessionView,
			Notification,
			Severity,
			Totals
		)
	),
	modifiers(&BearerAuth),
	tags(
		(name = "Health", description = "Liveness"),
		(name = "Auth", description = "Sign-up, sign-in and session endpoints"),
		(name = "Pages", description = "Auth pages with signed-in redirects"),
		(name = "Dashboard", description = "Member area"),
		(name = "Admin", description = "Back-office, admin guard"),
		(name = "Forms", description = "Public contact, volunteer and donation forms")
	)
)]
pub struct ApiDoc;

/// Registers the session token scheme so Swagger UI offers the Authorize dialog.
struct BearerAuth;

impl Modify for BearerAuth {
	fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
		let components = openapi.components.get_or_insert_with(Default::default);
		components.add_security_scheme(
			"bearerAuth",
			SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
		);
	}
}

pub fn build_openapi(port: u16) -> utoipa::openapi::OpenApi {
	let mut doc = ApiDoc::openapi();
	doc.servers = Some(vec![Server::new(format!("http://localhost:{port}"))]);
	doc
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = {
		let doc_json = Arc::clone(&doc_json);
		get(move || {
			let doc_json = Arc::clone(&doc_json);
			async move { Json((*doc_json).clone()) }
		})
	};

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}
