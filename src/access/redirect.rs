//! Redirect Resolver: default landing path after authentication events.
//!
//! Must stay consistent with `decide`: a route it returns for a settled
//! snapshot is one the matching guard allows.

use serde::Serialize;

use crate::session::SessionSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "&'static str")]
pub enum Route {
    Home,
    Login,
    Register,
    VerifyEmail,
    Panel,
    Admin,
}

impl Route {
    pub fn path(self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Login => "/login",
            Route::Register => "/registro",
            Route::VerifyEmail => "/verificar-email",
            Route::Panel => "/panel",
            Route::Admin => "/admin",
        }
    }

    /// Where inactive accounts are sent. Placeholder until a dedicated
    /// suspended-account page exists.
    pub fn inactive_landing() -> Self {
        Route::Home
    }
}

impl From<Route> for &'static str {
    fn from(route: Route) -> Self {
        route.path()
    }
}

/// Pages that signed-in users should not re-enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPage {
    Login,
    Register,
    VerifyEmail,
}

pub fn landing_route(snapshot: &SessionSnapshot) -> Route {
    let Some(principal) = &snapshot.principal else {
        return Route::Login;
    };

    if !principal.is_verified() {
        return Route::VerifyEmail;
    }

    if snapshot.load.is_failed() {
        return Route::Login;
    }

    match &snapshot.profile {
        Some(profile) if !profile.status.is_active() => Route::inactive_landing(),
        Some(profile) if profile.is_admin() => Route::Admin,
        // Optimistic while the profile is still resolving.
        _ => Route::Panel,
    }
}

/// Redirect target for an auth page, or `None` when the page should render.
pub fn auth_page_redirect(page: AuthPage, snapshot: &SessionSnapshot) -> Option<Route> {
    let verified = snapshot.principal.as_ref().is_some_and(|p| p.is_verified());

    let leave = match page {
        AuthPage::Login | AuthPage::Register => verified && snapshot.profile.is_some(),
        AuthPage::VerifyEmail => verified,
    };

    leave.then(|| landing_route(snapshot))
}
