//! Access Decision Engine.
//!
//! `decide` is a pure function of a session snapshot and the requested area.
//! Evaluation order (first match wins):
//! 1. loading or profile still being fetched -> Pending
//! 2. no principal -> Unauthenticated
//! 3. email not verified -> EmailUnverified
//! 4. profile load failed -> ProfileUnavailable
//! 5. profile present and status != active -> AccountInactive
//! 6. admin area and profile present but not an admin -> InsufficientRole
//! 7. Allowed

mod guard;
mod redirect;

pub use guard::{AdminArea, Guard, GuardOutcome, GuardRejection, MemberArea, Notification, Severity};
pub use redirect::{auth_page_redirect, landing_route, AuthPage, Route};

use crate::models::profile::AccountStatus;
use crate::session::{LoadState, SessionSnapshot};

/// Protected areas with distinct access rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Area {
    /// Member dashboard (`/panel`).
    Member,
    /// Back-office (`/admin`).
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pending,
    Unauthenticated,
    EmailUnverified,
    /// The profile could not be loaded; treated like a missing session.
    ProfileUnavailable,
    AccountInactive { status: AccountStatus },
    InsufficientRole,
    Allowed,
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }
}

pub fn decide(snapshot: &SessionSnapshot, area: Area) -> Verdict {
    if snapshot.loading || matches!(snapshot.load, LoadState::Fetching { .. } | LoadState::RetryScheduled { .. }) {
        return Verdict::Pending;
    }

    let Some(principal) = &snapshot.principal else {
        return Verdict::Unauthenticated;
    };

    if !principal.is_verified() {
        return Verdict::EmailUnverified;
    }

    if snapshot.load.is_failed() {
        return Verdict::ProfileUnavailable;
    }

    if let Some(profile) = &snapshot.profile {
        if !profile.status.is_active() {
            return Verdict::AccountInactive {
                status: profile.status.clone(),
            };
        }
        if area == Area::Admin && !profile.is_admin() {
            return Verdict::InsufficientRole;
        }
    }

    Verdict::Allowed
}
