//! Route guard: decides per navigation whether to render, wait, or redirect.
//!
//! Checks run in a fixed order: pending, then unauthenticated, then role
//! mismatch. Checking the role before the identity resolves would redirect
//! to the wrong home for a frame.

use crate::models::{Role, Session};

pub const SIGN_IN_ROUTE: &str = "/login";
pub const SIGN_UP_ROUTE: &str = "/signup";

/// Canonical dashboard for a role.
pub fn home_for(role: Role) -> &'static str {
    match role {
        Role::Seeker => "/candidate/dashboard",
        Role::Recruiter => "/recruiter/dashboard",
        Role::Admin => "/admin/dashboard",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Identity resolution still running; show a neutral placeholder.
    Pending,
    /// No identity. `replace` keeps the guarded route out of history.
    RedirectSignIn { route: &'static str, replace: bool },
    /// Identity present but its role is not allowed here.
    RedirectHome { route: &'static str, replace: bool },
    Authorized,
}

/// Guards a view that requires one of `required`. An empty set admits any
/// signed-in identity.
pub fn evaluate(required: &[Role], session: &Session) -> GuardDecision {
    if session.loading {
        return GuardDecision::Pending;
    }
    if !session.is_authenticated() {
        return GuardDecision::RedirectSignIn {
            route: SIGN_IN_ROUTE,
            replace: true,
        };
    }
    if required.is_empty() {
        return GuardDecision::Authorized;
    }
    match session.effective_role() {
        Some(role) if required.contains(&role) => GuardDecision::Authorized,
        // No recognised role lands on the seeker home.
        role => GuardDecision::RedirectHome {
            route: home_for(role.unwrap_or(Role::Seeker)),
            replace: true,
        },
    }
}

/// Who may open a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Roles(&'static [Role]),
}

const SEEKER_ONLY: &[Role] = &[Role::Seeker];
const RECRUITER_ONLY: &[Role] = &[Role::Recruiter];
const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Access rule for a route path.
pub fn access_for(path: &str) -> Access {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let first = path.trim_start_matches('/').split('/').next().unwrap_or("");
    match first {
        "candidate" => Access::Roles(SEEKER_ONLY),
        "recruiter" => Access::Roles(RECRUITER_ONLY),
        "admin" => Access::Roles(ADMIN_ONLY),
        "messaging" | "notifications" => Access::Authenticated,
        _ => Access::Public,
    }
}

/// Guard decision for navigating to `path`.
pub fn guard_route(path: &str, session: &Session) -> GuardDecision {
    match access_for(path) {
        Access::Public => GuardDecision::Authorized,
        Access::Authenticated => evaluate(&[], session),
        Access::Roles(required) => evaluate(required, session),
    }
}

/// Where to go after sign-in, once identity and role have resolved.
pub fn landing_route(session: &Session) -> Option<&'static str> {
    if session.loading || !session.is_authenticated() {
        return None;
    }
    Some(home_for(session.effective_role().unwrap_or(Role::Seeker)))
}
