use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Capability an identity holds on the platform.
///
/// The two backends spell the seeker role differently (`user` in the roles
/// table, `candidate` in auth metadata); both decode to `Seeker`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[serde(rename = "candidate", alias = "user", alias = "seeker")]
    Seeker,
    Recruiter,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Seeker, Role::Recruiter, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Seeker => "candidate",
            Role::Recruiter => "recruiter",
            Role::Admin => "admin",
        }
    }

    /// Spelling used by the BaaS roles enum, where seekers are `user`.
    pub fn as_app_role(&self) -> &'static str {
        match self {
            Role::Seeker => "user",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "candidate" | "user" | "seeker" => Ok(Role::Seeker),
            "recruiter" => Ok(Role::Recruiter),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// The authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

/// Bearer credential for the current session. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Current identity + role + loading status.
///
/// `role` is only meaningful while `identity` is `Some`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: Option<Identity>,
    pub role: Option<Role>,
    pub loading: bool,
    pub(crate) credential: Option<Credential>,
}

impl Session {
    /// State before the backend has been asked about an existing session.
    pub fn pending() -> Self {
        Self {
            identity: None,
            role: None,
            loading: true,
            credential: None,
        }
    }

    pub fn signed_out() -> Self {
        Self {
            identity: None,
            role: None,
            loading: false,
            credential: None,
        }
    }

    pub fn resolved(identity: Identity, role: Option<Role>, credential: Credential) -> Self {
        Self {
            identity: Some(identity),
            role,
            loading: false,
            credential: Some(credential),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    /// Role, but only when an identity is present.
    pub fn effective_role(&self) -> Option<Role> {
        self.identity.as_ref().and(self.role)
    }

    pub fn identity_id(&self) -> Option<Uuid> {
        self.identity.as_ref().map(|i| i.id)
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::pending()
    }
}
