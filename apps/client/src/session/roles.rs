//! Role sources: where a signed-in identity's role is read from.
//!
//! Deployments disagree on this. Some write the role into the auth user's
//! metadata at sign-up; others keep a `user_roles` table keyed by user id.
//! The provider holds one of these as `Arc<dyn RoleSource>`, chosen at startup.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::ClientResult;
use crate::models::Role;
use crate::remote::{RemoteClient, RequestOptions};
use crate::session::AuthSession;

/// Resolves the role of an authenticated session.
///
/// `Ok(None)` means the identity exists but carries no recognised role.
#[async_trait]
pub trait RoleSource: Send + Sync {
    async fn resolve(&self, session: &AuthSession) -> ClientResult<Option<Role>>;
}

// ────────────────────────────────────────────────────────────────────────────
// Auth metadata
// ────────────────────────────────────────────────────────────────────────────

/// Reads `role` from the user metadata written at sign-up.
pub struct MetadataRoleSource;

#[async_trait]
impl RoleSource for MetadataRoleSource {
    async fn resolve(&self, session: &AuthSession) -> ClientResult<Option<Role>> {
        let raw = session
            .metadata
            .get("role")
            .and_then(serde_json::Value::as_str);

        Ok(match raw {
            Some(raw) => match raw.parse::<Role>() {
                Ok(role) => Some(role),
                Err(e) => {
                    warn!("Ignoring role metadata for {}: {e}", session.identity.id);
                    None
                }
            },
            None => None,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Roles table
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RoleRow {
    role: String,
}

/// Reads the role from the `user_roles` table through the BaaS REST surface.
pub struct TableRoleSource {
    remote: RemoteClient,
}

impl TableRoleSource {
    pub const TABLE: &'static str = "user_roles";

    /// `remote` must point at the BaaS project and carry its `apikey` header.
    pub fn new(remote: RemoteClient) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl RoleSource for TableRoleSource {
    async fn resolve(&self, session: &AuthSession) -> ClientResult<Option<Role>> {
        // The provider has not published this session yet, so its credential
        // is attached explicitly.
        let remote = self
            .remote
            .with_credentials(Arc::new(session.credential.clone()));

        let options = RequestOptions::get()
            .query("select", "role")
            .query("user_id", format!("eq.{}", session.identity.id));
        let rows: Vec<RoleRow> = remote
            .request(&format!("/rest/v1/{}", Self::TABLE), options)
            .await?;

        debug!("{} role rows for {}", rows.len(), session.identity.id);
        Ok(rows.iter().find_map(|row| row.role.parse::<Role>().ok()))
    }
}
