//! Session/role provider.
//!
//! Owns the process-wide `Session` and is its only writer. Everything else
//! reads it through a `SessionHandle`. After a successful sign-in or sign-up
//! the provider listens for auth events and resolves the role from the
//! configured `RoleSource`. Sign-in returning `Ok` does not mean the role is
//! known yet; the session reads as loading until it is.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{AuthFailure, ClientError, ClientResult};
use crate::models::{Credential, Identity, Role, Session};
use crate::remote::CredentialSource;
use crate::validation;

pub mod roles;

pub use roles::{MetadataRoleSource, RoleSource, TableRoleSource};

// ────────────────────────────────────────────────────────────────────────────
// Auth port
// ────────────────────────────────────────────────────────────────────────────

/// A session as issued by the auth backend.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub identity: Identity,
    pub credential: Credential,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Free-form user metadata (`full_name`, `role`) written at sign-up.
    pub metadata: serde_json::Value,
}

/// Session-change notification published by the auth backend.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    SignedIn(AuthSession),
    TokenRefreshed(AuthSession),
    SignedOut,
}

#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub role: Role,
}

/// Authentication backend.
///
/// Implementations publish an `AuthEvent` for every sign-in, refresh and
/// sign-out they perform.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> ClientResult<AuthSession>;

    /// `Ok(None)` when the account was created but needs email confirmation
    /// before a session is issued.
    async fn sign_up(&self, request: &SignUpRequest) -> ClientResult<Option<AuthSession>>;

    async fn sign_out(&self) -> ClientResult<()>;

    async fn current_session(&self) -> ClientResult<Option<AuthSession>>;

    async fn refresh(&self) -> ClientResult<AuthSession>;

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

// ────────────────────────────────────────────────────────────────────────────
// Read side
// ────────────────────────────────────────────────────────────────────────────

/// Read-only view of the session. Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    rx: watch::Receiver<Session>,
}

impl SessionHandle {
    /// Wraps a receiver the caller writes to, e.g. a fixed session.
    pub fn from_receiver(rx: watch::Receiver<Session>) -> Self {
        Self { rx }
    }

    pub fn current(&self) -> Session {
        self.rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.rx.clone()
    }

    /// Waits until identity resolution has finished and returns the result.
    pub async fn wait_until_resolved(&self) -> Session {
        let mut rx = self.rx.clone();
        let resolved = match rx.wait_for(|s| !s.loading).await {
            Ok(session) => session.clone(),
            Err(_) => self.current(),
        };
        resolved
    }
}

impl CredentialSource for SessionHandle {
    fn bearer(&self) -> Option<Credential> {
        self.rx.borrow().credential.clone()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Provider
// ────────────────────────────────────────────────────────────────────────────

/// Write side shared by the provider and its listener task.
///
/// Every identity change bumps `epoch`. A role lookup captures the epoch
/// when it starts and publishes only if nothing changed while it ran.
#[derive(Clone)]
struct Publisher {
    state: Arc<watch::Sender<Session>>,
    roles: Arc<dyn RoleSource>,
    epoch: Arc<AtomicU64>,
}

impl Publisher {
    fn advance(&self) -> u64 {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Reports the session as pending until `id` has been resolved.
    /// No-op when that identity is already published.
    fn mark_pending(&self, id: Uuid) {
        self.state.send_if_modified(|s| {
            if s.identity_id() == Some(id) || s.loading {
                return false;
            }
            s.loading = true;
            true
        });
    }

    async fn resolve(&self, session: AuthSession) {
        let ticket = self.advance();
        self.state.send_modify(|s| s.loading = true);

        let role = match self.roles.resolve(&session).await {
            Ok(role) => role,
            Err(e) => {
                warn!("Role lookup failed for {}: {e}", session.identity.id);
                None
            }
        };

        let email = session.identity.email.clone();
        let published = self.state.send_if_modified(|s| {
            if self.epoch.load(Ordering::SeqCst) != ticket {
                return false;
            }
            *s = Session::resolved(session.identity, role, session.credential);
            true
        });

        if published {
            debug!(
                "Resolved {email} as {}",
                role.map(|r| r.as_str()).unwrap_or("<none>")
            );
        } else {
            debug!("Dropping stale role resolution for {email}");
        }
    }

    fn refresh(&self, session: AuthSession) {
        self.state.send_modify(|current| {
            if current.identity_id() == Some(session.identity.id) {
                current.credential = Some(session.credential);
            }
        });
        debug!("Credential refreshed");
    }

    fn sign_out(&self) {
        self.advance();
        self.state.send_replace(Session::signed_out());
    }
}

pub struct SessionProvider {
    auth: Arc<dyn AuthBackend>,
    publisher: Publisher,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionProvider {
    /// Starts in the pending state; call `mount` to query the backend.
    pub fn new(auth: Arc<dyn AuthBackend>, roles: Arc<dyn RoleSource>) -> Self {
        let (tx, _rx) = watch::channel(Session::pending());
        Self {
            auth,
            publisher: Publisher {
                state: Arc::new(tx),
                roles,
                epoch: Arc::new(AtomicU64::new(0)),
            },
            listener: Mutex::new(None),
        }
    }

    pub fn handle(&self) -> SessionHandle {
        SessionHandle {
            rx: self.publisher.state.subscribe(),
        }
    }

    /// Restores an existing session, if the backend has one.
    /// Never fails: a backend error leaves the session signed out.
    pub async fn mount(&self) {
        let events = self.auth.subscribe();
        let ticket = self.publisher.epoch.load(Ordering::SeqCst);
        match self.auth.current_session().await {
            Ok(Some(session)) => {
                info!("Restored session for {}", session.identity.email);
                self.publisher.resolve(session).await;
                self.start_listener(events).await;
            }
            Ok(None) => self.settle_signed_out(ticket),
            Err(e) => {
                warn!("Could not restore session: {e}");
                self.settle_signed_out(ticket);
            }
        }
    }

    /// Publishes "signed out" unless a sign-in started meanwhile.
    fn settle_signed_out(&self, ticket: u64) {
        let epoch = &self.publisher.epoch;
        self.publisher.state.send_if_modified(|s| {
            if epoch.load(Ordering::SeqCst) != ticket {
                return false;
            }
            *s = Session::signed_out();
            true
        });
    }

    /// Returns once the backend accepted the credentials. The published
    /// session stays pending until the role has been resolved.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthFailure> {
        validation::validate_credentials(email, password).map_err(to_auth_failure)?;

        let events = self.auth.subscribe();
        let issued = self
            .auth
            .sign_in(email.trim(), password)
            .await
            .map_err(to_auth_failure)?;

        debug!("Sign-in accepted for {email}; waiting for role resolution");
        self.publisher.mark_pending(issued.identity.id);
        self.start_listener(events).await;
        Ok(())
    }

    /// Creates an account. Success without a session (email confirmation
    /// pending) leaves the provider signed out.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        role: Role,
    ) -> Result<(), AuthFailure> {
        validation::validate_sign_up(email, password, display_name).map_err(to_auth_failure)?;

        let request = SignUpRequest {
            email: email.trim().to_string(),
            password: password.to_string(),
            display_name: display_name.trim().to_string(),
            role,
        };

        let events = self.auth.subscribe();
        let issued = self
            .auth
            .sign_up(&request)
            .await
            .map_err(to_auth_failure)?;

        match issued {
            Some(session) => {
                info!("Signed up {} as {role}", request.email);
                self.publisher.mark_pending(session.identity.id);
                self.start_listener(events).await;
            }
            None => info!("Signed up {}; confirmation pending", request.email),
        }
        Ok(())
    }

    /// Clears identity, role and credential and stops listening.
    /// A failed remote sign-out is logged; local teardown always happens.
    pub async fn sign_out(&self) {
        self.stop_listener().await;
        if let Err(e) = self.auth.sign_out().await {
            warn!("Remote sign-out failed: {e}");
        }
        self.publisher.sign_out();
    }

    /// Stops the listener without touching the backend session.
    pub async fn shutdown(&self) {
        self.stop_listener().await;
    }

    async fn start_listener(&self, events: broadcast::Receiver<AuthEvent>) {
        let mut slot = self.listener.lock().await;
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        *slot = Some(tokio::spawn(listen(events, self.publisher.clone())));
    }

    async fn stop_listener(&self) {
        if let Some(handle) = self.listener.lock().await.take() {
            handle.abort();
        }
    }
}

impl Drop for SessionProvider {
    fn drop(&mut self) {
        if let Some(handle) = self.listener.get_mut().take() {
            handle.abort();
        }
    }
}

async fn listen(mut events: broadcast::Receiver<AuthEvent>, publisher: Publisher) {
    loop {
        match events.recv().await {
            Ok(AuthEvent::SignedIn(session)) => publisher.resolve(session).await,
            Ok(AuthEvent::TokenRefreshed(session)) => publisher.refresh(session),
            Ok(AuthEvent::SignedOut) => publisher.sign_out(),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!("Auth listener skipped {n} events");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn to_auth_failure(err: ClientError) -> AuthFailure {
    match err {
        ClientError::Auth(failure) => failure,
        ClientError::Validation { message, .. } => AuthFailure::Validation(message),
        other => AuthFailure::Unknown(other.user_message()),
    }
}
