//! BaaS authentication: password grant, sign-up, refresh, logout.
//!
//! Publishes an `AuthEvent` for every state change it makes. When a session
//! file is configured the issued session is kept there between runs.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::{AuthFailure, ClientError, ClientResult};
use crate::models::{Credential, Identity};
use crate::remote::{RemoteClient, RequestOptions};
use crate::session::{AuthBackend, AuthEvent, AuthSession, SignUpRequest};

/// Refresh this long before the access token actually expires.
const EXPIRY_MARGIN_SECS: i64 = 30;

// ────────────────────────────────────────────────────────────────────────────
// Wire shapes
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserDto {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Value,
}

#[derive(Debug, Deserialize)]
struct TokenReply {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    user: UserDto,
}

/// Sign-up answers with a session, or with the bare user when the project
/// requires email confirmation.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SignUpReply {
    Session(TokenReply),
    User(UserDto),
}

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

/// On-disk form of a session.
#[derive(Debug, Serialize, Deserialize)]
struct StoredSession {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
    user: UserDto,
}

impl UserDto {
    fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            email: self.email.clone().unwrap_or_default(),
        }
    }
}

impl TokenReply {
    fn into_session(self) -> AuthSession {
        AuthSession {
            identity: self.user.identity(),
            credential: Credential::new(self.access_token),
            refresh_token: self.refresh_token,
            expires_at: self
                .expires_in
                .map(|secs| Utc::now() + ChronoDuration::seconds(secs)),
            metadata: self.user.user_metadata,
        }
    }
}

impl StoredSession {
    fn from_session(session: &AuthSession) -> Self {
        Self {
            access_token: session.credential.expose().to_string(),
            refresh_token: session.refresh_token.clone(),
            expires_at: session.expires_at,
            user: UserDto {
                id: session.identity.id,
                email: Some(session.identity.email.clone()),
                user_metadata: session.metadata.clone(),
            },
        }
    }

    fn into_session(self) -> AuthSession {
        AuthSession {
            identity: self.user.identity(),
            credential: Credential::new(self.access_token),
            refresh_token: self.refresh_token,
            expires_at: self.expires_at,
            metadata: self.user.user_metadata,
        }
    }
}

fn is_expired(session: &AuthSession) -> bool {
    session
        .expires_at
        .is_some_and(|at| at - ChronoDuration::seconds(EXPIRY_MARGIN_SECS) <= Utc::now())
}

/// Human-readable part of an auth error body.
fn error_text(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string())
}

/// Client-side rejections from the auth endpoints become typed auth failures.
fn to_auth_error(err: ClientError) -> ClientError {
    match err {
        ClientError::Http { status, message } if (400..500).contains(&status) => {
            ClientError::Auth(AuthFailure::from_message(&error_text(&message)))
        }
        ClientError::Conflict(message) => {
            ClientError::Auth(AuthFailure::from_message(&error_text(&message)))
        }
        other => other,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Adapter
// ────────────────────────────────────────────────────────────────────────────

pub struct BaasAuth {
    remote: RemoteClient,
    current: Mutex<Option<AuthSession>>,
    events: broadcast::Sender<AuthEvent>,
    session_file: Option<PathBuf>,
}

impl BaasAuth {
    /// `remote` must point at the project and carry its `apikey` header.
    pub fn new(remote: RemoteClient, session_file: Option<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            remote,
            current: Mutex::new(None),
            events,
            session_file,
        }
    }

    /// The identity the backend associates with the current credential.
    pub async fn current_identity(&self) -> ClientResult<Option<Identity>> {
        let Some(session) = self.current_session().await? else {
            return Ok(None);
        };
        let user: UserDto = self
            .remote
            .with_credentials(Arc::new(session.credential))
            .request("/auth/v1/user", RequestOptions::get())
            .await
            .map_err(to_auth_error)?;
        Ok(Some(user.identity()))
    }

    fn publish(&self, event: AuthEvent) {
        // No subscribers is fine: nobody has mounted a provider yet.
        if self.events.send(event).is_err() {
            debug!("Auth event dropped; no listeners");
        }
    }

    async fn store(&self, session: Option<&AuthSession>) {
        *self.current.lock().await = session.cloned();

        let Some(path) = &self.session_file else {
            return;
        };
        let result = match session {
            Some(session) => match serde_json::to_vec_pretty(&StoredSession::from_session(session)) {
                Ok(bytes) => tokio::fs::write(path, bytes).await,
                Err(e) => {
                    warn!("Could not encode session: {e}");
                    return;
                }
            },
            None => match tokio::fs::remove_file(path).await {
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        };
        if let Err(e) = result {
            warn!("Could not update session file {}: {e}", path.display());
        }
    }

    async fn load_stored(&self) -> Option<AuthSession> {
        let path = self.session_file.as_ref()?;
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("Could not read session file {}: {e}", path.display());
                return None;
            }
        };
        match serde_json::from_slice::<StoredSession>(&bytes) {
            Ok(stored) => Some(stored.into_session()),
            Err(e) => {
                warn!("Ignoring unreadable session file {}: {e}", path.display());
                None
            }
        }
    }

    async fn refresh_with(&self, refresh_token: &str) -> ClientResult<AuthSession> {
        let options = RequestOptions::post_json(&RefreshGrant { refresh_token })?
            .query("grant_type", "refresh_token");
        let reply: TokenReply = self
            .remote
            .request("/auth/v1/token", options)
            .await
            .map_err(to_auth_error)?;
        let session = reply.into_session();
        self.store(Some(&session)).await;
        self.publish(AuthEvent::TokenRefreshed(session.clone()));
        debug!("Refreshed session for {}", session.identity.email);
        Ok(session)
    }
}

#[async_trait]
impl AuthBackend for BaasAuth {
    async fn sign_in(&self, email: &str, password: &str) -> ClientResult<AuthSession> {
        let options = RequestOptions::post_json(&PasswordGrant { email, password })?
            .query("grant_type", "password");
        let reply: TokenReply = self
            .remote
            .request("/auth/v1/token", options)
            .await
            .map_err(to_auth_error)?;

        let session = reply.into_session();
        self.store(Some(&session)).await;
        info!("Signed in {}", session.identity.email);
        self.publish(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, request: &SignUpRequest) -> ClientResult<Option<AuthSession>> {
        let body = json!({
            "email": request.email,
            "password": request.password,
            "data": {
                "full_name": request.display_name,
                "role": request.role.as_app_role(),
            },
        });
        let reply: SignUpReply = self
            .remote
            .request("/auth/v1/signup", RequestOptions::post_json(&body)?)
            .await
            .map_err(to_auth_error)?;

        match reply {
            SignUpReply::Session(tokens) => {
                let session = tokens.into_session();
                self.store(Some(&session)).await;
                self.publish(AuthEvent::SignedIn(session.clone()));
                Ok(Some(session))
            }
            SignUpReply::User(user) => {
                debug!("Account {} awaits email confirmation", user.id);
                Ok(None)
            }
        }
    }

    async fn sign_out(&self) -> ClientResult<()> {
        let current = self.current.lock().await.take();
        self.store(None).await;
        self.publish(AuthEvent::SignedOut);

        if let Some(session) = current {
            self.remote
                .with_credentials(Arc::new(session.credential))
                .request_unit("/auth/v1/logout", RequestOptions::post_empty())
                .await?;
        }
        Ok(())
    }

    async fn current_session(&self) -> ClientResult<Option<AuthSession>> {
        let cached = self.current.lock().await.clone();
        let session = match cached {
            Some(session) => session,
            None => match self.load_stored().await {
                Some(session) => {
                    *self.current.lock().await = Some(session.clone());
                    session
                }
                None => return Ok(None),
            },
        };

        if !is_expired(&session) {
            return Ok(Some(session));
        }
        match session.refresh_token.as_deref() {
            Some(token) => self.refresh_with(token).await.map(Some),
            None => {
                self.store(None).await;
                Ok(None)
            }
        }
    }

    async fn refresh(&self) -> ClientResult<AuthSession> {
        let token = self
            .current
            .lock()
            .await
            .as_ref()
            .and_then(|s| s.refresh_token.clone())
            .ok_or(ClientError::Unauthenticated)?;
        self.refresh_with(&token).await
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::Anonymous;
    use crate::testing::{serve_once, CannedResponse};
    use std::time::Duration;

    const TOKEN_REPLY: &str = r#"{
        "access_token": "at-1", "token_type": "bearer", "expires_in": 3600,
        "refresh_token": "rt-1",
        "user": {"id": "6f1c1f9e-1111-4c3b-9a51-3c1b7a2d9f00", "email": "rae@acme.io",
                 "user_metadata": {"full_name": "Rae", "role": "recruiter"}}
    }"#;

    fn auth(url: &str, file: Option<PathBuf>) -> BaasAuth {
        let remote = RemoteClient::new(url, Duration::from_secs(5), Arc::new(Anonymous))
            .unwrap()
            .with_default_header("apikey", "anon-key")
            .unwrap();
        BaasAuth::new(remote, file)
    }

    #[tokio::test]
    async fn test_sign_in_uses_password_grant_and_publishes() {
        let (url, request) = serve_once(CannedResponse::ok(TOKEN_REPLY)).await;
        let auth = auth(&url, None);
        let mut events = auth.subscribe();

        let session = auth.sign_in("rae@acme.io", "hunter22").await.unwrap();
        assert_eq!(session.identity.email, "rae@acme.io");
        assert_eq!(session.metadata["role"], "recruiter");

        let raw = request.await.unwrap();
        assert!(raw.starts_with("POST /auth/v1/token?grant_type=password "));
        assert!(raw.contains("apikey: anon-key"));
        assert!(matches!(events.recv().await.unwrap(), AuthEvent::SignedIn(_)));
    }

    #[tokio::test]
    async fn test_bad_password_is_invalid_credentials() {
        let body = r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#;
        let (url, _req) = serve_once(CannedResponse::new(400, body)).await;
        let err = auth(&url, None).sign_in("rae@acme.io", "nope-nope").await.unwrap_err();
        assert!(matches!(err, ClientError::Auth(AuthFailure::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_existing_email_is_already_registered() {
        let body = r#"{"code":422,"error_code":"user_already_exists","msg":"User already registered"}"#;
        let (url, _req) = serve_once(CannedResponse::new(422, body)).await;
        let request = SignUpRequest {
            email: "rae@acme.io".into(),
            password: "hunter22".into(),
            display_name: "Rae".into(),
            role: crate::models::Role::Recruiter,
        };
        let err = auth(&url, None).sign_up(&request).await.unwrap_err();
        assert!(matches!(err, ClientError::Auth(AuthFailure::AlreadyRegistered)));
    }

    #[tokio::test]
    async fn test_sign_up_with_confirmation_returns_no_session() {
        let body = r#"{"id":"6f1c1f9e-1111-4c3b-9a51-3c1b7a2d9f00","email":"new@mail.io","user_metadata":{}}"#;
        let (url, request) = serve_once(CannedResponse::ok(body)).await;
        let signup = SignUpRequest {
            email: "new@mail.io".into(),
            password: "hunter22".into(),
            display_name: "New".into(),
            role: crate::models::Role::Seeker,
        };
        assert!(auth(&url, None).sign_up(&signup).await.unwrap().is_none());
        let raw = request.await.unwrap();
        assert!(raw.contains(r#""role":"user""#));
        assert!(raw.contains(r#""full_name":"New""#));
    }

    #[tokio::test]
    async fn test_session_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");

        let (url, _req) = serve_once(CannedResponse::ok(TOKEN_REPLY)).await;
        auth(&url, Some(path.clone()))
            .sign_in("rae@acme.io", "hunter22")
            .await
            .unwrap();
        assert!(path.exists());

        // A fresh adapter restores without touching the network.
        let restored = auth("http://127.0.0.1:9", Some(path.clone()))
            .current_session()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(restored.credential.expose(), "at-1");
        assert_eq!(restored.identity.email, "rae@acme.io");
    }

    #[test]
    fn test_error_text_prefers_description() {
        assert_eq!(
            error_text(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(error_text("plain"), "plain");
    }

    #[test]
    fn test_expiry_margin() {
        let mut session = StoredSession {
            access_token: "a".into(),
            refresh_token: None,
            expires_at: Some(Utc::now() + ChronoDuration::seconds(10)),
            user: UserDto {
                id: Uuid::nil(),
                email: None,
                user_metadata: Value::Null,
            },
        }
        .into_session();
        assert!(is_expired(&session));
        session.expires_at = Some(Utc::now() + ChronoDuration::hours(1));
        assert!(!is_expired(&session));
        session.expires_at = None;
        assert!(!is_expired(&session));
    }
}
