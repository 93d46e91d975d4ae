use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::info;

use crate::backend::baas::BaasCredentials;
use crate::backend::{BaasAuth, BaasBackend, MatchingApi, RecruitmentBackend, RestBackend};
use crate::config::{BackendKind, Config, RoleSourceKind};
use crate::errors::{ClientError, ClientResult};
use crate::remote::{Anonymous, RemoteClient};
use crate::session::{
    AuthBackend, AuthEvent, AuthSession, MetadataRoleSource, RoleSource, SessionHandle,
    SessionProvider, SignUpRequest, TableRoleSource,
};

/// Everything a view needs, built once at startup and torn down on exit.
pub struct AppContext {
    pub config: Config,
    pub session: SessionProvider,
    pub backend: Arc<dyn RecruitmentBackend>,
    /// REST-only endpoints (apply, CVs, dashboards, notifications).
    pub rest: RestBackend,
    pub matching: Arc<dyn MatchingApi>,
}

impl AppContext {
    pub fn from_config(config: Config) -> Result<Self> {
        let timeout = config.request_timeout;

        let baas_remote = match &config.baas {
            Some(baas) => Some(
                RemoteClient::new(&baas.url, timeout, Arc::new(Anonymous))?
                    .with_default_header("apikey", &baas.anon_key)?,
            ),
            None => None,
        };

        let auth: Arc<dyn AuthBackend> = match &baas_remote {
            Some(remote) => Arc::new(BaasAuth::new(remote.clone(), config.session_file.clone())),
            None => Arc::new(NoAuth::default()),
        };

        let roles: Arc<dyn RoleSource> = match (config.role_source, &baas_remote) {
            (RoleSourceKind::Metadata, _) => Arc::new(MetadataRoleSource),
            (RoleSourceKind::Table, Some(remote)) => Arc::new(TableRoleSource::new(remote.clone())),
            (RoleSourceKind::Table, None) => {
                bail!("HIREMATCH_ROLE_SOURCE=table requires HIREMATCH_BAAS_URL and HIREMATCH_BAAS_ANON_KEY")
            }
        };

        let session = SessionProvider::new(auth, roles);
        let handle = session.handle();

        let rest = RestBackend::new(RemoteClient::new(
            &config.api_url,
            timeout,
            Arc::new(handle.clone()),
        )?);

        let backend: Arc<dyn RecruitmentBackend> = match config.backend {
            BackendKind::Rest => Arc::new(rest.clone()),
            BackendKind::Baas => {
                let baas = config.require_baas()?;
                let Some(remote) = &baas_remote else {
                    bail!("HIREMATCH_BACKEND=baas requires HIREMATCH_BAAS_URL");
                };
                let credentials = BaasCredentials::new(handle, &baas.anon_key);
                Arc::new(BaasBackend::new(remote.with_credentials(Arc::new(credentials))))
            }
        };

        info!(
            "Client ready: {} backend, REST API at {}",
            backend.name(),
            config.api_url
        );

        Ok(Self {
            config,
            session,
            backend,
            matching: Arc::new(rest.clone()),
            rest,
        })
    }

    pub fn handle(&self) -> SessionHandle {
        self.session.handle()
    }

    /// Restores a persisted session, if any.
    pub async fn start(&self) {
        self.session.mount().await;
    }

    pub async fn shutdown(&self) {
        self.session.shutdown().await;
    }
}

/// Auth port used when no BaaS project is configured: public reads only.
struct NoAuth {
    events: broadcast::Sender<AuthEvent>,
}

impl Default for NoAuth {
    fn default() -> Self {
        let (events, _) = broadcast::channel(1);
        Self { events }
    }
}

fn auth_unavailable() -> ClientError {
    ClientError::Config(
        "Sign-in needs HIREMATCH_BAAS_URL and HIREMATCH_BAAS_ANON_KEY to be set".to_string(),
    )
}

#[async_trait]
impl AuthBackend for NoAuth {
    async fn sign_in(&self, _email: &str, _password: &str) -> ClientResult<AuthSession> {
        Err(auth_unavailable())
    }

    async fn sign_up(&self, _request: &SignUpRequest) -> ClientResult<Option<AuthSession>> {
        Err(auth_unavailable())
    }

    async fn sign_out(&self) -> ClientResult<()> {
        Ok(())
    }

    async fn current_session(&self) -> ClientResult<Option<AuthSession>> {
        Ok(None)
    }

    async fn refresh(&self) -> ClientResult<AuthSession> {
        Err(auth_unavailable())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}
