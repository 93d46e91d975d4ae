use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// REST API endpoint used when `HIREMATCH_API_URL` is not set.
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";

/// Which adapter backs the shared recruitment interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Rest,
    Baas,
}

/// Where a signed-in identity's role is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleSourceKind {
    /// `role` key in the auth user's metadata, written at sign-up.
    Metadata,
    /// Dedicated `user_roles` table keyed by user id.
    Table,
}

/// Backend-as-a-service project coordinates.
#[derive(Debug, Clone)]
pub struct BaasConfig {
    pub url: String,
    pub anon_key: String,
}

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub backend: BackendKind,
    pub baas: Option<BaasConfig>,
    pub role_source: RoleSourceKind,
    pub request_timeout: Duration,
    /// Where the BaaS session is kept between runs. Unset keeps it in memory only.
    pub session_file: Option<PathBuf>,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_url = lookup("HIREMATCH_API_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        reqwest::Url::parse(&api_url)
            .with_context(|| format!("HIREMATCH_API_URL '{api_url}' is not a valid URL"))?;

        let backend = match lookup("HIREMATCH_BACKEND").as_deref().map(str::trim) {
            None | Some("") | Some("rest") => BackendKind::Rest,
            Some("baas") => BackendKind::Baas,
            Some(other) => bail!("HIREMATCH_BACKEND must be 'rest' or 'baas', got '{other}'"),
        };

        let role_source = match lookup("HIREMATCH_ROLE_SOURCE").as_deref().map(str::trim) {
            None | Some("") | Some("metadata") => RoleSourceKind::Metadata,
            Some("table") => RoleSourceKind::Table,
            Some(other) => {
                bail!("HIREMATCH_ROLE_SOURCE must be 'metadata' or 'table', got '{other}'")
            }
        };

        let baas = match (lookup("HIREMATCH_BAAS_URL"), lookup("HIREMATCH_BAAS_ANON_KEY")) {
            (Some(url), Some(anon_key)) => Some(BaasConfig { url, anon_key }),
            (None, None) => None,
            (Some(_), None) => bail!("HIREMATCH_BAAS_ANON_KEY is required when HIREMATCH_BAAS_URL is set"),
            (None, Some(_)) => bail!("HIREMATCH_BAAS_URL is required when HIREMATCH_BAAS_ANON_KEY is set"),
        };

        if backend == BackendKind::Baas && baas.is_none() {
            bail!("HIREMATCH_BACKEND=baas requires HIREMATCH_BAAS_URL and HIREMATCH_BAAS_ANON_KEY");
        }

        let request_timeout = Duration::from_secs(
            lookup("HIREMATCH_TIMEOUT_SECS")
                .unwrap_or_else(|| "30".to_string())
                .parse::<u64>()
                .context("HIREMATCH_TIMEOUT_SECS must be a whole number of seconds")?,
        );

        Ok(Config {
            api_url,
            backend,
            baas,
            role_source,
            request_timeout,
            session_file: lookup("HIREMATCH_SESSION_FILE")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// BaaS coordinates, or an error naming the missing variables.
    pub fn require_baas(&self) -> Result<&BaasConfig> {
        self.baas
            .as_ref()
            .context("HIREMATCH_BAAS_URL and HIREMATCH_BAAS_ANON_KEY must be set for authentication")
    }
}
