use reqwest::StatusCode;
use thiserror::Error;

/// Postgres unique-violation code, echoed by the BaaS on duplicate inserts.
const UNIQUE_VIOLATION: &str = "23505";

/// Typed sign-in / sign-up failure reported by the auth backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("already registered")]
    AlreadyRegistered,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    Unknown(String),
}

impl AuthFailure {
    /// Classifies an auth backend error body by the phrases it is known to send.
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("invalid login credentials") || lower.contains("invalid_grant") {
            AuthFailure::InvalidCredentials
        } else if lower.contains("already registered") || lower.contains("user_already_exists") {
            AuthFailure::AlreadyRegistered
        } else if lower.contains("password should be") || lower.contains("unable to validate email")
        {
            AuthFailure::Validation(message.to_string())
        } else {
            AuthFailure::Unknown(message.to_string())
        }
    }
}

/// Client-layer error type.
/// Every failure a view can hit is one of these; `user_message` turns it into
/// the inline/toast text shown at the component boundary.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Validation error on '{field}': {message}")]
    Validation { field: &'static str, message: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthFailure),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Could not decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path} returned no record")]
    MissingRecord { path: String },

    #[error("File '{name}' is {size} bytes; the limit is {limit} bytes")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    #[error("Not signed in")]
    Unauthenticated,

    #[error("Not supported by this backend: {0}")]
    Unsupported(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ClientResult<T> = Result<T, ClientError>;

impl ClientError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ClientError::Validation {
            field,
            message: message.into(),
        }
    }

    /// Converts a non-success response into an error.
    /// Duplicates become `Conflict`; everything else keeps the server's body text,
    /// or `HTTP <status>` when the body is empty.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let body = body.trim();
        let message = if body.is_empty() {
            format!("HTTP {}", status.as_u16())
        } else {
            body.to_string()
        };

        if status == StatusCode::CONFLICT || body.contains(UNIQUE_VIOLATION) {
            return ClientError::Conflict(message);
        }

        ClientError::Http {
            status: status.as_u16(),
            message,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::Conflict(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::Http { status: 404, .. })
    }

    /// Display text for the failure, as shown next to the control that triggered it.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Validation { message, .. } => message.clone(),
            ClientError::Conflict(msg) => msg.clone(),
            ClientError::Auth(AuthFailure::InvalidCredentials) => {
                "Invalid email or password".to_string()
            }
            ClientError::Auth(AuthFailure::AlreadyRegistered) => {
                "This email is already registered. Please sign in instead.".to_string()
            }
            ClientError::Auth(AuthFailure::Validation(msg)) => msg.clone(),
            ClientError::Auth(AuthFailure::Unknown(msg)) => msg.clone(),
            ClientError::Http { message, .. } => message.clone(),
            ClientError::Transport(e) => {
                tracing::warn!("Transport error: {e}");
                "Could not reach the server. Check your connection and try again.".to_string()
            }
            ClientError::Decode { path, source } => {
                tracing::error!("Decode error for {path}: {source}");
                "The server sent an unexpected response.".to_string()
            }
            ClientError::MissingRecord { path } => {
                tracing::warn!("No record returned by {path}");
                "The server did not return the saved record.".to_string()
            }
            ClientError::FileTooLarge { .. } => "File size must be less than 5MB".to_string(),
            ClientError::Unauthenticated => "Please sign in to continue.".to_string(),
            ClientError::Unsupported(what) => format!("{what} is not available here."),
            ClientError::Config(msg) => msg.clone(),
            ClientError::Io(e) => e.to_string(),
        }
    }

    /// Replaces a generic conflict message with an entity-specific one.
    pub fn with_conflict_message(self, message: &str) -> Self {
        match self {
            ClientError::Conflict(_) => ClientError::Conflict(message.to_string()),
            other => other,
        }
    }
}
