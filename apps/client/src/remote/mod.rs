//! Remote client adapter: the single path for outgoing HTTP calls.
//!
//! Attaches the session's bearer credential when there is one, sets the JSON
//! content type for everything except multipart uploads, and turns every
//! non-success status into a `ClientError`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Request, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{ClientError, ClientResult};
use crate::models::Credential;

pub mod upload;

pub use upload::{FileUpload, MAX_UPLOAD_BYTES};

const JSON: &str = "application/json";

/// Supplies the bearer credential for the current session, if any.
pub trait CredentialSource: Send + Sync {
    fn bearer(&self) -> Option<Credential>;
}

/// Credential source for public reads.
pub struct Anonymous;

impl CredentialSource for Anonymous {
    fn bearer(&self) -> Option<Credential> {
        None
    }
}

/// A fixed credential, for calls made on behalf of a session not yet published.
impl CredentialSource for Credential {
    fn bearer(&self) -> Option<Credential> {
        Some(self.clone())
    }
}

#[derive(Debug)]
pub enum RequestBody {
    Empty,
    Json(Value),
    Multipart { field: &'static str, file: FileUpload },
}

/// Content type the adapter sets for a body.
/// Multipart gets none so the transport can write the boundary itself.
pub fn content_type_for(body: &RequestBody) -> Option<&'static str> {
    match body {
        RequestBody::Empty | RequestBody::Json(_) => Some(JSON),
        RequestBody::Multipart { .. } => None,
    }
}

/// Method, body, query string and extra headers of one call.
#[derive(Debug)]
pub struct RequestOptions {
    pub method: Method,
    pub body: RequestBody,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(&'static str, String)>,
}

impl RequestOptions {
    fn new(method: Method, body: RequestBody) -> Self {
        Self {
            method,
            body,
            query: Vec::new(),
            headers: Vec::new(),
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET, RequestBody::Empty)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE, RequestBody::Empty)
    }

    pub fn post_empty() -> Self {
        Self::new(Method::POST, RequestBody::Empty)
    }

    pub fn post_json<T: Serialize>(body: &T) -> ClientResult<Self> {
        Ok(Self::new(Method::POST, RequestBody::Json(to_value(body)?)))
    }

    pub fn put_json<T: Serialize>(body: &T) -> ClientResult<Self> {
        Ok(Self::new(Method::PUT, RequestBody::Json(to_value(body)?)))
    }

    pub fn patch_empty() -> Self {
        Self::new(Method::PATCH, RequestBody::Empty)
    }

    pub fn patch_json<T: Serialize>(body: &T) -> ClientResult<Self> {
        Ok(Self::new(Method::PATCH, RequestBody::Json(to_value(body)?)))
    }

    pub fn upload(field: &'static str, file: FileUpload) -> Self {
        Self::new(Method::POST, RequestBody::Multipart { field, file })
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

fn to_value<T: Serialize>(body: &T) -> ClientResult<Value> {
    serde_json::to_value(body).map_err(|source| ClientError::Decode {
        path: "<request body>".to_string(),
        source,
    })
}

/// HTTP client bound to one base URL and one credential source.
#[derive(Clone)]
pub struct RemoteClient {
    http: Client,
    base_url: String,
    credentials: Arc<dyn CredentialSource>,
    default_headers: HeaderMap,
}

impl RemoteClient {
    pub fn new(
        base_url: &str,
        timeout: Duration,
        credentials: Arc<dyn CredentialSource>,
    ) -> ClientResult<Self> {
        Url::parse(base_url)
            .map_err(|e| ClientError::Config(format!("invalid base URL '{base_url}': {e}")))?;
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            default_headers: HeaderMap::new(),
        })
    }

    /// Adds a header sent on every request (e.g. the BaaS project key).
    pub fn with_default_header(mut self, name: &'static str, value: &str) -> ClientResult<Self> {
        let value = HeaderValue::from_str(value)
            .map_err(|e| ClientError::Config(format!("invalid value for header {name}: {e}")))?;
        self.default_headers
            .insert(HeaderName::from_static(name), value);
        Ok(self)
    }

    /// Same transport and headers, different credential source.
    pub fn with_credentials(&self, credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            credentials,
            ..self.clone()
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, path: &str) -> ClientResult<Url> {
        let joined = if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        Url::parse(&joined).map_err(|e| ClientError::Config(format!("invalid URL '{joined}': {e}")))
    }

    /// Assembles the outgoing request without sending it.
    pub fn build(&self, path: &str, options: RequestOptions) -> ClientResult<Request> {
        let url = self.url_for(path)?;
        let content_type = content_type_for(&options.body);

        let mut builder = self
            .http
            .request(options.method, url)
            .headers(self.default_headers.clone());

        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(ct) = content_type {
            builder = builder.header(CONTENT_TYPE, ct);
        }
        for (name, value) in options.headers {
            builder = builder.header(name, value);
        }
        if let Some(credential) = self.credentials.bearer() {
            builder = builder.bearer_auth(credential.expose());
        }

        builder = match options.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.body(value.to_string()),
            RequestBody::Multipart { field, file } => builder.multipart(file.into_form(field)?),
        };

        Ok(builder.build()?)
    }

    /// Sends the request and returns the body text of a successful response.
    pub async fn send(&self, path: &str, options: RequestOptions) -> ClientResult<String> {
        let method = options.method.clone();
        let request = self.build(path, options)?;

        let response = self.http.execute(request).await.map_err(|e| {
            warn!("{method} {path} failed before a response: {e}");
            ClientError::Transport(e)
        })?;

        let status = response.status();
        let body = response.text().await?;
        debug!("{method} {path} -> {}", status.as_u16());

        if !status.is_success() {
            warn!("{method} {path} returned {}", status.as_u16());
            return Err(ClientError::from_status(status, &body));
        }
        Ok(body)
    }

    /// Sends the request and decodes the JSON body into `T`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> ClientResult<T> {
        let body = self.send(path, options).await?;
        decode(path, &body)
    }

    /// Sends the request and discards the body.
    pub async fn request_unit(&self, path: &str, options: RequestOptions) -> ClientResult<()> {
        self.send(path, options).await.map(|_| ())
    }
}

/// Decodes a response body, naming the path on a shape mismatch.
pub fn decode<T: DeserializeOwned>(path: &str, body: &str) -> ClientResult<T> {
    // An empty 2xx body decodes as JSON null.
    let text = if body.trim().is_empty() { "null" } else { body };
    serde_json::from_str(text).map_err(|source| ClientError::Decode {
        path: path.to_string(),
        source,
    })
}
