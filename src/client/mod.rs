//! HTTP client for the n8n public REST API.
//!
//! [`N8nClient`] is immutable after construction and cheap to clone. Every
//! request is bounded by the configured timeout and aborted when the
//! client's cancellation token fires.

mod error;
pub mod models;
pub mod users;

pub use error::ApiError;
pub use models::{
    format_timestamp, CreateUserRequest, InvalidRole, Role, UpdateUserRoleRequest, User, UsersPage,
};
pub use users::UsersApi;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "X-N8N-API-KEY";

const API_PREFIX: &str = "/api/v1";

/// Settings used to build an [`N8nClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Instance URL, e.g. `https://acme.app.n8n.cloud`.
    pub base_url: String,
    /// API key sent with every request.
    pub api_key: SecretString,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl ClientConfig {
    /// Create a config with the default timeout and user agent.
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("n8ncloud-provider/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Override the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the `User-Agent` header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Client for the n8n public API.
#[derive(Clone)]
pub struct N8nClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    api_base: Url,
    cancel: CancellationToken,
}

impl std::fmt::Debug for N8nClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("N8nClient")
            .field("api_base", &self.inner.api_base.as_str())
            .finish_non_exhaustive()
    }
}

/// Successful single-entity bodies come either bare or wrapped in `data`.
///
/// The body is unwrapped before `T` is decoded so field errors (a missing
/// `createdAt`, say) keep their own message.
fn decode_entity<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    let mut body: Value = serde_json::from_str(text)?;
    let data = body.as_object_mut().and_then(|fields| fields.remove("data"));
    serde_json::from_value(data.unwrap_or(body))
}

impl N8nClient {
    /// Build a client that is never cancelled.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        Self::with_cancellation(config, CancellationToken::new())
    }

    /// Build a client whose in-flight requests abort when `cancel` fires.
    pub fn with_cancellation(
        config: ClientConfig,
        cancel: CancellationToken,
    ) -> Result<Self, ApiError> {
        let api_base = api_base(&config.base_url)?;

        let mut api_key = HeaderValue::from_str(config.api_key.expose_secret())
            .map_err(|_| ApiError::Config("API key is not a valid header value".to_string()))?;
        api_key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, api_key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .build()
            .map_err(ApiError::Transport)?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                api_base,
                cancel,
            }),
        })
    }

    /// The resolved API base, `{instance_url}/api/v1`.
    pub fn api_base(&self) -> &str {
        self.inner.api_base.as_str()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.inner.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Config("instance URL cannot be a base".to_string()))?
            .extend(segments);
        Ok(url)
    }

    /// Send a request and return the raw body of a successful response.
    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<String, ApiError> {
        let url = self.endpoint(segments)?;
        tracing::debug!(method = %method, path = url.path(), "Sending n8n API request");

        let mut request = self.inner.http.request(method.clone(), url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }

        let call = async {
            let response = request.send().await.map_err(ApiError::Transport)?;
            let status = response.status();
            let text = response.text().await.map_err(ApiError::Transport)?;
            Ok::<_, ApiError>((status, text))
        };

        let (status, text) = tokio::select! {
            biased;
            _ = self.inner.cancel.cancelled() => {
                tracing::debug!(method = %method, path = url.path(), "n8n API request cancelled");
                return Err(ApiError::Cancelled);
            },
            result = call => result?,
        };

        tracing::debug!(
            method = %method,
            path = url.path(),
            status = status.as_u16(),
            "Received n8n API response"
        );

        if status.is_client_error() || status.is_server_error() {
            return Err(ApiError::from_response(status.as_u16(), text));
        }
        Ok(text)
    }

    async fn request<T, B>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let text = self.send(method, segments, body).await?;
        Ok(decode_entity(&text)?)
    }

    async fn request_page<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let text = self.send::<()>(Method::GET, segments, None).await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn execute<B: Serialize + ?Sized>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<(), ApiError> {
        self.send(method, segments, body).await.map(|_| ())
    }
}

/// Join the instance URL with the API prefix, dropping any trailing `/`.
fn api_base(base_url: &str) -> Result<Url, ApiError> {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ApiError::Config("instance URL is required".to_string()));
    }
    let url = Url::parse(&format!("{}{}", trimmed, API_PREFIX))
        .map_err(|e| ApiError::Config(format!("invalid instance URL {:?}: {}", base_url, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ApiError::Config(format!(
            "unsupported instance URL scheme {:?}",
            other
        ))),
    }
}

/// Whether a status should be treated as "entity does not exist".
pub(crate) fn is_not_found(err: &ApiError) -> bool {
    err.status() == Some(StatusCode::NOT_FOUND.as_u16())
}
