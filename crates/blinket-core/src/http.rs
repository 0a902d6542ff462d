//! Outbound HTTP with credential attachment and uniform error classification.
//!
//! The client never retries on its own; retry policy belongs to the caller
//! (see [`SyncError::is_retryable`]).

use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use blinket_types::ApiEnvelope;
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::Config;
use crate::credentials::{CredentialStore, mask_token};
use crate::error::{SyncError, SyncErrorKind, SyncResult};

/// Standard User-Agent header for Blinket API requests.
pub const USER_AGENT: &str = concat!("blinket/", env!("CARGO_PKG_VERSION"));

/// Whether a request carries the stored bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Auth {
    /// Requires a stored credential; fails with `Unauthenticated` without one.
    Bearer,
    /// Sent without credentials (login, signup).
    Anonymous,
}

type ExpiryHook = Arc<dyn Fn() + Send + Sync>;

/// HTTP client bound to one backend and one credential store.
///
/// Cloning is cheap: clones share the connection pool, the store and the
/// session-expiry hook.
#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
    on_expired: Option<ExpiryHook>,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("has_expiry_hook", &self.on_expired.is_some())
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials,
            on_expired: None,
        }
    }

    /// Builds a client from config: base URL resolution and request timeout.
    ///
    /// # Errors
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be constructed.
    pub fn from_config(
        config: &Config,
        credentials: Arc<dyn CredentialStore>,
    ) -> anyhow::Result<Self> {
        let base_url = config.effective_base_url()?;
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url,
            credentials,
            on_expired: None,
        })
    }

    /// Registers the callback fired after a 401 has cleared the credential.
    #[must_use]
    pub fn with_expiry_hook(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_expired = Some(Arc::new(hook));
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// Sends a JSON request and returns the decoded response body.
    ///
    /// An empty success body decodes to `Value::Null`.
    ///
    /// # Errors
    /// - `Unauthenticated` without a network call when `auth` is `Bearer` and
    ///   no credential is stored, or when the backend answers 401.
    /// - `NetworkFailure`, `ClientError`, `ServerError`, `DecodeFailure` per
    ///   the response.
    /// - `StorageFailure` when the credential cannot be read.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        auth: Auth,
    ) -> SyncResult<Value> {
        let token = self.bearer(auth)?;
        let mut builder = self.http.request(method.clone(), self.url(path));
        if let Some(token) = &token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }
        self.execute(builder, &method, path, token).await
    }

    /// `GET` returning the envelope's `data` decoded as `T`.
    ///
    /// # Errors
    /// See [`HttpClient::request`]; `DecodeFailure` when `data` has the wrong shape.
    pub async fn get_data<T: DeserializeOwned>(&self, path: &str, auth: Auth) -> SyncResult<T> {
        let value = self.request(Method::GET, path, None, auth).await?;
        decode_data(value, path)
    }

    /// Sends `body` as JSON and returns the envelope's `data` decoded as `T`.
    ///
    /// # Errors
    /// See [`HttpClient::get_data`].
    pub async fn send_data<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        auth: Auth,
    ) -> SyncResult<T> {
        let body = serde_json::to_value(body)
            .map_err(|err| SyncError::decode(format!("Failed to encode request body: {err}")))?;
        let value = self.request(method, path, Some(&body), auth).await?;
        decode_data(value, path)
    }

    /// Sends an authenticated multipart form (`POST`).
    ///
    /// # Errors
    /// See [`HttpClient::request`].
    pub async fn post_multipart(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> SyncResult<Value> {
        let token = self.bearer(Auth::Bearer)?;
        let mut builder = self.http.post(self.url(path)).multipart(form);
        if let Some(token) = &token {
            builder = builder.bearer_auth(token);
        }
        self.execute(builder, &Method::POST, path, token).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn bearer(&self, auth: Auth) -> SyncResult<Option<String>> {
        match auth {
            Auth::Anonymous => Ok(None),
            Auth::Bearer => match self.credentials.load()? {
                Some(credential) => Ok(Some(credential.token)),
                None => Err(SyncError::unauthenticated("Not signed in")),
            },
        }
    }

    /// `sent_token` is the bearer attached to `builder`, if any.
    async fn execute(
        &self,
        builder: RequestBuilder,
        method: &Method,
        path: &str,
        sent_token: Option<String>,
    ) -> SyncResult<Value> {
        tracing::debug!(%method, path, "request started");

        let response = builder.send().await.map_err(|err| {
            tracing::debug!(%method, path, error = %err, "request failed without response");
            SyncError::network(describe_transport_error(&err))
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|err| {
            SyncError::network(format!("Failed to read response body: {err}"))
        })?;

        tracing::debug!(%method, path, status = status.as_u16(), "request finished");

        if !status.is_success() {
            let err = SyncError::http_status(status.as_u16(), &text);
            if err.kind == SyncErrorKind::Unauthenticated
                && let Some(token) = &sent_token
            {
                self.expire_session(token);
            }
            return Err(err);
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text)
            .map_err(|err| SyncError::decode(format!("Invalid JSON from {path}: {err}")))
    }

    /// The only path, besides explicit logout, that destroys the credential.
    ///
    /// Only `token` is cleared. A 401 for a token that has since been replaced
    /// (a login finished while the request was in flight) leaves the new
    /// session alone.
    fn expire_session(&self, token: &str) {
        match self.credentials.clear_if(token) {
            Ok(true) => {
                tracing::warn!(
                    token = %mask_token(token),
                    "backend rejected the stored token; credential cleared"
                );
            }
            Ok(false) => {
                tracing::debug!(
                    token = %mask_token(token),
                    "rejected token already replaced; keeping session"
                );
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to clear rejected credential");
            }
        }
        if let Some(hook) = &self.on_expired {
            hook();
        }
    }
}

/// Extracts and decodes the `data` field of a response envelope.
///
/// # Errors
/// `DecodeFailure` when the body is not an envelope or `data` has the wrong shape.
pub fn decode_data<T: DeserializeOwned>(value: Value, path: &str) -> SyncResult<T> {
    serde_json::from_value::<ApiEnvelope<T>>(value)
        .map(|envelope| envelope.data)
        .map_err(|err| SyncError::decode(format!("Unexpected response from {path}: {err}")))
}

fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "Request timed out".to_string()
    } else if err.is_connect() {
        "Could not connect to server".to_string()
    } else {
        format!("Request failed: {err}")
    }
}
