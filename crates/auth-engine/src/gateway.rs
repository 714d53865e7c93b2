//! Authenticated request gateway.
//!
//! The single sanctioned path for calling protected endpoints. Attaches the
//! bearer token, refreshes proactively when the stored token is stale, and
//! on a 401 refreshes reactively and retries exactly once. A second 401 is
//! proof the session, not just the access token, is invalid: the session is
//! torn down and the response still returned to the caller.

use crate::claims::is_expired;
use crate::fsm::{RequestMachine, RequestMachineInput};
use crate::refresh::TokenRefresher;
use crate::{AuthError, AuthResult, DEFAULT_EXPIRY_MARGIN_MS};
use client_storage::SessionVault;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, Response, StatusCode};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Callback invoked when a session is found irrecoverable. The consuming
/// application uses it to drop in-memory identity and route to its
/// unauthenticated entry point.
pub type SessionExpiredCallback = Box<dyn Fn() + Send + Sync>;

/// Options for an outbound request.
#[derive(Debug)]
pub struct RequestOptions {
    /// HTTP method (defaults to GET).
    pub method: Method,
    /// Extra headers. These override the gateway's defaults, but the
    /// authorization header always wins over a caller-supplied one.
    pub headers: Vec<(String, String)>,
    /// JSON request body. Its presence is what triggers the JSON
    /// content-type header.
    pub body: Option<serde_json::Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: Vec::new(),
            body: None,
        }
    }
}

impl RequestOptions {
    /// Options for a JSON request with the given method and body.
    pub fn json(method: Method, body: serde_json::Value) -> Self {
        Self {
            method,
            headers: Vec::new(),
            body: Some(body),
        }
    }
}

/// Gateway wrapping outbound calls with token attachment and the
/// refresh-and-retry-once policy.
pub struct AuthGateway {
    http_client: Client,
    auth_host: String,
    vault: Arc<SessionVault>,
    refresher: Arc<TokenRefresher>,
    expired_callback: Mutex<Option<SessionExpiredCallback>>,
}

impl AuthGateway {
    /// Create a new gateway.
    pub fn new(
        http_client: Client,
        auth_host: impl Into<String>,
        vault: Arc<SessionVault>,
        refresher: Arc<TokenRefresher>,
    ) -> Self {
        Self {
            http_client,
            auth_host: auth_host.into(),
            vault,
            refresher,
            expired_callback: Mutex::new(None),
        }
    }

    /// Set a callback invoked after session teardown.
    pub fn set_session_expired_callback(&self, callback: SessionExpiredCallback) {
        let mut cb = self.expired_callback.lock().unwrap();
        *cb = Some(callback);
    }

    /// Execute an authenticated request.
    ///
    /// Network-level failures are returned as [`AuthError::Network`] and
    /// never retried. Every HTTP status, including errors, is returned as a
    /// normal response — interpreting business failures is the caller's job.
    pub async fn request(&self, url: &str, options: RequestOptions) -> AuthResult<Response> {
        let absolute_url = self.absolute_url(url);

        let mut token = self.vault.get_access_token()?;
        if token.is_none() || is_expired(token.as_deref(), DEFAULT_EXPIRY_MARGIN_MS) {
            // Proactive refresh. A None result means we proceed without a
            // token and let the server reject with 401.
            token = self.refresher.refresh().await;
        }

        let mut machine = RequestMachine::new();

        let response = self
            .execute(&absolute_url, &options, token.as_deref())
            .await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            self.transition(&mut machine, &RequestMachineInput::Accepted)?;
            return Ok(response);
        }

        // Reactive path: one more refresh, one retry.
        self.transition(&mut machine, &RequestMachineInput::Rejected)?;
        debug!(url = %absolute_url, "Request unauthorized, refreshing and retrying once");

        let retry_token = self.refresher.refresh().await;
        let retry = self
            .execute(&absolute_url, &options, retry_token.as_deref())
            .await?;

        if retry.status() == StatusCode::UNAUTHORIZED {
            self.transition(&mut machine, &RequestMachineInput::Rejected)?;
            warn!(url = %absolute_url, "Retry still unauthorized, tearing down session");
            self.teardown();
        } else {
            self.transition(&mut machine, &RequestMachineInput::Accepted)?;
        }

        // The final response is returned either way; callers may want to
        // render something from its body.
        Ok(retry)
    }

    /// Prefix relative URLs with the auth service base address.
    fn absolute_url(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        if url.starts_with('/') {
            format!("{}{}", self.auth_host, url)
        } else {
            format!("{}/{}", self.auth_host, url)
        }
    }

    async fn execute(
        &self,
        url: &str,
        options: &RequestOptions,
        token: Option<&str>,
    ) -> AuthResult<Response> {
        let headers = self.build_headers(options, token)?;

        let mut request = self
            .http_client
            .request(options.method.clone(), url)
            .headers(headers);
        if let Some(body) = &options.body {
            request = request.body(serde_json::to_string(body)?);
        }

        request.send().await.map_err(AuthError::Network)
    }

    /// Build headers in override order: JSON content-type (only when a body
    /// is present), then caller headers, then the bearer token.
    fn build_headers(
        &self,
        options: &RequestOptions,
        token: Option<&str>,
    ) -> AuthResult<HeaderMap> {
        let mut headers = HeaderMap::new();

        if options.body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| AuthError::InvalidHeader(e.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| AuthError::InvalidHeader(e.to_string()))?;
            headers.insert(name, value);
        }

        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| AuthError::InvalidHeader(e.to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    fn transition(
        &self,
        machine: &mut RequestMachine,
        input: &RequestMachineInput,
    ) -> AuthResult<()> {
        machine.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                machine.state()
            ))
        })?;
        Ok(())
    }

    /// Tear down the irrecoverable session: clear the vault and notify the
    /// application.
    fn teardown(&self) {
        if let Err(e) = self.vault.clear_session() {
            warn!("Failed to clear session during teardown: {}", e);
        }

        let cb = self.expired_callback.lock().unwrap();
        if let Some(callback) = cb.as_ref() {
            callback();
        }
    }
}
