//! Access token refresh against the identity service.

use client_storage::SessionVault;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Token refresh request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest {
    refresh_token: String,
}

/// Token refresh response envelope.
#[derive(Debug, Deserialize)]
struct RefreshEnvelope {
    #[serde(default)]
    data: Option<RefreshData>,
}

/// The service spells the new access token either `token` or `accessToken`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshData {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Exchanges the stored refresh token for a new access/refresh pair.
///
/// Failure is silent by contract: the refresher returns `None` and the
/// caller decides whether that means "log out" or "proceed unauthenticated".
pub struct TokenRefresher {
    http_client: Client,
    auth_host: String,
    vault: Arc<SessionVault>,
    /// Serializes exchanges so concurrent callers cannot double-submit a
    /// still-valid refresh token.
    inflight: Mutex<()>,
}

impl TokenRefresher {
    /// Create a new refresher against the given auth service.
    pub fn new(http_client: Client, auth_host: impl Into<String>, vault: Arc<SessionVault>) -> Self {
        Self {
            http_client,
            auth_host: auth_host.into(),
            vault,
            inflight: Mutex::new(()),
        }
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Returns `None` without any network call when no refresh token is
    /// stored, and `None` when the service rejects the exchange or the
    /// request fails. On success the vault is updated with the new access
    /// token and, when the service rotates one, the new refresh token; an
    /// absent `refreshToken` in the response leaves the stored one intact.
    ///
    /// A caller that waited on a concurrent exchange reuses its result
    /// instead of submitting the refresh token a second time.
    pub async fn refresh(&self) -> Option<String> {
        match self.vault.get_refresh_token() {
            Ok(Some(_)) => {}
            Ok(None) => return None,
            Err(e) => {
                warn!("Failed to read refresh token: {}", e);
                return None;
            }
        }

        let before = self.vault.get_access_token().ok().flatten();
        let _guard = self.inflight.lock().await;

        // If the access token changed while we waited, another caller
        // already completed the exchange.
        let current = self.vault.get_access_token().ok().flatten();
        if current.is_some() && current != before {
            debug!("Access token already refreshed by a concurrent caller");
            return current;
        }

        // Re-read under the lock: a concurrent exchange may have rotated it.
        let refresh_token = match self.vault.get_refresh_token() {
            Ok(Some(token)) => token,
            _ => return None,
        };

        self.exchange(&refresh_token).await
    }

    /// Single exchange request. Holds no retry logic: the retry budget
    /// belongs to the request gateway.
    async fn exchange(&self, refresh_token: &str) -> Option<String> {
        let url = format!("{}/api/v1/auth/refresh-token", self.auth_host);

        debug!(url = %url, "Refreshing access token");

        let response = match self
            .http_client
            .post(&url)
            .json(&RefreshRequest {
                refresh_token: refresh_token.to_string(),
            })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Token refresh request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            warn!(status = %status, "Token refresh rejected");
            return None;
        }

        let envelope: RefreshEnvelope = match response.json().await {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Malformed refresh response: {}", e);
                return None;
            }
        };

        let data = envelope.data.unwrap_or_default();
        let new_access = data.token.or(data.access_token);

        if let Some(access) = &new_access {
            if let Err(e) = self.vault.set_access_token(access) {
                warn!("Failed to store refreshed access token: {}", e);
            }
        }
        if let Some(refresh) = &data.refresh_token {
            if let Err(e) = self.vault.set_refresh_token(refresh) {
                warn!("Failed to store rotated refresh token: {}", e);
            }
        }

        if new_access.is_some() {
            debug!("Access token refreshed");
        }
        new_access
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryStorage;

    fn test_refresher() -> TokenRefresher {
        let vault = Arc::new(SessionVault::new(Box::new(MemoryStorage::new())));
        TokenRefresher::new(Client::new(), "http://127.0.0.1:1", vault)
    }

    #[tokio::test]
    async fn test_refresh_without_token_skips_network() {
        // The host is unroutable, so reaching the network would error loudly;
        // an absent refresh token must return None before any I/O.
        let refresher = test_refresher();
        assert_eq!(refresher.refresh().await, None);
    }

    #[tokio::test]
    async fn test_refresh_network_failure_is_none() {
        let vault = Arc::new(SessionVault::new(Box::new(MemoryStorage::new())));
        vault.set_refresh_token("refresh-1").unwrap();
        let refresher = TokenRefresher::new(Client::new(), "http://127.0.0.1:1", vault.clone());

        assert_eq!(refresher.refresh().await, None);
        // A failed exchange leaves the stored refresh token untouched.
        assert_eq!(
            vault.get_refresh_token().unwrap(),
            Some("refresh-1".to_string())
        );
    }
}
