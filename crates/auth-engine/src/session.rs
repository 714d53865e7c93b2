//! Session lifecycle management.
//!
//! `SessionManager` is the explicit context object the application
//! constructs once at startup and injects wherever authentication is
//! needed: startup restoration, login, registration, logout, and the
//! current identity all live here. The request gateway it owns is the
//! sanctioned way to call protected endpoints.

use crate::claims::{decode_claims, is_expired};
use crate::gateway::{AuthGateway, RequestOptions};
use crate::refresh::TokenRefresher;
use crate::{AuthResult, DEFAULT_EXPIRY_MARGIN_MS};
use client_config_and_utils::Config;
use client_storage::{Role, SessionVault, UserProfile};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Callback invoked when the application should route to its
/// unauthenticated entry point (after logout or session teardown).
pub type NavigationCallback = Box<dyn Fn() + Send + Sync>;

/// Current session status, derived from the vault on demand.
#[derive(Debug, Clone)]
pub enum SessionStatus {
    /// A non-expired access token is stored.
    LoggedIn {
        user_id: Option<String>,
        email: Option<String>,
    },
    /// An access token is stored but expired; the next gateway call will
    /// try to refresh it.
    Expired,
    /// No session.
    NotLoggedIn,
}

/// Login response: tokens at the top of `data`.
#[derive(Debug, Deserialize)]
struct LoginEnvelope {
    #[serde(default)]
    data: Option<LoginData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Register response: tokens one level deeper than login's, under a nested
/// token object. The asymmetry is the service's contract; each shape gets
/// its own struct rather than guessing a normalization.
#[derive(Debug, Deserialize)]
struct RegisterEnvelope {
    #[serde(default)]
    data: Option<RegisterData>,
}

#[derive(Debug, Deserialize)]
struct RegisterData {
    #[serde(default)]
    token: Option<RegisterTokenPair>,
    #[serde(default)]
    user: Option<UserProfile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterTokenPair {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Profile fetch response: the user sits under `data` or `user`.
#[derive(Debug, Deserialize)]
struct ProfileEnvelope {
    #[serde(default)]
    data: Option<UserProfile>,
    #[serde(default)]
    user: Option<UserProfile>,
}

/// Aggregated profile from the user service.
#[derive(Debug, Deserialize)]
struct AggregatedEnvelope {
    #[serde(default)]
    data: Option<AggregatedProfile>,
}

#[derive(Debug, Deserialize)]
struct AggregatedProfile {
    #[serde(default)]
    user: Option<AggregatedUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregatedUser {
    id: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    phone_e164: Option<String>,
    #[serde(default)]
    role: Option<Role>,
}

impl AggregatedUser {
    fn into_profile(self) -> UserProfile {
        UserProfile {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone_e164.unwrap_or_default(),
            role: self.role.unwrap_or_default(),
        }
    }
}

/// Fields a profile save may change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Session lifecycle controller.
pub struct SessionManager {
    vault: Arc<SessionVault>,
    refresher: Arc<TokenRefresher>,
    gateway: Arc<AuthGateway>,
    http_client: Client,
    auth_host: String,
    user_host: String,
    user: Arc<Mutex<Option<UserProfile>>>,
    /// True only during the one-time startup restoration.
    loading: AtomicBool,
    nav_callback: Arc<Mutex<Option<NavigationCallback>>>,
}

impl SessionManager {
    /// Create a new session manager over the given vault.
    pub fn new(
        vault: Arc<SessionVault>,
        auth_host: impl Into<String>,
        user_host: impl Into<String>,
    ) -> Self {
        let auth_host = auth_host.into();
        let user_host = user_host.into();
        let http_client = Client::new();

        let refresher = Arc::new(TokenRefresher::new(
            http_client.clone(),
            auth_host.clone(),
            vault.clone(),
        ));
        let gateway = Arc::new(AuthGateway::new(
            http_client.clone(),
            auth_host.clone(),
            vault.clone(),
            refresher.clone(),
        ));

        let user: Arc<Mutex<Option<UserProfile>>> = Arc::new(Mutex::new(None));
        let nav_callback: Arc<Mutex<Option<NavigationCallback>>> = Arc::new(Mutex::new(None));

        // An irrecoverable 401 clears the in-memory identity and routes the
        // application back to its unauthenticated entry point. The gateway
        // has already cleared the vault at this point.
        gateway.set_session_expired_callback({
            let user = user.clone();
            let nav_callback = nav_callback.clone();
            Box::new(move || {
                *user.lock().unwrap() = None;
                if let Some(navigate) = nav_callback.lock().unwrap().as_ref() {
                    navigate();
                }
            })
        });

        Self {
            vault,
            refresher,
            gateway,
            http_client,
            auth_host,
            user_host,
            user,
            loading: AtomicBool::new(true),
            nav_callback,
        }
    }

    /// Create a session manager from the client configuration.
    pub fn from_config(config: &Config, vault: Arc<SessionVault>) -> Self {
        Self::new(vault, config.auth_host.clone(), config.user_host.clone())
    }

    /// Set the callback used to route to the unauthenticated entry point.
    pub fn set_navigation_callback(&self, callback: NavigationCallback) {
        let mut cb = self.nav_callback.lock().unwrap();
        *cb = Some(callback);
    }

    /// The gateway for protected application calls.
    pub fn gateway(&self) -> Arc<AuthGateway> {
        self.gateway.clone()
    }

    /// Current identity, if signed in.
    pub fn current_user(&self) -> Option<UserProfile> {
        self.user.lock().unwrap().clone()
    }

    /// True only while the startup restoration is still running.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Current session status, without touching the network.
    pub fn status(&self) -> SessionStatus {
        let access = match self.vault.get_access_token() {
            Ok(Some(token)) => token,
            _ => return SessionStatus::NotLoggedIn,
        };

        if is_expired(Some(&access), DEFAULT_EXPIRY_MARGIN_MS) {
            return SessionStatus::Expired;
        }

        let cached = self.vault.get_user_profile().ok().flatten();
        match cached {
            Some(profile) => SessionStatus::LoggedIn {
                user_id: Some(profile.id),
                email: Some(profile.email),
            },
            None => {
                let claims = decode_claims(&access).unwrap_or_default();
                SessionStatus::LoggedIn {
                    user_id: claims.sub,
                    email: claims.email,
                }
            }
        }
    }

    /// Restore the session on startup. Runs once.
    ///
    /// Reads the stored access token, refreshing it when absent or expired,
    /// then hydrates the identity from the cached profile, the profile
    /// endpoint, or the token claims, in that order. When no usable access
    /// token can be obtained the store is cleared and the user left absent.
    /// The loading flag drops exactly once, at the end, whatever the outcome.
    pub async fn restore_session(&self) {
        let mut access = self.vault.get_access_token().ok().flatten();
        if access.is_none() || is_expired(access.as_deref(), DEFAULT_EXPIRY_MARGIN_MS) {
            access = self.refresher.refresh().await;
        }

        match access {
            Some(access) => match self.load_or_fetch_profile(&access).await {
                Some(profile) => {
                    info!(user_id = %profile.id, "Session restored");
                    *self.user.lock().unwrap() = Some(profile);
                }
                None => {
                    debug!("Session token restored but no profile available");
                }
            },
            None => {
                // No usable token; drop whatever partial state was persisted.
                if let Err(e) = self.vault.clear_session() {
                    warn!("Failed to clear stale session: {}", e);
                }
                *self.user.lock().unwrap() = None;
                debug!("No session to restore");
            }
        }

        self.loading.store(false, Ordering::SeqCst);
    }

    /// Hydrate the profile: cached copy first, then the profile endpoint,
    /// then a best-effort partial profile from the token claims.
    async fn load_or_fetch_profile(&self, access_token: &str) -> Option<UserProfile> {
        match self.vault.get_user_profile() {
            Ok(Some(cached)) => return Some(cached),
            Ok(None) => {}
            Err(e) => warn!("Failed to read cached profile: {}", e),
        }

        if let Some(profile) = self.fetch_profile(access_token).await {
            self.cache_profile(&profile);
            return Some(profile);
        }

        let claims = decode_claims(access_token)?;
        let email = claims.email?;
        let fallback = UserProfile {
            id: claims.sub.unwrap_or_else(|| "unknown".to_string()),
            first_name: claims.first_name.unwrap_or_else(|| "User".to_string()),
            last_name: claims.last_name.unwrap_or_default(),
            email,
            phone: claims.phone.unwrap_or_default(),
            role: claims.role.unwrap_or_default(),
        };
        self.cache_profile(&fallback);
        Some(fallback)
    }

    /// Fetch the profile from the identity service.
    async fn fetch_profile(&self, access_token: &str) -> Option<UserProfile> {
        let url = format!("{}/api/v1/auth/me", self.auth_host);

        let response = match self
            .http_client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", access_token))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                debug!("Profile fetch failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            debug!(status = %response.status(), "Profile fetch rejected");
            return None;
        }

        let envelope: ProfileEnvelope = response.json().await.ok()?;
        envelope.data.or(envelope.user)
    }

    fn cache_profile(&self, profile: &UserProfile) {
        if let Err(e) = self.vault.set_user_profile(profile) {
            warn!("Failed to cache profile: {}", e);
        }
    }

    /// Login with email and password.
    ///
    /// On success both tokens and a profile are stored and the identity set.
    /// Any failure returns false without altering existing session state.
    pub async fn login(&self, email: &str, password: &str) -> bool {
        let url = format!("{}/api/v1/auth/login", self.auth_host);

        debug!(email = %email, "Attempting login");

        let response = match self
            .http_client
            .post(&url)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Login request failed: {}", e);
                return false;
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "Login rejected");
            return false;
        }

        let envelope: LoginEnvelope = match response.json().await {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Malformed login response: {}", e);
                return false;
            }
        };

        let data = match envelope.data {
            Some(data) => data,
            None => return false,
        };
        let token = match data.token {
            Some(token) => token,
            None => return false,
        };

        if let Err(e) = self.vault.set_access_token(&token) {
            warn!("Failed to store access token: {}", e);
            return false;
        }
        if let Some(refresh) = data.refresh_token {
            if let Err(e) = self.vault.set_refresh_token(&refresh) {
                warn!("Failed to store refresh token: {}", e);
            }
        }

        // Prefer the real profile; fall back to a minimal one from the
        // login email so a flaky profile endpoint does not fail the login.
        let profile = match self.fetch_profile(&token).await {
            Some(profile) => profile,
            None => UserProfile {
                id: "unknown".to_string(),
                first_name: "User".to_string(),
                last_name: String::new(),
                email: email.to_string(),
                phone: String::new(),
                role: Role::Student,
            },
        };
        self.cache_profile(&profile);

        info!(user_id = %profile.id, "Login successful");
        *self.user.lock().unwrap() = Some(profile);
        true
    }

    /// Register a new student account.
    ///
    /// The response nests the token pair under `data.token` and may carry
    /// the created user; when it does not, the profile endpoint is asked.
    pub async fn register(
        &self,
        first_name: &str,
        last_name: &str,
        email: &str,
        phone: &str,
        password: &str,
    ) -> bool {
        let url = format!("{}/api/v1/auth/register", self.auth_host);

        debug!(email = %email, "Attempting registration");

        let response = match self
            .http_client
            .post(&url)
            .json(&serde_json::json!({
                "firstName": first_name,
                "lastName": last_name,
                "email": email,
                "phone": phone,
                "password": password,
                "role": "student",
            }))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Registration request failed: {}", e);
                return false;
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "Registration rejected");
            return false;
        }

        let envelope: RegisterEnvelope = match response.json().await {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Malformed registration response: {}", e);
                return false;
            }
        };

        let data = match envelope.data {
            Some(data) => data,
            None => return false,
        };
        let pair = match data.token {
            Some(pair) => pair,
            None => return false,
        };
        let token = match pair.token {
            Some(token) => token,
            None => return false,
        };

        if let Err(e) = self.vault.set_access_token(&token) {
            warn!("Failed to store access token: {}", e);
            return false;
        }
        if let Some(refresh) = pair.refresh_token {
            if let Err(e) = self.vault.set_refresh_token(&refresh) {
                warn!("Failed to store refresh token: {}", e);
            }
        }

        let profile = match data.user {
            Some(profile) => profile,
            None => match self.fetch_profile(&token).await {
                Some(profile) => profile,
                // The registration form already had every field.
                None => UserProfile {
                    id: "unknown".to_string(),
                    first_name: first_name.to_string(),
                    last_name: last_name.to_string(),
                    email: email.to_string(),
                    phone: phone.to_string(),
                    role: Role::Student,
                },
            },
        };
        self.cache_profile(&profile);

        info!(user_id = %profile.id, "Registration successful");
        *self.user.lock().unwrap() = Some(profile);
        true
    }

    /// Logout: best-effort server notification, unconditional local clear.
    ///
    /// Idempotent — when already logged out this performs the same
    /// clear/navigate with no error.
    pub async fn logout(&self) {
        if let Ok(Some(refresh_token)) = self.vault.get_refresh_token() {
            let url = format!("{}/api/v1/auth/logout", self.auth_host);
            let result = self
                .http_client
                .post(&url)
                .json(&serde_json::json!({ "refreshToken": refresh_token }))
                .send()
                .await;
            if let Err(e) = result {
                debug!("Logout notification failed: {}", e);
            }
        }

        if let Err(e) = self.vault.clear_session() {
            warn!("Failed to clear session: {}", e);
        }
        *self.user.lock().unwrap() = None;

        if let Some(navigate) = self.nav_callback.lock().unwrap().as_ref() {
            navigate();
        }

        info!("Logged out");
    }

    /// Load the aggregated profile from the user service, through the
    /// gateway, and re-sync the cached identity from it.
    ///
    /// `Ok(None)` means the service declined (including a 401 that survived
    /// the gateway's retry, after which the session is already gone).
    pub async fn load_profile(&self) -> AuthResult<Option<UserProfile>> {
        let url = format!("{}/api/v1/users/profile", self.user_host);
        let response = self.gateway.request(&url, RequestOptions::default()).await?;
        self.sync_profile_response(response).await
    }

    /// Save profile fields via the user service and re-sync the cache from
    /// the response.
    pub async fn save_profile(&self, update: ProfileUpdate) -> AuthResult<Option<UserProfile>> {
        let url = format!("{}/api/v1/users/profile", self.user_host);
        let body = serde_json::to_value(&update)?;
        let response = self
            .gateway
            .request(&url, RequestOptions::json(Method::PUT, body))
            .await?;
        self.sync_profile_response(response).await
    }

    async fn sync_profile_response(
        &self,
        response: reqwest::Response,
    ) -> AuthResult<Option<UserProfile>> {
        if !response.status().is_success() {
            debug!(status = %response.status(), "Profile request declined");
            return Ok(None);
        }

        let envelope: AggregatedEnvelope = match response.json().await {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!("Malformed profile response: {}", e);
                return Ok(None);
            }
        };
        let user = envelope.data.and_then(|p| p.user);

        match user {
            Some(user) => {
                let profile = user.into_profile();
                self.cache_profile(&profile);
                *self.user.lock().unwrap() = Some(profile.clone());
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryStorage;

    fn test_profile() -> UserProfile {
        UserProfile {
            id: "user-1".to_string(),
            first_name: "Ann".to_string(),
            last_name: "X".to_string(),
            email: "a@b.com".to_string(),
            phone: String::new(),
            role: Role::Student,
        }
    }

    fn create_test_manager() -> SessionManager {
        let vault = Arc::new(SessionVault::new(Box::new(MemoryStorage::new())));
        // Unroutable host: anything that reaches the network fails fast.
        SessionManager::new(vault, "http://127.0.0.1:1", "http://127.0.0.1:1")
    }

    #[test]
    fn test_initial_state() {
        let manager = create_test_manager();
        assert!(manager.is_loading());
        assert!(manager.current_user().is_none());
        assert!(matches!(manager.status(), SessionStatus::NotLoggedIn));
    }

    #[tokio::test]
    async fn test_restore_with_empty_store() {
        let manager = create_test_manager();

        manager.restore_session().await;

        assert!(!manager.is_loading());
        assert!(manager.current_user().is_none());
    }

    #[tokio::test]
    async fn test_logout_idempotent() {
        let manager = create_test_manager();
        manager
            .vault
            .set_session("access-1", "refresh-1", &test_profile())
            .unwrap();

        manager.logout().await;
        assert!(manager.current_user().is_none());
        assert!(!manager.vault.has_session().unwrap());

        // Second logout: same end state, no error.
        manager.logout().await;
        assert!(manager.current_user().is_none());
        assert!(!manager.vault.has_session().unwrap());
    }

    #[tokio::test]
    async fn test_logout_invokes_navigation() {
        use std::sync::atomic::AtomicUsize;

        let manager = create_test_manager();
        let navigations = Arc::new(AtomicUsize::new(0));
        let counter = navigations.clone();
        manager.set_navigation_callback(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        manager.logout().await;
        manager.logout().await;

        assert_eq!(navigations.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_status_expired_token() {
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;
        use base64::Engine;

        let manager = create_test_manager();
        let exp = chrono::Utc::now().timestamp() - 3600;
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"sub":"u-1","exp":{}}}"#, exp));
        manager
            .vault
            .set_access_token(&format!("h.{}.s", payload))
            .unwrap();

        assert!(matches!(manager.status(), SessionStatus::Expired));
    }

    #[test]
    fn test_status_logged_in_from_cache() {
        let manager = create_test_manager();
        manager
            .vault
            .set_session("opaque-token", "refresh-1", &test_profile())
            .unwrap();

        match manager.status() {
            SessionStatus::LoggedIn { user_id, email } => {
                assert_eq!(user_id.as_deref(), Some("user-1"));
                assert_eq!(email.as_deref(), Some("a@b.com"));
            }
            other => panic!("Expected LoggedIn, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_login_failure_leaves_state_untouched() {
        let manager = create_test_manager();
        manager
            .vault
            .set_session("access-1", "refresh-1", &test_profile())
            .unwrap();

        // The host is unroutable, so the login request fails.
        assert!(!manager.login("a@b.com", "pw").await);

        // Existing session state is not disturbed by a failed login.
        assert_eq!(
            manager.vault.get_access_token().unwrap(),
            Some("access-1".to_string())
        );
        assert_eq!(
            manager.vault.get_refresh_token().unwrap(),
            Some("refresh-1".to_string())
        );
    }

    #[test]
    fn test_profile_update_serialization() {
        let update = ProfileUpdate {
            first_name: "Ann".to_string(),
            last_name: "X".to_string(),
            display_name: None,
        };
        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains("\"firstName\":\"Ann\""));
        assert!(!json.contains("displayName"));

        let update = ProfileUpdate {
            display_name: Some("Annie".to_string()),
            ..update
        };
        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains("\"displayName\":\"Annie\""));
    }
}
