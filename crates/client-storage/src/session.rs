//! High-level API for the persisted session.

use crate::{SessionStorage, StorageKeys, StorageResult};
use serde::{Deserialize, Serialize};

/// Marketplace role carried in profiles and token claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Tutor,
}

impl Default for Role {
    fn default() -> Self {
        Role::Student
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Student => write!(f, "student"),
            Role::Tutor => write!(f, "tutor"),
        }
    }
}

/// Cached user profile snapshot.
///
/// Field names follow the wire format of the auth service (camelCase).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub role: Role,
}

/// High-level API for storing and retrieving the session.
///
/// The vault exclusively owns the persisted fields; other components read
/// and write through it and never cache a token beyond a single call.
pub struct SessionVault {
    storage: Box<dyn SessionStorage>,
}

impl SessionVault {
    /// Create a new vault with the given storage backend
    pub fn new(storage: Box<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    /// Store the access token
    pub fn set_access_token(&self, token: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::ACCESS_TOKEN, token)
    }

    /// Retrieve the access token
    pub fn get_access_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::ACCESS_TOKEN)
    }

    /// Store the refresh token
    pub fn set_refresh_token(&self, token: &str) -> StorageResult<()> {
        self.storage.set(StorageKeys::REFRESH_TOKEN, token)
    }

    /// Retrieve the refresh token
    pub fn get_refresh_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::REFRESH_TOKEN)
    }

    /// Store the cached user profile
    pub fn set_user_profile(&self, profile: &UserProfile) -> StorageResult<()> {
        let json = serde_json::to_string(profile)
            .map_err(|e| crate::StorageError::Encoding(e.to_string()))?;
        self.storage.set(StorageKeys::USER_DATA, &json)
    }

    /// Retrieve the cached user profile
    pub fn get_user_profile(&self) -> StorageResult<Option<UserProfile>> {
        match self.storage.get(StorageKeys::USER_DATA)? {
            Some(json) => {
                let profile: UserProfile = serde_json::from_str(&json)
                    .map_err(|e| crate::StorageError::Encoding(e.to_string()))?;
                Ok(Some(profile))
            }
            None => Ok(None),
        }
    }

    /// Check if a session exists.
    ///
    /// A cached profile without an access token does not count: the user is
    /// unauthenticated regardless of cache contents.
    pub fn has_session(&self) -> StorageResult<bool> {
        self.storage.has(StorageKeys::ACCESS_TOKEN)
    }

    /// Store a complete session (both tokens and the profile)
    pub fn set_session(
        &self,
        access_token: &str,
        refresh_token: &str,
        profile: &UserProfile,
    ) -> StorageResult<()> {
        self.set_access_token(access_token)?;
        self.set_refresh_token(refresh_token)?;
        self.set_user_profile(profile)?;
        Ok(())
    }

    /// Clear the session (all three fields)
    pub fn clear_session(&self) -> StorageResult<()> {
        let _ = self.storage.delete(StorageKeys::ACCESS_TOKEN);
        let _ = self.storage.delete(StorageKeys::REFRESH_TOKEN);
        let _ = self.storage.delete(StorageKeys::USER_DATA);
        Ok(())
    }
}
