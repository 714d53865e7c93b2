//! Storage key constants.
//!
//! These names are stable: a session written by one build must be readable
//! by the next, and they match the keys the web client persists under.

/// Storage keys used by the client
pub struct StorageKeys;

impl StorageKeys {
    /// Short-lived bearer access token
    pub const ACCESS_TOKEN: &'static str = "accessToken";

    /// Long-lived refresh token
    pub const REFRESH_TOKEN: &'static str = "refreshToken";

    /// Cached user profile (JSON)
    pub const USER_DATA: &'static str = "userData";
}
