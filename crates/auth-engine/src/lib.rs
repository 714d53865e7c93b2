//! Session and token lifecycle for the Tutorlink client.
//!
//! This crate provides:
//! - Token claims inspection without signature verification
//! - Refresh token exchange with single-flight deduplication
//! - An authenticated request gateway with a refresh-and-retry-once policy
//! - Explicit FSM-based retry state tracking
//! - The `SessionManager` lifecycle controller (restore, login, register,
//!   logout, profile sync)

mod claims;
mod error;
mod fsm;
mod gateway;
mod refresh;
mod session;

pub use claims::{decode_claims, is_expired, TokenClaims, DEFAULT_EXPIRY_MARGIN_MS};
pub use error::{AuthError, AuthResult};
pub use fsm::request_machine;
pub use fsm::{RequestMachine, RequestMachineInput, RequestMachineState};
pub use gateway::{AuthGateway, RequestOptions, SessionExpiredCallback};
pub use refresh::TokenRefresher;
pub use session::{
    NavigationCallback, ProfileUpdate, SessionManager, SessionStatus,
};

#[cfg(test)]
pub(crate) mod test_support {
    use client_storage::{SessionStorage, StorageResult};

    /// In-memory storage for testing.
    pub struct MemoryStorage {
        data: std::sync::Mutex<std::collections::HashMap<String, String>>,
    }

    impl MemoryStorage {
        pub fn new() -> Self {
            Self {
                data: std::sync::Mutex::new(std::collections::HashMap::new()),
            }
        }
    }

    impl SessionStorage for MemoryStorage {
        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            let mut data = self.data.lock().unwrap();
            data.insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            let data = self.data.lock().unwrap();
            Ok(data.get(key).cloned())
        }

        fn delete(&self, key: &str) -> StorageResult<bool> {
            let mut data = self.data.lock().unwrap();
            Ok(data.remove(key).is_some())
        }
    }
}
