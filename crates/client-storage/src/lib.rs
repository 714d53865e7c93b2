//! Durable session storage for the Tutorlink client.
//!
//! This crate provides the persisted half of the session: a minimal durable
//! key-value trait, a JSON-file backend, and the typed `SessionVault` API
//! the rest of the client goes through. No validation happens here — the
//! vault is a dumb, durable surface.

mod file;
mod keys;
mod session;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use session::{Role, SessionVault, UserProfile};
pub use traits::SessionStorage;

use client_config_and_utils::Paths;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the default file-backed storage under the client's base directory.
pub fn create_storage(paths: &Paths) -> StorageResult<Box<dyn SessionStorage>> {
    let storage = FileStorage::open(paths.session_file())?;
    Ok(Box::new(storage))
}

/// Create a SessionVault with the default file-backed storage.
pub fn create_session_vault(paths: &Paths) -> StorageResult<SessionVault> {
    let storage = create_storage(paths)?;
    Ok(SessionVault::new(storage))
}
