//! CLI command implementations.

pub mod auth;
pub mod profile;

use anyhow::Result;
use auth_engine::SessionManager;
use client_config_and_utils::{Config, Paths};
use std::sync::Arc;

/// Build the session manager over the file-backed vault.
pub fn build_session_manager(config: &Config, paths: &Paths) -> Result<SessionManager> {
    paths.ensure_dirs()?;
    let vault = Arc::new(client_storage::create_session_vault(paths)?);
    Ok(SessionManager::from_config(config, vault))
}
