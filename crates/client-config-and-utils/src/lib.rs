//! Core types, configuration, and utilities for the Tutorlink client.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{Config, DEFAULT_AUTH_HOST, DEFAULT_LOG_LEVEL, DEFAULT_USER_HOST};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level};
pub use paths::Paths;
