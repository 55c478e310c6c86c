//! Core types, configuration, and utilities shared across the CodeDeck client.

mod config;
mod error;
mod logging;
mod navigator;
mod paths;

pub use config::{Config, DEFAULT_API_URL, DEFAULT_CALLBACK_PORT, DEFAULT_IDENTITY_URL};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use navigator::{Navigator, NullNavigator};
pub use paths::Paths;
