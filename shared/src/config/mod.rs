//! Configuration module for mo11y.
//!
//! This module contains the store connection settings.

pub mod store;

pub use store::{ConfigError, StoreBackend, StoreConfig, DEFAULT_DB_PATH};
