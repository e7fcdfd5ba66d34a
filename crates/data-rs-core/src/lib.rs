//! # data-rs-core
//!
//! Core types shared by every data-rs crate: the error taxonomy, settings,
//! settings loading, and tracing setup. This crate has no database
//! dependencies.
//!
//! ## Modules
//!
//! - [`error`] - Error types and result aliases
//! - [`settings`] - Engine and database settings
//! - [`settings_loader`] - Loading settings from TOML, JSON, and the environment
//! - [`logging`] - Tracing-based logging integration

pub mod error;
pub mod logging;
pub mod settings;
pub mod settings_loader;

// Re-export the most commonly used types at the crate root.
pub use error::{DataError, DataResult};
pub use settings::{DatabaseSettings, Settings};
