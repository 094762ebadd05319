//! Pang Common - Shared configuration, errors and logging for the Pang session broker.
//!
//! This crate provides:
//! - Configuration types and loading (file + environment overrides)
//! - The shared error type
//! - Logging setup with noise filtering
//! - Small utilities used when logging request data

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod util;

pub use config::{
    BackendConfig, Config, KeepaliveConfig, ObservabilityConfig, ServerConfig, SessionConfig,
};
pub use error::{Error, Result};
