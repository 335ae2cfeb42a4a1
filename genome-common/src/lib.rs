//! Genome Common - Shared types, utilities, and configuration for the GenomeGPT services.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup and request trace context
//! - String helpers for log output

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod config_loader;
pub mod error;
pub mod logging;
pub mod util;
pub mod validation;

pub use config::{
    ChatConfig, ClassifierErrorPolicy, Config, GatekeeperConfig, LlmConfig, NetworkConfig,
    ObservabilityConfig, RelayConfig, SecretsConfig, UpstreamFailurePolicy,
};
pub use error::{Error, Result};
pub use validation::{Validate, ValidationError, ValidationResult};
