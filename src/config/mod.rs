//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Config struct definitions (Config, ChatConfig, PubSubConfig, HeartbeatConfig)
//! - [`defaults`]: serde default value functions
//! - [`validation`]: startup validation (ValidationError)

mod defaults;
mod types;
mod validation;

pub use types::{
    ApiConfig, ChatConfig, Config, ConfigError, HeartbeatConfig, PubSubConfig, ReconnectConfig,
};
pub use validation::{ValidationError, validate};
