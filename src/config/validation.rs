//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::{Config, HeartbeatConfig};
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("chat.host is required")]
    MissingChatHost,
    #[error("chat.port must not be 0")]
    InvalidChatPort,
    #[error("chat.ready_timeout must be greater than 0")]
    ZeroReadyTimeout,
    #[error("chat.oauth_token is set but chat.login is not")]
    TokenWithoutLogin,
    #[error("{section}.heartbeat.{field} must be greater than 0")]
    ZeroHeartbeat {
        section: &'static str,
        field: &'static str,
    },
    #[error("{section}.heartbeat.timeout_secs ({timeout}) must be shorter than interval_secs ({interval})")]
    HeartbeatTimeoutTooLong {
        section: &'static str,
        timeout: u64,
        interval: u64,
    },
    #[error("pubsub.url must start with ws:// or wss://, got '{0}'")]
    InvalidPubSubUrl(String),
    #[error("api.client_id is required")]
    MissingClientId,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.chat.host.trim().is_empty() {
        errors.push(ValidationError::MissingChatHost);
    }
    if config.chat.port == 0 {
        errors.push(ValidationError::InvalidChatPort);
    }
    if config.chat.ready_timeout == 0 {
        errors.push(ValidationError::ZeroReadyTimeout);
    }
    if config.chat.oauth_token.is_some() && config.chat.login.is_none() && config.api.is_none() {
        errors.push(ValidationError::TokenWithoutLogin);
    }
    check_heartbeat("chat", &config.chat.heartbeat, &mut errors);

    if let Some(pubsub) = &config.pubsub {
        if !(pubsub.url.starts_with("ws://") || pubsub.url.starts_with("wss://")) {
            errors.push(ValidationError::InvalidPubSubUrl(pubsub.url.clone()));
        }
        check_heartbeat("pubsub", &pubsub.heartbeat, &mut errors);
    }

    if let Some(api) = &config.api
        && api.client_id.trim().is_empty()
    {
        errors.push(ValidationError::MissingClientId);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_heartbeat(
    section: &'static str,
    heartbeat: &HeartbeatConfig,
    errors: &mut Vec<ValidationError>,
) {
    if heartbeat.interval_secs == 0 {
        errors.push(ValidationError::ZeroHeartbeat {
            section,
            field: "interval_secs",
        });
    }
    if heartbeat.timeout_secs == 0 {
        errors.push(ValidationError::ZeroHeartbeat {
            section,
            field: "timeout_secs",
        });
    }
    if heartbeat.interval_secs > 0 && heartbeat.timeout_secs >= heartbeat.interval_secs {
        errors.push(ValidationError::HeartbeatTimeoutTooLong {
            section,
            timeout: heartbeat.timeout_secs,
            interval: heartbeat.interval_secs,
        });
    }
}
