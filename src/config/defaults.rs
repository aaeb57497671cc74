//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

/// Returns `true` (for serde defaults).
pub fn default_true() -> bool {
    true
}

// =============================================================================
// Chat Defaults
// =============================================================================

pub fn default_chat_host() -> String {
    "irc.chat.twitch.tv".to_string()
}

pub fn default_chat_port() -> u16 {
    6697
}

pub fn default_capabilities() -> Vec<String> {
    twitchlink_proto::DEFAULT_CAPABILITIES
        .iter()
        .map(|c| c.to_string())
        .collect()
}

pub fn default_connect_timeout() -> u64 {
    10
}

pub fn default_ready_timeout() -> u64 {
    10
}

// =============================================================================
// Heartbeat Defaults
// =============================================================================

pub fn default_heartbeat_interval() -> u64 {
    60
}

pub fn default_heartbeat_timeout() -> u64 {
    10
}

// =============================================================================
// PubSub Defaults
// =============================================================================

pub fn default_pubsub_url() -> String {
    "wss://pubsub-edge.twitch.tv".to_string()
}

/// PubSub asks for a PING at least once every five minutes.
pub fn default_pubsub_heartbeat_interval() -> u64 {
    180
}

// =============================================================================
// API Defaults
// =============================================================================

pub fn default_api_base_url() -> String {
    "https://api.twitch.tv/helix".to_string()
}
