//! Client configuration loaded from environment variables.
//!
//! All settings have defaults so a forum can start with zero configuration
//! for local development; without `FORUM_PRIVILEGED_UID` nobody can manage
//! channels.

use std::path::PathBuf;
use std::time::Duration;

use pioforum_shared::constants::{
    DEFAULT_CHANNEL_NAME, DEFAULT_RETRY_BASE_MS, DEFAULT_SUBSCRIBE_ATTEMPTS, MAX_RETRY_DELAY_MS,
};
use pioforum_shared::UserId;

use crate::retry::RetryPolicy;

/// Forum client configuration.
#[derive(Debug, Clone)]
pub struct ForumConfig {
    /// Identity allowed to create, rename and delete channels.
    /// Env: `FORUM_PRIVILEGED_UID`
    /// Default: none.
    pub privileged_uid: Option<UserId>,

    /// SQLite file backing the local document store.
    /// Env: `FORUM_DATABASE_PATH`
    /// Default: platform data directory.
    pub database_path: Option<PathBuf>,

    /// Name of the channel created for an empty forum.
    /// Env: `FORUM_DEFAULT_CHANNEL`
    /// Default: `"General"`
    pub default_channel: String,

    /// Attempts made to open a live subscription before giving up.
    /// Env: `FORUM_SUBSCRIBE_ATTEMPTS`
    /// Default: `3`
    pub subscribe_attempts: u32,

    /// Delay before the first retry; doubles on every further attempt.
    /// Env: `FORUM_RETRY_BASE_MS`
    /// Default: `200`
    pub retry_base: Duration,

    /// Capacity of the forum event broadcast.
    /// Env: `FORUM_EVENT_BUFFER`
    /// Default: `256`
    pub event_buffer: usize,
}

impl Default for ForumConfig {
    fn default() -> Self {
        Self {
            privileged_uid: None,
            database_path: None,
            default_channel: DEFAULT_CHANNEL_NAME.to_string(),
            subscribe_attempts: DEFAULT_SUBSCRIBE_ATTEMPTS,
            retry_base: Duration::from_millis(DEFAULT_RETRY_BASE_MS),
            event_buffer: 256,
        }
    }
}

impl ForumConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(uid) = lookup("FORUM_PRIVILEGED_UID") {
            let uid = uid.trim();
            if !uid.is_empty() {
                config.privileged_uid = Some(UserId::new(uid));
            }
        }

        if let Some(path) = lookup("FORUM_DATABASE_PATH") {
            if !path.trim().is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        if let Some(name) = lookup("FORUM_DEFAULT_CHANNEL") {
            match pioforum_shared::validate::channel_name(&name) {
                Ok(name) => config.default_channel = name,
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid FORUM_DEFAULT_CHANNEL, using default");
                }
            }
        }

        if let Some(val) = lookup("FORUM_SUBSCRIBE_ATTEMPTS") {
            match val.parse::<u32>() {
                Ok(n) if n > 0 => config.subscribe_attempts = n,
                _ => tracing::warn!(value = %val, "Invalid FORUM_SUBSCRIBE_ATTEMPTS, using default"),
            }
        }

        if let Some(val) = lookup("FORUM_RETRY_BASE_MS") {
            match val.parse::<u64>() {
                Ok(ms) => config.retry_base = Duration::from_millis(ms),
                Err(_) => tracing::warn!(value = %val, "Invalid FORUM_RETRY_BASE_MS, using default"),
            }
        }

        if let Some(val) = lookup("FORUM_EVENT_BUFFER") {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => config.event_buffer = n,
                _ => tracing::warn!(value = %val, "Invalid FORUM_EVENT_BUFFER, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.subscribe_attempts,
            base_delay: self.retry_base,
            max_delay: Duration::from_millis(MAX_RETRY_DELAY_MS),
        }
    }
}
