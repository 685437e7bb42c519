use pioforum_shared::ChannelId;
use pioforum_store::{Channel, Message};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::error::ForumError;
use crate::session::SessionState;

pub const EVENT_SESSION_CHANGED: &str = "session-changed";
pub const EVENT_CHANNELS_UPDATED: &str = "channels-updated";
pub const EVENT_ACTIVE_CHANNEL_CHANGED: &str = "active-channel-changed";
pub const EVENT_MESSAGES_UPDATED: &str = "messages-updated";
pub const EVENT_SUBSCRIPTION_FAILED: &str = "subscription-failed";
pub const EVENT_NOTICE: &str = "notice";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Success,
    Warning,
    Error,
}

/// A short user-facing message about the outcome of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub severity: Severity,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            text: text.into(),
        }
    }

    /// Input and sign-in problems are warnings shown as-is. Other errors are
    /// shown as-is too, except remote failures, which get the action-specific
    /// `fallback` text.
    pub fn from_error(err: &ForumError, fallback: &str) -> Self {
        match err {
            ForumError::EmptyInput { .. }
            | ForumError::TooLong { .. }
            | ForumError::Unauthenticated
            | ForumError::NoActiveChannel => Self::warning(err.to_string()),
            ForumError::RemoteUnavailable(_) | ForumError::Closed => Self {
                severity: Severity::Error,
                text: fallback.to_string(),
            },
            other => Self {
                severity: Severity::Error,
                text: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum ForumEvent {
    SessionChanged(SessionState),
    ChannelsUpdated(Vec<Channel>),
    ActiveChannelChanged(Option<Channel>),
    MessagesUpdated {
        channel_id: ChannelId,
        messages: Vec<Message>,
    },
    SubscriptionFailed {
        collection: &'static str,
        reason: String,
    },
    Notice(Notice),
}

impl ForumEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ForumEvent::SessionChanged(_) => EVENT_SESSION_CHANGED,
            ForumEvent::ChannelsUpdated(_) => EVENT_CHANNELS_UPDATED,
            ForumEvent::ActiveChannelChanged(_) => EVENT_ACTIVE_CHANNEL_CHANGED,
            ForumEvent::MessagesUpdated { .. } => EVENT_MESSAGES_UPDATED,
            ForumEvent::SubscriptionFailed { .. } => EVENT_SUBSCRIPTION_FAILED,
            ForumEvent::Notice(_) => EVENT_NOTICE,
        }
    }
}

pub fn emit_event(events: &broadcast::Sender<ForumEvent>, event: ForumEvent) {
    let name = event.name();
    if events.send(event).is_err() {
        tracing::trace!(event = name, "No event listeners");
    }
}
