//! Record shapes stored in the forum collections.
//!
//! Every struct derives `Serialize` so it can be handed straight to a UI
//! layer.

use chrono::{DateTime, Utc};
use pioforum_shared::{ChannelId, Identity, MessageId, UserId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// A named conversation partition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    /// Store-assigned identifier.
    pub id: ChannelId,
    /// Display name, unique case-insensitively.
    pub name: String,
    /// When the store accepted the channel.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// An immutable post inside a channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    /// Author display name at send time.
    pub author_name: String,
    /// Author avatar URL at send time; empty when the author had none.
    pub author_avatar: String,
    pub text: String,
    /// Store-assigned, strictly increasing across the store.
    pub created_at: DateTime<Utc>,
}

/// A message as submitted by a client, before the store assigns `id` and
/// `created_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMessage {
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub author_name: String,
    pub author_avatar: String,
    pub text: String,
}

impl NewMessage {
    /// Build a message snapshotting the author's current display fields.
    pub fn from_author(channel_id: ChannelId, author: &Identity, text: String) -> Self {
        Self {
            channel_id,
            author_id: author.id.clone(),
            author_name: author.display_label(),
            author_avatar: author.avatar_url.clone().unwrap_or_default(),
            text,
        }
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Mirror of an identity, created on first sign-in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_id: UserId,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn from_identity(identity: &Identity, now: DateTime<Utc>) -> Self {
        Self {
            user_id: identity.id.clone(),
            display_name: identity.display_name.clone(),
            avatar_url: identity.avatar_url.clone(),
            is_anonymous: identity.is_anonymous,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the provider's display fields differ from this record.
    pub fn is_stale(&self, identity: &Identity) -> bool {
        self.display_name != identity.display_name || self.avatar_url != identity.avatar_url
    }
}
