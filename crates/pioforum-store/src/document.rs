//! The remote document store as seen by the client core.
//!
//! Implementations own persistence, id assignment and timestamps. Callers own
//! validation, privilege checks and the order in which multi-step operations
//! run.

use async_trait::async_trait;
use pioforum_shared::{ChannelId, MessageId, UserId};

use crate::error::Result;
use crate::models::{Channel, Message, NewMessage, Profile};
use crate::subscription::Subscription;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    // -- channels --

    /// Create a channel with an already-validated name. Fails with
    /// `Conflict` when the name is taken, ignoring case.
    async fn create_channel(&self, name: &str) -> Result<Channel>;

    /// Rename a channel. Fails with `NotFound` or `Conflict`.
    async fn rename_channel(&self, id: ChannelId, name: &str) -> Result<Channel>;

    /// Delete a channel. Returns `false` when it did not exist. Does not touch
    /// the channel's messages.
    async fn delete_channel(&self, id: ChannelId) -> Result<bool>;

    /// All channels in arrival order.
    async fn list_channels(&self) -> Result<Vec<Channel>>;

    /// Live view of [`DocumentStore::list_channels`].
    async fn watch_channels(&self) -> Result<Subscription<Vec<Channel>>>;

    // -- messages --

    /// Append a message; the store assigns `id` and `created_at`.
    async fn append_message(&self, message: NewMessage) -> Result<Message>;

    /// Messages of one channel ordered by `created_at` ascending.
    async fn list_messages(&self, channel_id: ChannelId) -> Result<Vec<Message>>;

    /// Live view of [`DocumentStore::list_messages`].
    async fn watch_messages(&self, channel_id: ChannelId) -> Result<Subscription<Vec<Message>>>;

    /// Delete messages as one batch. Returns how many were removed.
    async fn delete_messages(&self, ids: &[MessageId]) -> Result<usize>;

    // -- profiles --

    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>>;

    async fn put_profile(&self, profile: &Profile) -> Result<()>;
}
