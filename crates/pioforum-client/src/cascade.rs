//! Removal of every message belonging to a deleted channel.

use pioforum_shared::{ChannelId, MessageId};
use pioforum_store::DocumentStore;
use tracing::{debug, info};

use crate::error::ForumResult;

/// Delete all messages of `channel_id` in one batch. Returns how many were
/// removed; zero when the channel had none.
pub async fn delete_messages_for_channel(
    store: &dyn DocumentStore,
    channel_id: ChannelId,
) -> ForumResult<usize> {
    let ids: Vec<MessageId> = store
        .list_messages(channel_id)
        .await?
        .into_iter()
        .map(|m| m.id)
        .collect();

    if ids.is_empty() {
        debug!(%channel_id, "no messages to cascade");
        return Ok(0);
    }

    let removed = store.delete_messages(&ids).await?;
    info!(%channel_id, removed, "channel messages deleted");
    Ok(removed)
}
