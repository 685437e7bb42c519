//! The single focused channel.
//!
//! The selection is always either `Unselected` (no channels) or a member of
//! the most recent channel snapshot. When the selected channel disappears the
//! first remaining channel takes over.

use pioforum_shared::ChannelId;
use pioforum_store::Channel;
use serde::Serialize;
use tracing::debug;

use crate::error::{ForumError, ForumResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "channelId", rename_all = "camelCase")]
pub enum Selection {
    #[default]
    Unselected,
    Selected(ChannelId),
}

impl Selection {
    pub fn channel_id(&self) -> Option<ChannelId> {
        match self {
            Selection::Unselected => None,
            Selection::Selected(id) => Some(*id),
        }
    }
}

#[derive(Debug, Default)]
pub struct ActiveChannelSelector {
    selection: Selection,
}

impl ActiveChannelSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Selection {
        self.selection
    }

    /// Re-resolve against a fresh channel snapshot. Returns the new selection
    /// when it changed.
    pub fn reconcile(&mut self, channels: &[Channel]) -> Option<Selection> {
        let next = match self.selection {
            Selection::Selected(id) if channels.iter().any(|c| c.id == id) => return None,
            Selection::Selected(id) => {
                debug!(channel_id = %id, "active channel disappeared");
                first_of(channels)
            }
            Selection::Unselected => first_of(channels),
        };

        if next == self.selection {
            return None;
        }
        self.selection = next;
        Some(next)
    }

    /// Explicit pick. `id` must be in `channels`.
    pub fn select(&mut self, id: ChannelId, channels: &[Channel]) -> ForumResult<Option<Selection>> {
        if !channels.iter().any(|c| c.id == id) {
            return Err(ForumError::NotFound("Channel".into()));
        }
        let next = Selection::Selected(id);
        if next == self.selection {
            return Ok(None);
        }
        self.selection = next;
        Ok(Some(next))
    }
}

fn first_of(channels: &[Channel]) -> Selection {
    channels
        .first()
        .map_or(Selection::Unselected, |c| Selection::Selected(c.id))
}
