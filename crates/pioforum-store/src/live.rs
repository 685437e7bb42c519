//! SQLite-backed [`DocumentStore`] with live query subscriptions.
//!
//! Every write publishes a [`Change`] on a broadcast channel after the row is
//! committed. Each open subscription runs a small task that re-runs its query
//! whenever a relevant change arrives and pushes the new snapshot to the
//! subscriber. Changes from one `LiveStore` reach its subscribers in the order
//! the writes happened.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pioforum_shared::constants::{
    CHANGE_BUFFER, CHANNELS_COLLECTION, MESSAGES_COLLECTION, SNAPSHOT_BUFFER,
};
use pioforum_shared::{ChannelId, MessageId, UserId};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::database::{store_now, Database};
use crate::document::DocumentStore;
use crate::error::{Result, StoreError};
use crate::models::{Channel, Message, NewMessage, Profile};
use crate::subscription::Subscription;

/// A committed write, as seen by subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// The channel collection changed.
    Channels,
    /// Messages of one channel were added or removed.
    Messages(ChannelId),
}

struct Inner {
    db: Mutex<Database>,
    changes: broadcast::Sender<Change>,
}

/// Cloneable handle to a shared database.
#[derive(Clone)]
pub struct LiveStore {
    inner: Arc<Inner>,
}

impl LiveStore {
    pub fn new(db: Database) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            inner: Arc::new(Inner {
                db: Mutex::new(db),
                changes,
            }),
        }
    }

    /// Store backed by a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Raw change feed, mostly useful for diagnostics.
    pub fn changes(&self) -> broadcast::Receiver<Change> {
        self.inner.changes.subscribe()
    }

    fn with_db<T>(&self, f: impl FnOnce(&mut Database) -> Result<T>) -> Result<T> {
        let mut guard = self
            .inner
            .db
            .lock()
            .map_err(|_| StoreError::Unavailable("database lock poisoned".into()))?;
        f(&mut guard)
    }

    fn publish(&self, change: Change) {
        // No receivers just means nobody is watching.
        let _ = self.inner.changes.send(change);
    }

    /// Open a live query. The change receiver is taken before the initial
    /// snapshot is read so no write can fall between the two.
    fn watch<T, R, L>(
        &self,
        collection: &'static str,
        relevant: R,
        load: L,
    ) -> Result<Subscription<T>>
    where
        T: Send + 'static,
        R: Fn(&Change) -> bool + Send + 'static,
        L: Fn(&Database) -> Result<T> + Send + 'static,
    {
        let mut changes = self.inner.changes.subscribe();
        let initial = self.with_db(|db| load(db))?;

        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let store = self.clone();

        let task = tokio::spawn(async move {
            if tx.send(Ok(initial)).await.is_err() {
                return;
            }
            loop {
                match changes.recv().await {
                    Ok(change) if !relevant(&change) => continue,
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(collection, skipped, "subscription lagged, resyncing");
                    }
                    Err(RecvError::Closed) => break,
                }

                let snapshot = store.with_db(|db| load(db));
                let failed = snapshot.is_err();
                if let Err(e) = &snapshot {
                    warn!(collection, error = %e, "live query failed");
                }
                if tx.send(snapshot).await.is_err() || failed {
                    break;
                }
            }
            debug!(collection, "subscription task finished");
        });

        Ok(Subscription::new(rx, task))
    }
}

#[async_trait]
impl DocumentStore for LiveStore {
    async fn create_channel(&self, name: &str) -> Result<Channel> {
        let channel = Channel {
            id: ChannelId::new(),
            name: name.to_string(),
            created_at: store_now(),
        };
        self.with_db(|db| db.insert_channel(&channel))?;
        self.publish(Change::Channels);

        info!(channel_id = %channel.id, name = %channel.name, "channel stored");
        Ok(channel)
    }

    async fn rename_channel(&self, id: ChannelId, name: &str) -> Result<Channel> {
        let channel = self.with_db(|db| db.rename_channel(id, name))?;
        self.publish(Change::Channels);
        Ok(channel)
    }

    async fn delete_channel(&self, id: ChannelId) -> Result<bool> {
        let deleted = self.with_db(|db| db.delete_channel(id))?;
        if deleted {
            self.publish(Change::Channels);
        }
        Ok(deleted)
    }

    async fn list_channels(&self) -> Result<Vec<Channel>> {
        self.with_db(|db| db.list_channels())
    }

    async fn watch_channels(&self) -> Result<Subscription<Vec<Channel>>> {
        self.watch(
            CHANNELS_COLLECTION,
            |change| matches!(change, Change::Channels),
            |db| db.list_channels(),
        )
    }

    async fn append_message(&self, message: NewMessage) -> Result<Message> {
        let stored = self.with_db(|db| db.insert_message(&message))?;
        self.publish(Change::Messages(stored.channel_id));
        Ok(stored)
    }

    async fn list_messages(&self, channel_id: ChannelId) -> Result<Vec<Message>> {
        self.with_db(|db| db.get_messages_for_channel(channel_id))
    }

    async fn watch_messages(&self, channel_id: ChannelId) -> Result<Subscription<Vec<Message>>> {
        self.watch(
            MESSAGES_COLLECTION,
            move |change| *change == Change::Messages(channel_id),
            move |db| db.get_messages_for_channel(channel_id),
        )
    }

    async fn delete_messages(&self, ids: &[MessageId]) -> Result<usize> {
        let (removed, channels) = self.with_db(|db| db.delete_messages(ids))?;
        for channel_id in channels {
            self.publish(Change::Messages(channel_id));
        }
        Ok(removed)
    }

    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>> {
        self.with_db(|db| db.get_profile(user_id))
    }

    async fn put_profile(&self, profile: &Profile) -> Result<()> {
        self.with_db(|db| db.upsert_profile(profile))
    }
}
