//! Live, ordered set of channels plus the privileged write operations on it.
//!
//! One subscription to the channel collection feeds a watch channel holding
//! the latest [`ChannelSet`]. Writes go straight to the store and come back
//! through that subscription; nothing is patched into the local set by hand.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pioforum_shared::validate;
use pioforum_shared::ChannelId;
use pioforum_store::{Channel, DocumentStore, StoreError};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cascade;
use crate::error::{ForumError, ForumResult};
use crate::retry::RetryPolicy;
use crate::session::Session;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "camelCase")]
pub enum FeedStatus {
    /// No snapshot received yet.
    #[default]
    Loading,
    Live,
    /// The subscription could not be opened or broke; it stays inactive.
    Failed(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelSet {
    pub status: FeedStatus,
    pub channels: Vec<Channel>,
}

impl ChannelSet {
    pub fn find(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn first(&self) -> Option<&Channel> {
        self.channels.first()
    }

    pub fn is_loaded(&self) -> bool {
        self.status == FeedStatus::Live
    }

    /// Live channel whose name collides with `name`, ignoring `except`.
    fn name_taken(&self, name: &str, except: Option<ChannelId>) -> bool {
        self.channels
            .iter()
            .any(|c| Some(c.id) != except && validate::same_channel_name(&c.name, name))
    }
}

/// Outcome of [`ChannelRegistry::delete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelDeletion {
    pub channel_id: ChannelId,
    /// Name as last seen in the live set.
    pub name: Option<String>,
    /// `None` when the message cascade failed.
    pub messages_removed: Option<usize>,
}

/// Creates the default channel for an empty forum, at most once per registry.
struct Bootstrap {
    store: Arc<dyn DocumentStore>,
    session: Session,
    latch: AtomicBool,
    name: String,
}

impl Bootstrap {
    async fn run(&self) -> ForumResult<Option<Channel>> {
        if !self.session.is_privileged() {
            return Ok(None);
        }
        if self
            .latch
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("bootstrap already claimed");
            return Ok(None);
        }

        // The snapshot that triggered us may already be stale.
        match self.store.list_channels().await {
            Ok(channels) if !channels.is_empty() => {
                self.latch.store(false, Ordering::SeqCst);
                return Ok(None);
            }
            Ok(_) => {}
            Err(e) => {
                self.latch.store(false, Ordering::SeqCst);
                return Err(e.into());
            }
        }

        match self.store.create_channel(&self.name).await {
            Ok(channel) => {
                info!(channel_id = %channel.id, name = %channel.name, "default channel created");
                Ok(Some(channel))
            }
            Err(StoreError::Conflict(name)) => {
                debug!(%name, "default channel created elsewhere");
                Ok(None)
            }
            Err(e) => {
                self.latch.store(false, Ordering::SeqCst);
                warn!(error = %e, "default channel creation failed");
                Err(e.into())
            }
        }
    }
}

pub struct ChannelRegistry {
    store: Arc<dyn DocumentStore>,
    session: Session,
    retry: RetryPolicy,
    live: Arc<watch::Sender<ChannelSet>>,
    bootstrap: Arc<Bootstrap>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl ChannelRegistry {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        session: Session,
        retry: RetryPolicy,
        default_channel: impl Into<String>,
    ) -> Self {
        let (live, _) = watch::channel(ChannelSet::default());
        let bootstrap = Arc::new(Bootstrap {
            store: store.clone(),
            session: session.clone(),
            latch: AtomicBool::new(false),
            name: default_channel.into(),
        });
        Self {
            store,
            session,
            retry,
            live: Arc::new(live),
            bootstrap,
            pump: Mutex::new(None),
        }
    }

    /// Open the live channel subscription. Calling it again while the
    /// subscription is running just hands out another receiver.
    pub async fn subscribe(&self) -> ForumResult<watch::Receiver<ChannelSet>> {
        let mut pump = self.pump.lock().await;
        if pump.as_ref().is_some_and(|task| !task.is_finished()) {
            return Ok(self.live.subscribe());
        }

        self.live.send_replace(ChannelSet::default());
        let store = self.store.clone();
        let opened = self
            .retry
            .run("channels", || {
                let store = store.clone();
                async move { store.watch_channels().await }
            })
            .await;

        let mut sub = match opened {
            Ok(sub) => sub,
            Err(e) => {
                warn!(error = %e, "channel subscription failed");
                self.live.send_modify(|set| set.status = FeedStatus::Failed(e.to_string()));
                return Err(e.into());
            }
        };

        let live = self.live.clone();
        let bootstrap = self.bootstrap.clone();
        *pump = Some(tokio::spawn(async move {
            while let Some(snapshot) = sub.recv().await {
                match snapshot {
                    Ok(channels) => {
                        let empty = channels.is_empty();
                        debug!(count = channels.len(), "channel snapshot");
                        live.send_replace(ChannelSet {
                            status: FeedStatus::Live,
                            channels,
                        });
                        if empty {
                            if let Err(e) = bootstrap.run().await {
                                warn!(error = %e, "bootstrap failed");
                            }
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "channel subscription broke");
                        live.send_modify(|set| set.status = FeedStatus::Failed(e.to_string()));
                        break;
                    }
                }
            }
        }));

        info!("channel subscription opened");
        Ok(self.live.subscribe())
    }

    /// Release the live subscription. The last snapshot is discarded.
    pub async fn unsubscribe(&self) {
        if let Some(task) = self.pump.lock().await.take() {
            task.abort();
            debug!("channel subscription released");
        }
        self.live.send_replace(ChannelSet::default());
    }

    pub fn watch(&self) -> watch::Receiver<ChannelSet> {
        self.live.subscribe()
    }

    pub fn snapshot(&self) -> ChannelSet {
        self.live.borrow().clone()
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.live.borrow().channels.clone()
    }

    /// Create the default channel if the forum is empty and the session is
    /// privileged. Returns the channel only when this call created it.
    pub async fn bootstrap_if_empty(&self) -> ForumResult<Option<Channel>> {
        self.bootstrap.run().await
    }

    pub async fn create(&self, name: &str) -> ForumResult<Channel> {
        self.session.require_privileged()?;
        let name = validate::channel_name(name)?;
        if self.live.borrow().name_taken(&name, None) {
            return Err(ForumError::DuplicateName(name));
        }

        let channel = self.store.create_channel(&name).await?;
        info!(channel_id = %channel.id, name = %channel.name, "channel created");
        Ok(channel)
    }

    pub async fn rename(&self, channel_id: ChannelId, new_name: &str) -> ForumResult<Channel> {
        self.session.require_privileged()?;
        let name = validate::channel_name(new_name)?;
        {
            let set = self.live.borrow();
            if set.is_loaded() && set.find(channel_id).is_none() {
                return Err(ForumError::NotFound("Channel".into()));
            }
            if set.name_taken(&name, Some(channel_id)) {
                return Err(ForumError::DuplicateName(name));
            }
        }

        let channel = self
            .store
            .rename_channel(channel_id, &name)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => ForumError::NotFound("Channel".into()),
                other => other.into(),
            })?;
        info!(%channel_id, name = %channel.name, "channel renamed");
        Ok(channel)
    }

    /// Delete the channel, then its messages. The cascade runs even when the
    /// channel delete fails, and its own failure never undoes the delete.
    pub async fn delete(&self, channel_id: ChannelId) -> ForumResult<ChannelDeletion> {
        self.session.require_privileged()?;
        let name = self.live.borrow().find(channel_id).map(|c| c.name.clone());

        let removed = self.store.delete_channel(channel_id).await;
        if let Err(e) = &removed {
            warn!(%channel_id, error = %e, "channel delete failed");
        }

        let messages_removed =
            match cascade::delete_messages_for_channel(&*self.store, channel_id).await {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!(%channel_id, error = %e, "message cascade failed");
                    None
                }
            };

        match removed? {
            true => {
                info!(%channel_id, ?messages_removed, "channel deleted");
                Ok(ChannelDeletion {
                    channel_id,
                    name,
                    messages_removed,
                })
            }
            false => Err(ForumError::NotFound("Channel".into())),
        }
    }
}

impl Drop for ChannelRegistry {
    fn drop(&mut self) {
        if let Some(task) = self.pump.get_mut().take() {
            task.abort();
        }
    }
}
