//! Test helpers: a fault-injecting store and watch-channel waits.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pioforum_shared::constants::SNAPSHOT_BUFFER;
use pioforum_shared::{ChannelId, Identity, MessageId, UserId};
use pioforum_store::{
    Channel, DocumentStore, LiveStore, Message, NewMessage, Profile, Result, StoreError,
    Subscription,
};
use tokio::sync::{mpsc, watch};

use crate::auth::LocalAuthProvider;
use crate::config::ForumConfig;
use crate::context::ForumContext;

pub const ADMIN_UID: &str = "admin-uid";

/// Decrements the open-watch count when the watch it belongs to goes away.
struct WatchGuard(Arc<AtomicUsize>);

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// [`LiveStore`] wrapper that fails selected operations on demand and counts
/// the watches that are still open.
pub struct FlakyStore {
    pub inner: LiveStore,
    open_watches: Arc<AtomicUsize>,
    channel_watch_failures: AtomicU32,
    message_watch_failures: AtomicU32,
    fail_profiles: AtomicBool,
    fail_message_deletes: AtomicBool,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::wrap(LiveStore::in_memory().unwrap())
    }

    pub fn wrap(inner: LiveStore) -> Self {
        Self {
            inner,
            open_watches: Arc::new(AtomicUsize::new(0)),
            channel_watch_failures: AtomicU32::new(0),
            message_watch_failures: AtomicU32::new(0),
            fail_profiles: AtomicBool::new(false),
            fail_message_deletes: AtomicBool::new(false),
        }
    }

    /// The next `n` channel watches fail.
    pub fn fail_channel_watches(&self, n: u32) {
        self.channel_watch_failures.store(n, Ordering::SeqCst);
    }

    /// The next `n` message watches fail.
    pub fn fail_message_watches(&self, n: u32) {
        self.message_watch_failures.store(n, Ordering::SeqCst);
    }

    pub fn fail_profiles(&self, fail: bool) {
        self.fail_profiles.store(fail, Ordering::SeqCst);
    }

    pub fn fail_message_deletes(&self, fail: bool) {
        self.fail_message_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn open_watches(&self) -> usize {
        self.open_watches.load(Ordering::SeqCst)
    }

    /// Wait until exactly `n` watches are open, failing the test after two
    /// seconds.
    pub async fn wait_for_open_watches(&self, n: usize) {
        let settled = async {
            while self.open_watches() != n {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        };
        if tokio::time::timeout(Duration::from_secs(2), settled).await.is_err() {
            panic!("expected {n} open watches, found {}", self.open_watches());
        }
    }

    /// Forward `inner` through a task that holds a [`WatchGuard`], so the
    /// count drops once the returned subscription is released.
    fn track<T: Send + 'static>(&self, mut inner: Subscription<T>) -> Subscription<T> {
        self.open_watches.fetch_add(1, Ordering::SeqCst);
        let guard = WatchGuard(self.open_watches.clone());
        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let task = tokio::spawn(async move {
            let _guard = guard;
            while let Some(item) = inner.recv().await {
                if tx.send(item).await.is_err() {
                    break;
                }
            }
        });
        Subscription::new(rx, task)
    }

    fn take_failure(counter: &AtomicU32) -> Result<()> {
        let took = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if took {
            Err(StoreError::Unavailable("injected failure".into()))
        } else {
            Ok(())
        }
    }

    fn check(flag: &AtomicBool) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("injected failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn create_channel(&self, name: &str) -> Result<Channel> {
        self.inner.create_channel(name).await
    }

    async fn rename_channel(&self, id: ChannelId, name: &str) -> Result<Channel> {
        self.inner.rename_channel(id, name).await
    }

    async fn delete_channel(&self, id: ChannelId) -> Result<bool> {
        self.inner.delete_channel(id).await
    }

    async fn list_channels(&self) -> Result<Vec<Channel>> {
        self.inner.list_channels().await
    }

    async fn watch_channels(&self) -> Result<Subscription<Vec<Channel>>> {
        Self::take_failure(&self.channel_watch_failures)?;
        Ok(self.track(self.inner.watch_channels().await?))
    }

    async fn append_message(&self, message: NewMessage) -> Result<Message> {
        self.inner.append_message(message).await
    }

    async fn list_messages(&self, channel_id: ChannelId) -> Result<Vec<Message>> {
        self.inner.list_messages(channel_id).await
    }

    async fn watch_messages(&self, channel_id: ChannelId) -> Result<Subscription<Vec<Message>>> {
        Self::take_failure(&self.message_watch_failures)?;
        Ok(self.track(self.inner.watch_messages(channel_id).await?))
    }

    async fn delete_messages(&self, ids: &[MessageId]) -> Result<usize> {
        Self::check(&self.fail_message_deletes)?;
        self.inner.delete_messages(ids).await
    }

    async fn get_profile(&self, user_id: &UserId) -> Result<Option<Profile>> {
        Self::check(&self.fail_profiles)?;
        self.inner.get_profile(user_id).await
    }

    async fn put_profile(&self, profile: &Profile) -> Result<()> {
        Self::check(&self.fail_profiles)?;
        self.inner.put_profile(profile).await
    }
}

pub fn admin() -> Identity {
    Identity::named(ADMIN_UID, "Admin")
}

pub fn test_config() -> ForumConfig {
    ForumConfig {
        privileged_uid: Some(UserId::new(ADMIN_UID)),
        subscribe_attempts: 3,
        retry_base: Duration::from_millis(1),
        ..ForumConfig::default()
    }
}

/// Context over `store` with `identity` signed in.
pub fn context_with(store: Arc<dyn DocumentStore>, identity: Option<Identity>) -> ForumContext {
    let auth = match identity {
        Some(identity) => LocalAuthProvider::signed_in(identity),
        None => LocalAuthProvider::new(),
    };
    ForumContext::new(test_config(), store, Arc::new(auth))
}

/// Wait until the watched value satisfies `pred`, failing the test after two
/// seconds.
pub async fn wait_for<T, F>(rx: &mut watch::Receiver<T>, pred: F) -> T
where
    T: Clone,
    F: FnMut(&T) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(pred))
        .await
        .expect("condition not reached in time")
        .expect("watch sender dropped")
        .clone()
}
