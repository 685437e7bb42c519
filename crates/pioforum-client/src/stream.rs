//! Live message feed for the active channel.
//!
//! At most one message subscription is open at a time. Switching channels
//! aborts the previous pump and waits for it to finish before the next
//! subscription is opened, and every pump is tagged with a generation so a
//! snapshot that was already in flight for an old channel is discarded.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pioforum_shared::validate;
use pioforum_shared::{ChannelId, Identity, MessageId};
use pioforum_store::{DocumentStore, Message, NewMessage};
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{ForumError, ForumResult};
use crate::registry::FeedStatus;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub channel_id: Option<ChannelId>,
    pub status: FeedStatus,
    pub messages: Vec<Message>,
}

pub struct MessageStream {
    store: Arc<dyn DocumentStore>,
    retry: RetryPolicy,
    view: Arc<watch::Sender<MessageView>>,
    generation: Arc<AtomicU64>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl MessageStream {
    pub fn new(store: Arc<dyn DocumentStore>, retry: RetryPolicy) -> Self {
        let (view, _) = watch::channel(MessageView::default());
        Self {
            store,
            retry,
            view: Arc::new(view),
            generation: Arc::new(AtomicU64::new(0)),
            pump: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<MessageView> {
        self.view.subscribe()
    }

    pub fn snapshot(&self) -> MessageView {
        self.view.borrow().clone()
    }

    pub fn active_channel(&self) -> Option<ChannelId> {
        self.view.borrow().channel_id
    }

    /// Point the feed at `channel`, releasing the previous subscription first.
    /// `None` just closes the feed.
    pub async fn switch_to(&self, channel: Option<ChannelId>) -> ForumResult<()> {
        let mut pump = self.pump.lock().await;
        // Bumped under the lock so generations are issued in the order switches run.
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(task) = pump.take() {
            task.abort();
            let _ = task.await;
        }

        self.view.send_replace(MessageView {
            channel_id: channel,
            ..MessageView::default()
        });
        let Some(channel_id) = channel else {
            debug!("message feed closed");
            return Ok(());
        };

        let store = self.store.clone();
        let opened = self
            .retry
            .run("messages", || {
                let store = store.clone();
                async move { store.watch_messages(channel_id).await }
            })
            .await;

        let mut sub = match opened {
            Ok(sub) => sub,
            Err(e) => {
                warn!(%channel_id, error = %e, "message subscription failed");
                self.view
                    .send_modify(|view| view.status = FeedStatus::Failed(e.to_string()));
                return Err(e.into());
            }
        };

        let view = self.view.clone();
        let current = self.generation.clone();
        *pump = Some(tokio::spawn(async move {
            while let Some(snapshot) = sub.recv().await {
                if current.load(Ordering::SeqCst) != generation {
                    break;
                }
                match snapshot {
                    Ok(messages) => {
                        view.send_if_modified(|view| {
                            if view.channel_id != Some(channel_id) {
                                return false;
                            }
                            let merged = merge_snapshot(&view.messages, channel_id, messages);
                            if view.status == FeedStatus::Live && merged == view.messages {
                                return false;
                            }
                            view.status = FeedStatus::Live;
                            view.messages = merged;
                            true
                        });
                    }
                    Err(e) => {
                        warn!(%channel_id, error = %e, "message subscription broke");
                        view.send_modify(|view| view.status = FeedStatus::Failed(e.to_string()));
                        break;
                    }
                }
            }
            debug!(%channel_id, "message pump stopped");
        }));

        info!(%channel_id, "message subscription opened");
        Ok(())
    }

    /// Release the subscription and clear the feed.
    pub async fn close(&self) -> ForumResult<()> {
        self.switch_to(None).await
    }

    /// Post `text` to the active channel as `author`.
    pub async fn send(&self, text: &str, author: Option<&Identity>) -> ForumResult<Message> {
        let text = validate::message_text(text)?;
        let author = author.ok_or(ForumError::Unauthenticated)?;
        let channel_id = self.active_channel().ok_or(ForumError::NoActiveChannel)?;

        let message = self
            .store
            .append_message(NewMessage::from_author(channel_id, author, text))
            .await?;
        debug!(%channel_id, message_id = %message.id, author = %author.id.short(), "message sent");
        Ok(message)
    }
}

impl Drop for MessageStream {
    fn drop(&mut self) {
        if let Some(task) = self.pump.get_mut().take() {
            task.abort();
        }
    }
}

/// Fold a fresh snapshot into what was already delivered. Delivered messages
/// keep their positions (minus any that were deleted), unseen ones are
/// appended in snapshot order, and messages of other channels are ignored.
fn merge_snapshot(delivered: &[Message], channel_id: ChannelId, snapshot: Vec<Message>) -> Vec<Message> {
    let snapshot: Vec<Message> = snapshot
        .into_iter()
        .filter(|m| m.channel_id == channel_id)
        .collect();
    let live: HashSet<MessageId> = snapshot.iter().map(|m| m.id).collect();

    let mut merged: Vec<Message> = delivered
        .iter()
        .filter(|m| live.contains(&m.id))
        .cloned()
        .collect();
    let seen: HashSet<MessageId> = merged.iter().map(|m| m.id).collect();
    merged.extend(snapshot.into_iter().filter(|m| !seen.contains(&m.id)));
    merged
}

#[cfg(test)]
mod tests {
    use chrono::{Duration as ChronoDuration, Utc};
    use pioforum_shared::UserId;
    use pioforum_store::LiveStore;

    use super::*;
    use crate::testing::{wait_for, FlakyStore};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            base_delay: std::time::Duration::from_millis(1),
            max_delay: std::time::Duration::from_millis(2),
        }
    }

    fn texts(view: &MessageView) -> Vec<&str> {
        view.messages.iter().map(|m| m.text.as_str()).collect()
    }

    fn message(channel_id: ChannelId, text: &str, offset_ms: i64) -> Message {
        Message {
            id: MessageId::new(),
            channel_id,
            author_id: UserId::new("u1"),
            author_name: "Ada".into(),
            author_avatar: String::new(),
            text: text.into(),
            created_at: Utc::now() + ChronoDuration::milliseconds(offset_ms),
        }
    }

    #[test]
    fn test_merge_keeps_delivered_order() {
        let channel = ChannelId::new();
        let a = message(channel, "a", 0);
        let b = message(channel, "b", 10);
        let c = message(channel, "c", 20);
        let stray = message(ChannelId::new(), "stray", 5);

        let delivered = vec![b.clone(), a.clone()];
        let merged = merge_snapshot(&delivered, channel, vec![a.clone(), stray, b.clone(), c.clone()]);
        assert_eq!(merged, vec![b.clone(), a, c.clone()]);

        let merged = merge_snapshot(&merged, channel, vec![b.clone(), c.clone()]);
        assert_eq!(merged, vec![b, c]);
    }

    #[tokio::test]
    async fn test_send_appends_in_order() {
        let store = Arc::new(LiveStore::in_memory().unwrap());
        let general = store.create_channel("General").await.unwrap();
        let ada = Identity::named("ada", "Ada");
        let stream = MessageStream::new(store, fast_retry());
        let mut rx = stream.subscribe();
        stream.switch_to(Some(general.id)).await.unwrap();

        stream.send("first", Some(&ada)).await.unwrap();
        let sent = stream.send("  hello ", Some(&ada)).await.unwrap();
        assert_eq!(sent.text, "hello");
        assert_eq!(sent.author_id, ada.id);
        assert_eq!(sent.author_name, "Ada");

        let view = wait_for(&mut rx, |v| v.messages.len() == 2).await;
        assert_eq!(texts(&view), vec!["first", "hello"]);
        assert!(view.messages[0].created_at < view.messages[1].created_at);
        assert_eq!(view.status, FeedStatus::Live);
    }

    #[tokio::test]
    async fn test_switch_delivers_only_new_channel() {
        let store = Arc::new(LiveStore::in_memory().unwrap());
        let a = store.create_channel("a").await.unwrap();
        let b = store.create_channel("b").await.unwrap();
        let ada = Identity::named("ada", "Ada");
        store
            .append_message(NewMessage::from_author(a.id, &ada, "in a".into()))
            .await
            .unwrap();

        let stream = MessageStream::new(store.clone(), fast_retry());
        let mut rx = stream.subscribe();
        stream.switch_to(Some(a.id)).await.unwrap();
        wait_for(&mut rx, |v| v.messages.len() == 1).await;

        stream.switch_to(Some(b.id)).await.unwrap();
        assert_eq!(stream.active_channel(), Some(b.id));
        store
            .append_message(NewMessage::from_author(a.id, &ada, "late in a".into()))
            .await
            .unwrap();
        stream.send("in b", Some(&ada)).await.unwrap();

        let view = wait_for(&mut rx, |v| v.messages.len() == 1 && v.status == FeedStatus::Live).await;
        assert_eq!(view.channel_id, Some(b.id));
        assert_eq!(texts(&view), vec!["in b"]);
        assert!(view.messages.iter().all(|m| m.channel_id == b.id));
    }

    #[tokio::test]
    async fn test_send_validation_order() {
        let store = Arc::new(LiveStore::in_memory().unwrap());
        let stream = MessageStream::new(store.clone(), fast_retry());
        let ada = Identity::named("ada", "Ada");

        assert_eq!(
            stream.send("   ", Some(&ada)).await.unwrap_err(),
            ForumError::EmptyInput { field: "Message" }
        );
        assert_eq!(
            stream.send("hi", None).await.unwrap_err(),
            ForumError::Unauthenticated
        );
        assert_eq!(
            stream.send("hi", Some(&ada)).await.unwrap_err(),
            ForumError::NoActiveChannel
        );

        let general = store.create_channel("General").await.unwrap();
        stream.switch_to(Some(general.id)).await.unwrap();
        assert_eq!(
            stream.send("\n\t", Some(&ada)).await.unwrap_err(),
            ForumError::EmptyInput { field: "Message" }
        );
        assert!(store.list_messages(general.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_messages_leave_view() {
        let store = Arc::new(LiveStore::in_memory().unwrap());
        let general = store.create_channel("General").await.unwrap();
        let ada = Identity::named("ada", "Ada");
        let stream = MessageStream::new(store.clone(), fast_retry());
        let mut rx = stream.subscribe();
        stream.switch_to(Some(general.id)).await.unwrap();

        let gone = stream.send("gone", Some(&ada)).await.unwrap();
        stream.send("stays", Some(&ada)).await.unwrap();
        wait_for(&mut rx, |v| v.messages.len() == 2).await;

        store.delete_messages(&[gone.id]).await.unwrap();
        let view = wait_for(&mut rx, |v| v.messages.len() == 1).await;
        assert_eq!(texts(&view), vec!["stays"]);
    }

    #[tokio::test]
    async fn test_failed_open_marks_view() {
        let store = Arc::new(FlakyStore::new());
        let general = store.create_channel("General").await.unwrap();
        let stream = MessageStream::new(store.clone(), fast_retry());

        store.fail_message_watches(2);
        let err = stream.switch_to(Some(general.id)).await.unwrap_err();
        assert!(matches!(err, ForumError::RemoteUnavailable(_)));
        assert!(matches!(stream.snapshot().status, FeedStatus::Failed(_)));

        store.fail_message_watches(1);
        stream.switch_to(Some(general.id)).await.unwrap();
        assert_eq!(stream.active_channel(), Some(general.id));
    }

    #[tokio::test]
    async fn test_close_clears_feed() {
        let store = Arc::new(LiveStore::in_memory().unwrap());
        let general = store.create_channel("General").await.unwrap();
        let stream = MessageStream::new(store, fast_retry());
        stream.switch_to(Some(general.id)).await.unwrap();

        stream.close().await.unwrap();
        assert_eq!(stream.snapshot(), MessageView::default());
        assert_eq!(
            stream.send("hi", Some(&Identity::named("ada", "Ada"))).await.unwrap_err(),
            ForumError::NoActiveChannel
        );
    }
    #[tokio::test]
    async fn test_switching_keeps_one_watch_open() {
        let store = Arc::new(FlakyStore::new());
        let a = store.create_channel("a").await.unwrap();
        let b = store.create_channel("b").await.unwrap();
        let stream = MessageStream::new(store.clone(), fast_retry());

        for i in 0..10 {
            let channel = if i % 2 == 0 { a.id } else { b.id };
            stream.switch_to(Some(channel)).await.unwrap();
        }
        store.wait_for_open_watches(1).await;
        assert_eq!(stream.active_channel(), Some(b.id));

        stream.close().await.unwrap();
        store.wait_for_open_watches(0).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_switches_settle_on_last() {
        let store = Arc::new(FlakyStore::new());
        let a = store.create_channel("a").await.unwrap();
        let b = store.create_channel("b").await.unwrap();
        let stream = Arc::new(MessageStream::new(store.clone(), fast_retry()));
        let mut rx = stream.subscribe();

        let mut tasks = Vec::new();
        for i in 0..20 {
            let stream = stream.clone();
            let channel = if i % 2 == 0 { a.id } else { b.id };
            tasks.push(tokio::spawn(async move { stream.switch_to(Some(channel)).await }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let view = wait_for(&mut rx, |v| v.status == FeedStatus::Live).await;
        assert_eq!(view.channel_id, stream.active_channel());
        store.wait_for_open_watches(1).await;
    }
}
