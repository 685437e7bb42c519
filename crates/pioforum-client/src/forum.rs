//! The forum event loop.
//!
//! [`spawn_forum`] wires a session, a channel registry, an active-channel
//! selector and a message stream together and runs them on one task. Commands
//! that change the focus go in through an mpsc channel so selection is only
//! ever mutated by that task; writes go straight to the registry and stream
//! and come back as live snapshots. Everything observable is published as
//! watch state plus a broadcast of [`ForumEvent`]s.

use std::sync::Arc;

use pioforum_shared::constants::{CHANNELS_COLLECTION, MESSAGES_COLLECTION};
use pioforum_shared::ChannelId;
use pioforum_store::{Channel, Message};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::context::ForumContext;
use crate::error::{ForumError, ForumResult};
use crate::events::{emit_event, ForumEvent, Notice};
use crate::registry::{ChannelDeletion, ChannelRegistry, ChannelSet, FeedStatus};
use crate::selector::{ActiveChannelSelector, Selection};
use crate::session::{Session, SessionState};
use crate::stream::{MessageStream, MessageView};

/// Commands handled by the forum task.
#[derive(Debug)]
pub enum ForumCommand {
    SelectChannel {
        channel_id: ChannelId,
        reply: oneshot::Sender<ForumResult<()>>,
    },
    Shutdown,
}

/// Start a forum over `ctx`. The channel subscription is open by the time
/// this returns.
pub async fn spawn_forum(ctx: ForumContext) -> ForumResult<ForumHandle> {
    let ForumContext {
        config,
        store,
        auth,
    } = ctx;
    let retry = config.retry_policy();

    let session = Session::start(auth, store.clone(), config.privileged_uid.clone());
    let registry = Arc::new(ChannelRegistry::new(
        store.clone(),
        session.clone(),
        retry,
        config.default_channel.clone(),
    ));
    let stream = Arc::new(MessageStream::new(store, retry));
    let (events, _) = broadcast::channel(config.event_buffer);
    let (active_tx, active) = watch::channel(None);
    let (commands, command_rx) = mpsc::channel(32);

    if let Err(e) = registry.subscribe().await {
        warn!(error = %e, "forum started without a channel feed");
    }

    let forum = ForumLoop {
        registry: registry.clone(),
        stream: stream.clone(),
        events: events.clone(),
        active: active_tx,
        selector: ActiveChannelSelector::new(),
        channels_failure_reported: false,
        messages_failure_reported: false,
    };
    let task = tokio::spawn(forum.run(command_rx, session.subscribe()));

    info!(privileged = session.is_privileged(), "forum started");
    Ok(ForumHandle {
        commands,
        events,
        session,
        registry,
        stream,
        active,
        task,
    })
}

struct ForumLoop {
    registry: Arc<ChannelRegistry>,
    stream: Arc<MessageStream>,
    events: broadcast::Sender<ForumEvent>,
    active: watch::Sender<Option<Channel>>,
    selector: ActiveChannelSelector,
    channels_failure_reported: bool,
    messages_failure_reported: bool,
}

impl ForumLoop {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<ForumCommand>,
        mut session_rx: watch::Receiver<SessionState>,
    ) {
        let mut channels_rx = self.registry.watch();
        let mut messages_rx = self.stream.subscribe();
        let mut session_open = true;
        let mut channels_open = true;
        let mut messages_open = true;

        // The feed may have delivered before this task started.
        let initial = channels_rx.borrow_and_update().clone();
        self.on_channels(initial).await;

        loop {
            tokio::select! {
                cmd = commands.recv() => {
                    match cmd {
                        Some(ForumCommand::SelectChannel { channel_id, reply }) => {
                            let result = self.select(channel_id).await;
                            let _ = reply.send(result);
                        }
                        Some(ForumCommand::Shutdown) => {
                            info!("forum shutdown requested");
                            break;
                        }
                        None => {
                            info!("forum handle dropped, shutting down");
                            break;
                        }
                    }
                }

                changed = channels_rx.changed(), if channels_open => {
                    if changed.is_err() {
                        channels_open = false;
                        continue;
                    }
                    let set = channels_rx.borrow_and_update().clone();
                    self.on_channels(set).await;
                }

                changed = session_rx.changed(), if session_open => {
                    if changed.is_err() {
                        session_open = false;
                        continue;
                    }
                    let state = session_rx.borrow_and_update().clone();
                    self.on_session(state).await;
                }

                changed = messages_rx.changed(), if messages_open => {
                    if changed.is_err() {
                        messages_open = false;
                        continue;
                    }
                    let view = messages_rx.borrow_and_update().clone();
                    self.on_messages(view);
                }
            }
        }

        if let Err(e) = self.stream.close().await {
            debug!(error = %e, "closing message feed");
        }
        self.registry.unsubscribe().await;
        info!("forum stopped");
    }

    async fn on_channels(&mut self, set: ChannelSet) {
        match &set.status {
            FeedStatus::Loading => return,
            FeedStatus::Failed(reason) => {
                if !self.channels_failure_reported {
                    self.channels_failure_reported = true;
                    emit_event(
                        &self.events,
                        ForumEvent::SubscriptionFailed {
                            collection: CHANNELS_COLLECTION,
                            reason: reason.clone(),
                        },
                    );
                }
                return;
            }
            FeedStatus::Live => self.channels_failure_reported = false,
        }

        emit_event(&self.events, ForumEvent::ChannelsUpdated(set.channels.clone()));

        match self.selector.reconcile(&set.channels) {
            Some(selection) => {
                if let Err(e) = self.apply(selection, &set).await {
                    debug!(error = %e, "focus change left the message feed inactive");
                }
            }
            None => self.refresh_active(&set),
        }
    }

    async fn on_session(&mut self, state: SessionState) {
        let privileged = state.is_privileged;
        emit_event(&self.events, ForumEvent::SessionChanged(state));

        let set = self.registry.snapshot();
        if privileged && set.is_loaded() && set.channels.is_empty() {
            if let Err(e) = self.registry.bootstrap_if_empty().await {
                warn!(error = %e, "bootstrap after sign-in failed");
            }
        }
    }

    fn on_messages(&mut self, view: MessageView) {
        let Some(channel_id) = view.channel_id else {
            return;
        };
        match view.status {
            FeedStatus::Loading => self.messages_failure_reported = false,
            FeedStatus::Live => {
                self.messages_failure_reported = false;
                emit_event(
                    &self.events,
                    ForumEvent::MessagesUpdated {
                        channel_id,
                        messages: view.messages,
                    },
                );
            }
            FeedStatus::Failed(reason) => {
                if !self.messages_failure_reported {
                    self.messages_failure_reported = true;
                    emit_event(
                        &self.events,
                        ForumEvent::SubscriptionFailed {
                            collection: MESSAGES_COLLECTION,
                            reason,
                        },
                    );
                }
            }
        }
    }

    async fn select(&mut self, channel_id: ChannelId) -> ForumResult<()> {
        let set = self.registry.snapshot();
        let selection = match self.selector.select(channel_id, &set.channels)? {
            Some(selection) => selection,
            // Picking the focused channel again reopens a failed feed.
            None if matches!(self.stream.snapshot().status, FeedStatus::Failed(_)) => {
                Selection::Selected(channel_id)
            }
            None => return Ok(()),
        };
        self.apply(selection, &set).await
    }

    /// Publish the new focus and move the message feed to it.
    async fn apply(&mut self, selection: Selection, set: &ChannelSet) -> ForumResult<()> {
        let channel = selection.channel_id().and_then(|id| set.find(id).cloned());
        match &channel {
            Some(channel) => info!(channel_id = %channel.id, name = %channel.name, "active channel"),
            None => info!("no active channel"),
        }
        self.active.send_replace(channel.clone());
        emit_event(&self.events, ForumEvent::ActiveChannelChanged(channel));

        self.stream.switch_to(selection.channel_id()).await
    }

    /// Keep the published active channel in step with renames.
    fn refresh_active(&mut self, set: &ChannelSet) {
        let Some(id) = self.selector.current().channel_id() else {
            return;
        };
        let latest = set.find(id).cloned();
        let changed = self.active.send_if_modified(|active| {
            if *active == latest {
                return false;
            }
            *active = latest.clone();
            true
        });
        if changed {
            emit_event(&self.events, ForumEvent::ActiveChannelChanged(latest));
        }
    }
}

/// Handle to a running forum.
pub struct ForumHandle {
    commands: mpsc::Sender<ForumCommand>,
    events: broadcast::Sender<ForumEvent>,
    session: Session,
    registry: Arc<ChannelRegistry>,
    stream: Arc<MessageStream>,
    active: watch::Receiver<Option<Channel>>,
    task: JoinHandle<()>,
}

impl ForumHandle {
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn channels(&self) -> watch::Receiver<ChannelSet> {
        self.registry.watch()
    }

    pub fn messages(&self) -> watch::Receiver<MessageView> {
        self.stream.subscribe()
    }

    pub fn active_channel(&self) -> watch::Receiver<Option<Channel>> {
        self.active.clone()
    }

    pub fn events(&self) -> broadcast::Receiver<ForumEvent> {
        self.events.subscribe()
    }

    /// Focus `channel_id`. Resolves once the new message feed is open.
    pub async fn select_channel(&self, channel_id: ChannelId) -> ForumResult<()> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(ForumCommand::SelectChannel { channel_id, reply })
            .await
            .map_err(|_| ForumError::Closed)?;
        rx.await.map_err(|_| ForumError::Closed)?
    }

    pub async fn create_channel(&self, name: &str) -> ForumResult<Channel> {
        let result = self.registry.create(name).await;
        self.notify(match &result {
            Ok(_) => Notice::success("Channel added successfully!"),
            Err(e) => Notice::from_error(e, "Failed to add channel."),
        });
        result
    }

    pub async fn rename_channel(&self, channel_id: ChannelId, new_name: &str) -> ForumResult<Channel> {
        let result = self.registry.rename(channel_id, new_name).await;
        self.notify(match &result {
            Ok(channel) => Notice::success(format!("Channel renamed to \"{}\"", channel.name)),
            Err(e) => Notice::from_error(e, "Failed to rename channel."),
        });
        result
    }

    pub async fn delete_channel(&self, channel_id: ChannelId) -> ForumResult<ChannelDeletion> {
        let result = self.registry.delete(channel_id).await;
        match &result {
            Ok(deletion) => {
                let name = deletion.name.as_deref().unwrap_or("Channel");
                self.notify(Notice::success(format!("Channel \"{name}\" deleted successfully.")));
                if deletion.messages_removed.is_none() {
                    self.notify(Notice::warning("Failed to delete associated messages."));
                }
            }
            Err(e) => self.notify(Notice::from_error(e, "Failed to delete channel.")),
        }
        result
    }

    /// Post to the active channel as the signed-in identity.
    pub async fn send_message(&self, text: &str) -> ForumResult<Message> {
        let author = self.session.current();
        let result = self.stream.send(text, author.as_ref()).await;
        self.notify(match &result {
            Ok(_) => Notice::success("Message sent successfully!"),
            Err(e) => Notice::from_error(e, "Failed to send message."),
        });
        result
    }

    /// Stop the forum task and release its subscriptions.
    pub async fn shutdown(self) {
        let _ = self.commands.send(ForumCommand::Shutdown).await;
        if let Err(e) = self.task.await {
            warn!(error = %e, "forum task ended abnormally");
        }
    }

    fn notify(&self, notice: Notice) {
        emit_event(&self.events, ForumEvent::Notice(notice));
    }
}
