//! Current identity and privilege, derived from auth-provider notifications.
//!
//! The session state is published before the profile record is reconciled, so
//! a slow or failing profile write never holds back sign-in.

use std::sync::Arc;

use pioforum_shared::constants::PROFILES_COLLECTION;
use pioforum_shared::{Identity, UserId};
use pioforum_store::{store_now, DocumentStore, Profile, StoreError};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::AuthProvider;
use crate::error::{ForumError, ForumResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub identity: Option<Identity>,
    pub is_privileged: bool,
}

impl SessionState {
    fn derive(identity: Option<Identity>, privileged: Option<&UserId>) -> Self {
        let is_privileged = match (&identity, privileged) {
            (Some(identity), Some(uid)) => &identity.id == uid,
            _ => false,
        };
        Self {
            identity,
            is_privileged,
        }
    }
}

/// What [`reconcile_profile`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSync {
    Created,
    Updated,
    Unchanged,
}

struct SessionInner {
    state: watch::Receiver<SessionState>,
    task: JoinHandle<()>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Cheap-to-clone session handle. The watcher task stops when the last clone
/// is dropped.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Start following `auth`. The initial state is computed synchronously.
    pub fn start(
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn DocumentStore>,
        privileged: Option<UserId>,
    ) -> Self {
        let mut auth_rx = auth.subscribe();
        let initial = SessionState::derive(auth_rx.borrow_and_update().clone(), privileged.as_ref());
        let (tx, state) = watch::channel(initial.clone());

        let task = tokio::spawn(async move {
            // Holding the provider keeps its notifications flowing.
            let _auth = auth;
            if let Some(identity) = &initial.identity {
                sync_profile(&*store, identity).await;
            }

            while auth_rx.changed().await.is_ok() {
                let identity = auth_rx.borrow_and_update().clone();
                let next = SessionState::derive(identity, privileged.as_ref());

                let changed = tx.send_if_modified(|current| {
                    if *current == next {
                        return false;
                    }
                    *current = next.clone();
                    true
                });
                if !changed {
                    continue;
                }

                match &next.identity {
                    Some(identity) => {
                        info!(
                            user = %identity.id.short(),
                            privileged = next.is_privileged,
                            "session identity changed"
                        );
                        sync_profile(&*store, identity).await;
                    }
                    None => info!("session ended"),
                }
            }
            debug!("auth provider closed, session watcher stopped");
        });

        Self {
            inner: Arc::new(SessionInner { state, task }),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn current(&self) -> Option<Identity> {
        self.inner.state.borrow().identity.clone()
    }

    pub fn is_privileged(&self) -> bool {
        self.inner.state.borrow().is_privileged
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.clone()
    }

    /// Ok only for the privileged identity.
    pub fn require_privileged(&self) -> ForumResult<Identity> {
        let state = self.state();
        match state.identity {
            None => Err(ForumError::Unauthenticated),
            Some(_) if !state.is_privileged => Err(ForumError::Unauthorized),
            Some(identity) => Ok(identity),
        }
    }
}

async fn sync_profile(store: &dyn DocumentStore, identity: &Identity) {
    match reconcile_profile(store, identity).await {
        Ok(ProfileSync::Created) => info!(user = %identity.id.short(), "profile created"),
        Ok(ProfileSync::Updated) => info!(user = %identity.id.short(), "profile updated"),
        Ok(ProfileSync::Unchanged) => {}
        Err(e) => warn!(
            collection = PROFILES_COLLECTION,
            user = %identity.id.short(),
            error = %e,
            "profile sync failed"
        ),
    }
}

/// Create the profile on first sign-in, refresh its display fields when the
/// provider's copies changed.
pub async fn reconcile_profile(
    store: &dyn DocumentStore,
    identity: &Identity,
) -> Result<ProfileSync, StoreError> {
    let now = store_now();
    match store.get_profile(&identity.id).await? {
        None => {
            store.put_profile(&Profile::from_identity(identity, now)).await?;
            Ok(ProfileSync::Created)
        }
        Some(existing) if existing.is_stale(identity) => {
            let updated = Profile {
                display_name: identity.display_name.clone(),
                avatar_url: identity.avatar_url.clone(),
                is_anonymous: identity.is_anonymous,
                updated_at: now,
                ..existing
            };
            store.put_profile(&updated).await?;
            Ok(ProfileSync::Updated)
        }
        Some(_) => Ok(ProfileSync::Unchanged),
    }
}
