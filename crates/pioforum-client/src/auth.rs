//! Auth provider seam.
//!
//! The forum never authenticates anyone itself: it consumes identities from an
//! [`AuthProvider`] and reacts to its change notifications.
//! [`LocalAuthProvider`] is an in-process provider for development and tests;
//! interactive sign-in is modelled as "the provider hands back an identity".

use async_trait::async_trait;
use pioforum_shared::Identity;
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use crate::error::AuthError;

#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// The identity signed in right now, if any.
    fn current(&self) -> Option<Identity>;

    /// Receiver notified on every sign-in and sign-out.
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;

    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError>;

    /// Complete an interactive sign-in with the identity the provider issued.
    async fn sign_in(&self, identity: Identity) -> Result<Identity, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;
}

/// Provider backed by a single in-memory slot.
pub struct LocalAuthProvider {
    state: watch::Sender<Option<Identity>>,
}

impl LocalAuthProvider {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self { state }
    }

    /// Provider with `identity` already signed in.
    pub fn signed_in(identity: Identity) -> Self {
        let (state, _) = watch::channel(Some(identity));
        Self { state }
    }
}

impl Default for LocalAuthProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    fn current(&self) -> Option<Identity> {
        self.state.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.state.subscribe()
    }

    async fn sign_in_anonymously(&self) -> Result<Identity, AuthError> {
        let identity = Identity::anonymous(Uuid::new_v4().simple().to_string());
        info!(user = %identity.id.short(), "signed in anonymously");
        self.state.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_in(&self, identity: Identity) -> Result<Identity, AuthError> {
        if identity.id.as_str().trim().is_empty() {
            return Err(AuthError::MissingId);
        }
        info!(user = %identity.id.short(), anonymous = identity.is_anonymous, "signed in");
        self.state.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        if let Some(previous) = self.state.send_replace(None) {
            info!(user = %previous.id.short(), "signed out");
        }
        Ok(())
    }
}
