//! # pioforum-client
//!
//! The forum core: session tracking, the live channel registry, active-channel
//! selection and the per-channel message feed, driven by one event loop over
//! an injected auth provider and document store.

pub mod auth;
pub mod cascade;
pub mod config;
pub mod context;
pub mod error;
pub mod events;
pub mod forum;
pub mod registry;
pub mod retry;
pub mod selector;
pub mod session;
pub mod stream;

#[cfg(test)]
mod testing;

use pioforum_shared::constants::APP_NAME;
use tracing_subscriber::{fmt, EnvFilter};

pub use auth::{AuthProvider, LocalAuthProvider};
pub use config::ForumConfig;
pub use context::ForumContext;
pub use error::{AuthError, ForumError, ForumResult};
pub use events::{ForumEvent, Notice, Severity};
pub use forum::{spawn_forum, ForumCommand, ForumHandle};
pub use registry::{ChannelDeletion, ChannelRegistry, ChannelSet, FeedStatus};
pub use selector::{ActiveChannelSelector, Selection};
pub use session::{Session, SessionState};
pub use stream::{MessageStream, MessageView};

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default
/// filter. Calling it twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pioforum_client=debug,pioforum_store=info,warn"));

    let installed = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!("Starting {APP_NAME}");
    }
}
