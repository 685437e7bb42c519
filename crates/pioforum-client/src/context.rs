use std::sync::Arc;

use pioforum_store::{Database, DocumentStore, LiveStore};
use tracing::info;

use crate::auth::AuthProvider;
use crate::config::ForumConfig;
use crate::error::ForumResult;

/// Everything a forum needs from the outside world.
#[derive(Clone)]
pub struct ForumContext {
    pub config: ForumConfig,
    pub store: Arc<dyn DocumentStore>,
    pub auth: Arc<dyn AuthProvider>,
}

impl ForumContext {
    pub fn new(
        config: ForumConfig,
        store: Arc<dyn DocumentStore>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            config,
            store,
            auth,
        }
    }

    /// Open the SQLite store at the configured path, or the platform default.
    pub fn open(config: ForumConfig, auth: Arc<dyn AuthProvider>) -> ForumResult<Self> {
        let db = match &config.database_path {
            Some(path) => Database::open_at(path)?,
            None => Database::new()?,
        };
        info!(path = ?db.path(), "forum store opened");
        Ok(Self::new(config, Arc::new(LiveStore::new(db)), auth))
    }

    /// Context over a throwaway in-memory store.
    pub fn in_memory(config: ForumConfig, auth: Arc<dyn AuthProvider>) -> ForumResult<Self> {
        Ok(Self::new(config, Arc::new(LiveStore::in_memory()?), auth))
    }
}

#[cfg(test)]
mod tests {
    use pioforum_shared::Identity;
    use tempfile::TempDir;

    use super::*;
    use crate::auth::LocalAuthProvider;

    #[tokio::test]
    async fn test_open_at_configured_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("forum.db");
        let config = ForumConfig {
            database_path: Some(path.clone()),
            ..ForumConfig::default()
        };

        let ctx = ForumContext::open(config.clone(), Arc::new(LocalAuthProvider::new())).unwrap();
        ctx.store.create_channel("General").await.unwrap();
        drop(ctx);

        let auth = Arc::new(LocalAuthProvider::signed_in(Identity::named("u", "U")));
        let reopened = ForumContext::open(config, auth).unwrap();
        let channels = reopened.store.list_channels().await.unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "General");
        assert!(path.exists());
    }
}
