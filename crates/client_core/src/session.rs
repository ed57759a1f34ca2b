use std::sync::Arc;

use shared::domain::SessionToken;
use storage::SessionTokenStore;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Single source of truth for the authenticated session.
///
/// The cached token mirrors the persisted row; `current_token` never
/// touches storage. Storage failures degrade to the unauthenticated state
/// instead of propagating: a client that cannot persist a session behaves
/// as if it has none.
pub struct SessionStore {
    store: Arc<dyn SessionTokenStore>,
    cached: RwLock<Option<SessionToken>>,
}

impl SessionStore {
    pub fn new(store: Arc<dyn SessionTokenStore>) -> Self {
        Self {
            store,
            cached: RwLock::new(None),
        }
    }

    /// Loads the persisted token into the cache, once at startup.
    pub async fn restore(&self) {
        let token = match self.store.load_token().await {
            Ok(token) => token,
            Err(err) => {
                warn!("session restore failed; treating as logged out: {err:#}");
                None
            }
        };
        *self.cached.write().await = token;
    }

    pub async fn current_token(&self) -> Option<SessionToken> {
        self.cached.read().await.clone()
    }

    /// Persists and caches a freshly issued token. Returns false when
    /// persistence failed and the session therefore stays closed.
    pub async fn set_token(&self, token: SessionToken) -> bool {
        match self.store.save_token(&token).await {
            Ok(()) => {
                *self.cached.write().await = Some(token);
                true
            }
            Err(err) => {
                warn!("failed to persist session token; staying logged out: {err:#}");
                *self.cached.write().await = None;
                false
            }
        }
    }

    /// Ends the session. The in-memory token is always dropped, even when
    /// the persisted row could not be deleted.
    pub async fn clear(&self) {
        if let Err(err) = self.store.clear_token().await {
            warn!("failed to clear persisted session token: {err:#}");
        }
        *self.cached.write().await = None;
        info!("session cleared");
    }
}
