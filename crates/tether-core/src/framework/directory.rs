//! User directory cache.
//!
//! Resolves opaque user IDs to [`Identity`] values and remembers the answer
//! for the lifetime of the adapter. Lookups that fail are not remembered, so
//! the next request for the same user tries again.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::foundation::error::ApiResult;
use crate::foundation::event::Identity;

/// Remote source of user identities.
#[async_trait]
pub trait UserLookup: Send + Sync {
    /// Fetches one user's identity from the platform.
    async fn lookup_user(&self, user_id: &str) -> ApiResult<Identity>;
}

/// Memoizing front of a [`UserLookup`].
pub struct UserDirectory {
    lookup: Arc<dyn UserLookup>,
    cache: RwLock<HashMap<String, Identity>>,
}

impl UserDirectory {
    /// Creates an empty directory backed by `lookup`.
    pub fn new(lookup: Arc<dyn UserLookup>) -> Self {
        Self {
            lookup,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolves `user_id`, consulting the platform on a cache miss.
    ///
    /// Never fails: if the remote lookup errors, a minimal identity carrying
    /// only the ID is returned and nothing is cached.
    pub async fn resolve(&self, user_id: &str) -> Identity {
        if let Some(hit) = self.cached(user_id) {
            return hit;
        }

        // The lock is released before the remote call.
        match self.lookup.lookup_user(user_id).await {
            Ok(identity) => {
                debug!(user_id = %user_id, name = %identity.name, "Cached user identity");
                self.cache
                    .write()
                    .insert(user_id.to_string(), identity.clone());
                identity
            }
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Failed to get user info by ID");
                Identity::minimal(user_id)
            }
        }
    }

    /// Returns the cached identity without calling the platform.
    pub fn cached(&self, user_id: &str) -> Option<Identity> {
        self.cache.read().get(user_id).cloned()
    }

    /// Seeds the cache, e.g. with the bot's own identity.
    pub fn insert(&self, identity: Identity) {
        self.cache.write().insert(identity.id.clone(), identity);
    }

    /// Number of cached identities.
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }
}

impl std::fmt::Debug for UserDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDirectory")
            .field("cached", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::foundation::error::ApiError;
    use crate::testing::LogCapture;

    #[derive(Default)]
    struct FakeLookup {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    #[async_trait]
    impl UserLookup for FakeLookup {
        async fn lookup_user(&self, user_id: &str) -> ApiResult<Identity> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ApiError::api("users.info", "user_not_found"));
            }
            Ok(Identity::new(user_id, "fred", "Fred Flintstone"))
        }
    }

    #[tokio::test]
    async fn test_hit_skips_remote_call() {
        let lookup = Arc::new(FakeLookup::default());
        let directory = UserDirectory::new(lookup.clone());

        let first = directory.resolve("U1").await;
        let second = directory.resolve("U1").await;

        assert_eq!(first, Identity::new("U1", "fred", "Fred Flintstone"));
        assert_eq!(first, second);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
        assert_eq!(directory.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_degrades_and_is_not_cached() {
        let logs = LogCapture::new();
        let _guard = logs.set_default();

        let lookup = Arc::new(FakeLookup::default());
        lookup.fail.store(true, Ordering::SeqCst);
        let directory = UserDirectory::new(lookup.clone());

        assert_eq!(directory.resolve("U2").await, Identity::minimal("U2"));
        assert!(directory.is_empty());
        assert!(logs.contains(tracing::Level::WARN, "Failed to get user info by ID"));

        lookup.fail.store(false, Ordering::SeqCst);
        assert!(directory.resolve("U2").await.is_resolved());
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_seeded_identity_is_served_from_cache() {
        let lookup = Arc::new(FakeLookup::default());
        let directory = UserDirectory::new(lookup.clone());
        directory.insert(Identity::new("UBOT", "tether", ""));

        assert_eq!(directory.resolve("UBOT").await.name, "tether");
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    /// Parks lookups of `USLOW` until released.
    #[derive(Default)]
    struct ParkedLookup {
        entered: tokio::sync::Notify,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl UserLookup for ParkedLookup {
        async fn lookup_user(&self, user_id: &str) -> ApiResult<Identity> {
            if user_id == "USLOW" {
                self.entered.notify_one();
                self.release.notified().await;
            }
            Ok(Identity::new(user_id, user_id.to_lowercase(), ""))
        }
    }

    #[tokio::test]
    async fn test_slow_lookup_does_not_block_other_users() {
        let lookup = Arc::new(ParkedLookup::default());
        let directory = Arc::new(UserDirectory::new(lookup.clone()));
        directory.insert(Identity::new("UBOT", "tether", ""));

        let slow = tokio::spawn({
            let directory = directory.clone();
            async move { directory.resolve("USLOW").await }
        });
        lookup.entered.notified().await;

        assert_eq!(directory.cached("UBOT").map(|i| i.name), Some("tether".into()));
        let other = tokio::time::timeout(Duration::from_secs(1), directory.resolve("U1"))
            .await
            .expect("resolve of another user waited on the parked lookup");
        assert_eq!(other.name, "u1");
        assert!(!slow.is_finished());

        lookup.release.notify_one();
        assert_eq!(slow.await.unwrap().name, "uslow");
        assert_eq!(directory.len(), 3);
    }
}
