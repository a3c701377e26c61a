//! Read-through banner lookup.
//!
//! A lookup checks the outcome cache, falls back to the store on a miss, and
//! writes the computed outcome back on a detached task. Not-found and
//! forbidden outcomes are cached like successful ones; store failures are not
//! cached at all.

use axum::http::StatusCode;
use banner_api::{ErrorBody, MSG_BANNER_NOT_FOUND};
use banner_core::{Banner, BannerKey};
use banner_storage::{DynStorage, StorageError};

use crate::cache::{Outcome, OutcomeCache};

/// Who is asking. Inactive banners are only visible to admins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    User,
    Admin,
}

impl Audience {
    pub fn from_admin_flag(is_admin: bool) -> Self {
        if is_admin { Self::Admin } else { Self::User }
    }

    pub fn is_admin(self) -> bool {
        self == Self::Admin
    }
}

/// Cache key for a lookup.
///
/// Admin and non-admin outcomes for the same pair differ for inactive
/// banners, so they are cached under separate keys.
pub fn cache_key(key: BannerKey, audience: Audience) -> String {
    match audience {
        Audience::User => format!("{}:{}", key.feature_id, key.tag_id),
        Audience::Admin => format!("{}:{}:admin", key.feature_id, key.tag_id),
    }
}

/// Maps a store result to the outcome served to `audience`.
pub fn outcome_for(banner: Option<Banner>, audience: Audience) -> Outcome {
    match banner {
        None => Outcome::new(
            StatusCode::NOT_FOUND.as_u16(),
            serde_json::to_value(ErrorBody::new(MSG_BANNER_NOT_FOUND)).ok(),
        ),
        Some(banner) if !banner.is_active && !audience.is_admin() => {
            Outcome::new(StatusCode::FORBIDDEN.as_u16(), None)
        }
        Some(banner) => Outcome::new(
            StatusCode::OK.as_u16(),
            Some(serde_json::Value::Object(banner.content)),
        ),
    }
}

#[derive(Clone)]
pub struct Resolver {
    storage: DynStorage,
    cache: OutcomeCache,
}

impl Resolver {
    pub fn new(storage: DynStorage, cache: OutcomeCache) -> Self {
        Self { storage, cache }
    }

    /// Resolves the banner content for `key` as seen by `audience`.
    ///
    /// With `bypass_cache` the store is always consulted; the fresh outcome
    /// still refreshes the cache.
    ///
    /// # Errors
    ///
    /// Returns the store error when the store cannot be read. Such failures
    /// are never cached.
    pub async fn lookup(
        &self,
        key: BannerKey,
        audience: Audience,
        bypass_cache: bool,
    ) -> Result<Outcome, StorageError> {
        let cache_key = cache_key(key, audience);

        if !bypass_cache {
            if let Some(outcome) = self.cache.get(&cache_key).await {
                tracing::debug!(key = %cache_key, status = outcome.status_code, "cache hit");
                return Ok(outcome);
            }
            tracing::debug!(key = %cache_key, "cache miss");
        }

        let banner = self.storage.get(key).await?;
        let outcome = outcome_for(banner, audience);

        // Detached so a cancelled request does not abort the write.
        let cache = self.cache.clone();
        let cached = outcome.clone();
        tokio::spawn(async move {
            cache.set(&cache_key, &cached).await;
        });

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use banner_core::{BannerContent, BannerFilter, BannerId, BannerPatch, NewBanner};
    use banner_db_memory::InMemoryStorage;
    use banner_storage::BannerStorage;
    use serde_json::json;

    use super::*;
    use crate::cache::CacheBackend;

    /// Memory store that counts `get` calls.
    #[derive(Default)]
    struct CountingStorage {
        inner: InMemoryStorage,
        gets: AtomicUsize,
    }

    impl CountingStorage {
        fn gets(&self) -> usize {
            self.gets.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BannerStorage for CountingStorage {
        async fn create(&self, banner: &NewBanner) -> Result<BannerId, StorageError> {
            self.inner.create(banner).await
        }
        async fn list(&self, filter: &BannerFilter) -> Result<Vec<Banner>, StorageError> {
            self.inner.list(filter).await
        }
        async fn get(&self, key: BannerKey) -> Result<Option<Banner>, StorageError> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key).await
        }
        async fn partial_update(
            &self,
            id: BannerId,
            patch: &BannerPatch,
        ) -> Result<(), StorageError> {
            self.inner.partial_update(id, patch).await
        }
        async fn delete(&self, id: BannerId) -> Result<(), StorageError> {
            self.inner.delete(id).await
        }
        fn backend_name(&self) -> &'static str {
            "counting"
        }
    }

    /// Store whose reads always fail.
    struct BrokenStorage;

    #[async_trait]
    impl BannerStorage for BrokenStorage {
        async fn create(&self, _: &NewBanner) -> Result<BannerId, StorageError> {
            Err(StorageError::connection_error("down"))
        }
        async fn list(&self, _: &BannerFilter) -> Result<Vec<Banner>, StorageError> {
            Err(StorageError::connection_error("down"))
        }
        async fn get(&self, _: BannerKey) -> Result<Option<Banner>, StorageError> {
            Err(StorageError::connection_error("down"))
        }
        async fn partial_update(&self, _: BannerId, _: &BannerPatch) -> Result<(), StorageError> {
            Err(StorageError::connection_error("down"))
        }
        async fn delete(&self, _: BannerId) -> Result<(), StorageError> {
            Err(StorageError::connection_error("down"))
        }
        fn backend_name(&self) -> &'static str {
            "broken"
        }
    }

    fn setup() -> (Arc<CountingStorage>, Resolver) {
        let storage = Arc::new(CountingStorage::default());
        let cache = OutcomeCache::new(CacheBackend::new_local(), Duration::from_secs(300));
        let resolver = Resolver::new(storage.clone(), cache);
        (storage, resolver)
    }

    async fn create(storage: &CountingStorage, feature_id: i64, tag_id: i64, active: bool) {
        let mut content = BannerContent::new();
        content.insert("title".into(), json!("x"));
        storage
            .create(&NewBanner {
                tag_ids: vec![tag_id],
                feature_id,
                content,
                is_active: active,
            })
            .await
            .unwrap();
    }

    /// Waits for the detached cache write to land.
    async fn wait_cached(resolver: &Resolver, key: &str) {
        for _ in 0..100 {
            if resolver.cache.get(key).await.is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("outcome for {key} was never cached");
    }

    fn key(feature_id: i64, tag_id: i64) -> BannerKey {
        BannerKey::new(feature_id, tag_id).unwrap()
    }

    async fn lookup(
        resolver: &Resolver,
        key: BannerKey,
        audience: Audience,
        bypass_cache: bool,
    ) -> Outcome {
        resolver.lookup(key, audience, bypass_cache).await.unwrap()
    }

    #[tokio::test]
    async fn visible_banner_returns_content() {
        let (storage, resolver) = setup();
        create(&storage, 3, 1, true).await;

        let outcome = lookup(&resolver, key(3, 1), Audience::User, false).await;
        assert_eq!(outcome, Outcome::new(200, Some(json!({"title": "x"}))));
    }

    #[tokio::test]
    async fn inactive_banner_is_forbidden_for_users_only() {
        let (storage, resolver) = setup();
        create(&storage, 3, 1, false).await;

        let user = lookup(&resolver, key(3, 1), Audience::User, true).await;
        assert_eq!(user, Outcome::new(403, None));

        let admin = lookup(&resolver, key(3, 1), Audience::Admin, true).await;
        assert_eq!(admin.status_code, 200);
        assert_eq!(admin.body, Some(json!({"title": "x"})));
    }

    #[tokio::test]
    async fn not_found_is_cached() {
        let (storage, resolver) = setup();

        let first = lookup(&resolver, key(9, 9), Audience::User, false).await;
        assert_eq!(first.status_code, 404);
        assert_eq!(first.body, Some(json!({"error": "banner not found"})));
        wait_cached(&resolver, "9:9").await;

        let second = lookup(&resolver, key(9, 9), Audience::User, false).await;
        assert_eq!(second, first);
        assert_eq!(storage.gets(), 1);
    }

    #[tokio::test]
    async fn cached_outcome_survives_writes_until_ttl() {
        let (storage, resolver) = setup();
        lookup(&resolver, key(5, 5), Audience::User, false).await;
        wait_cached(&resolver, "5:5").await;

        create(&storage, 5, 5, true).await;
        let stale = lookup(&resolver, key(5, 5), Audience::User, false).await;
        assert_eq!(stale.status_code, 404);

        let fresh = lookup(&resolver, key(5, 5), Audience::User, true).await;
        assert_eq!(fresh.status_code, 200);
    }

    #[tokio::test]
    async fn bypass_always_reaches_the_store() {
        let (storage, resolver) = setup();
        create(&storage, 3, 1, true).await;

        for _ in 0..3 {
            lookup(&resolver, key(3, 1), Audience::User, true).await;
        }
        assert_eq!(storage.gets(), 3);
    }

    #[tokio::test]
    async fn audiences_do_not_share_cache_entries() {
        let (storage, resolver) = setup();
        create(&storage, 3, 1, false).await;

        let user = lookup(&resolver, key(3, 1), Audience::User, false).await;
        assert_eq!(user.status_code, 403);
        wait_cached(&resolver, "3:1").await;

        let admin = lookup(&resolver, key(3, 1), Audience::Admin, false).await;
        assert_eq!(admin.status_code, 200);
        assert_eq!(storage.gets(), 2);
    }

    #[tokio::test]
    async fn store_failures_are_not_cached() {
        let cache = OutcomeCache::new(CacheBackend::new_local(), Duration::from_secs(300));
        let resolver = Resolver::new(Arc::new(BrokenStorage), cache.clone());

        let err = resolver
            .lookup(key(1, 1), Audience::User, false)
            .await
            .unwrap_err();
        assert!(err.is_unavailable());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get("1:1").await.is_none());
    }

    #[test]
    fn cache_keys() {
        assert_eq!(cache_key(key(3, 1), Audience::User), "3:1");
        assert_eq!(cache_key(key(3, 1), Audience::Admin), "3:1:admin");
    }
}
