use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use banner_core::{
    Banner, BannerFilter, BannerId, BannerKey, BannerPatch, FeatureId, NewBanner, TagId,
};
use banner_storage::{BannerStorage, StorageError};
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// Association table: `(feature_id, tag_id)` -> owning banner.
type Associations = HashMap<(FeatureId, TagId), BannerId>;

#[derive(Debug, Default)]
struct State {
    banners: BTreeMap<BannerId, Banner>,
    associations: Associations,
}

impl State {
    /// Returns the first pair already held by a banner other than `owner`.
    fn conflict(
        &self,
        feature_id: FeatureId,
        tag_ids: &[TagId],
        owner: Option<BannerId>,
    ) -> Option<(FeatureId, TagId)> {
        tag_ids
            .iter()
            .map(|&tag_id| (feature_id, tag_id))
            .find(|pair| {
                self.associations
                    .get(pair)
                    .is_some_and(|&holder| Some(holder) != owner)
            })
    }
}

/// In-memory banner storage.
///
/// All state sits behind a single `RwLock`, so each mutation checks for
/// conflicts and applies its changes under one write guard. Readers never see a
/// half-applied association change.
#[derive(Debug)]
pub struct InMemoryStorage {
    state: RwLock<State>,
    id_counter: AtomicI64,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            id_counter: AtomicI64::new(1),
        }
    }

    fn next_id(&self) -> BannerId {
        self.id_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Returns the number of stored banners.
    pub async fn count(&self) -> usize {
        self.state.read().await.banners.len()
    }

    /// Returns a banner by id, bypassing the association index.
    pub async fn get_by_id(&self, id: BannerId) -> Option<Banner> {
        self.state.read().await.banners.get(&id).cloned()
    }
}

fn conflict_error((feature_id, tag_id): (FeatureId, TagId)) -> StorageError {
    StorageError::already_exists(format!("feature_id={feature_id}, tag_id={tag_id}"))
}

#[async_trait]
impl BannerStorage for InMemoryStorage {
    async fn create(&self, banner: &NewBanner) -> Result<BannerId, StorageError> {
        let mut state = self.state.write().await;

        if let Some(pair) = state.conflict(banner.feature_id, &banner.tag_ids, None) {
            return Err(conflict_error(pair));
        }

        let id = self.next_id();
        let now = OffsetDateTime::now_utc();

        for &tag_id in &banner.tag_ids {
            state.associations.insert((banner.feature_id, tag_id), id);
        }
        state.banners.insert(
            id,
            Banner {
                id,
                tag_ids: banner.tag_ids.clone(),
                feature_id: banner.feature_id,
                content: banner.content.clone(),
                is_active: banner.is_active,
                created_at: now,
                updated_at: now,
            },
        );

        tracing::debug!(banner_id = id, "banner created");
        Ok(id)
    }

    async fn list(&self, filter: &BannerFilter) -> Result<Vec<Banner>, StorageError> {
        let state = self.state.read().await;

        let offset = filter.offset.unwrap_or(0) as usize;
        let limit = filter.limit.map_or(usize::MAX, |l| l as usize);

        Ok(state
            .banners
            .values()
            .filter(|b| filter.matches(b))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get(&self, key: BannerKey) -> Result<Option<Banner>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .associations
            .get(&(key.feature_id, key.tag_id))
            .and_then(|id| state.banners.get(id))
            .cloned())
    }

    async fn partial_update(&self, id: BannerId, patch: &BannerPatch) -> Result<(), StorageError> {
        let mut state = self.state.write().await;

        let current = state
            .banners
            .get(&id)
            .ok_or_else(|| StorageError::not_found(id))?;

        let feature_id = patch.feature_id.unwrap_or(current.feature_id);
        let tag_ids = patch
            .tag_ids
            .clone()
            .unwrap_or_else(|| current.tag_ids.clone());
        let rewires = patch.tag_ids.is_some() || patch.feature_id.is_some();

        if rewires {
            if let Some(pair) = state.conflict(feature_id, &tag_ids, Some(id)) {
                return Err(conflict_error(pair));
            }
        }

        // Nothing below can fail.
        if rewires {
            let old_feature = current.feature_id;
            let old_tags = current.tag_ids.clone();
            for tag_id in old_tags {
                state.associations.remove(&(old_feature, tag_id));
            }
            for &tag_id in &tag_ids {
                state.associations.insert((feature_id, tag_id), id);
            }
        }

        if let Some(banner) = state.banners.get_mut(&id) {
            if rewires {
                banner.feature_id = feature_id;
                banner.tag_ids = tag_ids;
            }
            if let Some(content) = &patch.content {
                banner.content = content.clone();
            }
            if let Some(is_active) = patch.is_active {
                banner.is_active = is_active;
            }
            banner.updated_at = OffsetDateTime::now_utc();
        }

        Ok(())
    }

    async fn delete(&self, id: BannerId) -> Result<(), StorageError> {
        let mut state = self.state.write().await;

        let banner = state
            .banners
            .remove(&id)
            .ok_or_else(|| StorageError::not_found(id))?;
        for tag_id in banner.tag_ids {
            state.associations.remove(&(banner.feature_id, tag_id));
        }
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
