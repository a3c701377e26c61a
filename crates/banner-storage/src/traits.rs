//! The storage trait every banner backend implements.

use async_trait::async_trait;
use banner_core::{Banner, BannerFilter, BannerId, BannerKey, BannerPatch, NewBanner};

use crate::error::StorageError;

/// Persistence contract for banners and their `(feature_id, tag_id)` associations.
///
/// Inputs arrive already validated (positive ids, non-empty tag sets, content
/// present). Every mutating method is atomic: on any error the store is left
/// exactly as it was before the call. Implementations must be thread-safe.
///
/// No backend takes a lock on a `(feature_id, tag_id)` pair across calls.
/// Concurrent writers racing for the same pair are decided by the uniqueness
/// constraint alone: one succeeds, the others get [`StorageError::AlreadyExists`].
#[async_trait]
pub trait BannerStorage: Send + Sync {
    /// Creates a banner together with one association per tag.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if any `(feature_id, tag_id)` pair
    /// is already associated with another banner.
    async fn create(&self, banner: &NewBanner) -> Result<BannerId, StorageError>;

    /// Lists banners matching the filter, ordered by id.
    ///
    /// Each result carries the banner's complete tag set, not just the tag that
    /// matched the filter.
    async fn list(&self, filter: &BannerFilter) -> Result<Vec<Banner>, StorageError>;

    /// Resolves the unique banner addressed by a `(feature_id, tag_id)` pair.
    ///
    /// Returns `None` if no banner is associated with the pair.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing banners.
    async fn get(&self, key: BannerKey) -> Result<Option<Banner>, StorageError>;

    /// Applies a partial update in a single transaction.
    ///
    /// `patch.tag_ids` replaces the whole association set, scoped under
    /// `patch.feature_id` if given and the banner's current feature otherwise.
    /// A lone `patch.feature_id` moves every existing association to the new feature.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the banner does not exist.
    /// Returns `StorageError::AlreadyExists` if a resulting pair is taken.
    async fn partial_update(&self, id: BannerId, patch: &BannerPatch) -> Result<(), StorageError>;

    /// Deletes a banner and its associations.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the banner does not exist.
    async fn delete(&self, id: BannerId) -> Result<(), StorageError>;

    /// Checks that the backend can serve requests.
    ///
    /// Backends without an external connection are always reachable.
    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}
