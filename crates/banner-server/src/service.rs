//! Banner mutations and listing.
//!
//! Each operation validates its input and hands it to the store. Nothing here
//! touches the lookup cache: cached outcomes age out on their TTL.

use banner_core::{
    Banner, BannerFilter, BannerId, CreateBannerParams, PatchBannerParams, ValidationError,
};
use banner_storage::{DynStorage, StorageError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ServiceError> for banner_api::ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(e) => e.into(),
            ServiceError::Storage(e) => e.into(),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Clone)]
pub struct BannerService {
    storage: DynStorage,
}

impl BannerService {
    pub fn new(storage: DynStorage) -> Self {
        Self { storage }
    }

    pub async fn create(&self, params: CreateBannerParams) -> ServiceResult<BannerId> {
        let banner = params.validate()?;
        let id = self.storage.create(&banner).await?;
        tracing::info!(
            banner_id = id,
            feature_id = banner.feature_id,
            tags = banner.tag_ids.len(),
            "banner created"
        );
        Ok(id)
    }

    pub async fn list(&self, filter: &BannerFilter) -> ServiceResult<Vec<Banner>> {
        Ok(self.storage.list(filter).await?)
    }

    /// Applies the fields present in `params`; `tag_ids` replaces the whole set.
    pub async fn partial_update(
        &self,
        id: BannerId,
        params: PatchBannerParams,
    ) -> ServiceResult<()> {
        if id <= 0 {
            return Err(ValidationError::BadBannerIdParam.into());
        }
        let patch = params.validate()?;
        self.storage.partial_update(id, &patch).await?;
        tracing::info!(banner_id = id, "banner updated");
        Ok(())
    }

    pub async fn delete(&self, id: BannerId) -> ServiceResult<()> {
        if id <= 0 {
            return Err(ValidationError::BadBannerIdParam.into());
        }
        self.storage.delete(id).await?;
        tracing::info!(banner_id = id, "banner deleted");
        Ok(())
    }
}
