//! # banner-storage
//!
//! Storage abstraction layer for the banner service.
//!
//! This crate defines the trait and error taxonomy that every banner storage
//! backend implements. Implementations live in separate crates
//! (`banner-db-postgres`, `banner-db-memory`).
//!
//! ## Overview
//!
//! [`BannerStorage`] owns the association invariant: for any
//! `(feature_id, tag_id)` pair at most one banner exists. Backends must fail a
//! conflicting mutation with [`StorageError::AlreadyExists`] and leave the store
//! exactly as it was before the call.
//!
//! ## Example
//!
//! ```ignore
//! use banner_core::BannerKey;
//! use banner_storage::{BannerStorage, StorageError};
//!
//! async fn title(
//!     storage: &dyn BannerStorage,
//!     key: BannerKey,
//! ) -> Result<Option<String>, StorageError> {
//!     let banner = storage.get(key).await?;
//!     Ok(banner.and_then(|b| b.content.get("title")?.as_str().map(String::from)))
//! }
//! ```

mod error;
mod traits;

pub use error::{ErrorCategory, StorageError};
pub use traits::BannerStorage;

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared storage trait object.
pub type DynStorage = std::sync::Arc<dyn BannerStorage>;
