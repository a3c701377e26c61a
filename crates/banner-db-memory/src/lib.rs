//! In-memory banner storage backend.
//!
//! Provides [`InMemoryStorage`], a [`BannerStorage`] implementation that keeps
//! banners and their `(feature_id, tag_id)` associations in process memory.
//! It enforces the same uniqueness invariant as the PostgreSQL backend and is
//! used by tests and by `storage.backend = "memory"` for local development.
//!
//! # Example
//!
//! ```ignore
//! use banner_db_memory::InMemoryStorage;
//! use banner_storage::BannerStorage;
//!
//! let storage = InMemoryStorage::new();
//! let id = storage.create(&new_banner).await?;
//! ```

pub mod storage;

pub use banner_storage::{BannerStorage, DynStorage, StorageError};
pub use storage::InMemoryStorage;

/// Creates a new shareable in-memory storage instance.
pub fn create_storage() -> DynStorage {
    std::sync::Arc::new(InMemoryStorage::new())
}
