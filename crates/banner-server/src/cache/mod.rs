//! Two-tier lookup cache.
//!
//! ## Architecture
//!
//! - **L1 Cache (DashMap)**: In-memory, per-instance
//! - **L2 Cache (Redis)**: Network, shared across instances
//!
//! ```text
//! GET /user_banner → L1 (DashMap) → L2 (Redis) → Store
//! ```
//!
//! If Redis is unavailable or disabled the service runs on L1 alone.
//! Nothing is invalidated on writes: a mutation becomes visible to cached
//! readers once the entry's TTL has run out.

pub mod backend;
pub mod outcome;

pub use backend::{CacheBackend, CacheStats, CachedEntry};
pub use outcome::{Outcome, OutcomeCache};
