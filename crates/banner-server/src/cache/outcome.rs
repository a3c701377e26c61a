//! Outcome-shaped lookup cache.
//!
//! Stores the HTTP outcome of a banner lookup (status plus optional JSON
//! body), not the banner itself, so negative results are cached exactly like
//! positive ones.
//!
//! ## Wire Format
//!
//! `{"status_code": 200, "body": {...}}` as JSON bytes. A `null` body means
//! the response carries no body.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::backend::CacheBackend;

/// Result of resolving a banner lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub status_code: u16,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

impl Outcome {
    pub fn new(status_code: u16, body: Option<serde_json::Value>) -> Self {
        Self { status_code, body }
    }
}

/// TTL cache of lookup outcomes over a [`CacheBackend`].
#[derive(Clone)]
pub struct OutcomeCache {
    backend: CacheBackend,
    ttl: Duration,
}

impl OutcomeCache {
    pub fn new(backend: CacheBackend, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    /// Returns the cached outcome. Undecodable bytes count as a miss.
    pub async fn get(&self, key: &str) -> Option<Outcome> {
        let data = self.backend.get(key).await?;
        match serde_json::from_slice::<Outcome>(&data) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to decode cached outcome");
                None
            }
        }
    }

    /// Stores `outcome` under `key` for the configured TTL, replacing any previous value.
    pub async fn set(&self, key: &str, outcome: &Outcome) {
        match serde_json::to_vec(outcome) {
            Ok(data) => self.backend.set(key, data, self.ttl).await,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to encode outcome for cache");
            }
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn backend(&self) -> &CacheBackend {
        &self.backend
    }
}
