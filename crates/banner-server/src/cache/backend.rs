//! Cache backend implementation with L1 (DashMap) and L2 (Redis) tiers.

use dashmap::DashMap;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cached entry with TTL support.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub data: Arc<Vec<u8>>,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl CachedEntry {
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self::shared(Arc::new(data), ttl)
    }

    fn shared(data: Arc<Vec<u8>>, ttl: Duration) -> Self {
        Self {
            data,
            cached_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() >= self.ttl
    }
}

/// Two-tier cache backend: L1 (DashMap) + L2 (Redis).
///
/// ## Cache Modes
///
/// - **Local**: Single-instance mode using only DashMap
/// - **Redis**: Multi-instance mode with DashMap (L1) + Redis (L2)
///
/// Entries are never invalidated explicitly; they live until their TTL runs
/// out. An L2 hit is promoted into L1 with the TTL Redis has left for the key,
/// so promotion never extends an entry past its original expiry.
#[derive(Clone)]
pub enum CacheBackend {
    /// Single-instance: local DashMap only
    Local(Arc<DashMap<String, CachedEntry>>),

    /// Multi-instance: Redis + local L1
    Redis {
        redis: Pool,
        local: Arc<DashMap<String, CachedEntry>>,
    },
}

impl CacheBackend {
    pub fn new_local() -> Self {
        CacheBackend::Local(Arc::new(DashMap::new()))
    }

    pub fn new_redis(redis_pool: Pool) -> Self {
        CacheBackend::Redis {
            redis: redis_pool,
            local: Arc::new(DashMap::new()),
        }
    }

    /// Get a value from the cache.
    ///
    /// Checks L1 first, then L2 in Redis mode. Connection and command failures
    /// are logged and reported as a miss.
    pub async fn get(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        match self {
            CacheBackend::Local(map) => get_local(map, key),
            CacheBackend::Redis { redis, local } => {
                if let Some(data) = get_local(local, key) {
                    tracing::debug!(key = %key, "cache hit (L1)");
                    return Some(data);
                }

                let mut conn = match redis.get().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to get Redis connection");
                        return None;
                    }
                };

                let fetched: redis::RedisResult<(Option<Vec<u8>>, i64)> = redis::pipe()
                    .get(key)
                    .pttl(key)
                    .query_async(&mut conn)
                    .await;

                match fetched {
                    Ok((Some(data), remaining_ms)) => {
                        tracing::debug!(key = %key, remaining_ms, "cache hit (L2)");
                        let data = Arc::new(data);
                        // Negative PTTL: key vanished between GET and PTTL, or has no expiry.
                        if remaining_ms > 0 {
                            let ttl = Duration::from_millis(remaining_ms as u64);
                            let entry = CachedEntry::shared(Arc::clone(&data), ttl);
                            local.insert(key.to_string(), entry);
                        }
                        Some(data)
                    }
                    Ok((None, _)) => {
                        tracing::debug!(key = %key, "cache miss");
                        None
                    }
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "Redis GET error");
                        None
                    }
                }
            }
        }
    }

    /// Unconditionally stores `value` under `key` for `ttl`.
    ///
    /// In Redis mode this awaits the L2 write; callers on a latency-sensitive
    /// path run it on a detached task. Redis failures are logged only.
    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        match self {
            CacheBackend::Local(map) => {
                map.insert(key.to_string(), CachedEntry::new(value, ttl));
            }
            CacheBackend::Redis { redis, local } => {
                let entry = CachedEntry::new(value, ttl);
                let data_for_redis = Arc::clone(&entry.data);
                local.insert(key.to_string(), entry);

                let ttl_ms = (ttl.as_millis() as u64).max(1);
                match redis.get().await {
                    Ok(mut conn) => {
                        if let Err(e) = conn
                            .pset_ex::<_, _, ()>(key, data_for_redis.as_slice(), ttl_ms)
                            .await
                        {
                            tracing::warn!(key = %key, error = %e, "Redis SET error");
                        } else {
                            tracing::debug!(key = %key, ttl_ms, "cache set (L1+L2)");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "Failed to get Redis connection");
                    }
                }
            }
        }
    }

    /// Drops expired L1 entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let map = self.local_cache();
        let before = map.len();
        map.retain(|_, entry| !entry.is_expired());
        before.saturating_sub(map.len())
    }

    /// Get cache statistics (L1 only).
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            l1_entries: self.local_cache().len(),
            mode: self.mode(),
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            CacheBackend::Local(_) => "local",
            CacheBackend::Redis { .. } => "redis",
        }
    }

    /// Check if Redis is reachable (for readiness checks).
    pub async fn is_redis_available(&self) -> bool {
        match self {
            CacheBackend::Local(_) => false,
            CacheBackend::Redis { redis, .. } => match redis.get().await {
                Ok(mut conn) => {
                    let pong: redis::RedisResult<String> =
                        redis::cmd("PING").query_async(&mut conn).await;
                    pong.is_ok()
                }
                Err(_) => false,
            },
        }
    }

    /// The L1 map backing this cache.
    pub fn local_cache(&self) -> &Arc<DashMap<String, CachedEntry>> {
        match self {
            CacheBackend::Local(map) => map,
            CacheBackend::Redis { local, .. } => local,
        }
    }
}

fn get_local(map: &DashMap<String, CachedEntry>, key: &str) -> Option<Arc<Vec<u8>>> {
    let entry = map.get(key)?;
    if entry.is_expired() {
        drop(entry);
        map.remove_if(key, |_, e| e.is_expired());
        return None;
    }
    Some(Arc::clone(&entry.data))
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub l1_entries: usize,
    pub mode: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    fn hit(value: &[u8]) -> Option<Arc<Vec<u8>>> {
        Some(Arc::new(value.to_vec()))
    }

    #[tokio::test]
    async fn local_get_set() {
        let cache = CacheBackend::new_local();
        cache.set("3:1", b"payload".to_vec(), MINUTE).await;

        assert_eq!(cache.get("3:1").await, hit(b"payload"));
        assert_eq!(cache.get("3:2").await, None);

        let stats = cache.stats();
        assert_eq!(stats.mode, "local");
        assert_eq!(stats.l1_entries, 1);
    }

    #[tokio::test]
    async fn local_set_overwrites() {
        let cache = CacheBackend::new_local();
        cache.set("k", b"one".to_vec(), MINUTE).await;
        cache.set("k", b"two".to_vec(), MINUTE).await;
        assert_eq!(cache.get("k").await, hit(b"two"));
    }

    #[tokio::test]
    async fn local_entries_expire() {
        let cache = CacheBackend::new_local();
        let ttl = Duration::from_millis(50);
        cache.set("k", b"v".to_vec(), ttl).await;
        assert!(cache.get("k").await.is_some());

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(cache.get("k").await.is_none());
        assert_eq!(cache.stats().l1_entries, 0);
    }

    #[tokio::test]
    async fn purge_drops_only_expired_entries() {
        let cache = CacheBackend::new_local();
        let short = Duration::from_millis(10);
        cache.set("short", b"v".to_vec(), short).await;
        cache.set("long", b"v".to_vec(), MINUTE).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.get("long").await.is_some());
    }

    #[tokio::test]
    async fn local_mode_reports_no_redis() {
        let cache = CacheBackend::new_local();
        assert!(!cache.is_redis_available().await);
    }
}
