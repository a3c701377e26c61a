//! Integration tests for the Redis tier of the outcome cache.
//!
//! Tests use testcontainers to spin up a real Redis instance.

use std::sync::Arc;
use std::time::Duration;

use banner_server::{CacheBackend, Outcome, OutcomeCache, RedisConfig, create_cache_backend};
use serde_json::json;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;

static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

async fn get_redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");

            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            let url = format!("redis://127.0.0.1:{host_port}");

            (container, url)
        })
        .await;

    url.clone()
}

async fn redis_backend() -> CacheBackend {
    let config = RedisConfig {
        enabled: true,
        url: get_redis_url().await,
        pool_size: 4,
        timeout_ms: 2000,
    };
    let backend = create_cache_backend(&config).await;
    assert_eq!(backend.mode(), "redis");
    backend
}

#[tokio::test]
async fn test_disabled_redis_uses_local_cache() {
    let backend = create_cache_backend(&RedisConfig::default()).await;
    assert_eq!(backend.mode(), "local");
}

#[tokio::test]
async fn test_unreachable_redis_falls_back_to_local() {
    let config = RedisConfig {
        enabled: true,
        url: "redis://127.0.0.1:1".into(),
        pool_size: 1,
        timeout_ms: 200,
    };
    let backend = create_cache_backend(&config).await;
    assert_eq!(backend.mode(), "local");
    assert!(!backend.is_redis_available().await);
}

#[tokio::test]
async fn test_l2_shared_between_instances() {
    let writer = redis_backend().await;
    let reader = redis_backend().await;
    assert!(reader.is_redis_available().await);

    writer
        .set("shared:1", b"payload".to_vec(), Duration::from_secs(60))
        .await;

    // The reader has an empty L1, so this hit comes from Redis.
    assert_eq!(reader.stats().l1_entries, 0);
    let value = reader.get("shared:1").await;
    assert_eq!(value, Some(Arc::new(b"payload".to_vec())));

    // And is promoted into the reader's L1.
    assert_eq!(reader.stats().l1_entries, 1);
}

#[tokio::test]
async fn test_promoted_entry_keeps_remaining_ttl() {
    let writer = redis_backend().await;
    let reader = redis_backend().await;

    writer
        .set("promote:1", b"v".to_vec(), Duration::from_millis(800))
        .await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert!(reader.get("promote:1").await.is_some());
    let entry = reader
        .local_cache()
        .get("promote:1")
        .map(|e| e.ttl)
        .expect("promoted into L1");
    assert!(entry <= Duration::from_millis(500));

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(reader.get("promote:1").await.is_none());
    assert!(writer.get("promote:1").await.is_none());
}

#[tokio::test]
async fn test_outcome_roundtrip_through_redis() {
    let writer = OutcomeCache::new(redis_backend().await, Duration::from_secs(60));
    let reader = OutcomeCache::new(redis_backend().await, Duration::from_secs(60));

    let not_found = Outcome::new(404, Some(json!({"error": "banner not found"})));
    writer.set("77:1", &not_found).await;
    let forbidden = Outcome::new(403, None);
    writer.set("77:2", &forbidden).await;

    assert_eq!(reader.get("77:1").await, Some(not_found));
    assert_eq!(reader.get("77:2").await, Some(forbidden));
    assert_eq!(reader.get("77:3").await, None);
}
