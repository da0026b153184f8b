//! Integration tests against a real Redis server.
//!
//! Tests use testcontainers to spin up a Redis instance shared by all tests,
//! so they need a Docker daemon and are ignored by default:
//! `cargo test -p tourguide-cache -- --ignored`.
//! The unreachable and hung server tests at the bottom run everywhere.

use std::time::{Duration, Instant};

use redis::AsyncCommands;
use serde_json::{Value, json};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;
use tourguide_cache::{
    AppConfig, CacheBackend, CacheManager, RedisBackend, RedisConfig, SetOptions,
    create_cache_manager,
};

// Shared Redis container for all tests
static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

/// Get or create the shared Redis container
async fn get_redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");

            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            let url = format!("redis://127.0.0.1:{}", host_port);

            (container, url)
        })
        .await;

    url.clone()
}

fn config_for(url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.redis.url = Some(url.to_string());
    config
}

async fn raw_connection(url: &str) -> redis::aio::MultiplexedConnection {
    redis::Client::open(url)
        .expect("redis client")
        .get_multiplexed_async_connection()
        .await
        .expect("redis connection")
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_redis_get_set() {
    let url = get_redis_url().await;
    let cache = create_cache_manager(&config_for(&url));

    cache
        .set("student:1:profile", &json!({"name": "Ana"}), SetOptions::ttl(60))
        .await
        .unwrap();

    assert!(cache.check_backend_health().await);
    let stats = cache.stats();
    assert_eq!(stats.mode, "redis");
    assert_eq!(stats.memory_entries, 0);

    let value: Option<Value> = cache.get("student:1:profile").await.unwrap();
    assert_eq!(value, Some(json!({"name": "Ana"})));

    // A second instance sees the same entry through Redis.
    let other = create_cache_manager(&config_for(&url));
    let value: Option<Value> = other.get("student:1:profile").await.unwrap();
    assert_eq!(value, Some(json!({"name": "Ana"})));
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_redis_ttl_is_applied() {
    let url = get_redis_url().await;
    let cache = create_cache_manager(&config_for(&url));

    cache
        .set("tourist:ttl", &"short lived", SetOptions::ttl(1))
        .await
        .unwrap();

    let mut conn = raw_connection(&url).await;
    let ttl: i64 = conn.ttl("tourist:ttl").await.unwrap();
    assert!((0..=1).contains(&ttl));

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(cache.get::<String>("tourist:ttl").await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_redis_null_and_corrupt_entries() {
    let url = get_redis_url().await;
    let cache = create_cache_manager(&config_for(&url));

    cache
        .set("request:null", &Value::Null, SetOptions::default())
        .await
        .unwrap();
    assert_eq!(
        cache.get::<Value>("request:null").await.unwrap(),
        Some(Value::Null)
    );

    let mut conn = raw_connection(&url).await;
    let _: () = conn.set("request:corrupt", "{oops").await.unwrap();
    assert_eq!(cache.get::<Value>("request:corrupt").await.unwrap(), None);
    let exists: bool = conn.exists("request:corrupt").await.unwrap();
    assert!(!exists);
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_redis_delete_pattern() {
    let url = get_redis_url().await;
    let cache = create_cache_manager(&config_for(&url));

    for i in 0..250 {
        cache
            .set(&format!("match:{i}:status"), &i, SetOptions::default())
            .await
            .unwrap();
    }
    cache
        .set("analytics:matches", &250, SetOptions::default())
        .await
        .unwrap();

    cache.delete_pattern("match:*").await.unwrap();

    let mut conn = raw_connection(&url).await;
    let remaining: Vec<String> = conn.keys("match:*").await.unwrap();
    assert!(remaining.is_empty());
    assert_eq!(
        cache.get::<u32>("analytics:matches").await.unwrap(),
        Some(250)
    );
}

#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_redis_invalidation_scenario() {
    let url = get_redis_url().await;
    let cache = create_cache_manager(&config_for(&url));

    cache
        .set("student:42:profile", &json!({"name": "Ana"}), SetOptions::ttl(300))
        .await
        .unwrap();
    cache
        .set("student:420:profile", &json!({"name": "Rui"}), SetOptions::ttl(300))
        .await
        .unwrap();

    cache.invalidation().student("42").await.unwrap();

    assert_eq!(cache.get::<Value>("student:42:profile").await.unwrap(), None);
    assert!(cache.get::<Value>("student:420:profile").await.unwrap().is_some());
}

#[tokio::test]
async fn test_unreachable_redis_reports_unavailable_quickly() {
    let config = RedisConfig {
        url: Some("redis://127.0.0.1:1".to_string()),
        connect_timeout_ms: 300,
        command_timeout_ms: 300,
        max_connect_retries: 2,
        ..RedisConfig::default()
    };
    let backend = RedisBackend::new("redis://127.0.0.1:1", &config).unwrap();

    let started = Instant::now();
    assert!(backend.ping().await.is_err());
    assert!(started.elapsed() < Duration::from_secs(3));
}

/// Accepts connections and never answers.
async fn silent_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut open = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            open.push(socket);
        }
    });
    format!("redis://{addr}")
}

fn hung_config(url: &str) -> AppConfig {
    let mut config = config_for(url);
    config.redis.connect_timeout_ms = 300;
    config.redis.command_timeout_ms = 300;
    config.redis.max_connect_retries = 2;
    config
}

#[tokio::test]
async fn test_hung_redis_times_out() {
    let url = silent_server().await;
    let config = hung_config(&url);
    let backend = RedisBackend::new(&url, &config.redis).unwrap();

    let started = Instant::now();
    assert!(backend.ping().await.is_err());
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_hung_redis_falls_back_to_memory() {
    let url = silent_server().await;
    let cache = create_cache_manager(&hung_config(&url));

    let started = Instant::now();
    cache
        .set("tourist:5:profile", &json!({"name": "Lee"}), SetOptions::default())
        .await
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(cache.stats().memory_entries, 1);
    assert_eq!(cache.stats().backend_available, Some(false));

    let value: Option<Value> = cache.get("tourist:5:profile").await.unwrap();
    assert_eq!(value, Some(json!({"name": "Lee"})));
}

#[tokio::test]
async fn test_graceful_degradation_invalid_url() {
    let mut config = AppConfig::default();
    config.redis.url = Some("redis://127.0.0.1:1".to_string());
    config.redis.connect_timeout_ms = 300;
    config.redis.max_connect_retries = 1;

    // Falls back to the in-memory store
    let cache = create_cache_manager(&config);
    cache
        .set("verification:9", &"pending", SetOptions::default())
        .await
        .unwrap();

    assert!(!cache.check_backend_health().await);
    let value: Option<String> = cache.get("verification:9").await.unwrap();
    assert_eq!(value.as_deref(), Some("pending"));
    assert_eq!(cache.stats().memory_entries, 1);
}

#[tokio::test]
async fn test_memory_only_without_url() {
    let cache: CacheManager = create_cache_manager(&AppConfig::default());
    assert!(!cache.check_backend_health().await);
    assert_eq!(cache.stats().mode, "memory");
}
