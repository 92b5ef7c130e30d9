//! Safe loading, penetration filtering and atomic writes over the in-memory engine

mod common;

use common::{memory_engine, SHORT_WORK};
use dedup_core::cache::SafeGetOptions;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Product {
    sku: String,
    price_cents: u64,
}

#[tokio::test]
async fn test_bloom_filter_short_circuits_unknown_key() {
    let engine = memory_engine().await;
    let cache = engine.cache();
    let counter = AtomicUsize::new(0);
    let loads = &counter;

    let ghost: Option<Product> = cache
        .safe_get(
            "product:ghost",
            || async move {
                loads.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>(Some(Product {
                    sku: "ghost".into(),
                    price_cents: 1,
                }))
            },
            TTL,
            cache.penetration_options(),
        )
        .await
        .unwrap();

    assert!(ghost.is_none());
    assert_eq!(loads.load(Ordering::SeqCst), 0);
    assert!(!cache.exists("product:ghost").await.unwrap());
}

#[tokio::test]
async fn test_presence_override_forces_load_past_filter() {
    let engine = memory_engine().await;
    let cache = engine.cache();
    let warming = |key: &str| key.starts_with("product:");
    let options = cache.penetration_options().presence_override(&warming);

    let loaded: Option<Product> = cache
        .safe_get(
            "product:new",
            || async move {
                Ok::<_, anyhow::Error>(Some(Product {
                    sku: "new".into(),
                    price_cents: 2_500,
                }))
            },
            TTL,
            options,
        )
        .await
        .unwrap();
    assert_eq!(loaded.map(|p| p.price_cents), Some(2_500));

    // Loaded keys are registered with the filter
    let filter = cache.bloom_filter().unwrap();
    assert!(filter.contains("product:new").await.unwrap());
}

#[tokio::test]
async fn test_safe_put_makes_key_visible_to_filter() {
    let engine = memory_engine().await;
    let cache = engine.cache();
    let product = Product {
        sku: "known".into(),
        price_cents: 999,
    };
    cache
        .safe_put("product:known", &product, TTL, cache.bloom_filter())
        .await
        .unwrap();

    let hit: Option<Product> = cache
        .safe_get(
            "product:known",
            || async move { Ok::<_, anyhow::Error>(None) },
            TTL,
            cache.penetration_options(),
        )
        .await
        .unwrap();
    assert_eq!(hit, Some(product));
}

#[tokio::test]
async fn test_concurrent_misses_run_loader_once() {
    let engine = memory_engine().await;
    let cache = engine.cache();
    let counter = AtomicUsize::new(0);
    let loads = &counter;

    let readers = (0..32).map(|_| {
        cache.safe_get(
            "product:hot",
            || async move {
                loads.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(SHORT_WORK).await;
                Ok::<_, anyhow::Error>(Some("hot-value".to_string()))
            },
            TTL,
            SafeGetOptions::new(),
        )
    });
    let results = join_all(readers).await;

    assert_eq!(loads.load(Ordering::SeqCst), 1);
    for result in results {
        assert_eq!(result.unwrap().as_deref(), Some("hot-value"));
    }
}

#[tokio::test]
async fn test_still_absent_callback_fires_when_loader_finds_nothing() {
    let engine = memory_engine().await;
    let cache = engine.cache();
    let seen = Mutex::new(Vec::<String>::new());
    let record = |key: &str| seen.lock().unwrap().push(key.to_string());
    let options = SafeGetOptions::new().on_still_absent(&record);

    let missing: Option<String> = cache
        .safe_get(
            "product:retired",
            || async move { Ok::<_, anyhow::Error>(None) },
            TTL,
            options,
        )
        .await
        .unwrap();

    assert!(missing.is_none());
    assert_eq!(*seen.lock().unwrap(), vec!["product:retired".to_string()]);
}

#[tokio::test]
async fn test_loader_error_is_reported_and_lock_released() {
    let engine = memory_engine().await;
    let cache = engine.cache();

    let failed = cache
        .safe_get::<String, _, _>(
            "product:flaky",
            || async move { Err(anyhow::anyhow!("catalog timeout")) },
            TTL,
            SafeGetOptions::new(),
        )
        .await;
    assert!(failed.is_err());

    let recovered: Option<String> = cache
        .safe_get(
            "product:flaky",
            || async move { Ok::<_, anyhow::Error>(Some("back".to_string())) },
            TTL,
            SafeGetOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(recovered.as_deref(), Some("back"));
}

#[tokio::test]
async fn test_put_if_all_absent_is_all_or_nothing() {
    let engine = memory_engine().await;
    let cache = engine.cache();
    let keys = vec!["a".to_string(), "b".to_string()];

    assert!(cache.put_if_all_absent(&keys, Some(TTL)).await.unwrap());
    assert_eq!(cache.count_existing_keys(&keys).await.unwrap(), 2);
    assert!(!cache.put_if_all_absent(&keys, Some(TTL)).await.unwrap());

    cache.delete("a").await.unwrap();
    let with_new = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    assert!(!cache.put_if_all_absent(&with_new, Some(TTL)).await.unwrap());
    assert!(!cache.exists("a").await.unwrap());
    assert!(!cache.exists("c").await.unwrap());

    assert_eq!(cache.delete_many(&keys).await.unwrap(), 1);
    assert!(cache.put_if_all_absent(&with_new, Some(TTL)).await.unwrap());
}

#[tokio::test]
async fn test_set_if_absent_and_get_returns_previous_holder() {
    let engine = memory_engine().await;
    let scripts = engine.cache().scripts();

    assert_eq!(
        scripts.set_if_absent_and_get("claim", "worker-1", 5_000).await.unwrap(),
        None
    );
    assert_eq!(
        scripts
            .set_if_absent_and_get("claim", "worker-2", 5_000)
            .await
            .unwrap()
            .as_deref(),
        Some("worker-1")
    );
    assert_eq!(
        engine.store().get("claim").await.unwrap().as_deref(),
        Some("worker-1")
    );
}

#[tokio::test]
async fn test_conditional_puts() {
    let engine = memory_engine().await;
    let cache = engine.cache();

    assert!(!cache.put_if_exists("sku", "v0", None).await.unwrap());
    assert!(cache.put_if_absent("sku", "v1", None).await.unwrap());
    assert!(!cache.put_if_absent("sku", "v2", None).await.unwrap());
    assert!(cache.put_if_exists("sku", "v3", None).await.unwrap());
    assert_eq!(cache.get::<String>("sku").await.unwrap().as_deref(), Some("v3"));

    assert!(cache.expire("sku", Duration::from_secs(5)).await.unwrap());
    let remaining = cache.ttl("sku").await.unwrap().unwrap();
    assert!(remaining <= Duration::from_secs(5));
}

#[tokio::test]
async fn test_get_or_load_populates_cache() {
    let engine = memory_engine().await;
    let cache = engine.cache();
    let product = Product {
        sku: "plain".into(),
        price_cents: 100,
    };

    let loaded = cache
        .get_or_load(
            "product:plain",
            || {
                let product = product.clone();
                async move { Ok::<_, anyhow::Error>(Some(product)) }
            },
            None,
        )
        .await
        .unwrap();
    assert_eq!(loaded.as_ref(), Some(&product));
    assert_eq!(cache.get::<Product>("product:plain").await.unwrap(), Some(product));
}
