use dedup_core::bloom::{BloomFilter, SimpleBloomFilter};
use dedup_core::cache::build_key;
use dedup_core::idempotent::{IdempotencyKeyBuilder, Idempotent, Invocation};
use proptest::prelude::*;
use serde_json::json;
use tokio_test::block_on;

fn caller_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}"
}

fn order(caller: &str, sku: &str, qty: u32) -> Invocation {
    Invocation::new("OrderController", "submit")
        .arg("order", "OrderRequest", json!({"sku": sku, "qty": qty}))
        .request_path("/orders")
        .caller(caller)
}

proptest! {
    /// Property: equal invocations always derive the same PARAM key
    #[test]
    fn param_keys_are_deterministic(
        caller in caller_strategy(),
        sku in "[A-Z]{1,3}-[0-9]{1,4}",
        qty in 1u32..1000,
    ) {
        let keys = IdempotencyKeyBuilder::default();
        let first = keys.param_key(&order(&caller, &sku, qty)).unwrap();
        let second = keys.param_key(&order(&caller, &sku, qty)).unwrap();
        prop_assert_eq!(&first, &second);
        let expected_prefix = format!("idempotent:path:/orders:caller:{}:digest:", caller);
        prop_assert!(first.starts_with(&expected_prefix));
    }

    /// Property: changing any argument changes the PARAM key
    #[test]
    fn param_keys_distinguish_arguments(
        caller in caller_strategy(),
        qty in 1u32..1000,
    ) {
        let keys = IdempotencyKeyBuilder::default();
        let a = keys.param_key(&order(&caller, "A-1", qty)).unwrap();
        let b = keys.param_key(&order(&caller, "A-1", qty + 1)).unwrap();
        prop_assert_ne!(a, b);
    }

    /// Property: expression keys embed the evaluated argument verbatim
    #[test]
    fn expression_keys_embed_evaluated_value(id in 0u64..1_000_000) {
        let keys = IdempotencyKeyBuilder::default();
        let invocation = Invocation::new("OrderConsumer", "onMessage")
            .arg("order", "OrderEvent", json!({"id": id}));
        let key = keys
            .expression_key(&invocation, &Idempotent::mq("#order.id").with_name("paid"))
            .unwrap();
        prop_assert_eq!(key, format!("paid:{}", id));
    }

    /// Property: composed keys never contain empty segments
    #[test]
    fn built_keys_skip_blank_parts(parts in prop::collection::vec("( |[a-z]{1,6})", 0..6)) {
        let key = build_key(&parts);
        prop_assert!(key.split(':').all(|segment| !segment.trim().is_empty()) || key.is_empty());
    }

    /// Property: a bloom filter never forgets an added key
    #[test]
    fn bloom_filter_has_no_false_negatives(
        items in prop::collection::hash_set("[a-z0-9:]{1,24}", 1..200),
    ) {
        let filter = SimpleBloomFilter::new("props", 500, 0.01);
        block_on(async {
            for item in &items {
                filter.add(item).await.unwrap();
            }
            for item in &items {
                assert!(filter.contains(item).await.unwrap(), "lost {item}");
            }
        });
    }
}
