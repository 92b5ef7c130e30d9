//! Shared helpers for integration tests

#![allow(dead_code)]

use dedup_core::config::DedupConfig;
use dedup_core::engine::DedupEngine;
use dedup_core::logging::init_structured_logging;
use std::time::Duration;

/// Test configuration with short lock polls and the bloom filter enabled
pub fn test_config() -> DedupConfig {
    let mut config = DedupConfig::for_tests();
    config.lock.retry_interval_ms = 5;
    config.lock.lease_seconds = 5;
    config.bloom_filter.enabled = true;
    config.bloom_filter.expected_insertions = 1_000;
    config
}

/// In-memory engine with logging initialized
pub async fn memory_engine() -> DedupEngine {
    let config = test_config();
    init_structured_logging(&config);
    DedupEngine::in_memory(config)
        .await
        .expect("in-memory engine should bootstrap")
}

pub const SHORT_WORK: Duration = Duration::from_millis(50);
