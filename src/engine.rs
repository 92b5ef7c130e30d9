//! # Engine Bootstrap
//!
//! [`DedupEngine`] wires one store, one lock provider, the cache facade and
//! the idempotency executor together from a single [`DedupConfig`]. Every
//! component shares the same store so dedup and cache decisions agree.

use crate::bloom::create_bloom_filter;
use crate::cache::CacheFacade;
use crate::config::DedupConfig;
use crate::error::Result;
use crate::idempotent::{HandlerRegistry, IdempotencyKeyBuilder, IdempotentExecutor, TokenHandler};
use crate::lock::LockProvider;
use crate::store::StoreProvider;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Shared engine components
pub struct DedupEngine {
    /// Engine instance ID, useful when correlating logs across processes
    pub instance_id: Uuid,
    config: Arc<DedupConfig>,
    store: StoreProvider,
    locks: LockProvider,
    cache: CacheFacade,
    key_builder: IdempotencyKeyBuilder,
    executor: IdempotentExecutor,
}

impl std::fmt::Debug for DedupEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupEngine")
            .field("instance_id", &self.instance_id)
            .field("environment", &self.config.environment)
            .field("store", &self.store.provider_name())
            .field("locks", &self.locks.provider_name())
            .field(
                "bloom_filter",
                &self.cache.bloom_filter().map(|b| b.name().to_string()),
            )
            .finish()
    }
}

impl DedupEngine {
    /// Load configuration from file and environment, then bootstrap
    pub async fn new() -> Result<Self> {
        let config = DedupConfig::load()?;
        Self::from_config(config).await
    }

    /// Bootstrap every component from `config`
    ///
    /// Fails when the configuration is invalid or the store is unreachable.
    pub async fn from_config(config: DedupConfig) -> Result<Self> {
        config.validate()?;
        info!(
            environment = %config.environment,
            backend = %config.store.backend,
            "Initializing dedup engine"
        );

        let store = StoreProvider::from_config(&config.store).await?;
        Self::assemble(config, store).await
    }

    /// Bootstrap over a process-local store, ignoring the configured backend
    pub async fn in_memory(mut config: DedupConfig) -> Result<Self> {
        config.store.backend = "memory".to_string();
        config.store.redis = None;
        config.validate()?;
        Self::assemble(config, StoreProvider::memory()).await
    }

    async fn assemble(config: DedupConfig, store: StoreProvider) -> Result<Self> {
        let locks = LockProvider::for_store(&store, &config.lock);
        let bloom_filter = create_bloom_filter(&config.bloom_filter, &store).await?;
        let cache = CacheFacade::new(store.clone(), locks.clone(), &config.cache, &config.lock)
            .with_bloom_filter(bloom_filter);

        let key_builder = IdempotencyKeyBuilder::default();
        let registry = HandlerRegistry::new(
            store.clone(),
            locks.clone(),
            key_builder.clone(),
            config.idempotent.clone(),
        );
        let executor = IdempotentExecutor::new(Arc::new(registry));

        let engine = Self {
            instance_id: Uuid::new_v4(),
            config: Arc::new(config),
            store,
            locks,
            cache,
            key_builder,
            executor,
        };
        info!(
            instance_id = %engine.instance_id,
            store = engine.store.provider_name(),
            locks = engine.locks.provider_name(),
            bloom_filter = engine.cache.bloom_filter().is_some(),
            "Dedup engine ready"
        );
        Ok(engine)
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    pub fn store(&self) -> &StoreProvider {
        &self.store
    }

    pub fn locks(&self) -> &LockProvider {
        &self.locks
    }

    pub fn cache(&self) -> &CacheFacade {
        &self.cache
    }

    pub fn executor(&self) -> &IdempotentExecutor {
        &self.executor
    }

    /// Token issuance for TOKEN-protected endpoints
    pub fn tokens(&self) -> &TokenHandler {
        self.executor.handlers().tokens()
    }

    pub fn key_builder(&self) -> &IdempotencyKeyBuilder {
        &self.key_builder
    }

    /// Whether the shared store answers
    pub async fn health_check(&self) -> Result<bool> {
        Ok(self.store.health_check().await?)
    }
}
