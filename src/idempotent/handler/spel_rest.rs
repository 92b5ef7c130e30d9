//! SPEL_RESTAPI strategy: mutual exclusion on an expression-derived key

use super::{release_key, try_lock_key, wrap, IdempotentExecuteHandler};
use crate::config::IdempotentConfig;
use crate::idempotent::context::{InvocationContext, InvocationWrapper};
use crate::idempotent::errors::IdempotentError;
use crate::idempotent::key::IdempotencyKeyBuilder;
use crate::idempotent::model::{Idempotent, IdempotentStrategy, Invocation};
use crate::lock::LockProvider;
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct SpelRestApiHandler {
    locks: LockProvider,
    keys: IdempotencyKeyBuilder,
    defaults: IdempotentConfig,
}

impl SpelRestApiHandler {
    pub fn new(locks: LockProvider, keys: IdempotencyKeyBuilder, defaults: IdempotentConfig) -> Self {
        Self {
            locks,
            keys,
            defaults,
        }
    }
}

#[async_trait]
impl IdempotentExecuteHandler for SpelRestApiHandler {
    fn strategy(&self) -> IdempotentStrategy {
        IdempotentStrategy::SpelRestApi
    }

    fn build_wrapper(
        &self,
        invocation: &Invocation,
        idempotent: &Idempotent,
    ) -> Result<InvocationWrapper, IdempotentError> {
        let key = self.keys.expression_key(invocation, idempotent)?;
        wrap(key, self.strategy(), invocation, idempotent, &self.defaults)
    }

    async fn acquire(&self, context: &mut InvocationContext) -> Result<(), IdempotentError> {
        try_lock_key(&self.locks, context).await
    }

    async fn commit(&self, context: &mut InvocationContext) -> Result<(), IdempotentError> {
        release_key(context).await
    }

    async fn rollback(&self, context: &mut InvocationContext) -> Result<(), IdempotentError> {
        release_key(context).await
    }
}
