//! PARAM strategy: mutual exclusion on request path + caller + argument digest

use super::{release_key, try_lock_key, wrap, IdempotentExecuteHandler};
use crate::config::IdempotentConfig;
use crate::idempotent::context::{InvocationContext, InvocationWrapper};
use crate::idempotent::errors::IdempotentError;
use crate::idempotent::key::IdempotencyKeyBuilder;
use crate::idempotent::model::{Idempotent, IdempotentStrategy, Invocation};
use crate::lock::LockProvider;
use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct ParamHandler {
    locks: LockProvider,
    keys: IdempotencyKeyBuilder,
    defaults: IdempotentConfig,
}

impl ParamHandler {
    pub fn new(locks: LockProvider, keys: IdempotencyKeyBuilder, defaults: IdempotentConfig) -> Self {
        Self {
            locks,
            keys,
            defaults,
        }
    }
}

#[async_trait]
impl IdempotentExecuteHandler for ParamHandler {
    fn strategy(&self) -> IdempotentStrategy {
        IdempotentStrategy::Param
    }

    fn build_wrapper(
        &self,
        invocation: &Invocation,
        idempotent: &Idempotent,
    ) -> Result<InvocationWrapper, IdempotentError> {
        let key = self.keys.param_key(invocation)?;
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
