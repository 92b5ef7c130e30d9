//! Strategy dispatch
//!
//! The registry owns one handler per strategy; [`IdempotentHandler`] is a
//! borrowed closed-enum view over them, so dispatch is a `match` rather
//! than a vtable lookup.

use super::{IdempotentExecuteHandler, ParamHandler, SpelMqHandler, SpelRestApiHandler, TokenHandler};
use crate::config::IdempotentConfig;
use crate::idempotent::context::{InvocationContext, InvocationWrapper};
use crate::idempotent::errors::IdempotentError;
use crate::idempotent::key::IdempotencyKeyBuilder;
use crate::idempotent::model::{Idempotent, IdempotentStrategy, Invocation};
use crate::lock::LockProvider;
use crate::store::StoreProvider;

/// Borrowed handler for one strategy
#[derive(Debug, Clone, Copy)]
pub enum IdempotentHandler<'a> {
    Param(&'a ParamHandler),
    Token(&'a TokenHandler),
    SpelRestApi(&'a SpelRestApiHandler),
    SpelMq(&'a SpelMqHandler),
}

impl IdempotentHandler<'_> {
    pub fn strategy(&self) -> IdempotentStrategy {
        match self {
            Self::Param(h) => h.strategy(),
            Self::Token(h) => h.strategy(),
            Self::SpelRestApi(h) => h.strategy(),
            Self::SpelMq(h) => h.strategy(),
        }
    }

    pub fn build_wrapper(
        &self,
        invocation: &Invocation,
        idempotent: &Idempotent,
    ) -> Result<InvocationWrapper, IdempotentError> {
        match self {
            Self::Param(h) => h.build_wrapper(invocation, idempotent),
            Self::Token(h) => h.build_wrapper(invocation, idempotent),
            Self::SpelRestApi(h) => h.build_wrapper(invocation, idempotent),
            Self::SpelMq(h) => h.build_wrapper(invocation, idempotent),
        }
    }

    pub async fn acquire(&self, context: &mut InvocationContext) -> Result<(), IdempotentError> {
        match self {
            Self::Param(h) => h.acquire(context).await,
            Self::Token(h) => h.acquire(context).await,
            Self::SpelRestApi(h) => h.acquire(context).await,
            Self::SpelMq(h) => h.acquire(context).await,
        }
    }

    pub async fn commit(&self, context: &mut InvocationContext) -> Result<(), IdempotentError> {
        match self {
            Self::Param(h) => h.commit(context).await,
            Self::Token(h) => h.commit(context).await,
            Self::SpelRestApi(h) => h.commit(context).await,
            Self::SpelMq(h) => h.commit(context).await,
        }
    }

    pub async fn rollback(&self, context: &mut InvocationContext) -> Result<(), IdempotentError> {
        match self {
            Self::Param(h) => h.rollback(context).await,
            Self::Token(h) => h.rollback(context).await,
            Self::SpelRestApi(h) => h.rollback(context).await,
            Self::SpelMq(h) => h.rollback(context).await,
        }
    }
}

/// One handler per strategy, sharing the store, locks and key builder
#[derive(Debug, Clone)]
pub struct HandlerRegistry {
    param: ParamHandler,
    token: TokenHandler,
    spel_rest: SpelRestApiHandler,
    spel_mq: SpelMqHandler,
}

impl HandlerRegistry {
    pub fn new(
        store: StoreProvider,
        locks: LockProvider,
        keys: IdempotencyKeyBuilder,
        config: IdempotentConfig,
    ) -> Self {
        Self {
            param: ParamHandler::new(locks.clone(), keys.clone(), config.clone()),
            token: TokenHandler::new(store.clone(), config.clone()),
            spel_rest: SpelRestApiHandler::new(locks, keys.clone(), config.clone()),
            spel_mq: SpelMqHandler::new(store, keys, config),
        }
    }

    pub fn get(&self, strategy: IdempotentStrategy) -> IdempotentHandler<'_> {
        match strategy {
            IdempotentStrategy::Param => IdempotentHandler::Param(&self.param),
            IdempotentStrategy::Token => IdempotentHandler::Token(&self.token),
            IdempotentStrategy::SpelRestApi => IdempotentHandler::SpelRestApi(&self.spel_rest),
            IdempotentStrategy::SpelMq => IdempotentHandler::SpelMq(&self.spel_mq),
        }
    }

    /// Token issuance for the TOKEN strategy
    pub fn tokens(&self) -> &TokenHandler {
        &self.token
    }
}
