//! SPEL_MQ strategy: exactly-once-equivalent message consumption
//!
//! The first delivery claims `key -> consuming`. A duplicate that finds
//! `consuming` asks for redelivery; one that finds anything else is
//! acknowledged and dropped. Success overwrites the record with
//! `consumed`; failure deletes it so the next delivery can retry. The
//! claim is also deleted when the consumer is cancelled mid-call.

use super::{wrap, IdempotentExecuteHandler};
use crate::config::IdempotentConfig;
use crate::idempotent::context::{InvocationContext, InvocationWrapper};
use crate::idempotent::errors::IdempotentError;
use crate::idempotent::key::IdempotencyKeyBuilder;
use crate::idempotent::model::{ConsumeStatus, Idempotent, IdempotentStrategy, Invocation};
use crate::store::scripts::ttl_millis;
use crate::store::{AtomicScriptLibrary, StoreProvider};
use async_trait::async_trait;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct SpelMqHandler {
    store: StoreProvider,
    scripts: AtomicScriptLibrary,
    keys: IdempotencyKeyBuilder,
    defaults: IdempotentConfig,
}

impl SpelMqHandler {
    pub fn new(store: StoreProvider, keys: IdempotencyKeyBuilder, defaults: IdempotentConfig) -> Self {
        Self {
            scripts: AtomicScriptLibrary::new(store.clone()),
            store,
            keys,
            defaults,
        }
    }
}

#[async_trait]
impl IdempotentExecuteHandler for SpelMqHandler {
    fn strategy(&self) -> IdempotentStrategy {
        IdempotentStrategy::SpelMq
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
        let key = context.key().to_string();
        let previous = self
            .scripts
            .set_if_absent_and_get(
                &key,
                ConsumeStatus::Consuming.as_str(),
                ttl_millis(self.defaults.mq_consuming_timeout()),
            )
            .await?;

        match previous {
            None => {
                debug!(key = %key, "Message claimed for consumption");
                context.attach_claim(self.store.clone());
                Ok(())
            }
            Some(status) if ConsumeStatus::is_error(&status) => {
                warn!(key = %key, "Repeated consumption, previous delivery still in progress");
                Err(IdempotentError::DuplicateRetryable { key })
            }
            Some(status) => {
                warn!(key = %key, status = %status, "Repeated consumption, already completed");
                Err(IdempotentError::DuplicateTerminal { key })
            }
        }
    }

    async fn commit(&self, context: &mut InvocationContext) -> Result<(), IdempotentError> {
        let wrapper = context.wrapper();
        self.store
            .set(&wrapper.key, ConsumeStatus::Consumed.as_str(), wrapper.timeout)
            .await?;
        context.settle_claim();
        Ok(())
    }

    async fn rollback(&self, context: &mut InvocationContext) -> Result<(), IdempotentError> {
        self.store.delete(context.key()).await?;
        context.settle_claim();
        Ok(())
    }
}
