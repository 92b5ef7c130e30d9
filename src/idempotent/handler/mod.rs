//! # Strategy Handlers
//!
//! One handler per [`IdempotentStrategy`]. Each derives the call's key,
//! acquires protection before the operation runs, and commits or rolls
//! back afterwards:
//!
//! | Strategy     | Acquire                         | Commit          | Rollback      |
//! |--------------|---------------------------------|-----------------|---------------|
//! | PARAM        | try-lock on identity digest     | release lock    | release lock  |
//! | TOKEN        | atomic delete of the token row  | -               | -             |
//! | SPEL_RESTAPI | try-lock on expression key      | release lock    | release lock  |
//! | SPEL_MQ      | claim `consuming` record        | mark `consumed` | delete record |

pub mod factory;
pub mod param;
pub mod spel_mq;
pub mod spel_rest;
pub mod token;

pub use factory::{HandlerRegistry, IdempotentHandler};
pub use param::ParamHandler;
pub use spel_mq::SpelMqHandler;
pub use spel_rest::SpelRestApiHandler;
pub use token::{token_key, TokenHandler, TOKEN_KEY_PREFIX};

use super::context::{InvocationContext, InvocationWrapper};
use super::errors::IdempotentError;
use super::model::{Idempotent, IdempotentStrategy, Invocation};
use crate::config::IdempotentConfig;
use crate::lock::LockProvider;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Strategy-specific half of a protected call
#[async_trait]
pub trait IdempotentExecuteHandler: Send + Sync {
    fn strategy(&self) -> IdempotentStrategy;

    /// Derive the key and capture the call identity; never touches the store
    fn build_wrapper(
        &self,
        invocation: &Invocation,
        idempotent: &Idempotent,
    ) -> Result<InvocationWrapper, IdempotentError>;

    /// Acquire protection; an error means the operation must not run
    async fn acquire(&self, context: &mut InvocationContext) -> Result<(), IdempotentError>;

    /// Finalize after the operation succeeded
    async fn commit(&self, context: &mut InvocationContext) -> Result<(), IdempotentError>;

    /// Undo after the operation failed
    async fn rollback(&self, context: &mut InvocationContext) -> Result<(), IdempotentError>;
}

/// Fill descriptor defaults from configuration; a zero timeout is refused
pub(crate) fn wrap(
    key: String,
    strategy: IdempotentStrategy,
    invocation: &Invocation,
    idempotent: &Idempotent,
    defaults: &IdempotentConfig,
) -> Result<InvocationWrapper, IdempotentError> {
    let timeout = idempotent
        .timeout
        .unwrap_or_else(|| defaults.default_timeout());
    if timeout.is_zero() {
        return Err(IdempotentError::key_evaluation(
            "timeout must be greater than zero",
        ));
    }
    Ok(InvocationWrapper {
        key,
        strategy,
        timeout,
        message: idempotent
            .message
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| defaults.default_message.clone()),
        target_type: invocation.target_type.clone(),
        method: invocation.method.clone(),
    })
}

/// Non-blocking lock on the wrapper key, leased for the descriptor timeout
pub(crate) async fn try_lock_key(
    locks: &LockProvider,
    context: &mut InvocationContext,
) -> Result<(), IdempotentError> {
    let wrapper = context.wrapper();
    match locks.try_lock(&wrapper.key, wrapper.timeout).await? {
        Some(handle) => {
            debug!(key = %wrapper.key, strategy = %wrapper.strategy, "Idempotency lock acquired");
            context.attach_lock(handle);
            Ok(())
        }
        None => {
            warn!(key = %wrapper.key, strategy = %wrapper.strategy, "Duplicate request rejected");
            Err(IdempotentError::AlreadyInProgress {
                key: wrapper.key.clone(),
                message: wrapper.message.clone(),
            })
        }
    }
}

/// Release the lock taken by [`try_lock_key`], if any
pub(crate) async fn release_key(context: &mut InvocationContext) -> Result<(), IdempotentError> {
    if let Some(handle) = context.take_lock() {
        handle.release().await?;
    }
    Ok(())
}
