//! Orchestration of one protected call
//!
//! Build the wrapper, acquire protection, run the operation, then commit
//! or roll back. Commit and rollback are always attempted; their failures
//! are logged and never replace the operation's own outcome. A panicking
//! operation is rolled back before the panic resumes; a cancelled call is
//! unwound by [`InvocationContext`] on drop.

use super::context::InvocationContext;
use super::errors::{ExecuteError, IdempotentError};
use super::handler::{HandlerRegistry, IdempotentHandler};
use super::model::{Idempotent, Invocation};
use super::state::ExecutionPhase;
use crate::logging::log_idempotent_operation;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Debug, Clone)]
pub struct IdempotentExecutor {
    handlers: Arc<HandlerRegistry>,
}

impl IdempotentExecutor {
    pub fn new(handlers: Arc<HandlerRegistry>) -> Self {
        Self { handlers }
    }

    pub fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Run `operation` under the protection `idempotent` describes
    pub async fn execute<T, E, F, Fut>(
        &self,
        invocation: &Invocation,
        idempotent: &Idempotent,
        operation: F,
    ) -> Result<T, ExecuteError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let handler = self.handlers.get(idempotent.strategy());
        let wrapper = handler.build_wrapper(invocation, idempotent)?;
        let strategy = wrapper.strategy;
        let mut context = InvocationContext::new(wrapper);

        context.advance(ExecutionPhase::Acquire)?;
        if let Err(rejection) = handler.acquire(&mut context).await {
            context.advance(ExecutionPhase::Rejected)?;
            context.advance(ExecutionPhase::End)?;
            warn!(
                strategy = %strategy,
                key = %context.key(),
                error = %rejection,
                "Protected call rejected"
            );
            log_idempotent_operation(
                strategy,
                context.key(),
                ExecutionPhase::Rejected,
                context.elapsed(),
            );
            return Err(ExecuteError::Rejected(rejection));
        }
        context.advance(ExecutionPhase::Acquired)?;
        context.advance(ExecutionPhase::Invoke)?;

        let outcome = match AssertUnwindSafe(async move { operation().await })
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => {
                error!(strategy = %strategy, key = %context.key(), "Protected operation panicked");
                finalize(&handler, &mut context, ExecutionPhase::Rollback).await?;
                std::panic::resume_unwind(panic);
            }
        };

        let finished = if outcome.is_ok() {
            ExecutionPhase::Commit
        } else {
            ExecutionPhase::Rollback
        };
        finalize(&handler, &mut context, finished).await?;
        outcome.map_err(ExecuteError::Operation)
    }
}

/// Commit or roll back, then close the context and log the call
async fn finalize(
    handler: &IdempotentHandler<'_>,
    context: &mut InvocationContext,
    finished: ExecutionPhase,
) -> Result<(), IdempotentError> {
    let strategy = context.wrapper().strategy;
    context.advance(finished)?;
    let finalized = match finished {
        ExecutionPhase::Commit => handler.commit(context).await,
        _ => handler.rollback(context).await,
    };
    if let Err(e) = finalized {
        error!(
            strategy = %strategy,
            key = %context.key(),
            phase = %finished,
            error = %e,
            "Failed to finalize protected call"
        );
    }
    context.advance(ExecutionPhase::End)?;

    log_idempotent_operation(strategy, context.key(), finished, context.elapsed());
    Ok(())
}
