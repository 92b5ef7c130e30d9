//! # Idempotency Guards
//!
//! At-most-once execution of protected operations across a cluster. A
//! protected call is described by an [`Invocation`] (who is calling what,
//! with which arguments) and an [`Idempotent`] descriptor (how to derive
//! the key and which strategy applies). [`IdempotentExecutor::execute`]
//! runs the strategy's acquire/commit/rollback around the operation.

pub mod context;
pub mod errors;
pub mod executor;
pub mod expression;
pub mod handler;
pub mod key;
pub mod model;
pub mod state;

pub use context::{InvocationContext, InvocationWrapper};
pub use errors::{ExecuteError, IdempotentError};
pub use executor::IdempotentExecutor;
pub use expression::{KeyExpression, KeyExpressionError};
pub use handler::{HandlerRegistry, IdempotentExecuteHandler, IdempotentHandler, TokenHandler};
pub use key::{DefaultNameGenerator, IdempotencyKeyBuilder, NameGenerator, ANONYMOUS_CALLER};
pub use model::{
    ConsumeStatus, Idempotent, IdempotentScene, IdempotentStrategy, IdempotentType, Invocation,
    InvocationArg,
};
pub use state::ExecutionPhase;
