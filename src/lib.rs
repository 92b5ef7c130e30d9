#![allow(clippy::doc_markdown)] // Allow technical terms like Redis, Lua in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Dedup Core
//!
//! Distributed idempotency and safe cache loading for service clusters.
//!
//! ## Overview
//!
//! Every process in a cluster shares one key-value store (Redis, or an
//! in-memory store for single-process use and tests). On top of it the
//! crate provides:
//!
//! - **Atomic scripts**: conditional writes that run as one store command
//! - **Distributed locks**: named, reentrant, lease-bound mutexes
//! - **Cache facade**: typed get/put plus `safe_get`, which collapses
//!   concurrent misses into one loader call and short-circuits keys a
//!   bloom filter has never seen
//! - **Idempotency guards**: PARAM, TOKEN, SPEL_RESTAPI and SPEL_MQ
//!   strategies that run an operation at most once per derived key
//!
//! ## Module Organization
//!
//! - [`store`] - Key-value store providers and the atomic script library
//! - [`lock`] - Distributed lock providers and handles
//! - [`bloom`] - Penetration bloom filters
//! - [`cache`] - Cache facade and safe-load options
//! - [`idempotent`] - Descriptors, key derivation, handlers and executor
//! - [`engine`] - Wiring of all of the above from one configuration
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Crate-level error
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dedup_core::config::DedupConfig;
//! use dedup_core::engine::DedupEngine;
//! use dedup_core::idempotent::{Idempotent, Invocation};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DedupEngine::from_config(DedupConfig::load()?).await?;
//!
//! let invocation = Invocation::new("OrderService", "submit")
//!     .arg("order", "OrderRequest", serde_json::json!({"id": 42}))
//!     .request_path("/orders/submit")
//!     .caller("user-7");
//!
//! let receipt = engine
//!     .executor()
//!     .execute(&invocation, &Idempotent::param(), || async {
//!         Ok::<_, std::io::Error>("accepted")
//!     })
//!     .await?;
//! # let _ = receipt;
//! # Ok(())
//! # }
//! ```

pub mod bloom;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod idempotent;
pub mod lock;
pub mod logging;
pub mod store;

pub use cache::{CacheError, CacheFacade, SafeGetOptions};
pub use crate::config::{ConfigurationError, DedupConfig};
pub use engine::DedupEngine;
pub use error::{DedupError, Result};
pub use idempotent::{
    ExecuteError, Idempotent, IdempotentError, IdempotentExecutor, IdempotentStrategy, Invocation,
};
pub use lock::{LockHandle, LockProvider};
pub use logging::init_structured_logging;
pub use store::{AtomicScriptLibrary, StoreError, StoreProvider};
