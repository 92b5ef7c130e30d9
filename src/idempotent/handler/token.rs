//! TOKEN strategy: single-use tokens issued ahead of the protected call
//!
//! Clients receive a bare UUID. The store row is `idempotent:token:<uuid>`,
//! always keyed server-side, so a presented value can only ever name a
//! token row. Redeeming it is one atomic delete; the redeemer also leaves
//! a short-lived tombstone so a replay is reported as already consumed
//! rather than unknown.

use super::{wrap, IdempotentExecuteHandler};
use crate::config::IdempotentConfig;
use crate::idempotent::context::{InvocationContext, InvocationWrapper};
use crate::idempotent::errors::IdempotentError;
use crate::idempotent::model::{Idempotent, IdempotentStrategy, Invocation};
use crate::store::{StoreProvider, StoreResult};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

pub const TOKEN_KEY_PREFIX: &str = "idempotent:token:";

const CONSUMED_SUFFIX: &str = ":consumed";

#[derive(Debug, Clone)]
pub struct TokenHandler {
    store: StoreProvider,
    defaults: IdempotentConfig,
}

impl TokenHandler {
    pub fn new(store: StoreProvider, defaults: IdempotentConfig) -> Self {
        Self { store, defaults }
    }

    /// Issue a token valid for `ttl_millis` (configured default when `None`)
    pub async fn create_token(&self, ttl_millis: Option<u64>) -> StoreResult<String> {
        let token = Uuid::new_v4();
        let ttl = Duration::from_millis(ttl_millis.unwrap_or(self.defaults.token_ttl_ms));
        self.store.set(&format!("{TOKEN_KEY_PREFIX}{token}"), "", ttl).await?;
        debug!(ttl_ms = ttl.as_millis() as u64, "Idempotency token issued");
        Ok(token.to_string())
    }

    /// Consume `token`; succeeds at most once per issued token
    pub async fn redeem(&self, token: &str, message: &str) -> Result<(), IdempotentError> {
        self.redeem_key(&token_key(token)?, message).await
    }

    async fn redeem_key(&self, key: &str, message: &str) -> Result<(), IdempotentError> {
        if self.store.delete(key).await? {
            let tombstone = format!("{key}{CONSUMED_SUFFIX}");
            let ttl = Duration::from_millis(self.defaults.token_ttl_ms);
            if let Err(e) = self.store.set(&tombstone, "1", ttl).await {
                warn!(error = %e, "Failed to record token consumption");
            }
            return Ok(());
        }

        let consumed = self
            .store
            .get(&format!("{key}{CONSUMED_SUFFIX}"))
            .await?
            .is_some();
        if consumed {
            warn!("Idempotency token replayed");
            Err(IdempotentError::TokenAlreadyConsumed {
                message: message.to_string(),
            })
        } else {
            Err(IdempotentError::TokenMissing {
                reason: "token is unknown or expired".to_string(),
            })
        }
    }

    /// Token presented on the call: header first, then query parameter
    fn presented_token<'a>(&self, invocation: &'a Invocation) -> Option<&'a str> {
        invocation
            .header_value(&self.defaults.token_header)
            .filter(|t| !t.trim().is_empty())
            .or_else(|| {
                invocation
                    .query_value(&self.defaults.token_param)
                    .filter(|t| !t.trim().is_empty())
            })
    }
}

/// Store key for a presented token.
///
/// Accepts the bare UUID, or the same UUID already carrying the token
/// prefix; anything else is not a token this service issued.
pub fn token_key(presented: &str) -> Result<String, IdempotentError> {
    let presented = presented.trim();
    let id = presented.strip_prefix(TOKEN_KEY_PREFIX).unwrap_or(presented);
    let id = Uuid::parse_str(id).map_err(|_| {
        warn!("Malformed idempotency token presented");
        IdempotentError::TokenMissing {
            reason: "token is not a valid idempotency token".to_string(),
        }
    })?;
    Ok(format!("{TOKEN_KEY_PREFIX}{id}"))
}

#[async_trait]
impl IdempotentExecuteHandler for TokenHandler {
    fn strategy(&self) -> IdempotentStrategy {
        IdempotentStrategy::Token
    }

    fn build_wrapper(
        &self,
        invocation: &Invocation,
        idempotent: &Idempotent,
    ) -> Result<InvocationWrapper, IdempotentError> {
        let token = self
            .presented_token(invocation)
            .ok_or_else(|| IdempotentError::TokenMissing {
                reason: format!(
                    "no '{}' header or '{}' parameter on the request",
                    self.defaults.token_header, self.defaults.token_param
                ),
            })?;
        wrap(
            token_key(token)?,
            self.strategy(),
            invocation,
            idempotent,
            &self.defaults,
        )
    }

    async fn acquire(&self, context: &mut InvocationContext) -> Result<(), IdempotentError> {
        let wrapper = context.wrapper();
        self.redeem_key(&wrapper.key, &wrapper.message).await
    }

    async fn commit(&self, _context: &mut InvocationContext) -> Result<(), IdempotentError> {
        Ok(())
    }

    async fn rollback(&self, _context: &mut InvocationContext) -> Result<(), IdempotentError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> TokenHandler {
        TokenHandler::new(StoreProvider::memory(), IdempotentConfig::default())
    }

    #[tokio::test]
    async fn test_token_is_single_use() {
        let tokens = handler();
        let token = tokens.create_token(None).await.unwrap();
        assert!(Uuid::parse_str(&token).is_ok());
        assert!(tokens
            .store
            .get(&format!("{TOKEN_KEY_PREFIX}{token}"))
            .await
            .unwrap()
            .is_some());

        tokens.redeem(&token, "dup").await.unwrap();
        let err = tokens.redeem(&token, "dup").await.unwrap_err();
        assert!(matches!(err, IdempotentError::TokenAlreadyConsumed { ref message } if message == "dup"));
    }

    #[tokio::test]
    async fn test_unknown_token_is_missing() {
        let err = handler().redeem("bogus", "dup").await.unwrap_err();
        assert!(matches!(err, IdempotentError::TokenMissing { .. }));

        let never_issued = Uuid::new_v4().to_string();
        let err = handler().redeem(&never_issued, "dup").await.unwrap_err();
        assert!(matches!(err, IdempotentError::TokenMissing { .. }));
    }

    #[tokio::test]
    async fn test_non_token_keys_cannot_be_redeemed() {
        let tokens = handler();
        let ttl = Duration::from_secs(30);
        tokens.store.set("user:1", "{\"name\":\"ada\"}", ttl).await.unwrap();
        let tombstoned = format!("{TOKEN_KEY_PREFIX}{}", Uuid::new_v4());
        tokens.store.set(&tombstoned, "", ttl).await.unwrap();

        for forged in ["user:1", "idempotent:token:../user:1", "idempotent:token:"] {
            let err = tokens.redeem(forged, "dup").await.unwrap_err();
            assert!(matches!(err, IdempotentError::TokenMissing { .. }), "{forged}");
        }
        assert!(tokens.store.get("user:1").await.unwrap().is_some());

        // The prefixed form of an issued token still names only that token
        tokens.redeem(&tombstoned, "dup").await.unwrap();
    }

    #[test]
    fn test_token_key_accepts_bare_or_prefixed_uuid() {
        let id = Uuid::new_v4();
        let expected = format!("{TOKEN_KEY_PREFIX}{id}");
        assert_eq!(token_key(&id.to_string()).unwrap(), expected);
        assert_eq!(token_key(&expected).unwrap(), expected);
        assert_eq!(token_key(&format!(" {id} ")).unwrap(), expected);
        assert!(token_key("order-paid:9").is_err());
    }

    #[tokio::test]
    async fn test_expired_token_is_missing() {
        let tokens = handler();
        let token = tokens.create_token(Some(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let err = tokens.redeem(&token, "dup").await.unwrap_err();
        assert!(matches!(err, IdempotentError::TokenMissing { .. }));
    }

    #[test]
    fn test_wrapper_key_is_the_token_row() {
        let tokens = handler();
        let id = Uuid::new_v4();
        let call = Invocation::new("C", "m").header("Idempotent-Token", id.to_string());
        let wrapper = tokens.build_wrapper(&call, &Idempotent::token()).unwrap();
        assert_eq!(wrapper.key, format!("{TOKEN_KEY_PREFIX}{id}"));
    }

    #[test]
    fn test_token_lookup_prefers_header() {
        let tokens = handler();
        let both = Invocation::new("C", "m")
            .header("IDEMPOTENT-TOKEN", "from-header")
            .query_param("idempotentToken", "from-query");
        assert_eq!(tokens.presented_token(&both), Some("from-header"));

        let query_only = Invocation::new("C", "m").query_param("idempotentToken", "q");
        assert_eq!(tokens.presented_token(&query_only), Some("q"));

        let blank_header = Invocation::new("C", "m").header("Idempotent-Token", " ");
        let err = tokens
            .build_wrapper(&blank_header, &Idempotent::token())
            .unwrap_err();
        assert!(matches!(err, IdempotentError::TokenMissing { .. }));
    }
}
