//! Idempotency key derivation

use super::errors::IdempotentError;
use super::expression::KeyExpression;
use super::model::{Idempotent, Invocation};
use crate::cache::keys::build_key;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Caller bucket used when a PARAM call carries no caller identity
pub const ANONYMOUS_CALLER: &str = "0";

/// Builds the name segment of expression-derived keys when the descriptor
/// leaves `name` blank
pub trait NameGenerator: Send + Sync + fmt::Debug {
    fn generate(&self, invocation: &Invocation) -> String;
}

/// `<target_type>:<method>[:<param types comma-joined>]`
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultNameGenerator;

impl NameGenerator for DefaultNameGenerator {
    fn generate(&self, invocation: &Invocation) -> String {
        let mut name = format!("{}:{}", invocation.target_type, invocation.method);
        if !invocation.args.is_empty() {
            let signature = invocation
                .args
                .iter()
                .map(|arg| arg.type_name.as_str())
                .collect::<Vec<_>>()
                .join(",");
            name.push(':');
            name.push_str(&signature);
        }
        name
    }
}

/// Derives deterministic keys from call identity or key expressions
#[derive(Debug, Clone)]
pub struct IdempotencyKeyBuilder {
    name_generator: Arc<dyn NameGenerator>,
    expressions: Arc<DashMap<String, Arc<KeyExpression>>>,
}

impl Default for IdempotencyKeyBuilder {
    fn default() -> Self {
        Self::new(Arc::new(DefaultNameGenerator))
    }
}

impl IdempotencyKeyBuilder {
    pub fn new(name_generator: Arc<dyn NameGenerator>) -> Self {
        Self {
            name_generator,
            expressions: Arc::new(DashMap::new()),
        }
    }

    /// `idempotent:path:<path>:caller:<caller|0>:digest:<sha256(json(args))>`
    pub fn param_key(&self, invocation: &Invocation) -> Result<String, IdempotentError> {
        let path = invocation
            .request_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| IdempotentError::key_evaluation("PARAM keys need a request path"))?;

        let caller = match invocation.caller_id.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(caller) => caller,
            None => {
                debug!(path = path, "Anonymous caller shares the PARAM bucket");
                ANONYMOUS_CALLER
            }
        };

        let values: Vec<&serde_json::Value> = invocation.args.iter().map(|a| &a.value).collect();
        let payload = serde_json::to_vec(&values)
            .map_err(|e| IdempotentError::key_evaluation(format!("argument digest: {e}")))?;
        let digest = hex::encode(Sha256::digest(&payload));

        Ok(format!("idempotent:path:{path}:caller:{caller}:digest:{digest}"))
    }

    /// `join(":", unique_key_prefix, name, evaluated key)`, skipping blank parts
    pub fn expression_key(
        &self,
        invocation: &Invocation,
        idempotent: &Idempotent,
    ) -> Result<String, IdempotentError> {
        let name = if idempotent.name.trim().is_empty() {
            self.name_generator.generate(invocation)
        } else {
            idempotent.name.clone()
        };

        let evaluated = if idempotent.key.trim().is_empty() {
            String::new()
        } else {
            self.compiled(&idempotent.key)?
                .evaluate(invocation)
                .map_err(|e| IdempotentError::key_evaluation(e.to_string()))?
        };

        Ok(build_key([
            idempotent.unique_key_prefix.as_str(),
            name.as_str(),
            evaluated.as_str(),
        ]))
    }

    fn compiled(&self, source: &str) -> Result<Arc<KeyExpression>, IdempotentError> {
        if let Some(expression) = self.expressions.get(source) {
            return Ok(Arc::clone(expression.value()));
        }
        let expression = Arc::new(
            KeyExpression::parse(source)
                .map_err(|e| IdempotentError::key_evaluation(e.to_string()))?,
        );
        self.expressions
            .insert(source.to_string(), Arc::clone(&expression));
        Ok(expression)
    }

    pub fn cached_expressions(&self) -> usize {
        self.expressions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_order(caller: Option<&str>, amount: u64) -> Invocation {
        let invocation = Invocation::new("OrderController", "create")
            .arg("request", "CreateOrderRequest", json!({"sku": "A-1", "amount": amount}))
            .request_path("/api/orders");
        match caller {
            Some(c) => invocation.caller(c),
            None => invocation,
        }
    }

    #[test]
    fn test_param_key_is_deterministic() {
        let keys = IdempotencyKeyBuilder::default();
        let a = keys.param_key(&create_order(Some("u-1"), 5)).unwrap();
        let b = keys.param_key(&create_order(Some("u-1"), 5)).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("idempotent:path:/api/orders:caller:u-1:digest:"));
        assert_eq!(a.rsplit(':').next().unwrap().len(), 64);
    }

    #[test]
    fn test_param_key_separates_callers_and_args() {
        let keys = IdempotencyKeyBuilder::default();
        let base = keys.param_key(&create_order(Some("u-1"), 5)).unwrap();
        assert_ne!(base, keys.param_key(&create_order(Some("u-2"), 5)).unwrap());
        assert_ne!(base, keys.param_key(&create_order(Some("u-1"), 6)).unwrap());
    }

    #[test]
    fn test_anonymous_callers_share_bucket() {
        let keys = IdempotencyKeyBuilder::default();
        let key = keys.param_key(&create_order(None, 5)).unwrap();
        assert!(key.contains(":caller:0:"));
        assert_eq!(key, keys.param_key(&create_order(Some(" "), 5)).unwrap());
    }

    #[test]
    fn test_param_key_requires_path() {
        let keys = IdempotencyKeyBuilder::default();
        let err = keys
            .param_key(&Invocation::new("Svc", "run"))
            .unwrap_err();
        assert!(matches!(err, IdempotentError::KeyEvaluationFailed { .. }));
    }

    #[test]
    fn test_expression_key_with_default_name() {
        let keys = IdempotencyKeyBuilder::default();
        let invocation = Invocation::new("OrderConsumer", "onMessage")
            .arg("order", "OrderEvent", json!({"id": "order-42"}))
            .arg("attempt", "u32", 1);
        let descriptor = Idempotent::mq("#order.id").with_unique_key_prefix("mq");
        assert_eq!(
            keys.expression_key(&invocation, &descriptor).unwrap(),
            "mq:OrderConsumer:onMessage:OrderEvent,u32:order-42"
        );
        assert_eq!(keys.cached_expressions(), 1);
    }

    #[test]
    fn test_expression_key_with_explicit_name_and_no_args() {
        let keys = IdempotencyKeyBuilder::default();
        let invocation = Invocation::new("Job", "tick");
        assert_eq!(DefaultNameGenerator.generate(&invocation), "Job:tick");

        let descriptor = Idempotent::spel("#root.methodName").with_name("jobs");
        assert_eq!(keys.expression_key(&invocation, &descriptor).unwrap(), "jobs:tick");
    }

    #[test]
    fn test_bad_expression_fails_before_store_access() {
        let keys = IdempotencyKeyBuilder::default();
        let invocation = Invocation::new("Job", "tick");
        let err = keys
            .expression_key(&invocation, &Idempotent::spel("#missing"))
            .unwrap_err();
        assert!(matches!(err, IdempotentError::KeyEvaluationFailed { .. }));
    }
}
