//! Descriptor and call-identity types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// How the idempotency key is derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdempotentType {
    /// Request path + caller + argument digest
    #[default]
    Param,
    /// Externally issued single-use token
    Token,
    /// Key expression evaluated over the call
    Spel,
}

/// Where the protected call originates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdempotentScene {
    #[default]
    RestApi,
    Mq,
}

/// Closed set of execution strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdempotentStrategy {
    Param,
    Token,
    SpelRestApi,
    SpelMq,
}

impl IdempotentStrategy {
    /// Static `(scene, type) -> strategy` table; the MQ scene always
    /// resolves to `SpelMq`
    pub fn resolve(scene: IdempotentScene, idempotent_type: IdempotentType) -> Self {
        match (scene, idempotent_type) {
            (IdempotentScene::Mq, _) => Self::SpelMq,
            (IdempotentScene::RestApi, IdempotentType::Param) => Self::Param,
            (IdempotentScene::RestApi, IdempotentType::Token) => Self::Token,
            (IdempotentScene::RestApi, IdempotentType::Spel) => Self::SpelRestApi,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Param => "PARAM",
            Self::Token => "TOKEN",
            Self::SpelRestApi => "SPEL_RESTAPI",
            Self::SpelMq => "SPEL_MQ",
        }
    }
}

impl fmt::Display for IdempotentStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value of a message consumption record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeStatus {
    Consuming,
    Consumed,
}

impl ConsumeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consuming => "consuming",
            Self::Consumed => "consumed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "consuming" => Some(Self::Consuming),
            "consumed" => Some(Self::Consumed),
            _ => None,
        }
    }

    /// A duplicate that sees `consuming` must be redelivered later
    pub fn is_error(raw: &str) -> bool {
        Self::parse(raw) == Some(Self::Consuming)
    }
}

/// Per-call protection descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Idempotent {
    /// Literal name; the name generator is used when blank
    pub name: String,
    /// Key expression for SPEL strategies
    pub key: String,
    pub idempotent_type: IdempotentType,
    pub scene: IdempotentScene,
    /// Lease / record TTL; the configured default when `None`
    pub timeout: Option<Duration>,
    /// Client-facing rejection message; the configured default when `None`
    pub message: Option<String>,
    pub unique_key_prefix: String,
}

impl Idempotent {
    /// PARAM strategy on a REST call
    pub fn param() -> Self {
        Self::default()
    }

    /// TOKEN strategy on a REST call
    pub fn token() -> Self {
        Self {
            idempotent_type: IdempotentType::Token,
            ..Self::default()
        }
    }

    /// SPEL strategy on a REST call
    pub fn spel(key: impl Into<String>) -> Self {
        Self {
            idempotent_type: IdempotentType::Spel,
            key: key.into(),
            ..Self::default()
        }
    }

    /// SPEL strategy on a message consumer
    pub fn mq(key: impl Into<String>) -> Self {
        Self {
            idempotent_type: IdempotentType::Spel,
            scene: IdempotentScene::Mq,
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_unique_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.unique_key_prefix = prefix.into();
        self
    }

    pub fn strategy(&self) -> IdempotentStrategy {
        IdempotentStrategy::resolve(self.scene, self.idempotent_type)
    }
}

/// One argument of a protected call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationArg {
    pub name: String,
    pub type_name: String,
    pub value: Value,
}

/// Identity and request metadata of a protected call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invocation {
    pub target_type: String,
    pub method: String,
    pub args: Vec<InvocationArg>,
    pub request_path: Option<String>,
    pub caller_id: Option<String>,
    pub headers: HashMap<String, String>,
    pub query_params: HashMap<String, String>,
}

impl Invocation {
    pub fn new(target_type: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            method: method.into(),
            ..Self::default()
        }
    }

    pub fn arg(
        mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.args.push(InvocationArg {
            name: name.into(),
            type_name: type_name.into(),
            value: value.into(),
        });
        self
    }

    pub fn request_path(mut self, path: impl Into<String>) -> Self {
        self.request_path = Some(path.into());
        self
    }

    pub fn caller(mut self, caller_id: impl Into<String>) -> Self {
        self.caller_id = Some(caller_id.into());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.insert(name.into(), value.into());
        self
    }

    /// Header value, matched case-insensitively
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(String::as_str)
    }

    pub fn arg_value(&self, name: &str) -> Option<&Value> {
        self.args.iter().find(|a| a.name == name).map(|a| &a.value)
    }
}
