use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use crate::config;

/// Errors from outbound collaborator calls
#[derive(Debug, Error)]
pub enum BusError {
    #[error("collaborator {service}.{action} rejected the request: {message}")]
    Rejected {
        service: String,
        action: String,
        message: String,
    },

    #[error("malformed collaborator response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

/// Outbound request/response edge of the message bus.
///
/// Behind a trait so tests can substitute a scripted bus; production wires
/// the gateway client below.
#[async_trait]
pub trait ServiceBus: Send + Sync {
    async fn ask(&self, service: &str, action: &str, params: Value) -> Result<Value, BusError>;
}

/// Collaborator RPC over the bus HTTP gateway
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn from_config() -> Self {
        Self::new(config::config().bus.gateway_url.clone())
    }
}

#[async_trait]
impl ServiceBus for GatewayClient {
    async fn ask(&self, service: &str, action: &str, params: Value) -> Result<Value, BusError> {
        let body = json!({
            "service": service,
            "action": action,
            "params": params,
        });

        let response = self
            .http
            .post(format!("{}/ask", self.base_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let payload: Value = response.json().await?;

        if let Some(message) = payload.get("error").and_then(Value::as_str) {
            return Err(BusError::Rejected {
                service: service.to_string(),
                action: action.to_string(),
                message: message.to_string(),
            });
        }

        payload
            .get("result")
            .cloned()
            .ok_or_else(|| BusError::InvalidResponse("missing result field".to_string()))
    }
}

/// Unwrap a collaborator result expected to be a plain string (URLs, keys)
pub fn expect_str(value: Value) -> Result<String, BusError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(BusError::InvalidResponse(format!(
            "expected string result, got {}",
            other
        ))),
    }
}
