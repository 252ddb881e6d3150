//! Gateway trait — the abstraction over the remote completion endpoint.
//!
//! A Gateway knows how to send an ordered message history to an LLM and
//! get the assistant's reply back. It is the only blocking collaborator of
//! the dispatcher; retry policy lives in wrappers, not in callers.
//!
//! Implementations: OpenAI-compatible HTTP endpoints, retry wrappers,
//! scripted mocks for tests.

use crate::error::GatewayError;
use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Configuration for a gateway request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayRequest {
    /// The model to use (e.g., "glm-4-flash", "gpt-4o-mini")
    pub model: String,

    /// The conversation messages, system entry first
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A complete response from a gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayResponse {
    /// The generated assistant message
    pub message: Message,

    /// Token usage statistics
    pub usage: Option<Usage>,

    /// Which model actually responded (may differ from requested)
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The core Gateway trait.
///
/// The dispatcher calls `complete()` without knowing which backend is in
/// use — pure polymorphism. One turn of the dispatcher may invoke this
/// several times (once per internal state switch), always synchronously
/// from the dispatcher's perspective.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// A human-readable name for this gateway (e.g., "openai-compat").
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn complete(
        &self,
        request: GatewayRequest,
    ) -> std::result::Result<GatewayResponse, GatewayError>;

    /// Health check — can we reach the endpoint?
    async fn health_check(&self) -> std::result::Result<bool, GatewayError> {
        Ok(true)
    }
}
