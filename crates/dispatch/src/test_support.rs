//! Scripted gateways for tests.
//!
//! Lives in the crate proper (not behind `#[cfg(test)]`) so integration
//! tests and downstream crates can drive a session without a network.

use async_trait::async_trait;
use frontdesk_core::error::GatewayError;
use frontdesk_core::gateway::{Gateway, GatewayRequest, GatewayResponse, Usage};
use frontdesk_core::message::Message;
use std::sync::Mutex;

/// A mock gateway that returns a scripted sequence of outcomes.
///
/// Each call to `complete` consumes the next entry in the queue. Panics
/// if more calls are made than outcomes were scripted — a test that
/// under-scripts is a broken test.
pub struct SequentialMockGateway {
    outcomes: Mutex<Vec<Result<GatewayResponse, GatewayError>>>,
    call_count: Mutex<usize>,
}

impl SequentialMockGateway {
    pub fn new(outcomes: Vec<Result<GatewayResponse, GatewayError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            call_count: Mutex::new(0),
        }
    }

    /// Script a sequence of plain text replies.
    pub fn from_texts(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(Self::text_response(t))).collect())
    }

    /// Build a successful response carrying the given assistant text.
    pub fn text_response(text: &str) -> GatewayResponse {
        GatewayResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock-model".into(),
        }
    }

    /// How many completions have been requested so far.
    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl Gateway for SequentialMockGateway {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(
        &self,
        _request: GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        let mut count = self.call_count.lock().unwrap();
        let outcomes = self.outcomes.lock().unwrap();

        if *count >= outcomes.len() {
            panic!(
                "SequentialMockGateway: no more outcomes (call #{}, have {})",
                *count,
                outcomes.len()
            );
        }

        let outcome = outcomes[*count].clone();
        *count += 1;
        outcome
    }
}
