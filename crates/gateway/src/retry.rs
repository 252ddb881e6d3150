//! Bounded retry with exponential backoff around any gateway.
//!
//! The dispatcher never retries; transient gateway failures are absorbed
//! here and only surfaced once the attempt budget is exhausted.

use async_trait::async_trait;
use frontdesk_config::RetryConfig;
use frontdesk_core::error::GatewayError;
use frontdesk_core::gateway::{GatewayRequest, GatewayResponse};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// A gateway that wraps another gateway with bounded retry.
///
/// Only transient failures (network, timeout, rate limit, 5xx) are
/// retried; auth and configuration errors fail immediately. Delays grow
/// geometrically from `base_delay_secs` and are capped at
/// `max_delay_secs`.
pub struct RetryGateway {
    inner: Arc<dyn frontdesk_core::Gateway>,
    config: RetryConfig,
}

impl RetryGateway {
    pub fn new(inner: Arc<dyn frontdesk_core::Gateway>, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Delay before the given retry (1-based attempt that just failed).
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.config.multiplier.saturating_pow(attempt.saturating_sub(1)) as u64;
        let secs = self
            .config
            .base_delay_secs
            .saturating_mul(factor)
            .min(self.config.max_delay_secs);
        Duration::from_secs(secs)
    }
}

#[async_trait]
impl frontdesk_core::Gateway for RetryGateway {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: GatewayRequest,
    ) -> std::result::Result<GatewayResponse, GatewayError> {
        let mut last_error = GatewayError::NotConfigured("retry budget is zero".into());

        for attempt in 1..=self.config.max_attempts {
            match self.inner.complete(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_transient() && attempt < self.config.max_attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        gateway = %self.inner.name(),
                        attempt,
                        max_attempts = self.config.max_attempts,
                        delay_secs = delay.as_secs(),
                        error = %e,
                        "Transient gateway failure, backing off"
                    );
                    last_error = e;
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_transient() => {
                    info!(
                        gateway = %self.inner.name(),
                        attempts = self.config.max_attempts,
                        "Retry budget exhausted"
                    );
                    return Err(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error)
    }

    async fn health_check(&self) -> std::result::Result<bool, GatewayError> {
        self.inner.health_check().await
    }
}
