//! Shared resilient transport for the provider adapters.

use reserva_domain::DispatchResult;
use reserva_runtime::{
    retry_with_predicate, CircuitBreaker, CircuitBreakerError, RetryPolicy,
};
use std::time::Duration;
use thiserror::Error;

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport-level failure of one provider call.
#[derive(Error, Debug)]
pub(crate) enum TransportError {
    /// The call exceeded the per-call timeout.
    #[error("provider call timed out")]
    Timeout,
    /// Any other transport or HTTP-status failure.
    #[error("{0}")]
    Http(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err.to_string())
        }
    }
}

/// One provider endpoint with its resilience envelope.
///
/// Holds everything both adapters share: the HTTP client, the target URL,
/// the per-call timeout, and the retry/breaker pair. The breaker instance
/// is per-dependency — construct one endpoint per provider and clone it
/// into the adapter.
#[derive(Clone)]
pub struct ProviderEndpoint {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    breaker: CircuitBreaker,
    retry: RetryPolicy,
}

impl ProviderEndpoint {
    /// Build an endpoint for `url` (the full resource URL, e.g.
    /// `https://api.stripe.example/payments`).
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        url: impl Into<String>,
        breaker: CircuitBreaker,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            timeout: DEFAULT_TIMEOUT,
            breaker,
            retry,
        }
    }

    /// Override the per-call timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// POST the payload through retry and breaker, mapping every exit to a
    /// [`DispatchResult`].
    pub(crate) async fn dispatch(&self, payload: &serde_json::Value) -> DispatchResult {
        let outcome = retry_with_predicate(
            self.retry.clone(),
            || self.breaker.call(|| self.post(payload)),
            // A tripped breaker fails fast; retrying it is pointless.
            |err| !matches!(err, CircuitBreakerError::Open),
        )
        .await;

        match outcome {
            Ok(result) => result,
            Err(CircuitBreakerError::Open) => {
                tracing::warn!(url = %self.url, "provider circuit open, call short-circuited");
                DispatchResult::failure("CIRCUIT_OPEN", None)
            }
            Err(CircuitBreakerError::Inner(TransportError::Timeout)) => {
                DispatchResult::failure("TIMEOUT", None)
            }
            Err(CircuitBreakerError::Inner(TransportError::Http(detail))) => {
                DispatchResult::failure(
                    "FAILED",
                    Some(serde_json::json!({ "error": detail })),
                )
            }
        }
    }

    async fn post(&self, payload: &serde_json::Value) -> Result<DispatchResult, TransportError> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await?
            .error_for_status()?;

        let body: serde_json::Value = response.json().await?;
        let status = body
            .get("status")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("SUCCESS")
            .to_uppercase();
        Ok(DispatchResult::success(status, Some(body)))
    }
}
