//! Scripted gateway stubs.

use reserva_domain::{
    BookingGateway, DispatchResult, GatewayError, PaymentGateway, PortFuture, Reservation,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One scripted outcome for a stub gateway call.
#[derive(Debug, Clone)]
pub enum ScriptedOutcome {
    /// Return a successful [`DispatchResult`] with status `SUCCESS`.
    Success,
    /// Return an unsuccessful [`DispatchResult`] with the given status label.
    Failure(&'static str),
    /// Simulate the adapter blowing up with a [`GatewayError`].
    Error(&'static str),
}

/// Stub gateway usable as both [`PaymentGateway`] and [`BookingGateway`].
///
/// Outcomes are consumed from a script queue; once the queue is empty every
/// further call returns the configured default outcome. An invocation
/// counter records how many times the gateway was actually called.
///
/// # Example
///
/// ```
/// use reserva_testing::{ScriptedGateway, ScriptedOutcome};
///
/// // Fails twice, then succeeds forever.
/// let gateway = ScriptedGateway::with_script(vec![
///     ScriptedOutcome::Error("connection reset"),
///     ScriptedOutcome::Error("connection reset"),
/// ]);
/// ```
#[derive(Clone)]
pub struct ScriptedGateway {
    script: Arc<Mutex<VecDeque<ScriptedOutcome>>>,
    default: ScriptedOutcome,
    calls: Arc<AtomicUsize>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::always_succeeding()
    }
}

impl ScriptedGateway {
    /// Gateway that succeeds on every call.
    #[must_use]
    pub fn always_succeeding() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            default: ScriptedOutcome::Success,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Gateway that raises a [`GatewayError`] on every call.
    #[must_use]
    pub fn always_erroring(message: &'static str) -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            default: ScriptedOutcome::Error(message),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Gateway that consumes the given script, then succeeds forever.
    #[must_use]
    pub fn with_script(script: Vec<ScriptedOutcome>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            default: ScriptedOutcome::Success,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the queued script (e.g. to "restore" a broken adapter).
    pub fn set_script(&self, script: Vec<ScriptedOutcome>) {
        #[allow(clippy::unwrap_used)]
        let mut queue = self.script.lock().unwrap();
        *queue = script.into();
    }

    /// Number of times the gateway has been invoked.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> ScriptedOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        #[allow(clippy::unwrap_used)]
        let mut queue = self.script.lock().unwrap();
        queue.pop_front().unwrap_or_else(|| self.default.clone())
    }

    fn dispatch(&self) -> Result<DispatchResult, GatewayError> {
        match self.next_outcome() {
            ScriptedOutcome::Success => Ok(DispatchResult::success(
                "SUCCESS",
                Some(serde_json::json!({"status": "SUCCESS"})),
            )),
            ScriptedOutcome::Failure(status) => Ok(DispatchResult::failure(status, None)),
            ScriptedOutcome::Error(message) => Err(GatewayError::Dispatch(message.to_string())),
        }
    }
}

impl PaymentGateway for ScriptedGateway {
    fn process_payment(
        &self,
        _reservation: Reservation,
    ) -> PortFuture<'_, Result<DispatchResult, GatewayError>> {
        Box::pin(async move { self.dispatch() })
    }
}

impl BookingGateway for ScriptedGateway {
    fn create_booking(
        &self,
        _reservation: Reservation,
    ) -> PortFuture<'_, Result<DispatchResult, GatewayError>> {
        Box::pin(async move { self.dispatch() })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fixtures::ReservationFixture;

    #[tokio::test]
    async fn script_is_consumed_then_default_applies() {
        let gateway = ScriptedGateway::with_script(vec![
            ScriptedOutcome::Error("boom"),
            ScriptedOutcome::Failure("TIMEOUT"),
        ]);
        let reservation = ReservationFixture::new("AB12CD34").build();

        let first = gateway.process_payment(reservation.clone()).await;
        assert!(first.is_err());

        let second = gateway.process_payment(reservation.clone()).await.unwrap();
        assert!(!second.success);
        assert_eq!(second.status, "TIMEOUT");

        let third = gateway.process_payment(reservation).await.unwrap();
        assert!(third.success);
        assert_eq!(gateway.calls(), 3);
    }
}
