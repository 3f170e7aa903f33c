//! Application state shared across HTTP handlers.

use reserva_app::CreateReservation;
use reserva_domain::ReservationStore;
use std::sync::Arc;

/// State handed to every handler.
///
/// Cheap to clone: everything is behind an `Arc`. Wiring happens once in
/// the binaries (or in tests, over the in-memory store).
#[derive(Clone)]
pub struct AppState {
    /// Create-reservation use case.
    pub create_reservation: Arc<CreateReservation>,
    /// Read access for the GET endpoint.
    pub store: Arc<dyn ReservationStore>,
}

impl AppState {
    /// Bundle the handler dependencies.
    #[must_use]
    pub fn new(create_reservation: Arc<CreateReservation>, store: Arc<dyn ReservationStore>) -> Self {
        Self {
            create_reservation,
            store,
        }
    }
}
