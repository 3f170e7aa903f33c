//! Reservation endpoints.

use crate::error::AppError;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use reserva_app::CreateReservationRequest;
use reserva_domain::{Reservation, ReservationCode, ReservationStatus, Snapshot};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Customer identity data for reservation creation.
#[derive(Debug, Deserialize)]
pub struct CustomerDto {
    /// Customer first name.
    pub first_name: String,
    /// Customer last name.
    pub last_name: String,
    /// Contact email.
    pub email: String,
    /// Optional contact phone.
    #[serde(default)]
    pub phone: Option<String>,
}

/// Vehicle snapshot used for reservation and provider dispatch.
#[derive(Debug, Deserialize)]
pub struct VehicleDto {
    /// Internal vehicle code.
    pub vehicle_code: String,
    /// Vehicle model label.
    pub model: String,
    /// Rental category.
    pub category: String,
}

/// Request body for `POST /api/v1/reservations`.
#[derive(Debug, Deserialize)]
pub struct CreateReservationDto {
    /// Supplier the booking is placed with.
    pub supplier_code: String,
    /// Pickup office code.
    pub pickup_office_code: String,
    /// Dropoff office code.
    pub dropoff_office_code: String,
    /// Start of the rental window.
    pub pickup_datetime: DateTime<Utc>,
    /// End of the rental window.
    pub dropoff_datetime: DateTime<Utc>,
    /// Total price with two fractional digits.
    pub total_amount: Decimal,
    /// Customer data.
    pub customer: CustomerDto,
    /// Vehicle data.
    pub vehicle: VehicleDto,
}

impl CreateReservationDto {
    /// Shape-level validation; business rules are re-checked by the use case.
    fn validate(&self) -> Result<(), AppError> {
        for (field, value, max) in [
            ("supplier_code", &self.supplier_code, 40),
            ("pickup_office_code", &self.pickup_office_code, 40),
            ("dropoff_office_code", &self.dropoff_office_code, 40),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::validation(format!("{field} must not be empty")));
            }
            if value.len() > max {
                return Err(AppError::validation(format!(
                    "{field} must be at most {max} characters"
                )));
            }
        }
        for (field, value) in [
            ("customer.first_name", &self.customer.first_name),
            ("customer.last_name", &self.customer.last_name),
            ("vehicle.vehicle_code", &self.vehicle.vehicle_code),
            ("vehicle.model", &self.vehicle.model),
            ("vehicle.category", &self.vehicle.category),
        ] {
            if value.trim().is_empty() {
                return Err(AppError::validation(format!("{field} must not be empty")));
            }
        }
        if !self.customer.email.contains('@') || self.customer.email.trim().is_empty() {
            return Err(AppError::validation("customer.email must be a valid email"));
        }
        if self.total_amount.scale() > 2 {
            return Err(AppError::validation(
                "total_amount must have at most two decimal places",
            ));
        }
        Ok(())
    }

    fn customer_snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.insert("first_name".into(), self.customer.first_name.clone().into());
        snapshot.insert("last_name".into(), self.customer.last_name.clone().into());
        snapshot.insert("email".into(), self.customer.email.clone().into());
        if let Some(phone) = &self.customer.phone {
            snapshot.insert("phone".into(), phone.clone().into());
        }
        snapshot
    }

    fn vehicle_snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.insert("vehicle_code".into(), self.vehicle.vehicle_code.clone().into());
        snapshot.insert("model".into(), self.vehicle.model.clone().into());
        snapshot.insert("category".into(), self.vehicle.category.clone().into());
        snapshot
    }
}

/// Response payload for reservation endpoints.
#[derive(Debug, Serialize)]
pub struct ReservationResponseDto {
    /// Public reservation identity.
    pub reservation_code: String,
    /// Current lifecycle status.
    pub status: ReservationStatus,
    /// Supplier code.
    pub supplier_code: String,
    /// Start of the rental window.
    pub pickup_datetime: DateTime<Utc>,
    /// End of the rental window.
    pub dropoff_datetime: DateTime<Utc>,
    /// Total price.
    pub total_amount: Decimal,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<&Reservation> for ReservationResponseDto {
    fn from(reservation: &Reservation) -> Self {
        Self {
            reservation_code: reservation.reservation_code.to_string(),
            status: reservation.status,
            supplier_code: reservation.supplier_code.clone(),
            pickup_datetime: reservation.pickup_datetime,
            dropoff_datetime: reservation.dropoff_datetime,
            total_amount: reservation.total_amount,
            created_at: reservation.created_at,
        }
    }
}

/// `POST /api/v1/reservations` — create a reservation and enqueue its
/// external processing via the outbox.
///
/// # Errors
///
/// 422 for malformed input, 400 for business-rule violations, 500 when the
/// atomic persistence fails.
pub async fn create_reservation(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<ReservationResponseDto>), AppError> {
    // Deserialize by hand so shape errors surface as 422 rather than Axum's
    // default rejection.
    let dto: CreateReservationDto = serde_json::from_value(body)
        .map_err(|err| AppError::validation(format!("invalid request body: {err}")))?;
    dto.validate()?;

    let request = CreateReservationRequest {
        supplier_code: dto.supplier_code.clone(),
        pickup_office_code: dto.pickup_office_code.clone(),
        dropoff_office_code: dto.dropoff_office_code.clone(),
        pickup_datetime: dto.pickup_datetime,
        dropoff_datetime: dto.dropoff_datetime,
        total_amount: dto.total_amount,
        customer: dto.customer_snapshot(),
        vehicle: dto.vehicle_snapshot(),
    };

    let reservation = state.create_reservation.execute(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ReservationResponseDto::from(&reservation)),
    ))
}

/// `GET /api/v1/reservations/{code}` — current snapshot of a reservation.
///
/// # Errors
///
/// 404 when the code is unknown (or not even code-shaped).
pub async fn get_reservation(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<ReservationResponseDto>, AppError> {
    let Ok(code) = ReservationCode::new(code.clone()) else {
        return Err(AppError::not_found("Reservation", code));
    };

    let reservation = state
        .store
        .find_by_code(code.clone())
        .await
        .map_err(|err| AppError::internal("reservation lookup failed").with_detail(err.to_string()))?
        .ok_or_else(|| AppError::not_found("Reservation", code))?;

    Ok(Json(ReservationResponseDto::from(&reservation)))
}
