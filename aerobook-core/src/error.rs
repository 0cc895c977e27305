use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Names of the storage constraints the booking core relies on.
///
/// The Postgres migrations and the in-memory store use the same names, so a
/// violation can be classified the same way regardless of backend.
pub mod constraints {
    pub const BOOKING_FLIGHT_SEAT: &str = "bookings_flight_seat_key";
    pub const BOOKING_FLIGHT_PASSENGER: &str = "bookings_flight_passenger_key";
    pub const BOOKING_FLIGHT_FK: &str = "bookings_flight_id_fkey";
    pub const BOOKING_PASSENGER_FK: &str = "bookings_passenger_id_fkey";
    pub const FLIGHT_NUMBER: &str = "flights_flight_number_key";
    pub const PASSENGER_EMAIL: &str = "passengers_email_key";
    pub const PASSENGER_PASSPORT: &str = "passengers_passport_number_key";
    pub const PASSENGER_PHONE: &str = "passengers_phone_number_key";
}

/// Errors surfaced by repository implementations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint `{constraint}` violated")]
    UniqueViolation { constraint: String },

    #[error("foreign key constraint `{constraint}` violated")]
    ForeignKeyViolation { constraint: String },

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn unique(constraint: &str) -> Self {
        Self::UniqueViolation {
            constraint: constraint.to_string(),
        }
    }

    pub fn foreign_key(constraint: &str) -> Self {
        Self::ForeignKeyViolation {
            constraint: constraint.to_string(),
        }
    }

    /// True when this violation was raised by the named constraint.
    pub fn violates(&self, name: &str) -> bool {
        matches!(self, Self::UniqueViolation { constraint } | Self::ForeignKeyViolation { constraint } if constraint == name)
    }
}

/// Errors surfaced by distributed lock backends.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    #[error("lock backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entity {
    Flight,
    Passenger,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Flight => write!(f, "Flight"),
            Entity::Passenger => write!(f, "Passenger"),
        }
    }
}

/// Stable, machine-readable identifier for every failure kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    FlightNotFound,
    PassengerNotFound,
    DuplicateBooking,
    NoSeatsAvailable,
    LockUnavailable,
    SeatConflict,
    CapacityBelowBooked,
    ValidationFailed,
    Conflict,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::FlightNotFound => "flight_not_found",
            ErrorCode::PassengerNotFound => "passenger_not_found",
            ErrorCode::DuplicateBooking => "duplicate_booking",
            ErrorCode::NoSeatsAvailable => "no_seats_available",
            ErrorCode::LockUnavailable => "lock_unavailable",
            ErrorCode::SeatConflict => "seat_conflict",
            ErrorCode::CapacityBelowBooked => "capacity_below_booked",
            ErrorCode::ValidationFailed => "validation_failed",
            ErrorCode::Conflict => "conflict",
            ErrorCode::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every way a booking-core operation can fail.
///
/// `LockUnavailable` and `SeatConflict` are infrastructure conditions and the
/// only retryable kinds. Everything else is a final answer for the given input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BookingError {
    #[error("{entity} with ID '{id}' was not found.")]
    NotFound { entity: Entity, id: Uuid },

    #[error("Passenger '{passenger_id}' has already booked flight '{flight_id}'.")]
    Duplicate { passenger_id: Uuid, flight_id: Uuid },

    #[error("Flight '{0}' doesn't have any available seats.")]
    NoSeatsAvailable(Uuid),

    #[error("Could not acquire booking lock for flight '{0}'. Please retry.")]
    LockUnavailable(Uuid),

    #[error("Seat {seat_number} on flight '{flight_id}' was taken concurrently. Please retry.")]
    SeatConflict { flight_id: Uuid, seat_number: i32 },

    #[error("Capacity {requested} for flight '{flight_id}' is below the highest assigned seat {highest_seat}.")]
    CapacityBelowBooked {
        flight_id: Uuid,
        requested: i32,
        highest_seat: i32,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type BookingResult<T> = Result<T, BookingError>;

impl BookingError {
    pub fn flight_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: Entity::Flight,
            id,
        }
    }

    pub fn passenger_not_found(id: Uuid) -> Self {
        Self::NotFound {
            entity: Entity::Passenger,
            id,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            BookingError::NotFound { entity: Entity::Flight, .. } => ErrorCode::FlightNotFound,
            BookingError::NotFound { entity: Entity::Passenger, .. } => ErrorCode::PassengerNotFound,
            BookingError::Duplicate { .. } => ErrorCode::DuplicateBooking,
            BookingError::NoSeatsAvailable(_) => ErrorCode::NoSeatsAvailable,
            BookingError::LockUnavailable(_) => ErrorCode::LockUnavailable,
            BookingError::SeatConflict { .. } => ErrorCode::SeatConflict,
            BookingError::CapacityBelowBooked { .. } => ErrorCode::CapacityBelowBooked,
            BookingError::Validation(_) => ErrorCode::ValidationFailed,
            BookingError::Conflict(_) => ErrorCode::Conflict,
            BookingError::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Only lock contention and a lost seat race may be retried automatically.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BookingError::LockUnavailable(_) | BookingError::SeatConflict { .. }
        )
    }

    /// Message safe to show a client. Internal details are never exposed.
    pub fn public_message(&self) -> String {
        match self {
            BookingError::Internal(_) => "Internal error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for BookingError {
    fn from(err: StoreError) -> Self {
        BookingError::Internal(err.to_string())
    }
}

impl From<LockError> for BookingError {
    fn from(err: LockError) -> Self {
        BookingError::Internal(err.to_string())
    }
}
