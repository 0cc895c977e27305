use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A committed seat reservation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub passenger_id: Uuid,
    pub flight_id: Uuid,
    pub seat_number: i32,
    pub booked_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(passenger_id: Uuid, flight_id: Uuid, seat_number: i32) -> Self {
        Self {
            id: Uuid::now_v7(),
            passenger_id,
            flight_id,
            seat_number,
            booked_at: Utc::now(),
        }
    }
}

/// Booking joined with the passenger's name, as listed per flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingView {
    pub id: Uuid,
    pub passenger_id: Uuid,
    pub passenger_name: String,
    pub flight_id: Uuid,
    pub seat_number: i32,
    pub booked_at: DateTime<Utc>,
}
