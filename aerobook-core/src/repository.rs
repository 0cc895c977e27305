use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::booking::{Booking, BookingView};
use crate::error::StoreError;
use crate::flight::{Flight, FlightFilter};
use crate::passenger::Passenger;

/// Repository trait for flight data access
#[async_trait]
pub trait FlightRepository: Send + Sync {
    /// Fails with a unique violation on `flights_flight_number_key` for a reused flight number.
    async fn insert_flight(&self, flight: &Flight) -> Result<(), StoreError>;

    async fn get_flight(&self, id: Uuid) -> Result<Option<Flight>, StoreError>;

    async fn flight_exists(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn filter_flights(&self, filter: &FlightFilter) -> Result<Vec<Flight>, StoreError>;

    /// Returns `false` when no flight with `id` exists.
    async fn update_capacity(&self, id: Uuid, capacity: i32) -> Result<bool, StoreError>;
}

/// Repository trait for passenger data access
#[async_trait]
pub trait PassengerRepository: Send + Sync {
    async fn insert_passenger(&self, passenger: &Passenger) -> Result<(), StoreError>;

    async fn passenger_exists(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn list_passengers(&self) -> Result<Vec<Passenger>, StoreError>;
}

/// Repository trait for reservations.
///
/// Implementations must enforce unique (flight, seat) and unique
/// (flight, passenger) on insert, independently of any application lock.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn has_booking(&self, flight_id: Uuid, passenger_id: Uuid) -> Result<bool, StoreError>;

    async fn booked_seats(&self, flight_id: Uuid) -> Result<HashSet<i32>, StoreError>;

    /// Highest assigned seat number on the flight, if any seat is booked.
    async fn max_seat(&self, flight_id: Uuid) -> Result<Option<i32>, StoreError>;

    /// Atomically inserts the row or fails with a constraint violation.
    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError>;

    /// Bookings of a flight ordered by seat number.
    async fn list_flight_bookings(&self, flight_id: Uuid) -> Result<Vec<BookingView>, StoreError>;
}

/// The repositories a service is wired with.
#[derive(Clone)]
pub struct Repositories {
    pub flights: Arc<dyn FlightRepository>,
    pub passengers: Arc<dyn PassengerRepository>,
    pub bookings: Arc<dyn BookingRepository>,
}
