use tracing::{info, warn};
use uuid::Uuid;

use crate::booking::BookingView;
use crate::error::{constraints, BookingError, BookingResult, StoreError};
use crate::flight::{Flight, FlightFilter, NewFlight};
use crate::passenger::{NewPassenger, Passenger};
use crate::repository::Repositories;

/// Flight catalog: creation, search and per-flight booking listings.
#[derive(Clone)]
pub struct FlightService {
    repos: Repositories,
}

impl FlightService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn create_flight(&self, req: NewFlight) -> BookingResult<Flight> {
        let flight = req.into_flight()?;
        self.repos
            .flights
            .insert_flight(&flight)
            .await
            .map_err(|e| conflict_or_internal(e, &[(constraints::FLIGHT_NUMBER, "Flight number already exists")]))?;
        info!(flight_id = %flight.id, flight_number = %flight.flight_number, "Flight created");
        Ok(flight)
    }

    pub async fn filter_flights(&self, filter: &FlightFilter) -> BookingResult<Vec<Flight>> {
        filter.validate()?;
        Ok(self.repos.flights.filter_flights(filter).await?)
    }

    pub async fn get_flight(&self, id: Uuid) -> BookingResult<Flight> {
        self.repos
            .flights
            .get_flight(id)
            .await?
            .ok_or(BookingError::flight_not_found(id))
    }

    pub async fn list_bookings(&self, flight_id: Uuid) -> BookingResult<Vec<BookingView>> {
        if !self.repos.flights.flight_exists(flight_id).await? {
            return Err(BookingError::flight_not_found(flight_id));
        }
        Ok(self.repos.bookings.list_flight_bookings(flight_id).await?)
    }
}

#[derive(Clone)]
pub struct PassengerService {
    repos: Repositories,
}

impl PassengerService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn create_passenger(&self, req: NewPassenger) -> BookingResult<Passenger> {
        let passenger = req.into_passenger()?;
        self.repos
            .passengers
            .insert_passenger(&passenger)
            .await
            .map_err(|e| {
                conflict_or_internal(
                    e,
                    &[
                        (constraints::PASSENGER_EMAIL, "Passenger with same email already exists."),
                        (constraints::PASSENGER_PASSPORT, "Passenger with same passport number already exists."),
                        (constraints::PASSENGER_PHONE, "Passenger with same phone number already exists."),
                    ],
                )
            })?;
        info!(passenger_id = %passenger.id, "Passenger created");
        Ok(passenger)
    }

    pub async fn list_passengers(&self) -> BookingResult<Vec<Passenger>> {
        Ok(self.repos.passengers.list_passengers().await?)
    }
}

fn conflict_or_internal(err: StoreError, known: &[(&str, &str)]) -> BookingError {
    match known.iter().find(|(constraint, _)| err.violates(constraint)) {
        Some((_, message)) => {
            warn!(error = %err, "Rejected duplicate record");
            BookingError::Conflict((*message).to_string())
        }
        None => err.into(),
    }
}
