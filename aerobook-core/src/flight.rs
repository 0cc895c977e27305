use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BookingError, BookingResult};

pub const MAX_AIRPORT_LEN: usize = 30;
pub const MAX_FLIGHT_NUMBER_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    pub id: Uuid,
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    /// Total number of seats; seat numbers run from 1 to `capacity`.
    pub capacity: i32,
    /// Ticket price in minor currency units.
    pub price_amount: i32,
}

/// Input for creating a flight.
#[derive(Debug, Clone, Deserialize)]
pub struct NewFlight {
    pub flight_number: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub capacity: i32,
    pub price_amount: i32,
}

impl NewFlight {
    pub fn validate(&self) -> BookingResult<()> {
        if self.flight_number.trim().is_empty() {
            return Err(BookingError::Validation("flight number must not be empty".into()));
        }
        if self.flight_number.trim().chars().count() > MAX_FLIGHT_NUMBER_LEN {
            return Err(BookingError::Validation(format!(
                "flight number must be at most {MAX_FLIGHT_NUMBER_LEN} characters"
            )));
        }
        validate_airport("origin", &self.origin)?;
        validate_airport("destination", &self.destination)?;
        if self.origin == self.destination {
            return Err(BookingError::Validation(
                "origin and destination cannot be the same".into(),
            ));
        }
        if self.capacity < 0 {
            return Err(BookingError::Validation("capacity cannot be negative".into()));
        }
        if self.price_amount < 0 {
            return Err(BookingError::Validation("price cannot be negative".into()));
        }
        if self.departure_time >= self.arrival_time {
            return Err(BookingError::Validation(
                "departure must be before arrival".into(),
            ));
        }
        if self.arrival_time <= Utc::now() {
            return Err(BookingError::Validation("arrival must be in the future".into()));
        }
        Ok(())
    }

    /// Validates and assigns a fresh time-ordered id.
    pub fn into_flight(self) -> BookingResult<Flight> {
        self.validate()?;
        Ok(Flight {
            id: Uuid::now_v7(),
            flight_number: self.flight_number.trim().to_string(),
            origin: self.origin,
            destination: self.destination,
            departure_time: self.departure_time,
            arrival_time: self.arrival_time,
            capacity: self.capacity,
            price_amount: self.price_amount,
        })
    }
}

fn validate_airport(field: &str, value: &str) -> BookingResult<()> {
    if value.trim().is_empty() {
        return Err(BookingError::Validation(format!("{field} must not be empty")));
    }
    if value.chars().count() > MAX_AIRPORT_LEN {
        return Err(BookingError::Validation(format!(
            "{field} must be at most {MAX_AIRPORT_LEN} characters"
        )));
    }
    Ok(())
}

/// Search criteria for flights. Dates match on the UTC calendar day.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlightFilter {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub departure_date: Option<NaiveDate>,
    pub arrival_date: Option<NaiveDate>,
}

impl FlightFilter {
    pub fn validate(&self) -> BookingResult<()> {
        for (field, value) in [("origin", &self.origin), ("destination", &self.destination)] {
            if let Some(v) = value {
                if v.chars().count() > MAX_AIRPORT_LEN {
                    return Err(BookingError::Validation(format!(
                        "{field} must be at most {MAX_AIRPORT_LEN} characters"
                    )));
                }
            }
        }
        if let (Some(o), Some(d)) = (self.origin(), self.destination()) {
            if o == d {
                return Err(BookingError::Validation(
                    "origin and destination cannot be the same".into(),
                ));
            }
        }
        Ok(())
    }

    /// Origin criterion, ignoring blank values.
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn destination(&self) -> Option<&str> {
        self.destination.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn matches(&self, flight: &Flight) -> bool {
        self.origin().map_or(true, |o| flight.origin == o)
            && self.destination().map_or(true, |d| flight.destination == d)
            && self
                .departure_date
                .map_or(true, |d| flight.departure_time.date_naive() == d)
            && self
                .arrival_date
                .map_or(true, |d| flight.arrival_time.date_naive() == d)
    }
}
