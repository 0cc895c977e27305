//! In-memory repositories.
//!
//! Enforces the same unique and foreign-key constraints as the Postgres
//! schema and reports them under the same constraint names, so the booking
//! core behaves identically on either backend.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

use crate::booking::{Booking, BookingView};
use crate::error::{constraints, StoreError};
use crate::flight::{Flight, FlightFilter};
use crate::passenger::Passenger;
use crate::repository::{BookingRepository, FlightRepository, PassengerRepository, Repositories};

#[derive(Default)]
struct Tables {
    flights: HashMap<Uuid, Flight>,
    passengers: HashMap<Uuid, Passenger>,
    bookings: Vec<Booking>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    latency: Option<Duration>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an artificial delay before every operation. Widens race windows in tests.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn repositories(self: Arc<Self>) -> Repositories {
        Repositories {
            flights: self.clone(),
            passengers: self.clone(),
            bookings: self,
        }
    }

    pub fn booking_count(&self) -> usize {
        self.tables().bookings.len()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl FlightRepository for InMemoryStore {
    async fn insert_flight(&self, flight: &Flight) -> Result<(), StoreError> {
        self.delay().await;
        let mut tables = self.tables();
        if tables
            .flights
            .values()
            .any(|f| f.flight_number == flight.flight_number)
        {
            return Err(StoreError::unique(constraints::FLIGHT_NUMBER));
        }
        tables.flights.insert(flight.id, flight.clone());
        Ok(())
    }

    async fn get_flight(&self, id: Uuid) -> Result<Option<Flight>, StoreError> {
        self.delay().await;
        Ok(self.tables().flights.get(&id).cloned())
    }

    async fn flight_exists(&self, id: Uuid) -> Result<bool, StoreError> {
        self.delay().await;
        Ok(self.tables().flights.contains_key(&id))
    }

    async fn filter_flights(&self, filter: &FlightFilter) -> Result<Vec<Flight>, StoreError> {
        self.delay().await;
        let mut flights: Vec<Flight> = self
            .tables()
            .flights
            .values()
            .filter(|f| filter.matches(f))
            .cloned()
            .collect();
        flights.sort_by(|a, b| a.departure_time.cmp(&b.departure_time).then(a.id.cmp(&b.id)));
        Ok(flights)
    }

    async fn update_capacity(&self, id: Uuid, capacity: i32) -> Result<bool, StoreError> {
        self.delay().await;
        match self.tables().flights.get_mut(&id) {
            Some(flight) => {
                flight.capacity = capacity;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl PassengerRepository for InMemoryStore {
    async fn insert_passenger(&self, passenger: &Passenger) -> Result<(), StoreError> {
        self.delay().await;
        let mut tables = self.tables();
        for existing in tables.passengers.values() {
            if existing.email == passenger.email {
                return Err(StoreError::unique(constraints::PASSENGER_EMAIL));
            }
            if existing.passport_number == passenger.passport_number {
                return Err(StoreError::unique(constraints::PASSENGER_PASSPORT));
            }
            if passenger.phone_number.is_some() && existing.phone_number == passenger.phone_number {
                return Err(StoreError::unique(constraints::PASSENGER_PHONE));
            }
        }
        tables.passengers.insert(passenger.id, passenger.clone());
        Ok(())
    }

    async fn passenger_exists(&self, id: Uuid) -> Result<bool, StoreError> {
        self.delay().await;
        Ok(self.tables().passengers.contains_key(&id))
    }

    async fn list_passengers(&self) -> Result<Vec<Passenger>, StoreError> {
        self.delay().await;
        let mut passengers: Vec<Passenger> = self.tables().passengers.values().cloned().collect();
        passengers.sort_by_key(|p| p.id);
        Ok(passengers)
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn has_booking(&self, flight_id: Uuid, passenger_id: Uuid) -> Result<bool, StoreError> {
        self.delay().await;
        Ok(self
            .tables()
            .bookings
            .iter()
            .any(|b| b.flight_id == flight_id && b.passenger_id == passenger_id))
    }

    async fn booked_seats(&self, flight_id: Uuid) -> Result<HashSet<i32>, StoreError> {
        self.delay().await;
        Ok(self
            .tables()
            .bookings
            .iter()
            .filter(|b| b.flight_id == flight_id)
            .map(|b| b.seat_number)
            .collect())
    }

    async fn max_seat(&self, flight_id: Uuid) -> Result<Option<i32>, StoreError> {
        self.delay().await;
        Ok(self
            .tables()
            .bookings
            .iter()
            .filter(|b| b.flight_id == flight_id)
            .map(|b| b.seat_number)
            .max())
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        self.delay().await;
        let mut tables = self.tables();
        if !tables.flights.contains_key(&booking.flight_id) {
            return Err(StoreError::foreign_key(constraints::BOOKING_FLIGHT_FK));
        }
        if !tables.passengers.contains_key(&booking.passenger_id) {
            return Err(StoreError::foreign_key(constraints::BOOKING_PASSENGER_FK));
        }
        for existing in tables.bookings.iter().filter(|b| b.flight_id == booking.flight_id) {
            if existing.seat_number == booking.seat_number {
                return Err(StoreError::unique(constraints::BOOKING_FLIGHT_SEAT));
            }
            if existing.passenger_id == booking.passenger_id {
                return Err(StoreError::unique(constraints::BOOKING_FLIGHT_PASSENGER));
            }
        }
        tables.bookings.push(booking.clone());
        Ok(())
    }

    async fn list_flight_bookings(&self, flight_id: Uuid) -> Result<Vec<BookingView>, StoreError> {
        self.delay().await;
        let tables = self.tables();
        let mut views: Vec<BookingView> = tables
            .bookings
            .iter()
            .filter(|b| b.flight_id == flight_id)
            .map(|b| BookingView {
                id: b.id,
                passenger_id: b.passenger_id,
                passenger_name: tables
                    .passengers
                    .get(&b.passenger_id)
                    .map(|p| p.full_name.clone())
                    .unwrap_or_default(),
                flight_id: b.flight_id,
                seat_number: b.seat_number,
                booked_at: b.booked_at,
            })
            .collect();
        views.sort_by_key(|v| v.seat_number);
        Ok(views)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aerobook_shared::Masked;
    use chrono::Utc;

    fn flight(number: &str) -> Flight {
        let departure = Utc::now() + chrono::Duration::days(2);
        Flight {
            id: Uuid::now_v7(),
            flight_number: number.into(),
            origin: "IKA".into(),
            destination: "IST".into(),
            departure_time: departure,
            arrival_time: departure + chrono::Duration::hours(3),
            capacity: 10,
            price_amount: 15000,
        }
    }

    fn passenger(email: &str, passport: &str) -> Passenger {
        Passenger {
            id: Uuid::now_v7(),
            full_name: "Sara Ahmadi".into(),
            email: Masked::new(email.to_string()),
            passport_number: Masked::new(passport.to_string()),
            phone_number: None,
        }
    }

    #[tokio::test]
    async fn test_duplicate_flight_number_is_rejected() {
        let store = InMemoryStore::new();
        store.insert_flight(&flight("IR712")).await.unwrap();
        let err = store.insert_flight(&flight("IR712")).await.unwrap_err();
        assert!(err.violates(constraints::FLIGHT_NUMBER));
    }

    #[tokio::test]
    async fn test_passenger_uniqueness() {
        let store = InMemoryStore::new();
        store.insert_passenger(&passenger("a@x.io", "P1")).await.unwrap();

        let err = store.insert_passenger(&passenger("a@x.io", "P2")).await.unwrap_err();
        assert!(err.violates(constraints::PASSENGER_EMAIL));

        let err = store.insert_passenger(&passenger("b@x.io", "P1")).await.unwrap_err();
        assert!(err.violates(constraints::PASSENGER_PASSPORT));

        // Missing phone numbers never collide.
        store.insert_passenger(&passenger("c@x.io", "P3")).await.unwrap();
    }

    #[tokio::test]
    async fn test_booking_constraints() {
        let store = InMemoryStore::new();
        let f = flight("IR712");
        let p1 = passenger("a@x.io", "P1");
        let p2 = passenger("b@x.io", "P2");
        store.insert_flight(&f).await.unwrap();
        store.insert_passenger(&p1).await.unwrap();
        store.insert_passenger(&p2).await.unwrap();

        store.insert_booking(&Booking::new(p1.id, f.id, 1)).await.unwrap();

        let err = store.insert_booking(&Booking::new(p2.id, f.id, 1)).await.unwrap_err();
        assert!(err.violates(constraints::BOOKING_FLIGHT_SEAT));

        let err = store.insert_booking(&Booking::new(p1.id, f.id, 2)).await.unwrap_err();
        assert!(err.violates(constraints::BOOKING_FLIGHT_PASSENGER));

        let err = store
            .insert_booking(&Booking::new(p2.id, Uuid::now_v7(), 1))
            .await
            .unwrap_err();
        assert!(err.violates(constraints::BOOKING_FLIGHT_FK));

        let err = store
            .insert_booking(&Booking::new(Uuid::now_v7(), f.id, 2))
            .await
            .unwrap_err();
        assert!(err.violates(constraints::BOOKING_PASSENGER_FK));

        assert_eq!(store.booking_count(), 1);
    }

    #[tokio::test]
    async fn test_seat_queries() {
        let store = InMemoryStore::new();
        let f = flight("IR712");
        store.insert_flight(&f).await.unwrap();
        assert_eq!(store.max_seat(f.id).await.unwrap(), None);

        for (i, seat) in [3, 1, 7].into_iter().enumerate() {
            let p = passenger(&format!("p{i}@x.io"), &format!("P{i}"));
            store.insert_passenger(&p).await.unwrap();
            store.insert_booking(&Booking::new(p.id, f.id, seat)).await.unwrap();
        }

        assert_eq!(store.max_seat(f.id).await.unwrap(), Some(7));
        assert_eq!(store.booked_seats(f.id).await.unwrap(), HashSet::from([1, 3, 7]));

        let seats: Vec<i32> = store
            .list_flight_bookings(f.id)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.seat_number)
            .collect();
        assert_eq!(seats, vec![1, 3, 7]);
    }

    #[tokio::test]
    async fn test_update_capacity_unknown_flight() {
        let store = InMemoryStore::new();
        assert!(!store.update_capacity(Uuid::now_v7(), 5).await.unwrap());
    }
}
