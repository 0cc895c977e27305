use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::allocator::next_free_seat;
use crate::booking::Booking;
use crate::error::{constraints, BookingError, BookingResult, StoreError};
use crate::lock::{with_flight_lock, LockProvider};
use crate::repository::Repositories;
use crate::retry::{retry_transient, RetryPolicy};

#[derive(Debug, Clone)]
pub struct BookingSettings {
    /// Longest a caller waits for the flight lock before `LockUnavailable`.
    pub lock_timeout: Duration,
}

impl Default for BookingSettings {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(30),
        }
    }
}

/// Assigns seats.
///
/// Every reservation for a flight is decided while holding that flight's lock,
/// from state read inside the lock. The storage constraints on (flight, seat)
/// and (flight, passenger) catch anything that slips past the lock.
#[derive(Clone)]
pub struct BookingService {
    repos: Repositories,
    locks: Arc<dyn LockProvider>,
    settings: BookingSettings,
}

impl BookingService {
    pub fn new(repos: Repositories, locks: Arc<dyn LockProvider>, settings: BookingSettings) -> Self {
        Self {
            repos,
            locks,
            settings,
        }
    }

    /// Reserves the lowest free seat on `flight_id` for `passenger_id`.
    ///
    /// Inserts exactly one booking on success and nothing on failure.
    #[instrument(skip(self), fields(seat_number = tracing::field::Empty))]
    pub async fn reserve(&self, passenger_id: Uuid, flight_id: Uuid) -> BookingResult<Booking> {
        if !self.repos.flights.flight_exists(flight_id).await? {
            warn!("Flight not found");
            return Err(BookingError::flight_not_found(flight_id));
        }
        if !self.repos.passengers.passenger_exists(passenger_id).await? {
            warn!("Passenger not found");
            return Err(BookingError::passenger_not_found(passenger_id));
        }

        let booking = with_flight_lock(
            self.locks.as_ref(),
            flight_id,
            self.settings.lock_timeout,
            self.assign_seat(passenger_id, flight_id),
        )
        .await?;

        tracing::Span::current().record("seat_number", booking.seat_number);
        info!(booking_id = %booking.id, "Seat reserved");
        Ok(booking)
    }

    /// [`reserve`](Self::reserve), retrying lock contention and lost seat races.
    pub async fn reserve_with_retry(
        &self,
        passenger_id: Uuid,
        flight_id: Uuid,
        policy: &RetryPolicy,
    ) -> BookingResult<Booking> {
        retry_transient(policy, move || self.reserve(passenger_id, flight_id)).await
    }

    async fn assign_seat(&self, passenger_id: Uuid, flight_id: Uuid) -> BookingResult<Booking> {
        if self.repos.bookings.has_booking(flight_id, passenger_id).await? {
            warn!(%passenger_id, %flight_id, "Passenger already booked this flight");
            return Err(BookingError::Duplicate {
                passenger_id,
                flight_id,
            });
        }

        // Capacity may have changed since the existence check.
        let flight = self
            .repos
            .flights
            .get_flight(flight_id)
            .await?
            .ok_or(BookingError::flight_not_found(flight_id))?;

        let booked = self.repos.bookings.booked_seats(flight_id).await?;
        let seat_number = next_free_seat(&flight, &booked).inspect_err(|_| {
            warn!(%flight_id, capacity = flight.capacity, "Flight is full");
        })?;

        let booking = Booking::new(passenger_id, flight_id, seat_number);
        self.repos
            .bookings
            .insert_booking(&booking)
            .await
            .map_err(|e| classify_insert_error(e, passenger_id, flight_id, seat_number))?;
        Ok(booking)
    }
}

/// Maps a failed booking insert onto the booking taxonomy by constraint name.
fn classify_insert_error(
    err: StoreError,
    passenger_id: Uuid,
    flight_id: Uuid,
    seat_number: i32,
) -> BookingError {
    if err.violates(constraints::BOOKING_FLIGHT_SEAT) {
        warn!(%flight_id, seat_number, "Seat taken concurrently; storage constraint held");
        BookingError::SeatConflict {
            flight_id,
            seat_number,
        }
    } else if err.violates(constraints::BOOKING_FLIGHT_PASSENGER) {
        warn!(%flight_id, %passenger_id, "Duplicate booking rejected by storage constraint");
        BookingError::Duplicate {
            passenger_id,
            flight_id,
        }
    } else if err.violates(constraints::BOOKING_FLIGHT_FK) {
        BookingError::flight_not_found(flight_id)
    } else if err.violates(constraints::BOOKING_PASSENGER_FK) {
        BookingError::passenger_not_found(passenger_id)
    } else {
        error!(%flight_id, %passenger_id, error = %err, "Failed to persist booking");
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking::BookingView;
    use crate::flight::Flight;
    use crate::lock::{acquire_flight_lock, flight_lock_name, LocalLockProvider};
    use crate::memory::InMemoryStore;
    use crate::passenger::Passenger;
    use crate::repository::{BookingRepository, FlightRepository, PassengerRepository};
    use aerobook_shared::Masked;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::HashSet;

    struct Fixture {
        store: Arc<InMemoryStore>,
        locks: LocalLockProvider,
        service: BookingService,
    }

    fn fixture_with(store: InMemoryStore, lock_timeout: Duration) -> Fixture {
        let store = Arc::new(store);
        let locks = LocalLockProvider::new();
        let service = BookingService::new(
            store.clone().repositories(),
            Arc::new(locks.clone()),
            BookingSettings { lock_timeout },
        );
        Fixture {
            store,
            locks,
            service,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(InMemoryStore::new(), Duration::from_secs(5))
    }

    async fn add_flight(store: &InMemoryStore, capacity: i32) -> Uuid {
        let departure = Utc::now() + chrono::Duration::days(7);
        let flight = Flight {
            id: Uuid::now_v7(),
            flight_number: format!("W5{}", &Uuid::new_v4().simple().to_string()[..6]),
            origin: "THR".into(),
            destination: "DXB".into(),
            departure_time: departure,
            arrival_time: departure + chrono::Duration::hours(2),
            capacity,
            price_amount: 42000,
        };
        store.insert_flight(&flight).await.unwrap();
        flight.id
    }

    async fn add_passenger(store: &InMemoryStore) -> Uuid {
        let tag = Uuid::new_v4().simple().to_string();
        let passenger = Passenger {
            id: Uuid::now_v7(),
            full_name: "Reza Karimi".into(),
            email: Masked::new(format!("{tag}@example.com")),
            passport_number: Masked::new(tag[..12].to_string()),
            phone_number: None,
        };
        store.insert_passenger(&passenger).await.unwrap();
        passenger.id
    }

    #[tokio::test]
    async fn test_first_booking_gets_seat_one() {
        let fx = fixture();
        let flight = add_flight(&fx.store, 100).await;
        let passenger = add_passenger(&fx.store).await;

        let booking = fx.service.reserve(passenger, flight).await.unwrap();
        assert_eq!(booking.seat_number, 1);
        assert_eq!(booking.flight_id, flight);
        assert_eq!(booking.passenger_id, passenger);
        assert_eq!(fx.store.booking_count(), 1);
    }

    #[tokio::test]
    async fn test_sequential_bookings_get_sequential_seats() {
        let fx = fixture();
        let flight = add_flight(&fx.store, 100).await;

        for expected in 1..=3 {
            let passenger = add_passenger(&fx.store).await;
            let booking = fx.service.reserve(passenger, flight).await.unwrap();
            assert_eq!(booking.seat_number, expected);
        }
    }

    #[tokio::test]
    async fn test_lowest_free_seat_is_reused() {
        let fx = fixture();
        let flight = add_flight(&fx.store, 5).await;
        for seat in [2, 3] {
            let p = add_passenger(&fx.store).await;
            fx.store.insert_booking(&Booking::new(p, flight, seat)).await.unwrap();
        }

        let passenger = add_passenger(&fx.store).await;
        let booking = fx.service.reserve(passenger, flight).await.unwrap();
        assert_eq!(booking.seat_number, 1);
    }

    #[tokio::test]
    async fn test_unknown_flight_is_checked_first() {
        let fx = fixture();
        let flight = Uuid::now_v7();
        let passenger = Uuid::now_v7();

        let err = fx.service.reserve(passenger, flight).await.unwrap_err();
        assert_eq!(err, BookingError::flight_not_found(flight));
        assert!(err.to_string().contains("was not found"));
    }

    #[tokio::test]
    async fn test_unknown_passenger() {
        let fx = fixture();
        let flight = add_flight(&fx.store, 10).await;
        let passenger = Uuid::now_v7();

        let err = fx.service.reserve(passenger, flight).await.unwrap_err();
        assert_eq!(err, BookingError::passenger_not_found(passenger));
        assert_eq!(fx.store.booking_count(), 0);
    }

    #[tokio::test]
    async fn test_second_reserve_is_duplicate() {
        let fx = fixture();
        let flight = add_flight(&fx.store, 10).await;
        let passenger = add_passenger(&fx.store).await;

        let first = fx.service.reserve(passenger, flight).await.unwrap();
        let err = fx.service.reserve(passenger, flight).await.unwrap_err();
        assert_eq!(
            err,
            BookingError::Duplicate {
                passenger_id: passenger,
                flight_id: flight
            }
        );

        let bookings = fx.store.list_flight_bookings(flight).await.unwrap();
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].id, first.id);
        assert_eq!(bookings[0].seat_number, 1);
    }

    #[tokio::test]
    async fn test_full_flight_rejects_next_passenger() {
        let fx = fixture();
        let flight = add_flight(&fx.store, 3).await;
        for _ in 0..3 {
            let p = add_passenger(&fx.store).await;
            fx.service.reserve(p, flight).await.unwrap();
        }

        let late = add_passenger(&fx.store).await;
        let err = fx.service.reserve(late, flight).await.unwrap_err();
        assert_eq!(err, BookingError::NoSeatsAvailable(flight));
        assert_eq!(fx.store.booking_count(), 3);
    }

    #[tokio::test]
    async fn test_lock_released_after_failure() {
        let fx = fixture();
        let flight = add_flight(&fx.store, 0).await;
        let passenger = add_passenger(&fx.store).await;

        assert!(fx.service.reserve(passenger, flight).await.is_err());
        assert!(!fx.locks.is_held(&flight_lock_name(flight)));

        let handle = acquire_flight_lock(&fx.locks, flight, Duration::ZERO).await;
        assert!(handle.is_ok());
    }

    #[tokio::test]
    async fn test_held_lock_yields_lock_unavailable() {
        let fx = fixture_with(InMemoryStore::new(), Duration::from_millis(50));
        let flight = add_flight(&fx.store, 10).await;
        let passenger = add_passenger(&fx.store).await;

        let _held = acquire_flight_lock(&fx.locks, flight, Duration::ZERO).await.unwrap();
        let err = fx.service.reserve(passenger, flight).await.unwrap_err();
        assert_eq!(err, BookingError::LockUnavailable(flight));
        assert!(err.is_retryable());
        assert_eq!(fx.store.booking_count(), 0);
    }

    #[tokio::test]
    async fn test_other_flights_do_not_contend() {
        let fx = fixture_with(InMemoryStore::new(), Duration::from_millis(50));
        let busy = add_flight(&fx.store, 10).await;
        let free = add_flight(&fx.store, 10).await;
        let passenger = add_passenger(&fx.store).await;

        let _held = acquire_flight_lock(&fx.locks, busy, Duration::ZERO).await.unwrap();
        assert!(fx.service.reserve(passenger, free).await.is_ok());
    }

    #[tokio::test]
    async fn test_retry_waits_out_lock_contention() {
        let fx = fixture_with(InMemoryStore::new(), Duration::from_millis(20));
        let flight = add_flight(&fx.store, 10).await;
        let passenger = add_passenger(&fx.store).await;

        let held = acquire_flight_lock(&fx.locks, flight, Duration::ZERO).await.unwrap();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            held.release().await.unwrap();
        });

        let policy = RetryPolicy {
            max_retries: 10,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
            multiplier: 2.0,
        };
        let booking = fx.service.reserve_with_retry(passenger, flight, &policy).await.unwrap();
        assert_eq!(booking.seat_number, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_bookings_get_distinct_seats() {
        let fx = fixture_with(InMemoryStore::with_latency(Duration::from_millis(2)), Duration::from_secs(10));
        let flight = add_flight(&fx.store, 100).await;

        let mut tasks = Vec::new();
        for _ in 0..5 {
            let passenger = add_passenger(&fx.store).await;
            let service = fx.service.clone();
            tasks.push(tokio::spawn(async move { service.reserve(passenger, flight).await }));
        }

        let mut seats = HashSet::new();
        for task in tasks {
            let booking = task.await.unwrap().unwrap();
            assert!(seats.insert(booking.seat_number), "seat assigned twice");
        }
        assert_eq!(seats, (1..=5).collect::<HashSet<_>>());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_bookings_for_last_seat() {
        let fx = fixture_with(InMemoryStore::with_latency(Duration::from_millis(2)), Duration::from_secs(10));
        let flight = add_flight(&fx.store, 1).await;

        let mut tasks = Vec::new();
        for _ in 0..3 {
            let passenger = add_passenger(&fx.store).await;
            let service = fx.service.clone();
            tasks.push(tokio::spawn(async move { service.reserve(passenger, flight).await }));
        }

        let mut winners = Vec::new();
        for task in tasks {
            match task.await.unwrap() {
                Ok(booking) => winners.push(booking.seat_number),
                Err(err) => assert_eq!(err, BookingError::NoSeatsAvailable(flight)),
            }
        }
        assert_eq!(winners, vec![1]);
        assert_eq!(fx.store.booking_count(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_duplicate_requests_book_once() {
        let fx = fixture_with(InMemoryStore::with_latency(Duration::from_millis(2)), Duration::from_secs(10));
        let flight = add_flight(&fx.store, 10).await;
        let passenger = add_passenger(&fx.store).await;

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let service = fx.service.clone();
                tokio::spawn(async move { service.reserve(passenger, flight).await })
            })
            .collect();

        let mut ok = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => ok += 1,
                Err(err) => assert_eq!(err.code(), crate::ErrorCode::DuplicateBooking),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(fx.store.booking_count(), 1);
    }

    #[tokio::test]
    async fn test_dropped_reserve_leaves_lock_free() {
        let fx = fixture_with(InMemoryStore::with_latency(Duration::from_millis(50)), Duration::from_secs(5));
        let flight = add_flight(&fx.store, 10).await;
        let passenger = add_passenger(&fx.store).await;

        let service = fx.service.clone();
        let task = tokio::spawn(async move { service.reserve(passenger, flight).await });
        // Existence checks take ~100ms; abort once the lock is taken.
        tokio::time::sleep(Duration::from_millis(130)).await;
        assert!(fx.locks.is_held(&flight_lock_name(flight)));
        task.abort();
        let _ = task.await;
        tokio::task::yield_now().await;

        assert!(!fx.locks.is_held(&flight_lock_name(flight)));
        let other = add_passenger(&fx.store).await;
        assert!(fx.service.reserve(other, flight).await.is_ok());
    }

    /// Booking repository whose seat reads miss every committed booking.
    struct StaleSeats(Arc<InMemoryStore>);

    #[async_trait]
    impl BookingRepository for StaleSeats {
        async fn has_booking(&self, flight_id: Uuid, passenger_id: Uuid) -> Result<bool, StoreError> {
            self.0.has_booking(flight_id, passenger_id).await
        }

        async fn booked_seats(&self, _flight_id: Uuid) -> Result<HashSet<i32>, StoreError> {
            Ok(HashSet::new())
        }

        async fn max_seat(&self, flight_id: Uuid) -> Result<Option<i32>, StoreError> {
            self.0.max_seat(flight_id).await
        }

        async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
            self.0.insert_booking(booking).await
        }

        async fn list_flight_bookings(&self, flight_id: Uuid) -> Result<Vec<BookingView>, StoreError> {
            self.0.list_flight_bookings(flight_id).await
        }
    }

    #[tokio::test]
    async fn test_storage_constraint_reports_seat_conflict() {
        let store = Arc::new(InMemoryStore::new());
        let flight = add_flight(&store, 10).await;
        let first = add_passenger(&store).await;
        let second = add_passenger(&store).await;

        // Seat 1 is written without going through the lock.
        store.insert_booking(&Booking::new(first, flight, 1)).await.unwrap();

        let mut repos = store.clone().repositories();
        repos.bookings = Arc::new(StaleSeats(store.clone()));
        let service = BookingService::new(repos, Arc::new(LocalLockProvider::new()), BookingSettings::default());

        let err = service.reserve(second, flight).await.unwrap_err();
        assert_eq!(
            err,
            BookingError::SeatConflict {
                flight_id: flight,
                seat_number: 1
            }
        );
        assert!(err.is_retryable());
        assert_eq!(store.booking_count(), 1);
    }

    #[test]
    fn test_insert_errors_are_classified_by_constraint() {
        let (p, f) = (Uuid::now_v7(), Uuid::now_v7());
        assert_eq!(
            classify_insert_error(StoreError::unique(constraints::BOOKING_FLIGHT_PASSENGER), p, f, 4),
            BookingError::Duplicate {
                passenger_id: p,
                flight_id: f
            }
        );
        assert_eq!(
            classify_insert_error(StoreError::foreign_key(constraints::BOOKING_PASSENGER_FK), p, f, 4),
            BookingError::passenger_not_found(p)
        );
        assert_eq!(
            classify_insert_error(StoreError::Backend("timeout".into()), p, f, 4).code(),
            crate::ErrorCode::InternalError
        );
    }
}
