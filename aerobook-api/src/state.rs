use aerobook_core::{
    BookingService, BookingSettings, CapacityGuard, FlightService, InMemoryStore, LocalLockProvider,
    LockProvider, PassengerService, Repositories, RetryPolicy,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub flights: FlightService,
    pub passengers: PassengerService,
    pub bookings: BookingService,
    pub capacity: CapacityGuard,
    /// Applied to `POST /v1/bookings` on lock contention or a lost seat race.
    pub retry: RetryPolicy,
}

impl AppState {
    pub fn new(
        repos: Repositories,
        locks: Arc<dyn LockProvider>,
        settings: BookingSettings,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            flights: FlightService::new(repos.clone()),
            passengers: PassengerService::new(repos.clone()),
            bookings: BookingService::new(repos.clone(), locks.clone(), settings.clone()),
            capacity: CapacityGuard::new(repos, locks, settings),
            retry,
        }
    }

    /// Single-process state: in-memory storage and process-local locks.
    pub fn in_memory(settings: BookingSettings, retry: RetryPolicy) -> Self {
        Self::new(
            Arc::new(InMemoryStore::new()).repositories(),
            Arc::new(LocalLockProvider::new()),
            settings,
            retry,
        )
    }
}
