pub mod allocator;
pub mod booking;
pub mod capacity;
pub mod error;
pub mod flight;
pub mod lock;
pub mod memory;
pub mod orchestrator;
pub mod passenger;
pub mod repository;
pub mod retry;
pub mod services;

pub use booking::{Booking, BookingView};
pub use capacity::CapacityGuard;
pub use error::{BookingError, BookingResult, Entity, ErrorCode, LockError, StoreError};
pub use flight::{Flight, FlightFilter, NewFlight};
pub use lock::{DistributedLock, LockHandle, LockProvider, LocalLockProvider};
pub use memory::InMemoryStore;
pub use orchestrator::{BookingService, BookingSettings};
pub use passenger::{NewPassenger, Passenger};
pub use repository::{BookingRepository, FlightRepository, PassengerRepository, Repositories};
pub use retry::RetryPolicy;
pub use services::{FlightService, PassengerService};
