pub mod app_config;
pub mod booking_repo;
pub mod database;
mod error;
pub mod flight_repo;
pub mod passenger_repo;
pub mod redis_repo;

use aerobook_core::Repositories;
use std::sync::Arc;

pub use app_config::Config;
pub use booking_repo::PostgresBookingRepository;
pub use database::DbClient;
pub use flight_repo::PostgresFlightRepository;
pub use passenger_repo::PostgresPassengerRepository;
pub use redis_repo::{RedisClient, RedisLockProvider};

/// Postgres-backed repositories sharing one pool.
pub fn postgres_repositories(db: &DbClient) -> Repositories {
    Repositories {
        flights: Arc::new(PostgresFlightRepository::new(db.pool.clone())),
        passengers: Arc::new(PostgresPassengerRepository::new(db.pool.clone())),
        bookings: Arc::new(PostgresBookingRepository::new(db.pool.clone())),
    }
}
