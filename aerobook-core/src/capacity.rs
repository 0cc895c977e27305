use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{BookingError, BookingResult};
use crate::lock::{with_flight_lock, LockProvider};
use crate::orchestrator::BookingSettings;
use crate::repository::Repositories;

/// Changes a flight's capacity without stranding an issued seat.
///
/// Shares the flight lock with [`BookingService`](crate::BookingService), so a
/// capacity change and a reservation on the same flight never interleave.
#[derive(Clone)]
pub struct CapacityGuard {
    repos: Repositories,
    locks: Arc<dyn LockProvider>,
    settings: BookingSettings,
}

impl CapacityGuard {
    pub fn new(repos: Repositories, locks: Arc<dyn LockProvider>, settings: BookingSettings) -> Self {
        Self {
            repos,
            locks,
            settings,
        }
    }

    #[instrument(skip(self))]
    pub async fn update_capacity(&self, flight_id: Uuid, new_capacity: i32) -> BookingResult<()> {
        if new_capacity < 0 {
            return Err(BookingError::Validation("capacity must not be negative".into()));
        }
        if !self.repos.flights.flight_exists(flight_id).await? {
            return Err(BookingError::flight_not_found(flight_id));
        }

        with_flight_lock(
            self.locks.as_ref(),
            flight_id,
            self.settings.lock_timeout,
            self.apply(flight_id, new_capacity),
        )
        .await?;

        info!("Flight capacity updated");
        Ok(())
    }

    async fn apply(&self, flight_id: Uuid, new_capacity: i32) -> BookingResult<()> {
        if let Some(highest_seat) = self.repos.bookings.max_seat(flight_id).await? {
            if new_capacity < highest_seat {
                warn!(highest_seat, "Capacity would strand an assigned seat");
                return Err(BookingError::CapacityBelowBooked {
                    flight_id,
                    requested: new_capacity,
                    highest_seat,
                });
            }
        }

        if !self.repos.flights.update_capacity(flight_id, new_capacity).await? {
            return Err(BookingError::flight_not_found(flight_id));
        }
        Ok(())
    }
}
