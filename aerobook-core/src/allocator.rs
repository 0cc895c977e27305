use std::collections::HashSet;

use crate::error::{BookingError, BookingResult};
use crate::flight::Flight;

/// Picks the lowest seat number in `1..=flight.capacity` that is not booked.
///
/// Deterministic: the same booked set always yields the same seat. The caller
/// must read `booked` inside the same critical section that writes the result.
pub fn next_free_seat(flight: &Flight, booked: &HashSet<i32>) -> BookingResult<i32> {
    let capacity = flight.capacity.max(0);
    if booked.len() >= capacity as usize {
        return Err(BookingError::NoSeatsAvailable(flight.id));
    }

    (1..=capacity)
        .find(|seat| !booked.contains(seat))
        .ok_or(BookingError::NoSeatsAvailable(flight.id))
}
