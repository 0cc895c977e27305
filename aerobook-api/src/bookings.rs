use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BookSeatRequest {
    pub passenger_id: Uuid,
    pub flight_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub booking_id: Uuid,
    pub passenger_id: Uuid,
    pub flight_id: Uuid,
    pub seat_number: i32,
    pub booked_at: DateTime<Utc>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/bookings", post(book_seat))
}

async fn book_seat(
    State(state): State<AppState>,
    payload: Result<Json<BookSeatRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let Json(req) = payload?;
    let booking = state
        .bookings
        .reserve_with_retry(req.passenger_id, req.flight_id, &state.retry)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BookingResponse {
            booking_id: booking.id,
            passenger_id: booking.passenger_id,
            flight_id: booking.flight_id,
            seat_number: booking.seat_number,
            booked_at: booking.booked_at,
        }),
    ))
}
