use aerobook_core::{BookingView, Flight, FlightFilter, NewFlight};
use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateCapacityRequest {
    pub capacity: i32,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/flights", get(filter_flights).post(create_flight))
        .route("/v1/flights/{id}", get(get_flight))
        .route("/v1/flights/{id}/capacity", patch(update_capacity))
        .route("/v1/flights/{id}/bookings", get(list_bookings))
}

async fn create_flight(
    State(state): State<AppState>,
    payload: Result<Json<NewFlight>, JsonRejection>,
) -> Result<(StatusCode, Json<Flight>), AppError> {
    let Json(req) = payload?;
    let flight = state.flights.create_flight(req).await?;
    Ok((StatusCode::CREATED, Json(flight)))
}

async fn filter_flights(
    State(state): State<AppState>,
    query: Result<Query<FlightFilter>, QueryRejection>,
) -> Result<Json<Vec<Flight>>, AppError> {
    let Query(filter) = query?;
    Ok(Json(state.flights.filter_flights(&filter).await?))
}

async fn get_flight(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Flight>, AppError> {
    let Path(id) = id?;
    Ok(Json(state.flights.get_flight(id).await?))
}

async fn update_capacity(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<UpdateCapacityRequest>, JsonRejection>,
) -> Result<Json<Flight>, AppError> {
    let Path(id) = id?;
    let Json(req) = payload?;
    state.capacity.update_capacity(id, req.capacity).await?;
    Ok(Json(state.flights.get_flight(id).await?))
}

async fn list_bookings(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<BookingView>>, AppError> {
    let Path(id) = id?;
    Ok(Json(state.flights.list_bookings(id).await?))
}
