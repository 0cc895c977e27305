use aerobook_core::{NewPassenger, Passenger};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/passengers", get(list_passengers).post(create_passenger))
}

async fn create_passenger(
    State(state): State<AppState>,
    payload: Result<Json<NewPassenger>, JsonRejection>,
) -> Result<(StatusCode, Json<Passenger>), AppError> {
    let Json(req) = payload?;
    let passenger = state.passengers.create_passenger(req).await?;
    Ok((StatusCode::CREATED, Json(passenger)))
}

async fn list_passengers(State(state): State<AppState>) -> Result<Json<Vec<Passenger>>, AppError> {
    Ok(Json(state.passengers.list_passengers().await?))
}
