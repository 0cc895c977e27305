use aerobook_core::{BookingError, ErrorCode};
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Seconds a client should wait before retrying after `lock_unavailable`.
const RETRY_AFTER_SECONDS: &str = "1";

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Booking(#[from] BookingError),

    #[error("{0}")]
    BadRequest(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::FlightNotFound | ErrorCode::PassengerNotFound => StatusCode::NOT_FOUND,
        ErrorCode::DuplicateBooking
        | ErrorCode::NoSeatsAvailable
        | ErrorCode::SeatConflict
        | ErrorCode::CapacityBelowBooked
        | ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::LockUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::ValidationFailed => StatusCode::BAD_REQUEST,
        ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (code, message) = match self {
            AppError::Booking(err) => {
                if let BookingError::Internal(detail) = &err {
                    tracing::error!("Internal Server Error: {}", detail);
                }
                (err.code(), err.public_message())
            }
            AppError::BadRequest(msg) => (ErrorCode::ValidationFailed, msg),
        };

        let body = Json(json!({
            "code": code,
            "error": message,
        }));

        let mut response = (status_for(code), body).into_response();
        if code == ErrorCode::LockUnavailable {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECONDS));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(ErrorCode::FlightNotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorCode::DuplicateBooking), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorCode::SeatConflict), StatusCode::CONFLICT);
        assert_eq!(status_for(ErrorCode::ValidationFailed), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorCode::InternalError), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_lock_unavailable_sets_retry_after() {
        let response = AppError::from(BookingError::LockUnavailable(Uuid::now_v7())).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "1");
    }

    #[test]
    fn test_business_errors_have_no_retry_after() {
        let response = AppError::from(BookingError::NoSeatsAvailable(Uuid::now_v7())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }
}
