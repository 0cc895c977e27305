use aerobook_core::StoreError;
use sqlx::error::ErrorKind;

/// Converts a driver error into the repository error type.
///
/// Constraint violations keep the constraint name so the booking core can
/// tell a taken seat from a duplicate passenger.
pub(crate) fn store_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if let Some(classified) = classify(db.kind(), db.constraint()) {
            return classified;
        }
    }
    StoreError::Backend(err.to_string())
}

fn classify(kind: ErrorKind, constraint: Option<&str>) -> Option<StoreError> {
    let constraint = constraint.unwrap_or_default();
    match kind {
        ErrorKind::UniqueViolation => Some(StoreError::unique(constraint)),
        ErrorKind::ForeignKeyViolation => Some(StoreError::foreign_key(constraint)),
        _ => None,
    }
}
