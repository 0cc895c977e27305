use aerobook_core::repository::BookingRepository;
use aerobook_core::{Booking, BookingView, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use std::collections::HashSet;
use uuid::Uuid;

use crate::error::store_error;

#[derive(sqlx::FromRow)]
struct BookingViewRow {
    id: Uuid,
    passenger_id: Uuid,
    passenger_name: String,
    flight_id: Uuid,
    seat_number: i32,
    booked_at: DateTime<Utc>,
}

impl From<BookingViewRow> for BookingView {
    fn from(row: BookingViewRow) -> Self {
        BookingView {
            id: row.id,
            passenger_id: row.passenger_id,
            passenger_name: row.passenger_name,
            flight_id: row.flight_id,
            seat_number: row.seat_number,
            booked_at: row.booked_at,
        }
    }
}

pub struct PostgresBookingRepository {
    pub pool: PgPool,
}

impl PostgresBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_in_tx(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        booking: &Booking,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO bookings (id, passenger_id, flight_id, seat_number, booked_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(booking.id)
        .bind(booking.passenger_id)
        .bind(booking.flight_id)
        .bind(booking.seat_number)
        .bind(booking.booked_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl BookingRepository for PostgresBookingRepository {
    async fn has_booking(&self, flight_id: Uuid, passenger_id: Uuid) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM bookings WHERE flight_id = $1 AND passenger_id = $2)",
        )
        .bind(flight_id)
        .bind(passenger_id)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)
    }

    async fn booked_seats(&self, flight_id: Uuid) -> Result<HashSet<i32>, StoreError> {
        let seats = sqlx::query_scalar::<_, i32>("SELECT seat_number FROM bookings WHERE flight_id = $1")
            .bind(flight_id)
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(seats.into_iter().collect())
    }

    async fn max_seat(&self, flight_id: Uuid) -> Result<Option<i32>, StoreError> {
        sqlx::query_scalar::<_, Option<i32>>("SELECT MAX(seat_number) FROM bookings WHERE flight_id = $1")
            .bind(flight_id)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        // A constraint violation rolls the transaction back when `tx` drops.
        Self::insert_in_tx(&mut tx, booking).await.map_err(store_error)?;
        tx.commit().await.map_err(store_error)?;
        Ok(())
    }

    async fn list_flight_bookings(&self, flight_id: Uuid) -> Result<Vec<BookingView>, StoreError> {
        let rows = sqlx::query_as::<_, BookingViewRow>(
            r#"
            SELECT b.id, b.passenger_id, p.full_name AS passenger_name, b.flight_id, b.seat_number, b.booked_at
            FROM bookings b
            JOIN passengers p ON p.id = b.passenger_id
            WHERE b.flight_id = $1
            ORDER BY b.seat_number
            "#,
        )
        .bind(flight_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(rows.into_iter().map(BookingView::from).collect())
    }
}
