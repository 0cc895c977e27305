use aerobook_core::repository::FlightRepository;
use aerobook_core::{Flight, FlightFilter, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::store_error;

const FLIGHT_COLUMNS: &str =
    "id, flight_number, origin, destination, departure_time, arrival_time, capacity, price_amount";

#[derive(sqlx::FromRow)]
struct FlightRow {
    id: Uuid,
    flight_number: String,
    origin: String,
    destination: String,
    departure_time: DateTime<Utc>,
    arrival_time: DateTime<Utc>,
    capacity: i32,
    price_amount: i32,
}

impl From<FlightRow> for Flight {
    fn from(row: FlightRow) -> Self {
        Flight {
            id: row.id,
            flight_number: row.flight_number,
            origin: row.origin,
            destination: row.destination,
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
            capacity: row.capacity,
            price_amount: row.price_amount,
        }
    }
}

pub struct PostgresFlightRepository {
    pub pool: PgPool,
}

impl PostgresFlightRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Appends the filter's criteria as `AND` clauses. Dates compare on the UTC calendar day.
fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &FlightFilter) {
    if let Some(origin) = filter.origin() {
        qb.push(" AND origin = ").push_bind(origin.to_string());
    }
    if let Some(destination) = filter.destination() {
        qb.push(" AND destination = ").push_bind(destination.to_string());
    }
    if let Some(date) = filter.departure_date {
        qb.push(" AND (departure_time AT TIME ZONE 'UTC')::date = ").push_bind(date);
    }
    if let Some(date) = filter.arrival_date {
        qb.push(" AND (arrival_time AT TIME ZONE 'UTC')::date = ").push_bind(date);
    }
}

#[async_trait]
impl FlightRepository for PostgresFlightRepository {
    async fn insert_flight(&self, flight: &Flight) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO flights (id, flight_number, origin, destination, departure_time, arrival_time, capacity, price_amount)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(flight.id)
        .bind(&flight.flight_number)
        .bind(&flight.origin)
        .bind(&flight.destination)
        .bind(flight.departure_time)
        .bind(flight.arrival_time)
        .bind(flight.capacity)
        .bind(flight.price_amount)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn get_flight(&self, id: Uuid) -> Result<Option<Flight>, StoreError> {
        let row = sqlx::query_as::<_, FlightRow>(&format!("SELECT {FLIGHT_COLUMNS} FROM flights WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(row.map(Flight::from))
    }

    async fn flight_exists(&self, id: Uuid) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM flights WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn filter_flights(&self, filter: &FlightFilter) -> Result<Vec<Flight>, StoreError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {FLIGHT_COLUMNS} FROM flights WHERE TRUE"));
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY departure_time, id");

        let rows = qb
            .build_query_as::<FlightRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(rows.into_iter().map(Flight::from).collect())
    }

    async fn update_capacity(&self, id: Uuid, capacity: i32) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE flights SET capacity = $2 WHERE id = $1")
            .bind(id)
            .bind(capacity)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected() == 1)
    }
}
