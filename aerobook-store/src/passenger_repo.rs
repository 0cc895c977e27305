use aerobook_core::repository::PassengerRepository;
use aerobook_core::{Passenger, StoreError};
use aerobook_shared::Masked;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::store_error;

#[derive(sqlx::FromRow)]
struct PassengerRow {
    id: Uuid,
    full_name: String,
    email: String,
    passport_number: String,
    phone_number: Option<String>,
}

impl From<PassengerRow> for Passenger {
    fn from(row: PassengerRow) -> Self {
        Passenger {
            id: row.id,
            full_name: row.full_name,
            email: Masked::new(row.email),
            passport_number: Masked::new(row.passport_number),
            phone_number: row.phone_number.map(Masked::new),
        }
    }
}

pub struct PostgresPassengerRepository {
    pub pool: PgPool,
}

impl PostgresPassengerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PassengerRepository for PostgresPassengerRepository {
    async fn insert_passenger(&self, passenger: &Passenger) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO passengers (id, full_name, email, passport_number, phone_number)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(passenger.id)
        .bind(&passenger.full_name)
        .bind(passenger.email.expose())
        .bind(passenger.passport_number.expose())
        .bind(passenger.phone_number.as_ref().map(|p| p.expose().as_str()))
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn passenger_exists(&self, id: Uuid) -> Result<bool, StoreError> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM passengers WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn list_passengers(&self) -> Result<Vec<Passenger>, StoreError> {
        let rows = sqlx::query_as::<_, PassengerRow>(
            "SELECT id, full_name, email, passport_number, phone_number FROM passengers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(rows.into_iter().map(Passenger::from).collect())
    }
}
