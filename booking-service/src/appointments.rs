use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use rand::{Rng, distr::Alphanumeric};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::sync::Arc;

use crate::{
    error::BookingError,
    models::{AppointmentRecord, AppointmentStatus},
};

const CONFIRMATION_CODE_LEN: usize = 9;

/// Random uppercase alphanumeric confirmation code, e.g. "K7Q2M0ZXA".
pub fn generate_appointment_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(CONFIRMATION_CODE_LEN)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect()
}

/// Where confirmed appointments are written. Records are insert-only.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Fails if a record with the same id already exists.
    async fn insert(&self, record: AppointmentRecord) -> Result<(), BookingError>;
    async fn get(&self, id: &str) -> Result<Option<AppointmentRecord>, BookingError>;
}

#[derive(Default)]
pub struct InMemoryAppointmentStore {
    records: Arc<DashMap<String, AppointmentRecord>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, record: AppointmentRecord) -> Result<(), BookingError> {
        match self.records.entry(record.id.clone()) {
            Entry::Occupied(entry) => Err(BookingError::Store(format!(
                "appointment {} already exists",
                entry.key()
            ))),
            Entry::Vacant(entry) => {
                entry.insert(record);
                Ok(())
            }
        }
    }

    async fn get(&self, id: &str) -> Result<Option<AppointmentRecord>, BookingError> {
        Ok(self.records.get(id).map(|entry| entry.clone()))
    }
}

pub struct PostgresAppointmentStore {
    pool: PgPool,
}

impl PostgresAppointmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), BookingError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS appointments (
                id TEXT PRIMARY KEY,
                patient_id TEXT NOT NULL,
                patient_name TEXT NOT NULL,
                test_id TEXT NOT NULL,
                test_name TEXT NOT NULL,
                doctor_id TEXT NOT NULL,
                doctor_name TEXT NOT NULL,
                appointment_date TIMESTAMP NOT NULL,
                price DOUBLE PRECISION NOT NULL,
                status TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }
}

#[async_trait]
impl AppointmentStore for PostgresAppointmentStore {
    async fn insert(&self, record: AppointmentRecord) -> Result<(), BookingError> {
        sqlx::query(
            r#"
            INSERT INTO appointments (
                id, patient_id, patient_name, test_id, test_name, doctor_id, doctor_name,
                appointment_date, price, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&record.id)
        .bind(&record.patient_id)
        .bind(&record.patient_name)
        .bind(&record.test_id)
        .bind(&record.test_name)
        .bind(&record.doctor_id)
        .bind(&record.doctor_name)
        .bind(record.appointment_date)
        .bind(record.price)
        .bind("confirmed")
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<AppointmentRecord>, BookingError> {
        let row = sqlx::query("SELECT * FROM appointments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        row.as_ref().map(record_from_row).transpose()
    }
}

fn record_from_row(row: &PgRow) -> Result<AppointmentRecord, BookingError> {
    Ok(AppointmentRecord {
        id: row.try_get("id").map_err(store_error)?,
        patient_id: row.try_get("patient_id").map_err(store_error)?,
        patient_name: row.try_get("patient_name").map_err(store_error)?,
        test_id: row.try_get("test_id").map_err(store_error)?,
        test_name: row.try_get("test_name").map_err(store_error)?,
        doctor_id: row.try_get("doctor_id").map_err(store_error)?,
        doctor_name: row.try_get("doctor_name").map_err(store_error)?,
        appointment_date: row.try_get("appointment_date").map_err(store_error)?,
        price: row.try_get("price").map_err(store_error)?,
        status: AppointmentStatus::Confirmed,
        created_at: row.try_get("created_at").map_err(store_error)?,
    })
}

fn store_error(e: sqlx::Error) -> BookingError {
    BookingError::Store(e.to_string())
}
