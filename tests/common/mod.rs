//! Utilitários compartilhados pelos testes de integração.
//!
//! Os testes precisam de um Postgres real: defina TEST_DATABASE_URL e rode
//! `cargo test -- --ignored`.

#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use clinic_backend::{
    config::AppState,
    models::{
        appointment::{Appointment, NewAppointment},
        ledger::{Currency, EntryDraft, EntryType, PaymentMethod},
    },
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Once;
use uuid::Uuid;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,clinic_backend=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Organização isolada para um teste, com uma clínica, duas cadeiras,
/// dois médicos e um paciente.
pub struct Fixture {
    pub state: AppState,
    pub pool: PgPool,
    pub organization_id: Uuid,
    pub clinic_id: Uuid,
    pub unit_a: Uuid,
    pub unit_b: Uuid,
    pub doctor_a: Uuid,
    pub doctor_b: Uuid,
    pub patient_id: Uuid,
    pub user_id: Uuid,
}

pub async fn spawn_fixture() -> Fixture {
    init_tracing();

    let database_url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set to run integration tests");

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let organization_id: Uuid =
        sqlx::query_scalar("INSERT INTO organizations (name) VALUES ('Test Org') RETURNING id")
            .fetch_one(&pool)
            .await
            .expect("insert organization");

    let clinic_id: Uuid = sqlx::query_scalar(
        "INSERT INTO clinics (organization_id, name) VALUES ($1, 'Centro') RETURNING id",
    )
    .bind(organization_id)
    .fetch_one(&pool)
    .await
    .expect("insert clinic");

    let mut units = Vec::new();
    for name in ["Sillón 1", "Sillón 2"] {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO units (organization_id, clinic_id, name) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(organization_id)
        .bind(clinic_id)
        .bind(name)
        .fetch_one(&pool)
        .await
        .expect("insert unit");
        units.push(id);
    }

    let mut doctors = Vec::new();
    for name in ["Dra. Ruiz", "Dr. Soto"] {
        let id: Uuid = sqlx::query_scalar(
            "INSERT INTO doctors (organization_id, full_name) VALUES ($1, $2) RETURNING id",
        )
        .bind(organization_id)
        .bind(name)
        .fetch_one(&pool)
        .await
        .expect("insert doctor");
        doctors.push(id);
    }

    let patient_id: Uuid = sqlx::query_scalar(
        "INSERT INTO patients (organization_id, full_name) VALUES ($1, 'Ana Pérez') RETURNING id",
    )
    .bind(organization_id)
    .fetch_one(&pool)
    .await
    .expect("insert patient");

    let state = AppState::from_pool(pool.clone(), "test-secret".to_string());

    Fixture {
        state,
        pool,
        organization_id,
        clinic_id,
        unit_a: units[0],
        unit_b: units[1],
        doctor_a: doctors[0],
        doctor_b: doctors[1],
        patient_id,
        user_id: Uuid::new_v4(),
    }
}

pub fn test_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2031, 3, 10).expect("valid date")
}

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time");
    Utc.from_utc_datetime(&test_day().and_time(time))
}

impl Fixture {
    pub fn new_appointment(
        &self,
        unit_id: Uuid,
        doctor_id: Option<Uuid>,
        start: DateTime<Utc>,
        minutes: i64,
    ) -> NewAppointment {
        NewAppointment {
            organization_id: self.organization_id,
            clinic_id: self.clinic_id,
            unit_id,
            doctor_id,
            patient_id: self.patient_id,
            start_time: start,
            end_time: start + Duration::minutes(minutes),
            treatment_type: "Limpieza".to_string(),
            notes: None,
            created_by: self.user_id,
        }
    }

    pub async fn schedule(
        &self,
        unit_id: Uuid,
        doctor_id: Option<Uuid>,
        start: DateTime<Utc>,
        minutes: i64,
    ) -> Appointment {
        self.state
            .scheduling_service
            .schedule_appointment(self.new_appointment(unit_id, doctor_id, start, minutes))
            .await
            .expect("schedule appointment")
    }

    pub async fn add_availability(&self, doctor_id: Uuid, from: (u32, u32), to: (u32, u32)) {
        sqlx::query(
            "INSERT INTO doctor_availability (doctor_id, date, start_time, end_time) VALUES ($1, $2, $3, $4)",
        )
        .bind(doctor_id)
        .bind(test_day())
        .bind(NaiveTime::from_hms_opt(from.0, from.1, 0).expect("valid time"))
        .bind(NaiveTime::from_hms_opt(to.0, to.1, 0).expect("valid time"))
        .execute(&self.pool)
        .await
        .expect("insert availability");
    }
}

/// Lançamento vazio do tipo pedido; o teste preenche o resto.
pub fn draft(entry_type: EntryType, amount_cents: i64) -> EntryDraft {
    EntryDraft {
        entry_type,
        currency: Currency::Mxn,
        amount_cents,
        description: "test entry".to_string(),
        payment_method: None,
        exchange_rate_used: None,
        doctor_id: None,
        doctor_type: None,
        commission_pct: None,
        external_doctor_fee_cents: None,
        corrects_entry_id: None,
        is_sensitive: false,
        service_id: None,
        quantity: None,
        unit_price_cents: None,
        notes: None,
        cash_session_id: None,
    }
}

pub fn cash_payment(amount_cents: i64) -> EntryDraft {
    EntryDraft {
        payment_method: Some(PaymentMethod::Cash),
        ..draft(EntryType::Payment, amount_cents)
    }
}
