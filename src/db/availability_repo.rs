// src/db/availability_repo.rs

use chrono::NaiveDate;
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{common::error::AppError, models::appointment::AvailabilityWindow};

/// Horários de atendimento dos médicos. Somente leitura neste serviço.
#[derive(Clone, Default)]
pub struct AvailabilityRepository;

impl AvailabilityRepository {
    pub fn new() -> Self {
        Self
    }

    pub async fn get_by_doctor_and_date<'e, E>(
        &self,
        executor: E,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<AvailabilityWindow>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let windows = sqlx::query_as::<_, AvailabilityWindow>(
            r#"
            SELECT id, doctor_id, date, start_time, end_time, is_available
            FROM doctor_availability
            WHERE doctor_id = $1 AND date = $2
            ORDER BY start_time ASC
            "#,
        )
        .bind(doctor_id)
        .bind(date)
        .fetch_all(executor)
        .await?;

        Ok(windows)
    }
}
