// src/db/appointment_repo.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::{map_constraint_violation, AppError},
    models::appointment::{Appointment, AppointmentFilter, AppointmentStatus, NewAppointment},
};

#[derive(Clone)]
pub struct AppointmentRepository {
    pool: PgPool,
}

impl AppointmentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  ESCRITA
    // =========================================================================

    /// Insere com id gerado pelo chamador (o reagendamento precisa do id antes do commit).
    pub async fn create<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        appt: &NewAppointment,
    ) -> Result<Appointment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Appointment>(
            r#"
            INSERT INTO appointments (
                id, organization_id, clinic_id, unit_id, doctor_id, patient_id,
                start_time, end_time, status, treatment_type, notes, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'scheduled', $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(appt.organization_id)
        .bind(appt.clinic_id)
        .bind(appt.unit_id)
        .bind(appt.doctor_id)
        .bind(appt.patient_id)
        .bind(appt.start_time)
        .bind(appt.end_time)
        .bind(&appt.treatment_type)
        .bind(&appt.notes)
        .bind(appt.created_by)
        .fetch_one(executor)
        .await
        .map_err(map_constraint_violation)
    }

    /// Grava horário, médico, cadeira e dados clínicos (não mexe no status).
    pub async fn update_details<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        appt: &NewAppointment,
    ) -> Result<Appointment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments
            SET unit_id = $2,
                doctor_id = $3,
                start_time = $4,
                end_time = $5,
                treatment_type = $6,
                notes = $7,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(appt.unit_id)
        .bind(appt.doctor_id)
        .bind(appt.start_time)
        .bind(appt.end_time)
        .bind(&appt.treatment_type)
        .bind(&appt.notes)
        .fetch_one(executor)
        .await
        .map_err(map_constraint_violation)
    }

    pub async fn set_status<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        status: AppointmentStatus,
        cancellation_reason: Option<&str>,
    ) -> Result<Appointment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let appt = sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments
            SET status = $2,
                cancellation_reason = COALESCE($3, cancellation_reason),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(cancellation_reason)
        .fetch_one(executor)
        .await?;

        Ok(appt)
    }

    pub async fn move_to_queue<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        reason: Option<&str>,
    ) -> Result<Appointment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let appt = sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments
            SET status = 'rescheduling_queue',
                entered_queue_at = NOW(),
                queue_reason = $2,
                snooze_until = NULL,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(reason)
        .fetch_one(executor)
        .await?;

        Ok(appt)
    }

    /// Envia para a fila todas as consultas ainda não atendidas do médico no intervalo.
    pub async fn queue_doctor_range<'e, E>(
        &self,
        executor: E,
        organization_id: Uuid,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        reason: Option<&str>,
    ) -> Result<Vec<Appointment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let appts = sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments
            SET status = 'rescheduling_queue',
                entered_queue_at = NOW(),
                queue_reason = $5,
                snooze_until = NULL,
                updated_at = NOW()
            WHERE organization_id = $1
              AND doctor_id = $2
              AND status IN ('scheduled', 'confirmed')
              AND start_time >= $3
              AND start_time < $4
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(doctor_id)
        .bind(from)
        .bind(to)
        .bind(reason)
        .fetch_all(executor)
        .await?;

        Ok(appts)
    }

    pub async fn snooze<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        until: DateTime<Utc>,
    ) -> Result<Appointment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let appt = sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments
            SET snooze_until = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(until)
        .fetch_one(executor)
        .await?;

        Ok(appt)
    }

    /// Tira a original da fila. `None` se outra requisição já a tirou.
    pub async fn mark_rescheduled<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<Option<Appointment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let appt = sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments
            SET status = 'rescheduled', updated_at = NOW()
            WHERE id = $1 AND status = 'rescheduling_queue'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(appt)
    }

    pub async fn link_successor<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        successor_id: Uuid,
    ) -> Result<Appointment, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let appt = sqlx::query_as::<_, Appointment>(
            r#"
            UPDATE appointments
            SET rescheduled_to_id = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(successor_id)
        .fetch_one(executor)
        .await?;

        Ok(appt)
    }

    // =========================================================================
    //  LEITURA
    // =========================================================================

    pub async fn find_by_id<'e, E>(
        &self,
        executor: E,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Appointment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let appt = sqlx::query_as::<_, Appointment>(
            "SELECT * FROM appointments WHERE id = $1 AND organization_id = $2",
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(executor)
        .await?;

        Ok(appt)
    }

    /// Mesma busca, travando a linha até o fim da transação.
    pub async fn find_by_id_for_update<'e, E>(
        &self,
        executor: E,
        organization_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Appointment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let appt = sqlx::query_as::<_, Appointment>(
            "SELECT * FROM appointments WHERE id = $1 AND organization_id = $2 FOR UPDATE",
        )
        .bind(id)
        .bind(organization_id)
        .fetch_optional(executor)
        .await?;

        Ok(appt)
    }

    /// Consultas do médico OU da cadeira que tocam o intervalo. O filtro fino
    /// (status ativo, sobreposição estrita, exclusão) fica com o ConflictChecker.
    pub async fn find_touching_range<'e, E>(
        &self,
        executor: E,
        organization_id: Uuid,
        doctor_id: Option<Uuid>,
        unit_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let appts = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT * FROM appointments
            WHERE organization_id = $1
              AND (unit_id = $3 OR ($2::uuid IS NOT NULL AND doctor_id = $2))
              AND start_time <= $5
              AND end_time >= $4
            ORDER BY start_time
            "#,
        )
        .bind(organization_id)
        .bind(doctor_id)
        .bind(unit_id)
        .bind(from)
        .bind(to)
        .fetch_all(executor)
        .await?;

        Ok(appts)
    }

    /// `GetByDoctorIDAndDate`: consultas do médico que tocam o intervalo do dia.
    pub async fn find_by_doctor_between<'e, E>(
        &self,
        executor: E,
        doctor_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let appts = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT * FROM appointments
            WHERE doctor_id = $1 AND start_time < $3 AND end_time > $2
            ORDER BY start_time
            "#,
        )
        .bind(doctor_id)
        .bind(from)
        .bind(to)
        .fetch_all(executor)
        .await?;

        Ok(appts)
    }

    pub async fn list(
        &self,
        organization_id: Uuid,
        filter: &AppointmentFilter,
    ) -> Result<Vec<Appointment>, AppError> {
        let appts = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT * FROM appointments
            WHERE organization_id = $1
              AND ($2::uuid IS NULL OR clinic_id = $2)
              AND ($3::uuid IS NULL OR doctor_id = $3)
              AND ($4::uuid IS NULL OR unit_id = $4)
              AND ($5::uuid IS NULL OR patient_id = $5)
              AND ($6::appointment_status IS NULL OR status = $6)
              AND ($7::timestamptz IS NULL OR end_time > $7)
              AND ($8::timestamptz IS NULL OR start_time < $8)
            ORDER BY start_time ASC
            "#,
        )
        .bind(organization_id)
        .bind(filter.clinic_id)
        .bind(filter.doctor_id)
        .bind(filter.unit_id)
        .bind(filter.patient_id)
        .bind(filter.status)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(&self.pool)
        .await?;

        Ok(appts)
    }

    /// Fila de reagendamento, mais antigas primeiro.
    pub async fn list_queue(
        &self,
        organization_id: Uuid,
        clinic_id: Option<Uuid>,
        visible_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<Appointment>, AppError> {
        let appts = sqlx::query_as::<_, Appointment>(
            r#"
            SELECT * FROM appointments
            WHERE organization_id = $1
              AND status = 'rescheduling_queue'
              AND ($2::uuid IS NULL OR clinic_id = $2)
              AND ($3::timestamptz IS NULL OR snooze_until IS NULL OR snooze_until <= $3)
            ORDER BY entered_queue_at ASC, id ASC
            "#,
        )
        .bind(organization_id)
        .bind(clinic_id)
        .bind(visible_at)
        .fetch_all(&self.pool)
        .await?;

        Ok(appts)
    }
}
