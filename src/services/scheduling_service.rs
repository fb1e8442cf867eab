// src/services/scheduling_service.rs

use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::{
        db_utils::{begin_serializable, retry_serializable},
        error::AppError,
    },
    db::{AppointmentRepository, AvailabilityRepository, DirectoryRepository},
    models::appointment::{
        Appointment, AppointmentFilter, AppointmentPatch, AppointmentStatus, NewAppointment,
        QueueReschedule, RescheduledFromQueue,
    },
    services::{conflict::ConflictChecker, slots::AvailableSlots},
};

#[derive(Clone)]
pub struct SchedulingService {
    pool: PgPool,
    appointment_repo: AppointmentRepository,
    availability_repo: AvailabilityRepository,
    directory_repo: DirectoryRepository,
    conflicts: ConflictChecker,
}

impl SchedulingService {
    pub fn new(
        pool: PgPool,
        appointment_repo: AppointmentRepository,
        availability_repo: AvailabilityRepository,
        directory_repo: DirectoryRepository,
    ) -> Self {
        let conflicts = ConflictChecker::new(appointment_repo.clone());
        Self {
            pool,
            appointment_repo,
            availability_repo,
            directory_repo,
            conflicts,
        }
    }

    // =========================================================================
    //  AGENDAMENTO
    // =========================================================================

    pub async fn schedule_appointment(&self, appt: NewAppointment) -> Result<Appointment, AppError> {
        // 1. Regras locais, antes de tocar no banco
        appt.validate()?;

        let appt = &appt;
        let created = retry_serializable("schedule_appointment", move || self.schedule_once(appt)).await?;

        tracing::info!(
            "✅ Consulta {} agendada ({} - {})",
            created.id,
            created.start_time,
            created.end_time
        );
        Ok(created)
    }

    async fn schedule_once(&self, appt: &NewAppointment) -> Result<Appointment, AppError> {
        let mut tx = begin_serializable(&self.pool).await?;

        // 2. Conflito -> 3. Cadastros -> 4. Persistência
        self.conflicts.check_for_conflicts(&mut *tx, appt, None).await?;
        self.ensure_references(&mut *tx, appt).await?;
        let created = self.appointment_repo.create(&mut *tx, Uuid::new_v4(), appt).await?;

        tx.commit().await?;
        Ok(created)
    }

    pub async fn reschedule_appointment(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
        new_start: DateTime<Utc>,
        new_end: DateTime<Utc>,
    ) -> Result<Appointment, AppError> {
        let patch = AppointmentPatch {
            start_time: Some(new_start),
            end_time: Some(new_end),
            ..Default::default()
        };

        let patch = &patch;
        let updated = retry_serializable("reschedule_appointment", move || {
            self.update_once(organization_id, appointment_id, patch)
        })
        .await?;

        tracing::info!("🔁 Consulta {} reagendada para {}", updated.id, updated.start_time);
        Ok(updated)
    }

    pub async fn update_appointment(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
        patch: AppointmentPatch,
    ) -> Result<Appointment, AppError> {
        let patch = &patch;
        retry_serializable("update_appointment", move || {
            self.update_once(organization_id, appointment_id, patch)
        })
        .await
    }

    async fn update_once(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
        patch: &AppointmentPatch,
    ) -> Result<Appointment, AppError> {
        let mut tx = begin_serializable(&self.pool).await?;

        // 1. Carrega e trava a consulta
        let current = self
            .appointment_repo
            .find_by_id_for_update(&mut *tx, organization_id, appointment_id)
            .await?
            .ok_or(AppError::AppointmentNotFound)?;

        if !current.status.is_reschedulable() {
            return Err(AppError::InvalidStatusTransition {
                from: current.status.as_str().to_string(),
                to: "rescheduled".to_string(),
            });
        }

        // 2. Revalida o candidato, ignorando o próprio registro
        let candidate = patch.apply_to(current.as_candidate());
        candidate.validate()?;
        self.conflicts
            .check_for_conflicts(&mut *tx, &candidate, Some(current.id))
            .await?;
        self.ensure_references(&mut *tx, &candidate).await?;

        // 3. Persiste
        let updated = self
            .appointment_repo
            .update_details(&mut *tx, current.id, &candidate)
            .await?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Transições manuais (confirmar, concluir, cancelar).
    pub async fn update_status(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
        next: AppointmentStatus,
        reason: Option<&str>,
    ) -> Result<Appointment, AppError> {
        let mut tx = self.pool.begin().await?;

        let current = self
            .appointment_repo
            .find_by_id_for_update(&mut *tx, organization_id, appointment_id)
            .await?
            .ok_or(AppError::AppointmentNotFound)?;

        if !current.status.can_transition_to(next) {
            return Err(AppError::InvalidStatusTransition {
                from: current.status.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }

        let reason = match next {
            AppointmentStatus::Cancelled => reason,
            _ => None,
        };
        let updated = self
            .appointment_repo
            .set_status(&mut *tx, current.id, next, reason)
            .await?;

        tx.commit().await?;

        tracing::info!(
            "📋 Consulta {}: {} -> {}",
            updated.id,
            current.status.as_str(),
            updated.status.as_str()
        );
        Ok(updated)
    }

    // =========================================================================
    //  FILA DE REAGENDAMENTO
    // =========================================================================

    pub async fn move_to_queue(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
        reason: Option<&str>,
    ) -> Result<Appointment, AppError> {
        let mut tx = self.pool.begin().await?;

        let current = self
            .appointment_repo
            .find_by_id_for_update(&mut *tx, organization_id, appointment_id)
            .await?
            .ok_or(AppError::AppointmentNotFound)?;

        if !current.status.is_reschedulable() {
            return Err(AppError::InvalidStatusTransition {
                from: current.status.as_str().to_string(),
                to: AppointmentStatus::ReschedulingQueue.as_str().to_string(),
            });
        }

        let queued = self
            .appointment_repo
            .move_to_queue(&mut *tx, current.id, reason)
            .await?;

        tx.commit().await?;

        tracing::info!("📥 Consulta {} enviada para a fila de reagendamento", queued.id);
        Ok(queued)
    }

    /// O médico ficou indisponível no dia: tudo que ainda não foi atendido vai para a fila.
    pub async fn queue_doctor_day(
        &self,
        organization_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        reason: Option<&str>,
    ) -> Result<Vec<Appointment>, AppError> {
        let mut tx = self.pool.begin().await?;

        if !self
            .directory_repo
            .doctor_exists(&mut *tx, organization_id, doctor_id)
            .await?
        {
            return Err(AppError::DoctorNotFound);
        }

        let (from, to) = day_bounds(date);
        let queued = self
            .appointment_repo
            .queue_doctor_range(&mut *tx, organization_id, doctor_id, from, to, reason)
            .await?;

        tx.commit().await?;

        tracing::info!(
            "📥 {} consulta(s) do médico {} em {} enviadas para a fila",
            queued.len(),
            doctor_id,
            date
        );
        Ok(queued)
    }

    /// Itens adiados para o futuro só aparecem com `include_snoozed`.
    pub async fn list_queue(
        &self,
        organization_id: Uuid,
        clinic_id: Option<Uuid>,
        include_snoozed: bool,
    ) -> Result<Vec<Appointment>, AppError> {
        let visible_at = if include_snoozed { None } else { Some(Utc::now()) };
        self.appointment_repo
            .list_queue(organization_id, clinic_id, visible_at)
            .await
    }

    pub async fn snooze_queue_item(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
        until: DateTime<Utc>,
    ) -> Result<Appointment, AppError> {
        if until <= Utc::now() {
            return Err(AppError::InvalidSnoozeDate);
        }

        let mut tx = self.pool.begin().await?;

        let current = self
            .appointment_repo
            .find_by_id_for_update(&mut *tx, organization_id, appointment_id)
            .await?
            .ok_or(AppError::AppointmentNotFound)?;
        current.ensure_in_queue()?;

        let snoozed = self.appointment_repo.snooze(&mut *tx, current.id, until).await?;
        tx.commit().await?;

        Ok(snoozed)
    }

    pub async fn cancel_from_queue(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
        reason: Option<&str>,
    ) -> Result<Appointment, AppError> {
        let mut tx = self.pool.begin().await?;

        let current = self
            .appointment_repo
            .find_by_id_for_update(&mut *tx, organization_id, appointment_id)
            .await?
            .ok_or(AppError::AppointmentNotFound)?;
        current.ensure_in_queue()?;

        let cancelled = self
            .appointment_repo
            .set_status(&mut *tx, current.id, AppointmentStatus::Cancelled, reason)
            .await?;

        tx.commit().await?;

        tracing::info!("🗑️ Consulta {} cancelada a partir da fila", cancelled.id);
        Ok(cancelled)
    }

    /// Marca a original como `rescheduled` e cria a substituta na mesma transação,
    /// pelo mesmo pipeline do agendamento. Qualquer falha deixa a original intacta na fila.
    pub async fn reschedule_from_queue(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        appointment_id: Uuid,
        request: QueueReschedule,
    ) -> Result<RescheduledFromQueue, AppError> {
        let request = &request;
        let outcome = retry_serializable("reschedule_from_queue", move || {
            self.reschedule_from_queue_once(organization_id, user_id, appointment_id, request)
        })
        .await?;

        tracing::info!(
            "🔁 Consulta {} reagendada a partir da fila como {}",
            outcome.original.id,
            outcome.replacement.id
        );
        Ok(outcome)
    }

    async fn reschedule_from_queue_once(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        appointment_id: Uuid,
        request: &QueueReschedule,
    ) -> Result<RescheduledFromQueue, AppError> {
        let mut tx = begin_serializable(&self.pool).await?;

        // 1. Original travada e ainda na fila
        let original = self
            .appointment_repo
            .find_by_id_for_update(&mut *tx, organization_id, appointment_id)
            .await?
            .ok_or(AppError::AppointmentNotFound)?;
        original.ensure_in_queue()?;

        // 2. Candidata: mesmos dados clínicos, novo horário
        let patch = AppointmentPatch {
            unit_id: request.unit_id,
            doctor_id: request.doctor_id,
            start_time: Some(request.start_time),
            end_time: Some(request.end_time),
            ..Default::default()
        };
        let mut candidate = patch.apply_to(original.as_candidate());
        candidate.created_by = user_id;
        candidate.validate()?;

        self.conflicts
            .check_for_conflicts(&mut *tx, &candidate, Some(original.id))
            .await?;
        self.ensure_references(&mut *tx, &candidate).await?;

        // 3. Libera o horário antigo antes de ocupar o novo (a restrição de exclusão enxerga ambos)
        self.appointment_repo
            .mark_rescheduled(&mut *tx, original.id)
            .await?
            .ok_or(AppError::AppointmentNotInQueue)?;

        let replacement = self
            .appointment_repo
            .create(&mut *tx, Uuid::new_v4(), &candidate)
            .await?;

        let original = self
            .appointment_repo
            .link_successor(&mut *tx, original.id, replacement.id)
            .await?;

        tx.commit().await?;
        Ok(RescheduledFromQueue { original, replacement })
    }

    // =========================================================================
    //  DISPONIBILIDADE E LEITURA
    // =========================================================================

    pub async fn get_available_slots(
        &self,
        organization_id: Uuid,
        doctor_id: Uuid,
        date: NaiveDate,
        slot_duration: Duration,
    ) -> Result<AvailableSlots, AppError> {
        if slot_duration <= Duration::zero() {
            return Err(AppError::InvalidSlotDuration);
        }

        let mut conn = self.pool.acquire().await?;

        if !self
            .directory_repo
            .doctor_exists(&mut *conn, organization_id, doctor_id)
            .await?
        {
            return Err(AppError::DoctorNotFound);
        }

        let windows = self
            .availability_repo
            .get_by_doctor_and_date(&mut *conn, doctor_id, date)
            .await?;

        let (from, to) = day_bounds(date);
        let booked = self
            .appointment_repo
            .find_by_doctor_between(&mut *conn, doctor_id, from, to)
            .await?;

        AvailableSlots::new(&windows, &booked, slot_duration)
    }

    pub async fn get_appointment(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppError> {
        self.appointment_repo
            .find_by_id(&self.pool, organization_id, appointment_id)
            .await?
            .ok_or(AppError::AppointmentNotFound)
    }

    pub async fn list_appointments(
        &self,
        organization_id: Uuid,
        filter: &AppointmentFilter,
    ) -> Result<Vec<Appointment>, AppError> {
        self.appointment_repo.list(organization_id, filter).await
    }

    // ---
    // Helpers
    // ---

    /// Cadeira (da clínica), médico e paciente precisam existir na organização.
    async fn ensure_references(
        &self,
        conn: &mut PgConnection,
        appt: &NewAppointment,
    ) -> Result<(), AppError> {
        if let Some(doctor_id) = appt.doctor_id {
            if !self
                .directory_repo
                .doctor_exists(&mut *conn, appt.organization_id, doctor_id)
                .await?
            {
                return Err(AppError::DoctorNotFound);
            }
        }

        if !self
            .directory_repo
            .unit_exists(&mut *conn, appt.organization_id, appt.clinic_id, appt.unit_id)
            .await?
        {
            return Err(AppError::UnitNotFound);
        }

        if !self
            .directory_repo
            .patient_exists(&mut *conn, appt.organization_id, appt.patient_id)
            .await?
        {
            return Err(AppError::PatientNotFound);
        }

        Ok(())
    }
}

/// Intervalo [00:00, 00:00 do dia seguinte) em UTC.
fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
    (start, start + Duration::days(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn day_bounds_cover_the_whole_utc_day() {
        let (from, to) = day_bounds(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(from, Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap());
        assert_eq!(to, Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap());
    }
}
