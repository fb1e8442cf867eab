// src/models/appointment.rs

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "appointment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    ReschedulingQueue, // Horário original ficou inválido
    Rescheduled,       // Substituída por outra consulta
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::ReschedulingQueue => "rescheduling_queue",
            AppointmentStatus::Rescheduled => "rescheduled",
        }
    }

    /// Consultas ativas ocupam o médico e a cadeira.
    pub fn is_active(&self) -> bool {
        match self {
            AppointmentStatus::Scheduled
            | AppointmentStatus::Confirmed
            | AppointmentStatus::ReschedulingQueue => true,
            AppointmentStatus::Completed
            | AppointmentStatus::Cancelled
            | AppointmentStatus::Rescheduled => false,
        }
    }

    /// Tabela de transições manuais. A fila tem operações próprias.
    pub fn can_transition_to(&self, next: AppointmentStatus) -> bool {
        matches!(
            (self, next),
            (AppointmentStatus::Scheduled, AppointmentStatus::Confirmed)
                | (AppointmentStatus::Scheduled, AppointmentStatus::Completed)
                | (AppointmentStatus::Confirmed, AppointmentStatus::Completed)
                | (AppointmentStatus::Scheduled, AppointmentStatus::Cancelled)
                | (AppointmentStatus::Confirmed, AppointmentStatus::Cancelled)
        )
    }

    /// Só consultas ainda não atendidas podem mudar de horário.
    pub fn is_reschedulable(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::Confirmed)
    }
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[schema(example = "550e8400-e29b-41d4-a716-446655440000")]
    pub id: Uuid,

    #[schema(ignore)]
    pub organization_id: Uuid,

    pub clinic_id: Uuid,
    pub unit_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Uuid,

    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    pub status: AppointmentStatus,

    #[schema(example = "Limpieza dental")]
    pub treatment_type: String,
    pub notes: Option<String>,

    // Metadados da fila de reagendamento
    pub entered_queue_at: Option<DateTime<Utc>>,
    pub queue_reason: Option<String>,
    pub snooze_until: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub rescheduled_to_id: Option<Uuid>,

    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn ensure_in_queue(&self) -> Result<(), AppError> {
        if self.status != AppointmentStatus::ReschedulingQueue {
            return Err(AppError::AppointmentNotInQueue);
        }
        Ok(())
    }

    /// Visão "candidata" da consulta, usada para revalidar após mudanças.
    pub fn as_candidate(&self) -> NewAppointment {
        NewAppointment {
            organization_id: self.organization_id,
            clinic_id: self.clinic_id,
            unit_id: self.unit_id,
            doctor_id: self.doctor_id,
            patient_id: self.patient_id,
            start_time: self.start_time,
            end_time: self.end_time,
            treatment_type: self.treatment_type.clone(),
            notes: self.notes.clone(),
            created_by: self.created_by,
        }
    }
}

/// Dados de uma consulta ainda não persistida.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub organization_id: Uuid,
    pub clinic_id: Uuid,
    pub unit_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub treatment_type: String,
    pub notes: Option<String>,
    pub created_by: Uuid,
}

impl NewAppointment {
    /// Regras que não dependem do banco: intervalo válido e campos obrigatórios.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.end_time <= self.start_time {
            return Err(AppError::InvalidTimeRange);
        }
        if self.organization_id.is_nil() {
            return Err(AppError::MissingField("organizationId"));
        }
        if self.clinic_id.is_nil() {
            return Err(AppError::MissingField("clinicId"));
        }
        if self.unit_id.is_nil() {
            return Err(AppError::MissingField("unitId"));
        }
        if self.patient_id.is_nil() {
            return Err(AppError::MissingField("patientId"));
        }
        if self.doctor_id.is_some_and(|d| d.is_nil()) {
            return Err(AppError::MissingField("doctorId"));
        }
        if self.treatment_type.trim().is_empty() {
            return Err(AppError::MissingField("treatmentType"));
        }
        Ok(())
    }
}

/// Alterações parciais numa consulta existente. `None` mantém o valor atual.
#[derive(Debug, Clone, Default)]
pub struct AppointmentPatch {
    pub unit_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub treatment_type: Option<String>,
    pub notes: Option<String>,
}

impl AppointmentPatch {
    pub fn apply_to(&self, mut candidate: NewAppointment) -> NewAppointment {
        if let Some(unit_id) = self.unit_id {
            candidate.unit_id = unit_id;
        }
        if let Some(doctor_id) = self.doctor_id {
            candidate.doctor_id = Some(doctor_id);
        }
        if let Some(start) = self.start_time {
            candidate.start_time = start;
        }
        if let Some(end) = self.end_time {
            candidate.end_time = end;
        }
        if let Some(treatment) = &self.treatment_type {
            candidate.treatment_type = treatment.clone();
        }
        if let Some(notes) = &self.notes {
            candidate.notes = Some(notes.clone());
        }
        candidate
    }
}

/// Filtros da listagem de consultas.
#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub clinic_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

// --- Disponibilidade ---

/// Janela de atendimento de um médico em uma data (horários em UTC).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityWindow {
    pub id: Uuid,
    pub doctor_id: Uuid,
    #[schema(value_type = String, format = Date, example = "2024-06-01")]
    pub date: NaiveDate,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "12:00:00")]
    pub end_time: NaiveTime,
    pub is_available: bool,
}

/// Resultado do reagendamento a partir da fila: a original (agora `rescheduled`)
/// e a nova consulta ligada a ela por `rescheduled_to_id`.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RescheduledFromQueue {
    pub original: Appointment,
    pub replacement: Appointment,
}

/// Novo horário (e opcionalmente outro médico ou cadeira) para uma consulta da fila.
#[derive(Debug, Clone)]
pub struct QueueReschedule {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub doctor_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candidate() -> NewAppointment {
        NewAppointment {
            organization_id: Uuid::new_v4(),
            clinic_id: Uuid::new_v4(),
            unit_id: Uuid::new_v4(),
            doctor_id: Some(Uuid::new_v4()),
            patient_id: Uuid::new_v4(),
            start_time: Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2024, 6, 1, 10, 30, 0).unwrap(),
            treatment_type: "Limpieza".into(),
            notes: None,
            created_by: Uuid::new_v4(),
        }
    }

    #[test]
    fn end_must_be_after_start() {
        let mut appt = candidate();
        appt.end_time = appt.start_time;
        assert!(matches!(appt.validate(), Err(AppError::InvalidTimeRange)));
    }

    #[test]
    fn blank_treatment_is_rejected() {
        let mut appt = candidate();
        appt.treatment_type = "   ".into();
        assert!(matches!(appt.validate(), Err(AppError::MissingField("treatmentType"))));
    }

    #[test]
    fn valid_candidate_passes() {
        assert!(candidate().validate().is_ok());
    }

    #[test]
    fn active_statuses() {
        assert!(AppointmentStatus::Scheduled.is_active());
        assert!(AppointmentStatus::Confirmed.is_active());
        assert!(AppointmentStatus::ReschedulingQueue.is_active());
        assert!(!AppointmentStatus::Cancelled.is_active());
        assert!(!AppointmentStatus::Rescheduled.is_active());
        assert!(!AppointmentStatus::Completed.is_active());
    }

    #[test]
    fn manual_transitions_follow_the_table() {
        use AppointmentStatus::*;
        assert!(Scheduled.can_transition_to(Confirmed));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Scheduled));
        assert!(!Confirmed.can_transition_to(Scheduled));
        assert!(!ReschedulingQueue.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Cancelled));
    }

    #[test]
    fn patch_only_overrides_given_fields() {
        let base = candidate();
        let new_unit = Uuid::new_v4();
        let patched = AppointmentPatch { unit_id: Some(new_unit), ..Default::default() }
            .apply_to(base.clone());
        assert_eq!(patched.unit_id, new_unit);
        assert_eq!(patched.start_time, base.start_time);
        assert_eq!(patched.doctor_id, base.doctor_id);
    }
}
