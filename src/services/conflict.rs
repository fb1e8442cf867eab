// src/services/conflict.rs

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::AppointmentRepository,
    models::appointment::{Appointment, NewAppointment},
};

/// Intervalos semiabertos: encostar (fim == início) não é sobreposição.
pub fn overlaps(
    start_a: DateTime<Utc>,
    end_a: DateTime<Utc>,
    start_b: DateTime<Utc>,
    end_b: DateTime<Utc>,
) -> bool {
    start_a < end_b && end_a > start_b
}

/// Primeira consulta ativa do mesmo médico ou da mesma cadeira que se
/// sobrepõe ao candidato. `exclude` é o registro anterior do próprio candidato.
pub fn find_conflict<'a>(
    candidate: &NewAppointment,
    exclude: Option<Uuid>,
    existing: &'a [Appointment],
) -> Option<&'a Appointment> {
    existing.iter().find(|other| {
        if Some(other.id) == exclude || !other.status.is_active() {
            return false;
        }
        let same_doctor = candidate.doctor_id.is_some() && candidate.doctor_id == other.doctor_id;
        let same_unit = candidate.unit_id == other.unit_id;

        (same_doctor || same_unit)
            && overlaps(candidate.start_time, candidate.end_time, other.start_time, other.end_time)
    })
}

#[derive(Clone)]
pub struct ConflictChecker {
    appointment_repo: AppointmentRepository,
}

impl ConflictChecker {
    pub fn new(appointment_repo: AppointmentRepository) -> Self {
        Self { appointment_repo }
    }

    pub async fn check_for_conflicts<'e, E>(
        &self,
        executor: E,
        candidate: &NewAppointment,
        exclude: Option<Uuid>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let nearby = self
            .appointment_repo
            .find_touching_range(
                executor,
                candidate.organization_id,
                candidate.doctor_id,
                candidate.unit_id,
                candidate.start_time,
                candidate.end_time,
            )
            .await?;

        match find_conflict(candidate, exclude, &nearby) {
            Some(conflicting) => {
                tracing::warn!(
                    "⚠️ Conflito de agenda: candidato {}..{} choca com a consulta {}",
                    candidate.start_time,
                    candidate.end_time,
                    conflicting.id
                );
                Err(AppError::AppointmentConflict { conflicting_id: Some(conflicting.id) })
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::appointment::AppointmentStatus;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, h, m, 0).unwrap()
    }

    fn candidate(doctor: Option<Uuid>, unit: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> NewAppointment {
        NewAppointment {
            organization_id: Uuid::new_v4(),
            clinic_id: Uuid::new_v4(),
            unit_id: unit,
            doctor_id: doctor,
            patient_id: Uuid::new_v4(),
            start_time: start,
            end_time: end,
            treatment_type: "Revisión".into(),
            notes: None,
            created_by: Uuid::new_v4(),
        }
    }

    fn existing(
        doctor: Option<Uuid>,
        unit: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        status: AppointmentStatus,
    ) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            clinic_id: Uuid::new_v4(),
            unit_id: unit,
            doctor_id: doctor,
            patient_id: Uuid::new_v4(),
            start_time: start,
            end_time: end,
            status,
            treatment_type: "Limpieza".into(),
            notes: None,
            entered_queue_at: None,
            queue_reason: None,
            snooze_until: None,
            cancellation_reason: None,
            rescheduled_to_id: None,
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn overlap_is_strict_on_both_ends() {
        assert!(overlaps(at(10, 0), at(10, 30), at(10, 15), at(11, 0)));
        assert!(overlaps(at(10, 0), at(11, 0), at(10, 15), at(10, 30)));
        assert!(!overlaps(at(10, 0), at(10, 30), at(10, 30), at(11, 0)));
        assert!(!overlaps(at(10, 30), at(11, 0), at(10, 0), at(10, 30)));
    }

    #[test]
    fn same_doctor_overlap_conflicts_even_on_another_unit() {
        let doctor = Uuid::new_v4();
        let booked = vec![existing(Some(doctor), Uuid::new_v4(), at(10, 0), at(10, 30), AppointmentStatus::Confirmed)];
        let cand = candidate(Some(doctor), Uuid::new_v4(), at(10, 15), at(10, 45));

        assert_eq!(find_conflict(&cand, None, &booked).map(|a| a.id), Some(booked[0].id));
    }

    #[test]
    fn same_unit_overlap_conflicts_without_doctor() {
        let unit = Uuid::new_v4();
        let booked = vec![existing(None, unit, at(9, 0), at(10, 0), AppointmentStatus::Scheduled)];
        let cand = candidate(None, unit, at(9, 30), at(10, 30));

        assert!(find_conflict(&cand, None, &booked).is_some());
    }

    #[test]
    fn inactive_or_excluded_appointments_never_conflict() {
        let unit = Uuid::new_v4();
        let cancelled = existing(None, unit, at(9, 0), at(10, 0), AppointmentStatus::Cancelled);
        let rescheduled = existing(None, unit, at(9, 0), at(10, 0), AppointmentStatus::Rescheduled);
        let itself = existing(None, unit, at(9, 0), at(10, 0), AppointmentStatus::Scheduled);
        let self_id = itself.id;
        let booked = vec![cancelled, rescheduled, itself];

        let cand = candidate(None, unit, at(9, 15), at(9, 45));
        assert!(find_conflict(&cand, Some(self_id), &booked).is_none());
        assert!(find_conflict(&cand, None, &booked).is_some());
    }

    #[test]
    fn queued_appointments_still_hold_their_slot() {
        let unit = Uuid::new_v4();
        let booked = vec![existing(None, unit, at(9, 0), at(10, 0), AppointmentStatus::ReschedulingQueue)];
        let cand = candidate(None, unit, at(9, 30), at(9, 45));
        assert!(find_conflict(&cand, None, &booked).is_some());
    }

    #[test]
    fn candidate_without_doctor_only_checks_unit() {
        let booked = vec![existing(None, Uuid::new_v4(), at(9, 0), at(10, 0), AppointmentStatus::Scheduled)];
        let cand = candidate(None, Uuid::new_v4(), at(9, 0), at(10, 0));
        assert!(find_conflict(&cand, None, &booked).is_none());
    }
}
