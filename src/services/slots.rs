// src/services/slots.rs

use chrono::{DateTime, Duration, Utc};

use crate::{
    common::error::AppError,
    models::appointment::{Appointment, AvailabilityWindow, TimeSlot},
    services::conflict::overlaps,
};

/// Horários livres de um médico num dia. Sequência preguiçosa e finita:
/// nada é calculado até a iteração, e cada `iter()` recomeça do zero.
#[derive(Debug, Clone)]
pub struct AvailableSlots {
    windows: Vec<(DateTime<Utc>, DateTime<Utc>)>,
    busy: Vec<(DateTime<Utc>, DateTime<Utc>)>,
    duration: Duration,
}

impl AvailableSlots {
    /// Janelas na ordem do cadastro; só consultas ativas bloqueiam horário.
    pub fn new(
        windows: &[AvailabilityWindow],
        appointments: &[Appointment],
        duration: Duration,
    ) -> Result<Self, AppError> {
        // Um horário cabe num dia
        if duration <= Duration::zero() || duration > Duration::days(1) {
            return Err(AppError::InvalidSlotDuration);
        }

        let windows = windows
            .iter()
            .filter(|w| w.is_available)
            .map(|w| {
                (
                    w.date.and_time(w.start_time).and_utc(),
                    w.date.and_time(w.end_time).and_utc(),
                )
            })
            .collect();

        let busy = appointments
            .iter()
            .filter(|a| a.status.is_active())
            .map(|a| (a.start_time, a.end_time))
            .collect();

        Ok(Self { windows, busy, duration })
    }

    pub fn iter(&self) -> SlotIter<'_> {
        SlotIter { slots: self, window: 0, cursor: None }
    }

    fn is_free(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        !self
            .busy
            .iter()
            .any(|&(busy_start, busy_end)| overlaps(start, end, busy_start, busy_end))
    }
}

impl<'a> IntoIterator for &'a AvailableSlots {
    type Item = TimeSlot;
    type IntoIter = SlotIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone)]
pub struct SlotIter<'a> {
    slots: &'a AvailableSlots,
    window: usize,
    cursor: Option<DateTime<Utc>>,
}

impl Iterator for SlotIter<'_> {
    type Item = TimeSlot;

    fn next(&mut self) -> Option<TimeSlot> {
        loop {
            let &(window_start, window_end) = self.slots.windows.get(self.window)?;
            let start = self.cursor.unwrap_or(window_start);
            let end = start.checked_add_signed(self.slots.duration);

            // Fim igual ao fim da janela ainda cabe
            let Some(end) = end.filter(|&end| end <= window_end) else {
                self.window += 1;
                self.cursor = None;
                continue;
            };

            self.cursor = Some(end);
            if self.slots.is_free(start, end) {
                return Some(TimeSlot { start_time: start, end_time: end });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::appointment::AppointmentStatus;
    use chrono::{NaiveDate, NaiveTime, TimeZone};
    use uuid::Uuid;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn window(start: (u32, u32), end: (u32, u32), is_available: bool) -> AvailabilityWindow {
        AvailabilityWindow {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            date: day(),
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            is_available,
        }
    }

    fn booked(start: (u32, u32), end: (u32, u32), status: AppointmentStatus) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            clinic_id: Uuid::new_v4(),
            unit_id: Uuid::new_v4(),
            doctor_id: Some(Uuid::new_v4()),
            patient_id: Uuid::new_v4(),
            start_time: Utc.with_ymd_and_hms(2024, 6, 1, start.0, start.1, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2024, 6, 1, end.0, end.1, 0).unwrap(),
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

    fn starts(slots: &AvailableSlots) -> Vec<String> {
        slots
            .iter()
            .map(|s| s.start_time.format("%H:%M").to_string())
            .collect()
    }

    #[test]
    fn morning_window_skips_the_booked_half_hour() {
        let slots = AvailableSlots::new(
            &[window((9, 0), (12, 0), true)],
            &[booked((10, 0), (10, 30), AppointmentStatus::Scheduled)],
            Duration::minutes(30),
        )
        .unwrap();

        assert_eq!(starts(&slots), vec!["09:00", "09:30", "10:30", "11:00", "11:30"]);
        let last = slots.iter().last().unwrap();
        assert_eq!(last.end_time, Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn iteration_is_restartable() {
        let slots = AvailableSlots::new(&[window((9, 0), (10, 0), true)], &[], Duration::minutes(20)).unwrap();

        let first: Vec<_> = slots.iter().collect();
        let second: Vec<_> = (&slots).into_iter().collect();
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }

    #[test]
    fn cancelled_appointments_do_not_block() {
        let slots = AvailableSlots::new(
            &[window((9, 0), (10, 0), true)],
            &[booked((9, 0), (10, 0), AppointmentStatus::Cancelled)],
            Duration::minutes(30),
        )
        .unwrap();

        assert_eq!(starts(&slots), vec!["09:00", "09:30"]);
    }

    #[test]
    fn unavailable_windows_and_leftovers_are_skipped() {
        let slots = AvailableSlots::new(
            &[window((8, 0), (9, 0), false), window((9, 0), (9, 50), true), window((14, 0), (15, 0), true)],
            &[],
            Duration::minutes(30),
        )
        .unwrap();

        assert_eq!(starts(&slots), vec!["09:00", "14:00", "14:30"]);
    }

    #[test]
    fn non_positive_duration_is_rejected() {
        assert!(matches!(
            AvailableSlots::new(&[], &[], Duration::zero()),
            Err(AppError::InvalidSlotDuration)
        ));
        assert!(AvailableSlots::new(&[], &[], Duration::minutes(-5)).is_err());
    }

    #[test]
    fn duration_longer_than_a_day_is_rejected() {
        let windows = [window((9, 0), (17, 0), true)];
        assert!(matches!(
            AvailableSlots::new(&windows, &[], Duration::days(1) + Duration::minutes(1)),
            Err(AppError::InvalidSlotDuration)
        ));
        assert!(AvailableSlots::new(&windows, &[], Duration::MAX).is_err());
    }

    #[test]
    fn window_on_the_last_representable_day_yields_nothing() {
        let windows = [AvailabilityWindow {
            date: NaiveDate::MAX,
            ..window((23, 0), (23, 59), true)
        }];

        let slots = AvailableSlots::new(&windows, &[], Duration::days(1)).unwrap();
        assert_eq!(slots.iter().count(), 0);
    }

    #[test]
    fn partially_consumed_iterator_can_be_cloned() {
        let slots = AvailableSlots::new(&[window((9, 0), (10, 0), true)], &[], Duration::minutes(15)).unwrap();
        let mut it = slots.iter();
        it.next();
        let rest: Vec<_> = it.clone().collect();
        assert_eq!(rest.len(), 3);
        assert_eq!(it.count(), 3);
    }
}
