//! Testes de integração da agenda e da fila de reagendamento.
//!
//! Run with: TEST_DATABASE_URL=... cargo test -- --ignored

mod common;

use chrono::{Duration, Utc};
use clinic_backend::{
    common::error::AppError,
    models::appointment::{AppointmentStatus, QueueReschedule, TimeSlot},
};
use common::{at, spawn_fixture, test_day};

#[tokio::test]
#[ignore] // Requires database
async fn overlapping_appointment_for_same_doctor_is_rejected() {
    let fx = spawn_fixture().await;
    let first = fx.schedule(fx.unit_a, Some(fx.doctor_a), at(10, 0), 30).await;

    let err = fx
        .state
        .scheduling_service
        .schedule_appointment(fx.new_appointment(fx.unit_b, Some(fx.doctor_a), at(10, 15), 30))
        .await
        .unwrap_err();

    match err {
        AppError::AppointmentConflict { conflicting_id } => {
            assert_eq!(conflicting_id, Some(first.id))
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
#[ignore]
async fn back_to_back_appointments_share_a_boundary() {
    let fx = spawn_fixture().await;
    fx.schedule(fx.unit_a, Some(fx.doctor_a), at(10, 0), 30).await;
    let next = fx.schedule(fx.unit_a, Some(fx.doctor_a), at(10, 30), 30).await;

    assert_eq!(next.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
#[ignore]
async fn same_unit_cannot_hold_two_patients() {
    let fx = spawn_fixture().await;
    fx.schedule(fx.unit_a, Some(fx.doctor_a), at(9, 0), 60).await;

    let err = fx
        .state
        .scheduling_service
        .schedule_appointment(fx.new_appointment(fx.unit_a, Some(fx.doctor_b), at(9, 30), 30))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::AppointmentConflict { .. }));
}

#[tokio::test]
#[ignore]
async fn unknown_doctor_is_rejected() {
    let fx = spawn_fixture().await;

    let err = fx
        .state
        .scheduling_service
        .schedule_appointment(fx.new_appointment(fx.unit_a, Some(uuid::Uuid::new_v4()), at(9, 0), 30))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::DoctorNotFound));
}

#[tokio::test]
#[ignore]
async fn cancelled_appointment_frees_its_slot() {
    let fx = spawn_fixture().await;
    let first = fx.schedule(fx.unit_a, Some(fx.doctor_a), at(11, 0), 30).await;

    fx.state
        .scheduling_service
        .update_status(fx.organization_id, first.id, AppointmentStatus::Cancelled, Some("paciente avisó"))
        .await
        .expect("cancel");

    let again = fx.schedule(fx.unit_a, Some(fx.doctor_a), at(11, 0), 30).await;
    assert_ne!(again.id, first.id);
}

#[tokio::test]
#[ignore]
async fn completed_appointment_cannot_be_reopened() {
    let fx = spawn_fixture().await;
    let appt = fx.schedule(fx.unit_a, Some(fx.doctor_a), at(12, 0), 30).await;

    fx.state
        .scheduling_service
        .update_status(fx.organization_id, appt.id, AppointmentStatus::Completed, None)
        .await
        .expect("complete");

    let err = fx
        .state
        .scheduling_service
        .update_status(fx.organization_id, appt.id, AppointmentStatus::Scheduled, None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InvalidStatusTransition { .. }));
}

#[tokio::test]
#[ignore]
async fn reschedule_from_queue_conflict_leaves_original_in_queue() {
    let fx = spawn_fixture().await;
    let original = fx.schedule(fx.unit_a, Some(fx.doctor_a), at(9, 0), 30).await;
    let blocker = fx.schedule(fx.unit_b, Some(fx.doctor_b), at(15, 0), 60).await;

    fx.state
        .scheduling_service
        .move_to_queue(fx.organization_id, original.id, Some("Doctor enfermo"))
        .await
        .expect("queue");

    // Dr. B está ocupado às 15:00
    let err = fx
        .state
        .scheduling_service
        .reschedule_from_queue(
            fx.organization_id,
            fx.user_id,
            original.id,
            QueueReschedule {
                start_time: at(15, 0),
                end_time: at(15, 30),
                doctor_id: Some(fx.doctor_b),
                unit_id: None,
            },
        )
        .await
        .unwrap_err();

    match err {
        AppError::AppointmentConflict { conflicting_id } => {
            assert_eq!(conflicting_id, Some(blocker.id))
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    let still_queued = fx
        .state
        .scheduling_service
        .get_appointment(fx.organization_id, original.id)
        .await
        .expect("reload");
    assert_eq!(still_queued.status, AppointmentStatus::ReschedulingQueue);
    assert_eq!(still_queued.rescheduled_to_id, None);
    assert_eq!(still_queued.doctor_id, Some(fx.doctor_a));
    assert_eq!(still_queued.start_time, at(9, 0));
}

#[tokio::test]
#[ignore]
async fn reschedule_from_queue_links_original_to_replacement() {
    let fx = spawn_fixture().await;
    let original = fx.schedule(fx.unit_a, Some(fx.doctor_a), at(9, 0), 30).await;

    fx.state
        .scheduling_service
        .move_to_queue(fx.organization_id, original.id, None)
        .await
        .expect("queue");

    // Mesmo horário com outro médico: a original não conta como conflito
    let outcome = fx
        .state
        .scheduling_service
        .reschedule_from_queue(
            fx.organization_id,
            fx.user_id,
            original.id,
            QueueReschedule {
                start_time: at(9, 0),
                end_time: at(9, 30),
                doctor_id: Some(fx.doctor_b),
                unit_id: None,
            },
        )
        .await
        .expect("reschedule from queue");

    assert_eq!(outcome.original.status, AppointmentStatus::Rescheduled);
    assert_eq!(outcome.original.rescheduled_to_id, Some(outcome.replacement.id));
    assert_eq!(outcome.replacement.status, AppointmentStatus::Scheduled);
    assert_eq!(outcome.replacement.doctor_id, Some(fx.doctor_b));
    assert_eq!(outcome.replacement.unit_id, fx.unit_a);
    assert_eq!(outcome.replacement.patient_id, original.patient_id);

    let queue = fx
        .state
        .scheduling_service
        .list_queue(fx.organization_id, Some(fx.clinic_id), true)
        .await
        .expect("queue list");
    assert!(queue.is_empty());
}

#[tokio::test]
#[ignore]
async fn unavailable_day_sends_doctor_agenda_to_queue() {
    let fx = spawn_fixture().await;
    let morning = fx.schedule(fx.unit_a, Some(fx.doctor_a), at(9, 0), 30).await;
    let afternoon = fx.schedule(fx.unit_a, Some(fx.doctor_a), at(16, 0), 30).await;
    let other_doctor = fx.schedule(fx.unit_b, Some(fx.doctor_b), at(9, 0), 30).await;

    let queued = fx
        .state
        .scheduling_service
        .queue_doctor_day(fx.organization_id, fx.doctor_a, test_day(), Some("Congreso"))
        .await
        .expect("queue day");

    let mut ids: Vec<_> = queued.iter().map(|a| a.id).collect();
    ids.sort();
    let mut expected = vec![morning.id, afternoon.id];
    expected.sort();
    assert_eq!(ids, expected);
    assert!(queued.iter().all(|a| a.status == AppointmentStatus::ReschedulingQueue));

    let untouched = fx
        .state
        .scheduling_service
        .get_appointment(fx.organization_id, other_doctor.id)
        .await
        .expect("reload");
    assert_eq!(untouched.status, AppointmentStatus::Scheduled);
}

#[tokio::test]
#[ignore]
async fn snoozed_items_are_hidden_until_due() {
    let fx = spawn_fixture().await;
    let appt = fx.schedule(fx.unit_a, Some(fx.doctor_a), at(9, 0), 30).await;

    fx.state
        .scheduling_service
        .move_to_queue(fx.organization_id, appt.id, None)
        .await
        .expect("queue");
    fx.state
        .scheduling_service
        .snooze_queue_item(fx.organization_id, appt.id, Utc::now() + Duration::days(2))
        .await
        .expect("snooze");

    let visible = fx
        .state
        .scheduling_service
        .list_queue(fx.organization_id, Some(fx.clinic_id), false)
        .await
        .expect("visible queue");
    assert!(visible.is_empty());

    let all = fx
        .state
        .scheduling_service
        .list_queue(fx.organization_id, Some(fx.clinic_id), true)
        .await
        .expect("full queue");
    assert_eq!(all.len(), 1);
}

#[tokio::test]
#[ignore]
async fn available_slots_skip_booked_time() {
    let fx = spawn_fixture().await;
    fx.add_availability(fx.doctor_a, (9, 0), (12, 0)).await;
    fx.schedule(fx.unit_a, Some(fx.doctor_a), at(10, 0), 30).await;

    let slots = fx
        .state
        .scheduling_service
        .get_available_slots(fx.organization_id, fx.doctor_a, test_day(), Duration::minutes(30))
        .await
        .expect("slots");

    let starts: Vec<_> = slots.iter().map(|s: TimeSlot| s.start_time).collect();
    assert_eq!(
        starts,
        vec![at(9, 0), at(9, 30), at(10, 30), at(11, 0), at(11, 30)]
    );
}

#[tokio::test]
#[ignore]
async fn concurrent_overlapping_bookings_admit_only_one() {
    let fx = spawn_fixture().await;
    let service = &fx.state.scheduling_service;

    let (a, b) = tokio::join!(
        service.schedule_appointment(fx.new_appointment(fx.unit_a, Some(fx.doctor_a), at(13, 0), 30)),
        service.schedule_appointment(fx.new_appointment(fx.unit_b, Some(fx.doctor_a), at(13, 15), 30)),
    );

    let (created, err) = match (a, b) {
        (Ok(created), Err(err)) | (Err(err), Ok(created)) => (created, err),
        other => panic!("expected exactly one booking, got {other:?}"),
    };
    match err {
        AppError::AppointmentConflict { conflicting_id } => {
            assert!(conflicting_id.is_none() || conflicting_id == Some(created.id))
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
#[ignore]
async fn reschedule_may_overlap_its_own_previous_slot() {
    let fx = spawn_fixture().await;
    let appt = fx.schedule(fx.unit_a, Some(fx.doctor_a), at(10, 0), 60).await;

    // 10:30-11:30 cruza o horário antigo da própria consulta
    let moved = fx
        .state
        .scheduling_service
        .reschedule_appointment(fx.organization_id, appt.id, at(10, 30), at(11, 30))
        .await
        .expect("reschedule");

    assert_eq!(moved.id, appt.id);
    assert_eq!(moved.start_time, at(10, 30));
    assert_eq!(moved.end_time, at(11, 30));
    assert_eq!(moved.status, appt.status);
}

#[tokio::test]
#[ignore]
async fn reschedule_of_unknown_appointment_is_rejected() {
    let fx = spawn_fixture().await;

    let err = fx
        .state
        .scheduling_service
        .reschedule_appointment(fx.organization_id, uuid::Uuid::new_v4(), at(10, 0), at(10, 30))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::AppointmentNotFound));
}

#[tokio::test]
#[ignore]
async fn queued_appointment_can_be_cancelled() {
    let fx = spawn_fixture().await;
    let appt = fx.schedule(fx.unit_a, Some(fx.doctor_a), at(9, 0), 30).await;

    fx.state
        .scheduling_service
        .move_to_queue(fx.organization_id, appt.id, Some("Doctor enfermo"))
        .await
        .expect("queue");

    let cancelled = fx
        .state
        .scheduling_service
        .cancel_from_queue(fx.organization_id, appt.id, Some("paciente desistió"))
        .await
        .expect("cancel from queue");
    assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("paciente desistió"));

    let queue = fx
        .state
        .scheduling_service
        .list_queue(fx.organization_id, Some(fx.clinic_id), true)
        .await
        .expect("queue list");
    assert!(queue.is_empty());
}

#[tokio::test]
#[ignore]
async fn cancel_from_queue_requires_a_queued_appointment() {
    let fx = spawn_fixture().await;
    let appt = fx.schedule(fx.unit_a, Some(fx.doctor_a), at(9, 0), 30).await;

    let err = fx
        .state
        .scheduling_service
        .cancel_from_queue(fx.organization_id, appt.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AppointmentNotInQueue));

    let untouched = fx
        .state
        .scheduling_service
        .get_appointment(fx.organization_id, appt.id)
        .await
        .expect("reload");
    assert_eq!(untouched.status, AppointmentStatus::Scheduled);
}
