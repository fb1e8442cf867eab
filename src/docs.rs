// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Appointments ---
        handlers::appointments::create_appointment,
        handlers::appointments::list_appointments,
        handlers::appointments::get_appointment,
        handlers::appointments::update_appointment,
        handlers::appointments::reschedule_appointment,
        handlers::appointments::update_status,

        // --- Rescheduling Queue ---
        handlers::appointments::move_to_queue,
        handlers::appointments::list_queue,
        handlers::appointments::snooze_queue_item,
        handlers::appointments::cancel_from_queue,
        handlers::appointments::reschedule_from_queue,
        handlers::appointments::queue_doctor_day,

        // --- Availability ---
        handlers::appointments::get_available_slots,

        // --- Ledger ---
        handlers::ledger::create_entry,
        handlers::ledger::list_entries,
        handlers::ledger::get_balance,

        // --- Cash Sessions ---
        handlers::cash::open_session,
        handlers::cash::list_sessions,
        handlers::cash::get_current_session,
        handlers::cash::get_or_create_session,
        handlers::cash::close_session,

        // --- Reconciliation ---
        handlers::cash::expected_cash,
        handlers::cash::expected_amount,
        handlers::cash::pending_combinations,
        handlers::cash::create_reconciliation,
        handlers::cash::list_reconciliations,
        handlers::cash::dispute_reconciliation,
    ),
    components(
        schemas(
            // Agenda
            models::appointment::Appointment,
            models::appointment::AppointmentStatus,
            models::appointment::AvailabilityWindow,
            models::appointment::RescheduledFromQueue,
            models::appointment::TimeSlot,
            handlers::appointments::CreateAppointmentPayload,
            handlers::appointments::UpdateAppointmentPayload,
            handlers::appointments::ReschedulePayload,
            handlers::appointments::UpdateStatusPayload,
            handlers::appointments::ReasonPayload,
            handlers::appointments::SnoozePayload,
            handlers::appointments::QueueReschedulePayload,
            handlers::appointments::UnavailableDayPayload,

            // Livro-razão
            models::ledger::EntryType,
            models::ledger::Currency,
            models::ledger::PaymentMethod,
            models::ledger::DoctorType,
            models::ledger::AppointmentAccount,
            models::ledger::AccountEntry,
            models::ledger::CurrencyBalance,
            models::ledger::AccountBalance,
            handlers::ledger::CreateEntryPayload,

            // Caixa
            models::cash::CashSessionStatus,
            models::cash::OpeningType,
            models::cash::ReconciliationStatus,
            models::cash::CashSession,
            models::cash::Reconciliation,
            models::cash::MethodCurrency,
            handlers::cash::OpenSessionPayload,
            handlers::cash::CloseSessionPayload,
            handlers::cash::ExpectedCashResponse,
            handlers::cash::ExpectedAmountResponse,
            handlers::cash::CreateReconciliationPayload,
            handlers::cash::DisputePayload,
        )
    ),
    tags(
        (name = "Appointments", description = "Agenda de consultas por cadeira e médico"),
        (name = "Rescheduling Queue", description = "Fila de consultas a reagendar"),
        (name = "Availability", description = "Horários livres dos médicos"),
        (name = "Ledger", description = "Conta da consulta (somente inserção)"),
        (name = "Cash Sessions", description = "Abertura e fechamento de caixa"),
        (name = "Reconciliation", description = "Cortes de caixa por forma de pagamento e moeda")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
