// src/handlers/appointments.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{RequireRole, RoleScheduling},
        tenancy::ClinicContext,
    },
    models::appointment::{
        Appointment, AppointmentFilter, AppointmentPatch, AppointmentStatus, NewAppointment,
        QueueReschedule, RescheduledFromQueue, TimeSlot,
    },
};

// =============================================================================
//  1. AGENDA
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentPayload {
    pub unit_id: Uuid,
    pub doctor_id: Option<Uuid>,
    pub patient_id: Uuid,

    #[schema(example = "2024-06-01T10:00:00Z")]
    pub start_time: DateTime<Utc>,
    #[schema(example = "2024-06-01T10:30:00Z")]
    pub end_time: DateTime<Utc>,

    #[validate(length(min = 1, max = 200, message = "required"))]
    #[schema(example = "Limpieza dental")]
    pub treatment_type: String,

    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

// POST /api/appointments
#[utoipa::path(
    post,
    path = "/api/appointments",
    tag = "Appointments",
    request_body = CreateAppointmentPayload,
    responses(
        (status = 201, description = "Consulta agendada", body = Appointment),
        (status = 409, description = "Conflito de horário")
    ),
    params(("x-clinic-id" = Uuid, Header, description = "ID da Clínica")),
    security(("api_jwt" = []))
)]
pub async fn create_appointment(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    clinic: ClinicContext,
    _role: RequireRole<RoleScheduling>,
    Json(payload): Json<CreateAppointmentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let appt = NewAppointment {
        organization_id: user.0.organization_id,
        clinic_id: clinic.0,
        unit_id: payload.unit_id,
        doctor_id: payload.doctor_id,
        patient_id: payload.patient_id,
        start_time: payload.start_time,
        end_time: payload.end_time,
        treatment_type: payload.treatment_type,
        notes: payload.notes,
        created_by: user.0.user_id,
    };

    let created = app_state
        .scheduling_service
        .schedule_appointment(appt)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct ListAppointmentsQuery {
    pub doctor_id: Option<Uuid>,
    pub unit_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

// GET /api/appointments
#[utoipa::path(
    get,
    path = "/api/appointments",
    tag = "Appointments",
    params(
        ListAppointmentsQuery,
        ("x-clinic-id" = Uuid, Header, description = "ID da Clínica")
    ),
    responses((status = 200, description = "Consultas da clínica", body = Vec<Appointment>)),
    security(("api_jwt" = []))
)]
pub async fn list_appointments(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    clinic: ClinicContext,
    _role: RequireRole<RoleScheduling>,
    Query(query): Query<ListAppointmentsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = AppointmentFilter {
        clinic_id: Some(clinic.0),
        doctor_id: query.doctor_id,
        unit_id: query.unit_id,
        patient_id: query.patient_id,
        status: query.status,
        from: query.from,
        to: query.to,
    };

    let appointments = app_state
        .scheduling_service
        .list_appointments(user.0.organization_id, &filter)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(appointments))
}

// GET /api/appointments/{id}
#[utoipa::path(
    get,
    path = "/api/appointments/{id}",
    tag = "Appointments",
    params(("id" = Uuid, Path, description = "ID da Consulta")),
    responses(
        (status = 200, body = Appointment),
        (status = 404, description = "Consulta não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_appointment(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _role: RequireRole<RoleScheduling>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let appointment = app_state
        .scheduling_service
        .get_appointment(user.0.organization_id, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(appointment))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppointmentPayload {
    pub unit_id: Option<Uuid>,
    pub doctor_id: Option<Uuid>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[validate(length(min = 1, max = 200))]
    pub treatment_type: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

// PATCH /api/appointments/{id}
#[utoipa::path(
    patch,
    path = "/api/appointments/{id}",
    tag = "Appointments",
    request_body = UpdateAppointmentPayload,
    params(("id" = Uuid, Path, description = "ID da Consulta")),
    responses(
        (status = 200, body = Appointment),
        (status = 409, description = "Conflito de horário")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_appointment(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _role: RequireRole<RoleScheduling>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAppointmentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let patch = AppointmentPatch {
        unit_id: payload.unit_id,
        doctor_id: payload.doctor_id,
        start_time: payload.start_time,
        end_time: payload.end_time,
        treatment_type: payload.treatment_type,
        notes: payload.notes,
    };

    let updated = app_state
        .scheduling_service
        .update_appointment(user.0.organization_id, id, patch)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(updated))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReschedulePayload {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

// POST /api/appointments/{id}/reschedule
#[utoipa::path(
    post,
    path = "/api/appointments/{id}/reschedule",
    tag = "Appointments",
    request_body = ReschedulePayload,
    params(("id" = Uuid, Path, description = "ID da Consulta")),
    responses(
        (status = 200, body = Appointment),
        (status = 409, description = "Conflito de horário")
    ),
    security(("api_jwt" = []))
)]
pub async fn reschedule_appointment(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _role: RequireRole<RoleScheduling>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReschedulePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = app_state
        .scheduling_service
        .reschedule_appointment(user.0.organization_id, id, payload.start_time, payload.end_time)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(updated))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusPayload {
    #[schema(example = "confirmed")]
    pub status: AppointmentStatus,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

// POST /api/appointments/{id}/status
#[utoipa::path(
    post,
    path = "/api/appointments/{id}/status",
    tag = "Appointments",
    request_body = UpdateStatusPayload,
    params(("id" = Uuid, Path, description = "ID da Consulta")),
    responses(
        (status = 200, body = Appointment),
        (status = 422, description = "Transição não permitida")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_status(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _role: RequireRole<RoleScheduling>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let updated = app_state
        .scheduling_service
        .update_status(user.0.organization_id, id, payload.status, payload.reason.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(updated))
}

// =============================================================================
//  2. FILA DE REAGENDAMENTO
// =============================================================================

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReasonPayload {
    #[validate(length(max = 500))]
    #[schema(example = "Doctor enfermo")]
    pub reason: Option<String>,
}

// POST /api/appointments/{id}/queue
#[utoipa::path(
    post,
    path = "/api/appointments/{id}/queue",
    tag = "Rescheduling Queue",
    request_body = ReasonPayload,
    params(("id" = Uuid, Path, description = "ID da Consulta")),
    responses((status = 200, body = Appointment)),
    security(("api_jwt" = []))
)]
pub async fn move_to_queue(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _role: RequireRole<RoleScheduling>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReasonPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let queued = app_state
        .scheduling_service
        .move_to_queue(user.0.organization_id, id, payload.reason.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(queued))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct QueueQuery {
    /// Inclui itens adiados para o futuro.
    #[serde(default)]
    pub include_snoozed: bool,
}

// GET /api/queue
#[utoipa::path(
    get,
    path = "/api/queue",
    tag = "Rescheduling Queue",
    params(
        QueueQuery,
        ("x-clinic-id" = Uuid, Header, description = "ID da Clínica")
    ),
    responses((status = 200, body = Vec<Appointment>)),
    security(("api_jwt" = []))
)]
pub async fn list_queue(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    clinic: ClinicContext,
    _role: RequireRole<RoleScheduling>,
    Query(query): Query<QueueQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let queue = app_state
        .scheduling_service
        .list_queue(user.0.organization_id, Some(clinic.0), query.include_snoozed)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(queue))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SnoozePayload {
    #[schema(example = "2024-06-03T09:00:00Z")]
    pub until: DateTime<Utc>,
}

// POST /api/queue/{id}/snooze
#[utoipa::path(
    post,
    path = "/api/queue/{id}/snooze",
    tag = "Rescheduling Queue",
    request_body = SnoozePayload,
    params(("id" = Uuid, Path, description = "ID da Consulta")),
    responses(
        (status = 200, body = Appointment),
        (status = 422, description = "Consulta fora da fila")
    ),
    security(("api_jwt" = []))
)]
pub async fn snooze_queue_item(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _role: RequireRole<RoleScheduling>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SnoozePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let snoozed = app_state
        .scheduling_service
        .snooze_queue_item(user.0.organization_id, id, payload.until)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(snoozed))
}

// POST /api/queue/{id}/cancel
#[utoipa::path(
    post,
    path = "/api/queue/{id}/cancel",
    tag = "Rescheduling Queue",
    request_body = ReasonPayload,
    params(("id" = Uuid, Path, description = "ID da Consulta")),
    responses(
        (status = 200, body = Appointment),
        (status = 422, description = "Consulta fora da fila")
    ),
    security(("api_jwt" = []))
)]
pub async fn cancel_from_queue(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _role: RequireRole<RoleScheduling>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReasonPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let cancelled = app_state
        .scheduling_service
        .cancel_from_queue(user.0.organization_id, id, payload.reason.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(cancelled))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QueueReschedulePayload {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Outro médico (opcional).
    pub doctor_id: Option<Uuid>,
    /// Outra cadeira (opcional).
    pub unit_id: Option<Uuid>,
}

// POST /api/queue/{id}/reschedule
#[utoipa::path(
    post,
    path = "/api/queue/{id}/reschedule",
    tag = "Rescheduling Queue",
    request_body = QueueReschedulePayload,
    params(("id" = Uuid, Path, description = "ID da Consulta na fila")),
    responses(
        (status = 201, body = RescheduledFromQueue),
        (status = 409, description = "Conflito de horário; a original continua na fila")
    ),
    security(("api_jwt" = []))
)]
pub async fn reschedule_from_queue(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _role: RequireRole<RoleScheduling>,
    Path(id): Path<Uuid>,
    Json(payload): Json<QueueReschedulePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let request = QueueReschedule {
        start_time: payload.start_time,
        end_time: payload.end_time,
        doctor_id: payload.doctor_id,
        unit_id: payload.unit_id,
    };

    let outcome = app_state
        .scheduling_service
        .reschedule_from_queue(user.0.organization_id, user.0.user_id, id, request)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

// =============================================================================
//  3. MÉDICOS: DISPONIBILIDADE
// =============================================================================

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct SlotsQuery {
    /// Dia (UTC), ex.: 2024-06-01
    pub date: NaiveDate,
    /// Duração de cada horário em minutos
    pub duration_minutes: i64,
}

// GET /api/doctors/{doctor_id}/slots
#[utoipa::path(
    get,
    path = "/api/doctors/{doctor_id}/slots",
    tag = "Availability",
    params(
        ("doctor_id" = Uuid, Path, description = "ID do Médico"),
        SlotsQuery
    ),
    responses((status = 200, description = "Horários livres", body = Vec<TimeSlot>)),
    security(("api_jwt" = []))
)]
pub async fn get_available_slots(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _role: RequireRole<RoleScheduling>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let duration = Duration::try_minutes(query.duration_minutes)
        .ok_or(AppError::InvalidSlotDuration)
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let slots = app_state
        .scheduling_service
        .get_available_slots(user.0.organization_id, doctor_id, query.date, duration)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let slots: Vec<TimeSlot> = slots.iter().collect();
    Ok(Json(slots))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnavailableDayPayload {
    #[schema(value_type = String, format = Date, example = "2024-06-01")]
    pub date: NaiveDate,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

// POST /api/doctors/{doctor_id}/unavailable-day
#[utoipa::path(
    post,
    path = "/api/doctors/{doctor_id}/unavailable-day",
    tag = "Rescheduling Queue",
    request_body = UnavailableDayPayload,
    params(("doctor_id" = Uuid, Path, description = "ID do Médico")),
    responses((status = 200, description = "Consultas enviadas para a fila", body = Vec<Appointment>)),
    security(("api_jwt" = []))
)]
pub async fn queue_doctor_day(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _role: RequireRole<RoleScheduling>,
    Path(doctor_id): Path<Uuid>,
    Json(payload): Json<UnavailableDayPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let queued = app_state
        .scheduling_service
        .queue_doctor_day(user.0.organization_id, doctor_id, payload.date, payload.reason.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(queued))
}
