// src/handlers/cash.rs

use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{RequireRole, RoleAdmin, RoleFinance},
        tenancy::ClinicContext,
    },
    models::{
        cash::{CashSession, MethodCurrency, OpeningType, Reconciliation},
        ledger::{Currency, PaymentMethod},
    },
    services::reconciliation_service::CountInput,
};

// =============================================================================
//  1. SESSÕES DE CAIXA
// =============================================================================

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionPayload {
    #[validate(range(min = 0))]
    #[schema(example = 50000)]
    pub starting_float_cents: i64,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

// POST /api/cash-sessions
#[utoipa::path(
    post,
    path = "/api/cash-sessions",
    tag = "Cash Sessions",
    request_body = OpenSessionPayload,
    params(("x-clinic-id" = Uuid, Header, description = "ID da Clínica")),
    responses(
        (status = 201, body = CashSession),
        (status = 409, description = "Já existe um caixa aberto")
    ),
    security(("api_jwt" = []))
)]
pub async fn open_session(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    clinic: ClinicContext,
    _role: RequireRole<RoleFinance>,
    Json(payload): Json<OpenSessionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let session = app_state
        .cash_session_service
        .open_session(
            user.0.organization_id,
            clinic.0,
            user.0.user_id,
            OpeningType::Manual,
            payload.starting_float_cents,
            payload.notes.as_deref(),
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(session)))
}

// GET /api/cash-sessions
#[utoipa::path(
    get,
    path = "/api/cash-sessions",
    tag = "Cash Sessions",
    params(("x-clinic-id" = Uuid, Header, description = "ID da Clínica")),
    responses((status = 200, body = Vec<CashSession>)),
    security(("api_jwt" = []))
)]
pub async fn list_sessions(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    clinic: ClinicContext,
    _role: RequireRole<RoleFinance>,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = app_state
        .cash_session_service
        .list_sessions(user.0.organization_id, clinic.0)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(sessions))
}

// GET /api/cash-sessions/current
#[utoipa::path(
    get,
    path = "/api/cash-sessions/current",
    tag = "Cash Sessions",
    params(("x-clinic-id" = Uuid, Header, description = "ID da Clínica")),
    responses((status = 200, description = "Caixa aberto do usuário ou null", body = Option<CashSession>)),
    security(("api_jwt" = []))
)]
pub async fn get_current_session(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    clinic: ClinicContext,
    _role: RequireRole<RoleFinance>,
) -> Result<impl IntoResponse, ApiError> {
    let session = app_state
        .cash_session_service
        .get_current_session(user.0.organization_id, clinic.0, user.0.user_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(session))
}

// POST /api/cash-sessions/current
#[utoipa::path(
    post,
    path = "/api/cash-sessions/current",
    tag = "Cash Sessions",
    params(("x-clinic-id" = Uuid, Header, description = "ID da Clínica")),
    responses((status = 200, description = "Caixa aberto (existente ou criado agora)", body = CashSession)),
    security(("api_jwt" = []))
)]
pub async fn get_or_create_session(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    clinic: ClinicContext,
    _role: RequireRole<RoleFinance>,
) -> Result<impl IntoResponse, ApiError> {
    let session = app_state
        .cash_session_service
        .get_or_create_open_session(user.0.organization_id, clinic.0, user.0.user_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(session))
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloseSessionPayload {
    #[validate(length(max = 2000))]
    pub closing_notes: Option<String>,
}

// POST /api/cash-sessions/{id}/close
#[utoipa::path(
    post,
    path = "/api/cash-sessions/{id}/close",
    tag = "Cash Sessions",
    request_body = CloseSessionPayload,
    params(("id" = Uuid, Path, description = "ID do Caixa")),
    responses(
        (status = 200, body = CashSession),
        (status = 422, description = "Há combinações sem corte")
    ),
    security(("api_jwt" = []))
)]
pub async fn close_session(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _role: RequireRole<RoleFinance>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<CloseSessionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let closed = app_state
        .cash_session_service
        .close_session(user.0.organization_id, session_id, payload.closing_notes.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(closed))
}

// =============================================================================
//  2. CORTES (CONCILIAÇÃO)
// =============================================================================

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedCashResponse {
    pub cash_session_id: Uuid,
    /// Centavos esperados na gaveta por moeda, ex.: {"MXN": 250000}
    #[schema(value_type = Object)]
    pub expected: BTreeMap<Currency, i64>,
}

// GET /api/cash-sessions/{id}/expected-cash
#[utoipa::path(
    get,
    path = "/api/cash-sessions/{id}/expected-cash",
    tag = "Reconciliation",
    params(("id" = Uuid, Path, description = "ID do Caixa")),
    responses((status = 200, body = ExpectedCashResponse)),
    security(("api_jwt" = []))
)]
pub async fn expected_cash(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _role: RequireRole<RoleFinance>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let expected = app_state
        .reconciliation_service
        .calculate_expected_cash(user.0.organization_id, session_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(ExpectedCashResponse { cash_session_id: session_id, expected }))
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query, rename_all = "camelCase")]
pub struct ExpectedAmountQuery {
    pub payment_method: PaymentMethod,
    pub currency: Currency,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedAmountResponse {
    pub payment_method: PaymentMethod,
    pub currency: Currency,
    pub expected_amount_cents: i64,
}

// GET /api/cash-sessions/{id}/expected
#[utoipa::path(
    get,
    path = "/api/cash-sessions/{id}/expected",
    tag = "Reconciliation",
    params(
        ("id" = Uuid, Path, description = "ID do Caixa"),
        ExpectedAmountQuery
    ),
    responses((status = 200, body = ExpectedAmountResponse)),
    security(("api_jwt" = []))
)]
pub async fn expected_amount(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _role: RequireRole<RoleFinance>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<ExpectedAmountQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let expected_amount_cents = app_state
        .reconciliation_service
        .expected_amount(user.0.organization_id, session_id, query.payment_method, query.currency)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(ExpectedAmountResponse {
        payment_method: query.payment_method,
        currency: query.currency,
        expected_amount_cents,
    }))
}

// GET /api/cash-sessions/{id}/pending
#[utoipa::path(
    get,
    path = "/api/cash-sessions/{id}/pending",
    tag = "Reconciliation",
    params(("id" = Uuid, Path, description = "ID do Caixa")),
    responses((status = 200, description = "Combinações ainda sem corte", body = Vec<MethodCurrency>)),
    security(("api_jwt" = []))
)]
pub async fn pending_combinations(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _role: RequireRole<RoleFinance>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let pending = app_state
        .reconciliation_service
        .pending_combinations(user.0.organization_id, session_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(pending))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateReconciliationPayload {
    #[schema(example = "cash")]
    pub payment_method: PaymentMethod,
    #[schema(example = "MXN")]
    pub currency: Currency,
    #[validate(range(min = 0))]
    #[schema(example = 255000)]
    pub actual_amount_cents: i64,
    #[validate(range(min = 0))]
    #[serde(default)]
    #[schema(example = 50000)]
    pub float_left_cents: i64,
    #[validate(length(max = 100))]
    pub envelope_id: Option<String>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

// POST /api/cash-sessions/{id}/reconciliations
#[utoipa::path(
    post,
    path = "/api/cash-sessions/{id}/reconciliations",
    tag = "Reconciliation",
    request_body = CreateReconciliationPayload,
    params(("id" = Uuid, Path, description = "ID do Caixa")),
    responses(
        (status = 201, body = Reconciliation),
        (status = 409, description = "Combinação já conciliada")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_reconciliation(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _role: RequireRole<RoleFinance>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<CreateReconciliationPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let count = CountInput {
        payment_method: payload.payment_method,
        currency: payload.currency,
        actual_amount_cents: payload.actual_amount_cents,
        float_left_cents: payload.float_left_cents,
        envelope_id: payload.envelope_id,
        notes: payload.notes,
    };

    let reconciliation = app_state
        .reconciliation_service
        .create_reconciliation(user.0.organization_id, user.0.user_id, session_id, count)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(reconciliation)))
}

// GET /api/cash-sessions/{id}/reconciliations
#[utoipa::path(
    get,
    path = "/api/cash-sessions/{id}/reconciliations",
    tag = "Reconciliation",
    params(("id" = Uuid, Path, description = "ID do Caixa")),
    responses((status = 200, body = Vec<Reconciliation>)),
    security(("api_jwt" = []))
)]
pub async fn list_reconciliations(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _role: RequireRole<RoleFinance>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let reconciliations = app_state
        .reconciliation_service
        .list_reconciliations(user.0.organization_id, session_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(reconciliations))
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DisputePayload {
    #[validate(length(max = 2000))]
    #[schema(example = "Faltan 50 pesos en el sobre")]
    pub notes: Option<String>,
}

// POST /api/reconciliations/{id}/dispute
#[utoipa::path(
    post,
    path = "/api/reconciliations/{id}/dispute",
    tag = "Reconciliation",
    request_body = DisputePayload,
    params(("id" = Uuid, Path, description = "ID do Corte")),
    responses(
        (status = 200, body = Reconciliation),
        (status = 403, description = "Somente administradores"),
        (status = 409, description = "Corte já contestado")
    ),
    security(("api_jwt" = []))
)]
pub async fn dispute_reconciliation(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _role: RequireRole<RoleAdmin>,
    Path(reconciliation_id): Path<Uuid>,
    Json(payload): Json<DisputePayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let disputed = app_state
        .reconciliation_service
        .dispute_reconciliation(user.0.organization_id, reconciliation_id, payload.notes.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(disputed))
}
