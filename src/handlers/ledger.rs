// src/handlers/ledger.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{RequireRole, RoleFinance},
    },
    models::ledger::{
        AccountBalance, AccountEntry, Currency, DoctorType, EntryDraft, EntryType, PaymentMethod,
    },
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateEntryPayload {
    #[schema(example = "payment")]
    pub entry_type: EntryType,
    #[schema(example = "MXN")]
    pub currency: Currency,
    /// Centavos com sinal (pagamento > 0, desconto e reembolso < 0).
    #[schema(example = 150000)]
    pub amount_cents: i64,

    #[validate(length(min = 1, max = 500, message = "required"))]
    #[schema(example = "Pago de limpieza")]
    pub description: String,

    pub payment_method: Option<PaymentMethod>,
    /// Obrigatória para USD.
    #[schema(example = 17.25)]
    pub exchange_rate_used: Option<Decimal>,

    pub doctor_id: Option<Uuid>,
    pub doctor_type: Option<DoctorType>,
    #[schema(example = 40)]
    pub commission_pct: Option<Decimal>,
    pub external_doctor_fee_cents: Option<i64>,

    pub corrects_entry_id: Option<Uuid>,
    #[serde(default)]
    pub is_sensitive: bool,

    pub service_id: Option<Uuid>,
    #[validate(range(min = 1))]
    pub quantity: Option<i32>,
    pub unit_price_cents: Option<i64>,

    #[validate(length(max = 2000))]
    pub notes: Option<String>,
    /// Sessão de caixa explícita; sem ela, dinheiro vai para o caixa aberto do usuário.
    pub cash_session_id: Option<Uuid>,
}

impl From<CreateEntryPayload> for EntryDraft {
    fn from(p: CreateEntryPayload) -> Self {
        Self {
            entry_type: p.entry_type,
            currency: p.currency,
            amount_cents: p.amount_cents,
            description: p.description,
            payment_method: p.payment_method,
            exchange_rate_used: p.exchange_rate_used,
            doctor_id: p.doctor_id,
            doctor_type: p.doctor_type,
            commission_pct: p.commission_pct,
            external_doctor_fee_cents: p.external_doctor_fee_cents,
            corrects_entry_id: p.corrects_entry_id,
            is_sensitive: p.is_sensitive,
            service_id: p.service_id,
            quantity: p.quantity,
            unit_price_cents: p.unit_price_cents,
            notes: p.notes,
            cash_session_id: p.cash_session_id,
        }
    }
}

// POST /api/appointments/{id}/entries
#[utoipa::path(
    post,
    path = "/api/appointments/{id}/entries",
    tag = "Ledger",
    request_body = CreateEntryPayload,
    params(("id" = Uuid, Path, description = "ID da Consulta")),
    responses(
        (status = 201, description = "Lançamento registrado", body = AccountEntry),
        (status = 400, description = "Lançamento inválido"),
        (status = 422, description = "Caixa fechado")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_entry(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _role: RequireRole<RoleFinance>,
    Path(appointment_id): Path<Uuid>,
    Json(payload): Json<CreateEntryPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let entry = app_state
        .ledger_service
        .create_entry(
            user.0.organization_id,
            user.0.user_id,
            appointment_id,
            EntryDraft::from(payload),
        )
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(entry)))
}

// GET /api/appointments/{id}/entries
#[utoipa::path(
    get,
    path = "/api/appointments/{id}/entries",
    tag = "Ledger",
    params(("id" = Uuid, Path, description = "ID da Consulta")),
    responses((status = 200, description = "Extrato em ordem de criação", body = Vec<AccountEntry>)),
    security(("api_jwt" = []))
)]
pub async fn list_entries(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _role: RequireRole<RoleFinance>,
    Path(appointment_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = app_state
        .ledger_service
        .list_entries(&user.0, appointment_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(entries))
}

// GET /api/appointments/{id}/balance
#[utoipa::path(
    get,
    path = "/api/appointments/{id}/balance",
    tag = "Ledger",
    params(("id" = Uuid, Path, description = "ID da Consulta")),
    responses((status = 200, body = AccountBalance)),
    security(("api_jwt" = []))
)]
pub async fn get_balance(
    State(app_state): State<AppState>,
    locale: Locale,
    user: AuthenticatedUser,
    _role: RequireRole<RoleFinance>,
    Path(appointment_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let balance = app_state
        .ledger_service
        .get_account_balance(user.0.organization_id, appointment_id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(balance))
}
