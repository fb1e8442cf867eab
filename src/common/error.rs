// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::common::i18n::I18nStore;
use crate::middleware::i18n::Locale;

/// Família do erro. Define o status HTTP e ajuda o chamador a decidir
/// se deve corrigir a entrada, escolher outro horário ou desistir.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    InvalidState,
    Unauthorized,
    Forbidden,
    Internal,
}

#[derive(Debug, Error)]
pub enum AppError {
    // --- Validação ---
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Campo obrigatório ausente: {0}")]
    MissingField(&'static str),

    #[error("O horário de término deve ser posterior ao de início")]
    InvalidTimeRange,

    #[error("A duração do horário deve ser positiva")]
    InvalidSlotDuration,

    #[error("A data de adiamento deve estar no futuro")]
    InvalidSnoozeDate,

    #[error("O valor do lançamento não pode ser zero")]
    ZeroAmount,

    #[error("Sinal do valor incompatível com o tipo de lançamento: {0}")]
    AmountSignMismatch(String),

    #[error("Lançamentos em USD exigem a taxa de câmbio utilizada")]
    MissingExchangeRate,

    #[error("Taxa de câmbio só é permitida em lançamentos em USD")]
    UnexpectedExchangeRate,

    #[error("Pagamentos exigem a forma de pagamento")]
    MissingPaymentMethod,

    #[error("Forma de pagamento não permitida para este tipo de lançamento")]
    UnexpectedPaymentMethod,

    #[error("Dados do médico inválidos para o cargo de serviço: {0}")]
    InvalidDoctorFee(String),

    #[error("Item de serviço inválido: {0}")]
    InvalidLineItem(String),

    #[error("Correção inválida: {0}")]
    InvalidCorrection(String),

    #[error("O fundo de troco inicial não pode ser negativo")]
    InvalidStartingFloat,

    #[error("Valores de corte de caixa inválidos: {0}")]
    InvalidReconciliationAmounts(String),

    // --- Conflitos ---
    #[error("Conflito de horário com outra consulta")]
    AppointmentConflict { conflicting_id: Option<Uuid> },

    #[error("Já existe uma sessão de caixa aberta para este usuário nesta clínica")]
    CashSessionAlreadyOpen,

    #[error("Já existe um corte para esta forma de pagamento e moeda nesta sessão")]
    ReconciliationAlreadyExists,

    // --- Não encontrados ---
    #[error("Consulta não encontrada")]
    AppointmentNotFound,

    #[error("Médico não encontrado")]
    DoctorNotFound,

    #[error("Cadeira (unidade) não encontrada")]
    UnitNotFound,

    #[error("Paciente não encontrado")]
    PatientNotFound,

    #[error("Clínica não encontrada")]
    ClinicNotFound,

    #[error("Sessão de caixa não encontrada")]
    CashSessionNotFound,

    #[error("Lançamento não encontrado")]
    EntryNotFound,

    #[error("Corte de caixa não encontrado")]
    ReconciliationNotFound,

    // --- Estado ---
    #[error("A consulta não está na fila de reagendamento")]
    AppointmentNotInQueue,

    #[error("Transição de status inválida: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("A sessão de caixa já está fechada")]
    CashSessionAlreadyClosed,

    #[error("A sessão de caixa está fechada")]
    CashSessionNotOpen,

    #[error("Combinações sem corte de caixa: {0:?}")]
    CashSessionUnreconciled(Vec<String>),

    #[error("O corte de caixa já está em disputa")]
    ReconciliationAlreadyDisputed,

    // --- Autenticação ---
    #[error("Token inválido")]
    InvalidToken,

    #[error("Acesso negado")]
    Forbidden,

    // Variante para erros de banco de dados
    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    // Variante genérica para qualquer outro erro inesperado
    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::ValidationError(_)
            | AppError::MissingField(_)
            | AppError::InvalidTimeRange
            | AppError::InvalidSlotDuration
            | AppError::InvalidSnoozeDate
            | AppError::ZeroAmount
            | AppError::AmountSignMismatch(_)
            | AppError::MissingExchangeRate
            | AppError::UnexpectedExchangeRate
            | AppError::MissingPaymentMethod
            | AppError::UnexpectedPaymentMethod
            | AppError::InvalidDoctorFee(_)
            | AppError::InvalidLineItem(_)
            | AppError::InvalidCorrection(_)
            | AppError::InvalidStartingFloat
            | AppError::InvalidReconciliationAmounts(_) => ErrorKind::Validation,

            AppError::AppointmentConflict { .. }
            | AppError::CashSessionAlreadyOpen
            | AppError::ReconciliationAlreadyExists => ErrorKind::Conflict,

            AppError::AppointmentNotFound
            | AppError::DoctorNotFound
            | AppError::UnitNotFound
            | AppError::PatientNotFound
            | AppError::ClinicNotFound
            | AppError::CashSessionNotFound
            | AppError::EntryNotFound
            | AppError::ReconciliationNotFound => ErrorKind::NotFound,

            AppError::AppointmentNotInQueue
            | AppError::InvalidStatusTransition { .. }
            | AppError::CashSessionAlreadyClosed
            | AppError::CashSessionNotOpen
            | AppError::CashSessionUnreconciled(_)
            | AppError::ReconciliationAlreadyDisputed => ErrorKind::InvalidState,

            AppError::InvalidToken | AppError::JwtError(_) => ErrorKind::Unauthorized,
            AppError::Forbidden => ErrorKind::Forbidden,

            AppError::DatabaseError(_) | AppError::InternalServerError(_) => ErrorKind::Internal,
        }
    }

    /// Código estável consumido pelo frontend.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::MissingField(_) => "MISSING_FIELD",
            AppError::InvalidTimeRange => "INVALID_TIME_RANGE",
            AppError::InvalidSlotDuration => "INVALID_SLOT_DURATION",
            AppError::InvalidSnoozeDate => "INVALID_SNOOZE_DATE",
            AppError::ZeroAmount => "ZERO_AMOUNT",
            AppError::AmountSignMismatch(_) => "AMOUNT_SIGN_MISMATCH",
            AppError::MissingExchangeRate => "MISSING_EXCHANGE_RATE",
            AppError::UnexpectedExchangeRate => "UNEXPECTED_EXCHANGE_RATE",
            AppError::MissingPaymentMethod => "MISSING_PAYMENT_METHOD",
            AppError::UnexpectedPaymentMethod => "UNEXPECTED_PAYMENT_METHOD",
            AppError::InvalidDoctorFee(_) => "INVALID_DOCTOR_FEE",
            AppError::InvalidLineItem(_) => "INVALID_LINE_ITEM",
            AppError::InvalidCorrection(_) => "INVALID_CORRECTION",
            AppError::InvalidStartingFloat => "INVALID_STARTING_FLOAT",
            AppError::InvalidReconciliationAmounts(_) => "INVALID_RECONCILIATION_AMOUNTS",
            AppError::AppointmentConflict { .. } => "APPOINTMENT_CONFLICT",
            AppError::CashSessionAlreadyOpen => "CASH_SESSION_ALREADY_OPEN",
            AppError::ReconciliationAlreadyExists => "RECONCILIATION_ALREADY_EXISTS",
            AppError::AppointmentNotFound => "APPOINTMENT_NOT_FOUND",
            AppError::DoctorNotFound => "DOCTOR_NOT_FOUND",
            AppError::UnitNotFound => "UNIT_NOT_FOUND",
            AppError::PatientNotFound => "PATIENT_NOT_FOUND",
            AppError::ClinicNotFound => "CLINIC_NOT_FOUND",
            AppError::CashSessionNotFound => "CASH_SESSION_NOT_FOUND",
            AppError::EntryNotFound => "ENTRY_NOT_FOUND",
            AppError::ReconciliationNotFound => "RECONCILIATION_NOT_FOUND",
            AppError::AppointmentNotInQueue => "APPOINTMENT_NOT_IN_QUEUE",
            AppError::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            AppError::CashSessionAlreadyClosed => "CASH_SESSION_ALREADY_CLOSED",
            AppError::CashSessionNotOpen => "CASH_SESSION_NOT_OPEN",
            AppError::CashSessionUnreconciled(_) => "CASH_SESSION_UNRECONCILED",
            AppError::ReconciliationAlreadyDisputed => "RECONCILIATION_ALREADY_DISPUTED",
            AppError::InvalidToken | AppError::JwtError(_) => "INVALID_TOKEN",
            AppError::Forbidden => "FORBIDDEN",
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidState => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Detalhes estruturados que ajudam o chamador a reagir (ex.: oferecer outro horário).
    fn details(&self) -> Option<Value> {
        match self {
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .map(|e| {
                            e.message
                                .as_ref()
                                .map(|m| m.to_string())
                                .unwrap_or_else(|| e.code.to_string())
                        })
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                Some(json!(details))
            }
            AppError::MissingField(field) => Some(json!({ "field": field })),
            AppError::AmountSignMismatch(reason)
            | AppError::InvalidDoctorFee(reason)
            | AppError::InvalidLineItem(reason)
            | AppError::InvalidCorrection(reason)
            | AppError::InvalidReconciliationAmounts(reason) => Some(json!({ "reason": reason })),
            AppError::AppointmentConflict { conflicting_id } => {
                Some(json!({ "conflictingAppointmentId": conflicting_id }))
            }
            AppError::InvalidStatusTransition { from, to } => Some(json!({ "from": from, "to": to })),
            AppError::CashSessionUnreconciled(missing) => Some(json!({ "missing": missing })),
            _ => None,
        }
    }

    /// Converte o erro de domínio em resposta HTTP traduzida para o idioma do cliente.
    pub fn to_api_error(&self, locale: &Locale, store: &I18nStore) -> ApiError {
        if self.kind() == ErrorKind::Internal {
            tracing::error!("🔥 Erro Interno do Servidor: {:?}", self);
        }

        ApiError {
            status: self.status(),
            code: self.code(),
            error: store.translate(&locale.0, self.code()),
            details: self.details(),
        }
    }
}

/// Resposta de erro já pronta para o cliente.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "code": self.code,
            "error": self.error,
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}

// Usado pelos middlewares, que não têm acesso ao idioma do cliente.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.to_api_error(&Locale::default(), I18nStore::global())
            .into_response()
    }
}

/// Traduz violações de restrição do Postgres para erros de domínio.
pub fn map_constraint_violation(e: sqlx::Error) -> AppError {
    if let Some(db_err) = e.as_database_error() {
        match db_err.code().as_deref() {
            // exclusion_violation: sobreposição de horário barrada pelo índice GiST
            Some("23P01") => return AppError::AppointmentConflict { conflicting_id: None },
            Some("23505") => match db_err.constraint() {
                Some("uq_cash_sessions_open_per_user_clinic") => {
                    return AppError::CashSessionAlreadyOpen
                }
                Some("uq_reconciliations_session_method_currency") => {
                    return AppError::ReconciliationAlreadyExists
                }
                _ => {}
            },
            _ => {}
        }
    }
    AppError::DatabaseError(e)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxonomy_maps_to_http_status() {
        assert_eq!(AppError::ZeroAmount.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::AppointmentConflict { conflicting_id: None }.status(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::CashSessionAlreadyOpen.status(), StatusCode::CONFLICT);
        assert_eq!(AppError::DoctorNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::AppointmentNotInQueue.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::CashSessionAlreadyClosed.status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn api_error_is_translated_and_carries_details() {
        let store = I18nStore::new();
        let conflicting = Uuid::new_v4();
        let api = AppError::AppointmentConflict { conflicting_id: Some(conflicting) }
            .to_api_error(&Locale("es".into()), &store);

        assert_eq!(api.code, "APPOINTMENT_CONFLICT");
        assert_eq!(api.status, StatusCode::CONFLICT);
        assert!(api.error.contains("cita"));
        assert_eq!(
            api.details.unwrap()["conflictingAppointmentId"],
            json!(conflicting)
        );
    }
}
