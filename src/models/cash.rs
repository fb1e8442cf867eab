// src/models/cash.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;
use crate::models::ledger::{Currency, PaymentMethod};

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "cash_session_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CashSessionStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "cash_opening_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OpeningType {
    Manual, // Aberta pelo usuário
    Auto,   // Aberta no primeiro lançamento em dinheiro
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "reconciliation_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    Pending,  // Diferença aguardando revisão
    Closed,   // Conferido sem diferença
    Disputed, // Contestado
}

// --- Structs ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CashSession {
    pub id: Uuid,
    #[schema(ignore)]
    pub organization_id: Uuid,
    pub clinic_id: Uuid,
    pub user_id: Uuid,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    #[schema(example = 50000)]
    pub starting_float_cents: i64,
    pub status: CashSessionStatus,
    pub opening_type: OpeningType,
    pub notes: Option<String>,
    pub closing_notes: Option<String>,
}

impl CashSession {
    pub fn ensure_open(&self) -> Result<(), AppError> {
        match self.status {
            CashSessionStatus::Open => Ok(()),
            CashSessionStatus::Closed => Err(AppError::CashSessionNotOpen),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Reconciliation {
    pub id: Uuid,
    pub cash_session_id: Uuid,
    pub clinic_id: Uuid,
    #[schema(ignore)]
    pub organization_id: Uuid,
    pub payment_method: PaymentMethod,
    pub currency: Currency,
    pub reconciled_by: Uuid,
    pub expected_amount_cents: i64,
    pub actual_amount_cents: i64,
    pub float_left_cents: i64,
    pub deposited_cents: i64,
    pub discrepancy_cents: i64,
    #[schema(example = "SOBRE-0042")]
    pub envelope_id: Option<String>,
    pub status: ReconciliationStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Uma combinação forma de pagamento × moeda presente numa sessão.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MethodCurrency {
    pub payment_method: PaymentMethod,
    pub currency: Currency,
}

impl MethodCurrency {
    pub fn label(&self) -> String {
        format!("{}/{}", self.payment_method.as_str(), self.currency.as_str())
    }
}

/// Resultado do corte: os valores derivados nunca vêm do cliente.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountOutcome {
    pub expected_amount_cents: i64,
    pub actual_amount_cents: i64,
    pub float_left_cents: i64,
    pub deposited_cents: i64,
    pub discrepancy_cents: i64,
    pub status: ReconciliationStatus,
}

impl CountOutcome {
    /// depositado = contado - fundo deixado; diferença = contado - esperado.
    pub fn compute(
        method: PaymentMethod,
        expected_amount_cents: i64,
        actual_amount_cents: i64,
        float_left_cents: i64,
    ) -> Result<Self, AppError> {
        if actual_amount_cents < 0 {
            return Err(AppError::InvalidReconciliationAmounts(
                "actualAmountCents cannot be negative".into(),
            ));
        }
        if float_left_cents < 0 || float_left_cents > actual_amount_cents {
            return Err(AppError::InvalidReconciliationAmounts(
                "floatLeftCents must be between 0 and actualAmountCents".into(),
            ));
        }
        match method {
            PaymentMethod::Cash => {}
            PaymentMethod::Card | PaymentMethod::Transfer => {
                if float_left_cents != 0 {
                    return Err(AppError::InvalidReconciliationAmounts(
                        "only cash can leave a float in the drawer".into(),
                    ));
                }
            }
        }

        let discrepancy_cents = actual_amount_cents - expected_amount_cents;
        Ok(Self {
            expected_amount_cents,
            actual_amount_cents,
            float_left_cents,
            deposited_cents: actual_amount_cents - float_left_cents,
            discrepancy_cents,
            status: if discrepancy_cents == 0 {
                ReconciliationStatus::Closed
            } else {
                ReconciliationStatus::Pending
            },
        })
    }
}
