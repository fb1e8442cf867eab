// src/models/ledger.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::common::error::AppError;

// --- Enums (Mapeando o Postgres) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "entry_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    ServiceCharge, // Cargo (positivo)
    Discount,      // Desconto (negativo)
    Payment,       // Pagamento (positivo)
    Refund,        // Reembolso (negativo)
    Correction,    // Estorno de outro lançamento (sinal oposto)
}

impl EntryType {
    /// `Some(true)` = positivo, `Some(false)` = negativo, `None` = depende do lançamento corrigido.
    pub fn requires_positive(&self) -> Option<bool> {
        match self {
            EntryType::ServiceCharge | EntryType::Payment => Some(true),
            EntryType::Discount | EntryType::Refund => Some(false),
            EntryType::Correction => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::ServiceCharge => "service_charge",
            EntryType::Discount => "discount",
            EntryType::Payment => "payment",
            EntryType::Refund => "refund",
            EntryType::Correction => "correction",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "ledger_currency", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Mxn,
    Usd,
}

impl Currency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Mxn => "MXN",
            Currency::Usd => "USD",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Transfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Transfer => "transfer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "doctor_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DoctorType {
    Internal, // Médico da casa: recebe comissão percentual
    External, // Médico convidado: honorário fixo
}

// --- Structs persistidas ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentAccount {
    pub id: Uuid,
    #[schema(ignore)]
    pub organization_id: Uuid,
    pub appointment_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Linha imutável do livro-razão. Nunca é alterada nem apagada.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountEntry {
    pub id: Uuid,
    pub account_id: Uuid,
    pub entry_type: EntryType,
    pub currency: Currency,

    #[schema(example = 300000)]
    pub amount_cents: i64,

    #[schema(example = "Limpieza dental")]
    pub description: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,

    pub payment_method: Option<PaymentMethod>,
    #[schema(example = "17.25")]
    pub exchange_rate_used: Option<Decimal>,

    pub doctor_id: Option<Uuid>,
    pub doctor_type: Option<DoctorType>,
    #[schema(example = "40.00")]
    pub commission_pct: Option<Decimal>,
    pub external_doctor_fee_cents: Option<i64>,

    pub corrects_entry_id: Option<Uuid>,
    pub is_sensitive: bool,

    pub service_id: Option<Uuid>,
    pub quantity: Option<i32>,
    pub unit_price_cents: Option<i64>,
    pub notes: Option<String>,
    pub cash_session_id: Option<Uuid>,
}

// --- Saldos (derivados, nunca persistidos) ---

/// Totais de uma moeda. Correções somam no lado do lançamento que corrigem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyBalance {
    pub currency: Currency,
    pub charged_cents: i64,
    pub discount_cents: i64,
    pub paid_cents: i64,
    pub refunded_cents: i64,
    /// Soma de todos os valores com sinal.
    pub net_cents: i64,
    /// (cargos + descontos) - (pagamentos + reembolsos)
    pub outstanding_cents: i64,
}

impl CurrencyBalance {
    pub fn empty(currency: Currency) -> Self {
        Self {
            currency,
            charged_cents: 0,
            discount_cents: 0,
            paid_cents: 0,
            refunded_cents: 0,
            net_cents: 0,
            outstanding_cents: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    pub appointment_id: Uuid,
    pub account_id: Option<Uuid>,
    pub balances: Vec<CurrencyBalance>,
}

// --- Tipos de comando (validados) ---

/// Remuneração do médico num cargo de serviço. Um médico interno sem
/// comissão (ou externo sem honorário) não é representável.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoctorFee {
    Internal { commission_pct: Decimal },
    External { fee_cents: i64 },
}

impl DoctorFee {
    pub fn from_parts(
        doctor_type: DoctorType,
        commission_pct: Option<Decimal>,
        external_fee_cents: Option<i64>,
    ) -> Result<Self, AppError> {
        match (doctor_type, commission_pct, external_fee_cents) {
            (DoctorType::Internal, Some(pct), None) => {
                if pct < Decimal::ZERO || pct > Decimal::ONE_HUNDRED {
                    return Err(AppError::InvalidDoctorFee(
                        "commissionPct must be between 0 and 100".into(),
                    ));
                }
                Ok(DoctorFee::Internal { commission_pct: pct })
            }
            (DoctorType::Internal, None, _) => Err(AppError::InvalidDoctorFee(
                "internal doctors require commissionPct".into(),
            )),
            (DoctorType::Internal, Some(_), Some(_)) => Err(AppError::InvalidDoctorFee(
                "internal doctors do not take externalDoctorFeeCents".into(),
            )),
            (DoctorType::External, None, Some(fee)) => {
                if fee < 0 {
                    return Err(AppError::InvalidDoctorFee(
                        "externalDoctorFeeCents cannot be negative".into(),
                    ));
                }
                Ok(DoctorFee::External { fee_cents: fee })
            }
            (DoctorType::External, _, None) => Err(AppError::InvalidDoctorFee(
                "external doctors require externalDoctorFeeCents".into(),
            )),
            (DoctorType::External, Some(_), Some(_)) => Err(AppError::InvalidDoctorFee(
                "external doctors do not take commissionPct".into(),
            )),
        }
    }

    pub fn doctor_type(&self) -> DoctorType {
        match self {
            DoctorFee::Internal { .. } => DoctorType::Internal,
            DoctorFee::External { .. } => DoctorType::External,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    ServiceCharge { doctor_id: Uuid, fee: DoctorFee },
    Discount,
    Payment { method: PaymentMethod },
    Refund { method: Option<PaymentMethod> },
    Correction { corrects_entry_id: Uuid, method: Option<PaymentMethod> },
}

impl EntryKind {
    pub fn entry_type(&self) -> EntryType {
        match self {
            EntryKind::ServiceCharge { .. } => EntryType::ServiceCharge,
            EntryKind::Discount => EntryType::Discount,
            EntryKind::Payment { .. } => EntryType::Payment,
            EntryKind::Refund { .. } => EntryType::Refund,
            EntryKind::Correction { .. } => EntryType::Correction,
        }
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        match self {
            EntryKind::Payment { method } => Some(*method),
            EntryKind::Refund { method } | EntryKind::Correction { method, .. } => *method,
            EntryKind::ServiceCharge { .. } | EntryKind::Discount => None,
        }
    }
}

/// Lançamento como chega do cliente: linha plana com campos condicionais.
#[derive(Debug, Clone)]
pub struct EntryDraft {
    pub entry_type: EntryType,
    pub currency: Currency,
    pub amount_cents: i64,
    pub description: String,
    pub payment_method: Option<PaymentMethod>,
    pub exchange_rate_used: Option<Decimal>,
    pub doctor_id: Option<Uuid>,
    pub doctor_type: Option<DoctorType>,
    pub commission_pct: Option<Decimal>,
    pub external_doctor_fee_cents: Option<i64>,
    pub corrects_entry_id: Option<Uuid>,
    pub is_sensitive: bool,
    pub service_id: Option<Uuid>,
    pub quantity: Option<i32>,
    pub unit_price_cents: Option<i64>,
    pub notes: Option<String>,
    pub cash_session_id: Option<Uuid>,
}

/// Lançamento que passou por todas as regras locais. A correção ainda
/// precisa ser conferida contra o lançamento original (`resolve_correction`).
#[derive(Debug, Clone)]
pub struct ValidatedEntry {
    pub kind: EntryKind,
    pub currency: Currency,
    pub exchange_rate_used: Option<Decimal>,
    pub amount_cents: i64,
    pub description: String,
    pub is_sensitive: bool,
    pub service_id: Option<Uuid>,
    pub quantity: Option<i32>,
    pub unit_price_cents: Option<i64>,
    pub notes: Option<String>,
    pub cash_session_id: Option<Uuid>,
}

impl EntryDraft {
    /// Valida na ordem: valor, sinal, câmbio, forma de pagamento, médico, correção.
    pub fn validate(self) -> Result<ValidatedEntry, AppError> {
        // 1. Valor
        if self.amount_cents == 0 {
            return Err(AppError::ZeroAmount);
        }

        // 2. Sinal (a correção é conferida depois, contra o original)
        if let Some(positive) = self.entry_type.requires_positive() {
            if positive != (self.amount_cents > 0) {
                return Err(AppError::AmountSignMismatch(format!(
                    "{} must be {}",
                    self.entry_type.as_str(),
                    if positive { "positive" } else { "negative" }
                )));
            }
        }

        // 3. Câmbio
        match (self.currency, self.exchange_rate_used) {
            (Currency::Usd, None) => return Err(AppError::MissingExchangeRate),
            (Currency::Usd, Some(rate)) if rate <= Decimal::ZERO => {
                return Err(AppError::MissingExchangeRate)
            }
            (Currency::Mxn, Some(_)) => return Err(AppError::UnexpectedExchangeRate),
            _ => {}
        }

        // 4. Forma de pagamento
        match (self.entry_type, self.payment_method) {
            (EntryType::Payment, None) => return Err(AppError::MissingPaymentMethod),
            (EntryType::ServiceCharge | EntryType::Discount, Some(_)) => {
                return Err(AppError::UnexpectedPaymentMethod)
            }
            _ => {}
        }

        // 5. Médico (só em cargos de serviço)
        let has_doctor_data = self.doctor_id.is_some()
            || self.doctor_type.is_some()
            || self.commission_pct.is_some()
            || self.external_doctor_fee_cents.is_some();

        let service_doctor = if self.entry_type == EntryType::ServiceCharge {
            let doctor_id = self
                .doctor_id
                .ok_or_else(|| AppError::InvalidDoctorFee("doctorId is required".into()))?;
            let doctor_type = self
                .doctor_type
                .ok_or_else(|| AppError::InvalidDoctorFee("doctorType is required".into()))?;
            let fee = DoctorFee::from_parts(
                doctor_type,
                self.commission_pct,
                self.external_doctor_fee_cents,
            )?;
            Some((doctor_id, fee))
        } else {
            if has_doctor_data {
                return Err(AppError::InvalidDoctorFee(
                    "doctor data is only allowed on service charges".into(),
                ));
            }
            None
        };

        // 6. Correção
        if self.entry_type != EntryType::Correction && self.corrects_entry_id.is_some() {
            return Err(AppError::InvalidCorrection(
                "correctsEntryId is only allowed on corrections".into(),
            ));
        }

        if self.description.trim().is_empty() {
            return Err(AppError::MissingField("description"));
        }
        if self.quantity.is_some_and(|q| q <= 0) {
            return Err(AppError::InvalidLineItem("quantity must be positive".into()));
        }
        if self.unit_price_cents.is_some_and(|p| p < 0) {
            return Err(AppError::InvalidLineItem("unitPriceCents cannot be negative".into()));
        }

        let kind = match self.entry_type {
            EntryType::ServiceCharge => {
                let (doctor_id, fee) = service_doctor
                    .ok_or_else(|| AppError::InvalidDoctorFee("doctorId is required".into()))?;
                EntryKind::ServiceCharge { doctor_id, fee }
            }
            EntryType::Discount => EntryKind::Discount,
            EntryType::Payment => EntryKind::Payment {
                method: self.payment_method.ok_or(AppError::MissingPaymentMethod)?,
            },
            EntryType::Refund => EntryKind::Refund { method: self.payment_method },
            EntryType::Correction => EntryKind::Correction {
                corrects_entry_id: self
                    .corrects_entry_id
                    .ok_or(AppError::MissingField("correctsEntryId"))?,
                method: self.payment_method,
            },
        };

        Ok(ValidatedEntry {
            kind,
            currency: self.currency,
            exchange_rate_used: self.exchange_rate_used,
            amount_cents: self.amount_cents,
            description: self.description,
            is_sensitive: self.is_sensitive,
            service_id: self.service_id,
            quantity: self.quantity,
            unit_price_cents: self.unit_price_cents,
            notes: self.notes,
            cash_session_id: self.cash_session_id,
        })
    }
}

impl ValidatedEntry {
    pub fn entry_type(&self) -> EntryType {
        self.kind.entry_type()
    }

    pub fn payment_method(&self) -> Option<PaymentMethod> {
        self.kind.payment_method()
    }

    /// Confere a correção contra o lançamento original: mesma conta, mesma
    /// moeda, sinal oposto. Herda a forma de pagamento do original.
    pub fn resolve_correction(
        &mut self,
        account_id: Uuid,
        corrected: &AccountEntry,
    ) -> Result<(), AppError> {
        let EntryKind::Correction { method, .. } = &mut self.kind else {
            return Ok(());
        };

        if corrected.account_id != account_id {
            return Err(AppError::InvalidCorrection(
                "corrected entry belongs to another account".into(),
            ));
        }
        if corrected.currency != self.currency {
            return Err(AppError::InvalidCorrection(
                "currency must match the corrected entry".into(),
            ));
        }
        if (corrected.amount_cents > 0) == (self.amount_cents > 0) {
            return Err(AppError::AmountSignMismatch(
                "correction must have the opposite sign of the corrected entry".into(),
            ));
        }

        match (*method, corrected.payment_method) {
            (None, inherited) => *method = inherited,
            (Some(given), Some(original)) if given == original => {}
            (Some(_), _) => {
                return Err(AppError::InvalidCorrection(
                    "payment method must match the corrected entry".into(),
                ))
            }
        }
        Ok(())
    }

    /// Colunas de médico na forma plana persistida.
    pub fn doctor_columns(&self) -> (Option<Uuid>, Option<DoctorType>, Option<Decimal>, Option<i64>) {
        match &self.kind {
            EntryKind::ServiceCharge { doctor_id, fee } => match fee {
                DoctorFee::Internal { commission_pct } => {
                    (Some(*doctor_id), Some(fee.doctor_type()), Some(*commission_pct), None)
                }
                DoctorFee::External { fee_cents } => {
                    (Some(*doctor_id), Some(fee.doctor_type()), None, Some(*fee_cents))
                }
            },
            _ => (None, None, None, None),
        }
    }

    pub fn corrects_entry_id(&self) -> Option<Uuid> {
        match &self.kind {
            EntryKind::Correction { corrects_entry_id, .. } => Some(*corrects_entry_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(entry_type: EntryType, amount_cents: i64) -> EntryDraft {
        EntryDraft {
            entry_type,
            currency: Currency::Mxn,
            amount_cents,
            description: "Consulta".into(),
            payment_method: None,
            exchange_rate_used: None,
            doctor_id: None,
            doctor_type: None,
            commission_pct: None,
            external_doctor_fee_cents: None,
            corrects_entry_id: None,
            is_sensitive: false,
            service_id: None,
            quantity: None,
            unit_price_cents: None,
            notes: None,
            cash_session_id: None,
        }
    }

    fn stored(account_id: Uuid, entry_type: EntryType, amount_cents: i64) -> AccountEntry {
        AccountEntry {
            id: Uuid::new_v4(),
            account_id,
            entry_type,
            currency: Currency::Mxn,
            amount_cents,
            description: "Pago".into(),
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            payment_method: Some(PaymentMethod::Cash),
            exchange_rate_used: None,
            doctor_id: None,
            doctor_type: None,
            commission_pct: None,
            external_doctor_fee_cents: None,
            corrects_entry_id: None,
            is_sensitive: false,
            service_id: None,
            quantity: None,
            unit_price_cents: None,
            notes: None,
            cash_session_id: None,
        }
    }

    #[test]
    fn internal_service_charge_with_commission_is_accepted() {
        let mut d = draft(EntryType::ServiceCharge, 300_000);
        d.doctor_id = Some(Uuid::new_v4());
        d.doctor_type = Some(DoctorType::Internal);
        d.commission_pct = Some(Decimal::new(4000, 2));

        let entry = d.validate().expect("cargo válido");
        let (_, doctor_type, pct, fee) = entry.doctor_columns();
        assert_eq!(doctor_type, Some(DoctorType::Internal));
        assert_eq!(pct, Some(Decimal::new(4000, 2)));
        assert_eq!(fee, None);
    }

    #[test]
    fn internal_service_charge_without_commission_is_rejected() {
        let mut d = draft(EntryType::ServiceCharge, 300_000);
        d.doctor_id = Some(Uuid::new_v4());
        d.doctor_type = Some(DoctorType::Internal);

        assert!(matches!(d.validate(), Err(AppError::InvalidDoctorFee(_))));
    }

    #[test]
    fn external_doctor_requires_fee_and_rejects_commission() {
        let mut d = draft(EntryType::ServiceCharge, 100_000);
        d.doctor_id = Some(Uuid::new_v4());
        d.doctor_type = Some(DoctorType::External);
        d.commission_pct = Some(Decimal::new(10, 0));
        assert!(matches!(d.clone().validate(), Err(AppError::InvalidDoctorFee(_))));

        d.commission_pct = None;
        d.external_doctor_fee_cents = Some(50_000);
        assert!(d.validate().is_ok());
    }

    #[test]
    fn zero_amount_is_checked_first() {
        // Mesmo sem forma de pagamento, o valor zero é o primeiro erro
        assert!(matches!(
            draft(EntryType::Payment, 0).validate(),
            Err(AppError::ZeroAmount)
        ));
    }

    #[test]
    fn sign_must_match_type() {
        assert!(matches!(
            draft(EntryType::Discount, 500).validate(),
            Err(AppError::AmountSignMismatch(_))
        ));
        let mut refund = draft(EntryType::Refund, 500);
        refund.payment_method = Some(PaymentMethod::Cash);
        assert!(matches!(refund.validate(), Err(AppError::AmountSignMismatch(_))));
        assert!(draft(EntryType::Discount, -500).validate().is_ok());
    }

    #[test]
    fn usd_requires_exchange_rate_and_mxn_rejects_it() {
        let mut usd = draft(EntryType::Discount, -1_000);
        usd.currency = Currency::Usd;
        assert!(matches!(usd.clone().validate(), Err(AppError::MissingExchangeRate)));

        usd.exchange_rate_used = Some(Decimal::new(1725, 2));
        assert!(usd.validate().is_ok());

        let mut mxn = draft(EntryType::Discount, -1_000);
        mxn.exchange_rate_used = Some(Decimal::ONE);
        assert!(matches!(mxn.validate(), Err(AppError::UnexpectedExchangeRate)));
    }

    #[test]
    fn payment_requires_method() {
        assert!(matches!(
            draft(EntryType::Payment, 1_000).validate(),
            Err(AppError::MissingPaymentMethod)
        ));
        let mut p = draft(EntryType::Payment, 1_000);
        p.payment_method = Some(PaymentMethod::Card);
        assert_eq!(
            p.validate().unwrap().payment_method(),
            Some(PaymentMethod::Card)
        );
    }

    #[test]
    fn discount_rejects_payment_method_and_doctor_data() {
        let mut d = draft(EntryType::Discount, -100);
        d.payment_method = Some(PaymentMethod::Cash);
        assert!(matches!(d.validate(), Err(AppError::UnexpectedPaymentMethod)));

        let mut d = draft(EntryType::Discount, -100);
        d.doctor_id = Some(Uuid::new_v4());
        assert!(matches!(d.validate(), Err(AppError::InvalidDoctorFee(_))));
    }

    #[test]
    fn correction_needs_reference() {
        assert!(matches!(
            draft(EntryType::Correction, -100).validate(),
            Err(AppError::MissingField("correctsEntryId"))
        ));
    }

    #[test]
    fn correction_must_oppose_the_original_and_inherits_method() {
        let account_id = Uuid::new_v4();
        let original = stored(account_id, EntryType::Payment, 300_000);

        let mut same_sign = draft(EntryType::Correction, 50_000);
        same_sign.corrects_entry_id = Some(original.id);
        let mut entry = same_sign.validate().unwrap();
        assert!(matches!(
            entry.resolve_correction(account_id, &original),
            Err(AppError::AmountSignMismatch(_))
        ));

        let mut opposite = draft(EntryType::Correction, -50_000);
        opposite.corrects_entry_id = Some(original.id);
        let mut entry = opposite.validate().unwrap();
        entry.resolve_correction(account_id, &original).unwrap();
        assert_eq!(entry.payment_method(), Some(PaymentMethod::Cash));
    }

    #[test]
    fn correction_from_another_account_is_rejected() {
        let original = stored(Uuid::new_v4(), EntryType::Payment, 1_000);
        let mut d = draft(EntryType::Correction, -1_000);
        d.corrects_entry_id = Some(original.id);
        let mut entry = d.validate().unwrap();
        assert!(matches!(
            entry.resolve_correction(Uuid::new_v4(), &original),
            Err(AppError::InvalidCorrection(_))
        ));
    }

    #[test]
    fn currency_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Currency::Mxn).unwrap(), "\"MXN\"");
        let parsed: Currency = serde_json::from_str("\"USD\"").unwrap();
        assert_eq!(parsed, Currency::Usd);
        assert!(serde_json::from_str::<Currency>("\"EUR\"").is_err());
    }
}
