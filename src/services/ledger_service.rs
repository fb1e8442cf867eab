// src/services/ledger_service.rs

use std::collections::{BTreeMap, HashMap};

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{AppointmentRepository, CashRepository, LedgerRepository},
    middleware::auth::AuthContext,
    models::ledger::{
        AccountBalance, AccountEntry, Currency, CurrencyBalance, EntryDraft, EntryType,
        PaymentMethod,
    },
    services::cash_session_service::CashSessionService,
};

#[derive(Clone)]
pub struct LedgerService {
    pool: PgPool,
    ledger_repo: LedgerRepository,
    appointment_repo: AppointmentRepository,
    cash_repo: CashRepository,
    cash_sessions: CashSessionService,
}

impl LedgerService {
    pub fn new(
        pool: PgPool,
        ledger_repo: LedgerRepository,
        appointment_repo: AppointmentRepository,
        cash_repo: CashRepository,
        cash_sessions: CashSessionService,
    ) -> Self {
        Self {
            pool,
            ledger_repo,
            appointment_repo,
            cash_repo,
            cash_sessions,
        }
    }

    /// Acrescenta um lançamento à conta da consulta. Tudo ou nada: conta,
    /// abertura automática de caixa e o lançamento entram na mesma transação.
    pub async fn create_entry(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        appointment_id: Uuid,
        draft: EntryDraft,
    ) -> Result<AccountEntry, AppError> {
        // 1. Regras locais (valor, sinal, câmbio, forma de pagamento, médico)
        let mut entry = draft.validate()?;

        let mut tx = self.pool.begin().await?;

        // 2. Consulta e conta (criada sob demanda)
        let appointment = self
            .appointment_repo
            .find_by_id(&mut *tx, organization_id, appointment_id)
            .await?
            .ok_or(AppError::AppointmentNotFound)?;

        let account = self
            .ledger_repo
            .get_or_create_account(&mut *tx, organization_id, appointment.id)
            .await?;

        // 3. Correção: confere contra o original
        if let Some(corrected_id) = entry.corrects_entry_id() {
            let corrected = self
                .ledger_repo
                .find_entry(&mut *tx, corrected_id)
                .await?
                .ok_or(AppError::EntryNotFound)?;
            entry.resolve_correction(account.id, &corrected)?;
        }

        // 4. Sessão de caixa
        match (entry.cash_session_id, entry.payment_method()) {
            (Some(session_id), _) => {
                let session = self
                    .cash_repo
                    .find_session_for_update(&mut *tx, organization_id, session_id)
                    .await?
                    .filter(|s| s.clinic_id == appointment.clinic_id)
                    .ok_or(AppError::CashSessionNotFound)?;
                session.ensure_open()?;
            }
            (None, Some(PaymentMethod::Cash)) => {
                let session = self
                    .cash_sessions
                    .get_or_create_in(&mut *tx, organization_id, appointment.clinic_id, user_id)
                    .await?;
                entry.cash_session_id = Some(session.id);
            }
            (None, Some(PaymentMethod::Card | PaymentMethod::Transfer) | None) => {}
        }

        // 5. Grava (somente inserção)
        let inserted = self
            .ledger_repo
            .insert_entry(&mut *tx, account.id, user_id, &entry)
            .await?;

        tx.commit().await?;

        tracing::info!(
            "💰 Lançamento {} ({}, {} {}) na conta da consulta {}",
            inserted.id,
            inserted.entry_type.as_str(),
            inserted.amount_cents,
            inserted.currency.as_str(),
            appointment.id
        );
        Ok(inserted)
    }

    /// Extrato da consulta. Lançamentos sensíveis só para administradores.
    pub async fn list_entries(
        &self,
        auth: &AuthContext,
        appointment_id: Uuid,
    ) -> Result<Vec<AccountEntry>, AppError> {
        self.appointment_repo
            .find_by_id(&self.pool, auth.organization_id, appointment_id)
            .await?
            .ok_or(AppError::AppointmentNotFound)?;

        let entries = self
            .ledger_repo
            .list_for_appointment(auth.organization_id, appointment_id)
            .await?;

        Ok(visible_entries(entries, auth.is_admin()))
    }

    pub async fn get_account_balance(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<AccountBalance, AppError> {
        let mut conn = self.pool.acquire().await?;

        self.appointment_repo
            .find_by_id(&mut *conn, organization_id, appointment_id)
            .await?
            .ok_or(AppError::AppointmentNotFound)?;

        // Sem conta ainda = sem lançamentos
        let Some(account) = self
            .ledger_repo
            .find_account_by_appointment(&mut *conn, organization_id, appointment_id)
            .await?
        else {
            return Ok(AccountBalance { appointment_id, account_id: None, balances: Vec::new() });
        };

        let entries = self.ledger_repo.list_by_account(&mut *conn, account.id).await?;

        Ok(AccountBalance {
            appointment_id,
            account_id: Some(account.id),
            balances: fold_balances(&entries),
        })
    }
}

pub fn visible_entries(entries: Vec<AccountEntry>, can_see_sensitive: bool) -> Vec<AccountEntry> {
    if can_see_sensitive {
        return entries;
    }
    entries.into_iter().filter(|e| !e.is_sensitive).collect()
}

/// Tipo "efetivo" de um lançamento: correções assumem o tipo de quem corrigem.
fn effective_type(entry: &AccountEntry, by_id: &HashMap<Uuid, &AccountEntry>) -> EntryType {
    let mut current = entry;
    // Cadeias de correção são finitas (cada uma aponta para uma anterior)
    for _ in 0..by_id.len() {
        match (current.entry_type, current.corrects_entry_id) {
            (EntryType::Correction, Some(target)) => match by_id.get(&target) {
                Some(next) => current = next,
                None => break,
            },
            _ => break,
        }
    }
    current.entry_type
}

/// Saldo por moeda como dobra sobre a sequência ordenada de lançamentos.
pub fn fold_balances(entries: &[AccountEntry]) -> Vec<CurrencyBalance> {
    let by_id: HashMap<Uuid, &AccountEntry> = entries.iter().map(|e| (e.id, e)).collect();

    let totals = entries.iter().fold(
        BTreeMap::<Currency, CurrencyBalance>::new(),
        |mut acc, entry| {
            let balance = acc
                .entry(entry.currency)
                .or_insert_with(|| CurrencyBalance::empty(entry.currency));

            balance.net_cents += entry.amount_cents;
            match effective_type(entry, &by_id) {
                EntryType::ServiceCharge => balance.charged_cents += entry.amount_cents,
                EntryType::Discount => balance.discount_cents += entry.amount_cents,
                EntryType::Payment => balance.paid_cents += entry.amount_cents,
                EntryType::Refund => balance.refunded_cents += entry.amount_cents,
                // Correção órfã: só entra no líquido
                EntryType::Correction => {}
            }
            acc
        },
    );

    totals
        .into_values()
        .map(|mut b| {
            b.outstanding_cents =
                (b.charged_cents + b.discount_cents) - (b.paid_cents + b.refunded_cents);
            b
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn entry(entry_type: EntryType, currency: Currency, amount_cents: i64) -> AccountEntry {
        AccountEntry {
            id: Uuid::new_v4(),
            account_id: Uuid::nil(),
            entry_type,
            currency,
            amount_cents,
            description: "x".into(),
            created_by: Uuid::new_v4(),
            created_at: Utc::now(),
            payment_method: None,
            exchange_rate_used: match currency {
                Currency::Usd => Some(Decimal::new(1725, 2)),
                Currency::Mxn => None,
            },
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

    fn correction_of(target: &AccountEntry, amount_cents: i64) -> AccountEntry {
        let mut e = entry(EntryType::Correction, target.currency, amount_cents);
        e.corrects_entry_id = Some(target.id);
        e
    }

    #[test]
    fn balance_is_computed_per_currency() {
        let entries = vec![
            entry(EntryType::ServiceCharge, Currency::Mxn, 300_000),
            entry(EntryType::Discount, Currency::Mxn, -30_000),
            entry(EntryType::Payment, Currency::Mxn, 200_000),
            entry(EntryType::Payment, Currency::Usd, 5_000),
        ];

        let balances = fold_balances(&entries);
        assert_eq!(balances.len(), 2);

        let mxn = balances[0];
        assert_eq!(mxn.currency, Currency::Mxn);
        assert_eq!(mxn.charged_cents, 300_000);
        assert_eq!(mxn.paid_cents, 200_000);
        assert_eq!(mxn.outstanding_cents, 70_000);
        assert_eq!(mxn.net_cents, 470_000);

        let usd = balances[1];
        assert_eq!(usd.currency, Currency::Usd);
        assert_eq!(usd.paid_cents, 5_000);
        assert_eq!(usd.outstanding_cents, -5_000);
    }

    #[test]
    fn corrections_land_on_the_corrected_side() {
        let charge = entry(EntryType::ServiceCharge, Currency::Mxn, 100_000);
        let payment = entry(EntryType::Payment, Currency::Mxn, 100_000);
        let fix_charge = correction_of(&charge, -20_000);
        let fix_payment = correction_of(&payment, -100_000);
        let fix_fix = correction_of(&fix_payment, 100_000);

        let balances = fold_balances(&[charge, payment, fix_charge, fix_payment, fix_fix]);
        let mxn = balances[0];
        assert_eq!(mxn.charged_cents, 80_000);
        assert_eq!(mxn.paid_cents, 100_000);
        assert_eq!(mxn.outstanding_cents, -20_000);
    }

    #[test]
    fn empty_account_has_no_balances() {
        assert!(fold_balances(&[]).is_empty());
    }

    #[test]
    fn sensitive_entries_are_hidden_from_non_admins() {
        let mut secret = entry(EntryType::Discount, Currency::Mxn, -10_000);
        secret.is_sensitive = true;
        let public = entry(EntryType::ServiceCharge, Currency::Mxn, 50_000);

        let visible = visible_entries(vec![secret.clone(), public.clone()], false);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, public.id);

        assert_eq!(visible_entries(vec![secret, public], true).len(), 2);
    }
}
