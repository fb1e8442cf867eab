// src/services/reconciliation_service.rs

use std::collections::{BTreeMap, BTreeSet};

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{CashRepository, LedgerRepository},
    models::{
        cash::{CountOutcome, MethodCurrency, Reconciliation, ReconciliationStatus},
        ledger::{AccountEntry, Currency, PaymentMethod},
    },
};

// =============================================================================
//  CÁLCULOS (dobras sobre os lançamentos da sessão)
// =============================================================================

/// Soma com sinal dos lançamentos da sessão com esta forma e moeda.
pub fn expected_amount(entries: &[AccountEntry], method: PaymentMethod, currency: Currency) -> i64 {
    entries
        .iter()
        .filter(|e| e.payment_method == Some(method) && e.currency == currency)
        .map(|e| e.amount_cents)
        .sum()
}

/// Dinheiro esperado na gaveta, por moeda.
pub fn expected_cash(entries: &[AccountEntry]) -> BTreeMap<Currency, i64> {
    entries
        .iter()
        .filter(|e| e.payment_method == Some(PaymentMethod::Cash))
        .fold(BTreeMap::new(), |mut acc, e| {
            *acc.entry(e.currency).or_insert(0) += e.amount_cents;
            acc
        })
}

pub fn present_combinations(entries: &[AccountEntry]) -> BTreeSet<MethodCurrency> {
    entries
        .iter()
        .filter_map(|e| {
            e.payment_method.map(|payment_method| MethodCurrency {
                payment_method,
                currency: e.currency,
            })
        })
        .collect()
}

/// Combinações presentes nos lançamentos que ainda não têm corte.
pub fn pending_combinations(
    entries: &[AccountEntry],
    reconciliations: &[Reconciliation],
) -> Vec<MethodCurrency> {
    let done: BTreeSet<MethodCurrency> = reconciliations
        .iter()
        .map(|r| MethodCurrency { payment_method: r.payment_method, currency: r.currency })
        .collect();

    present_combinations(entries)
        .into_iter()
        .filter(|c| !done.contains(c))
        .collect()
}

// =============================================================================
//  SERVIÇO
// =============================================================================

/// Contagem informada pelo caixa.
#[derive(Debug, Clone)]
pub struct CountInput {
    pub payment_method: PaymentMethod,
    pub currency: Currency,
    pub actual_amount_cents: i64,
    pub float_left_cents: i64,
    pub envelope_id: Option<String>,
    pub notes: Option<String>,
}

#[derive(Clone)]
pub struct ReconciliationService {
    pool: PgPool,
    cash_repo: CashRepository,
    ledger_repo: LedgerRepository,
}

impl ReconciliationService {
    pub fn new(pool: PgPool, cash_repo: CashRepository, ledger_repo: LedgerRepository) -> Self {
        Self { pool, cash_repo, ledger_repo }
    }

    async fn session_entries(
        &self,
        organization_id: Uuid,
        session_id: Uuid,
    ) -> Result<Vec<AccountEntry>, AppError> {
        let mut conn = self.pool.acquire().await?;

        self.cash_repo
            .find_session(&mut *conn, organization_id, session_id)
            .await?
            .ok_or(AppError::CashSessionNotFound)?;

        self.ledger_repo.list_by_session(&mut *conn, session_id).await
    }

    pub async fn calculate_expected_cash(
        &self,
        organization_id: Uuid,
        session_id: Uuid,
    ) -> Result<BTreeMap<Currency, i64>, AppError> {
        let entries = self.session_entries(organization_id, session_id).await?;
        Ok(expected_cash(&entries))
    }

    pub async fn expected_amount(
        &self,
        organization_id: Uuid,
        session_id: Uuid,
        method: PaymentMethod,
        currency: Currency,
    ) -> Result<i64, AppError> {
        let entries = self.session_entries(organization_id, session_id).await?;
        Ok(expected_amount(&entries, method, currency))
    }

    pub async fn pending_combinations(
        &self,
        organization_id: Uuid,
        session_id: Uuid,
    ) -> Result<Vec<MethodCurrency>, AppError> {
        let mut conn = self.pool.acquire().await?;

        self.cash_repo
            .find_session(&mut *conn, organization_id, session_id)
            .await?
            .ok_or(AppError::CashSessionNotFound)?;

        let entries = self.ledger_repo.list_by_session(&mut *conn, session_id).await?;
        let reconciliations = self.cash_repo.list_reconciliations(&mut *conn, session_id).await?;
        Ok(pending_combinations(&entries, &reconciliations))
    }

    pub async fn create_reconciliation(
        &self,
        organization_id: Uuid,
        user_id: Uuid,
        session_id: Uuid,
        count: CountInput,
    ) -> Result<Reconciliation, AppError> {
        let mut tx = self.pool.begin().await?;

        // 1. Sessão travada e aberta
        let session = self
            .cash_repo
            .find_session_for_update(&mut *tx, organization_id, session_id)
            .await?
            .ok_or(AppError::CashSessionNotFound)?;
        session.ensure_open()?;

        // 2. Esperado x contado
        let entries = self.ledger_repo.list_by_session(&mut *tx, session.id).await?;
        let expected = expected_amount(&entries, count.payment_method, count.currency);
        let outcome = CountOutcome::compute(
            count.payment_method,
            expected,
            count.actual_amount_cents,
            count.float_left_cents,
        )?;

        // 3. Uma linha por (sessão, forma, moeda)
        let reconciliation = self
            .cash_repo
            .insert_reconciliation(
                &mut *tx,
                &session,
                count.payment_method,
                count.currency,
                user_id,
                &outcome,
                count.envelope_id.as_deref(),
                count.notes.as_deref(),
            )
            .await?;

        tx.commit().await?;

        if outcome.discrepancy_cents != 0 {
            tracing::warn!(
                "⚠️ Corte {} do caixa {} com diferença de {} {}",
                reconciliation.id,
                session.id,
                outcome.discrepancy_cents,
                count.currency.as_str()
            );
        } else {
            tracing::info!("✅ Corte {} do caixa {} conferido", reconciliation.id, session.id);
        }
        Ok(reconciliation)
    }

    pub async fn dispute_reconciliation(
        &self,
        organization_id: Uuid,
        reconciliation_id: Uuid,
        notes: Option<&str>,
    ) -> Result<Reconciliation, AppError> {
        let mut tx = self.pool.begin().await?;

        let current = self
            .cash_repo
            .find_reconciliation_for_update(&mut *tx, organization_id, reconciliation_id)
            .await?
            .ok_or(AppError::ReconciliationNotFound)?;

        match current.status {
            ReconciliationStatus::Disputed => return Err(AppError::ReconciliationAlreadyDisputed),
            ReconciliationStatus::Pending | ReconciliationStatus::Closed => {}
        }

        let disputed = self
            .cash_repo
            .mark_disputed(&mut *tx, current.id, notes)
            .await?;

        tx.commit().await?;

        tracing::warn!("⚠️ Corte {} contestado", disputed.id);
        Ok(disputed)
    }

    pub async fn list_reconciliations(
        &self,
        organization_id: Uuid,
        session_id: Uuid,
    ) -> Result<Vec<Reconciliation>, AppError> {
        let mut conn = self.pool.acquire().await?;

        self.cash_repo
            .find_session(&mut *conn, organization_id, session_id)
            .await?
            .ok_or(AppError::CashSessionNotFound)?;

        self.cash_repo.list_reconciliations(&mut *conn, session_id).await
    }
}
