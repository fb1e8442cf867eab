// src/db/cash_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::{map_constraint_violation, AppError},
    models::{
        cash::{CashSession, CountOutcome, OpeningType, Reconciliation},
        ledger::{Currency, PaymentMethod},
    },
};

#[derive(Clone)]
pub struct CashRepository {
    pool: PgPool,
}

impl CashRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  SESSÕES DE CAIXA
    // =========================================================================

    /// O índice parcial `uq_cash_sessions_open_per_user_clinic` barra a segunda sessão aberta.
    pub async fn insert_session<'e, E>(
        &self,
        executor: E,
        organization_id: Uuid,
        clinic_id: Uuid,
        user_id: Uuid,
        opening_type: OpeningType,
        starting_float_cents: i64,
        notes: Option<&str>,
    ) -> Result<CashSession, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, CashSession>(
            r#"
            INSERT INTO cash_sessions (
                organization_id, clinic_id, user_id, starting_float_cents, status, opening_type, notes
            )
            VALUES ($1, $2, $3, $4, 'open', $5, $6)
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(clinic_id)
        .bind(user_id)
        .bind(starting_float_cents)
        .bind(opening_type)
        .bind(notes)
        .fetch_one(executor)
        .await
        .map_err(map_constraint_violation)
    }

    /// Abertura automática. `None` quando outra requisição abriu primeiro.
    pub async fn insert_auto_session_if_absent<'e, E>(
        &self,
        executor: E,
        organization_id: Uuid,
        clinic_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<CashSession>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let session = sqlx::query_as::<_, CashSession>(
            r#"
            INSERT INTO cash_sessions (
                organization_id, clinic_id, user_id, starting_float_cents, status, opening_type
            )
            VALUES ($1, $2, $3, 0, 'open', 'auto')
            ON CONFLICT (user_id, clinic_id) WHERE status = 'open' DO NOTHING
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(clinic_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(session)
    }

    pub async fn find_open_session<'e, E>(
        &self,
        executor: E,
        organization_id: Uuid,
        clinic_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<CashSession>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let session = sqlx::query_as::<_, CashSession>(
            r#"
            SELECT * FROM cash_sessions
            WHERE organization_id = $1 AND clinic_id = $2 AND user_id = $3 AND status = 'open'
            "#,
        )
        .bind(organization_id)
        .bind(clinic_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(session)
    }

    /// Igual a `find_open_session`, mas trava a linha até o fim da transação.
    /// Se um fechamento concorrente vencer, a sessão deixa de ser encontrada.
    pub async fn find_open_session_for_update<'e, E>(
        &self,
        executor: E,
        organization_id: Uuid,
        clinic_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<CashSession>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let session = sqlx::query_as::<_, CashSession>(
            r#"
            SELECT * FROM cash_sessions
            WHERE organization_id = $1 AND clinic_id = $2 AND user_id = $3 AND status = 'open'
            FOR UPDATE
            "#,
        )
        .bind(organization_id)
        .bind(clinic_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(session)
    }

    pub async fn find_session<'e, E>(
        &self,
        executor: E,
        organization_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<CashSession>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let session = sqlx::query_as::<_, CashSession>(
            "SELECT * FROM cash_sessions WHERE id = $1 AND organization_id = $2",
        )
        .bind(session_id)
        .bind(organization_id)
        .fetch_optional(executor)
        .await?;

        Ok(session)
    }

    /// Trava a sessão: fechamento e cortes concorrentes passam um de cada vez.
    pub async fn find_session_for_update<'e, E>(
        &self,
        executor: E,
        organization_id: Uuid,
        session_id: Uuid,
    ) -> Result<Option<CashSession>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let session = sqlx::query_as::<_, CashSession>(
            "SELECT * FROM cash_sessions WHERE id = $1 AND organization_id = $2 FOR UPDATE",
        )
        .bind(session_id)
        .bind(organization_id)
        .fetch_optional(executor)
        .await?;

        Ok(session)
    }

    pub async fn close_session<'e, E>(
        &self,
        executor: E,
        session_id: Uuid,
        closing_notes: Option<&str>,
    ) -> Result<CashSession, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let session = sqlx::query_as::<_, CashSession>(
            r#"
            UPDATE cash_sessions
            SET status = 'closed', closed_at = NOW(), closing_notes = $2
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(session_id)
        .bind(closing_notes)
        .fetch_one(executor)
        .await?;

        Ok(session)
    }

    // =========================================================================
    //  CORTES DE CAIXA
    // =========================================================================

    #[allow(clippy::too_many_arguments)]
    pub async fn insert_reconciliation<'e, E>(
        &self,
        executor: E,
        session: &CashSession,
        payment_method: PaymentMethod,
        currency: Currency,
        reconciled_by: Uuid,
        outcome: &CountOutcome,
        envelope_id: Option<&str>,
        notes: Option<&str>,
    ) -> Result<Reconciliation, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, Reconciliation>(
            r#"
            INSERT INTO reconciliations (
                cash_session_id, clinic_id, organization_id, payment_method, currency,
                reconciled_by, expected_amount_cents, actual_amount_cents, float_left_cents,
                deposited_cents, discrepancy_cents, envelope_id, status, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(session.id)
        .bind(session.clinic_id)
        .bind(session.organization_id)
        .bind(payment_method)
        .bind(currency)
        .bind(reconciled_by)
        .bind(outcome.expected_amount_cents)
        .bind(outcome.actual_amount_cents)
        .bind(outcome.float_left_cents)
        .bind(outcome.deposited_cents)
        .bind(outcome.discrepancy_cents)
        .bind(envelope_id)
        .bind(outcome.status)
        .bind(notes)
        .fetch_one(executor)
        .await
        .map_err(map_constraint_violation)
    }

    pub async fn list_reconciliations<'e, E>(
        &self,
        executor: E,
        session_id: Uuid,
    ) -> Result<Vec<Reconciliation>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, Reconciliation>(
            r#"
            SELECT * FROM reconciliations
            WHERE cash_session_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(executor)
        .await?;

        Ok(rows)
    }

    pub async fn find_reconciliation_for_update<'e, E>(
        &self,
        executor: E,
        organization_id: Uuid,
        reconciliation_id: Uuid,
    ) -> Result<Option<Reconciliation>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, Reconciliation>(
            "SELECT * FROM reconciliations WHERE id = $1 AND organization_id = $2 FOR UPDATE",
        )
        .bind(reconciliation_id)
        .bind(organization_id)
        .fetch_optional(executor)
        .await?;

        Ok(row)
    }

    pub async fn mark_disputed<'e, E>(
        &self,
        executor: E,
        reconciliation_id: Uuid,
        notes: Option<&str>,
    ) -> Result<Reconciliation, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let row = sqlx::query_as::<_, Reconciliation>(
            r#"
            UPDATE reconciliations
            SET status = 'disputed', notes = COALESCE($2, notes)
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(reconciliation_id)
        .bind(notes)
        .fetch_one(executor)
        .await?;

        Ok(row)
    }

    /// Histórico de sessões da clínica, mais recentes primeiro.
    pub async fn list_sessions(
        &self,
        organization_id: Uuid,
        clinic_id: Uuid,
    ) -> Result<Vec<CashSession>, AppError> {
        let sessions = sqlx::query_as::<_, CashSession>(
            r#"
            SELECT * FROM cash_sessions
            WHERE organization_id = $1 AND clinic_id = $2
            ORDER BY opened_at DESC
            "#,
        )
        .bind(organization_id)
        .bind(clinic_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }
}
