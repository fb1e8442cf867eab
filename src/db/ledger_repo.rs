// src/db/ledger_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::ledger::{AccountEntry, AppointmentAccount, ValidatedEntry},
};

#[derive(Clone)]
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  CONTAS
    // =========================================================================

    /// Cria a conta da consulta na primeira chamada; nas seguintes devolve a existente.
    pub async fn get_or_create_account<'e, E>(
        &self,
        executor: E,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<AppointmentAccount, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // O "DO UPDATE" vazio garante o RETURNING também no caso de conflito
        let account = sqlx::query_as::<_, AppointmentAccount>(
            r#"
            INSERT INTO appointment_accounts (organization_id, appointment_id)
            VALUES ($1, $2)
            ON CONFLICT (appointment_id)
            DO UPDATE SET appointment_id = EXCLUDED.appointment_id
            RETURNING *
            "#,
        )
        .bind(organization_id)
        .bind(appointment_id)
        .fetch_one(executor)
        .await?;

        Ok(account)
    }

    pub async fn find_account_by_appointment<'e, E>(
        &self,
        executor: E,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Option<AppointmentAccount>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let account = sqlx::query_as::<_, AppointmentAccount>(
            "SELECT * FROM appointment_accounts WHERE appointment_id = $1 AND organization_id = $2",
        )
        .bind(appointment_id)
        .bind(organization_id)
        .fetch_optional(executor)
        .await?;

        Ok(account)
    }

    // =========================================================================
    //  LANÇAMENTOS (somente inserção)
    // =========================================================================

    pub async fn insert_entry<'e, E>(
        &self,
        executor: E,
        account_id: Uuid,
        created_by: Uuid,
        entry: &ValidatedEntry,
    ) -> Result<AccountEntry, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (doctor_id, doctor_type, commission_pct, external_fee_cents) = entry.doctor_columns();

        let inserted = sqlx::query_as::<_, AccountEntry>(
            r#"
            INSERT INTO appointment_account_entries (
                account_id, entry_type, currency, amount_cents, description, created_by,
                payment_method, exchange_rate_used,
                doctor_id, doctor_type, commission_pct, external_doctor_fee_cents,
                corrects_entry_id, is_sensitive,
                service_id, quantity, unit_price_cents, notes, cash_session_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(entry.entry_type())
        .bind(entry.currency)
        .bind(entry.amount_cents)
        .bind(&entry.description)
        .bind(created_by)
        .bind(entry.payment_method())
        .bind(entry.exchange_rate_used)
        .bind(doctor_id)
        .bind(doctor_type)
        .bind(commission_pct)
        .bind(external_fee_cents)
        .bind(entry.corrects_entry_id())
        .bind(entry.is_sensitive)
        .bind(entry.service_id)
        .bind(entry.quantity)
        .bind(entry.unit_price_cents)
        .bind(&entry.notes)
        .bind(entry.cash_session_id)
        .fetch_one(executor)
        .await?;

        Ok(inserted)
    }

    pub async fn find_entry<'e, E>(
        &self,
        executor: E,
        entry_id: Uuid,
    ) -> Result<Option<AccountEntry>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let entry = sqlx::query_as::<_, AccountEntry>(
            "SELECT * FROM appointment_account_entries WHERE id = $1",
        )
        .bind(entry_id)
        .fetch_optional(executor)
        .await?;

        Ok(entry)
    }

    /// Sequência ordenada da conta (base de todos os saldos).
    pub async fn list_by_account<'e, E>(
        &self,
        executor: E,
        account_id: Uuid,
    ) -> Result<Vec<AccountEntry>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let entries = sqlx::query_as::<_, AccountEntry>(
            r#"
            SELECT * FROM appointment_account_entries
            WHERE account_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(account_id)
        .fetch_all(executor)
        .await?;

        Ok(entries)
    }

    pub async fn list_by_session<'e, E>(
        &self,
        executor: E,
        cash_session_id: Uuid,
    ) -> Result<Vec<AccountEntry>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let entries = sqlx::query_as::<_, AccountEntry>(
            r#"
            SELECT * FROM appointment_account_entries
            WHERE cash_session_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(cash_session_id)
        .fetch_all(executor)
        .await?;

        Ok(entries)
    }

    /// Leitura fora de transação, para as telas de extrato.
    pub async fn list_for_appointment(
        &self,
        organization_id: Uuid,
        appointment_id: Uuid,
    ) -> Result<Vec<AccountEntry>, AppError> {
        let entries = sqlx::query_as::<_, AccountEntry>(
            r#"
            SELECT e.* FROM appointment_account_entries e
            JOIN appointment_accounts a ON a.id = e.account_id
            WHERE a.appointment_id = $1 AND a.organization_id = $2
            ORDER BY e.created_at ASC, e.id ASC
            "#,
        )
        .bind(appointment_id)
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}
