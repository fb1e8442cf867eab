// src/services/cash_session_service.rs

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{CashRepository, DirectoryRepository, LedgerRepository},
    models::cash::{CashSession, CashSessionStatus, OpeningType},
    services::reconciliation_service::pending_combinations,
};

#[derive(Clone)]
pub struct CashSessionService {
    pool: PgPool,
    cash_repo: CashRepository,
    ledger_repo: LedgerRepository,
    directory_repo: DirectoryRepository,
}

impl CashSessionService {
    pub fn new(
        pool: PgPool,
        cash_repo: CashRepository,
        ledger_repo: LedgerRepository,
        directory_repo: DirectoryRepository,
    ) -> Self {
        Self {
            pool,
            cash_repo,
            ledger_repo,
            directory_repo,
        }
    }

    pub async fn open_session(
        &self,
        organization_id: Uuid,
        clinic_id: Uuid,
        user_id: Uuid,
        opening_type: OpeningType,
        starting_float_cents: i64,
        notes: Option<&str>,
    ) -> Result<CashSession, AppError> {
        if starting_float_cents < 0 {
            return Err(AppError::InvalidStartingFloat);
        }

        let mut tx = self.pool.begin().await?;

        if !self
            .directory_repo
            .clinic_exists(&mut *tx, organization_id, clinic_id)
            .await?
        {
            return Err(AppError::ClinicNotFound);
        }

        if self
            .cash_repo
            .find_open_session(&mut *tx, organization_id, clinic_id, user_id)
            .await?
            .is_some()
        {
            return Err(AppError::CashSessionAlreadyOpen);
        }

        // Duas aberturas simultâneas: o índice parcial barra a segunda
        let session = self
            .cash_repo
            .insert_session(
                &mut *tx,
                organization_id,
                clinic_id,
                user_id,
                opening_type,
                starting_float_cents,
                notes,
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            "🏦 Caixa {} aberto por {} na clínica {} (fundo {})",
            session.id,
            user_id,
            clinic_id,
            starting_float_cents
        );
        Ok(session)
    }

    pub async fn get_or_create_open_session(
        &self,
        organization_id: Uuid,
        clinic_id: Uuid,
        user_id: Uuid,
    ) -> Result<CashSession, AppError> {
        let mut tx = self.pool.begin().await?;

        if !self
            .directory_repo
            .clinic_exists(&mut *tx, organization_id, clinic_id)
            .await?
        {
            return Err(AppError::ClinicNotFound);
        }

        let session = self
            .get_or_create_in(&mut *tx, organization_id, clinic_id, user_id)
            .await?;

        tx.commit().await?;
        Ok(session)
    }

    /// Mesma operação dentro de uma transação do chamador (usada pelo livro-razão).
    pub(crate) async fn get_or_create_in(
        &self,
        conn: &mut PgConnection,
        organization_id: Uuid,
        clinic_id: Uuid,
        user_id: Uuid,
    ) -> Result<CashSession, AppError> {
        // 1. Já existe? Trava para que não feche antes do lançamento entrar
        if let Some(open) = self
            .cash_repo
            .find_open_session_for_update(&mut *conn, organization_id, clinic_id, user_id)
            .await?
        {
            return Ok(open);
        }

        // 2. Abre automaticamente; se outra requisição abriu antes, relê a dela
        match self
            .cash_repo
            .insert_auto_session_if_absent(&mut *conn, organization_id, clinic_id, user_id)
            .await?
        {
            Some(created) => {
                tracing::info!(
                    "🏦 Caixa {} aberto automaticamente para {} na clínica {}",
                    created.id,
                    user_id,
                    clinic_id
                );
                Ok(created)
            }
            None => self
                .cash_repo
                .find_open_session_for_update(&mut *conn, organization_id, clinic_id, user_id)
                .await?
                .ok_or(AppError::CashSessionNotFound),
        }
    }

    pub async fn get_current_session(
        &self,
        organization_id: Uuid,
        clinic_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<CashSession>, AppError> {
        self.cash_repo
            .find_open_session(&self.pool, organization_id, clinic_id, user_id)
            .await
    }

    pub async fn list_sessions(
        &self,
        organization_id: Uuid,
        clinic_id: Uuid,
    ) -> Result<Vec<CashSession>, AppError> {
        self.cash_repo.list_sessions(organization_id, clinic_id).await
    }

    /// Fecha a sessão. Toda combinação forma × moeda presente nos lançamentos
    /// precisa de corte antes do fechamento.
    pub async fn close_session(
        &self,
        organization_id: Uuid,
        session_id: Uuid,
        closing_notes: Option<&str>,
    ) -> Result<CashSession, AppError> {
        let mut tx = self.pool.begin().await?;

        // 1. Trava a sessão
        let session = self
            .cash_repo
            .find_session_for_update(&mut *tx, organization_id, session_id)
            .await?
            .ok_or(AppError::CashSessionNotFound)?;

        match session.status {
            CashSessionStatus::Open => {}
            CashSessionStatus::Closed => return Err(AppError::CashSessionAlreadyClosed),
        }

        // 2. Cortes pendentes?
        let entries = self.ledger_repo.list_by_session(&mut *tx, session.id).await?;
        let reconciliations = self.cash_repo.list_reconciliations(&mut *tx, session.id).await?;
        let missing = pending_combinations(&entries, &reconciliations);
        if !missing.is_empty() {
            let labels: Vec<String> = missing.iter().map(|c| c.label()).collect();
            tracing::warn!("⚠️ Caixa {} sem corte para {:?}", session.id, labels);
            return Err(AppError::CashSessionUnreconciled(labels));
        }

        // 3. Fecha
        let closed = self
            .cash_repo
            .close_session(&mut *tx, session.id, closing_notes)
            .await?;

        tx.commit().await?;

        tracing::info!("🔒 Caixa {} fechado", closed.id);
        Ok(closed)
    }
}
