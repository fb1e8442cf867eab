// src/config.rs

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{env, sync::Arc, time::Duration};

use crate::{
    common::i18n::I18nStore,
    db::{
        AppointmentRepository, AvailabilityRepository, CashRepository, DirectoryRepository,
        LedgerRepository,
    },
    services::{CashSessionService, LedgerService, ReconciliationService, SchedulingService},
};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 3;

/// Configuração lida do ambiente (e do `.env`, se existir).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = lookup("JWT_SECRET").context("JWT_SECRET deve ser definido")?;

        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let db_max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("DB_MAX_CONNECTIONS inválido: {raw}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let acquire_secs = match lookup("DB_ACQUIRE_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("DB_ACQUIRE_TIMEOUT_SECS inválido: {raw}"))?,
            None => DEFAULT_ACQUIRE_TIMEOUT_SECS,
        };

        Ok(Self {
            database_url,
            jwt_secret,
            bind_addr,
            db_max_connections,
            db_acquire_timeout: Duration::from_secs(acquire_secs),
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_secret: String,
    pub i18n_store: Arc<I18nStore>,
    pub scheduling_service: SchedulingService,
    pub ledger_service: LedgerService,
    pub cash_session_service: CashSessionService,
    pub reconciliation_service: ReconciliationService,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(config.db_acquire_timeout)
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Ok(Self::from_pool(db_pool, config.jwt_secret.clone()))
    }

    /// Monta o gráfico de dependências sobre um pool já aberto.
    pub fn from_pool(db_pool: PgPool, jwt_secret: String) -> Self {
        let appointment_repo = AppointmentRepository::new(db_pool.clone());
        let availability_repo = AvailabilityRepository::new();
        let directory_repo = DirectoryRepository::new();
        let ledger_repo = LedgerRepository::new(db_pool.clone());
        let cash_repo = CashRepository::new(db_pool.clone());

        let scheduling_service = SchedulingService::new(
            db_pool.clone(),
            appointment_repo.clone(),
            availability_repo,
            directory_repo.clone(),
        );
        let cash_session_service = CashSessionService::new(
            db_pool.clone(),
            cash_repo.clone(),
            ledger_repo.clone(),
            directory_repo,
        );
        let ledger_service = LedgerService::new(
            db_pool.clone(),
            ledger_repo.clone(),
            appointment_repo,
            cash_repo.clone(),
            cash_session_service.clone(),
        );
        let reconciliation_service = ReconciliationService::new(db_pool.clone(), cash_repo, ledger_repo);

        Self {
            db_pool,
            jwt_secret,
            i18n_store: Arc::new(I18nStore::new()),
            scheduling_service,
            ledger_service,
            cash_session_service,
            reconciliation_service,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_optional_vars_are_missing() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/clinic"),
            ("JWT_SECRET", "s3cr3t"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.db_max_connections, 5);
        assert_eq!(config.db_acquire_timeout, Duration::from_secs(3));
    }

    #[test]
    fn required_vars_and_numbers_are_checked() {
        assert!(Config::from_lookup(lookup(&[("JWT_SECRET", "x")])).is_err());
        assert!(Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/clinic"),
            ("JWT_SECRET", "x"),
            ("DB_MAX_CONNECTIONS", "muitas"),
        ]))
        .is_err());
    }
}
