// src/common/db_utils.rs

use std::future::Future;

use sqlx::{PgPool, Postgres, Transaction};

use crate::common::error::AppError;

/// Quantas vezes uma operação de verificar-e-gravar é tentada antes de desistir.
pub const MAX_SERIALIZATION_ATTEMPTS: u32 = 3;

// ---
// Helper de Transação: o "Ponto de Serialização"
// ---
/// Abre uma transação SERIALIZABLE. Usada onde a regra de negócio é
/// "verificar e depois gravar" (agenda, abertura de caixa).
pub(crate) async fn begin_serializable(
    pool: &PgPool,
) -> Result<Transaction<'static, Postgres>, AppError> {
    // 1. Adquire conexão e inicia a transação
    let mut tx = pool.begin().await?;

    // 2. Precisa ser o primeiro comando da transação
    sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        .execute(&mut *tx)
        .await?;

    Ok(tx)
}

/// O Postgres abortou a transação por conflito de serialização ou deadlock.
pub(crate) fn is_retryable(err: &AppError) -> bool {
    match err {
        AppError::DatabaseError(e) => e
            .as_database_error()
            .and_then(|db_err| db_err.code())
            .map(|code| code == "40001" || code == "40P01")
            .unwrap_or(false),
        _ => false,
    }
}

/// Executa `op` (que abre a própria transação) repetindo em caso de falha de
/// serialização, no máximo `MAX_SERIALIZATION_ATTEMPTS` vezes.
pub(crate) async fn retry_serializable<T, F, Fut>(operation: &str, mut op: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if is_retryable(&err) && attempt < MAX_SERIALIZATION_ATTEMPTS => {
                tracing::warn!(
                    "🔁 Conflito de serialização em '{}' (tentativa {}/{}), repetindo",
                    operation,
                    attempt,
                    MAX_SERIALIZATION_ATTEMPTS
                );
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn non_retryable_errors_are_returned_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), AppError> = retry_serializable("teste", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::AppointmentConflict { conflicting_id: None }) }
        })
        .await;

        assert!(matches!(result, Err(AppError::AppointmentConflict { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_is_passed_through() {
        let result = retry_serializable("teste", || async { Ok::<_, AppError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
