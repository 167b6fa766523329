// [libs/infra/db/src/retry.rs]
/*!
 * =================================================================
 * APARATO: TRANSIENT RETRY ENGINE
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: REINTENTO ACOTADO DE FALLOS TRANSITORIOS DEL SUSTRATO
 *
 * # Invariante (Acotación):
 * 3 intentos con backoff 0s/1s/2s; la suma de esperas queda acotada en
 * 3 segundos. Todo fallo no transitorio aborta en el primer intento.
 * =================================================================
 */

use crate::errors::DbError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Escalera de backoff del pipeline (el primer intento no espera).
const RETRY_BACKOFF_STEPS: [Duration; 3] = [
    Duration::from_secs(0),
    Duration::from_secs(1),
    Duration::from_secs(2),
];

/// Ejecuta una operación de persistencia reintentando solo fallos
/// clasificados como transitorios (deadlock, contención, corte, timeout).
pub async fn execute_with_retry<T, MakeFuture, OperationFuture>(
    operation_label: &str,
    mut operation: MakeFuture,
) -> Result<T, DbError>
where
    MakeFuture: FnMut() -> OperationFuture,
    OperationFuture: Future<Output = Result<T, DbError>>,
{
    let mut last_fault_text = String::new();

    for (attempt_index, backoff) in RETRY_BACKOFF_STEPS.iter().enumerate() {
        if !backoff.is_zero() {
            sleep(*backoff).await;
        }

        match operation().await {
            Ok(value) => return Ok(value),
            Err(fault) if fault.is_transient() => {
                last_fault_text = fault.to_string();
                warn!(
                    "🔁 [RETRY]: Transient fault on [{}] (attempt {}/{}): {}",
                    operation_label,
                    attempt_index + 1,
                    RETRY_BACKOFF_STEPS.len(),
                    last_fault_text
                );
            }
            Err(fault) => return Err(fault),
        }
    }

    Err(DbError::RetryExhausted {
        attempts: RETRY_BACKOFF_STEPS.len() as u32,
        last_fault: last_fault_text,
    })
}
