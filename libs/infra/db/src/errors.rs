// [libs/infra/db/src/errors.rs]
/*!
 * =================================================================
 * APARATO: DATABASE ERROR CATALOG
 * CLASIFICACIÓN: INFRASTRUCTURE CORE (ESTRATO L3)
 * RESPONSABILIDAD: CATALOGACIÓN SEMÁNTICA DE FALLOS DE PERSISTENCIA
 * =================================================================
 */

use thiserror::Error;

/// Firmas textuales de fallos transitorios del sustrato. libSQL no expone
/// códigos estructurados para todas estas condiciones; la clasificación
/// por subcadena es el fallback operativo.
const TRANSIENT_SIGNATURES: &[&str] = &[
    "deadlock",
    "shared memory",
    "database is locked",
    "connection reset",
    "timed out",
    "timeout",
];

#[derive(Error, Debug)]
pub enum DbError {
    /// Error de enlace físico o de red con el sustrato libSQL.
    #[error("[L3_DB_NET_FAULT]: DATABASE_UPLINK_SEVERED -> {0}")]
    ConnectionError(String),

    /// Fallo en la configuración del entorno (variables vacías o malformadas).
    #[error("[L3_DB_CONFIG_FAULT]: STRATEGIC_ENV_VOID -> {0}")]
    ConfigurationError(String),

    /// Error de sintaxis o ejecución devuelto por el motor libSQL.
    #[error("[L3_DB_QUERY_FAULT]: SQL_QUERY_REJECTED -> {0}")]
    QueryError(#[from] libsql::Error),

    /// Fallo en la transformación de tipos entre SQLite y el dominio Rust.
    #[error("[L3_DB_MAPPING_FAULT]: DATA_MAPPING_VIOLATION -> {0}")]
    MappingError(String),

    /// Error al comprometer cambios en una secuencia multi-tabla.
    #[error("[L3_DB_FAULT]: TRANSACTION_COLLAPSE")]
    TransactionError,

    /// Reintentos transitorios agotados sin éxito.
    #[error("[L3_DB_FAULT]: TRANSIENT_RETRIES_EXHAUSTED after {attempts} attempts -> {last_fault}")]
    RetryExhausted { attempts: u32, last_fault: String },

    // --- ESTRATO DE CONTROL DE TRABAJOS ---

    /// El trabajo solicitado no existe en las tablas activas.
    #[error("[L3_JOB_FAULT]: JOB_NOT_FOUND")]
    JobNotFound,

    /// El fragmento solicitado no existe.
    #[error("[L3_TASK_FAULT]: TASK_NOT_FOUND")]
    TaskNotFound,

    /// La capa incremental solicitada no existe.
    #[error("[L3_LAYER_FAULT]: LAYER_NOT_FOUND")]
    LayerNotFound,

    /// Conflicto de propiedad: el fragmento pertenece a otro agente.
    #[error("[L3_TASK_FAULT]: OWNERSHIP_VIOLATION")]
    OwnershipConflict,

    /// El registro no se encuentra en un estado apto para la operación.
    #[error("[L3_TASK_FAULT]: INVALID_STATE_TRANSITION")]
    InvalidState,

    // --- ESTRATO DE INVENTARIO ---

    /// El agente referenciado no existe.
    #[error("[L3_AGENT_FAULT]: AGENT_NOT_FOUND")]
    AgentNotFound,

    /// El hashlist referenciado no existe.
    #[error("[L3_HASHLIST_FAULT]: HASHLIST_NOT_FOUND")]
    HashlistNotFound,

    /// El recurso de catálogo (wordlist/regla/binario) no está registrado.
    #[error("[L3_CATALOG_FAULT]: RESOURCE_NOT_FOUND -> {0}")]
    ResourceNotFound(String),
}

impl DbError {
    /// Clasificación de transitoriedad para el motor de reintentos del
    /// pipeline de cracks. Solo deadlocks, contención, cortes de conexión
    /// y timeouts son recuperables; el resto aborta y burbujea.
    pub fn is_transient(&self) -> bool {
        let fault_text = match self {
            DbError::QueryError(inner) => inner.to_string(),
            DbError::ConnectionError(text) => text.clone(),
            _ => return false,
        };
        let lowered = fault_text.to_lowercase();
        TRANSIENT_SIGNATURES.iter().any(|signature| lowered.contains(signature))
    }
}
