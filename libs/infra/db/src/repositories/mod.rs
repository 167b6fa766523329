// [libs/infra/db/src/repositories/mod.rs]
/*!
 * =================================================================
 * APARATO: REPOSITORY REGISTRY
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: REGISTRO DE REPOSITORIOS Y UTILIDADES DE MAPEO
 * =================================================================
 */

pub mod agent;
pub mod benchmark;
pub mod catalog;
pub mod hash;
pub mod hashlist;
pub mod job;
pub mod potfile;
pub mod settings;
pub mod task;

pub use agent::AgentRepository;
pub use benchmark::BenchmarkRepository;
pub use catalog::CatalogRepository;
pub use hash::{CrackUpdate, HashRepository};
pub use hashlist::HashlistRepository;
pub use job::JobRepository;
pub use potfile::{PotfileEntry, PotfileRepository};
pub use settings::SettingsRepository;
pub use task::TaskRepository;

use crate::errors::DbError;
use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

/// Parsea marcas temporales del sustrato: RFC3339 primero, con fallback
/// al formato naive de CURRENT_TIMESTAMP de SQLite.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DbError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|fault| DbError::MappingError(format!("TIMESTAMP_PARSE_FAULT [{}]: {}", raw, fault)))
}

pub(crate) fn parse_uuid(raw: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(raw)
        .map_err(|fault| DbError::MappingError(format!("UUID_PARSE_FAULT [{}]: {}", raw, fault)))
}

/// Convierte el entero 0/1 del sustrato a booleano de dominio.
pub(crate) fn as_bool(raw: i64) -> bool {
    raw != 0
}
