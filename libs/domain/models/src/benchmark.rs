// [libs/domain/models/src/benchmark.rs]
//! =================================================================
//! APARATO: BENCHMARK DOMAIN MODEL
//! CLASIFICACIÓN: DOMAIN MODELS (ESTRATO L2)
//! RESPONSABILIDAD: MUESTRA DE RENDIMIENTO POR (AGENTE, TIPO, MODO)
//! =================================================================

use crate::job::AttackMode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Muestra de throughput observado; clave (agent, hash_type, attack_mode),
/// upsert en conflicto.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkSample {
    pub agent_id: i64,
    pub hash_type: i64,
    pub attack_mode: AttackMode,
    pub speed_hashes_per_second: u64,
    pub measured_at: DateTime<Utc>,
}
