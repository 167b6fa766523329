// [libs/infra/db/src/repositories/benchmark.rs]
//! =================================================================
//! APARATO: BENCHMARK REPOSITORY
//! CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
//! RESPONSABILIDAD: PERSISTENCIA DE MUESTRAS DE THROUGHPUT POR AGENTE
//! =================================================================

use crate::errors::DbError;
use crate::LedgerClient;
use chrono::Utc;
use libsql::params;
use tracing::{debug, instrument};

use krakenhashes_domain_models::{AttackMode, BenchmarkSample};

pub struct BenchmarkRepository {
    database_client: LedgerClient,
}

impl BenchmarkRepository {
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    /// Upsert de la muestra: la clave (agente, tipo, modo) conserva
    /// únicamente la observación más reciente.
    #[instrument(skip(self, sample))]
    pub async fn upsert_benchmark(&self, sample: &BenchmarkSample) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                r#"
                INSERT INTO agent_benchmarks (
                    agent_id, hash_type, attack_mode, speed_hashes_per_second, measured_at
                ) VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(agent_id, hash_type, attack_mode) DO UPDATE SET
                    speed_hashes_per_second = excluded.speed_hashes_per_second,
                    measured_at = excluded.measured_at
                "#,
                params![
                    sample.agent_id,
                    sample.hash_type,
                    sample.attack_mode.engine_code() as i64,
                    sample.speed_hashes_per_second as i64,
                    Utc::now().to_rfc3339()
                ],
            )
            .await?;

        debug!(
            "📊 [BENCH_REPO]: Sample sealed for agent #{} (type {}, mode {}): {} H/s.",
            sample.agent_id,
            sample.hash_type,
            sample.attack_mode.engine_code(),
            sample.speed_hashes_per_second
        );
        Ok(())
    }

    /// Mejor estimación disponible para el par; None dispara el flujo de
    /// benchmark forzado en el planificador.
    pub async fn lookup_benchmark(
        &self,
        agent_id: i64,
        hash_type: i64,
        attack_mode: AttackMode,
    ) -> Result<Option<u64>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                r#"
                SELECT speed_hashes_per_second FROM agent_benchmarks
                WHERE agent_id = ?1 AND hash_type = ?2 AND attack_mode = ?3
                "#,
                params![agent_id, hash_type, attack_mode.engine_code() as i64],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row.get::<i64>(0)?.max(0) as u64)),
            None => Ok(None),
        }
    }
}
