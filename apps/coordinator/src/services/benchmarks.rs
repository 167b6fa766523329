// [apps/coordinator/src/services/benchmarks.rs]
/*!
 * =================================================================
 * APARATO: BENCHMARK COORDINATOR SERVICE
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: BENCHMARK FORZADO Y CRISTALIZACIÓN DEL KEYSPACE REAL
 *
 * # Invariante (Accuracy Once):
 * La primera observación del marcador progress[1] sella
 * is_accurate_keyspace = true exactamente una vez (guardia en SQL);
 * observaciones posteriores solo refinan el total por la vía progresiva.
 * =================================================================
 */

use crate::services::planner::resolve_job_resources;
use crate::state::AppState;
use anyhow::Result;
use chrono::Utc;
use krakenhashes_domain_models::{BenchmarkSample, JobExecution, SystemTuning};
use krakenhashes_domain_scheduling::average_rule_multiplier;
use krakenhashes_infra_db::DbError;
use krakenhashes_infra_protocol::{BenchmarkRequestPayload, BenchmarkResultPayload, DispatchFrame};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Duración nominal del speedtest del benchmark forzado (segundos).
const BENCHMARK_TEST_DURATION_SECONDS: u64 = 30;

pub struct BenchmarkCoordinator {
    application_state: AppState,
}

impl BenchmarkCoordinator {
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    /// Emite un benchmark reforzado con el contexto completo del trabajo
    /// y difiere la asignación: el agente queda marcado con
    /// pending_benchmark_job hasta el resultado.
    #[instrument(skip(self, job, tuning), fields(job_id = %job.id))]
    pub async fn request_forced_benchmark(
        &self,
        job: &JobExecution,
        agent_id: i64,
        tuning: &SystemTuning,
    ) -> Result<()> {
        let resources = resolve_job_resources(&self.application_state, job).await?;

        // Contexto de capa: el benchmark de un trabajo incremental apunta
        // a la capa activa para que progress[1] reporte SU keyspace.
        let (execution_reference, mask) = if job.increment_mode {
            match self.application_state.jobs().fetch_current_layer(job.id).await? {
                Some(layer) => (layer.id, Some(layer.mask)),
                None => (job.id, job.mask.clone()),
            }
        } else {
            (job.id, job.mask.clone())
        };

        let agent = self.application_state.agents().fetch_agent(agent_id).await?;
        let enabled_devices = self.application_state.agents().enabled_devices_payload(agent_id).await?;

        let request = BenchmarkRequestPayload {
            request_id: Uuid::new_v4(),
            job_execution_id: execution_reference,
            task_id: None,
            hash_type: resources.hash_type,
            attack_mode: job.attack_mode,
            binary_path: resources.binary_path.clone(),
            hashlist_path: resources.hashlist_path.clone(),
            wordlist_paths: resources.wordlist_paths.clone(),
            rule_paths: resources.rule_paths.clone(),
            mask,
            test_duration: BENCHMARK_TEST_DURATION_SECONDS,
            timeout_duration: tuning.speedtest_timeout_seconds,
            extra_parameters: agent.extra_parameters.clone(),
            enabled_devices,
        };

        let job_reference = job.id;
        self.application_state
            .agents()
            .apply_metadata_patch(agent_id, |metadata| {
                metadata.pending_benchmark_job = Some(job_reference);
            })
            .await?;

        if let Err(dispatch_fault) = self
            .application_state
            .registry()
            .send_to_agent(agent_id, DispatchFrame::BenchmarkRequest(request))
            .await
        {
            // Reversión: el agente vuelve a ser elegible sin benchmark colgante.
            warn!(
                "⚠️ [BENCH_COORD]: Benchmark dispatch to agent #{} failed: {}",
                agent_id, dispatch_fault
            );
            self.application_state
                .agents()
                .apply_metadata_patch(agent_id, |metadata| {
                    metadata.pending_benchmark_job = None;
                })
                .await?;
            return Ok(());
        }

        info!(
            "🧪 [BENCH_COORD]: Enhanced benchmark of job [{}] dispatched to agent #{}.",
            job.id, agent_id
        );
        Ok(())
    }

    /// Procesa un resultado de benchmark: muestra de throughput, sellado
    /// del keyspace real (trabajo o capa) y prioridad de primer fragmento.
    #[instrument(skip(self, payload), fields(request_id = %payload.request_id))]
    pub async fn handle_benchmark_result(
        &self,
        agent_id: i64,
        payload: BenchmarkResultPayload,
    ) -> Result<()> {
        if !payload.success {
            warn!(
                "❌ [BENCH_COORD]: Agent #{} benchmark rejected: {}",
                agent_id,
                payload.error.as_deref().unwrap_or("unspecified")
            );
            // Sin muestra: solo se libera el marcador de benchmark colgante.
            self.application_state
                .agents()
                .apply_metadata_patch(agent_id, |metadata| {
                    metadata.pending_benchmark_job = None;
                })
                .await?;
            return Ok(());
        }

        self.application_state
            .benchmarks()
            .upsert_benchmark(&BenchmarkSample {
                agent_id,
                hash_type: payload.hash_type,
                attack_mode: payload.attack_mode,
                speed_hashes_per_second: payload.speed_hashes_per_second,
                measured_at: Utc::now(),
            })
            .await?;

        // El job_execution_id puede referir una capa o el trabajo entero.
        let job_id = match self.application_state.jobs().fetch_layer(payload.job_execution_id).await {
            Ok(layer) => {
                if payload.total_effective_keyspace > 0 {
                    self.application_state
                        .jobs()
                        .confirm_layer_keyspace(layer.id, payload.total_effective_keyspace)
                        .await?;
                    self.reconcile_layered_job_total(layer.job_id).await?;
                }
                layer.job_id
            }
            Err(DbError::LayerNotFound) => {
                let job_id = payload.job_execution_id;
                if payload.total_effective_keyspace > 0 {
                    self.crystallize_whole_job_keyspace(job_id, payload.total_effective_keyspace)
                        .await?;
                }
                job_id
            }
            Err(other) => return Err(other.into()),
        };

        // El agente que completó el benchmark gana prioridad para el
        // primer fragmento del trabajo.
        self.application_state
            .agents()
            .apply_metadata_patch(agent_id, |metadata| {
                metadata.pending_benchmark_job = None;
                metadata.forced_benchmark_completed_for_job = Some(job_id);
            })
            .await?;

        self.application_state.wake_scheduler();
        Ok(())
    }

    /// Sellado del keyspace de un trabajo no estratificado.
    async fn crystallize_whole_job_keyspace(&self, job_id: Uuid, observed: u64) -> Result<()> {
        let job = self.application_state.jobs().fetch_job(job_id).await?;
        let base = job.base_keyspace.unwrap_or(0);
        let multiplier = average_rule_multiplier(observed, base, job.multiplication_factor);

        let sealed = self
            .application_state
            .jobs()
            .confirm_accurate_keyspace(job_id, observed, multiplier)
            .await?;

        if !sealed {
            // Ya había una confirmación previa: refinamiento simple.
            self.application_state
                .jobs()
                .update_effective_keyspace(job_id, observed)
                .await?;
        }
        Ok(())
    }

    /// Total de un trabajo incremental = Σ capas; la primera capa sellada
    /// marca el trabajo como accurate.
    async fn reconcile_layered_job_total(&self, job_id: Uuid) -> Result<()> {
        let layered_total = self.application_state.jobs().sum_layer_effectives(job_id).await?;
        if layered_total == 0 {
            return Ok(());
        }

        let sealed = self
            .application_state
            .jobs()
            .confirm_accurate_keyspace(job_id, layered_total, 1.0)
            .await?;
        if !sealed {
            self.application_state
                .jobs()
                .update_effective_keyspace(job_id, layered_total)
                .await?;
        }
        Ok(())
    }
}
