// [apps/coordinator/src/services/lifecycle.rs]
/*!
 * =================================================================
 * APARATO: TASK LIFECYCLE SERVICE
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: SELLADO DE FRAGMENTOS Y ROLLUP DE CAPAS/TRABAJOS
 *
 * # Invariante (Busy Coherence):
 * Al cerrar un fragmento (éxito o fallo) el agente propietario pierde
 * busy_status y sus punteros de tarea en la misma pasada; el
 * planificador observa la coherencia dentro de un tick.
 * =================================================================
 */

use crate::services::planner::cleanup_rule_chunks;
use crate::state::AppState;
use anyhow::Result;
use krakenhashes_domain_models::{JobStatus, TaskChunk};
use krakenhashes_domain_scheduling::progress_percent;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct TaskLifecycleService {
    application_state: AppState,
}

impl TaskLifecycleService {
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    /// Sella un fragmento como completado y ejecuta la limpieza post-tarea.
    #[instrument(skip(self))]
    pub async fn complete_task(&self, task_id: Uuid) -> Result<()> {
        let task = self.application_state.tasks().fetch_task(task_id).await?;
        if !self.application_state.tasks().complete_task(task_id).await? {
            // Otro actor ganó la carrera de sellado; nada que limpiar.
            return Ok(());
        }
        self.after_task_closed(&task, true).await
    }

    /// Fallo permanente del fragmento con propagación al trabajo.
    #[instrument(skip(self, task))]
    pub async fn fail_task_permanently(&self, task: &TaskChunk, error_message: &str) -> Result<()> {
        self.application_state.tasks().fail_task(task.id, error_message).await?;
        self.application_state.jobs().fail_job(task.job_id, error_message).await?;
        self.after_task_closed(task, false).await
    }

    /// Limpieza común tras el cierre de un fragmento (éxito o fallo).
    async fn after_task_closed(&self, task: &TaskChunk, success: bool) -> Result<()> {
        self.application_state.progress_cache().evict(task.id);

        // 1. LIBERACIÓN DEL AGENTE (coherencia busy dentro del tick)
        if let Some(agent_id) = task.agent_id {
            self.application_state
                .agents()
                .apply_metadata_patch(agent_id, |metadata| {
                    metadata.busy_status = false;
                    metadata.current_task_id = None;
                    metadata.current_job_id = None;
                    if success {
                        metadata.consecutive_failures = 0;
                    } else {
                        metadata.consecutive_failures = metadata.consecutive_failures.saturating_add(1);
                    }
                })
                .await?;

            let job_reference = task.job_id.to_string();
            if success {
                self.application_state
                    .agents()
                    .clear_task_failures(agent_id, &job_reference)
                    .await?;
            } else {
                let failure_streak = self
                    .application_state
                    .agents()
                    .record_task_failure(agent_id, &job_reference)
                    .await?;
                warn!(
                    "📉 [LIFECYCLE]: Agent #{} failure streak on job [{}] now {}.",
                    agent_id, task.job_id, failure_streak
                );
            }
        }

        if success {
            self.rollup_after_success(task).await?;
        }

        self.application_state.wake_scheduler();
        Ok(())
    }

    /// Rollup de capa y trabajo tras un sellado exitoso.
    async fn rollup_after_success(&self, task: &TaskChunk) -> Result<()> {
        let job = self.application_state.jobs().fetch_job(task.job_id).await?;

        // 2. ROLLUP DE CAPA (modo incremental)
        if let Some(layer_id) = task.increment_layer_id {
            let layer = self.application_state.jobs().fetch_layer(layer_id).await?;
            let layer_frontier = self
                .application_state
                .tasks()
                .keyspace_frontier_for_layer(layer_id)
                .await?;
            let open_in_layer = self
                .application_state
                .tasks()
                .count_open_tasks_for_layer(layer_id)
                .await?;

            if layer_frontier >= layer.base_keyspace && open_in_layer == 0 {
                self.application_state.jobs().mark_layer_completed(layer_id).await?;
            }

            let unfinished_layers = self
                .application_state
                .jobs()
                .count_unfinished_layers(task.job_id)
                .await?;
            if unfinished_layers == 0 {
                self.seal_job(task.job_id).await?;
                return Ok(());
            }
        } else if let Some(base_keyspace) = job.base_keyspace {
            // 3. ROLLUP DE TRABAJO NO ESTRATIFICADO
            let exhausted = if job.uses_rule_splitting && job.rule_ids.len() == 1 {
                let rule_frontier = self
                    .application_state
                    .tasks()
                    .rule_frontier_for_job(task.job_id)
                    .await?;
                rule_frontier >= job.multiplication_factor
            } else {
                let frontier = self
                    .application_state
                    .tasks()
                    .keyspace_frontier_for_job(task.job_id)
                    .await?;
                frontier >= base_keyspace
            };

            let open_tasks = self
                .application_state
                .tasks()
                .count_open_tasks_for_job(task.job_id)
                .await?;

            if exhausted && open_tasks == 0 {
                self.seal_job(task.job_id).await?;
                return Ok(());
            }
        }

        // 4. PROGRESO AGREGADO DEL TRABAJO
        if let Some(base_keyspace) = job.base_keyspace {
            let processed = self
                .application_state
                .tasks()
                .sum_processed_for_job(task.job_id)
                .await?;
            self.application_state
                .jobs()
                .set_overall_progress(task.job_id, progress_percent(processed, base_keyspace))
                .await?;
        }

        Ok(())
    }

    /// Transición running -> processing del trabajo: todo el keyspace
    /// despachado y al menos un fragmento drenando lotes de cracks.
    pub async fn maybe_mark_job_processing(&self, job_id: Uuid) -> Result<()> {
        let job = self.application_state.jobs().fetch_job(job_id).await?;
        if job.status != JobStatus::Running {
            return Ok(());
        }

        let live = self
            .application_state
            .tasks()
            .count_live_non_draining_for_job(job_id)
            .await?;
        let draining = self.application_state.tasks().count_draining_for_job(job_id).await?;

        if live == 0 && draining > 0 {
            self.application_state
                .jobs()
                .update_status(job_id, JobStatus::Processing, None)
                .await?;
            info!("⏳ [LIFECYCLE]: Job [{}] draining crack stream before seal.", job_id);
        }
        Ok(())
    }

    /// Sellado definitivo del trabajo y limpieza de artefactos de disco.
    pub async fn seal_job(&self, job_id: Uuid) -> Result<()> {
        if self.application_state.jobs().complete_job(job_id).await? {
            info!("🏁 [LIFECYCLE]: Job [{}] fully exhausted and sealed.", job_id);
            cleanup_rule_chunks(&self.application_state, job_id).await;
        }
        Ok(())
    }

    /// Cancelación administrativa: detiene tareas en vuelo y sella estado.
    #[instrument(skip(self))]
    pub async fn cancel_job(&self, job_id: Uuid) -> Result<u64> {
        use krakenhashes_infra_protocol::{DispatchFrame, JobStopPayload, StopReason};

        let in_flight = self.application_state.tasks().fetch_occupying_for_job(job_id).await?;

        for task in &in_flight {
            if let Some(agent_id) = task.agent_id {
                let stop_frame = DispatchFrame::JobStop(JobStopPayload {
                    task_id: task.id,
                    reason: StopReason::Cancelled,
                });
                if let Err(dispatch_fault) =
                    self.application_state.registry().send_to_agent(agent_id, stop_frame).await
                {
                    warn!(
                        "⚠️ [LIFECYCLE]: job_stop to agent #{} undeliverable: {}",
                        agent_id, dispatch_fault
                    );
                }
                self.application_state
                    .agents()
                    .apply_metadata_patch(agent_id, |metadata| {
                        metadata.busy_status = false;
                        metadata.current_task_id = None;
                        metadata.current_job_id = None;
                    })
                    .await?;
            }
            self.application_state.progress_cache().evict(task.id);
        }

        let cancelled = self.application_state.tasks().cancel_open_tasks_for_job(job_id).await?;
        self.application_state
            .jobs()
            .update_status(job_id, JobStatus::Cancelled, None)
            .await?;
        cleanup_rule_chunks(&self.application_state, job_id).await;
        self.application_state.wake_scheduler();

        info!("🛑 [LIFECYCLE]: Job [{}] cancelled ({} chunks stopped).", job_id, cancelled);
        Ok(cancelled)
    }
}
