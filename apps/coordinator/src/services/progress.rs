// [apps/coordinator/src/services/progress.rs]
/*!
 * =================================================================
 * APARATO: PROGRESS INGESTOR SERVICE
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: INGESTA DE FRAMES DE PROGRESO Y REFINAMIENTO EN CASCADA
 *
 * # Invariante (Split Guard):
 * El marcador progress[1] solo sella el keyspace real de tareas
 * rule-split: en una tarea keyspace-split reporta el total del TRABAJO
 * y se descarta como actual de fragmento. keyspace_processed es
 * absoluto: el agotamiento es keyspace_processed >= keyspace_end.
 * =================================================================
 */

use crate::services::cracks::CrackPipeline;
use crate::services::hashlist_completion::HashlistCompletionService;
use crate::services::lifecycle::TaskLifecycleService;
use crate::state::AppState;
use anyhow::Result;
use krakenhashes_domain_models::{JobExecution, TaskChunk, TaskStatus};
use krakenhashes_domain_scheduling::{
    cascade_effective_bounds, refined_job_total, should_update_effective, ChunkSpan,
};
use krakenhashes_infra_db::DbError;
use krakenhashes_infra_protocol::{ProgressPayload, ReportedTaskStatus};
use tracing::{debug, info, instrument, warn};

pub struct ProgressIngestor {
    application_state: AppState,
}

impl ProgressIngestor {
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    /// Pipeline por frame de progreso entrante.
    #[instrument(skip(self, payload), fields(task_id = %payload.task_id))]
    pub async fn ingest(&self, agent_id: i64, payload: ProgressPayload) -> Result<()> {
        // 1. VALIDACIÓN DE PROPIEDAD
        let task = match self.application_state.tasks().fetch_task(payload.task_id).await {
            Ok(task) => task,
            Err(DbError::TaskNotFound) => {
                // Huérfano: el frame refiere una tarea inexistente. Se
                // descarta en silencio (violación de protocolo tolerada).
                debug!("👻 [PROGRESS]: Orphan frame for unknown task [{}] dropped.", payload.task_id);
                return Ok(());
            }
            Err(other) => return Err(other.into()),
        };

        if task.status.is_terminal() {
            // Tarea ya detenida (completitud de hashlist, cancelación):
            // los frames tardíos se ignoran.
            debug!("🔇 [PROGRESS]: Late frame for sealed task [{}] ignored.", task.id);
            return Ok(());
        }

        if task.agent_id != Some(agent_id) {
            warn!(
                "🚫 [PROGRESS]: Agent #{} reported task [{}] owned by {:?}; frame rejected.",
                agent_id, task.id, task.agent_id
            );
            return Ok(());
        }

        self.application_state.progress_cache().record(payload.clone());

        // 2. PRIMERA SEÑAL DE VIDA: assigned -> running (+ capa running)
        if task.status == TaskStatus::Assigned {
            self.application_state.tasks().mark_running(task.id).await?;
            if let Some(layer_id) = task.increment_layer_id {
                self.application_state.jobs().mark_layer_running(layer_id).await?;
            }
        }

        let job = self.application_state.jobs().fetch_job(task.job_id).await?;

        // 3. REFINAMIENTO DEL MARCADOR progress[1]
        if let Some(observed_total) = payload.total_effective_keyspace {
            if observed_total > 0 {
                if task.is_rule_split && !task.is_keyspace_split && !task.is_actual_keyspace {
                    // Solo rule-split sella el actual del fragmento.
                    self.apply_chunk_actual_and_cascade(&job, &task, observed_total).await?;
                } else if let Some(layer_id) = task.increment_layer_id {
                    // El actual de una capa proviene del marcador de su
                    // PRIMERA tarea; el fragmento mismo no se sella.
                    self.crystallize_layer_from_marker(&job, layer_id, observed_total).await?;
                }
            }
        }

        // 4. PERSISTENCIA DEL PROGRESO
        self.application_state
            .tasks()
            .update_progress(
                task.id,
                payload.keyspace_processed,
                payload.hash_rate,
                payload.progress_percent,
                Some(reported_status_label(payload.status)),
            )
            .await?;

        // 5. CRACKS INLINE (antes de cualquier sellado, para que el conteo
        //    recibido preceda a la evaluación de drenaje)
        let inline_crack_count = match &payload.cracked_hashes {
            Some(cracks) if !cracks.is_empty() => {
                let pipeline = CrackPipeline::new(self.application_state.clone());
                pipeline.ingest_for_task(&task, cracks).await?;
                cracks.len() as u64
            }
            _ => 0,
        };
        if inline_crack_count > 0 {
            self.application_state
                .tasks()
                .add_received_cracks(task.id, inline_crack_count)
                .await?;
        }

        // 6. FALLO REPORTADO POR EL AGENTE
        if payload.status == ReportedTaskStatus::Failed {
            let fault_text = payload
                .error_message
                .as_deref()
                .unwrap_or("agent reported unspecified failure");
            let lifecycle = TaskLifecycleService::new(self.application_state.clone());
            lifecycle.fail_task_permanently(&task, fault_text).await?;
            return Ok(());
        }

        // 7. TODOS LOS HASHES CRACKEADOS (código 6 del motor)
        if payload.all_hashes_cracked {
            return self.handle_all_hashes_cracked(&job, &task, &payload).await;
        }

        // 8. COMPLETITUD REPORTADA
        if payload.status == ReportedTaskStatus::Completed {
            return self.handle_reported_completion(&task, &payload).await;
        }

        // 9. AGOTAMIENTO DE KEYSPACE (progreso absoluto contra el rango)
        if payload.keyspace_processed >= task.keyspace_end {
            return self.handle_reported_completion(&task, &payload).await;
        }

        Ok(())
    }

    /// Sellado del keyspace real de una capa incremental a partir del
    /// marcador de su primera tarea. El total del trabajo se reconcilia
    /// como Σ capas; la primera capa sellada marca el trabajo accurate.
    async fn crystallize_layer_from_marker(
        &self,
        job: &JobExecution,
        layer_id: uuid::Uuid,
        observed_total: u64,
    ) -> Result<()> {
        let sealed = self
            .application_state
            .jobs()
            .confirm_layer_keyspace(layer_id, observed_total)
            .await?;
        if !sealed {
            return Ok(());
        }

        info!(
            "🎯 [PROGRESS]: Layer [{}] keyspace crystallized at {} from first-task marker.",
            layer_id, observed_total
        );

        let layered_total = self.application_state.jobs().sum_layer_effectives(job.id).await?;
        if layered_total == 0 {
            return Ok(());
        }

        let job_sealed = self
            .application_state
            .jobs()
            .confirm_accurate_keyspace(job.id, layered_total, 1.0)
            .await?;
        if !job_sealed {
            self.application_state
                .jobs()
                .update_effective_keyspace(job.id, layered_total)
                .await?;
        }
        Ok(())
    }

    /// Sella el actual del fragmento, recalcula en cascada los límites de
    /// los fragmentos posteriores y refina el total del trabajo.
    async fn apply_chunk_actual_and_cascade(
        &self,
        job: &JobExecution,
        task: &TaskChunk,
        observed_total: u64,
    ) -> Result<()> {
        let sealed = self.application_state.tasks().set_chunk_actual(task.id, observed_total).await?;
        if !sealed {
            return Ok(());
        }

        // CASCADA: recomputación de límites efectivos por orden ordinal.
        let spans = self.application_state.tasks().fetch_spans_for_job(job.id).await?;
        let chunk_spans: Vec<ChunkSpan> = spans
            .iter()
            .map(|span| ChunkSpan {
                task_id: span.task_id,
                chunk_number: span.chunk_number,
                effective_start: span.effective_start,
                effective_end: span.effective_end,
                actual_width: if span.task_id == task.id {
                    Some(observed_total)
                } else {
                    span.actual_width
                },
                estimated_width: span.effective_end.saturating_sub(span.effective_start),
            })
            .collect();

        let corrections = cascade_effective_bounds(&chunk_spans);
        for correction in &corrections {
            self.application_state
                .tasks()
                .update_effective_bounds(correction.task_id, correction.effective_start, correction.effective_end)
                .await?;
        }
        if !corrections.is_empty() {
            debug!(
                "🌊 [PROGRESS]: Cascade shifted {} chunk bounds of job [{}].",
                corrections.len(),
                job.id
            );
        }

        // REFINAMIENTO PROGRESIVO del total del trabajo.
        let actual_width_sum: u64 = spans
            .iter()
            .map(|span| {
                if span.task_id == task.id {
                    observed_total
                } else {
                    span.actual_width.unwrap_or(0)
                }
            })
            .sum();
        let actual_rule_sum: u64 = spans
            .iter()
            .filter(|span| span.actual_width.is_some() || span.task_id == task.id)
            .map(|span| span.rule_count)
            .sum();
        let total_rules = job.multiplication_factor;
        let remaining_rules = total_rules.saturating_sub(actual_rule_sum);

        let hashlist = self.application_state.hashlists().fetch_hashlist(job.hashlist_id).await?;
        let hashlist_scale = if hashlist.total_hashes > 0 {
            hashlist.remaining_hashes() as f64 / hashlist.total_hashes as f64
        } else {
            1.0
        };

        let candidate = refined_job_total(actual_width_sum, actual_rule_sum, remaining_rules, hashlist_scale);
        let prior = job.effective_keyspace.unwrap_or(0);

        if should_update_effective(prior, candidate) {
            self.application_state.jobs().update_effective_keyspace(job.id, candidate).await?;
            info!(
                "📐 [PROGRESS]: Job [{}] total refined {} -> {} ({} rules observed).",
                job.id, prior, candidate, actual_rule_sum
            );
        }
        Ok(())
    }

    /// Código 6: el hashlist entero quedó crackeado. El progreso del
    /// trabajo sube a 100 de inmediato (guardia de carrera contra el
    /// rollup de capas) y la completitud del hashlist corre asíncrona.
    async fn handle_all_hashes_cracked(
        &self,
        job: &JobExecution,
        task: &TaskChunk,
        payload: &ProgressPayload,
    ) -> Result<()> {
        info!(
            "🎉 [PROGRESS]: Task [{}] reports hashlist #{} fully cracked.",
            task.id, job.hashlist_id
        );

        // Conteo esperado: del frame, con fallback al contador del hashlist.
        let expected_cracks = if payload.cracked_count > 0 {
            payload.cracked_count
        } else {
            self.application_state
                .hashlists()
                .fetch_hashlist(job.hashlist_id)
                .await?
                .cracked_hashes
        };

        self.application_state.jobs().set_overall_progress(job.id, 100.0).await?;

        // Completitud del hashlist en segundo plano: detiene las demás
        // tareas del hashlist sin bloquear este lector.
        let completion_state = self.application_state.clone();
        let hashlist_reference = job.hashlist_id;
        let triggering_task = task.id;
        tokio::spawn(async move {
            let completion_service = HashlistCompletionService::new(completion_state);
            if let Err(completion_fault) = completion_service
                .handle_fully_cracked(hashlist_reference, triggering_task)
                .await
            {
                warn!(
                    "⚠️ [PROGRESS]: Hashlist #{} completion sweep failed: {}",
                    hashlist_reference, completion_fault
                );
            }
        });

        if expected_cracks > 0 {
            // El fragmento espera el drenaje de sus lotes antes del sellado.
            self.application_state.tasks().set_processing(task.id, expected_cracks).await?;

            let lifecycle = TaskLifecycleService::new(self.application_state.clone());
            lifecycle.maybe_mark_job_processing(job.id).await?;

            let fresh = self.application_state.tasks().fetch_task(task.id).await?;
            if fresh.status == TaskStatus::Processing && fresh.is_drain_complete() {
                lifecycle.complete_task(task.id).await?;
            }
            return Ok(());
        }

        // Conteo cero en frame y en hashlist: completitud inmediata.
        let lifecycle = TaskLifecycleService::new(self.application_state.clone());
        lifecycle.complete_task(task.id).await?;
        Ok(())
    }

    /// Cierre reportado (status completed o agotamiento absoluto).
    async fn handle_reported_completion(&self, task: &TaskChunk, payload: &ProgressPayload) -> Result<()> {
        let lifecycle = TaskLifecycleService::new(self.application_state.clone());

        if payload.cracked_count > 0 {
            // Cracks anunciados: el fragmento drena sus lotes en processing.
            self.application_state
                .tasks()
                .set_processing(task.id, payload.cracked_count)
                .await?;
            lifecycle.maybe_mark_job_processing(task.job_id).await?;

            let fresh = self.application_state.tasks().fetch_task(task.id).await?;
            if fresh.status == TaskStatus::Processing && fresh.is_drain_complete() {
                lifecycle.complete_task(task.id).await?;
            }
            return Ok(());
        }

        lifecycle.complete_task(task.id).await?;
        Ok(())
    }
}

fn reported_status_label(status: ReportedTaskStatus) -> &'static str {
    match status {
        ReportedTaskStatus::Running => "running",
        ReportedTaskStatus::Completed => "completed",
        ReportedTaskStatus::Failed => "failed",
    }
}
