// [apps/coordinator/src/services/hashlist_completion.rs]
/*!
 * =================================================================
 * APARATO: HASHLIST COMPLETION SERVICE
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: DETENCIÓN DE TAREAS Y SELLADO DE TRABAJOS DEPENDIENTES
 *
 * # Invariante (Trigger Exemption):
 * La tarea que disparó la señal NO recibe job_stop: su propio drenaje
 * de lotes la sella por la vía ordinaria del pipeline de cracks.
 * =================================================================
 */

use crate::services::lifecycle::TaskLifecycleService;
use crate::state::AppState;
use anyhow::Result;
use krakenhashes_infra_protocol::{DispatchFrame, JobStopPayload, StopReason};
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub struct HashlistCompletionService {
    application_state: AppState,
}

impl HashlistCompletionService {
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    /// Señal de hashlist completamente crackeado: detiene toda tarea en
    /// vuelo contra el hashlist (excepto la disparadora) y completa los
    /// trabajos dependientes al 100%.
    #[instrument(skip(self))]
    pub async fn handle_fully_cracked(&self, hashlist_id: i64, triggering_task_id: Uuid) -> Result<()> {
        info!(
            "🏆 [HASHLIST_DONE]: Hashlist #{} exhausted; sweeping dependent work.",
            hashlist_id
        );

        let lifecycle = TaskLifecycleService::new(self.application_state.clone());

        // 1. DETENCIÓN DE TAREAS EN VUELO (exenta la disparadora)
        let in_flight = self.application_state.tasks().fetch_active_on_hashlist(hashlist_id).await?;
        for task in &in_flight {
            if task.id == triggering_task_id {
                continue;
            }

            if let Some(agent_id) = task.agent_id {
                let stop_frame = DispatchFrame::JobStop(JobStopPayload {
                    task_id: task.id,
                    reason: StopReason::HashlistComplete,
                });
                if let Err(dispatch_fault) =
                    self.application_state.registry().send_to_agent(agent_id, stop_frame).await
                {
                    warn!(
                        "⚠️ [HASHLIST_DONE]: job_stop to agent #{} undeliverable: {}",
                        agent_id, dispatch_fault
                    );
                }
            }

            // El sellado como completado silencia frames tardíos: el
            // ingestor ignora tareas en estado terminal.
            lifecycle.complete_task(task.id).await?;
        }

        // 2. SELLADO DE TRABAJOS DEPENDIENTES
        let dependent_jobs = self.application_state.jobs().fetch_active_on_hashlist(hashlist_id).await?;
        for job in &dependent_jobs {
            self.application_state.jobs().set_overall_progress(job.id, 100.0).await?;
            lifecycle.seal_job(job.id).await?;
        }

        info!(
            "🏆 [HASHLIST_DONE]: {} tasks stopped, {} jobs sealed for hashlist #{}.",
            in_flight.len(),
            dependent_jobs.len(),
            hashlist_id
        );

        self.application_state.wake_scheduler();
        Ok(())
    }
}
