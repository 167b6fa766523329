// [apps/coordinator/src/services/reconnect.rs]
/*!
 * =================================================================
 * APARATO: RECONNECT & RETRY SUPERVISOR
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: GRACIA DE RECONEXIÓN, RECUPERACIÓN Y REINTENTOS
 *
 * # Invariante (Progress Preservation):
 * La recuperación dirigida re-vincula la tarea SIN tocar
 * keyspace_processed: el agente retoma exactamente donde quedó. El
 * reset a pending consume un reintento; superado el máximo, el fallo
 * es permanente.
 * =================================================================
 */

use crate::state::AppState;
use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use krakenhashes_domain_models::{Agent, TaskStatus};
use krakenhashes_infra_db::DbError;
use krakenhashes_infra_protocol::{AgentHelloPayload, DispatchFrame, JobStopPayload, StopReason};
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Cadencia del barrido de gracia y vitalidad.
const SWEEP_INTERVAL_SECONDS: u64 = 15;

pub struct ReconnectSupervisor {
    application_state: AppState,
}

impl ReconnectSupervisor {
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    // --- DESCONEXIÓN ---

    /// Caída del canal: toda tarea en vuelo del agente entra en gracia de
    /// reconexión y el agente queda liberado.
    #[instrument(skip(self))]
    pub async fn on_agent_disconnect(&self, agent_id: i64) -> Result<()> {
        let occupying = self.application_state.tasks().fetch_occupying_for_agent(agent_id).await?;
        let disconnect_stamp = Utc::now();

        for task in &occupying {
            self.application_state
                .tasks()
                .mark_reconnect_pending(task.id, disconnect_stamp)
                .await?;
            info!(
                "🕸️ [RECONNECT]: Chunk [{}] of agent #{} entered reconnect grace.",
                task.id, agent_id
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

        self.application_state.wake_scheduler();
        Ok(())
    }

    // --- RECONEXIÓN ---

    /// Presentación de un agente reconectado, con o sin tarea en vuelo.
    #[instrument(skip(self, agent, hello), fields(agent_id = agent.id))]
    pub async fn on_agent_reconnect(&self, agent: &Agent, hello: &AgentHelloPayload) -> Result<()> {
        if let Some(reported_task_id) = hello.active_task_id {
            self.recover_reported_task(agent, reported_task_id, hello.keyspace_processed)
                .await?;
        }

        // Tareas en gracia de este agente NO reportadas: reset o fallo.
        let leftover = self
            .application_state
            .tasks()
            .fetch_reconnect_pending_for_agent(agent.id)
            .await?;
        let max_retries = self.application_state.current_tuning().max_chunk_retry_attempts;

        for task in leftover {
            if Some(task.id) == hello.active_task_id {
                continue;
            }
            self.reset_or_fail(task.id, task.retry_count, max_retries).await?;
        }

        self.application_state.wake_scheduler();
        Ok(())
    }

    /// Protocolo de recuperación de la tarea reportada en la presentación.
    async fn recover_reported_task(
        &self,
        agent: &Agent,
        task_id: Uuid,
        reported_progress: Option<u64>,
    ) -> Result<()> {
        let task = match self.application_state.tasks().fetch_task(task_id).await {
            Ok(task) => task,
            Err(DbError::TaskNotFound) => {
                warn!(
                    "👻 [RECONNECT]: Agent #{} reported unknown task [{}]; full cleanup ordered.",
                    agent.id, task_id
                );
                if let Err(dispatch_fault) = self
                    .application_state
                    .registry()
                    .send_to_agent(agent.id, DispatchFrame::ForceCleanup)
                    .await
                {
                    debug!(
                        "📪 [RECONNECT]: force_cleanup to agent #{} undeliverable: {}",
                        agent.id, dispatch_fault
                    );
                }
                return Ok(());
            }
            Err(other) => return Err(other.into()),
        };

        let max_retries = self.application_state.current_tuning().max_chunk_retry_attempts;

        match task.status {
            // Recuperación ordinaria: preserva keyspace_processed.
            TaskStatus::ReconnectPending | TaskStatus::Pending => {
                if self.application_state.tasks().recover_for_agent(task.id, agent.id).await? {
                    self.rebind_agent_metadata(agent.id, &task.id, &task.job_id).await?;
                    if let Some(progress) = reported_progress {
                        // MAX() en SQL absorbe un reporte menor al persistido.
                        self.application_state
                            .tasks()
                            .update_progress(task.id, progress, 0, task.progress_percent, None)
                            .await?;
                    }
                    info!(
                        "🔗 [RECONNECT]: Agent #{} recovered chunk [{}] at offset {:?}.",
                        agent.id, task.id, reported_progress
                    );
                }
            }

            // La tarea ya cerró mientras el agente estuvo fuera.
            TaskStatus::Completed | TaskStatus::Cancelled => {
                self.send_stop(agent.id, task.id, StopReason::AlreadyComplete).await;
            }

            // Fallida con reintentos restantes: recuperación excepcional
            // SIN consumir contador.
            TaskStatus::Failed => {
                if task.retry_count < max_retries {
                    if self
                        .application_state
                        .tasks()
                        .recover_failed_for_agent(task.id, agent.id)
                        .await?
                    {
                        self.rebind_agent_metadata(agent.id, &task.id, &task.job_id).await?;
                        info!(
                            "⚕️ [RECONNECT]: Failed chunk [{}] resurrected on agent #{}.",
                            task.id, agent.id
                        );
                    }
                } else {
                    self.send_stop(agent.id, task.id, StopReason::AlreadyComplete).await;
                }
            }

            // Propiedad ajena o estado incompatible: rechazo.
            TaskStatus::Assigned | TaskStatus::Running | TaskStatus::Processing => {
                if task.agent_id == Some(agent.id) {
                    // La sesión se reabrió antes del barrido: re-vinculación trivial.
                    self.rebind_agent_metadata(agent.id, &task.id, &task.job_id).await?;
                } else {
                    warn!(
                        "🚫 [RECONNECT]: Task [{}] now owned by {:?}; agent #{} ordered to stop.",
                        task.id, task.agent_id, agent.id
                    );
                    self.send_stop(agent.id, task.id, StopReason::AlreadyComplete).await;
                }
            }
        }

        Ok(())
    }

    async fn rebind_agent_metadata(&self, agent_id: i64, task_id: &Uuid, job_id: &Uuid) -> Result<()> {
        let task_reference = *task_id;
        let job_reference = *job_id;
        self.application_state
            .agents()
            .apply_metadata_patch(agent_id, |metadata| {
                metadata.busy_status = true;
                metadata.current_task_id = Some(task_reference);
                metadata.current_job_id = Some(job_reference);
            })
            .await?;
        Ok(())
    }

    async fn send_stop(&self, agent_id: i64, task_id: Uuid, reason: StopReason) {
        let frame = DispatchFrame::JobStop(JobStopPayload { task_id, reason });
        if let Err(dispatch_fault) = self.application_state.registry().send_to_agent(agent_id, frame).await {
            debug!(
                "📪 [RECONNECT]: Stop order to agent #{} undeliverable: {}",
                agent_id, dispatch_fault
            );
        }
    }

    /// Reset con reintento o fallo permanente según el contador.
    async fn reset_or_fail(&self, task_id: Uuid, retry_count: u32, max_retries: u32) -> Result<()> {
        if retry_count < max_retries {
            if self.application_state.tasks().reset_to_pending_with_retry(task_id).await? {
                info!(
                    "♻️ [RECONNECT]: Chunk [{}] reset to pending (retry {}/{}).",
                    task_id,
                    retry_count + 1,
                    max_retries
                );
            }
        } else {
            let task = self.application_state.tasks().fetch_task(task_id).await?;
            let lifecycle = crate::services::lifecycle::TaskLifecycleService::new(self.application_state.clone());
            lifecycle
                .fail_task_permanently(&task, "reconnect retries exhausted")
                .await?;
        }
        Ok(())
    }

    // --- BARRIDOS PERIÓDICOS ---

    /// Expiración de gracia: toda tarea aún en reconnect_pending vuelve a
    /// la cola (o falla permanentemente sin reintentos restantes).
    #[instrument(skip(self))]
    pub async fn sweep_expired_grace(&self) -> Result<()> {
        let tuning = self.application_state.current_tuning();
        let expiry_threshold =
            Utc::now() - ChronoDuration::seconds(tuning.reconnect_grace_seconds as i64);

        let expired = self
            .application_state
            .tasks()
            .fetch_expired_reconnect_pending(expiry_threshold)
            .await?;

        for task in expired {
            self.reset_or_fail(task.id, task.retry_count, tuning.max_chunk_retry_attempts)
                .await?;
        }
        Ok(())
    }

    /// Vitalidad: agentes con silencio de latido se declaran inactivos y
    /// sus tareas en vuelo entran al circuito de reconexión.
    #[instrument(skip(self))]
    pub async fn sweep_silent_agents(&self) -> Result<()> {
        let tuning = self.application_state.current_tuning();
        let silence_threshold =
            Utc::now() - ChronoDuration::seconds(tuning.agent_silence_threshold_seconds as i64);

        let silent_agents = self
            .application_state
            .agents()
            .mark_silent_agents_inactive(silence_threshold)
            .await?;

        for agent_id in silent_agents {
            self.on_agent_disconnect(agent_id).await?;
        }
        Ok(())
    }
}

/// Daemon perpetuo: barrido de gracia y vitalidad en cadencia fija.
pub async fn spawn_reconnect_sweeper(application_state: AppState) {
    let mut sweep_ticker = interval(Duration::from_secs(SWEEP_INTERVAL_SECONDS));

    tokio::spawn(async move {
        info!("💀 [RECONNECT]: Grace & liveness sweeper daemon initiated.");
        let supervisor = ReconnectSupervisor::new(application_state);

        loop {
            sweep_ticker.tick().await;

            if let Err(sweep_fault) = supervisor.sweep_expired_grace().await {
                warn!("⚠️ [RECONNECT]: Grace sweep failed: {}", sweep_fault);
            }
            if let Err(sweep_fault) = supervisor.sweep_silent_agents().await {
                warn!("⚠️ [RECONNECT]: Liveness sweep failed: {}", sweep_fault);
            }
        }
    });
}
