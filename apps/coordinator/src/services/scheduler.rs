// [apps/coordinator/src/services/scheduler.rs]
/*!
 * =================================================================
 * APARATO: SCHEDULER LOOP SERVICE
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: EMPAREJAMIENTO TRABAJO-AGENTE Y CADENA DE ASIGNACIÓN
 *
 * # Invariante (Assignment Protocol):
 * El fragmento pasa a 'assigned' ANTES de la escritura en el canal; un
 * fallo de envío lo revierte a 'pending' y deja al agente libre. Tras
 * el envío exitoso el agente queda busy con sus punteros de tarea.
 * =================================================================
 */

use crate::services::benchmarks::BenchmarkCoordinator;
use crate::services::planner::{ChunkPlannerService, PlanOutcome};
use crate::state::AppState;
use anyhow::Result;
use chrono::Utc;
use krakenhashes_domain_models::{Agent, AgentStatus, JobExecution, JobStatus, SystemTuning};
use krakenhashes_infra_db::DbError;
use krakenhashes_infra_protocol::{DispatchFrame, JobStopPayload, StopReason, SyncRequestPayload};
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::interval;
use tracing::{debug, error, info, instrument, warn};

/// Resultado del intento de asignación de un fragmento a un agente.
enum AssignmentVerdict {
    /// Fragmento despachado; el agente queda ocupado.
    Assigned,
    /// Benchmark forzado en vuelo; el agente queda reservado.
    BenchmarkDispatched,
    /// El agente sigue libre (reversión o plan no viable).
    AgentLeftIdle,
    /// El trabajo no tiene más keyspace por asignar.
    JobExhausted,
}

pub struct SchedulerService {
    application_state: AppState,
}

impl SchedulerService {
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    /// Pasada completa de planificación: refresco de afinación, selección
    /// por prioridad, asignación y desalojo de alta prioridad.
    #[instrument(skip(self))]
    pub async fn run_scheduling_pass(&self) -> Result<()> {
        let tuning = self.application_state.settings().load_tuning().await?;
        self.application_state.replace_tuning(tuning.clone());

        let dispatchable_jobs = self.application_state.jobs().fetch_dispatchable_by_priority().await?;
        if dispatchable_jobs.is_empty() {
            return Ok(());
        }

        let mut idle_pool = self.collect_idle_agents().await?;
        let mut starved_override_jobs: Vec<JobExecution> = Vec::new();

        for job in &dispatchable_jobs {
            let assigned_any = self.dispatch_job_to_pool(job, &mut idle_pool, &tuning).await?;

            if !assigned_any
                && job.status == JobStatus::Pending
                && job.allow_high_priority_override
                && idle_pool.is_empty()
            {
                starved_override_jobs.push(job.clone());
            }
        }

        // DESALOJO DE ALTA PRIORIDAD: solo con la piscina agotada.
        for starved_job in &starved_override_jobs {
            self.attempt_preemption(starved_job, &tuning).await?;
        }

        Ok(())
    }

    /// Piscina de agentes elegibles: conectados, habilitados, libres,
    /// sincronizados, dentro de ventana y sin benchmark colgante.
    async fn collect_idle_agents(&self) -> Result<Vec<Agent>> {
        let connected: HashSet<i64> = self
            .application_state
            .registry()
            .connected_agent_ids()
            .into_iter()
            .collect();

        let now = Utc::now();
        let mut idle_pool = Vec::new();

        for agent in self.application_state.agents().fetch_all().await? {
            if !connected.contains(&agent.id) {
                continue;
            }
            if agent.status != AgentStatus::Active || !agent.enabled || !agent.sync_status {
                continue;
            }
            if agent.metadata.busy_status || agent.metadata.pending_benchmark_job.is_some() {
                continue;
            }
            if let Some(schedule) = &agent.schedule {
                if !schedule.is_open_at(now) {
                    debug!("🕰️ [SCHEDULER]: Agent #{} outside dispatch window.", agent.id);
                    continue;
                }
            }
            idle_pool.push(agent);
        }

        Ok(idle_pool)
    }

    /// Asigna fragmentos del trabajo a la piscina hasta agotar cupo,
    /// keyspace o piscina. Devuelve true si algo fue asignado.
    async fn dispatch_job_to_pool(
        &self,
        job: &JobExecution,
        idle_pool: &mut Vec<Agent>,
        tuning: &SystemTuning,
    ) -> Result<bool> {
        if idle_pool.is_empty() {
            return Ok(false);
        }

        // Compatibilidad de binario y guardia de fallos consecutivos.
        let binary_label = match self.application_state.catalog().fetch_binary(job.binary_version_id).await {
            Ok(descriptor) => descriptor.version_label.unwrap_or_default(),
            Err(DbError::ResourceNotFound(resource)) => {
                self.surface_configuration_fault(job, &format!("missing binary {}", resource)).await?;
                return Ok(false);
            }
            Err(other) => return Err(other.into()),
        };

        let mut eligible_indices: Vec<usize> = Vec::new();
        for (index, agent) in idle_pool.iter().enumerate() {
            if !agent.accepts_binary_version(&binary_label) {
                continue;
            }
            let failure_streak = self
                .application_state
                .agents()
                .consecutive_failures(agent.id, &job.id.to_string())
                .await?;
            if failure_streak >= tuning.max_consecutive_failures {
                debug!(
                    "📉 [SCHEDULER]: Agent #{} skipped for job [{}] (failure streak {}).",
                    agent.id, job.id, failure_streak
                );
                continue;
            }
            eligible_indices.push(index);
        }

        // Prioridad para quien completó el benchmark forzado del trabajo.
        eligible_indices.sort_by_key(|index| {
            let agent = &idle_pool[*index];
            if agent.metadata.forced_benchmark_completed_for_job == Some(job.id) {
                0
            } else {
                1
            }
        });

        let mut assigned_any = false;
        let mut consumed_indices: Vec<usize> = Vec::new();

        for index in eligible_indices {
            // Cupo de agentes por trabajo (0 = ilimitado).
            if job.max_agents > 0 {
                let active_agents = self
                    .application_state
                    .tasks()
                    .count_distinct_agents_for_job(job.id)
                    .await?;
                if active_agents >= job.max_agents as u64 {
                    break;
                }
            }

            let agent = idle_pool[index].clone();
            match self.assign_next_chunk(job, &agent, tuning).await? {
                AssignmentVerdict::Assigned => {
                    assigned_any = true;
                    consumed_indices.push(index);
                }
                AssignmentVerdict::BenchmarkDispatched => {
                    consumed_indices.push(index);
                }
                AssignmentVerdict::AgentLeftIdle => {}
                AssignmentVerdict::JobExhausted => break,
            }
        }

        // Compactación de la piscina (índices consumidos, de mayor a menor).
        consumed_indices.sort_unstable_by(|left, right| right.cmp(left));
        for index in consumed_indices {
            idle_pool.remove(index);
        }

        Ok(assigned_any)
    }

    /// Cadena de custodia de un fragmento para un agente concreto.
    async fn assign_next_chunk(
        &self,
        job: &JobExecution,
        agent: &Agent,
        tuning: &SystemTuning,
    ) -> Result<AssignmentVerdict> {
        let planner = ChunkPlannerService::new(self.application_state.clone());

        let outcome = match planner.plan_next_task(job, agent.id, tuning).await {
            Ok(outcome) => outcome,
            Err(plan_fault) => {
                // Error de configuración en tiempo de plan: primer
                // fragmento => el trabajo entero falla.
                self.surface_configuration_fault(job, &plan_fault.to_string()).await?;
                return Ok(AssignmentVerdict::AgentLeftIdle);
            }
        };

        match outcome {
            PlanOutcome::BenchmarkRequired => {
                let benchmark_coordinator = BenchmarkCoordinator::new(self.application_state.clone());
                benchmark_coordinator.request_forced_benchmark(job, agent.id, tuning).await?;
                Ok(AssignmentVerdict::BenchmarkDispatched)
            }

            PlanOutcome::KeyspaceExhausted => Ok(AssignmentVerdict::JobExhausted),

            PlanOutcome::Planned { task, mut assignment } => {
                // Enriquecimiento con el contexto del agente.
                assignment.extra_parameters = agent.extra_parameters.clone();
                assignment.enabled_devices =
                    self.application_state.agents().enabled_devices_payload(agent.id).await?;

                self.application_state.tasks().create_task(&task).await?;

                // PROTOCOLO: assigned ANTES del envío; reversión si falla.
                if !self.application_state.tasks().mark_assigned(task.id, agent.id).await? {
                    warn!("⚔️ [SCHEDULER]: Chunk [{}] claimed by another pass.", task.id);
                    return Ok(AssignmentVerdict::AgentLeftIdle);
                }

                // Pre-sincronización: un corte de reglas recién creado debe
                // descargarse antes de que el motor arranque.
                if task.is_rule_split {
                    let sync_frame = DispatchFrame::SyncRequest(SyncRequestPayload {
                        request_id: uuid::Uuid::new_v4(),
                        file_types: vec!["rule_chunk".to_string()],
                    });
                    if let Err(sync_fault) =
                        self.application_state.registry().send_to_agent(agent.id, sync_frame).await
                    {
                        debug!(
                            "📪 [SCHEDULER]: sync_request to agent #{} undeliverable: {}",
                            agent.id, sync_fault
                        );
                    }
                }

                let frame = DispatchFrame::TaskAssignment(assignment);
                if let Err(dispatch_fault) =
                    self.application_state.registry().send_to_agent(agent.id, frame).await
                {
                    warn!(
                        "↩️ [SCHEDULER]: Dispatch to agent #{} failed ({}); chunk reverted.",
                        agent.id, dispatch_fault
                    );
                    self.application_state.tasks().revert_to_pending(task.id).await?;
                    return Ok(AssignmentVerdict::AgentLeftIdle);
                }

                // Sellado post-envío: agente ocupado con punteros frescos.
                let task_reference = task.id;
                let job_reference = job.id;
                self.application_state
                    .agents()
                    .apply_metadata_patch(agent.id, |metadata| {
                        metadata.busy_status = true;
                        metadata.current_task_id = Some(task_reference);
                        metadata.current_job_id = Some(job_reference);
                        if metadata.forced_benchmark_completed_for_job == Some(job_reference) {
                            metadata.forced_benchmark_completed_for_job = None;
                        }
                    })
                    .await?;

                self.application_state.jobs().mark_running_if_pending(job.id).await?;

                info!(
                    "🚀 [SCHEDULER]: Chunk #{} of job [{}] dispatched to agent #{}.",
                    task.chunk_number, job.id, agent.id
                );
                Ok(AssignmentVerdict::Assigned)
            }
        }
    }

    /// Desalojo de alta prioridad: la víctima es el trabajo corriendo de
    /// menor prioridad dentro del margen configurado.
    async fn attempt_preemption(&self, starved_job: &JobExecution, tuning: &SystemTuning) -> Result<()> {
        let running_jobs = self.application_state.jobs().fetch_running_jobs().await?;

        let victim = running_jobs.into_iter().find(|candidate| {
            candidate.id != starved_job.id
                && starved_job.priority > candidate.priority
                && (starved_job.priority - candidate.priority) >= tuning.high_priority_override_margin
        });

        let Some(victim_job) = victim else {
            return Ok(());
        };

        let victim_tasks = self.application_state.tasks().fetch_occupying_for_job(victim_job.id).await?;
        if victim_tasks.is_empty() {
            return Ok(());
        }

        info!(
            "⚔️ [SCHEDULER]: Job [{}] (priority {}) preempting job [{}] (priority {}).",
            starved_job.id, starved_job.priority, victim_job.id, victim_job.priority
        );

        for task in &victim_tasks {
            if let Some(agent_id) = task.agent_id {
                let stop_frame = DispatchFrame::JobStop(JobStopPayload {
                    task_id: task.id,
                    reason: StopReason::Preempted,
                });
                if let Err(dispatch_fault) =
                    self.application_state.registry().send_to_agent(agent_id, stop_frame).await
                {
                    warn!(
                        "⚠️ [SCHEDULER]: Preemption stop to agent #{} undeliverable: {}",
                        agent_id, dispatch_fault
                    );
                }

                self.application_state.tasks().reset_for_preemption(task.id).await?;
                self.application_state
                    .agents()
                    .apply_metadata_patch(agent_id, |metadata| {
                        metadata.busy_status = false;
                        metadata.current_task_id = None;
                        metadata.current_job_id = None;
                    })
                    .await?;
            }
        }

        // Los agentes liberados se asignan en la pasada inmediata.
        self.application_state.wake_scheduler();
        Ok(())
    }

    /// Error de configuración en tiempo de plan (§ taxonomía): sin tareas
    /// previas el trabajo entero falla con mensaje descriptivo.
    async fn surface_configuration_fault(&self, job: &JobExecution, fault_text: &str) -> Result<()> {
        let existing_chunks = self.application_state.tasks().next_chunk_number(job.id).await? - 1;

        if existing_chunks == 0 {
            error!(
                "❌ [SCHEDULER]: Job [{}] failed at plan time: {}",
                job.id, fault_text
            );
            self.application_state.jobs().fail_job(job.id, fault_text).await?;
        } else {
            warn!(
                "⚠️ [SCHEDULER]: Job [{}] plan fault tolerated ({} chunks already live): {}",
                job.id, existing_chunks, fault_text
            );
        }
        Ok(())
    }
}

/// Daemon del bucle de planificación: tick fijo + campana de despertar.
pub async fn spawn_scheduler_daemon(application_state: AppState) {
    tokio::spawn(async move {
        let initial_tick = application_state.current_tuning().scheduler_tick_seconds;
        let mut scheduling_ticker = interval(Duration::from_secs(initial_tick.max(1)));
        let scheduler = SchedulerService::new(application_state.clone());

        info!("🗓️ [SCHEDULER]: Scheduling loop daemon initiated ({}s tick).", initial_tick);

        loop {
            tokio::select! {
                _ = scheduling_ticker.tick() => {},
                _ = application_state.scheduler_wakeup() => {},
            }

            if let Err(pass_fault) = scheduler.run_scheduling_pass().await {
                error!("💥 [SCHEDULER]: Scheduling pass collapsed: {}", pass_fault);
            }
        }
    });
}
