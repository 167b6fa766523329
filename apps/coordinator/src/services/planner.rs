// [apps/coordinator/src/services/planner.rs]
/*!
 * =================================================================
 * APARATO: CHUNK PLANNER SERVICE
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: DERIVACIÓN DEL PRÓXIMO FRAGMENTO POR (TRABAJO, AGENTE)
 *
 * # Invariante (Frontier Continuity):
 * El próximo fragmento arranca exactamente en MAX(keyspace_end) del
 * trabajo (o capa); el último fragmento absorbe el remanente y cierra
 * en el keyspace base exacto.
 * =================================================================
 */

use crate::state::AppState;
use anyhow::{anyhow, Result};
use chrono::Utc;
use krakenhashes_domain_models::{
    IncrementLayer, JobExecution, ResourceDescriptor, SystemTuning, TaskChunk, TaskStatus,
};
use krakenhashes_domain_scheduling::{next_base_range, plan_rule_slices, target_chunk_size, RuleSlice};
use krakenhashes_infra_db::DbError;
use krakenhashes_infra_protocol::TaskAssignmentPayload;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Formato de outfile del motor: hash[:salt]:plain.
const ENGINE_OUTPUT_FORMAT: &str = "3";

/// Veredicto del planificador para un par (trabajo, agente).
pub enum PlanOutcome {
    /// Fragmento listo para la cadena de custodia de asignación.
    Planned {
        task: TaskChunk,
        assignment: TaskAssignmentPayload,
    },
    /// El agente no tiene muestra de throughput: benchmark forzado primero.
    BenchmarkRequired,
    /// El keyspace del trabajo (y de todas sus capas) está asignado.
    KeyspaceExhausted,
}

/// Contexto de recursos resuelto contra el catálogo.
pub(crate) struct ResolvedJobResources {
    pub hashlist_path: String,
    pub hash_type: i64,
    pub wordlist_paths: Vec<String>,
    pub rule_descriptors: Vec<ResourceDescriptor>,
    pub rule_paths: Vec<String>,
    pub binary_path: String,
    pub binary_version_label: String,
}

/// Resolución id -> ruta relativa al data root, compartida entre el
/// planificador y el coordinador de benchmarks.
pub(crate) async fn resolve_job_resources(
    application_state: &AppState,
    job: &JobExecution,
) -> Result<ResolvedJobResources, DbError> {
    let hashlist = application_state.hashlists().fetch_hashlist(job.hashlist_id).await?;
    let wordlists = application_state.catalog().fetch_wordlists(&job.wordlist_ids).await?;
    let rules = application_state.catalog().fetch_rules(&job.rule_ids).await?;
    let binary = application_state.catalog().fetch_binary(job.binary_version_id).await?;

    Ok(ResolvedJobResources {
        hashlist_path: format!("hashlists/{}.hash", hashlist.id),
        hash_type: hashlist.hash_type_id,
        wordlist_paths: wordlists.iter().map(|descriptor| descriptor.relative_path.clone()).collect(),
        rule_paths: rules.iter().map(|descriptor| descriptor.relative_path.clone()).collect(),
        rule_descriptors: rules,
        binary_version_label: binary.version_label.clone().unwrap_or_default(),
        binary_path: binary.relative_path,
    })
}

pub struct ChunkPlannerService {
    application_state: AppState,
}

impl ChunkPlannerService {
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    /// Deriva el próximo fragmento del trabajo para el agente dado.
    #[instrument(skip(self, job, tuning), fields(job_id = %job.id))]
    pub async fn plan_next_task(
        &self,
        job: &JobExecution,
        agent_id: i64,
        tuning: &SystemTuning,
    ) -> Result<PlanOutcome> {
        let resources = resolve_job_resources(&self.application_state, job).await?;

        // 1. THROUGHPUT: sin muestra no hay dimensionamiento de fragmento.
        let benchmark_speed = self
            .application_state
            .benchmarks()
            .lookup_benchmark(agent_id, resources.hash_type, job.attack_mode)
            .await?;

        let Some(speed) = benchmark_speed else {
            return Ok(PlanOutcome::BenchmarkRequired);
        };

        let chunk_duration = job
            .chunk_duration_override
            .unwrap_or(tuning.chunk_duration_default_seconds);
        let target_effective = target_chunk_size(speed, chunk_duration);

        // 2. CAPA ACTIVA (modo incremental): el despacho ocurre por capa.
        let current_layer = if job.increment_mode {
            match self.application_state.jobs().fetch_current_layer(job.id).await? {
                Some(layer) => Some(layer),
                None => return Ok(PlanOutcome::KeyspaceExhausted),
            }
        } else {
            None
        };

        // 3. ESTRATEGIA DE PARTICIÓN
        let rule_split_active = job.uses_rule_splitting
            && job.rule_ids.len() == 1
            && current_layer.is_none();

        if rule_split_active {
            self.plan_rule_split_task(job, agent_id, &resources, target_effective, chunk_duration)
                .await
        } else {
            self.plan_keyspace_split_task(
                job,
                agent_id,
                &resources,
                current_layer,
                target_effective,
                chunk_duration,
                tuning,
            )
            .await
        }
    }

    // --- ESTRATO DE RULE SPLITTING ---

    /// Particiona el fichero de reglas en cortes contiguos en disco; cada
    /// tarea hereda el rango base completo y transporta su corte.
    async fn plan_rule_split_task(
        &self,
        job: &JobExecution,
        agent_id: i64,
        resources: &ResolvedJobResources,
        target_effective: u64,
        chunk_duration: u64,
    ) -> Result<PlanOutcome> {
        let base_keyspace = job
            .base_keyspace
            .ok_or_else(|| anyhow!("PLAN_FAULT: job [{}] lacks base keyspace", job.id))?;

        let rule_descriptor = resources
            .rule_descriptors
            .first()
            .ok_or_else(|| anyhow!("PLAN_FAULT: rule splitting without rule file"))?;
        let total_rules = rule_descriptor.line_count;

        let rule_frontier = self.application_state.tasks().rule_frontier_for_job(job.id).await?;
        if rule_frontier >= total_rules {
            return Ok(PlanOutcome::KeyspaceExhausted);
        }

        // Reglas por corte: el objetivo efectivo repartido sobre el base.
        let rules_per_slice = (target_effective / base_keyspace.max(1)).max(1);
        let remaining_slices = plan_rule_slices(total_rules - rule_frontier, rules_per_slice);
        let Some(relative_slice) = remaining_slices.first() else {
            return Ok(PlanOutcome::KeyspaceExhausted);
        };

        let slice = RuleSlice {
            slice_index: relative_slice.slice_index,
            rule_start: rule_frontier + relative_slice.rule_start,
            rule_end: rule_frontier + relative_slice.rule_end,
        };

        let chunk_number = self.application_state.tasks().next_chunk_number(job.id).await?;
        let chunk_relative_path = self
            .materialize_rule_slice(job.id, rule_descriptor, &slice, chunk_number)
            .await?;

        let effective_start = self.application_state.tasks().effective_frontier_for_job(job.id).await?;
        let estimated_width =
            ((base_keyspace as f64) * (slice.rule_count() as f64) * job.avg_rule_multiplier.max(0.0)).round()
                as u64;

        let mut task = self.build_task_shell(
            job,
            agent_id,
            chunk_number,
            0,
            base_keyspace,
            effective_start,
            effective_start.saturating_add(estimated_width),
            chunk_duration,
        );
        task.is_rule_split = true;
        task.is_keyspace_split = false;
        task.rule_start_index = Some(slice.rule_start);
        task.rule_end_index = Some(slice.rule_end);
        task.rule_chunk_path = Some(chunk_relative_path.clone());

        let assignment = self.build_assignment(job, &task, resources, vec![chunk_relative_path], None);

        info!(
            "📜 [PLANNER]: Rule slice [{}..{}) of job [{}] planned for agent #{}.",
            slice.rule_start, slice.rule_end, job.id, agent_id
        );
        Ok(PlanOutcome::Planned { task, assignment })
    }

    /// Escribe el corte de reglas bajo rules/chunks/job_<id>/ y devuelve
    /// su ruta relativa al data root.
    async fn materialize_rule_slice(
        &self,
        job_id: Uuid,
        rule_descriptor: &ResourceDescriptor,
        slice: &RuleSlice,
        chunk_number: u32,
    ) -> Result<String> {
        let source_path = self.application_state.data_root().join(&rule_descriptor.relative_path);
        let source_content = fs::read_to_string(&source_path).await.map_err(|fault| {
            anyhow!("PLAN_FAULT: rule file [{}] unreadable: {}", source_path.display(), fault)
        })?;

        let slice_content: String = source_content
            .lines()
            .skip(slice.rule_start as usize)
            .take(slice.rule_count() as usize)
            .map(|line| format!("{}\n", line))
            .collect();

        let chunk_directory_relative = format!("rules/chunks/job_{}", job_id);
        let chunk_filename = format!(
            "chunk_{}_{}_{}.rule",
            chunk_number, slice.rule_start, slice.rule_end
        );
        let chunk_relative = format!("{}/{}", chunk_directory_relative, chunk_filename);

        let chunk_directory = self.application_state.data_root().join(&chunk_directory_relative);
        fs::create_dir_all(&chunk_directory).await?;
        fs::write(chunk_directory.join(&chunk_filename), slice_content).await?;

        debug!("✂️ [PLANNER]: Rule chunk materialized at [{}].", chunk_relative);
        Ok(chunk_relative)
    }

    // --- ESTRATO DE KEYSPACE SPLITTING ---

    async fn plan_keyspace_split_task(
        &self,
        job: &JobExecution,
        agent_id: i64,
        resources: &ResolvedJobResources,
        current_layer: Option<IncrementLayer>,
        target_effective: u64,
        chunk_duration: u64,
        _tuning: &SystemTuning,
    ) -> Result<PlanOutcome> {
        let (frontier, layer_base, layer_reference) = match &current_layer {
            Some(layer) => (
                self.application_state.tasks().keyspace_frontier_for_layer(layer.id).await?,
                layer.base_keyspace,
                Some(layer),
            ),
            None => (
                self.application_state.tasks().keyspace_frontier_for_job(job.id).await?,
                job.base_keyspace
                    .ok_or_else(|| anyhow!("PLAN_FAULT: job [{}] lacks base keyspace", job.id))?,
                None,
            ),
        };

        // Objetivo en unidades base: el efectivo repartido entre las reglas.
        let base_target = (target_effective / job.multiplication_factor.max(1)).max(1);

        let Some((range_start, range_end)) = next_base_range(frontier, layer_base, base_target) else {
            return Ok(PlanOutcome::KeyspaceExhausted);
        };

        let chunk_number = self.application_state.tasks().next_chunk_number(job.id).await?;
        let effective_start = self.application_state.tasks().effective_frontier_for_job(job.id).await?;
        let estimated_width = (((range_end - range_start) as f64)
            * (job.multiplication_factor.max(1) as f64)
            * job.avg_rule_multiplier.max(0.0))
        .round() as u64;

        let mut task = self.build_task_shell(
            job,
            agent_id,
            chunk_number,
            range_start,
            range_end,
            effective_start,
            effective_start.saturating_add(estimated_width),
            chunk_duration,
        );
        task.is_keyspace_split = true;
        task.increment_layer_id = layer_reference.map(|layer| layer.id);

        let layer_mask = layer_reference.map(|layer| layer.mask.clone());
        let assignment =
            self.build_assignment(job, &task, resources, resources.rule_paths.clone(), layer_mask);

        info!(
            "🧮 [PLANNER]: Keyspace slice [{}..{}) of job [{}] planned for agent #{}.",
            range_start, range_end, job.id, agent_id
        );
        Ok(PlanOutcome::Planned { task, assignment })
    }

    // --- CONSTRUCTORES ---

    #[allow(clippy::too_many_arguments)]
    fn build_task_shell(
        &self,
        job: &JobExecution,
        agent_id: i64,
        chunk_number: u32,
        keyspace_start: u64,
        keyspace_end: u64,
        effective_start: u64,
        effective_end: u64,
        chunk_duration: u64,
    ) -> TaskChunk {
        TaskChunk {
            id: Uuid::new_v4(),
            job_id: job.id,
            increment_layer_id: None,
            agent_id: Some(agent_id),
            chunk_number,
            keyspace_start,
            keyspace_end,
            keyspace_processed: 0,
            effective_keyspace_start: effective_start,
            effective_keyspace_end: effective_end,
            chunk_actual_keyspace: None,
            is_actual_keyspace: false,
            is_keyspace_split: false,
            is_rule_split: false,
            rule_start_index: None,
            rule_end_index: None,
            rule_chunk_path: None,
            chunk_duration_seconds: chunk_duration,
            progress_percent: 0.0,
            hash_rate: 0,
            retry_count: 0,
            expected_crack_count: 0,
            received_crack_count: 0,
            batches_complete: false,
            detailed_status: None,
            status: TaskStatus::Pending,
            started_at: None,
            completed_at: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }

    fn build_assignment(
        &self,
        job: &JobExecution,
        task: &TaskChunk,
        resources: &ResolvedJobResources,
        rule_paths: Vec<String>,
        layer_mask_override: Option<String>,
    ) -> TaskAssignmentPayload {
        let is_layer_task = layer_mask_override.is_some();
        let mask = layer_mask_override.or_else(|| job.mask.clone());

        TaskAssignmentPayload {
            task_id: task.id,
            job_id: job.id,
            hashlist_id: job.hashlist_id,
            hashlist_path: resources.hashlist_path.clone(),
            attack_mode: job.attack_mode,
            hash_type: resources.hash_type,
            keyspace_start: task.keyspace_start,
            keyspace_end: task.keyspace_end,
            wordlist_paths: resources.wordlist_paths.clone(),
            rule_paths,
            mask,
            binary_path: resources.binary_path.clone(),
            chunk_duration: task.chunk_duration_seconds,
            report_interval: self.application_state.current_tuning().progress_reporting_interval,
            output_format: ENGINE_OUTPUT_FORMAT.to_string(),
            extra_parameters: None,
            enabled_devices: None,
            is_keyspace_split: task.is_keyspace_split,
            // Los campos incrementales viajan solo en trabajos NO
            // estratificados; una tarea de capa lleva su máscara truncada.
            increment_mode: if is_layer_task { None } else { Some(job.increment_mode) },
            increment_min: if is_layer_task { None } else { job.increment_min },
            increment_max: if is_layer_task { None } else { job.increment_max },
        }
    }
}

/// Purga el directorio de cortes de reglas de un trabajo sellado.
pub async fn cleanup_rule_chunks(application_state: &AppState, job_id: Uuid) {
    let chunk_directory: PathBuf = application_state
        .data_root()
        .join(format!("rules/chunks/job_{}", job_id));

    match fs::remove_dir_all(&chunk_directory).await {
        Ok(_) => info!("🧹 [PLANNER]: Rule chunk directory of job [{}] purged.", job_id),
        Err(fault) if fault.kind() == std::io::ErrorKind::NotFound => {}
        Err(fault) => warn!(
            "⚠️ [PLANNER]: Rule chunk purge of job [{}] failed: {}",
            job_id, fault
        ),
    }
}
