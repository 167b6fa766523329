// [apps/coordinator/src/services/intake.rs]
/*!
 * =================================================================
 * APARATO: JOB INTAKE SERVICE
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: ALTA DE TRABAJOS CON PLAN DE KEYSPACE Y CAPAS
 *
 * El calculador de keyspace es puro: este servicio solo resuelve las
 * magnitudes (líneas, conteos) contra el catálogo y persiste el plan.
 * =================================================================
 */

use crate::state::AppState;
use anyhow::{anyhow, Result};
use chrono::Utc;
use krakenhashes_domain_models::{
    AttackMode, IncrementLayer, JobExecution, JobStatus, LayerStatus,
};
use krakenhashes_domain_scheduling::KeyspaceInputs;
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

/// Solicitud administrativa de alta de trabajo.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSubmissionRequest {
    pub hashlist_id: i64,
    /// Código numérico del motor (0, 1, 3, 6, 7, 9).
    pub attack_mode: u8,
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub max_agents: u32,
    #[serde(default)]
    pub wordlist_ids: Vec<i64>,
    #[serde(default)]
    pub rule_ids: Vec<i64>,
    #[serde(default)]
    pub mask: Option<String>,
    #[serde(default)]
    pub custom_charsets: Vec<String>,
    #[serde(default)]
    pub increment_mode: bool,
    #[serde(default)]
    pub increment_min: Option<u32>,
    #[serde(default)]
    pub increment_max: Option<u32>,
    #[serde(default)]
    pub allow_high_priority_override: bool,
    pub binary_version_id: i64,
    #[serde(default)]
    pub chunk_duration_override: Option<u64>,
}

fn default_priority() -> u8 {
    5
}

pub struct JobIntakeService {
    application_state: AppState,
}

impl JobIntakeService {
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    /// Alta completa: resolución de magnitudes, plan de keyspace, decisión
    /// de rule splitting y persistencia de trabajo + capas.
    #[instrument(skip(self, request), fields(hashlist_id = request.hashlist_id))]
    pub async fn submit_job(&self, request: JobSubmissionRequest) -> Result<JobExecution> {
        let attack_mode = AttackMode::from_engine_code(request.attack_mode)
            .ok_or_else(|| anyhow!("INTAKE_FAULT: unknown attack mode {}", request.attack_mode))?;

        let priority = request.priority.clamp(1, 10);

        // 1. MAGNITUDES DESDE EL CATÁLOGO
        let hashlist = self.application_state.hashlists().fetch_hashlist(request.hashlist_id).await?;
        let wordlists = self.application_state.catalog().fetch_wordlists(&request.wordlist_ids).await?;
        let rules = self.application_state.catalog().fetch_rules(&request.rule_ids).await?;
        self.application_state.catalog().fetch_binary(request.binary_version_id).await?;

        let wordlist_lines: Vec<u64> = wordlists.iter().map(|descriptor| descriptor.line_count).collect();
        let rule_lines: Vec<u64> = rules.iter().map(|descriptor| descriptor.line_count).collect();

        // 2. PLAN DE KEYSPACE (cálculo puro)
        let keyspace_plan = KeyspaceInputs {
            attack_mode,
            wordlist_line_counts: &wordlist_lines,
            rule_line_counts: &rule_lines,
            mask: request.mask.as_deref(),
            custom_charsets: &request.custom_charsets,
            increment_mode: request.increment_mode,
            increment_min: request.increment_min,
            increment_max: request.increment_max,
            hash_count: hashlist.total_hashes,
        }
        .compute()?;

        // 3. DECISIÓN DE RULE SPLITTING (umbral del factor de reglas)
        let tuning = self.application_state.settings().load_tuning().await?;
        let uses_rule_splitting = keyspace_plan.multiplication_factor >= tuning.rule_split_threshold
            && request.rule_ids.len() == 1
            && !request.increment_mode;

        let now = Utc::now();
        let job = JobExecution {
            id: Uuid::new_v4(),
            hashlist_id: request.hashlist_id,
            attack_mode,
            priority,
            max_agents: request.max_agents,
            wordlist_ids: request.wordlist_ids.clone(),
            rule_ids: request.rule_ids.clone(),
            mask: request.mask.clone(),
            custom_charsets: request.custom_charsets.clone(),
            increment_mode: request.increment_mode,
            increment_min: request.increment_min,
            increment_max: request.increment_max,
            base_keyspace: Some(keyspace_plan.base_keyspace),
            multiplication_factor: keyspace_plan.multiplication_factor,
            effective_keyspace: Some(keyspace_plan.effective_keyspace_estimate),
            is_accurate_keyspace: false,
            avg_rule_multiplier: 1.0,
            uses_rule_splitting,
            allow_high_priority_override: request.allow_high_priority_override,
            binary_version_id: request.binary_version_id,
            chunk_duration_override: request.chunk_duration_override,
            overall_progress_percent: 0.0,
            status: JobStatus::Pending,
            error_message: None,
            created_at: now,
            updated_at: now,
        };

        self.application_state.jobs().create_job(&job).await?;

        // 4. CAPAS INCREMENTALES (una por longitud de prefijo)
        if !keyspace_plan.layers.is_empty() {
            let layers: Vec<IncrementLayer> = keyspace_plan
                .layers
                .iter()
                .map(|layer_plan| IncrementLayer {
                    id: Uuid::new_v4(),
                    job_id: job.id,
                    layer_index: layer_plan.layer_index,
                    mask: layer_plan.mask.clone(),
                    base_keyspace: layer_plan.base_keyspace,
                    effective_keyspace: layer_plan.effective_keyspace_estimate,
                    is_accurate_keyspace: false,
                    status: LayerStatus::Pending,
                })
                .collect();
            self.application_state.jobs().create_increment_layers(&layers).await?;
        }

        info!(
            "✨ [INTAKE]: Job [{}] registered (base {}, factor {}, estimate {}, rule_split {}).",
            job.id,
            keyspace_plan.base_keyspace,
            keyspace_plan.multiplication_factor,
            keyspace_plan.effective_keyspace_estimate,
            uses_rule_splitting
        );

        self.application_state.wake_scheduler();
        Ok(job)
    }
}
