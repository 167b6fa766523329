// [apps/coordinator/src/services/cracks.rs]
/*!
 * =================================================================
 * APARATO: CRACK PIPELINE SERVICE
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4)
 * RESPONSABILIDAD: INGESTA MASIVA DE CRACKS, MITADES LM Y PROPAGACIÓN NTLM
 *
 * # Invariante (Conteo contra Esperado):
 * Los lotes de cracks llegan sin orden global; el fragmento cierra
 * cuando received >= expected Y la señal de fin de lotes llegó. El
 * desorden entre lotes queda absorbido por el conteo.
 * =================================================================
 */

use crate::services::lifecycle::TaskLifecycleService;
use crate::state::AppState;
use anyhow::Result;
use krakenhashes_domain_models::{
    CrackedHash, HashRecord, TaskChunk, TaskStatus, LM_BLANK_HALF, LM_HALF_LENGTH,
};
use krakenhashes_infra_db::repositories::{CrackUpdate, PotfileEntry};
use krakenhashes_infra_db::{execute_with_retry, DbError};
use krakenhashes_infra_protocol::{CrackBatchPayload, CrackBatchesCompletePayload};
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Tipo de hash LM (mitades independientes).
const HASH_TYPE_LM: i64 = 3000;
/// Tipo de hash NTLM (propagación hacia el hermano LM).
const HASH_TYPE_NTLM: i64 = 1000;

pub struct CrackPipeline {
    application_state: AppState,
}

impl CrackPipeline {
    pub fn new(application_state: AppState) -> Self {
        Self { application_state }
    }

    // --- PUNTOS DE ENTRADA ---

    /// Lote desacoplado (frame crack_batch) con validación de propiedad.
    #[instrument(skip(self, payload), fields(task_id = %payload.task_id))]
    pub async fn process_batch(&self, agent_id: i64, payload: CrackBatchPayload) -> Result<()> {
        let task = match self.application_state.tasks().fetch_task(payload.task_id).await {
            Ok(task) => task,
            Err(DbError::TaskNotFound) => {
                debug!("👻 [CRACKS]: Batch for unknown task [{}] dropped.", payload.task_id);
                return Ok(());
            }
            Err(other) => return Err(other.into()),
        };

        if task.status == TaskStatus::Cancelled {
            debug!("🔇 [CRACKS]: Batch for cancelled task [{}] ignored.", task.id);
            return Ok(());
        }

        if task.agent_id != Some(agent_id) {
            warn!(
                "🚫 [CRACKS]: Agent #{} submitted batch for task [{}] it does not own; rejected.",
                agent_id, task.id
            );
            return Ok(());
        }

        if !payload.cracked_hashes.is_empty() {
            self.ingest_for_task(&task, &payload.cracked_hashes).await?;
        }

        let fresh = self
            .application_state
            .tasks()
            .add_received_cracks(task.id, payload.cracked_hashes.len() as u64)
            .await?;

        self.try_close_draining_task(&fresh).await
    }

    /// Señal de cierre del flujo de lotes de una tarea.
    #[instrument(skip(self, payload), fields(task_id = %payload.task_id))]
    pub async fn handle_batches_complete(
        &self,
        agent_id: i64,
        payload: CrackBatchesCompletePayload,
    ) -> Result<()> {
        let fresh = match self.application_state.tasks().mark_batches_complete(payload.task_id).await {
            Ok(task) => task,
            Err(DbError::TaskNotFound) => {
                debug!("👻 [CRACKS]: Completion signal for unknown task [{}] dropped.", payload.task_id);
                return Ok(());
            }
            Err(other) => return Err(other.into()),
        };

        if fresh.agent_id != Some(agent_id) && fresh.agent_id.is_some() {
            warn!(
                "🚫 [CRACKS]: Agent #{} signalled completion for foreign task [{}].",
                agent_id, fresh.id
            );
            return Ok(());
        }

        self.try_close_draining_task(&fresh).await
    }

    /// Readiness del drenaje: received >= expected ∧ batches_complete.
    async fn try_close_draining_task(&self, task: &TaskChunk) -> Result<()> {
        if task.status == TaskStatus::Processing && task.is_drain_complete() {
            let lifecycle = TaskLifecycleService::new(self.application_state.clone());
            lifecycle.complete_task(task.id).await?;
        }
        Ok(())
    }

    // --- NÚCLEO DE INGESTA ---

    /// Ingesta un conjunto de cracks contra el inventario canónico.
    /// Reintenta fallos transitorios del sustrato (deadlock, contención,
    /// corte, timeout) con backoff acotado.
    #[instrument(skip(self, task, cracks), fields(task_id = %task.id, crack_count = cracks.len()))]
    pub async fn ingest_for_task(&self, task: &TaskChunk, cracks: &[CrackedHash]) -> Result<u64> {
        let job = self.application_state.jobs().fetch_job(task.job_id).await?;
        let hashlist = self.application_state.hashlists().fetch_hashlist(job.hashlist_id).await?;

        let staged = if hashlist.hash_type_id == HASH_TYPE_LM {
            self.stage_lm_cracks(cracks).await?
        } else {
            self.stage_plain_cracks(cracks, hashlist.hash_type_id).await?
        };

        if staged.updates.is_empty() {
            return Ok(0);
        }

        // ESCRITURA TRANSACCIONAL CON REINTENTO ACOTADO
        let updates_reference = &staged.updates;
        let hash_repository = self.application_state.hashes();
        let affected = execute_with_retry("crack_commit", || {
            let repository = &hash_repository;
            let updates = updates_reference.clone();
            async move { repository.apply_crack_updates(&updates).await }
        })
        .await?;

        // VALIDACIÓN DE FILAS AFECTADAS: una discrepancia señala cracks
        // concurrentes o corrupción; se registra en severidad crítica y
        // el pipeline continúa.
        if affected != staged.updates.len() as u64 {
            error!(
                "🚨 [CRACKS_CRITICAL]: Affected-row mismatch: {} committed of {} queued.",
                affected,
                staged.updates.len()
            );
        }

        // CONTADORES POR HASHLIST (serializados por fila de hashlist)
        let updated_ids: Vec<Uuid> = staged.updates.iter().map(|update| update.hash_id).collect();
        let affected_hashlists = self.application_state.hashes().fetch_affected_hashlists(&updated_ids).await?;
        for (hashlist_id, crack_delta) in &affected_hashlists {
            self.application_state
                .hashlists()
                .increment_cracked_count(*hashlist_id, *crack_delta)
                .await?;
        }

        // POTFILE STAGING (honrando exclusiones de cliente y hashlist)
        self.stage_potfile_entries(&hashlist.client_id, hashlist.excluded_from_potfile, &staged).await?;

        info!(
            "💾 [CRACKS]: {} cracks committed across {} hashlists (task [{}]).",
            affected,
            affected_hashlists.len(),
            task.id
        );
        Ok(affected)
    }

    /// Ruta estándar (no LM): lookup exacto, dedup y propagación NTLM->LM.
    async fn stage_plain_cracks(&self, cracks: &[CrackedHash], hash_type: i64) -> Result<StagedCracks> {
        let hash_values: Vec<String> = cracks.iter().map(|crack| crack.hash.clone()).collect();
        let records = self.application_state.hashes().bulk_fetch_by_values(&hash_values).await?;

        let mut by_value: HashMap<&str, Vec<&HashRecord>> = HashMap::new();
        for record in &records {
            by_value.entry(record.hash_value.as_str()).or_default().push(record);
        }

        let mut staged = StagedCracks::default();
        let mut already_staged: HashSet<Uuid> = HashSet::new();

        for crack in cracks {
            let Some(matched_records) = by_value.get(crack.hash.as_str()) else {
                // Hash fuera del inventario: violación tolerada del protocolo.
                debug!("👻 [CRACKS]: Value [{}] not in canonical inventory.", crack.hash);
                continue;
            };

            for record in matched_records {
                if record.is_cracked || !already_staged.insert(record.id) {
                    continue;
                }

                staged.updates.push(CrackUpdate {
                    hash_id: record.id,
                    password: crack.plain.clone(),
                });
                staged.potfile.push((record.hash_value.clone(), crack.plain.clone()));

                // PROPAGACIÓN NTLM -> LM: el hermano LM no crackeado recibe
                // la contraseña en mayúsculas.
                if hash_type == HASH_TYPE_NTLM {
                    if let Some(lm_sibling) =
                        self.application_state.hashes().fetch_uncracked_lm_sibling(record.id).await?
                    {
                        if already_staged.insert(lm_sibling.id) {
                            let uppercased = crack.plain.to_uppercase();
                            staged.potfile.push((lm_sibling.hash_value.clone(), uppercased.clone()));
                            staged.updates.push(CrackUpdate {
                                hash_id: lm_sibling.id,
                                password: uppercased,
                            });
                            info!(
                                "🔗 [CRACKS]: NTLM crack propagated to LM sibling [{}].",
                                lm_sibling.id
                            );
                        }
                    }
                }
            }
        }

        Ok(staged)
    }

    /// Ruta LM: el motor reporta UNA mitad de 16 chars por crack. La fila
    /// principal solo se sella cuando ambas mitades están resueltas.
    async fn stage_lm_cracks(&self, cracks: &[CrackedHash]) -> Result<StagedCracks> {
        let mut staged = StagedCracks::default();
        let mut finalized: HashSet<Uuid> = HashSet::new();

        for crack in cracks {
            let half_value = crack.hash.to_lowercase();
            if half_value.len() != LM_HALF_LENGTH {
                debug!("👻 [CRACKS]: Malformed LM half [{}] dropped.", crack.hash);
                continue;
            }

            let candidates = self.application_state.hashes().fetch_lm_candidates(&half_value).await?;
            for record in &candidates {
                if record.is_cracked || finalized.contains(&record.id) {
                    continue;
                }

                let full_value = record.hash_value.to_lowercase();
                let first_half = &full_value[..LM_HALF_LENGTH];
                let second_half = &full_value[LM_HALF_LENGTH..];

                self.application_state.hashes().ensure_lm_metadata(record.id).await?;

                // Sellado de la(s) mitad(es) que coinciden con el valor.
                if first_half == half_value {
                    self.application_state
                        .hashes()
                        .seal_lm_half(record.id, true, &crack.plain)
                        .await?;
                }
                if second_half == half_value {
                    self.application_state
                        .hashes()
                        .seal_lm_half(record.id, false, &crack.plain)
                        .await?;
                }

                // Auto-completado de la mitad en blanco constante.
                if first_half == LM_BLANK_HALF {
                    self.application_state.hashes().seal_lm_half(record.id, true, "").await?;
                }
                if second_half == LM_BLANK_HALF {
                    self.application_state.hashes().seal_lm_half(record.id, false, "").await?;
                }

                // FINALIZACIÓN: con ambas mitades, la fila principal se
                // sella con la contraseña concatenada y cuenta como crack
                // pleno (contadores y potfile).
                if let Some(state) = self.application_state.hashes().fetch_lm_state(record.id).await? {
                    if state.both_halves_cracked() {
                        if let Some(full_password) = state.concatenated_password() {
                            finalized.insert(record.id);
                            staged.potfile.push((record.hash_value.clone(), full_password.clone()));
                            staged.updates.push(CrackUpdate {
                                hash_id: record.id,
                                password: full_password,
                            });
                            info!("🧩 [CRACKS]: LM hash [{}] finalized from dual halves.", record.id);
                        }
                    }
                }
            }
        }

        Ok(staged)
    }

    /// Encolado del potfile honrando la llave global y las exclusiones.
    async fn stage_potfile_entries(
        &self,
        client_id: &Option<i64>,
        hashlist_excluded: bool,
        staged: &StagedCracks,
    ) -> Result<()> {
        if staged.potfile.is_empty() || !self.application_state.current_tuning().potfile_enabled {
            return Ok(());
        }
        if hashlist_excluded {
            return Ok(());
        }
        if let Some(client) = client_id {
            if self.application_state.hashlists().is_client_excluded_from_potfile(*client).await? {
                return Ok(());
            }
        }

        let entries: Vec<PotfileEntry> = staged
            .potfile
            .iter()
            .map(|(hash_value, password)| PotfileEntry {
                hash_value: hash_value.clone(),
                password: password.clone(),
                hashlist_id: None,
            })
            .collect();

        self.application_state.potfile().stage_entries(&entries).await?;
        Ok(())
    }
}

/// Acumulador de escrituras y entradas de potfile de un lote.
#[derive(Default)]
struct StagedCracks {
    updates: Vec<CrackUpdate>,
    potfile: Vec<(String, String)>,
}
