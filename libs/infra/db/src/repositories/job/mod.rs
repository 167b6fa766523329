// [libs/infra/db/src/repositories/job/mod.rs]
/*!
 * =================================================================
 * APARATO: JOB REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: GESTIÓN DEL CICLO DE VIDA DE TRABAJOS Y CAPAS
 *
 * # Invariante (Accuracy Once):
 * Las confirmaciones de keyspace usan el guardia
 * WHERE is_accurate_keyspace = 0: la transición false -> true ocurre
 * exactamente una vez por trabajo y por capa.
 * =================================================================
 */

pub mod queries;

use crate::errors::DbError;
use crate::repositories::{as_bool, parse_timestamp, parse_uuid};
use crate::LedgerClient;
use chrono::Utc;
use libsql::{params, Row};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use krakenhashes_domain_models::{
    AttackMode, IncrementLayer, JobExecution, JobStatus, LayerStatus,
};

use self::queries as sql_registry;

pub struct JobRepository {
    database_client: LedgerClient,
}

impl JobRepository {
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    // --- ESTRATO DE IGNICIÓN ---

    #[instrument(skip(self, job))]
    pub async fn create_job(&self, job: &JobExecution) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        let wordlist_ids_json = serde_json::to_string(&job.wordlist_ids)
            .map_err(|fault| DbError::MappingError(fault.to_string()))?;
        let rule_ids_json = serde_json::to_string(&job.rule_ids)
            .map_err(|fault| DbError::MappingError(fault.to_string()))?;
        let charsets_json = serde_json::to_string(&job.custom_charsets)
            .map_err(|fault| DbError::MappingError(fault.to_string()))?;

        connection
            .execute(
                sql_registry::INSERT_JOB,
                params![
                    job.id.to_string(),
                    job.hashlist_id,
                    job.attack_mode.engine_code() as i64,
                    job.priority as i64,
                    job.max_agents as i64,
                    wordlist_ids_json,
                    rule_ids_json,
                    job.mask.clone(),
                    charsets_json,
                    job.increment_mode as i64,
                    job.increment_min.map(|value| value as i64),
                    job.increment_max.map(|value| value as i64),
                    job.base_keyspace.map(|value| value as i64),
                    job.multiplication_factor as i64,
                    job.effective_keyspace.map(|value| value as i64),
                    job.is_accurate_keyspace as i64,
                    job.avg_rule_multiplier,
                    job.uses_rule_splitting as i64,
                    job.allow_high_priority_override as i64,
                    job.binary_version_id,
                    job.chunk_duration_override.map(|value| value as i64),
                    job.overall_progress_percent,
                    job.status.as_str(),
                    job.error_message.clone(),
                    job.created_at.to_rfc3339(),
                    job.updated_at.to_rfc3339()
                ],
            )
            .await?;

        info!("✨ [JOB_REPO]: Job [{}] registered (priority {}).", job.id, job.priority);
        Ok(())
    }

    // --- ESTRATO DE CONSULTA ---

    pub async fn fetch_job(&self, job_id: Uuid) -> Result<JobExecution, DbError> {
        let connection = self.database_client.get_connection()?;
        let select = format!("SELECT {} FROM jobs WHERE id = ?1", sql_registry::JOB_COLUMNS);

        let mut rows = connection.query(&select, params![job_id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => map_row_to_job(&row),
            None => Err(DbError::JobNotFound),
        }
    }

    pub async fn fetch_pending_by_priority(&self) -> Result<Vec<JobExecution>, DbError> {
        self.fetch_job_collection(
            &sql_registry::FETCH_PENDING_BY_PRIORITY.replace("{columns}", sql_registry::JOB_COLUMNS),
            (),
        )
        .await
    }

    pub async fn fetch_running_jobs(&self) -> Result<Vec<JobExecution>, DbError> {
        self.fetch_job_collection(
            &sql_registry::FETCH_RUNNING_JOBS.replace("{columns}", sql_registry::JOB_COLUMNS),
            (),
        )
        .await
    }

    /// Cola de despacho completa: pendientes y corriendo con cupo.
    pub async fn fetch_dispatchable_by_priority(&self) -> Result<Vec<JobExecution>, DbError> {
        self.fetch_job_collection(
            &sql_registry::FETCH_DISPATCHABLE_BY_PRIORITY.replace("{columns}", sql_registry::JOB_COLUMNS),
            (),
        )
        .await
    }

    pub async fn fetch_active_on_hashlist(&self, hashlist_id: i64) -> Result<Vec<JobExecution>, DbError> {
        self.fetch_job_collection(
            &sql_registry::FETCH_ACTIVE_ON_HASHLIST.replace("{columns}", sql_registry::JOB_COLUMNS),
            params![hashlist_id],
        )
        .await
    }

    async fn fetch_job_collection(
        &self,
        select_statement: &str,
        query_params: impl libsql::params::IntoParams,
    ) -> Result<Vec<JobExecution>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection.query(select_statement, query_params).await?;

        let mut jobs = Vec::new();
        while let Some(row) = rows.next().await? {
            jobs.push(map_row_to_job(&row)?);
        }
        Ok(jobs)
    }

    // --- ESTRATO DE TRANSICIÓN ---

    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                sql_registry::UPDATE_STATUS,
                params![
                    job_id.to_string(),
                    status.as_str(),
                    error_message.map(|text| text.to_string()),
                    Utc::now().to_rfc3339()
                ],
            )
            .await?;
        Ok(())
    }

    /// Transición pending -> running en el primer despacho; idempotente.
    pub async fn mark_running_if_pending(&self, job_id: Uuid) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(
                sql_registry::MARK_RUNNING_IF_PENDING,
                params![job_id.to_string(), Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(affected > 0)
    }

    /// Sella la observación del primer benchmark. Devuelve false si otro
    /// benchmark ya había confirmado el keyspace (guardia de unicidad).
    #[instrument(skip(self))]
    pub async fn confirm_accurate_keyspace(
        &self,
        job_id: Uuid,
        observed_effective: u64,
        avg_rule_multiplier: f64,
    ) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(
                sql_registry::CONFIRM_ACCURATE_KEYSPACE,
                params![
                    job_id.to_string(),
                    observed_effective as i64,
                    avg_rule_multiplier,
                    Utc::now().to_rfc3339()
                ],
            )
            .await?;

        if affected > 0 {
            info!(
                "🎯 [JOB_REPO]: Job [{}] keyspace crystallized at {} (multiplier {:.4}).",
                job_id, observed_effective, avg_rule_multiplier
            );
        }
        Ok(affected > 0)
    }

    pub async fn update_effective_keyspace(&self, job_id: Uuid, new_total: u64) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                sql_registry::UPDATE_EFFECTIVE_KEYSPACE,
                params![job_id.to_string(), new_total as i64, Utc::now().to_rfc3339()],
            )
            .await?;
        debug!("📐 [JOB_REPO]: Job [{}] effective keyspace refined to {}.", job_id, new_total);
        Ok(())
    }

    pub async fn set_overall_progress(&self, job_id: Uuid, percent: f64) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                sql_registry::SET_OVERALL_PROGRESS,
                params![job_id.to_string(), percent.min(100.0), Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(())
    }

    pub async fn complete_job(&self, job_id: Uuid) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(
                sql_registry::COMPLETE_JOB,
                params![job_id.to_string(), Utc::now().to_rfc3339()],
            )
            .await?;

        if affected > 0 {
            info!("🏁 [JOB_REPO]: Job [{}] sealed as completed.", job_id);
        }
        Ok(affected > 0)
    }

    pub async fn fail_job(&self, job_id: Uuid, error_message: &str) -> Result<(), DbError> {
        warn!("❌ [JOB_REPO]: Job [{}] surfaced to failed: {}", job_id, error_message);
        self.update_status(job_id, JobStatus::Failed, Some(error_message)).await
    }

    // --- ESTRATO DE CAPAS INCREMENTALES ---

    /// Registra el plan completo de capas en una única transacción.
    #[instrument(skip(self, layers))]
    pub async fn create_increment_layers(&self, layers: &[IncrementLayer]) -> Result<(), DbError> {
        if layers.is_empty() {
            return Ok(());
        }

        let connection = self.database_client.get_connection()?;
        let transaction = connection
            .transaction()
            .await
            .map_err(|_| DbError::TransactionError)?;

        for layer in layers {
            transaction
                .execute(
                    sql_registry::INSERT_LAYER,
                    params![
                        layer.id.to_string(),
                        layer.job_id.to_string(),
                        layer.layer_index as i64,
                        layer.mask.clone(),
                        layer.base_keyspace as i64,
                        layer.effective_keyspace as i64,
                        layer.is_accurate_keyspace as i64,
                        layer.status.as_str()
                    ],
                )
                .await?;
        }

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        info!("📚 [JOB_REPO]: {} increment layers registered for job [{}].", layers.len(), layers[0].job_id);
        Ok(())
    }

    pub async fn fetch_layers(&self, job_id: Uuid) -> Result<Vec<IncrementLayer>, DbError> {
        let connection = self.database_client.get_connection()?;
        let select = sql_registry::FETCH_LAYERS_FOR_JOB.replace("{columns}", sql_registry::LAYER_COLUMNS);
        let mut rows = connection.query(&select, params![job_id.to_string()]).await?;

        let mut layers = Vec::new();
        while let Some(row) = rows.next().await? {
            layers.push(map_row_to_layer(&row)?);
        }
        Ok(layers)
    }

    pub async fn fetch_layer(&self, layer_id: Uuid) -> Result<IncrementLayer, DbError> {
        let connection = self.database_client.get_connection()?;
        let select = sql_registry::FETCH_LAYER.replace("{columns}", sql_registry::LAYER_COLUMNS);
        let mut rows = connection.query(&select, params![layer_id.to_string()]).await?;

        match rows.next().await? {
            Some(row) => map_row_to_layer(&row),
            None => Err(DbError::LayerNotFound),
        }
    }

    /// Capa bajo despacho: la running activa o la pending más baja.
    /// Las capas se agotan estrictamente en orden; la capa N+1 no arranca
    /// hasta que la N completó.
    pub async fn fetch_current_layer(&self, job_id: Uuid) -> Result<Option<IncrementLayer>, DbError> {
        let connection = self.database_client.get_connection()?;
        let select = sql_registry::FETCH_CURRENT_LAYER.replace("{columns}", sql_registry::LAYER_COLUMNS);
        let mut rows = connection.query(&select, params![job_id.to_string()]).await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_row_to_layer(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn mark_layer_running(&self, layer_id: Uuid) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(sql_registry::MARK_LAYER_RUNNING, params![layer_id.to_string()])
            .await?;
        Ok(affected > 0)
    }

    pub async fn mark_layer_completed(&self, layer_id: Uuid) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(sql_registry::MARK_LAYER_COMPLETED, params![layer_id.to_string()])
            .await?;
        if affected > 0 {
            info!("🧩 [JOB_REPO]: Layer [{}] sealed as completed.", layer_id);
        }
        Ok(affected > 0)
    }

    /// Sella el keyspace real de la capa observado por su primera tarea.
    pub async fn confirm_layer_keyspace(&self, layer_id: Uuid, observed: u64) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(
                sql_registry::CONFIRM_LAYER_KEYSPACE,
                params![layer_id.to_string(), observed as i64],
            )
            .await?;
        Ok(affected > 0)
    }

    /// Total del trabajo incremental = Σ capas (reales donde se conocen).
    pub async fn sum_layer_effectives(&self, job_id: Uuid) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(sql_registry::SUM_LAYER_EFFECTIVES, params![job_id.to_string()])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)?.max(0) as u64),
            None => Ok(0),
        }
    }

    pub async fn count_unfinished_layers(&self, job_id: Uuid) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(sql_registry::COUNT_UNFINISHED_LAYERS, params![job_id.to_string()])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)?.max(0) as u64),
            None => Ok(0),
        }
    }
}

// --- MAPEADORES DE FILA ---

fn map_row_to_job(row: &Row) -> Result<JobExecution, DbError> {
    let attack_code = row.get::<i64>(2)? as u8;
    let attack_mode = AttackMode::from_engine_code(attack_code)
        .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_ATTACK_MODE [{}]", attack_code)))?;

    let status_label: String = row.get::<String>(22)?;
    let status = JobStatus::parse(&status_label)
        .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_JOB_STATUS [{}]", status_label)))?;

    let wordlist_ids: Vec<i64> = serde_json::from_str(&row.get::<String>(5)?)
        .map_err(|fault| DbError::MappingError(fault.to_string()))?;
    let rule_ids: Vec<i64> = serde_json::from_str(&row.get::<String>(6)?)
        .map_err(|fault| DbError::MappingError(fault.to_string()))?;
    let custom_charsets: Vec<String> = serde_json::from_str(&row.get::<String>(8)?)
        .map_err(|fault| DbError::MappingError(fault.to_string()))?;

    Ok(JobExecution {
        id: parse_uuid(&row.get::<String>(0)?)?,
        hashlist_id: row.get::<i64>(1)?,
        attack_mode,
        priority: row.get::<i64>(3)? as u8,
        max_agents: row.get::<i64>(4)? as u32,
        wordlist_ids,
        rule_ids,
        mask: row.get::<String>(7).ok(),
        custom_charsets,
        increment_mode: as_bool(row.get::<i64>(9)?),
        increment_min: row.get::<i64>(10).ok().map(|value| value as u32),
        increment_max: row.get::<i64>(11).ok().map(|value| value as u32),
        base_keyspace: row.get::<i64>(12).ok().map(|value| value as u64),
        multiplication_factor: row.get::<i64>(13)?.max(1) as u64,
        effective_keyspace: row.get::<i64>(14).ok().map(|value| value as u64),
        is_accurate_keyspace: as_bool(row.get::<i64>(15)?),
        avg_rule_multiplier: row.get::<f64>(16)?,
        uses_rule_splitting: as_bool(row.get::<i64>(17)?),
        allow_high_priority_override: as_bool(row.get::<i64>(18)?),
        binary_version_id: row.get::<i64>(19)?,
        chunk_duration_override: row.get::<i64>(20).ok().map(|value| value as u64),
        overall_progress_percent: row.get::<f64>(21)?,
        status,
        error_message: row.get::<String>(23).ok(),
        created_at: parse_timestamp(&row.get::<String>(24)?)?,
        updated_at: parse_timestamp(&row.get::<String>(25)?)?,
    })
}

fn map_row_to_layer(row: &Row) -> Result<IncrementLayer, DbError> {
    let status_label: String = row.get::<String>(7)?;
    let status = LayerStatus::parse(&status_label)
        .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_LAYER_STATUS [{}]", status_label)))?;

    Ok(IncrementLayer {
        id: parse_uuid(&row.get::<String>(0)?)?,
        job_id: parse_uuid(&row.get::<String>(1)?)?,
        layer_index: row.get::<i64>(2)? as u32,
        mask: row.get::<String>(3)?,
        base_keyspace: row.get::<i64>(4)? as u64,
        effective_keyspace: row.get::<i64>(5)?.max(0) as u64,
        is_accurate_keyspace: as_bool(row.get::<i64>(6)?),
        status,
    })
}
