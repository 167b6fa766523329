// [libs/infra/db/src/repositories/task/mod.rs]
/*!
 * =================================================================
 * APARATO: TASK REPOSITORY
 * CLASIFICACIÓN: INFRASTRUCTURE LAYER (ESTRATO L3)
 * RESPONSABILIDAD: CADENA DE CUSTODIA DE FRAGMENTOS DE KEYSPACE
 *
 * # Invariante (Single Row Write):
 * Cada transición de estado de un fragmento es una única escritura con
 * guardia de estado previo. Un affected = 0 señala que otro actor ganó
 * la carrera; el llamador re-consulta en lugar de asumir.
 * =================================================================
 */

pub mod queries;

use crate::errors::DbError;
use crate::repositories::{as_bool, parse_timestamp, parse_uuid};
use crate::LedgerClient;
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use krakenhashes_domain_models::{TaskChunk, TaskStatus};

use self::queries as sql_registry;

/// Resumen liviano para la recomputación en cascada de límites efectivos.
#[derive(Debug, Clone)]
pub struct TaskSpanRow {
    pub task_id: Uuid,
    pub chunk_number: u32,
    pub effective_start: u64,
    pub effective_end: u64,
    pub actual_width: Option<u64>,
    pub base_width: u64,
    pub is_rule_split: bool,
    pub rule_count: u64,
    pub status: TaskStatus,
}

pub struct TaskRepository {
    database_client: LedgerClient,
}

impl TaskRepository {
    pub fn new(database_client: LedgerClient) -> Self {
        Self { database_client }
    }

    // --- ESTRATO DE IGNICIÓN ---

    #[instrument(skip(self, task))]
    pub async fn create_task(&self, task: &TaskChunk) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;

        connection
            .execute(
                sql_registry::INSERT_TASK,
                params![
                    task.id.to_string(),
                    task.job_id.to_string(),
                    task.increment_layer_id.map(|value| value.to_string()),
                    task.agent_id,
                    task.chunk_number as i64,
                    task.keyspace_start as i64,
                    task.keyspace_end as i64,
                    task.keyspace_processed as i64,
                    task.effective_keyspace_start as i64,
                    task.effective_keyspace_end as i64,
                    task.chunk_actual_keyspace.map(|value| value as i64),
                    task.is_actual_keyspace as i64,
                    task.is_keyspace_split as i64,
                    task.is_rule_split as i64,
                    task.rule_start_index.map(|value| value as i64),
                    task.rule_end_index.map(|value| value as i64),
                    task.rule_chunk_path.clone(),
                    task.chunk_duration_seconds as i64,
                    task.progress_percent,
                    task.hash_rate as i64,
                    task.retry_count as i64,
                    task.expected_crack_count as i64,
                    task.received_crack_count as i64,
                    task.batches_complete as i64,
                    task.detailed_status.clone(),
                    task.status.as_str(),
                    task.started_at.map(|stamp| stamp.to_rfc3339()),
                    task.completed_at.map(|stamp| stamp.to_rfc3339()),
                    task.error_message.clone(),
                    task.created_at.to_rfc3339()
                ],
            )
            .await?;

        info!(
            "🧱 [TASK_REPO]: Chunk #{} of job [{}] registered [{}..{}).",
            task.chunk_number, task.job_id, task.keyspace_start, task.keyspace_end
        );
        Ok(())
    }

    // --- ESTRATO DE CONSULTA ---

    pub async fn fetch_task(&self, task_id: Uuid) -> Result<TaskChunk, DbError> {
        let connection = self.database_client.get_connection()?;
        let select = format!("SELECT {} FROM tasks WHERE id = ?1", sql_registry::TASK_COLUMNS);

        let mut rows = connection.query(&select, params![task_id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => map_row_to_task(&row),
            None => Err(DbError::TaskNotFound),
        }
    }

    pub async fn next_chunk_number(&self, job_id: Uuid) -> Result<u32, DbError> {
        self.fetch_scalar(sql_registry::NEXT_CHUNK_NUMBER, job_id).await.map(|value| value as u32)
    }

    /// Frontera base del trabajo: con la cobertura sin huecos, el MAX de
    /// keyspace_end es exactamente el inicio del próximo fragmento.
    pub async fn keyspace_frontier_for_job(&self, job_id: Uuid) -> Result<u64, DbError> {
        self.fetch_scalar(sql_registry::KEYSPACE_FRONTIER_FOR_JOB, job_id).await
    }

    pub async fn keyspace_frontier_for_layer(&self, layer_id: Uuid) -> Result<u64, DbError> {
        self.fetch_scalar(sql_registry::KEYSPACE_FRONTIER_FOR_LAYER, layer_id).await
    }

    pub async fn rule_frontier_for_job(&self, job_id: Uuid) -> Result<u64, DbError> {
        self.fetch_scalar(sql_registry::RULE_FRONTIER_FOR_JOB, job_id).await
    }

    pub async fn effective_frontier_for_job(&self, job_id: Uuid) -> Result<u64, DbError> {
        self.fetch_scalar(sql_registry::EFFECTIVE_FRONTIER_FOR_JOB, job_id).await
    }

    async fn fetch_scalar(&self, statement: &str, id: Uuid) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection.query(statement, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)?.max(0) as u64),
            None => Ok(0),
        }
    }

    // --- ESTRATO DE ASIGNACIÓN ---

    /// Reclamación atómica previa a la escritura en el canal de despacho.
    pub async fn mark_assigned(&self, task_id: Uuid, agent_id: i64) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(sql_registry::MARK_ASSIGNED, params![task_id.to_string(), agent_id])
            .await?;
        Ok(affected > 0)
    }

    /// Reversión tras un fallo de envío: el fragmento vuelve a la cola y
    /// el agente queda libre.
    pub async fn revert_to_pending(&self, task_id: Uuid) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(sql_registry::REVERT_TO_PENDING, params![task_id.to_string()])
            .await?;
        if affected > 0 {
            warn!("↩️ [TASK_REPO]: Chunk [{}] reverted to pending after dispatch fault.", task_id);
        }
        Ok(affected > 0)
    }

    pub async fn mark_running(&self, task_id: Uuid) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(
                sql_registry::MARK_RUNNING,
                params![task_id.to_string(), Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(affected > 0)
    }

    // --- ESTRATO DE PROGRESO ---

    pub async fn update_progress(
        &self,
        task_id: Uuid,
        keyspace_processed: u64,
        hash_rate: u64,
        progress_percent: f64,
        detailed_status: Option<&str>,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                sql_registry::UPDATE_PROGRESS,
                params![
                    task_id.to_string(),
                    keyspace_processed as i64,
                    hash_rate as i64,
                    progress_percent,
                    detailed_status.map(|text| text.to_string())
                ],
            )
            .await?;
        Ok(())
    }

    /// Sella el keyspace real del fragmento. El guardia SQL restringe la
    /// escritura a tareas rule-split; un affected = 0 sobre una tarea
    /// keyspace-split es el comportamiento correcto, no un error.
    pub async fn set_chunk_actual(&self, task_id: Uuid, actual_width: u64) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(
                sql_registry::SET_CHUNK_ACTUAL,
                params![task_id.to_string(), actual_width as i64],
            )
            .await?;
        if affected > 0 {
            debug!("🎯 [TASK_REPO]: Chunk [{}] actual keyspace sealed at {}.", task_id, actual_width);
        }
        Ok(affected > 0)
    }

    pub async fn update_effective_bounds(
        &self,
        task_id: Uuid,
        effective_start: u64,
        effective_end: u64,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                sql_registry::UPDATE_EFFECTIVE_BOUNDS,
                params![task_id.to_string(), effective_start as i64, effective_end as i64],
            )
            .await?;
        Ok(())
    }

    pub async fn fetch_spans_for_job(&self, job_id: Uuid) -> Result<Vec<TaskSpanRow>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(sql_registry::FETCH_SPANS_FOR_JOB, params![job_id.to_string()])
            .await?;

        let mut spans = Vec::new();
        while let Some(row) = rows.next().await? {
            let status_label: String = row.get::<String>(11)?;
            let status = TaskStatus::parse(&status_label)
                .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_TASK_STATUS [{}]", status_label)))?;

            let actual_width = if as_bool(row.get::<i64>(5)?) {
                row.get::<i64>(4).ok().map(|value| value as u64)
            } else {
                None
            };

            let rule_start = row.get::<i64>(9).ok().unwrap_or(0).max(0) as u64;
            let rule_end = row.get::<i64>(10).ok().unwrap_or(0).max(0) as u64;

            spans.push(TaskSpanRow {
                task_id: parse_uuid(&row.get::<String>(0)?)?,
                chunk_number: row.get::<i64>(1)? as u32,
                effective_start: row.get::<i64>(2)?.max(0) as u64,
                effective_end: row.get::<i64>(3)?.max(0) as u64,
                actual_width,
                base_width: (row.get::<i64>(7)? - row.get::<i64>(6)?).max(0) as u64,
                is_rule_split: as_bool(row.get::<i64>(8)?),
                rule_count: rule_end.saturating_sub(rule_start),
                status,
            });
        }
        Ok(spans)
    }

    // --- ESTRATO DE DRENAJE Y SELLADO ---

    pub async fn set_processing(&self, task_id: Uuid, expected_crack_count: u64) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(
                sql_registry::SET_PROCESSING,
                params![task_id.to_string(), expected_crack_count as i64],
            )
            .await?;
        if affected > 0 {
            info!(
                "⏳ [TASK_REPO]: Chunk [{}] draining crack stream (expecting {}).",
                task_id, expected_crack_count
            );
        }
        Ok(affected > 0)
    }

    /// Acredita cracks recibidos y devuelve el estado fresco del fragmento
    /// para la evaluación de cierre (re-lectura tras el candado).
    pub async fn add_received_cracks(&self, task_id: Uuid, crack_count: u64) -> Result<TaskChunk, DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                sql_registry::ADD_RECEIVED_CRACKS,
                params![task_id.to_string(), crack_count as i64],
            )
            .await?;
        self.fetch_task(task_id).await
    }

    pub async fn mark_batches_complete(&self, task_id: Uuid) -> Result<TaskChunk, DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(sql_registry::MARK_BATCHES_COMPLETE, params![task_id.to_string()])
            .await?;
        self.fetch_task(task_id).await
    }

    pub async fn complete_task(&self, task_id: Uuid) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(
                sql_registry::COMPLETE_TASK,
                params![task_id.to_string(), Utc::now().to_rfc3339()],
            )
            .await?;
        if affected > 0 {
            info!("✅ [TASK_REPO]: Chunk [{}] sealed as completed.", task_id);
        }
        Ok(affected > 0)
    }

    pub async fn fail_task(&self, task_id: Uuid, error_message: &str) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(
                sql_registry::FAIL_TASK,
                params![task_id.to_string(), error_message, Utc::now().to_rfc3339()],
            )
            .await?;
        if affected > 0 {
            warn!("❌ [TASK_REPO]: Chunk [{}] permanently failed: {}", task_id, error_message);
        }
        Ok(affected > 0)
    }

    pub async fn cancel_open_tasks_for_job(&self, job_id: Uuid) -> Result<u64, DbError> {
        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(
                sql_registry::CANCEL_OPEN_TASKS_FOR_JOB,
                params![job_id.to_string(), Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(affected)
    }

    // --- ESTRATO DE RECONEXIÓN ---

    pub async fn fetch_occupying_for_agent(&self, agent_id: i64) -> Result<Vec<TaskChunk>, DbError> {
        let select = sql_registry::FETCH_OCCUPYING_FOR_AGENT.replace("{columns}", sql_registry::TASK_COLUMNS);
        let connection = self.database_client.get_connection()?;
        let mut rows = connection.query(&select, params![agent_id]).await?;

        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(map_row_to_task(&row)?);
        }
        Ok(tasks)
    }

    pub async fn fetch_occupying_for_job(&self, job_id: Uuid) -> Result<Vec<TaskChunk>, DbError> {
        let select = sql_registry::FETCH_OCCUPYING_FOR_JOB.replace("{columns}", sql_registry::TASK_COLUMNS);
        let connection = self.database_client.get_connection()?;
        let mut rows = connection.query(&select, params![job_id.to_string()]).await?;

        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(map_row_to_task(&row)?);
        }
        Ok(tasks)
    }

    /// Desconexión: toda tarea en vuelo del agente pasa a gracia.
    pub async fn mark_reconnect_pending(
        &self,
        task_id: Uuid,
        disconnected_at: DateTime<Utc>,
    ) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(
                sql_registry::MARK_RECONNECT_PENDING,
                params![task_id.to_string(), disconnected_at.to_rfc3339()],
            )
            .await?;
        Ok(affected > 0)
    }

    /// Recuperación dirigida: preserva keyspace_processed por construcción
    /// (la sentencia no toca la columna de progreso).
    pub async fn recover_for_agent(&self, task_id: Uuid, agent_id: i64) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(
                sql_registry::RECOVER_FOR_AGENT,
                params![task_id.to_string(), agent_id],
            )
            .await?;
        if affected > 0 {
            info!("🔗 [TASK_REPO]: Chunk [{}] re-bound to agent [{}].", task_id, agent_id);
        }
        Ok(affected > 0)
    }

    pub async fn reset_to_pending_with_retry(&self, task_id: Uuid) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(
                sql_registry::RESET_TO_PENDING_WITH_RETRY,
                params![task_id.to_string()],
            )
            .await?;
        Ok(affected > 0)
    }

    pub async fn fetch_reconnect_pending(&self) -> Result<Vec<TaskChunk>, DbError> {
        let select = sql_registry::FETCH_RECONNECT_PENDING.replace("{columns}", sql_registry::TASK_COLUMNS);
        let connection = self.database_client.get_connection()?;
        let mut rows = connection.query(&select, ()).await?;

        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(map_row_to_task(&row)?);
        }
        Ok(tasks)
    }

    pub async fn fetch_reconnect_pending_for_agent(&self, agent_id: i64) -> Result<Vec<TaskChunk>, DbError> {
        let select =
            sql_registry::FETCH_RECONNECT_PENDING_FOR_AGENT.replace("{columns}", sql_registry::TASK_COLUMNS);
        let connection = self.database_client.get_connection()?;
        let mut rows = connection.query(&select, params![agent_id]).await?;

        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(map_row_to_task(&row)?);
        }
        Ok(tasks)
    }

    pub async fn fetch_expired_reconnect_pending(
        &self,
        expiry_threshold: DateTime<Utc>,
    ) -> Result<Vec<TaskChunk>, DbError> {
        let select =
            sql_registry::FETCH_EXPIRED_RECONNECT_PENDING.replace("{columns}", sql_registry::TASK_COLUMNS);
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(&select, params![expiry_threshold.to_rfc3339()])
            .await?;

        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(map_row_to_task(&row)?);
        }
        Ok(tasks)
    }

    /// Vía excepcional: recuperación de una tarea fallida reportada en
    /// reconexión cuando aún conserva reintentos.
    pub async fn recover_failed_for_agent(&self, task_id: Uuid, agent_id: i64) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(
                sql_registry::RECOVER_FAILED_FOR_AGENT,
                params![task_id.to_string(), agent_id],
            )
            .await?;
        Ok(affected > 0)
    }

    /// Desalojo por alta prioridad: no consume reintento.
    pub async fn reset_for_preemption(&self, task_id: Uuid) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let affected = connection
            .execute(sql_registry::RESET_FOR_PREEMPTION, params![task_id.to_string()])
            .await?;
        if affected > 0 {
            warn!("⚔️ [TASK_REPO]: Chunk [{}] displaced by high-priority override.", task_id);
        }
        Ok(affected > 0)
    }

    // --- ESTRATO DE AGREGACIÓN ---

    pub async fn fetch_active_on_hashlist(&self, hashlist_id: i64) -> Result<Vec<TaskChunk>, DbError> {
        let select = sql_registry::FETCH_ACTIVE_ON_HASHLIST.replace("{columns}", sql_registry::TASK_COLUMNS);
        let connection = self.database_client.get_connection()?;
        let mut rows = connection.query(&select, params![hashlist_id]).await?;

        let mut tasks = Vec::new();
        while let Some(row) = rows.next().await? {
            tasks.push(map_row_to_task(&row)?);
        }
        Ok(tasks)
    }

    pub async fn count_distinct_agents_for_job(&self, job_id: Uuid) -> Result<u64, DbError> {
        self.fetch_scalar(sql_registry::COUNT_DISTINCT_AGENTS_FOR_JOB, job_id).await
    }

    pub async fn count_open_tasks_for_job(&self, job_id: Uuid) -> Result<u64, DbError> {
        self.fetch_scalar(sql_registry::COUNT_OPEN_TASKS_FOR_JOB, job_id).await
    }

    pub async fn count_live_non_draining_for_job(&self, job_id: Uuid) -> Result<u64, DbError> {
        self.fetch_scalar(sql_registry::COUNT_LIVE_NON_DRAINING_FOR_JOB, job_id).await
    }

    pub async fn count_draining_for_job(&self, job_id: Uuid) -> Result<u64, DbError> {
        self.fetch_scalar(sql_registry::COUNT_DRAINING_FOR_JOB, job_id).await
    }

    pub async fn count_open_tasks_for_layer(&self, layer_id: Uuid) -> Result<u64, DbError> {
        self.fetch_scalar(sql_registry::COUNT_OPEN_TASKS_FOR_LAYER, layer_id).await
    }

    pub async fn sum_processed_for_job(&self, job_id: Uuid) -> Result<u64, DbError> {
        self.fetch_scalar(sql_registry::SUM_PROCESSED_FOR_JOB, job_id).await
    }
}

// --- MAPEADOR DE FILA ---

fn map_row_to_task(row: &Row) -> Result<TaskChunk, DbError> {
    let status_label: String = row.get::<String>(25)?;
    let status = TaskStatus::parse(&status_label)
        .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_TASK_STATUS [{}]", status_label)))?;

    let layer_id = match row.get::<String>(2).ok() {
        Some(raw) => Some(parse_uuid(&raw)?),
        None => None,
    };

    let started_at = match row.get::<String>(26).ok() {
        Some(raw) => Some(parse_timestamp(&raw)?),
        None => None,
    };
    let completed_at = match row.get::<String>(27).ok() {
        Some(raw) => Some(parse_timestamp(&raw)?),
        None => None,
    };

    Ok(TaskChunk {
        id: parse_uuid(&row.get::<String>(0)?)?,
        job_id: parse_uuid(&row.get::<String>(1)?)?,
        increment_layer_id: layer_id,
        agent_id: row.get::<i64>(3).ok(),
        chunk_number: row.get::<i64>(4)? as u32,
        keyspace_start: row.get::<i64>(5)?.max(0) as u64,
        keyspace_end: row.get::<i64>(6)?.max(0) as u64,
        keyspace_processed: row.get::<i64>(7)?.max(0) as u64,
        effective_keyspace_start: row.get::<i64>(8)?.max(0) as u64,
        effective_keyspace_end: row.get::<i64>(9)?.max(0) as u64,
        chunk_actual_keyspace: row.get::<i64>(10).ok().map(|value| value as u64),
        is_actual_keyspace: as_bool(row.get::<i64>(11)?),
        is_keyspace_split: as_bool(row.get::<i64>(12)?),
        is_rule_split: as_bool(row.get::<i64>(13)?),
        rule_start_index: row.get::<i64>(14).ok().map(|value| value as u64),
        rule_end_index: row.get::<i64>(15).ok().map(|value| value as u64),
        rule_chunk_path: row.get::<String>(16).ok(),
        chunk_duration_seconds: row.get::<i64>(17)?.max(0) as u64,
        progress_percent: row.get::<f64>(18)?,
        hash_rate: row.get::<i64>(19)?.max(0) as u64,
        retry_count: row.get::<i64>(20)? as u32,
        expected_crack_count: row.get::<i64>(21)?.max(0) as u64,
        received_crack_count: row.get::<i64>(22)?.max(0) as u64,
        batches_complete: as_bool(row.get::<i64>(23)?),
        detailed_status: row.get::<String>(24).ok(),
        status,
        started_at,
        completed_at,
        error_message: row.get::<String>(28).ok(),
        created_at: parse_timestamp(&row.get::<String>(29)?)?,
    })
}
